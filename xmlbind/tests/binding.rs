//! End-to-end binding tests: documents read into object graphs and written
//! back through complete models.

use std::collections::HashMap;
use std::sync::Arc;

use xmlbind::{
    Attribute, BindingModel, Choice, Chooser, ComplexType, Context, Element, ElementInjector,
    Error, FieldAccessor, FnAction, FnCreator, Ignore, IntConverter, MapRepeater, ObjectCreator,
    Phases, Recursor, Reference, Repeater, Root, Sequence, SimpleArgument, SimpleType,
    StringConverter, Value, WriterOptions,
};

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

fn text(field: &str) -> SimpleType {
    SimpleType::new(StringConverter).with_accessor(FieldAccessor::new(field))
}

fn person_type(with_age: bool) -> ComplexType {
    let mut content = Sequence::new().with(Element::new("name").with_child(text("name")));
    if with_age {
        content = content.with(
            Element::new("age").optional().with_child(
                SimpleType::new(IntConverter).with_accessor(FieldAccessor::new("age")),
            ),
        );
    }
    content = content.with(Element::new("email").optional().with_child(text("email")));
    ComplexType::new(ObjectCreator::new("Person"), content).with_attribute(
        Attribute::new("id", FieldAccessor::new("id"), IntConverter).optional(),
    )
}

fn person_model() -> BindingModel {
    BindingModel::builder()
        .root(Root::new("person", "Person", person_type(true)))
        .build()
        .unwrap()
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn test_person_round_trip() {
    let model = person_model();
    let value = model
        .unmarshal_str(r#"<person id="7"><name>Ann</name><age>42</age></person>"#)
        .unwrap();

    let expected = Value::object("Person")
        .with("id", 7i64)
        .with("name", "Ann")
        .with("age", 42i64);
    assert_eq!(value, expected);

    let xml = model.marshal_to_string(&value).unwrap();
    assert_eq!(
        xml,
        format!(
            "{}<person id=\"7\"><name>Ann</name><age>42</age></person>\n",
            DECLARATION
        )
    );
    assert_eq!(model.unmarshal_str(&xml).unwrap(), value);
}

#[test]
fn test_whitespace_between_elements_is_ignored() {
    let model = person_model();
    let value = model
        .unmarshal_str("<person>\n  <name>Ann</name>\n  <email>ann@example.org</email>\n</person>")
        .unwrap();
    assert_eq!(
        value,
        Value::object("Person")
            .with("name", "Ann")
            .with("email", "ann@example.org")
    );
}

#[test]
fn test_pretty_printed_output_reads_back() {
    let model = person_model();
    let value = Value::object("Person")
        .with("name", "Ann")
        .with("email", "ann@example.org");
    let options = WriterOptions {
        pretty_print: true,
        xml_declaration: true,
    };
    let bytes = model
        .marshal_with(&value, Vec::new(), options, HashMap::new())
        .unwrap();
    let xml = String::from_utf8(bytes).unwrap();
    assert!(xml.contains("\n  <name>Ann</name>"));
    assert_eq!(model.unmarshal_str(&xml).unwrap(), value);
}

#[test]
fn test_absent_optional_child_is_not_observable() {
    let with_age = person_model();
    let without_age = BindingModel::builder()
        .root(Root::new("person", "Person", person_type(false)))
        .build()
        .unwrap();

    let xml = "<person><name>Bob</name></person>";
    assert_eq!(
        with_age.unmarshal_str(xml).unwrap(),
        without_age.unmarshal_str(xml).unwrap()
    );
}

fn tagged_doc_model(with_optional_item: bool) -> BindingModel {
    let tagged_item = Element::new("item")
        .optional()
        .with_attribute(Attribute::new("kind", FieldAccessor::new("kind"), StringConverter))
        .with_child(Element::new("foo").with_child(text("foo")));
    let plain_item = Element::new("item").with_child(Element::new("bar").with_child(text("bar")));

    let mut content = Sequence::new();
    if with_optional_item {
        content = content.with(tagged_item);
    }
    let doc = ComplexType::new(ObjectCreator::new("Doc"), content.with(plain_item));
    BindingModel::builder()
        .root(Root::new("doc", "Doc", doc))
        .build()
        .unwrap()
}

#[test]
fn test_rejected_optional_child_leaves_no_attributes() {
    let xml = r#"<doc><item kind="k"><bar>b</bar></item></doc>"#;
    let with_optional = tagged_doc_model(true).unmarshal_str(xml).unwrap();
    let without = tagged_doc_model(false).unmarshal_str(xml).unwrap();

    assert_eq!(with_optional, without);
    assert_eq!(with_optional, Value::object("Doc").with("bar", "b"));
    assert_eq!(with_optional.field("kind"), Value::Null);
}

#[test]
fn test_namespaced_document_round_trip() {
    let book = ComplexType::new(
        ObjectCreator::new("Book"),
        Sequence::new().with(Element::new("{urn:books}title").with_child(text("title"))),
    );
    let model = BindingModel::builder()
        .root(Root::new("{urn:books}book", "Book", book))
        .build()
        .unwrap();

    let value = model
        .unmarshal_str(r#"<b:book xmlns:b="urn:books"><b:title>Dune</b:title></b:book>"#)
        .unwrap();
    assert_eq!(value, Value::object("Book").with("title", "Dune"));

    let xml = model.marshal_to_string(&value).unwrap();
    assert!(xml.contains(r#"<ns0:book xmlns:ns0="urn:books">"#));
    assert_eq!(model.unmarshal_str(&xml).unwrap(), value);

    // Same local name without the namespace is a different element
    assert!(model.unmarshal_str("<book><title>Dune</title></book>").is_err());
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_unknown_document_element() {
    let err = person_model()
        .unmarshal_str("<robot><name>R2</name></robot>")
        .unwrap_err();
    assert!(matches!(err, Error::Mismatch(_)));
}

#[test]
fn test_missing_required_first_child() {
    let err = person_model()
        .unmarshal_str("<person><age>3</age></person>")
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::Mismatch(_)));
    assert_eq!(err.node_path(), vec!["root <person>"]);
}

#[test]
fn test_unexpected_trailing_element() {
    let err = person_model()
        .unmarshal_str("<person><name>Ann</name><shoe>42</shoe></person>")
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::Mismatch(_)));
}

#[test]
fn test_conversion_error_carries_node_path() {
    let err = person_model()
        .unmarshal_str("<person><name>Ann</name><age>old</age></person>")
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::Validation(_)));
    assert_eq!(
        err.node_path(),
        vec![
            "root <person>",
            "complex type Person",
            "element <age>",
            "simple type int",
        ]
    );
}

#[test]
fn test_marshal_without_root_for_type() {
    let err = person_model()
        .marshal_to_string(&Value::object("Robot"))
        .unwrap_err();
    assert!(matches!(err, Error::Mismatch(_)));
}

#[test]
fn test_marshal_missing_required_field() {
    let err = person_model()
        .marshal_to_string(&Value::object("Person").with("age", 3i64))
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::Mismatch(_)));
    assert!(err.node_path().contains(&"element <name>"));
}

// =============================================================================
// Constructor arguments
// =============================================================================

fn dwarf_model(creator: FnCreator, argument: SimpleArgument) -> BindingModel {
    let dwarf = ComplexType::new(
        creator,
        Sequence::new().with(Element::new("name").with_child(argument)),
    );
    BindingModel::builder()
        .root(Root::new("root", "Dwarf", dwarf))
        .build()
        .unwrap()
}

#[test]
fn test_constructor_argument_read_ahead() {
    let creator = FnCreator::new("Dwarf", |args| {
        Ok(Value::object("Dwarf").with("constructedWith", args[0].clone()))
    })
    .with_parameters(["name"]);
    let argument =
        SimpleArgument::new("name", StringConverter).with_accessor(FieldAccessor::new("name"));
    let model = dwarf_model(creator, argument);

    let value = model
        .unmarshal_str("<root><name>Repelsteeltje</name></root>")
        .unwrap();
    assert_eq!(value.field("constructedWith"), Value::from("Repelsteeltje"));
    assert_eq!(value.field("name"), Value::from("Repelsteeltje"));
}

#[test]
fn test_constructor_argument_round_trip() {
    let model = BindingModel::builder()
        .root(Root::new(
            "root",
            "Dwarf",
            ComplexType::new(
                ObjectCreator::new("Dwarf").with_parameters(["name"]),
                Sequence::new()
                    .with(Element::new("name").with_child(SimpleArgument::new("name", StringConverter)))
                    .with(Element::new("beard").optional().with_child(text("beard"))),
            ),
        ))
        .build()
        .unwrap();

    let value = model
        .unmarshal_str("<root><name>Repelsteeltje</name><beard>long</beard></root>")
        .unwrap();
    assert_eq!(
        value,
        Value::object("Dwarf")
            .with("name", "Repelsteeltje")
            .with("beard", "long")
    );

    let xml = model.marshal_to_string(&value).unwrap();
    assert_eq!(
        xml,
        format!(
            "{}<root><name>Repelsteeltje</name><beard>long</beard></root>\n",
            DECLARATION
        )
    );
}

#[test]
fn test_constructor_pre_read_skips_nested_types() {
    let creator = FnCreator::new("Castle", |args| {
        Ok(Value::object("Castle").with("owner", args[0].clone()))
    })
    .with_parameters(["owner"]);
    let gate = ComplexType::new(
        ObjectCreator::new("Gate"),
        Sequence::new().with(Element::new("material").with_child(text("material"))),
    )
    .with_accessor(FieldAccessor::new("gate"));
    let castle = ComplexType::new(
        creator,
        Sequence::new()
            .with(Element::new("gate").with_child(gate))
            .with(Element::new("owner").with_child(SimpleArgument::new("owner", StringConverter))),
    );
    let model = BindingModel::builder()
        .root(Root::new("castle", "Castle", castle))
        .build()
        .unwrap();

    let value = model
        .unmarshal_str("<castle><gate><material>oak</material></gate><owner>Ann</owner></castle>")
        .unwrap();
    assert_eq!(
        value,
        Value::object("Castle")
            .with("owner", "Ann")
            .with("gate", Value::object("Gate").with("material", "oak"))
    );
}

// =============================================================================
// Choices
// =============================================================================

fn animal(type_name: &str) -> ComplexType {
    ComplexType::new(
        ObjectCreator::new(type_name),
        Sequence::new().with(Element::new("name").with_child(text("name"))),
    )
}

fn zoo_model() -> BindingModel {
    let pet = Choice::new()
        .with_accessor(FieldAccessor::new("pet"))
        .with(
            Chooser::exact("Animal"),
            Element::new("animal").with_child(animal("Animal")),
        )
        .with(
            Chooser::assignable("Cat"),
            Element::new("cat").with_child(animal("Cat")),
        );
    let zoo = ComplexType::new(ObjectCreator::new("Zoo"), Sequence::new().with(pet));
    BindingModel::builder()
        .root(Root::new("zoo", "Zoo", zoo))
        .subtype("Cat", "Animal")
        .build()
        .unwrap()
}

#[test]
fn test_choice_picks_exact_option_over_assignable() {
    let model = zoo_model();

    let cat = Value::object("Zoo").with("pet", Value::object("Cat").with("name", "Tom"));
    let xml = model.marshal_to_string(&cat).unwrap();
    assert!(xml.contains("<cat><name>Tom</name></cat>"));
    assert!(!xml.contains("<animal>"));
    assert_eq!(model.unmarshal_str(&xml).unwrap(), cat);

    let generic = Value::object("Zoo").with("pet", Value::object("Animal").with("name", "Rex"));
    let xml = model.marshal_to_string(&generic).unwrap();
    assert!(xml.contains("<animal><name>Rex</name></animal>"));
    assert_eq!(model.unmarshal_str(&xml).unwrap(), generic);
}

#[test]
fn test_choice_is_deterministic() {
    let model = zoo_model();
    let xml = "<zoo><cat><name>Tom</name></cat></zoo>";
    let first = model.unmarshal_str(xml).unwrap();
    let second = model.unmarshal_str(xml).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.field("pet").type_name().as_str(), "Cat");
}

#[test]
fn test_choice_without_matching_option() {
    let model = zoo_model();

    let err = model
        .unmarshal_str("<zoo><dog><name>Rex</name></dog></zoo>")
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::Mismatch(_)));

    let dog = Value::object("Zoo").with("pet", Value::object("Dog").with("name", "Rex"));
    let err = model.marshal_to_string(&dog).unwrap_err();
    assert!(matches!(err.root_cause(), Error::Mismatch(_)));
}

#[test]
fn test_choice_backtracks_into_same_element_name() {
    let circle = ComplexType::new(
        ObjectCreator::new("Circle"),
        Sequence::new().with(
            Element::new("radius")
                .with_child(SimpleType::new(IntConverter).with_accessor(FieldAccessor::new("radius"))),
        ),
    );
    let square = ComplexType::new(
        ObjectCreator::new("Square"),
        Sequence::new().with(
            Element::new("side")
                .with_child(SimpleType::new(IntConverter).with_accessor(FieldAccessor::new("side"))),
        ),
    );
    let shape = Choice::new()
        .with(Chooser::exact("Circle"), Element::new("shape").with_child(circle))
        .with(Chooser::exact("Square"), Element::new("shape").with_child(square));
    let drawing = ComplexType::new(
        ObjectCreator::new("Drawing"),
        Repeater::new(shape).with_accessor(FieldAccessor::new("shapes")),
    );
    let model = BindingModel::builder()
        .root(Root::new("drawing", "Drawing", drawing))
        .build()
        .unwrap();

    let xml = "<drawing><shape><side>2</side></shape><shape><radius>1</radius></shape></drawing>";
    let value = model.unmarshal_str(xml).unwrap();
    assert_eq!(
        value.field("shapes"),
        Value::List(vec![
            Value::object("Square").with("side", 2i64),
            Value::object("Circle").with("radius", 1i64),
        ])
    );
    assert_eq!(model.unmarshal_str(&model.marshal_to_string(&value).unwrap()).unwrap(), value);
}

#[test]
fn test_rejected_choice_option_is_undone() {
    let detail = |field: &str, inner: &str| {
        Element::new("entry").with_child(
            Element::new("detail")
                .with_attribute(
                    Attribute::new("kind", FieldAccessor::new(field), StringConverter).optional(),
                )
                .with_child(Element::new(inner).with_child(text(inner))),
        )
    };
    let entry = Choice::new()
        .with(Chooser::exact("Doc"), detail("alphaKind", "alpha"))
        .with(Chooser::Always, detail("betaKind", "beta"));
    let doc = ComplexType::new(
        ObjectCreator::new("Doc"),
        Sequence::new().with(entry),
    );
    let model = BindingModel::builder()
        .root(Root::new("doc", "Doc", doc))
        .build()
        .unwrap();

    let value = model
        .unmarshal_str(r#"<doc><entry><detail kind="k"><beta>b</beta></detail></entry></doc>"#)
        .unwrap();
    assert_eq!(
        value,
        Value::object("Doc").with("betaKind", "k").with("beta", "b")
    );
}

// =============================================================================
// Repeaters
// =============================================================================

fn library_model(optional: bool) -> BindingModel {
    let mut books = Repeater::new(Element::new("book").with_child(SimpleType::new(StringConverter)))
        .with_accessor(FieldAccessor::new("books"));
    if optional {
        books = books.optional();
    }
    let library = ComplexType::new(
        ObjectCreator::new("Library"),
        Sequence::new()
            .with(Element::new("name").with_child(text("name")))
            .with(books),
    );
    BindingModel::builder()
        .root(Root::new("library", "Library", library))
        .build()
        .unwrap()
}

#[test]
fn test_repeater_collects_items_in_order() {
    let model = library_model(false);
    let value = model
        .unmarshal_str("<library><name>City</name><book>A</book><book>B</book></library>")
        .unwrap();
    assert_eq!(
        value.field("books"),
        Value::List(vec![Value::from("A"), Value::from("B")])
    );
    assert_eq!(model.unmarshal_str(&model.marshal_to_string(&value).unwrap()).unwrap(), value);
}

#[test]
fn test_optional_repeater_yields_empty_list() {
    let model = library_model(true);
    let value = model
        .unmarshal_str("<library><name>City</name></library>")
        .unwrap();
    assert_eq!(value.field("books"), Value::List(Vec::new()));

    let xml = model.marshal_to_string(&value).unwrap();
    assert!(!xml.contains("<book"));
    assert_eq!(model.unmarshal_str(&xml).unwrap(), value);
}

#[test]
fn test_required_repeater_needs_an_item() {
    let model = library_model(false);
    let err = model
        .unmarshal_str("<library><name>City</name></library>")
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::Mismatch(_)));

    let empty = Value::object("Library")
        .with("name", "City")
        .with("books", Value::List(Vec::new()));
    let err = model.marshal_to_string(&empty).unwrap_err();
    assert!(matches!(err.root_cause(), Error::Mismatch(_)));
}

fn settings_model() -> BindingModel {
    let entry = Element::new("entry").with_child(ComplexType::new(
        ObjectCreator::new("Entry"),
        Sequence::new()
            .with(Element::new("key").with_child(text("key")))
            .with(Element::new("value").with_child(text("value"))),
    ));
    let settings = ComplexType::new(
        ObjectCreator::new("Settings"),
        MapRepeater::new(entry, "key")
            .with_accessor(FieldAccessor::new("entries"))
            .optional(),
    );
    BindingModel::builder()
        .root(Root::new("settings", "Settings", settings))
        .build()
        .unwrap()
}

fn entry(key: &str, value: &str) -> Value {
    Value::object("Entry").with("key", key).with("value", value)
}

#[test]
fn test_map_repeater_later_duplicate_wins() {
    let model = settings_model();
    let value = model
        .unmarshal_str(
            "<settings>\
             <entry><key>a</key><value>1</value></entry>\
             <entry><key>b</key><value>2</value></entry>\
             <entry><key>a</key><value>3</value></entry>\
             </settings>",
        )
        .unwrap();
    assert_eq!(
        value.field("entries"),
        Value::Map(vec![
            (Value::from("a"), entry("a", "3")),
            (Value::from("b"), entry("b", "2")),
        ])
    );

    let xml = model.marshal_to_string(&value).unwrap();
    assert_eq!(xml.matches("<entry>").count(), 2);
    assert_eq!(model.unmarshal_str(&xml).unwrap(), value);
}

#[test]
fn test_map_repeater_item_without_key() {
    let model = settings_model();
    let keyless = Element::new("entry").with_child(ComplexType::new(
        ObjectCreator::new("Entry"),
        Sequence::new().with(Element::new("value").with_child(text("value"))),
    ));
    let other = BindingModel::builder()
        .root(Root::new(
            "settings",
            "Settings",
            ComplexType::new(
                ObjectCreator::new("Settings"),
                MapRepeater::new(keyless, "key").with_accessor(FieldAccessor::new("entries")),
            ),
        ))
        .build()
        .unwrap();

    let xml = "<settings><entry><value>1</value></entry></settings>";
    assert!(model.unmarshal_str(xml).is_err());
    let err = other.unmarshal_str(xml).unwrap_err();
    assert!(matches!(err.root_cause(), Error::Mismatch(_)));
}

// =============================================================================
// Recursion and fragments
// =============================================================================

fn tree_model() -> BindingModel {
    let node = ComplexType::new(
        ObjectCreator::new("Node"),
        Sequence::new()
            .with(Element::new("label").with_child(text("label")))
            .with(
                Repeater::new(Element::new("node").with_child(Recursor::new("Node")))
                    .with_accessor(FieldAccessor::new("children"))
                    .optional(),
            ),
    )
    .named("Node");
    BindingModel::builder()
        .root(Root::new("node", "Node", node))
        .build()
        .unwrap()
}

fn node(label: &str, children: Vec<Value>) -> Value {
    Value::object("Node")
        .with("label", label)
        .with("children", Value::List(children))
}

#[test]
fn test_recursor_binds_nested_tree() {
    let model = tree_model();
    let value = model
        .unmarshal_str(
            "<node><label>a</label>\
             <node><label>b</label><node><label>c</label></node></node>\
             <node><label>d</label></node>\
             </node>",
        )
        .unwrap();

    let expected = node(
        "a",
        vec![node("b", vec![node("c", Vec::new())]), node("d", Vec::new())],
    );
    assert_eq!(value, expected);
    assert_eq!(model.unmarshal_str(&model.marshal_to_string(&value).unwrap()).unwrap(), value);
}

fn contacts_model() -> BindingModel {
    let address = Element::new("address").optional().with_child(
        ComplexType::new(
            ObjectCreator::new("Address"),
            Sequence::new()
                .with(Element::new("street").with_child(text("street")))
                .with(Element::new("city").with_child(text("city"))),
        )
        .with_accessor(FieldAccessor::new("address")),
    );
    let party = |type_name: &str| {
        ComplexType::new(
            ObjectCreator::new(type_name),
            Sequence::new()
                .with(Element::new("name").with_child(text("name")))
                .with(Reference::new("{urn:contacts}address").optional()),
        )
    };
    BindingModel::builder()
        .fragment("{urn:contacts}address", address)
        .root(Root::new("person", "Person", party("Person")))
        .root(Root::new("company", "Company", party("Company")))
        .build()
        .unwrap()
}

#[test]
fn test_reference_shares_fragment_between_roots() {
    let model = contacts_model();

    let person = model
        .unmarshal_str(
            "<person><name>Ann</name>\
             <address><street>Main 1</street><city>Springfield</city></address>\
             </person>",
        )
        .unwrap();
    assert_eq!(
        person.field("address"),
        Value::object("Address")
            .with("street", "Main 1")
            .with("city", "Springfield")
    );

    let company = model
        .unmarshal_str("<company><name>Acme</name></company>")
        .unwrap();
    assert_eq!(company, Value::object("Company").with("name", "Acme"));

    let xml = model.marshal_to_string(&company).unwrap();
    assert!(!xml.contains("<address"));
    assert_eq!(model.unmarshal_str(&xml).unwrap(), company);
    assert_eq!(model.unmarshal_str(&model.marshal_to_string(&person).unwrap()).unwrap(), person);
}

// =============================================================================
// Asymmetric bindings, actions and ambient values
// =============================================================================

fn document_model() -> BindingModel {
    let doc = ComplexType::new(
        ObjectCreator::new("Doc"),
        Sequence::new()
            .with(ElementInjector::constant("generator", "xmlbind"))
            .with(Ignore::new("generator").optional())
            .with(Element::new("title").with_child(text("title")))
            .with(Ignore::new("comment").optional()),
    );
    BindingModel::builder()
        .root(Root::new("doc", "Doc", doc))
        .build()
        .unwrap()
}

#[test]
fn test_ignore_and_injector_are_asymmetric() {
    let model = document_model();
    let value = model
        .unmarshal_str(
            "<doc><generator>other</generator><title>T</title>\
             <comment><b>nested</b> text</comment></doc>",
        )
        .unwrap();
    assert_eq!(value, Value::object("Doc").with("title", "T"));

    let xml = model.marshal_to_string(&value).unwrap();
    assert_eq!(
        xml,
        format!(
            "{}<doc><generator>xmlbind</generator><title>T</title></doc>\n",
            DECLARATION
        )
    );
    assert_eq!(model.unmarshal_str(&xml).unwrap(), value);
}

#[test]
fn test_derived_injector_sees_ambient_values() {
    let doc = ComplexType::new(
        ObjectCreator::new("Doc"),
        Sequence::new()
            .with(ElementInjector::derived("generator", |ctx: &Context| {
                Ok(ctx
                    .ambient("generator")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string())
            }))
            .with(Element::new("title").with_child(text("title"))),
    );
    let model = BindingModel::builder()
        .root(Root::new("doc", "Doc", doc))
        .build()
        .unwrap();

    let value = Value::object("Doc").with("title", "T");
    let ambient = HashMap::from([("generator".to_string(), Value::from("tests"))]);
    let bytes = model
        .marshal_with(&value, Vec::new(), WriterOptions::default(), ambient)
        .unwrap();
    let xml = String::from_utf8(bytes).unwrap();
    assert!(xml.contains("<generator>tests</generator>"));

    let xml = model.marshal_to_string(&value).unwrap();
    assert!(xml.contains("<generator>unknown</generator>"));
}

#[test]
fn test_actions_run_at_their_phases() {
    let ticket = ComplexType::new(
        ObjectCreator::new("Ticket"),
        Sequence::new().with(Element::new("title").with_child(text("title"))),
    )
    .with_action(FnAction::new(Phases::AFTER_OBJECT_CREATION, |ctx| {
        if let Some(object) = ctx.value().as_object() {
            object.set("status", Value::from("new"));
        }
        Ok(ctx)
    }))
    .with_action(FnAction::new(Phases::AFTER_UNMARSHAL, |ctx| {
        let source = ctx.ambient("source").cloned().unwrap_or(Value::Null);
        if let Some(object) = ctx.value().as_object() {
            object.set("source", source);
        }
        Ok(ctx)
    }))
    .with_action(FnAction::new(Phases::BEFORE_MARSHAL, |ctx| {
        let title = ctx.value().field("title");
        let upper = title.as_str().map(str::to_uppercase).unwrap_or_default();
        Ok(ctx.with_value(Value::object("Ticket").with("title", upper)))
    }));
    let model = BindingModel::builder()
        .root(Root::new("ticket", "Ticket", ticket))
        .build()
        .unwrap();

    let ambient = HashMap::from([("source".to_string(), Value::from("inbox"))]);
    let value = model
        .unmarshal_with(
            xmlbind::XmlSource::from_str("<ticket><title>fix it</title></ticket>"),
            ambient,
        )
        .unwrap();
    assert_eq!(
        value,
        Value::object("Ticket")
            .with("status", "new")
            .with("title", "fix it")
            .with("source", "inbox")
    );

    let xml = model.marshal_to_string(&value).unwrap();
    assert!(xml.contains("<title>FIX IT</title>"));
}

#[test]
fn test_content_action_result_reaches_enclosing_type() {
    let seen = Arc::new(std::sync::Mutex::new(String::new()));
    let seen_by_action = Arc::clone(&seen);
    let parcel = ComplexType::new(
        ObjectCreator::new("Parcel"),
        Sequence::new().with(
            Element::new("name")
                .with_child(text("name"))
                .with_action(FnAction::new(Phases::AFTER_UNMARSHAL, |ctx| {
                    let name = ctx.value().field("name");
                    Ok(ctx.with_value(Value::object("Relabelled").with("label", name)))
                })),
        ),
    )
    .with_action(FnAction::new(Phases::AFTER_UNMARSHAL, move |ctx| {
        if let Ok(mut seen) = seen_by_action.lock() {
            *seen = ctx.value().type_name().as_str().to_string();
        }
        Ok(ctx)
    }));
    let model = BindingModel::builder()
        .root(Root::new("parcel", "Parcel", parcel))
        .build()
        .unwrap();

    let value = model
        .unmarshal_str("<parcel><name>x</name></parcel>")
        .unwrap();
    assert_eq!(value, Value::object("Relabelled").with("label", "x"));
    assert_eq!(*seen.lock().unwrap(), "Relabelled");
}

#[test]
fn test_failing_action_aborts_binding() {
    let strict = ComplexType::new(
        ObjectCreator::new("Strict"),
        Sequence::new().with(Element::new("title").with_child(text("title"))),
    )
    .with_action(FnAction::new(Phases::AFTER_UNMARSHAL, |ctx| {
        if ctx.value().field("title").as_str() == Some("") {
            return Err(Error::Validation("empty title".into()));
        }
        Ok(ctx)
    }));
    let model = BindingModel::builder()
        .root(Root::new("strict", "Strict", strict))
        .build()
        .unwrap();

    assert!(model.unmarshal_str("<strict><title>ok</title></strict>").is_ok());
    let err = model
        .unmarshal_str("<strict><title></title></strict>")
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::Validation(_)));
}

// =============================================================================
// Model registry
// =============================================================================

#[test]
fn test_ambiguous_root_for_subtype() {
    let model = BindingModel::builder()
        .root(Root::new("animal", "Animal", animal("Animal")))
        .root(Root::new("pet", "Pet", animal("Pet")))
        .subtype("Cat", "Animal")
        .subtype("Cat", "Pet")
        .build()
        .unwrap();

    let err = model
        .marshal_to_string(&Value::object("Cat").with("name", "Tom"))
        .unwrap_err();
    assert!(matches!(err, Error::ModelConfiguration(_)));

    // An exact root still wins
    let xml = model
        .marshal_to_string(&Value::object("Animal").with("name", "Rex"))
        .unwrap();
    assert!(xml.contains("<animal>"));
}

#[test]
fn test_non_terminal_always_option_rejected() {
    let choice = Choice::new()
        .with(Chooser::Always, Element::new("any").with_child(animal("Animal")))
        .with(Chooser::exact("Cat"), Element::new("cat").with_child(animal("Cat")));
    let result = BindingModel::builder()
        .root(Root::new(
            "zoo",
            "Zoo",
            ComplexType::new(ObjectCreator::new("Zoo"), choice),
        ))
        .build();
    assert!(matches!(result, Err(Error::ModelConfiguration(_))));
}

#[test]
fn test_model_shared_across_threads() {
    let model = Arc::new(person_model());
    let names: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let model = Arc::clone(&model);
                scope.spawn(move || {
                    let xml = format!("<person><name>user{}</name></person>", i);
                    let value = model.unmarshal_str(&xml).unwrap();
                    let name = value.field("name").to_string();
                    let written = model.marshal_to_string(&value).unwrap();
                    assert!(written.contains(&name));
                    name
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(names, vec!["user0", "user1", "user2", "user3"]);
}
