//! Example: Bind an address book to objects and write it back
//!
//! This example builds a small binding model with a repeated complex type,
//! an optional element and a constructor argument, reads a document into an
//! object graph, changes it, and writes it out again.
//!
//! Usage: cargo run --example person [file.xml]

use std::env;
use std::fs;
use std::io;

use xmlbind::{
    Attribute, BindingModel, ComplexType, Element, FieldAccessor, IntConverter, ObjectCreator,
    Repeater, Root, Sequence, SimpleArgument, SimpleType, StringConverter, Value, WriterOptions,
};

const SAMPLE: &str = r#"<addressBook>
  <person id="1">
    <name>Ann</name>
    <email>ann@example.org</email>
  </person>
  <person id="2">
    <name>Bob</name>
  </person>
</addressBook>"#;

fn build_model() -> xmlbind::Result<BindingModel> {
    let person = ComplexType::new(
        ObjectCreator::new("Person").with_parameters(["name"]),
        Sequence::new()
            .with(Element::new("name").with_child(SimpleArgument::new("name", StringConverter)))
            .with(
                Element::new("email").optional().with_child(
                    SimpleType::new(StringConverter).with_accessor(FieldAccessor::new("email")),
                ),
            ),
    )
    .with_attribute(Attribute::new("id", FieldAccessor::new("id"), IntConverter));

    let book = ComplexType::new(
        ObjectCreator::new("AddressBook"),
        Repeater::new(Element::new("person").with_child(person))
            .with_accessor(FieldAccessor::new("people"))
            .optional(),
    );

    BindingModel::builder()
        .root(Root::new("addressBook", "AddressBook", book))
        .build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let xml = match env::args().nth(1) {
        Some(path) => fs::read_to_string(path)?,
        None => SAMPLE.to_string(),
    };

    let model = build_model()?;
    let book = model.unmarshal_str(&xml)?;

    if let Some(people) = book.field("people").as_list() {
        for person in people {
            eprintln!("Read {} <{}>", person.field("name"), person.field("email"));
        }
    }

    // Add a person and write the result
    let carol = Value::object("Person")
        .with("id", 3i64)
        .with("name", "Carol");
    let mut people = book.field("people").as_list().map(<[Value]>::to_vec).unwrap_or_default();
    people.push(carol);
    if let Some(object) = book.as_object() {
        object.set("people", Value::List(people));
    }

    let options = WriterOptions {
        pretty_print: true,
        xml_declaration: true,
    };
    model.marshal_with(&book, io::stdout(), options, Default::default())?;
    Ok(())
}
