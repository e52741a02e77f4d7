//! xmlbind - declarative XML to object graph binding
//!
//! This library binds XML documents to object graphs and back, driven by a
//! binding tree that is built once and reused for many documents.
//!
//! # Overview
//!
//! A [`BindingModel`] registers root bindings by document element name and
//! named fragments by identifier. Each root holds a tree of [`Binding`]
//! nodes: elements, sequences, choices, repeaters, complex and simple types,
//! and indirections for shared and recursive definitions.
//!
//! Reading pulls events from a forward-only source through a
//! [`RecordingReader`], which can mark a position, read ahead and rewind.
//! That is what lets optional and alternative bindings try a fragment and
//! back out, and lets a complex type read its constructor arguments before
//! binding its content. Writing goes through a [`StreamWriter`] that assigns
//! namespace prefixes as it goes; choices pick their option with a
//! [`Chooser`] instead of lookahead.
//!
//! # Key Features
//!
//! - Nested mark/rewind over any event source, with replay identical to the
//!   original read
//! - Optional children and alternatives with backtracking
//! - Recursive definitions without cycles in the static tree
//! - Constructor arguments read ahead of the content they come from
//! - Build-time validation of the model
//!
//! # Example
//!
//! ```
//! use xmlbind::{
//!     BindingModel, ComplexType, Element, FieldAccessor, ObjectCreator, Root, Sequence,
//!     SimpleType, StringConverter, Value,
//! };
//!
//! let person = ComplexType::new(
//!     ObjectCreator::new("Person"),
//!     Sequence::new().with(
//!         Element::new("name").with_child(
//!             SimpleType::new(StringConverter).with_accessor(FieldAccessor::new("name")),
//!         ),
//!     ),
//! );
//! let model = BindingModel::builder()
//!     .root(Root::new("person", "Person", person))
//!     .build()
//!     .unwrap();
//!
//! let value = model.unmarshal_str("<person><name>Ann</name></person>").unwrap();
//! assert_eq!(value.field("name"), Value::from("Ann"));
//! ```

pub mod binding;
pub mod chooser;
pub mod collab;
pub mod context;
pub mod error;
pub mod model;
pub mod value;
pub mod xml;

// Re-export commonly used types
pub use binding::{
    Attribute, Binding, Choice, ChoiceOption, ComplexType, Element, ElementInjector, Ignore,
    Injected, MapRepeater, Outcome, Recursor, Reference, Repeater, Root, Scope, Sequence,
    SimpleArgument, SimpleType,
};
pub use chooser::Chooser;
pub use collab::{
    Accessor, Action, BoolConverter, Converter, Creator, FieldAccessor, FloatConverter,
    FnAction, FnCreator, IntConverter, ObjectCreator, Phases, StringConverter,
};
pub use context::{Arguments, Context, Journal};
pub use error::{Error, Result};
pub use model::{BindingModel, BindingModelBuilder};
pub use value::{Object, ObjectRef, TypeHierarchy, TypeName, Value};
pub use xml::{
    EventSource, Marker, QName, ReaderOptions, RecordingReader, StreamWriter, Tag, WriterOptions,
    XmlEvent, XmlSource,
};
