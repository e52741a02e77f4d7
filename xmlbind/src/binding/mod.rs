//! Binding nodes.
//!
//! A binding tree describes how an XML fragment maps to a fragment of the
//! object graph. Every node kind knows how to bind its fragment from a
//! [`RecordingReader`] and how to write it to a [`StreamWriter`].
//!
//! # Traversal conventions
//!
//! - When a node's `unmarshal` is called, the next tag to read is the first
//!   tag of the node's fragment. Leaves that bind element text ([`SimpleType`],
//!   [`SimpleArgument`]) are the exception: they run while the reader is
//!   positioned on the start tag of their enclosing element, and consume
//!   through its end tag.
//! - A node returning [`Outcome::NoMatch`] may have consumed events and set
//!   fields. Whoever recovers from a `NoMatch` abandons the [`Attempt`] it
//!   began: the reader rewinds and the context's journal rolls back.
//! - Errors are annotated with the description of each naming node they pass
//!   through (see [`Error::within`](crate::Error::within)).
//!
//! Named fragments ([`Reference`]) and recursive definitions ([`Recursor`])
//! are resolved at traversal time, through the model and the [`Scope`] chain
//! respectively, so the static tree never contains cycles.

mod choice;
mod complex;
mod element;
mod ignore;
mod reference;
mod repeater;
mod root;
mod sequence;
mod simple;

pub use choice::{Choice, ChoiceOption};
pub use complex::ComplexType;
pub use element::{Attribute, Element};
pub use ignore::{ElementInjector, Ignore, Injected};
pub use reference::{Recursor, Reference};
pub use repeater::{MapRepeater, Repeater};
pub use root::Root;
pub use sequence::Sequence;
pub use simple::{SimpleArgument, SimpleType};

use std::io::Write;
use std::sync::Arc;

use crate::collab::Accessor;
use crate::context::Context;
use crate::error::Result;
use crate::model::BindingModel;
use crate::value::{TypeName, Value};
use crate::xml::{EventSource, Marker, RecordingReader, StreamWriter};

/// Result of an attempt to bind a fragment.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The fragment was bound; carries the context to continue with.
    Bound(Context),
    /// The node does not apply at this position. Not an error.
    NoMatch,
}

impl Outcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Bound(_))
    }
}

/// A node of a binding tree.
///
/// [`Root`] is not a variant: roots are the entry points of a model,
/// registered with [`BindingModelBuilder::root`](crate::BindingModelBuilder::root),
/// and are never nested inside another node.
///
/// ```
/// use xmlbind::{Binding, BindingModel, Element, Root, Sequence};
///
/// let content: Binding = Sequence::new().with(Element::new("item").optional()).into();
/// assert!(content.is_optional());
///
/// let model = BindingModel::builder()
///     .root(Root::new("doc", "Doc", content))
///     .build()
///     .unwrap();
/// assert_eq!(model.roots().len(), 1);
/// ```
#[derive(Debug)]
pub enum Binding {
    Sequence(Sequence),
    Choice(Choice),
    Element(Element),
    Repeater(Repeater),
    MapRepeater(MapRepeater),
    Recursor(Recursor),
    Reference(Reference),
    ComplexType(ComplexType),
    SimpleType(SimpleType),
    SimpleArgument(SimpleArgument),
    Ignore(Ignore),
    ElementInjector(ElementInjector),
}

impl Binding {
    /// Binds this node's fragment from the stream.
    pub fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
    ) -> Result<Outcome> {
        match self {
            Binding::Sequence(b) => b.unmarshal(reader, context, scope),
            Binding::Choice(b) => b.unmarshal(reader, context, scope),
            Binding::Element(b) => b.unmarshal(reader, context, scope),
            Binding::Repeater(b) => b.unmarshal(reader, context, scope),
            Binding::MapRepeater(b) => b.unmarshal(reader, context, scope),
            Binding::Recursor(b) => b.unmarshal(reader, context, scope),
            Binding::Reference(b) => b.unmarshal(reader, context, scope),
            Binding::ComplexType(b) => b.unmarshal(reader, context, scope),
            Binding::SimpleType(b) => b.unmarshal(reader, context),
            Binding::SimpleArgument(b) => b.unmarshal(reader, context),
            Binding::Ignore(b) => b.unmarshal(reader, context),
            Binding::ElementInjector(_) => Ok(Outcome::Bound(context)),
        }
    }

    /// Writes this node's fragment for the value of `context`.
    pub fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<()> {
        match self {
            Binding::Sequence(b) => b.marshal(writer, context, scope),
            Binding::Choice(b) => b.marshal(writer, context, scope),
            Binding::Element(b) => b.marshal(writer, context, scope),
            Binding::Repeater(b) => b.marshal(writer, context, scope),
            Binding::MapRepeater(b) => b.marshal(writer, context, scope),
            Binding::Recursor(b) => b.marshal(writer, context, scope),
            Binding::Reference(b) => b.marshal(writer, context, scope),
            Binding::ComplexType(b) => b.marshal(writer, context, scope),
            Binding::SimpleType(b) => b.marshal(writer, context),
            Binding::SimpleArgument(b) => b.marshal(writer, context),
            Binding::Ignore(_) => Ok(()),
            Binding::ElementInjector(b) => b.marshal(writer, context),
        }
    }

    /// Returns true if the fragment may be absent from a document.
    pub fn is_optional(&self) -> bool {
        match self {
            Binding::Sequence(b) => b.children().iter().all(Binding::is_optional),
            Binding::Choice(b) => b.is_optional(),
            Binding::Element(b) => b.is_optional(),
            Binding::Repeater(b) => b.is_optional(),
            Binding::MapRepeater(b) => b.is_optional(),
            Binding::Recursor(b) => b.is_optional(),
            Binding::Reference(b) => b.is_optional(),
            Binding::ComplexType(b) => b.content().is_optional(),
            Binding::SimpleType(_) | Binding::SimpleArgument(_) => false,
            Binding::Ignore(b) => b.is_optional(),
            Binding::ElementInjector(_) => true,
        }
    }

    /// Returns true if marshalling `context` would write something.
    pub fn has_value(&self, context: &Context, scope: &Scope<'_>) -> Result<bool> {
        match self {
            Binding::Sequence(b) => {
                for child in b.children() {
                    if child.has_value(context, scope)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Binding::Choice(b) => b.has_value(context, scope),
            Binding::Element(b) => b.has_value(context, scope),
            Binding::Repeater(b) => b.has_value(context),
            Binding::MapRepeater(b) => b.has_value(context),
            Binding::Recursor(b) => b.has_value(context, scope),
            Binding::Reference(b) => b.has_value(context, scope),
            Binding::ComplexType(b) => Ok(!b.value_of(context)?.is_null()),
            Binding::SimpleType(b) => Ok(!b.value_of(context)?.is_null()),
            Binding::SimpleArgument(b) => Ok(!b.value_of(context)?.is_null()),
            Binding::Ignore(_) => Ok(false),
            Binding::ElementInjector(_) => Ok(true),
        }
    }

    /// Short description used in error messages and logs.
    pub fn describe(&self) -> String {
        match self {
            Binding::Sequence(_) => "sequence".to_string(),
            Binding::Choice(_) => "choice".to_string(),
            Binding::Element(b) => format!("element <{}>", b.name()),
            Binding::Repeater(b) => format!("repeater of {}", b.item().describe()),
            Binding::MapRepeater(b) => format!("map repeater of {}", b.item().describe()),
            Binding::Recursor(b) => format!("recursor to {}", b.target()),
            Binding::Reference(b) => format!("reference to {}", b.key()),
            Binding::ComplexType(b) => b.describe(),
            Binding::SimpleType(b) => format!("simple type {}", b.value_type()),
            Binding::SimpleArgument(b) => format!("argument {}", b.parameter()),
            Binding::Ignore(b) => match b.name() {
                Some(name) => format!("ignored <{}>", name),
                None => "ignored element".to_string(),
            },
            Binding::ElementInjector(b) => format!("injected <{}>", b.name()),
        }
    }

    /// Direct children in the static tree. References and recursors have
    /// none; they are resolved at traversal time.
    pub fn children(&self) -> Vec<&Binding> {
        match self {
            Binding::Sequence(b) => b.children().iter().collect(),
            Binding::Choice(b) => b.options().iter().map(ChoiceOption::binding).collect(),
            Binding::Element(b) => b.child().into_iter().collect(),
            Binding::Repeater(b) => vec![b.item()],
            Binding::MapRepeater(b) => vec![b.item()],
            Binding::ComplexType(b) => vec![b.content()],
            Binding::Recursor(_)
            | Binding::Reference(_)
            | Binding::SimpleType(_)
            | Binding::SimpleArgument(_)
            | Binding::Ignore(_)
            | Binding::ElementInjector(_) => Vec::new(),
        }
    }
}

macro_rules! impl_from_binding {
    ($($kind:ident),* $(,)?) => {
        $(
            impl From<$kind> for Binding {
                fn from(binding: $kind) -> Self {
                    Binding::$kind(binding)
                }
            }
        )*
    };
}

impl_from_binding!(
    Sequence,
    Choice,
    Element,
    Repeater,
    MapRepeater,
    Recursor,
    Reference,
    ComplexType,
    SimpleType,
    SimpleArgument,
    Ignore,
    ElementInjector,
);

/// An ancestor on the traversal path.
#[derive(Debug, Clone, Copy)]
enum Frame<'a> {
    Root(&'a Root),
    Complex(&'a ComplexType),
}

/// The chain of enclosing roots and complex types during a traversal.
///
/// Nodes use it to resolve properties inherited from their ancestors, such
/// as the bound type or the definition a [`Recursor`] points back to.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    model: &'a BindingModel,
    frame: Option<Frame<'a>>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(model: &'a BindingModel) -> Self {
        Scope {
            model,
            frame: None,
            parent: None,
        }
    }

    pub fn model(&self) -> &'a BindingModel {
        self.model
    }

    pub(crate) fn enter_root(&'a self, root: &'a Root) -> Scope<'a> {
        self.push(Frame::Root(root))
    }

    pub(crate) fn enter_complex(&'a self, complex: &'a ComplexType) -> Scope<'a> {
        self.push(Frame::Complex(complex))
    }

    fn push(&'a self, frame: Frame<'a>) -> Scope<'a> {
        Scope {
            model: self.model,
            frame: Some(frame),
            parent: Some(self),
        }
    }

    fn frames(&self) -> impl Iterator<Item = Frame<'a>> + '_ {
        std::iter::successors(Some(self), |scope| scope.parent).filter_map(|scope| scope.frame)
    }

    /// Finds the nearest enclosing complex type with the given name.
    pub fn find_complex(&self, name: &str) -> Option<&'a ComplexType> {
        self.frames().find_map(|frame| match frame {
            Frame::Complex(complex) if complex.name() == Some(name) => Some(complex),
            _ => None,
        })
    }

    /// Returns the type bound by the nearest enclosing complex type or root.
    pub fn bound_type(&self) -> Option<TypeName> {
        self.frames().next().map(|frame| match frame {
            Frame::Root(root) => root.type_name().clone(),
            Frame::Complex(complex) => complex.value_type(),
        })
    }

    /// Number of enclosing frames.
    pub fn depth(&self) -> usize {
        self.frames().count()
    }
}

/// A position to return to when an attempt does not match: a reader marker
/// and the length of the undo journal when the attempt began.
pub(crate) struct Attempt {
    marker: Marker,
    undo_mark: usize,
}

impl Attempt {
    pub(crate) fn begin<S: EventSource>(reader: &mut RecordingReader<S>, context: &Context) -> Self {
        Attempt {
            marker: reader.start_recording(),
            undo_mark: context.journal().len(),
        }
    }

    /// Returns true if events were read since the attempt began.
    pub(crate) fn consumed<S: EventSource>(&self, reader: &RecordingReader<S>) -> Result<bool> {
        Ok(reader.recorded_since(self.marker)? > 0)
    }

    /// Keeps what the attempt read and bound.
    pub(crate) fn commit<S: EventSource>(
        self,
        reader: &mut RecordingReader<S>,
        context: &Context,
    ) -> Result<()> {
        reader.stop_recording(self.marker)?;
        if !reader.is_recording() {
            context.journal().forget();
        }
        Ok(())
    }

    /// Rewinds the reader and undoes the changes made since the attempt
    /// began.
    pub(crate) fn abandon<S: EventSource>(
        self,
        reader: &mut RecordingReader<S>,
        context: &Context,
    ) -> Result<()> {
        reader.rewind_and_playback(self.marker)?;
        context.journal().rollback(self.undo_mark);
        Ok(())
    }
}

/// Sets a value through an accessor, journaling the target object first.
pub(crate) fn set_through(
    accessor: &Arc<dyn Accessor>,
    context: &Context,
    value: Value,
) -> Result<bool> {
    if let Value::Object(object) = context.value() {
        context.journal().record_object(object);
    }
    accessor.set(context, value)
}

/// Reads the value a node binds: the accessed property if the node has an
/// accessor, otherwise the current value.
pub(crate) fn accessed_value(
    accessor: Option<&Arc<dyn Accessor>>,
    context: &Context,
) -> Result<Value> {
    match accessor {
        Some(accessor) => Ok(accessor.get(context)?.into_value()),
        None => Ok(context.value().clone()),
    }
}

/// Applies a bound value: through the accessor onto the current value, or
/// by making it the current value. Nothing is applied during a pre-read.
pub(crate) fn apply_value(
    accessor: Option<&Arc<dyn Accessor>>,
    context: Context,
    value: Value,
) -> Result<Context> {
    if context.is_pre_read() {
        return Ok(context);
    }
    match accessor {
        Some(accessor) => {
            if !set_through(accessor, &context, value)? {
                tracing::debug!(
                    target_type = %context.value().type_name(),
                    ?accessor,
                    "accessor not applied"
                );
            }
            Ok(context)
        }
        None => Ok(context.with_value(value)),
    }
}
