//! Collaborators plugged into binding nodes.
//!
//! Binding nodes never construct objects, read properties or parse scalar
//! text themselves. They go through the narrow traits in this module, which
//! are supplied when the binding model is built. The submodules provide
//! built-in implementations over the dynamic [`Value`] model.

mod accessor;
mod action;
mod converter;
mod creator;

pub use accessor::FieldAccessor;
pub use action::{run_actions, FnAction};
pub use converter::{BoolConverter, FloatConverter, IntConverter, StringConverter};
pub use creator::{FnCreator, ObjectCreator};

use std::fmt;

use bitflags::bitflags;

use crate::context::Context;
use crate::error::Result;
use crate::value::{TypeName, Value};

/// Reads and writes one property of the current value.
pub trait Accessor: fmt::Debug + Send + Sync {
    /// Returns a context for the property value of `context`'s value.
    fn get(&self, context: &Context) -> Result<Context>;

    /// Sets the property on `context`'s value. Returns false if the value
    /// cannot hold the property.
    fn set(&self, context: &Context, value: Value) -> Result<bool>;
}

/// Creates instances of a bound type.
pub trait Creator: fmt::Debug + Send + Sync {
    /// Creates an instance. `arguments` holds one value per entry of
    /// [`parameters`](Creator::parameters), in the same order.
    fn new_instance(&self, arguments: &[Value]) -> Result<Value>;

    /// The type of the instances created.
    fn value_type(&self) -> TypeName;

    /// Names of the constructor parameters, if any.
    fn parameters(&self) -> &[String] {
        &[]
    }
}

/// Converts between element or attribute text and scalar values.
pub trait Converter: fmt::Debug + Send + Sync {
    /// Parses text. Rejected text is a validation error.
    fn to_value(&self, text: &str) -> Result<Value>;

    /// Formats a value.
    fn to_text(&self, value: &Value) -> Result<String>;

    /// The type of the values produced.
    fn value_type(&self) -> TypeName;
}

bitflags! {
    /// Points of a traversal at which actions run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Phases: u8 {
        /// Before a value is written.
        const BEFORE_MARSHAL = 1;
        /// After a value is written.
        const AFTER_MARSHAL = 1 << 1;
        /// Before content is read.
        const BEFORE_UNMARSHAL = 1 << 2;
        /// After an instance was created, before its content is bound.
        const AFTER_OBJECT_CREATION = 1 << 3;
        /// After content is read and bound.
        const AFTER_UNMARSHAL = 1 << 4;
    }
}

/// A callback run by binding nodes at well-defined phases.
pub trait Action: fmt::Debug + Send + Sync {
    /// Runs the action, returning the context to continue with.
    fn execute(&self, context: Context) -> Result<Context>;

    /// Returns true if the action runs at `phase`.
    fn applies_at(&self, phase: Phases) -> bool;
}
