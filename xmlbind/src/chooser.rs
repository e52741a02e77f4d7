//! Choosers select the option of a choice that writes a value.
//!
//! A chooser is a pure predicate over the value being written (and, if it
//! needs to, the ambient values of the run). Choosers are only evaluated when
//! marshalling; unmarshalling tries options against the stream instead.

use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::value::{TypeHierarchy, TypeName, Value};

type ChooseFn = dyn Fn(&Value, &Context) -> bool + Send + Sync;

/// Predicate deciding whether a choice option writes a value.
#[derive(Clone)]
pub enum Chooser {
    /// The value's type is exactly the given type.
    ExactType(TypeName),
    /// The value's type is the given type or one of its declared subtypes.
    AssignableType(TypeName),
    /// The named field of the value is not null.
    PropertyNonNull(String),
    /// The named field of the value is a non-empty list or map.
    PropertyNonEmptyCollection(String),
    /// Never selected. Marks options that only exist for reading.
    Never,
    /// Always selected. Only valid as the last option of a choice.
    Always,
    /// Arbitrary predicate.
    Custom(Arc<ChooseFn>),
}

impl Chooser {
    pub fn exact(type_name: impl Into<TypeName>) -> Self {
        Chooser::ExactType(type_name.into())
    }

    pub fn assignable(type_name: impl Into<TypeName>) -> Self {
        Chooser::AssignableType(type_name.into())
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&Value, &Context) -> bool + Send + Sync + 'static,
    {
        Chooser::Custom(Arc::new(predicate))
    }

    /// Returns true if the option guarded by this chooser writes `value`.
    pub fn matches(&self, value: &Value, context: &Context, types: &TypeHierarchy) -> bool {
        match self {
            Chooser::ExactType(expected) => &value.type_name() == expected,
            Chooser::AssignableType(expected) => {
                !value.is_null() && types.is_assignable(&value.type_name(), expected)
            }
            Chooser::PropertyNonNull(field) => !value.field(field).is_null(),
            Chooser::PropertyNonEmptyCollection(field) => {
                value.field(field).is_non_empty_collection()
            }
            Chooser::Never => false,
            Chooser::Always => true,
            Chooser::Custom(predicate) => predicate(value, context),
        }
    }
}

impl fmt::Debug for Chooser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chooser::ExactType(t) => write!(f, "ExactType({})", t),
            Chooser::AssignableType(t) => write!(f, "AssignableType({})", t),
            Chooser::PropertyNonNull(p) => write!(f, "PropertyNonNull({})", p),
            Chooser::PropertyNonEmptyCollection(p) => {
                write!(f, "PropertyNonEmptyCollection({})", p)
            }
            Chooser::Never => f.write_str("Never"),
            Chooser::Always => f.write_str("Always"),
            Chooser::Custom(_) => f.write_str("Custom"),
        }
    }
}
