//! Indirections resolved at traversal time.

use std::io::Write;
use std::sync::Arc;

use super::{ComplexType, Outcome, Scope};
use crate::collab::Accessor;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::xml::{EventSource, QName, RecordingReader, StreamWriter};

/// Refers back to an enclosing named [`ComplexType`].
///
/// The target is looked up along the scope chain each time the node is
/// traversed, so a definition can contain itself without the static tree
/// being cyclic. The instance is applied through the recursor's own
/// accessor, not the one the target has at its original position.
#[derive(Debug)]
pub struct Recursor {
    target: String,
    accessor: Option<Arc<dyn Accessor>>,
    optional: bool,
}

impl Recursor {
    pub fn new(target: impl Into<String>) -> Self {
        Recursor {
            target: target.into(),
            accessor: None,
            optional: false,
        }
    }

    pub fn with_accessor(mut self, accessor: impl Accessor + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Name of the complex type this node refers to.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    fn resolve<'a>(&self, scope: &Scope<'a>) -> Result<&'a ComplexType> {
        scope.find_complex(&self.target).ok_or_else(|| {
            Error::ModelConfiguration(format!(
                "recursor target {} is not an enclosing complex type",
                self.target
            ))
        })
    }

    pub(crate) fn has_value(&self, context: &Context, scope: &Scope<'_>) -> Result<bool> {
        let value = match &self.accessor {
            Some(accessor) => accessor.get(context)?.into_value(),
            None => context.value().clone(),
        };
        Ok(!value.is_null() && self.resolve(scope).is_ok())
    }

    pub(crate) fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
    ) -> Result<Outcome> {
        self.resolve(scope)?
            .bind(reader, context, scope, self.accessor.as_ref())
    }

    pub(crate) fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<()> {
        self.resolve(scope)?
            .write(writer, context, scope, self.accessor.as_ref())
    }
}

/// Refers to a named fragment registered on the model.
///
/// Fragments are shared by every reference to them; the fragment binds in
/// the scope of whichever reference is being traversed.
#[derive(Debug, Clone)]
pub struct Reference {
    key: QName,
    optional: bool,
}

impl Reference {
    /// Creates a reference to the fragment registered under `key`, an
    /// identifier in Clark notation (`{namespace}id` or plain `id`).
    pub fn new(key: impl Into<QName>) -> Self {
        Reference {
            key: key.into(),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn key(&self) -> &QName {
        &self.key
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub(crate) fn has_value(&self, context: &Context, scope: &Scope<'_>) -> Result<bool> {
        scope.model().fragment(&self.key)?.has_value(context, scope)
    }

    pub(crate) fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
    ) -> Result<Outcome> {
        scope
            .model()
            .fragment(&self.key)?
            .unmarshal(reader, context, scope)
    }

    pub(crate) fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let fragment = scope.model().fragment(&self.key)?;
        if self.optional && !fragment.has_value(context, scope)? {
            return Ok(());
        }
        fragment
            .marshal(writer, context, scope)
            .map_err(|e| e.within(format!("fragment {}", self.key)))
    }
}
