//! Asymmetric bindings: skipped input and injected output.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use tracing::trace;

use super::Outcome;
use crate::context::Context;
use crate::error::Result;
use crate::xml::{EventSource, QName, RecordingReader, StreamWriter, Tag};

/// Consumes and discards an element subtree. Writes nothing.
#[derive(Debug, Clone)]
pub struct Ignore {
    name: Option<QName>,
    optional: bool,
}

impl Ignore {
    /// Ignores elements with the given name.
    pub fn new(name: impl Into<QName>) -> Self {
        Ignore {
            name: Some(name.into()),
            optional: false,
        }
    }

    /// Ignores any one element.
    pub fn any() -> Self {
        Ignore {
            name: None,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn name(&self) -> Option<&QName> {
        self.name.as_ref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub(crate) fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
    ) -> Result<Outcome> {
        if reader.next_tag()? != Tag::Start {
            return Ok(Outcome::NoMatch);
        }
        if let Some(name) = &self.name {
            if reader.name()? != name {
                return Ok(Outcome::NoMatch);
            }
        }
        trace!(element = %reader.name()?, "ignoring element");
        reader.skip_element()?;
        Ok(Outcome::Bound(context))
    }
}

type DeriveFn = dyn Fn(&Context) -> Result<String> + Send + Sync;

/// Text written by an [`ElementInjector`].
#[derive(Clone)]
pub enum Injected {
    Constant(String),
    /// Computed from the context being written.
    Derived(Arc<DeriveFn>),
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Injected::Constant(text) => f.debug_tuple("Constant").field(text).finish(),
            Injected::Derived(_) => f.write_str("Derived"),
        }
    }
}

/// Writes an element with constant or derived text. Reads nothing.
#[derive(Debug, Clone)]
pub struct ElementInjector {
    name: QName,
    value: Injected,
}

impl ElementInjector {
    pub fn constant(name: impl Into<QName>, text: impl Into<String>) -> Self {
        ElementInjector {
            name: name.into(),
            value: Injected::Constant(text.into()),
        }
    }

    pub fn derived<F>(name: impl Into<QName>, derive: F) -> Self
    where
        F: Fn(&Context) -> Result<String> + Send + Sync + 'static,
    {
        ElementInjector {
            name: name.into(),
            value: Injected::Derived(Arc::new(derive)),
        }
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub(crate) fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
    ) -> Result<()> {
        let text = match &self.value {
            Injected::Constant(text) => text.clone(),
            Injected::Derived(derive) => {
                derive(context).map_err(|e| e.within(format!("injected <{}>", self.name)))?
            }
        };
        writer.write_element(&self.name, false)?;
        if !text.is_empty() {
            writer.write_content(&text)?;
        }
        writer.close_element(&self.name)
    }
}
