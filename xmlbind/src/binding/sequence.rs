//! Ordered composite bindings.

use std::io::Write;

use tracing::trace;

use super::{Attempt, Binding, Outcome, Scope};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::xml::{EventSource, RecordingReader, StreamWriter};

/// Binds its children in declaration order.
///
/// Each child is attempted under a marker. An optional child that does not
/// match is rewound and skipped, and whatever it set is undone. A required child that does not match makes
/// the whole sequence a non-match if nothing was consumed yet, so enclosing
/// choices can try their next option; after that it is an error.
#[derive(Debug, Default)]
pub struct Sequence {
    children: Vec<Binding>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a child.
    pub fn with(mut self, child: impl Into<Binding>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(&self) -> &[Binding] {
        &self.children
    }

    pub(crate) fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        mut context: Context,
        scope: &Scope<'_>,
    ) -> Result<Outcome> {
        let mut consumed = false;
        for child in &self.children {
            let attempt = Attempt::begin(reader, &context);
            match child.unmarshal(reader, context.clone(), scope)? {
                Outcome::Bound(bound) => {
                    consumed |= attempt.consumed(reader)?;
                    attempt.commit(reader, &bound)?;
                    context = bound;
                }
                Outcome::NoMatch => {
                    attempt.abandon(reader, &context)?;
                    if child.is_optional() {
                        trace!(child = %child.describe(), "optional child absent");
                        continue;
                    }
                    if !consumed {
                        return Ok(Outcome::NoMatch);
                    }
                    let within = scope
                        .bound_type()
                        .map(|t| format!(" in {}", t))
                        .unwrap_or_default();
                    return Err(Error::Mismatch(format!(
                        "missing required {}{}",
                        child.describe(),
                        within
                    )));
                }
            }
        }
        Ok(Outcome::Bound(context))
    }

    pub(crate) fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<()> {
        for child in &self.children {
            child.marshal(writer, context, scope)?;
        }
        Ok(())
    }
}
