//! Alternative bindings.

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, trace};

use super::{apply_value, Attempt, Binding, Outcome, Scope};
use crate::chooser::Chooser;
use crate::collab::Accessor;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::xml::{EventSource, RecordingReader, StreamWriter};

/// One alternative of a [`Choice`].
#[derive(Debug)]
pub struct ChoiceOption {
    chooser: Chooser,
    binding: Binding,
}

impl ChoiceOption {
    pub fn new(chooser: Chooser, binding: impl Into<Binding>) -> Self {
        ChoiceOption {
            chooser,
            binding: binding.into(),
        }
    }

    pub fn chooser(&self) -> &Chooser {
        &self.chooser
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }
}

/// Binds exactly one of several alternatives.
///
/// Reading tries the options in declaration order, each under a marker, and
/// commits to the first one that matches. Writing asks each option's
/// [`Chooser`] instead, so no lookahead is involved. With an accessor, the
/// options bind the accessed property rather than the current value.
#[derive(Debug, Default)]
pub struct Choice {
    options: Vec<ChoiceOption>,
    accessor: Option<Arc<dyn Accessor>>,
    optional: bool,
}

impl Choice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an option.
    pub fn with(mut self, chooser: Chooser, binding: impl Into<Binding>) -> Self {
        self.options.push(ChoiceOption::new(chooser, binding));
        self
    }

    pub fn with_accessor(mut self, accessor: impl Accessor + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn options(&self) -> &[ChoiceOption] {
        &self.options
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Context the options operate on.
    fn option_context(&self, context: &Context) -> Result<Context> {
        match &self.accessor {
            Some(accessor) => accessor.get(context),
            None => Ok(context.clone()),
        }
    }

    /// Returns the first option whose chooser accepts the value of `context`.
    fn select(&self, context: &Context, scope: &Scope<'_>) -> Option<(usize, &ChoiceOption)> {
        let types = scope.model().types();
        self.options
            .iter()
            .enumerate()
            .find(|(_, option)| option.chooser.matches(context.value(), context, types))
    }

    pub(crate) fn has_value(&self, context: &Context, scope: &Scope<'_>) -> Result<bool> {
        let target = self.option_context(context)?;
        match self.select(&target, scope) {
            Some((_, option)) => option.binding.has_value(&target, scope),
            None => Ok(false),
        }
    }

    pub(crate) fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
    ) -> Result<Outcome> {
        let target = self.option_context(&context)?;
        for (index, option) in self.options.iter().enumerate() {
            let attempt = Attempt::begin(reader, &target);
            match option.binding.unmarshal(reader, target.clone(), scope)? {
                Outcome::Bound(bound) => {
                    attempt.commit(reader, &bound)?;
                    debug!(option = index, binding = %option.binding.describe(), "choice option matched");
                    let context = match &self.accessor {
                        Some(_) => apply_value(self.accessor.as_ref(), context, bound.into_value())?,
                        None => bound,
                    };
                    return Ok(Outcome::Bound(context));
                }
                Outcome::NoMatch => {
                    trace!(option = index, "choice option rejected");
                    attempt.abandon(reader, &target)?;
                }
            }
        }
        Ok(Outcome::NoMatch)
    }

    pub(crate) fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let target = self.option_context(context)?;
        match self.select(&target, scope) {
            Some((index, option)) => {
                debug!(option = index, chooser = ?option.chooser, "choice option selected");
                option.binding.marshal(writer, &target, scope)
            }
            None if self.optional => Ok(()),
            None => Err(Error::Mismatch(format!(
                "no choice option accepts a value of type {}",
                target.value().type_name()
            ))
            .within("choice")),
        }
    }
}
