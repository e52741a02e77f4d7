//! Complex type bindings.

use std::io::Write;
use std::sync::Arc;

use tracing::debug;

use super::element::Attribute;
use super::{accessed_value, apply_value, Attempt, Binding, Outcome, Scope};
use crate::collab::{run_actions, Accessor, Action, Creator, Phases};
use crate::context::{Arguments, Context, Mode};
use crate::error::{Error, Result};
use crate::value::{TypeName, Value};
use crate::xml::{EventSource, RecordingReader, StreamWriter};

/// A subtree bound to a constructed type.
///
/// The instance is created by the [`Creator`] and its content is bound by
/// the content binding. A complex type can be named, which makes it a target
/// for [`Recursor`](super::Recursor) nodes in its subtree.
///
/// When the creator declares constructor parameters, the content is read
/// twice: first in a pre-read that only collects the values of
/// [`SimpleArgument`](super::SimpleArgument) leaves, then, after rewinding,
/// for real on the instance created from those arguments.
#[derive(Debug)]
pub struct ComplexType {
    name: Option<String>,
    creator: Arc<dyn Creator>,
    content: Box<Binding>,
    accessor: Option<Arc<dyn Accessor>>,
    attributes: Vec<Attribute>,
    actions: Vec<Arc<dyn Action>>,
}

impl ComplexType {
    pub fn new(creator: impl Creator + 'static, content: impl Into<Binding>) -> Self {
        ComplexType {
            name: None,
            creator: Arc::new(creator),
            content: Box::new(content.into()),
            accessor: None,
            attributes: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Names the type, so recursors can refer back to it.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_accessor(mut self, accessor: impl Accessor + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    /// Adds an attribute of the enclosing element, bound on the instance.
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn content(&self) -> &Binding {
        &self.content
    }

    pub fn creator(&self) -> &dyn Creator {
        self.creator.as_ref()
    }

    pub fn value_type(&self) -> TypeName {
        self.creator.value_type()
    }

    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("complex type {} ({})", name, self.value_type()),
            None => format!("complex type {}", self.value_type()),
        }
    }

    /// The value this type writes for `context`.
    pub(crate) fn value_of(&self, context: &Context) -> Result<Value> {
        accessed_value(self.accessor.as_ref(), context)
    }

    pub(crate) fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
    ) -> Result<Outcome> {
        self.bind(reader, context, scope, self.accessor.as_ref())
    }

    /// Binds the type, applying the instance through `accessor`. Recursors
    /// use this to bind a definition from another position in the tree.
    pub(crate) fn bind<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
        accessor: Option<&Arc<dyn Accessor>>,
    ) -> Result<Outcome> {
        let scope = scope.enter_complex(self);
        if context.is_pre_read() {
            // Nested inside another type's pre-read: walk the content so the
            // stream stays in step, but keep nothing.
            let nested = context.child(Value::Null).with_mode(Mode::Discard);
            return Ok(match self.content.unmarshal(reader, nested, &scope)? {
                Outcome::Bound(_) => Outcome::Bound(context),
                Outcome::NoMatch => Outcome::NoMatch,
            });
        }
        self.bind_instance(reader, context, &scope, accessor)
            .map_err(|e| e.within(self.describe()))
    }

    fn bind_instance<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
        accessor: Option<&Arc<dyn Accessor>>,
    ) -> Result<Outcome> {
        // Attributes belong to the enclosing start tag, which is only
        // current before any content is read.
        let attributes = if self.attributes.is_empty() {
            None
        } else {
            Some(reader.attributes()?.clone())
        };

        let context = run_actions(&self.actions, Phases::BEFORE_UNMARSHAL, context)?;
        let Some(arguments) = self.read_arguments(reader, &context, scope)? else {
            return Ok(Outcome::NoMatch);
        };

        let instance = self.creator.new_instance(&arguments)?;
        let instance = run_actions(
            &self.actions,
            Phases::AFTER_OBJECT_CREATION,
            context.child(instance),
        )?;
        if let Some(attributes) = &attributes {
            for attribute in &self.attributes {
                attribute.read(attributes, &instance)?;
            }
        }

        let instance = match self.content.unmarshal(reader, instance, scope)? {
            Outcome::Bound(instance) => instance,
            Outcome::NoMatch => return Ok(Outcome::NoMatch),
        };
        let instance = run_actions(&self.actions, Phases::AFTER_UNMARSHAL, instance)?;
        let context = apply_value(accessor, context, instance.into_value())?;
        Ok(Outcome::Bound(context))
    }

    /// Pre-reads the content to collect constructor arguments, then rewinds.
    /// Returns `None` if the content does not match.
    fn read_arguments<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<Option<Vec<Value>>> {
        let parameters = self.creator.parameters();
        if parameters.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let attempt = Attempt::begin(reader, context);
        let slots = Arguments::new();
        let collecting = context
            .child(Value::Null)
            .with_mode(Mode::Collect(slots.clone()));
        let outcome = self.content.unmarshal(reader, collecting, scope)?;
        let arguments = outcome.is_match().then(|| slots.ordered(parameters));
        attempt.abandon(reader, context)?;

        if arguments.is_some() {
            debug!(
                value_type = %self.value_type(),
                ?parameters,
                "read constructor arguments ahead"
            );
        }
        Ok(arguments)
    }

    pub(crate) fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<()> {
        self.write(writer, context, scope, self.accessor.as_ref())
    }

    /// Writes the value read through `accessor`.
    pub(crate) fn write<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
        accessor: Option<&Arc<dyn Accessor>>,
    ) -> Result<()> {
        let scope = scope.enter_complex(self);
        self.write_instance(writer, context, &scope, accessor)
            .map_err(|e| e.within(self.describe()))
    }

    fn write_instance<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
        accessor: Option<&Arc<dyn Accessor>>,
    ) -> Result<()> {
        let value = accessed_value(accessor, context)?;
        if value.is_null() {
            return Err(Error::Mismatch("no value to write".into()));
        }
        let found = value.type_name();
        if !scope.model().types().is_assignable(&found, &self.value_type()) {
            return Err(Error::Mismatch(format!(
                "expected a value of type {}, found {}",
                self.value_type(),
                found
            )));
        }

        let instance = run_actions(&self.actions, Phases::BEFORE_MARSHAL, context.child(value))?;
        if !self.attributes.is_empty() {
            let owner = writer.open_start_tag().cloned().ok_or_else(|| {
                Error::StreamState("attributes written outside a start tag".into())
            })?;
            for attribute in &self.attributes {
                attribute.write(writer, &owner, &instance)?;
            }
        }
        self.content.marshal(writer, &instance, scope)?;
        run_actions(&self.actions, Phases::AFTER_MARSHAL, instance)?;
        Ok(())
    }
}
