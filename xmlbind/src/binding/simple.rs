//! Scalar leaf bindings.

use std::io::Write;
use std::sync::Arc;

use super::{accessed_value, apply_value, Outcome};
use crate::collab::{run_actions, Accessor, Action, Converter, Phases};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::{TypeName, Value};
use crate::xml::{EventSource, RecordingReader, StreamWriter};

fn write_text<W: Write>(
    converter: &dyn Converter,
    writer: &mut StreamWriter<W>,
    value: &Value,
) -> Result<()> {
    let text = converter.to_text(value)?;
    if !text.is_empty() {
        writer.write_content(&text)?;
    }
    Ok(())
}

/// Binds the text of the enclosing element through a converter.
///
/// The converted value is applied through the accessor, or becomes the
/// current value if there is none.
#[derive(Debug)]
pub struct SimpleType {
    converter: Arc<dyn Converter>,
    accessor: Option<Arc<dyn Accessor>>,
    actions: Vec<Arc<dyn Action>>,
}

impl SimpleType {
    pub fn new(converter: impl Converter + 'static) -> Self {
        SimpleType {
            converter: Arc::new(converter),
            accessor: None,
            actions: Vec::new(),
        }
    }

    pub fn with_accessor(mut self, accessor: impl Accessor + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    pub fn with_action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn value_type(&self) -> TypeName {
        self.converter.value_type()
    }

    pub(crate) fn value_of(&self, context: &Context) -> Result<Value> {
        accessed_value(self.accessor.as_ref(), context)
    }

    pub(crate) fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
    ) -> Result<Outcome> {
        let text = reader.element_text()?;
        if context.is_pre_read() {
            return Ok(Outcome::Bound(context));
        }
        let value = self
            .converter
            .to_value(&text)
            .map_err(|e| e.within(format!("simple type {}", self.value_type())))?;
        let value = run_actions(&self.actions, Phases::AFTER_UNMARSHAL, context.child(value))?
            .into_value();
        Ok(Outcome::Bound(apply_value(
            self.accessor.as_ref(),
            context,
            value,
        )?))
    }

    pub(crate) fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
    ) -> Result<()> {
        let value = self.value_of(context)?;
        if value.is_null() {
            return Err(Error::Mismatch(format!(
                "no {} value to write",
                self.value_type()
            )));
        }
        let value = run_actions(&self.actions, Phases::BEFORE_MARSHAL, context.child(value))?
            .into_value();
        write_text(self.converter.as_ref(), writer, &value)
    }
}

/// A scalar leaf that feeds a constructor parameter.
///
/// During the constructor pre-read of the enclosing complex type the value
/// fills the pending argument slot of its parameter. When the content is
/// bound for real the text is only consumed, unless an accessor is set, in
/// which case the value is applied like a [`SimpleType`] would.
///
/// Without an accessor, writing takes the field named after the parameter.
#[derive(Debug)]
pub struct SimpleArgument {
    parameter: String,
    converter: Arc<dyn Converter>,
    accessor: Option<Arc<dyn Accessor>>,
}

impl SimpleArgument {
    pub fn new(parameter: impl Into<String>, converter: impl Converter + 'static) -> Self {
        SimpleArgument {
            parameter: parameter.into(),
            converter: Arc::new(converter),
            accessor: None,
        }
    }

    pub fn with_accessor(mut self, accessor: impl Accessor + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    pub(crate) fn value_of(&self, context: &Context) -> Result<Value> {
        match &self.accessor {
            Some(accessor) => Ok(accessor.get(context)?.into_value()),
            None => Ok(context.value().field(&self.parameter)),
        }
    }

    fn convert(&self, text: &str) -> Result<Value> {
        self.converter
            .to_value(text)
            .map_err(|e| e.within(format!("argument {}", self.parameter)))
    }

    pub(crate) fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
    ) -> Result<Outcome> {
        let text = reader.element_text()?;
        if let Some(slots) = context.arguments() {
            context
                .journal()
                .insert_argument(slots, &self.parameter, self.convert(&text)?);
            return Ok(Outcome::Bound(context));
        }
        if context.is_pre_read() || self.accessor.is_none() {
            return Ok(Outcome::Bound(context));
        }
        let value = self.convert(&text)?;
        Ok(Outcome::Bound(apply_value(
            self.accessor.as_ref(),
            context,
            value,
        )?))
    }

    pub(crate) fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
    ) -> Result<()> {
        let value = self.value_of(context)?;
        if value.is_null() {
            return Err(Error::Mismatch(format!(
                "no value for argument {}",
                self.parameter
            )));
        }
        write_text(self.converter.as_ref(), writer, &value)
    }
}
