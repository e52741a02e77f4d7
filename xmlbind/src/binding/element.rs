//! Element and attribute bindings.

use std::io::Write;
use std::sync::Arc;

use tracing::trace;

use super::{set_through, Binding, Outcome, Scope};
use crate::collab::{run_actions, Accessor, Action, Converter, Phases};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::xml::{Attributes, EventSource, QName, RecordingReader, StreamWriter, Tag};

/// Binds one attribute to a property of the current value.
#[derive(Debug, Clone)]
pub struct Attribute {
    name: QName,
    accessor: Arc<dyn Accessor>,
    converter: Arc<dyn Converter>,
    optional: bool,
}

impl Attribute {
    pub fn new(
        name: impl Into<QName>,
        accessor: impl Accessor + 'static,
        converter: impl Converter + 'static,
    ) -> Self {
        Attribute {
            name: name.into(),
            accessor: Arc::new(accessor),
            converter: Arc::new(converter),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Converts the attribute's text and sets it on the current value.
    pub(crate) fn read(&self, attributes: &Attributes, context: &Context) -> Result<()> {
        match attributes.get(&self.name) {
            Some(text) => {
                let value = self
                    .converter
                    .to_value(text)
                    .map_err(|e| e.within(self.describe()))?;
                set_through(&self.accessor, context, value)?;
                Ok(())
            }
            None if self.optional => Ok(()),
            None => Err(Error::Mismatch(format!(
                "missing required attribute {}",
                self.name
            ))),
        }
    }

    /// Writes the attribute onto the start tag of `owner`.
    pub(crate) fn write<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        owner: &QName,
        context: &Context,
    ) -> Result<()> {
        let value = self.accessor.get(context)?.into_value();
        if value.is_null() {
            if self.optional {
                return Ok(());
            }
            return Err(Error::Mismatch(format!(
                "no value for required attribute {}",
                self.name
            )));
        }
        let text = self
            .converter
            .to_text(&value)
            .map_err(|e| e.within(self.describe()))?;
        writer.write_attribute(owner, &self.name, &text)
    }

    fn describe(&self) -> String {
        format!("attribute {}", self.name)
    }
}

/// One named element wrapping zero or one content binding.
///
/// Attributes are applied to the current value. An element without content
/// binding consumes whatever its content is and writes an empty element.
#[derive(Debug)]
pub struct Element {
    name: QName,
    child: Option<Box<Binding>>,
    attributes: Vec<Attribute>,
    optional: bool,
    actions: Vec<Arc<dyn Action>>,
}

impl Element {
    pub fn new(name: impl Into<QName>) -> Self {
        Element {
            name: name.into(),
            child: None,
            attributes: Vec::new(),
            optional: false,
            actions: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: impl Into<Binding>) -> Self {
        self.child = Some(Box::new(child.into()));
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn child(&self) -> Option<&Binding> {
        self.child.as_deref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub(crate) fn has_value(&self, context: &Context, scope: &Scope<'_>) -> Result<bool> {
        for attribute in &self.attributes {
            if !attribute.accessor.get(context)?.value().is_null() {
                return Ok(true);
            }
        }
        match &self.child {
            Some(child) => child.has_value(context, scope),
            None => Ok(true),
        }
    }

    pub(crate) fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
    ) -> Result<Outcome> {
        if reader.next_tag()? != Tag::Start || reader.name()? != &self.name {
            return Ok(Outcome::NoMatch);
        }
        trace!(element = %self.name, depth = reader.depth(), "matched element");
        self.bind_content(reader, context, scope)
            .map_err(|e| e.within(format!("element <{}>", self.name)))
    }

    fn bind_content<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
    ) -> Result<Outcome> {
        let depth = reader.depth();
        let context = run_actions(&self.actions, Phases::BEFORE_UNMARSHAL, context)?;
        if !context.is_pre_read() && !self.attributes.is_empty() {
            let attributes = reader.attributes()?;
            for attribute in &self.attributes {
                attribute.read(attributes, &context)?;
            }
        }

        let context = match &self.child {
            None => {
                reader.skip_element()?;
                context
            }
            Some(child) => match child.unmarshal(reader, context, scope)? {
                Outcome::Bound(context) => context,
                Outcome::NoMatch => return Ok(Outcome::NoMatch),
            },
        };

        expect_end(reader, depth, &self.name)?;
        let context = run_actions(&self.actions, Phases::AFTER_UNMARSHAL, context)?;
        Ok(Outcome::Bound(context))
    }

    pub(crate) fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<()> {
        if self.optional && !self.has_value(context, scope)? {
            return Ok(());
        }
        self.write(writer, context, scope)
            .map_err(|e| e.within(format!("element <{}>", self.name)))
    }

    fn write<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let context = run_actions(&self.actions, Phases::BEFORE_MARSHAL, context.clone())?;
        writer.write_element(&self.name, false)?;
        for attribute in &self.attributes {
            attribute.write(writer, &self.name, &context)?;
        }
        if let Some(child) = &self.child {
            child.marshal(writer, &context, scope)?;
        }
        writer.close_element(&self.name)?;
        run_actions(&self.actions, Phases::AFTER_MARSHAL, context)?;
        Ok(())
    }
}

/// Consumes the end tag of the element opened at `depth`, unless the content
/// binding already did. Any other element left in the content is an error.
pub(crate) fn expect_end<S: EventSource>(
    reader: &mut RecordingReader<S>,
    depth: usize,
    name: &QName,
) -> Result<()> {
    if reader.depth() < depth {
        return Ok(());
    }
    match reader.next_tag()? {
        Tag::End => Ok(()),
        Tag::Start => Err(Error::Mismatch(format!(
            "unexpected element <{}> in <{}>",
            reader.name()?,
            name
        ))),
        Tag::EndDocument => Err(Error::Parse(format!("document ended inside <{}>", name))),
    }
}
