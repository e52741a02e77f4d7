//! Root bindings.

use std::io::Write;
use std::sync::Arc;

use super::element::expect_end;
use super::{Binding, Outcome, Scope};
use crate::collab::{run_actions, Action, Phases};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::TypeName;
use crate::xml::{EventSource, QName, RecordingReader, StreamWriter, Tag};

/// Entry point of a binding tree: a document element bound to a type.
#[derive(Debug)]
pub struct Root {
    name: QName,
    type_name: TypeName,
    child: Binding,
    actions: Vec<Arc<dyn Action>>,
}

impl Root {
    pub fn new(
        name: impl Into<QName>,
        type_name: impl Into<TypeName>,
        child: impl Into<Binding>,
    ) -> Self {
        Root {
            name: name.into(),
            type_name: type_name.into(),
            child: child.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    /// The type of the values this root binds.
    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    pub fn child(&self) -> &Binding {
        &self.child
    }

    fn describe(&self) -> String {
        format!("root <{}>", self.name)
    }

    /// Binds the document element. Unlike inner nodes there is no
    /// alternative left, so content that does not match is an error.
    pub(crate) fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
    ) -> Result<Context> {
        let scope = scope.enter_root(self);
        self.bind(reader, context, &scope)
            .map_err(|e| e.within(self.describe()))
    }

    fn bind<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
    ) -> Result<Context> {
        if reader.next_tag()? != Tag::Start {
            return Err(Error::Mismatch(format!(
                "expected document element <{}>",
                self.name
            )));
        }
        let found = reader.name()?;
        if found != &self.name {
            return Err(Error::Mismatch(format!(
                "expected document element <{}>, found <{}>",
                self.name, found
            )));
        }
        let depth = reader.depth();

        let context = run_actions(&self.actions, Phases::BEFORE_UNMARSHAL, context)?;
        let context = match self.child.unmarshal(reader, context, scope)? {
            Outcome::Bound(context) => context,
            Outcome::NoMatch => {
                return Err(Error::Mismatch(format!(
                    "content does not match {}",
                    self.child.describe()
                )))
            }
        };
        expect_end(reader, depth, &self.name)?;
        run_actions(&self.actions, Phases::AFTER_UNMARSHAL, context)
    }

    pub(crate) fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let scope = scope.enter_root(self);
        self.write(writer, context, &scope)
            .map_err(|e| e.within(self.describe()))
    }

    fn write<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let context = run_actions(&self.actions, Phases::BEFORE_MARSHAL, context.clone())?;
        writer.write_element(&self.name, false)?;
        self.child.marshal(writer, &context, scope)?;
        writer.close_element(&self.name)?;
        run_actions(&self.actions, Phases::AFTER_MARSHAL, context)?;
        Ok(())
    }
}
