//! Built-in creators.

use std::fmt;
use std::sync::Arc;

use super::Creator;
use crate::error::Result;
use crate::value::{Object, ObjectRef, TypeName, Value};

/// Creates empty objects of a registered type.
///
/// With constructor parameters, each argument becomes the initial value of
/// the field named after its parameter. Null arguments leave the field unset.
#[derive(Debug, Clone)]
pub struct ObjectCreator {
    type_name: TypeName,
    parameters: Vec<String>,
}

impl ObjectCreator {
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        ObjectCreator {
            type_name: type_name.into(),
            parameters: Vec::new(),
        }
    }

    /// Declares constructor parameters.
    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }
}

impl Creator for ObjectCreator {
    fn new_instance(&self, arguments: &[Value]) -> Result<Value> {
        let mut object = Object::new(self.type_name.clone());
        for (parameter, argument) in self.parameters.iter().zip(arguments) {
            if !argument.is_null() {
                object.set(parameter, argument.clone());
            }
        }
        Ok(Value::Object(ObjectRef::new(object)))
    }

    fn value_type(&self) -> TypeName {
        self.type_name.clone()
    }

    fn parameters(&self) -> &[String] {
        &self.parameters
    }
}

type CreateFn = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

/// Creator backed by a closure.
#[derive(Clone)]
pub struct FnCreator {
    type_name: TypeName,
    parameters: Vec<String>,
    create: Arc<CreateFn>,
}

impl FnCreator {
    pub fn new<F>(type_name: impl Into<TypeName>, create: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        FnCreator {
            type_name: type_name.into(),
            parameters: Vec::new(),
            create: Arc::new(create),
        }
    }

    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for FnCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCreator")
            .field("type_name", &self.type_name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl Creator for FnCreator {
    fn new_instance(&self, arguments: &[Value]) -> Result<Value> {
        (self.create)(arguments)
    }

    fn value_type(&self) -> TypeName {
        self.type_name.clone()
    }

    fn parameters(&self) -> &[String] {
        &self.parameters
    }
}
