//! Field accessor for dynamic objects.

use super::Accessor;
use crate::context::Context;
use crate::error::Result;
use crate::value::Value;

/// Gets and sets a named field of an object value.
#[derive(Debug, Clone)]
pub struct FieldAccessor {
    field: String,
}

impl FieldAccessor {
    pub fn new(field: impl Into<String>) -> Self {
        FieldAccessor {
            field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl Accessor for FieldAccessor {
    fn get(&self, context: &Context) -> Result<Context> {
        Ok(context.child(context.value().field(&self.field)))
    }

    fn set(&self, context: &Context, value: Value) -> Result<bool> {
        match context.value() {
            Value::Object(object) => {
                object.set(&self.field, value);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_set() {
        let accessor = FieldAccessor::new("name");
        let ctx = Context::new(Value::object("Person"));

        assert!(accessor.get(&ctx).unwrap().value().is_null());
        assert!(accessor.set(&ctx, "Ann".into()).unwrap());
        assert_eq!(accessor.get(&ctx).unwrap().value(), &Value::from("Ann"));
    }

    #[test]
    fn test_set_on_scalar_not_applied() {
        let accessor = FieldAccessor::new("name");
        let ctx = Context::new(Value::Int(1));
        assert!(!accessor.set(&ctx, "Ann".into()).unwrap());
        assert!(accessor.get(&ctx).unwrap().value().is_null());
    }
}
