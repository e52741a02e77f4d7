//! Built-in scalar converters.

use super::Converter;
use crate::error::{Error, Result};
use crate::value::{TypeName, Value};

fn wrong_type(expected: &str, value: &Value) -> Error {
    Error::Validation(format!(
        "expected {} value, found {}",
        expected,
        value.type_name()
    ))
}

/// Passes text through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringConverter;

impl Converter for StringConverter {
    fn to_value(&self, text: &str) -> Result<Value> {
        Ok(Value::Text(text.to_string()))
    }

    fn to_text(&self, value: &Value) -> Result<String> {
        match value {
            Value::Text(text) => Ok(text.clone()),
            other => Err(wrong_type(TypeName::STRING, other)),
        }
    }

    fn value_type(&self) -> TypeName {
        TypeName::new(TypeName::STRING)
    }
}

/// Decimal 64-bit integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntConverter;

impl Converter for IntConverter {
    fn to_value(&self, text: &str) -> Result<Value> {
        text.trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| Error::Validation(format!("{:?} is not an integer: {}", text, e)))
    }

    fn to_text(&self, value: &Value) -> Result<String> {
        match value {
            Value::Int(n) => Ok(n.to_string()),
            other => Err(wrong_type(TypeName::INT, other)),
        }
    }

    fn value_type(&self) -> TypeName {
        TypeName::new(TypeName::INT)
    }
}

/// Floating point numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatConverter;

impl Converter for FloatConverter {
    fn to_value(&self, text: &str) -> Result<Value> {
        text.trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| Error::Validation(format!("{:?} is not a number: {}", text, e)))
    }

    fn to_text(&self, value: &Value) -> Result<String> {
        match value {
            Value::Float(n) => Ok(n.to_string()),
            Value::Int(n) => Ok(n.to_string()),
            other => Err(wrong_type(TypeName::FLOAT, other)),
        }
    }

    fn value_type(&self) -> TypeName {
        TypeName::new(TypeName::FLOAT)
    }
}

/// Lexical booleans: `true`, `false`, `1` and `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolConverter;

impl Converter for BoolConverter {
    fn to_value(&self, text: &str) -> Result<Value> {
        match text.trim() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            other => Err(Error::Validation(format!("{:?} is not a boolean", other))),
        }
    }

    fn to_text(&self, value: &Value) -> Result<String> {
        match value {
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(wrong_type(TypeName::BOOL, other)),
        }
    }

    fn value_type(&self) -> TypeName {
        TypeName::new(TypeName::BOOL)
    }
}
