//! Dynamic object graph that bindings read from and write to.
//!
//! Objects are shared, interiorly mutable records tagged with a registered
//! type name. Accessors update objects through the shared handle, so a field
//! set by a child binding is visible to every context holding the object.

use std::cell::{Ref, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Name of a bound type, e.g. `string` or a registered object type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(Arc<str>);

impl TypeName {
    pub const NULL: &'static str = "null";
    pub const BOOL: &'static str = "bool";
    pub const INT: &'static str = "int";
    pub const FLOAT: &'static str = "float";
    pub const STRING: &'static str = "string";
    pub const LIST: &'static str = "list";
    pub const MAP: &'static str = "map";
    /// Supertype of every type.
    pub const ANY: &'static str = "any";

    pub fn new(name: impl AsRef<str>) -> Self {
        TypeName(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        TypeName::new(name)
    }
}

impl PartialEq<str> for TypeName {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

/// A typed record with ordered named fields.
///
/// Equality ignores field order.
#[derive(Debug, Clone)]
pub struct Object {
    type_name: TypeName,
    fields: Vec<(String, Value)>,
}

impl Object {
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        Object {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    /// Returns the value of a field; unset fields are absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Sets a field, keeping the position of an existing field.
    pub fn set(&mut self, field: &str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

/// Shared handle to an [`Object`].
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    pub fn new(object: Object) -> Self {
        ObjectRef(Rc::new(RefCell::new(object)))
    }

    pub fn type_name(&self) -> TypeName {
        self.0.borrow().type_name.clone()
    }

    /// Returns a field value, or [`Value::Null`] if unset.
    pub fn get(&self, field: &str) -> Value {
        self.0.borrow().get(field).cloned().unwrap_or_default()
    }

    pub fn set(&self, field: &str, value: Value) {
        self.0.borrow_mut().set(field, value);
    }

    /// Returns a copy of the object's current fields.
    pub(crate) fn snapshot(&self) -> Object {
        self.0.borrow().clone()
    }

    /// Puts back fields taken with [`snapshot`](Self::snapshot).
    pub(crate) fn restore(&self, object: Object) {
        *self.0.borrow_mut() = object;
    }

    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    /// Returns true if both handles point to the same object.
    pub fn same(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.same(other) || *self.0.borrow() == *other.0.borrow()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let object = self.0.borrow();
        let mut s = f.debug_struct(object.type_name.as_str());
        for (name, value) in object.fields() {
            s.field(name, value);
        }
        s.finish()
    }
}

/// A bound value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    /// Insertion-ordered key/value pairs.
    Map(Vec<(Value, Value)>),
    Object(ObjectRef),
}

impl Value {
    /// Creates a new, empty object of the given type.
    pub fn object(type_name: impl Into<TypeName>) -> Self {
        Value::Object(ObjectRef::new(Object::new(type_name)))
    }

    /// Builder-style field setter for object values; other values are
    /// returned unchanged.
    pub fn with(self, field: &str, value: impl Into<Value>) -> Self {
        if let Value::Object(object) = &self {
            object.set(field, value.into());
        }
        self
    }

    /// Returns the runtime type name.
    pub fn type_name(&self) -> TypeName {
        match self {
            Value::Null => TypeName::new(TypeName::NULL),
            Value::Bool(_) => TypeName::new(TypeName::BOOL),
            Value::Int(_) => TypeName::new(TypeName::INT),
            Value::Float(_) => TypeName::new(TypeName::FLOAT),
            Value::Text(_) => TypeName::new(TypeName::STRING),
            Value::List(_) => TypeName::new(TypeName::LIST),
            Value::Map(_) => TypeName::new(TypeName::MAP),
            Value::Object(object) => object.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns true for a list or map with at least one entry.
    pub fn is_non_empty_collection(&self) -> bool {
        match self {
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            _ => false,
        }
    }

    /// Returns a field of an object value, or [`Value::Null`].
    pub fn field(&self, name: &str) -> Value {
        match self {
            Value::Object(object) => object.get(name),
            _ => Value::Null,
        }
    }

    /// Follows a path of field names through nested objects.
    pub fn lookup_path<S: AsRef<str>>(&self, path: &[S]) -> Value {
        path.iter()
            .fold(self.clone(), |value, name| value.field(name.as_ref()))
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Text(text) => f.write_str(text),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Declared subtype relation between type names.
#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
    supertypes: HashMap<TypeName, Vec<TypeName>>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `subtype` as directly assignable to `supertype`.
    pub fn declare(&mut self, subtype: impl Into<TypeName>, supertype: impl Into<TypeName>) {
        self.supertypes
            .entry(subtype.into())
            .or_default()
            .push(supertype.into());
    }

    /// Returns true if a value of type `from` can be used where `to` is
    /// expected: same type, `any`, or a declared (transitive) supertype.
    pub fn is_assignable(&self, from: &TypeName, to: &TypeName) -> bool {
        if from == to || to == TypeName::ANY {
            return true;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            for parent in self.supertypes.get(current).into_iter().flatten() {
                if parent == to {
                    return true;
                }
                if seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        false
    }
}
