//! Repeated bindings into lists and maps.

use std::io::Write;
use std::sync::Arc;

use tracing::debug;

use super::{accessed_value, apply_value, Attempt, Binding, Outcome, Scope};
use crate::collab::Accessor;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::Value;
use crate::xml::{EventSource, RecordingReader, StreamWriter};

/// Reads items until the item binding stops matching. Returns the bound
/// items in document order; every item starts from a null value.
fn read_items<S: EventSource>(
    item: &Binding,
    reader: &mut RecordingReader<S>,
    context: &Context,
    scope: &Scope<'_>,
) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    loop {
        let attempt = Attempt::begin(reader, context);
        let item_context = context.child(Value::Null).with_index(items.len());
        match item.unmarshal(reader, item_context, scope)? {
            Outcome::Bound(bound) => {
                // An item that matches without consuming anything would
                // match forever.
                let consumed = attempt.consumed(reader)?;
                attempt.commit(reader, &bound)?;
                if !consumed {
                    break;
                }
                items.push(bound.into_value());
            }
            Outcome::NoMatch => {
                attempt.abandon(reader, context)?;
                break;
            }
        }
    }
    Ok(items)
}

fn write_items<'v, W: Write>(
    item: &Binding,
    items: impl Iterator<Item = &'v Value>,
    writer: &mut StreamWriter<W>,
    context: &Context,
    scope: &Scope<'_>,
) -> Result<()> {
    for (index, value) in items.enumerate() {
        let item_context = context.child(value.clone()).with_index(index);
        item.marshal(writer, &item_context, scope)
            .map_err(|e| e.within(format!("item {}", index)))?;
    }
    Ok(())
}

/// Binds zero or more repetitions of an item into a list.
///
/// An optional repeater with no items yields an empty list, never null. A
/// required repeater with no items does not match.
#[derive(Debug)]
pub struct Repeater {
    item: Box<Binding>,
    accessor: Option<Arc<dyn Accessor>>,
    optional: bool,
}

impl Repeater {
    pub fn new(item: impl Into<Binding>) -> Self {
        Repeater {
            item: Box::new(item.into()),
            accessor: None,
            optional: false,
        }
    }

    pub fn with_accessor(mut self, accessor: impl Accessor + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn item(&self) -> &Binding {
        &self.item
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub(crate) fn has_value(&self, context: &Context) -> Result<bool> {
        Ok(accessed_value(self.accessor.as_ref(), context)?.is_non_empty_collection())
    }

    pub(crate) fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
    ) -> Result<Outcome> {
        let items = read_items(&self.item, reader, &context, scope)?;
        debug!(count = items.len(), item = %self.item.describe(), "repeater finished");
        if items.is_empty() && !self.optional {
            return Ok(Outcome::NoMatch);
        }
        let context = apply_value(self.accessor.as_ref(), context, Value::List(items))?;
        Ok(Outcome::Bound(context))
    }

    pub(crate) fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let value = accessed_value(self.accessor.as_ref(), context)?;
        let items: &[Value] = match &value {
            Value::List(items) => items.as_slice(),
            Value::Null => &[],
            other => {
                return Err(Error::Mismatch(format!(
                    "repeater expects a list, found {}",
                    other.type_name()
                )))
            }
        };
        if items.is_empty() && !self.optional {
            return Err(Error::Mismatch(format!(
                "required repeater of {} has no items",
                self.item.describe()
            )));
        }
        write_items(&self.item, items.iter(), writer, context, scope)
    }
}

/// Binds zero or more repetitions of an item into a map.
///
/// The key of each item is read from the bound item along a path of field
/// names. When two items have the same key the later item wins, and the key
/// keeps the position of its first occurrence.
#[derive(Debug)]
pub struct MapRepeater {
    item: Box<Binding>,
    key_path: Vec<String>,
    accessor: Option<Arc<dyn Accessor>>,
    optional: bool,
}

impl MapRepeater {
    /// Creates a map repeater. `key_path` is a dot-separated field path.
    pub fn new(item: impl Into<Binding>, key_path: &str) -> Self {
        MapRepeater {
            item: Box::new(item.into()),
            key_path: key_path.split('.').map(str::to_string).collect(),
            accessor: None,
            optional: false,
        }
    }

    pub fn with_accessor(mut self, accessor: impl Accessor + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn item(&self) -> &Binding {
        &self.item
    }

    pub fn key_path(&self) -> String {
        self.key_path.join(".")
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub(crate) fn has_value(&self, context: &Context) -> Result<bool> {
        Ok(accessed_value(self.accessor.as_ref(), context)?.is_non_empty_collection())
    }

    pub(crate) fn unmarshal<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        context: Context,
        scope: &Scope<'_>,
    ) -> Result<Outcome> {
        let items = read_items(&self.item, reader, &context, scope)?;
        debug!(count = items.len(), item = %self.item.describe(), "map repeater finished");
        if items.is_empty() && !self.optional {
            return Ok(Outcome::NoMatch);
        }
        if context.is_pre_read() {
            return Ok(Outcome::Bound(context));
        }

        let mut entries: Vec<(Value, Value)> = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let key = item.lookup_path(&self.key_path);
            if key.is_null() {
                return Err(Error::Mismatch(format!(
                    "item {} has no key at {}",
                    index,
                    self.key_path()
                )));
            }
            match entries.iter_mut().find(|(existing, _)| *existing == key) {
                Some(entry) => {
                    debug!(%key, "duplicate map key, keeping the later item");
                    entry.1 = item;
                }
                None => entries.push((key, item)),
            }
        }
        let context = apply_value(self.accessor.as_ref(), context, Value::Map(entries))?;
        Ok(Outcome::Bound(context))
    }

    pub(crate) fn marshal<W: Write>(
        &self,
        writer: &mut StreamWriter<W>,
        context: &Context,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let value = accessed_value(self.accessor.as_ref(), context)?;
        let entries: &[(Value, Value)] = match &value {
            Value::Map(entries) => entries.as_slice(),
            Value::Null => &[],
            other => {
                return Err(Error::Mismatch(format!(
                    "map repeater expects a map, found {}",
                    other.type_name()
                )))
            }
        };
        if entries.is_empty() && !self.optional {
            return Err(Error::Mismatch(format!(
                "required map repeater of {} has no items",
                self.item.describe()
            )));
        }
        write_items(&self.item, entries.iter().map(|(_, v)| v), writer, context, scope)
    }
}
