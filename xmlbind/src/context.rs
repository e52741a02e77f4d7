//! Per-traversal binding context.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::{Object, ObjectRef, Value};

/// Run-scoped auxiliary values, shared by every context of one traversal.
pub type Ambient = Rc<HashMap<String, Value>>;

/// Constructor-argument slots filled while a complex type pre-reads its
/// content.
#[derive(Debug, Clone, Default)]
pub struct Arguments(Rc<RefCell<HashMap<String, Value>>>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the value for a constructor parameter. A later value for the
    /// same parameter replaces the earlier one, which is returned.
    pub fn insert(&self, parameter: &str, value: Value) -> Option<Value> {
        self.0.borrow_mut().insert(parameter.to_string(), value)
    }

    fn restore(&self, parameter: String, previous: Option<Value>) {
        let mut slots = self.0.borrow_mut();
        match previous {
            Some(value) => slots.insert(parameter, value),
            None => slots.remove(&parameter),
        };
    }

    pub fn contains(&self, parameter: &str) -> bool {
        self.0.borrow().contains_key(parameter)
    }

    /// Returns the collected values in parameter order. Parameters that were
    /// not read are [`Value::Null`].
    pub fn ordered<S: AsRef<str>>(&self, parameters: &[S]) -> Vec<Value> {
        let slots = self.0.borrow();
        parameters
            .iter()
            .map(|p| slots.get(p.as_ref()).cloned().unwrap_or_default())
            .collect()
    }
}

#[derive(Debug)]
enum Undo {
    /// An object as it was before a field was set.
    Object(ObjectRef, Object),
    /// A constructor slot as it was before it was filled.
    Argument(Arguments, String, Option<Value>),
}

/// Undo log of the changes made while binding.
///
/// Every context of a traversal shares one journal. Binding an attempt that
/// is later abandoned can leave fields set on shared objects; rolling back
/// to the length taken before the attempt restores them.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Undo>>>);

impl Journal {
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Remembers the state of `object` before one of its fields changes.
    pub(crate) fn record_object(&self, object: &ObjectRef) {
        self.0
            .borrow_mut()
            .push(Undo::Object(object.clone(), object.snapshot()));
    }

    /// Fills an argument slot, remembering what it held.
    pub(crate) fn insert_argument(&self, slots: &Arguments, parameter: &str, value: Value) {
        let previous = slots.insert(parameter, value);
        self.0.borrow_mut().push(Undo::Argument(
            slots.clone(),
            parameter.to_string(),
            previous,
        ));
    }

    /// Undoes every change recorded after the journal had `mark` entries,
    /// newest first.
    pub fn rollback(&self, mark: usize) {
        let undone = {
            let mut entries = self.0.borrow_mut();
            if mark >= entries.len() {
                return;
            }
            entries.split_off(mark)
        };
        for undo in undone.into_iter().rev() {
            match undo {
                Undo::Object(object, before) => object.restore(before),
                Undo::Argument(slots, parameter, previous) => slots.restore(parameter, previous),
            }
        }
    }

    /// Drops all entries once no attempt can be abandoned anymore.
    pub(crate) fn forget(&self) {
        self.0.borrow_mut().clear();
    }
}

/// What a traversal is doing with the content it reads.
#[derive(Debug, Clone, Default)]
pub(crate) enum Mode {
    /// Regular binding.
    #[default]
    Bind,
    /// Constructor pre-read: only argument leaves produce values.
    Collect(Arguments),
    /// Pre-read of content nested in another type: nothing is kept.
    Discard,
}

/// The currently bound value plus the ambient values of the run.
#[derive(Debug, Clone)]
pub struct Context {
    value: Value,
    ambient: Ambient,
    index: Option<usize>,
    mode: Mode,
    journal: Journal,
}

impl Context {
    /// Creates a context with no ambient values.
    pub fn new(value: Value) -> Self {
        Self::with_ambient(value, HashMap::new())
    }

    /// Creates a context with a snapshot of the given ambient values.
    pub fn with_ambient(value: Value, ambient: HashMap<String, Value>) -> Self {
        Context {
            value,
            ambient: Rc::new(ambient),
            index: None,
            mode: Mode::Bind,
            journal: Journal::default(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Looks up an ambient value.
    pub fn ambient(&self, key: &str) -> Option<&Value> {
        self.ambient.get(key)
    }

    /// Returns the position of the current item when iterating a repeated
    /// element.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Derives a context for `value`, sharing the ambient values. The index
    /// is not inherited.
    pub fn child(&self, value: Value) -> Context {
        Context {
            value,
            ambient: Rc::clone(&self.ambient),
            index: None,
            mode: self.mode.clone(),
            journal: self.journal.clone(),
        }
    }

    /// Replaces the bound value, keeping everything else.
    pub fn with_value(mut self, value: Value) -> Context {
        self.value = value;
        self
    }

    pub fn with_index(mut self, index: usize) -> Context {
        self.index = Some(index);
        self
    }

    /// Returns true while a constructor pre-read is in progress.
    pub fn is_pre_read(&self) -> bool {
        !matches!(self.mode, Mode::Bind)
    }

    /// Returns the argument slots to fill, during a collecting pre-read.
    pub fn arguments(&self) -> Option<&Arguments> {
        match &self.mode {
            Mode::Collect(arguments) => Some(arguments),
            _ => None,
        }
    }

    /// The undo journal of the traversal.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub(crate) fn with_mode(mut self, mode: Mode) -> Context {
        self.mode = mode;
        self
    }
}
