//! The binding model: registry of root bindings and named fragments.
//!
//! A model is assembled once with [`BindingModelBuilder`], validated, and is
//! immutable afterwards. It is `Send + Sync`, so one model can serve
//! concurrent traversals on many threads. Each traversal owns its reader or
//! writer and its contexts.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use tracing::debug;

use crate::binding::{Binding, Root, Scope};
use crate::chooser::Chooser;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::{TypeHierarchy, TypeName, Value};
use crate::xml::{EventSource, QName, RecordingReader, StreamWriter, Tag, WriterOptions, XmlSource};

/// Registry of root bindings and named fragments. Entry point for both
/// directions.
#[derive(Debug)]
pub struct BindingModel {
    roots: Vec<Root>,
    root_index: HashMap<QName, usize>,
    fragments: Vec<Binding>,
    fragment_index: HashMap<QName, usize>,
    types: TypeHierarchy,
}

impl BindingModel {
    pub fn builder() -> BindingModelBuilder {
        BindingModelBuilder::default()
    }

    /// Returns the root binding for a document element name.
    pub fn root(&self, name: &QName) -> Option<&Root> {
        self.root_index.get(name).map(|&i| &self.roots[i])
    }

    pub fn roots(&self) -> &[Root] {
        &self.roots
    }

    /// Returns the fragment registered under `key`.
    pub fn fragment(&self, key: &QName) -> Result<&Binding> {
        self.fragment_index
            .get(key)
            .map(|&i| &self.fragments[i])
            .ok_or_else(|| Error::ModelConfiguration(format!("no fragment registered as {}", key)))
    }

    /// The declared type hierarchy.
    pub fn types(&self) -> &TypeHierarchy {
        &self.types
    }

    /// Binds a document from an event source.
    pub fn unmarshal<S: EventSource>(&self, source: S) -> Result<Value> {
        self.unmarshal_with(source, HashMap::new())
    }

    /// Binds a document held in a string.
    pub fn unmarshal_str(&self, xml: &str) -> Result<Value> {
        self.unmarshal(XmlSource::from_str(xml))
    }

    /// Binds a document, making `ambient` available to every context of
    /// the run.
    pub fn unmarshal_with<S: EventSource>(
        &self,
        source: S,
        ambient: HashMap<String, Value>,
    ) -> Result<Value> {
        let mut reader = RecordingReader::new(source);
        let result = self.unmarshal_document(&mut reader, ambient);
        reader.close();
        result
    }

    fn unmarshal_document<S: EventSource>(
        &self,
        reader: &mut RecordingReader<S>,
        ambient: HashMap<String, Value>,
    ) -> Result<Value> {
        // Peek at the document element, then rewind so the root reads it
        let marker = reader.start_recording();
        let root = match reader.next_tag()? {
            Tag::Start => {
                let name = reader.name()?;
                self.root(name).ok_or_else(|| {
                    Error::Mismatch(format!("no root binding for document element <{}>", name))
                })?
            }
            _ => return Err(Error::Mismatch("document has no element".into())),
        };
        reader.rewind_and_playback(marker)?;
        debug!(root = %root.name(), value_type = %root.type_name(), "selected root binding");

        let scope = Scope::new(self);
        let context = root.unmarshal(reader, Context::with_ambient(Value::Null, ambient), &scope)?;
        match reader.next_tag()? {
            Tag::EndDocument => Ok(context.into_value()),
            _ => Err(Error::Mismatch(format!(
                "content after document element <{}>",
                root.name()
            ))),
        }
    }

    /// Selects the root for a value: a root bound to exactly the value's
    /// type, otherwise a root the type is assignable to. More than one
    /// candidate is an error.
    pub fn select_root(&self, value: &Value) -> Result<&Root> {
        let found = value.type_name();
        let exact: Vec<&Root> = self
            .roots
            .iter()
            .filter(|root| root.type_name() == &found)
            .collect();
        let candidates = if exact.is_empty() {
            self.roots
                .iter()
                .filter(|root| self.types.is_assignable(&found, root.type_name()))
                .collect()
        } else {
            exact
        };

        match candidates.as_slice() {
            [] => Err(Error::Mismatch(format!("no root binding for type {}", found))),
            [root] => Ok(root),
            many => {
                let names: Vec<String> = many.iter().map(|r| format!("<{}>", r.name())).collect();
                Err(Error::ModelConfiguration(format!(
                    "ambiguous root binding for type {}: {}",
                    found,
                    names.join(", ")
                )))
            }
        }
    }

    /// Writes `value` as a document to `sink` and returns the sink.
    pub fn marshal<W: Write>(&self, value: &Value, sink: W) -> Result<W> {
        self.marshal_with(value, sink, WriterOptions::default(), HashMap::new())
    }

    /// Writes `value` with the given writer options and ambient values.
    pub fn marshal_with<W: Write>(
        &self,
        value: &Value,
        sink: W,
        options: WriterOptions,
        ambient: HashMap<String, Value>,
    ) -> Result<W> {
        let root = self.select_root(value)?;
        debug!(root = %root.name(), value_type = %value.type_name(), "selected root binding");

        let mut writer = StreamWriter::with_options(sink, options);
        let scope = Scope::new(self);
        let context = Context::with_ambient(value.clone(), ambient);
        root.marshal(&mut writer, &context, &scope)?;
        writer.finish()?;
        Ok(writer.into_inner())
    }

    /// Writes `value` as a document into a string.
    pub fn marshal_to_string(&self, value: &Value) -> Result<String> {
        let bytes = self.marshal(value, Vec::new())?;
        String::from_utf8(bytes).map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

/// Assembles and validates a [`BindingModel`].
#[derive(Debug, Default)]
pub struct BindingModelBuilder {
    roots: Vec<Root>,
    fragments: Vec<(QName, Binding)>,
    types: TypeHierarchy,
}

impl BindingModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a root binding under its element name.
    pub fn root(mut self, root: Root) -> Self {
        self.roots.push(root);
        self
    }

    /// Registers a named fragment. `key` is an identifier in Clark
    /// notation: `{namespace}id` or plain `id`.
    pub fn fragment(mut self, key: impl Into<QName>, binding: impl Into<Binding>) -> Self {
        self.fragments.push((key.into(), binding.into()));
        self
    }

    /// Declares `subtype` as assignable to `supertype`.
    pub fn subtype(mut self, subtype: impl Into<TypeName>, supertype: impl Into<TypeName>) -> Self {
        self.types.declare(subtype, supertype);
        self
    }

    /// Validates the registrations and builds the model.
    pub fn build(self) -> Result<BindingModel> {
        let mut root_index = HashMap::new();
        for (i, root) in self.roots.iter().enumerate() {
            if root_index.insert(root.name().clone(), i).is_some() {
                return Err(Error::ModelConfiguration(format!(
                    "duplicate root binding <{}>",
                    root.name()
                )));
            }
        }

        let mut fragment_index = HashMap::new();
        let mut fragments = Vec::with_capacity(self.fragments.len());
        for (i, (key, binding)) in self.fragments.into_iter().enumerate() {
            if fragment_index.insert(key.clone(), i).is_some() {
                return Err(Error::ModelConfiguration(format!(
                    "duplicate fragment {}",
                    key
                )));
            }
            fragments.push(binding);
        }

        let model = BindingModel {
            roots: self.roots,
            root_index,
            fragments,
            fragment_index,
            types: self.types,
        };
        Validator::new(&model).validate()?;
        debug!(
            roots = model.roots.len(),
            fragments = model.fragments.len(),
            "built binding model"
        );
        Ok(model)
    }
}

/// Static checks over every tree of a model.
struct Validator<'m> {
    model: &'m BindingModel,
    complex_names: HashSet<&'m str>,
}

impl<'m> Validator<'m> {
    fn new(model: &'m BindingModel) -> Self {
        let mut complex_names = HashSet::new();
        for tree in Self::trees(model) {
            walk(tree, &mut |binding| {
                if let Binding::ComplexType(complex) = binding {
                    if let Some(name) = complex.name() {
                        complex_names.insert(name);
                    }
                }
            });
        }
        Validator {
            model,
            complex_names,
        }
    }

    fn trees(model: &'m BindingModel) -> impl Iterator<Item = &'m Binding> {
        model
            .roots
            .iter()
            .map(Root::child)
            .chain(model.fragments.iter())
    }

    fn validate(&self) -> Result<()> {
        let mut result = Ok(());
        for tree in Self::trees(self.model) {
            walk(tree, &mut |binding| {
                if result.is_ok() {
                    result = self.check(binding);
                }
            });
        }
        result
    }

    fn check(&self, binding: &'m Binding) -> Result<()> {
        match binding {
            Binding::Reference(reference) => {
                self.model
                    .fragment(reference.key())
                    .map_err(|e| e.within(binding.describe()))?;
            }
            Binding::Recursor(recursor) => {
                if !self.complex_names.contains(recursor.target()) {
                    return Err(Error::ModelConfiguration(format!(
                        "recursor target {} names no complex type",
                        recursor.target()
                    )));
                }
            }
            Binding::Choice(choice) => {
                let options = choice.options();
                let last = options.len().saturating_sub(1);
                if let Some(i) = options
                    .iter()
                    .position(|option| matches!(option.chooser(), Chooser::Always))
                {
                    if i != last {
                        return Err(Error::ModelConfiguration(format!(
                            "always-matching option {} of a choice hides the options after it",
                            i
                        )));
                    }
                }
            }
            Binding::ComplexType(complex) => {
                let parameters = complex.creator().parameters();
                if !parameters.is_empty() {
                    let mut found = HashSet::new();
                    let mut visited = HashSet::new();
                    self.collect_arguments(complex.content(), &mut found, &mut visited);
                    if let Some(missing) = parameters.iter().find(|p| !found.contains(p.as_str())) {
                        return Err(Error::ModelConfiguration(format!(
                            "constructor parameter {} of {} has no argument binding",
                            missing,
                            complex.value_type()
                        )));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Collects the parameters fed by argument leaves under `binding`,
    /// following references but not entering nested complex types.
    fn collect_arguments(
        &self,
        binding: &'m Binding,
        found: &mut HashSet<&'m str>,
        visited: &mut HashSet<&'m QName>,
    ) {
        match binding {
            Binding::SimpleArgument(argument) => {
                found.insert(argument.parameter());
            }
            Binding::ComplexType(_) => {}
            Binding::Reference(reference) => {
                if visited.insert(reference.key()) {
                    if let Ok(fragment) = self.model.fragment(reference.key()) {
                        self.collect_arguments(fragment, found, visited);
                    }
                }
            }
            other => {
                for child in other.children() {
                    self.collect_arguments(child, found, visited);
                }
            }
        }
    }
}

/// Visits `binding` and every node of its static subtree, parents first.
fn walk<'b>(binding: &'b Binding, visit: &mut impl FnMut(&'b Binding)) {
    visit(binding);
    for child in binding.children() {
        walk(child, visit);
    }
}
