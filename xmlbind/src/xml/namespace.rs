//! Qualified names and namespace prefix bookkeeping.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The namespace bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// An expanded XML name (optional namespace URI + local name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    namespace: Option<Arc<str>>,
    local: Arc<str>,
}

impl QName {
    /// Creates a qualified name in the given namespace.
    pub fn new(namespace: impl AsRef<str>, local: impl AsRef<str>) -> Self {
        let namespace = namespace.as_ref();
        Self {
            namespace: (!namespace.is_empty()).then(|| Arc::from(namespace)),
            local: Arc::from(local.as_ref()),
        }
    }

    /// Creates a name with no namespace.
    pub fn local(local: impl AsRef<str>) -> Self {
        Self {
            namespace: None,
            local: Arc::from(local.as_ref()),
        }
    }

    /// Parses Clark notation: `{uri}local` or plain `local`.
    pub fn from_clark(text: &str) -> Self {
        match text.strip_prefix('{').and_then(|rest| rest.split_once('}')) {
            Some((uri, local)) => Self::new(uri, local),
            None => Self::local(text),
        }
    }

    /// Returns the namespace URI, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the local part of the name.
    pub fn local_name(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

impl From<&str> for QName {
    fn from(text: &str) -> Self {
        QName::from_clark(text)
    }
}

/// Checks if a raw attribute name is a namespace declaration.
pub fn is_xmlns_attr(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

/// Assigns namespace prefixes for a single write session.
///
/// A URI gets its prefix on first use and keeps it for the lifetime of the
/// map. Declarations are scoped to the element that introduced them, so a
/// URI used again outside that element is declared again under the same
/// prefix.
#[derive(Debug)]
pub struct PrefixMap {
    /// Prefix assigned to each URI, for the whole session.
    assigned: HashMap<Arc<str>, String>,
    /// Stack of scopes, each holding the URIs declared on that element.
    scopes: Vec<Vec<Arc<str>>>,
    next_index: usize,
}

impl Default for PrefixMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefixMap {
    /// Creates an empty prefix map with the `xml` prefix pre-bound.
    pub fn new() -> Self {
        let mut assigned = HashMap::new();
        assigned.insert(Arc::from(XML_NAMESPACE), "xml".to_string());
        PrefixMap {
            assigned,
            scopes: vec![Vec::new()],
            next_index: 0,
        }
    }

    /// Pushes a new scope for entering an element.
    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    /// Pops the current scope when leaving an element.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Returns the prefix for `uri` and whether it still has to be declared
    /// on the current element. The declaration is recorded in the current
    /// scope.
    pub fn prefix_for(&mut self, uri: &str) -> (String, bool) {
        if uri == XML_NAMESPACE {
            return ("xml".to_string(), false);
        }
        let prefix = match self.assigned.get(uri) {
            Some(prefix) => prefix.clone(),
            None => {
                let prefix = format!("ns{}", self.next_index);
                self.next_index += 1;
                self.assigned.insert(Arc::from(uri), prefix.clone());
                prefix
            }
        };
        let in_scope = self.scopes.iter().flatten().any(|u| u.as_ref() == uri);
        if !in_scope {
            if let Some(scope) = self.scopes.last_mut() {
                scope.push(Arc::from(uri));
            }
        }
        (prefix, !in_scope)
    }

    /// Returns the prefix already assigned to `uri`, without declaring it.
    pub fn assigned(&self, uri: &str) -> Option<&str> {
        self.assigned.get(uri).map(String::as_str)
    }
}
