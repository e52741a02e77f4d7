//! Error types for xmlbind.

use thiserror::Error;

/// Result type alias for xmlbind operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a binding model or binding a document.
#[derive(Error, Debug)]
pub enum Error {
    /// Reader or writer used out of order (e.g. asking for attributes on an
    /// end tag, rewinding an obsolete marker). Not recoverable.
    #[error("stream state error: {0}")]
    StreamState(String),

    /// The document does not have the shape the binding requires and no
    /// alternative binding remains.
    #[error("document mismatch: {0}")]
    Mismatch(String),

    /// A converted value was rejected.
    #[error("validation error: {0}")]
    Validation(String),

    /// The binding model itself is malformed.
    #[error("model configuration error: {0}")]
    ModelConfiguration(String),

    /// An error annotated with the binding node it occurred in.
    #[error("{node}: {source}")]
    Bind {
        /// Description of the node, e.g. `element <person>`.
        node: String,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// XML parsing error.
    #[error("XML parse error: {0}")]
    Parse(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML error from quick-xml.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl Error {
    /// Wraps this error with the description of the node it passed through.
    pub fn within(self, node: impl Into<String>) -> Self {
        Error::Bind {
            node: node.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping all [`Error::Bind`] annotations.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Bind { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the node descriptions this error passed through, outermost first.
    pub fn node_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = self;
        while let Error::Bind { node, source } = current {
            path.push(node.as_str());
            current = source;
        }
        path
    }
}
