//! XML event reading and writing.
//!
//! [`XmlSource`] pulls owned events from quick-xml, [`RecordingReader`]
//! layers marks and replay on top of any [`EventSource`], and
//! [`StreamWriter`] emits documents with automatic namespace prefixes.

mod namespace;
mod reader;
mod source;
mod writer;

pub use namespace::{is_xmlns_attr, PrefixMap, QName, XML_NAMESPACE};
pub use reader::{Marker, RecordingReader, Tag};
pub use source::{
    collect_events, Attributes, EventList, EventSource, ReaderOptions, XmlEvent, XmlSource,
};
pub use writer::{StreamWriter, WriterOptions};
