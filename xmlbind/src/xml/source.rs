//! Forward-only XML event sources.
//!
//! The production source pulls events from quick-xml's namespace-aware
//! reader and turns them into owned [`XmlEvent`]s, which is what the
//! record-and-playback reader records and replays.

use std::borrow::Cow;
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use super::namespace::{is_xmlns_attr, QName};
use crate::error::{Error, Result};

/// Attributes of a start element, keyed by qualified name.
pub type Attributes = BTreeMap<QName, String>;

/// A single owned XML event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// A start tag with its (namespace-resolved) attributes.
    Start { name: QName, attributes: Attributes },
    /// An end tag.
    End { name: QName },
    /// Character data, with entity references resolved and adjacent
    /// text/CDATA pieces merged.
    Text(String),
    /// End of the document.
    EndDocument,
}

impl XmlEvent {
    /// Returns the element name for start and end events.
    pub fn name(&self) -> Option<&QName> {
        match self {
            XmlEvent::Start { name, .. } | XmlEvent::End { name } => Some(name),
            _ => None,
        }
    }

    /// Returns true for whitespace-only text.
    pub fn is_whitespace(&self) -> bool {
        matches!(self, XmlEvent::Text(text) if text.trim().is_empty())
    }
}

/// A forward-only source of XML events.
pub trait EventSource {
    /// Pulls the next event. After [`XmlEvent::EndDocument`] every call
    /// returns `EndDocument` again.
    fn next_event(&mut self) -> Result<XmlEvent>;
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn next_event(&mut self) -> Result<XmlEvent> {
        (**self).next_event()
    }
}

/// Options for the quick-xml event source.
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    /// Whether to trim leading and trailing whitespace of text events.
    pub trim_text: bool,
}

/// Event source backed by quick-xml's namespace-resolving reader.
pub struct XmlSource<R: BufRead> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    /// Event read ahead while merging adjacent text pieces.
    lookahead: Option<XmlEvent>,
    finished: bool,
}

impl<'a> XmlSource<&'a [u8]> {
    /// Creates a source reading from a string.
    pub fn from_str(xml: &'a str) -> Self {
        Self::with_options(xml.as_bytes(), ReaderOptions::default())
    }
}

impl XmlSource<BufReader<File>> {
    /// Creates a source reading from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::with_options(
            BufReader::new(file),
            ReaderOptions::default(),
        ))
    }
}

impl<R: BufRead> XmlSource<R> {
    /// Creates a source over any buffered reader.
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, ReaderOptions::default())
    }

    /// Creates a source with the given options.
    pub fn with_options(reader: R, options: ReaderOptions) -> Self {
        let mut reader = NsReader::from_reader(reader);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.trim_text(options.trim_text);
        XmlSource {
            reader,
            buf: Vec::new(),
            lookahead: None,
            finished: false,
        }
    }

    /// Reads one raw piece: a tag, a piece of text, or end of document.
    /// Comments, declarations and processing instructions are skipped.
    fn read_piece(&mut self) -> Result<XmlEvent> {
        loop {
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf)?;
            match event {
                Event::Start(ref e) => {
                    let start = e.to_owned();
                    return self.parse_start(&start);
                }
                Event::End(ref e) => {
                    let (ns, local) = self.reader.resolve_element(e.name());
                    let name = qualified(ns, local.as_ref())?;
                    return Ok(XmlEvent::End { name });
                }
                Event::Empty(_) => {
                    // expand_empty_elements is set, so this does not occur
                    return Err(Error::Parse("unexpected empty element event".into()));
                }
                Event::Text(e) => {
                    let raw =
                        std::str::from_utf8(e.as_ref()).map_err(|e| Error::Parse(e.to_string()))?;
                    let text = unescape(raw).map_err(|e| Error::Parse(e.to_string()))?;
                    return Ok(XmlEvent::Text(text.into_owned()));
                }
                Event::CData(e) => {
                    return Ok(XmlEvent::Text(String::from_utf8_lossy(e.as_ref()).into_owned()));
                }
                Event::GeneralRef(e) => {
                    if let Some(ch) = e
                        .resolve_char_ref()
                        .map_err(|e| Error::Parse(e.to_string()))?
                    {
                        return Ok(XmlEvent::Text(ch.to_string()));
                    }
                    let entity = e.decode().map_err(|e| Error::Parse(e.to_string()))?;
                    return match resolve_predefined_entity(&entity) {
                        Some(text) => Ok(XmlEvent::Text(text.to_string())),
                        None => Err(Error::Parse(format!("unknown entity &{};", entity))),
                    };
                }
                Event::Eof => return Ok(XmlEvent::EndDocument),
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }
    }

    /// Resolves a start tag's name and attributes.
    fn parse_start(&self, e: &BytesStart) -> Result<XmlEvent> {
        let (ns, local) = self.reader.resolve_element(e.name());
        let name = qualified(ns, local.as_ref())?;

        let mut attributes = Attributes::new();
        for attr_result in e.attributes() {
            let attr = attr_result.map_err(quick_xml::Error::from)?;
            let raw_key =
                std::str::from_utf8(attr.key.as_ref()).map_err(|e| Error::Parse(e.to_string()))?;
            if is_xmlns_attr(raw_key) {
                continue;
            }
            let (ns, local) = self.reader.resolve_attribute(attr.key);
            let key = qualified(ns, local.as_ref())?;
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Parse(e.to_string()))?
                .into_owned();
            attributes.insert(key, value);
        }

        Ok(XmlEvent::Start { name, attributes })
    }
}

impl<R: BufRead> EventSource for XmlSource<R> {
    fn next_event(&mut self) -> Result<XmlEvent> {
        if self.finished {
            return Ok(XmlEvent::EndDocument);
        }
        let first = match self.lookahead.take() {
            Some(event) => event,
            None => self.read_piece()?,
        };
        let XmlEvent::Text(mut text) = first else {
            self.finished = first == XmlEvent::EndDocument;
            return Ok(first);
        };
        // Merge text, CDATA and entity pieces into a single text event
        loop {
            match self.read_piece()? {
                XmlEvent::Text(more) => text.push_str(&more),
                other => {
                    self.lookahead = Some(other);
                    return Ok(XmlEvent::Text(text));
                }
            }
        }
    }
}

/// Builds a qualified name from a namespace resolution result.
fn qualified(ns: ResolveResult, local: &[u8]) -> Result<QName> {
    let local = std::str::from_utf8(local).map_err(|e| Error::Parse(e.to_string()))?;
    match ns {
        ResolveResult::Bound(ns) => {
            let uri: Cow<str> = String::from_utf8_lossy(ns.into_inner());
            Ok(QName::new(uri, local))
        }
        ResolveResult::Unbound => Ok(QName::local(local)),
        ResolveResult::Unknown(prefix) => Err(Error::Parse(format!(
            "unknown namespace prefix {:?}",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

/// Event source over a prepared list of events.
#[derive(Debug, Clone, Default)]
pub struct EventList {
    events: VecDeque<XmlEvent>,
}

impl EventList {
    /// Creates a source that yields `events` and then end of document.
    pub fn new(events: impl IntoIterator<Item = XmlEvent>) -> Self {
        EventList {
            events: events.into_iter().collect(),
        }
    }
}

impl EventSource for EventList {
    fn next_event(&mut self) -> Result<XmlEvent> {
        Ok(self.events.pop_front().unwrap_or(XmlEvent::EndDocument))
    }
}

/// Reads every event of a document into a list.
pub fn collect_events(source: &mut impl EventSource) -> Result<Vec<XmlEvent>> {
    let mut events = Vec::new();
    loop {
        let event = source.next_event()?;
        if event == XmlEvent::EndDocument {
            return Ok(events);
        }
        events.push(event);
    }
}
