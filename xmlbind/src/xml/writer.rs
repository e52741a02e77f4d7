//! Minimal stream writer.
//!
//! Emits elements, attributes and text in document order. A start tag stays
//! open until the first child, text, or end tag is written, so attributes can
//! be added after the element itself. Namespace prefixes are assigned on
//! first use and reused for the rest of the session.

use std::io::Write;

use super::namespace::{PrefixMap, QName};
use crate::error::{Error, Result};

/// Options for the stream writer.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Whether to pretty-print with indentation.
    pub pretty_print: bool,
    /// Whether to start the document with an XML declaration.
    pub xml_declaration: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            pretty_print: false,
            xml_declaration: true,
        }
    }
}

#[derive(Debug)]
struct OpenElement {
    name: QName,
    /// Prefixed tag as written.
    tag: String,
    /// Written with `is_empty`; closed automatically by the next write.
    empty: bool,
    has_children: bool,
}

/// Writes XML to an [`io::Write`](std::io::Write) sink.
pub struct StreamWriter<W: Write> {
    writer: W,
    options: WriterOptions,
    prefixes: PrefixMap,
    open: Vec<OpenElement>,
    /// Whether the innermost start tag still lacks its closing `>`.
    tag_open: bool,
    started: bool,
    root_closed: bool,
}

impl<W: Write> StreamWriter<W> {
    /// Creates a new writer.
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, WriterOptions::default())
    }

    /// Creates a new writer with the given options.
    pub fn with_options(writer: W, options: WriterOptions) -> Self {
        StreamWriter {
            writer,
            options,
            prefixes: PrefixMap::new(),
            open: Vec::new(),
            tag_open: false,
            started: false,
            root_closed: false,
        }
    }

    /// Writes a start tag. An element written with `is_empty` takes
    /// attributes but no content and needs no [`close_element`](Self::close_element).
    pub fn write_element(&mut self, name: &QName, is_empty: bool) -> Result<()> {
        self.start_document()?;
        self.close_pending_empty()?;
        if self.open.is_empty() && self.root_closed {
            return Err(Error::StreamState(format!(
                "second root element <{}>",
                name
            )));
        }
        self.finish_start_tag()?;

        if let Some(parent) = self.open.last_mut() {
            parent.has_children = true;
        }
        if self.options.pretty_print && !self.open.is_empty() {
            write!(self.writer, "\n{}", Self::indent_str(self.open.len()))?;
        }

        self.prefixes.push_scope();
        let mut declarations = String::new();
        let tag = self.prefixed(name, &mut declarations);
        write!(self.writer, "<{}{}", tag, declarations)?;

        self.open.push(OpenElement {
            name: name.clone(),
            tag,
            empty: is_empty,
            has_children: false,
        });
        self.tag_open = true;
        Ok(())
    }

    /// Adds an attribute to the start tag of `owner`, which must be the most
    /// recently written element with no content yet.
    pub fn write_attribute(&mut self, owner: &QName, name: &QName, value: &str) -> Result<()> {
        match self.open.last() {
            Some(top) if self.tag_open && &top.name == owner => {}
            _ => {
                return Err(Error::StreamState(format!(
                    "attribute {} written outside the start tag of <{}>",
                    name, owner
                )))
            }
        }
        let mut declarations = String::new();
        let key = match name.namespace() {
            Some(_) => self.prefixed(name, &mut declarations),
            None => name.local_name().to_string(),
        };
        write!(
            self.writer,
            "{} {}=\"{}\"",
            declarations,
            key,
            to_entities(value)
        )?;
        Ok(())
    }

    /// Returns the element whose start tag still accepts attributes.
    pub fn open_start_tag(&self) -> Option<&QName> {
        self.open
            .last()
            .filter(|_| self.tag_open)
            .map(|top| &top.name)
    }

    /// Writes character data into the current element.
    pub fn write_content(&mut self, text: &str) -> Result<()> {
        self.close_pending_empty()?;
        if self.open.is_empty() {
            return Err(Error::StreamState(
                "content written outside the root element".into(),
            ));
        }
        self.finish_start_tag()?;
        write!(self.writer, "{}", to_entities(text))?;
        Ok(())
    }

    /// Writes the end tag of `name`, which must be the innermost open element.
    pub fn close_element(&mut self, name: &QName) -> Result<()> {
        self.close_pending_empty()?;
        match self.open.last() {
            Some(top) if &top.name == name => {}
            Some(top) => {
                return Err(Error::StreamState(format!(
                    "closing <{}> while <{}> is open",
                    name, top.name
                )))
            }
            None => {
                return Err(Error::StreamState(format!(
                    "closing <{}> with no open element",
                    name
                )))
            }
        }
        self.end_innermost()
    }

    /// Closes an element written with `is_empty`, if it is still open.
    fn close_pending_empty(&mut self) -> Result<()> {
        if self.open.last().is_some_and(|top| top.empty) {
            self.end_innermost()?;
        }
        Ok(())
    }

    fn end_innermost(&mut self) -> Result<()> {
        let Some(element) = self.open.pop() else {
            return Ok(());
        };
        if self.tag_open {
            write!(self.writer, " />")?;
            self.tag_open = false;
        } else {
            if self.options.pretty_print && element.has_children {
                write!(self.writer, "\n{}", Self::indent_str(self.open.len()))?;
            }
            write!(self.writer, "</{}>", element.tag)?;
        }
        self.prefixes.pop_scope();
        self.root_closed = self.open.is_empty();
        Ok(())
    }

    /// Finishes the document; every element must be closed.
    pub fn finish(&mut self) -> Result<()> {
        self.close_pending_empty()?;
        if let Some(top) = self.open.last() {
            return Err(Error::StreamState(format!(
                "document finished with <{}> still open",
                top.name
            )));
        }
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn start_document(&mut self) -> Result<()> {
        if !self.started {
            self.started = true;
            if self.options.xml_declaration {
                write!(self.writer, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
                if self.options.pretty_print {
                    writeln!(self.writer)?;
                }
            }
        }
        Ok(())
    }

    fn finish_start_tag(&mut self) -> Result<()> {
        if self.tag_open {
            write!(self.writer, ">")?;
            self.tag_open = false;
        }
        Ok(())
    }

    /// Returns the prefixed form of `name`, appending any namespace
    /// declaration it needs to `declarations`.
    fn prefixed(&mut self, name: &QName, declarations: &mut String) -> String {
        match name.namespace() {
            Some(uri) => {
                let (prefix, declare) = self.prefixes.prefix_for(uri);
                if declare {
                    declarations.push_str(&format!(" xmlns:{}=\"{}\"", prefix, to_entities(uri)));
                }
                format!("{}:{}", prefix, name.local_name())
            }
            None => name.local_name().to_string(),
        }
    }

    fn indent_str(level: usize) -> String {
        "  ".repeat(level)
    }
}

/// Converts special characters to XML entities.
fn to_entities(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '\'' => result.push_str("&apos;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}
