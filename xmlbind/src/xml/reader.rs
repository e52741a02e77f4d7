//! Record-and-playback reader.
//!
//! Wraps a forward-only [`EventSource`] and adds nested marks: while at least
//! one marker is active every delivered event is kept on a tape, and
//! rewinding to a marker moves the reader back to the tape position the
//! marker was taken at. Events after that position are then replayed before
//! the live source is consulted again.
//!
//! The tape is shared by all markers. A marker is just a tape position plus
//! the positional state (current event, depth) at the time it was taken, so
//! an outer recording keeps accumulating while inner markers come and go.

use tracing::trace;

use super::namespace::QName;
use super::source::{Attributes, EventSource, XmlEvent};
use crate::error::{Error, Result};

/// Opaque handle to a recorded position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Marker(u64);

/// The kind of event [`RecordingReader::next_tag`] stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Start,
    End,
    EndDocument,
}

#[derive(Debug)]
struct MarkState {
    id: u64,
    /// Tape index of the first event delivered after the mark.
    position: usize,
    current: Option<XmlEvent>,
    depth: usize,
}

/// A reader that can mark positions and rewind to them.
pub struct RecordingReader<S: EventSource> {
    source: S,
    /// Events delivered while recording; `tape[cursor..]` is the playback queue.
    tape: Vec<XmlEvent>,
    cursor: usize,
    /// Active markers, oldest first.
    markers: Vec<MarkState>,
    next_marker: u64,
    current: Option<XmlEvent>,
    /// Number of open elements after the current event.
    depth: usize,
}

impl<S: EventSource> RecordingReader<S> {
    /// Wraps an event source.
    pub fn new(source: S) -> Self {
        RecordingReader {
            source,
            tape: Vec::new(),
            cursor: 0,
            markers: Vec::new(),
            next_marker: 1,
            current: None,
            depth: 0,
        }
    }

    /// Delivers the next raw event: from the playback queue if one is
    /// pending, otherwise from the source.
    pub fn next_event(&mut self) -> Result<&XmlEvent> {
        let event = if self.cursor < self.tape.len() {
            let event = self.tape[self.cursor].clone();
            self.cursor += 1;
            event
        } else {
            let event = self.source.next_event()?;
            if !self.markers.is_empty() {
                self.tape.push(event.clone());
                self.cursor += 1;
            }
            event
        };
        self.compact();

        match event {
            XmlEvent::Start { .. } => self.depth += 1,
            XmlEvent::End { .. } => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        Ok(self.current.insert(event))
    }

    /// Advances to the next start tag, end tag or end of document, skipping
    /// whitespace. Non-whitespace text is a stream state error.
    pub fn next_tag(&mut self) -> Result<Tag> {
        loop {
            match self.next_event()? {
                XmlEvent::Start { .. } => return Ok(Tag::Start),
                XmlEvent::End { .. } => return Ok(Tag::End),
                XmlEvent::EndDocument => return Ok(Tag::EndDocument),
                XmlEvent::Text(text) if text.trim().is_empty() => {}
                XmlEvent::Text(text) => {
                    return Err(Error::StreamState(format!(
                        "unexpected text {:?} where a tag was expected",
                        text.trim()
                    )))
                }
            }
        }
    }

    /// Returns the current event, if any has been read.
    pub fn current(&self) -> Option<&XmlEvent> {
        self.current.as_ref()
    }

    /// Returns the element nesting depth after the current event.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns true if the current event is a start tag.
    pub fn is_start_element(&self) -> bool {
        matches!(self.current, Some(XmlEvent::Start { .. }))
    }

    /// Returns the name of the current start or end tag.
    pub fn name(&self) -> Result<&QName> {
        self.current
            .as_ref()
            .and_then(XmlEvent::name)
            .ok_or_else(|| self.state_error("name() requires a start or end tag"))
    }

    /// Returns the attributes of the current start tag.
    pub fn attributes(&self) -> Result<&Attributes> {
        match &self.current {
            Some(XmlEvent::Start { attributes, .. }) => Ok(attributes),
            _ => Err(self.state_error("attributes() requires a start tag")),
        }
    }

    /// Reads the text content of the current text-only element and leaves
    /// the reader on its end tag.
    pub fn element_text(&mut self) -> Result<String> {
        if !self.is_start_element() {
            return Err(self.state_error("element_text() requires a start tag"));
        }
        let mut text = String::new();
        loop {
            match self.next_event()? {
                XmlEvent::Text(piece) => text.push_str(piece),
                XmlEvent::End { .. } => return Ok(text),
                XmlEvent::Start { name, .. } => {
                    return Err(Error::StreamState(format!(
                        "element_text() found child element <{}>",
                        name
                    )))
                }
                XmlEvent::EndDocument => {
                    return Err(Error::Parse("document ended inside an element".into()))
                }
            }
        }
    }

    /// Consumes the current element and its whole subtree, leaving the
    /// reader on its end tag.
    pub fn skip_element(&mut self) -> Result<()> {
        if !self.is_start_element() {
            return Err(self.state_error("skip_element() requires a start tag"));
        }
        let target = self.depth - 1;
        loop {
            let closed = match self.next_event()? {
                XmlEvent::EndDocument => {
                    return Err(Error::Parse("document ended inside an element".into()))
                }
                XmlEvent::End { .. } => true,
                _ => false,
            };
            if closed && self.depth == target {
                return Ok(());
            }
        }
    }

    /// Starts recording. Every event delivered from now on is kept until the
    /// marker is stopped or rewound.
    pub fn start_recording(&mut self) -> Marker {
        let id = self.next_marker;
        self.next_marker += 1;
        self.markers.push(MarkState {
            id,
            position: self.cursor,
            current: self.current.clone(),
            depth: self.depth,
        });
        Marker(id)
    }

    /// Stops recording for `marker`, committing everything read since.
    /// Markers taken after it stay active.
    pub fn stop_recording(&mut self, marker: Marker) -> Result<()> {
        let index = self.marker_index(marker)?;
        self.markers.remove(index);
        self.compact();
        Ok(())
    }

    /// Moves the reader back to `marker`. Everything read since becomes the
    /// playback queue; `marker` and all markers taken after it become
    /// obsolete.
    pub fn rewind_and_playback(&mut self, marker: Marker) -> Result<()> {
        let index = self.marker_index(marker)?;
        let state = self.markers.swap_remove(index);
        self.markers.truncate(index);
        trace!(
            marker = state.id,
            replay = self.cursor - state.position,
            "rewinding reader"
        );
        self.cursor = state.position;
        self.current = state.current;
        self.depth = state.depth;
        self.compact();
        Ok(())
    }

    /// Returns the number of events delivered since `marker` was taken.
    pub fn recorded_since(&self, marker: Marker) -> Result<usize> {
        let index = self.marker_index(marker)?;
        Ok(self.cursor - self.markers[index].position)
    }

    /// Returns true if `marker` was stopped, rewound, or invalidated by
    /// rewinding an older marker.
    pub fn is_marker_obsolete(&self, marker: Marker) -> bool {
        !self.markers.iter().any(|m| m.id == marker.0)
    }

    /// Returns true if at least one marker is active.
    pub fn is_recording(&self) -> bool {
        !self.markers.is_empty()
    }

    /// Returns true if recorded events are waiting to be replayed.
    pub fn is_playing_back(&self) -> bool {
        self.cursor < self.tape.len()
    }

    /// Closes the reader, discarding pending recordings and releasing the
    /// source.
    pub fn close(mut self) {
        if !self.markers.is_empty() {
            trace!(
                markers = self.markers.len(),
                "closing reader with active recordings"
            );
        }
        self.markers.clear();
        self.tape.clear();
    }

    /// Unwraps the underlying source. Pending playback events are lost.
    pub fn into_inner(self) -> S {
        self.source
    }

    fn marker_index(&self, marker: Marker) -> Result<usize> {
        self.markers
            .iter()
            .position(|m| m.id == marker.0)
            .ok_or_else(|| Error::StreamState(format!("marker #{} is obsolete", marker.0)))
    }

    /// Drops tape events no marker can rewind to anymore.
    fn compact(&mut self) {
        if self.markers.is_empty() && self.cursor > 0 {
            self.tape.drain(..self.cursor);
            self.cursor = 0;
        }
    }

    fn state_error(&self, message: &str) -> Error {
        let position = match &self.current {
            Some(XmlEvent::Start { name, .. }) => format!("<{}>", name),
            Some(XmlEvent::End { name }) => format!("</{}>", name),
            Some(XmlEvent::Text(_)) => "text".to_string(),
            Some(XmlEvent::EndDocument) => "end of document".to_string(),
            None => "start of document".to_string(),
        };
        Error::StreamState(format!("{} (positioned at {})", message, position))
    }
}
