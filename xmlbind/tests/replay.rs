//! Replay fidelity of the record-and-playback reader over real documents.

use xmlbind::xml::{collect_events, EventList, RecordingReader, Tag, XmlEvent, XmlSource};

const DOCUMENT: &str = r#"<?xml version="1.0"?>
<order id="17" xmlns:p="urn:products">
  <customer>Ann &amp; Bob</customer>
  <p:item sku="a1"><p:qty>2</p:qty></p:item>
  <p:item sku="b2"><p:qty>5</p:qty><note><![CDATA[fragile]]></note></p:item>
</order>"#;

fn document_events() -> Vec<XmlEvent> {
    collect_events(&mut XmlSource::from_str(DOCUMENT)).unwrap()
}

/// Reads `count` events, returning copies along with the depth after each.
fn read<S: xmlbind::EventSource>(
    reader: &mut RecordingReader<S>,
    count: usize,
) -> Vec<(XmlEvent, usize)> {
    (0..count)
        .map(|_| {
            let event = reader.next_event().unwrap().clone();
            (event, reader.depth())
        })
        .collect()
}

#[test]
fn test_replay_matches_original_read_at_every_position() {
    let events = document_events();
    let total = events.len() + 1;

    for skip in 0..total {
        for span in 0..=(total - skip) {
            let mut reader = RecordingReader::new(XmlSource::from_str(DOCUMENT));
            read(&mut reader, skip);
            let marker = reader.start_recording();
            let first = read(&mut reader, span);
            reader.rewind_and_playback(marker).unwrap();
            let replayed = read(&mut reader, span);
            assert_eq!(first, replayed, "skip {} span {}", skip, span);

            // Reading on after the replay continues the original stream
            let rest = read(&mut reader, total - skip - span);
            let mut straight = RecordingReader::new(EventList::new(events.clone()));
            let expected = read(&mut straight, total);
            let mut seen: Vec<_> = expected[..skip].to_vec();
            seen.extend(replayed);
            seen.extend(rest);
            assert_eq!(seen, expected, "skip {} span {}", skip, span);
        }
    }
}

#[test]
fn test_nested_markers_replay_independently() {
    let events = document_events();
    let total = events.len();

    for outer_at in 0..total {
        for inner_after in 0..(total - outer_at) {
            let inner_span = total - outer_at - inner_after;
            let mut reader = RecordingReader::new(EventList::new(events.clone()));
            read(&mut reader, outer_at);

            let outer = reader.start_recording();
            let before_inner = read(&mut reader, inner_after);
            let inner = reader.start_recording();
            let inner_events = read(&mut reader, inner_span);

            reader.rewind_and_playback(inner).unwrap();
            assert_eq!(read(&mut reader, inner_span), inner_events);
            assert!(!reader.is_marker_obsolete(outer));

            reader.rewind_and_playback(outer).unwrap();
            let mut all = before_inner.clone();
            all.extend(inner_events);
            assert_eq!(read(&mut reader, inner_after + inner_span), all);
            assert!(!reader.is_recording());
            assert!(!reader.is_playing_back());
        }
    }
}

#[test]
fn test_stopped_inner_marker_keeps_outer_recording() {
    let mut reader = RecordingReader::new(XmlSource::from_str(DOCUMENT));
    assert_eq!(reader.next_tag().unwrap(), Tag::Start);

    let outer = reader.start_recording();
    assert_eq!(reader.next_tag().unwrap(), Tag::Start);
    let inner = reader.start_recording();
    assert_eq!(reader.element_text().unwrap(), "Ann & Bob");
    reader.stop_recording(inner).unwrap();
    assert!(reader.is_marker_obsolete(inner));

    reader.rewind_and_playback(outer).unwrap();
    assert_eq!(reader.depth(), 1);
    assert_eq!(reader.next_tag().unwrap(), Tag::Start);
    assert_eq!(reader.name().unwrap().local_name(), "customer");
    assert_eq!(reader.element_text().unwrap(), "Ann & Bob");
}

#[test]
fn test_rewind_restores_attributes_of_current_element() {
    let mut reader = RecordingReader::new(XmlSource::from_str(DOCUMENT));
    reader.next_tag().unwrap();
    reader.next_tag().unwrap();
    reader.skip_element().unwrap();
    reader.next_tag().unwrap();
    assert_eq!(reader.name().unwrap().local_name(), "item");

    let marker = reader.start_recording();
    reader.skip_element().unwrap();
    reader.rewind_and_playback(marker).unwrap();

    let sku = reader
        .attributes()
        .unwrap()
        .iter()
        .find(|(name, _)| name.local_name() == "sku")
        .map(|(_, value)| value.clone());
    assert_eq!(sku.as_deref(), Some("a1"));
    assert_eq!(
        reader.name().unwrap().namespace(),
        Some("urn:products")
    );
}

#[test]
fn test_obsolete_markers_are_rejected() {
    let mut reader = RecordingReader::new(EventList::new(document_events()));
    let outer = reader.start_recording();
    read(&mut reader, 2);
    let inner = reader.start_recording();
    read(&mut reader, 2);

    reader.rewind_and_playback(outer).unwrap();
    assert!(reader.is_marker_obsolete(inner));
    assert!(reader.rewind_and_playback(inner).is_err());
    assert!(reader.stop_recording(outer).is_err());
}
