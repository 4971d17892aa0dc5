//! Event document decoding
//!
//! Controller events arrive as XHTML documents. Each event is a list item at
//! `body > div > ul > li` below the root element:
//!
//! ```text
//! <li class="dipc-msg-ev" title="msg">
//!   <a href="/rw/dipc/PC_SDK_Q" rel="self"/>
//!   <span class="dipc-slotid">192</span>
//!   <span class="dipc-data">ping;[TRUE]</span>
//! </li>
//! ```
//!
//! The item's `class` is the event kind, the first `a` child's `href` is the
//! source reference and every `span` child becomes a field.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rws_bridge_domain::{DecodeError, DecodedEvent, EventField};

/// Element path from the document root to an event item, root excluded.
const ITEM_PATH: [&[u8]; 4] = [b"body", b"div", b"ul", b"li"];

/// Decode the first event of a frame.
pub fn decode_event(frame: &[u8]) -> Result<DecodedEvent, DecodeError> {
    decode_events(frame)?.into_iter().next().ok_or(DecodeError::NoEvents)
}

/// Decode every event of a frame in document order.
///
/// # Errors
/// `Malformed` for markup errors, `NoEvents` when the frame holds no list
/// item, `MissingKind` when an item has no `class` attribute.
pub fn decode_events(frame: &[u8]) -> Result<Vec<DecodedEvent>, DecodeError> {
    let mut reader = Reader::from_reader(frame);

    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut events = Vec::new();
    let mut item: Option<ItemBuilder> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(malformed)? {
            Event::Start(start) => {
                let name = start.local_name().as_ref().to_vec();
                let depth = stack.len();
                if let Some(builder) = item.as_mut() {
                    builder.child_start(&start, depth, false)?;
                }
                stack.push(name);
                if item.is_none() && is_item_path(&stack) {
                    item = Some(ItemBuilder::new(&start, stack.len())?);
                }
            }
            Event::Empty(start) => {
                let depth = stack.len();
                if let Some(builder) = item.as_mut() {
                    builder.child_start(&start, depth, true)?;
                } else {
                    stack.push(start.local_name().as_ref().to_vec());
                    if is_item_path(&stack) {
                        events.push(ItemBuilder::new(&start, stack.len())?.finish());
                    }
                    stack.pop();
                }
            }
            Event::Text(text) => {
                if let Some(builder) = item.as_mut() {
                    let text = text.unescape().map_err(malformed)?;
                    builder.text(&text, stack.len());
                }
            }
            Event::CData(data) => {
                if let Some(builder) = item.as_mut() {
                    builder.text(&String::from_utf8_lossy(&data), stack.len());
                }
            }
            Event::End(_) => {
                let depth = stack.len();
                if let Some(builder) = item.as_mut() {
                    if depth == builder.depth {
                        if let Some(done) = item.take() {
                            events.push(done.finish());
                        }
                    } else {
                        builder.child_end(depth);
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(DecodeError::Malformed("unexpected end of document".to_string()));
    }
    if events.is_empty() {
        return Err(DecodeError::NoEvents);
    }
    Ok(events)
}

fn malformed(err: quick_xml::Error) -> DecodeError {
    DecodeError::Malformed(err.to_string())
}

fn is_item_path(stack: &[Vec<u8>]) -> bool {
    stack.len() == ITEM_PATH.len() + 1
        && stack[1..].iter().zip(ITEM_PATH).all(|(name, expected)| name.as_slice() == expected)
}

fn attribute(start: &BytesStart<'_>, name: &str) -> Result<Option<String>, DecodeError> {
    match start.try_get_attribute(name) {
        Ok(Some(attr)) => attr
            .unescape_value()
            .map(|value| Some(value.into_owned()))
            .map_err(malformed),
        Ok(None) => Ok(None),
        Err(err) => Err(malformed(err.into())),
    }
}

/// Accumulates one list item while its children stream past
struct ItemBuilder {
    /// Stack depth of the `li` element itself
    depth: usize,
    kind: String,
    source_ref: Option<String>,
    fields: Vec<EventField>,
    open_span: Option<EventField>,
}

impl ItemBuilder {
    fn new(start: &BytesStart<'_>, depth: usize) -> Result<Self, DecodeError> {
        let kind = attribute(start, "class")?.ok_or(DecodeError::MissingKind)?;
        Ok(Self { depth, kind, source_ref: None, fields: Vec::new(), open_span: None })
    }

    /// `depth` is the stack depth of the parent of `start`.
    fn child_start(
        &mut self,
        start: &BytesStart<'_>,
        depth: usize,
        empty: bool,
    ) -> Result<(), DecodeError> {
        if depth != self.depth {
            return Ok(());
        }
        match start.local_name().as_ref() {
            b"a" => {
                if self.source_ref.is_none() {
                    self.source_ref = attribute(start, "href")?;
                }
            }
            b"span" => {
                let field = EventField::new(attribute(start, "class")?.unwrap_or_default(), "");
                if empty {
                    self.fields.push(field);
                } else {
                    self.open_span = Some(field);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str, depth: usize) {
        if depth == self.depth + 1 {
            if let Some(span) = self.open_span.as_mut() {
                span.value.push_str(text);
            }
        }
    }

    fn child_end(&mut self, depth: usize) {
        if depth == self.depth + 1 {
            if let Some(span) = self.open_span.take() {
                self.fields.push(span);
            }
        }
    }

    fn finish(self) -> DecodedEvent {
        DecodedEvent {
            kind: self.kind,
            source_ref: self.source_ref.unwrap_or_default(),
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ELOG_FRAME: &str = r#"<?xml version="1.0" encoding="utf-8"?><html xmlns="http://www.w3.org/1999/xhtml"><head><title>Event</title><base href="http://10.209.3.22:80/" /></head><body><div class="state"><a href="subscription/12" rel="group"></a><ul><li class="elog-message-ev" title="message"><a href="/rw/elog/0/4050138" rel="self" /><span class="seqnum">4050138</span></li></ul></div></body></html>"#;

    const DIPC_FRAME: &str = r#"<?xml version="1.0" encoding="utf-8"?><html xmlns="http://www.w3.org/1999/xhtml"><head><title>Event</title><base href="http://10.209.3.22:80/" /></head><body><div class="state"><a href="subscription/12" rel="group"></a><ul><li class="dipc-msg-ev" title="msg"><a href="/rw/dipc/PC_SDK_Q" rel="self" title="/rw/dipc/PC_SDK_Q"></a><span class="dipc-slotid">192</span><span class="dipc-data">ping;[TRUE]</span><span class="dipc-userdef">-1</span></li></ul></div></body></html>"#;

    const SIGNAL_FRAME: &str = r#"<?xml version="1.0" encoding="utf-8"?><html xmlns="http://www.w3.org/1999/xhtml"> <head> <title>Event</title><base href="http://10.209.3.22:80/"/> </head> <body>  <div class="state"><a href="subscription/9" rel="group"></a> <ul> <li class="ios-signalstate-ev" title="EtherNetIP/Local_IO/Local_IO_0_DO4"><a href="/rw/iosystem/signals/EtherNetIP/Local_IO/Local_IO_0_DO4;state" rel="self"/><span class="lvalue">0</span><span class="lstate">not simulated</span></li>  </ul> </div> </body></html>"#;

    #[test]
    fn test_decode_log_notification() {
        let event = decode_event(ELOG_FRAME.as_bytes()).unwrap();
        assert_eq!(event.kind, "elog-message-ev");
        assert_eq!(event.source_ref, "/rw/elog/0/4050138");
        assert_eq!(event.fields, vec![EventField::new("seqnum", "4050138")]);
    }

    #[test]
    fn test_decode_ipc_message() {
        let event = decode_event(DIPC_FRAME.as_bytes()).unwrap();
        assert_eq!(event.kind, "dipc-msg-ev");
        assert_eq!(event.source_ref, "/rw/dipc/PC_SDK_Q");
        assert_eq!(event.field("dipc-slotid"), Some("192"));
        assert_eq!(event.field("dipc-data"), Some("ping;[TRUE]"));
        assert_eq!(event.field("dipc-userdef"), Some("-1"));
    }

    #[test]
    fn test_decode_ignores_whitespace_between_elements() {
        let event = decode_event(SIGNAL_FRAME.as_bytes()).unwrap();
        assert_eq!(event.kind, "ios-signalstate-ev");
        assert_eq!(
            event.source_ref,
            "/rw/iosystem/signals/EtherNetIP/Local_IO/Local_IO_0_DO4;state"
        );
        assert_eq!(event.field("lstate"), Some("not simulated"));
    }

    #[test]
    fn test_decode_keeps_span_text_verbatim() {
        let frame = r#"<html><body><div><ul><li class="dipc-msg-ev"><a href="/rw/dipc/PC_SDK_Q"/> <span class="dipc-data">  hello world  </span>
<span class="dipc-userdef">-1</span></li></ul></div></body></html>"#;
        let event = decode_event(frame.as_bytes()).unwrap();
        assert_eq!(
            event.fields,
            vec![EventField::new("dipc-data", "  hello world  "), EventField::new("dipc-userdef", "-1")]
        );
    }

    #[test]
    fn test_decode_multiple_items_in_order() {
        let frame = r#"<html><body><div><ul><li class="a-ev"><a href="/one"/><span class="x">1</span></li><li class="b-ev"><a href="/two"/></li></ul></div></body></html>"#;
        let events = decode_events(frame.as_bytes()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, "a-ev");
        assert_eq!(events[1].source_ref, "/two");
        assert!(events[1].fields.is_empty());
    }

    #[test]
    fn test_decode_keeps_duplicate_fields_and_first_link() {
        let frame = r#"<html><body><div><ul><li class="k"><a href="/first"/><a href="/second"/><span class="v">1</span><span class="v">2</span><span class="empty"/></li></ul></div></body></html>"#;
        let event = decode_event(frame.as_bytes()).unwrap();
        assert_eq!(event.source_ref, "/first");
        assert_eq!(
            event.fields,
            vec![EventField::new("v", "1"), EventField::new("v", "2"), EventField::new("empty", "")]
        );
    }

    #[test]
    fn test_decode_ignores_items_outside_event_list() {
        let frame = r#"<html><body><ul><li class="wrong"/></ul><div><div><ul><li class="nested"/></ul></div></div></body></html>"#;
        assert_eq!(decode_events(frame.as_bytes()), Err(DecodeError::NoEvents));
    }

    #[test]
    fn test_decode_without_items_fails() {
        let frame = r#"<html><body><div class="state"><ul></ul></div></body></html>"#;
        assert_eq!(decode_event(frame.as_bytes()), Err(DecodeError::NoEvents));
    }

    #[test]
    fn test_decode_missing_class_fails() {
        let frame = r#"<html><body><div><ul><li><a href="/x"/></li></ul></div></body></html>"#;
        assert_eq!(decode_event(frame.as_bytes()), Err(DecodeError::MissingKind));
    }

    #[test]
    fn test_decode_malformed_fails() {
        assert!(matches!(
            decode_event(b"<html><body><div><ul><li class=\"x\"></ul>"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode_event(b"<html><body><div><ul><li class=\"x\">"),
            Err(DecodeError::Malformed(_))
        ));
        assert_eq!(decode_event(b""), Err(DecodeError::NoEvents));
    }
}
