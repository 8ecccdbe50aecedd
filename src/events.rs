//! Parse events and the event-source abstraction the constructors consume.
//!
//! Events are owned and carry their [`Span`]. A scanner (see the `parser` feature) or a
//! hand-built vector ([`ReplayEvents`]) feeds them to the engine through [`EventSource`].

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::location::Span;

/// Presentation style of a scalar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ScalarStyle {
    /// Let the consumer choose.
    #[default]
    Any,
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

impl ScalarStyle {
    pub fn is_quoted(self) -> bool {
        matches!(self, ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted)
    }

    /// Plain or unspecified: the scalar is subject to implicit typing.
    pub fn is_plain(self) -> bool {
        matches!(self, ScalarStyle::Plain | ScalarStyle::Any)
    }
}

/// Presentation style of a sequence or mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CollectionStyle {
    #[default]
    Any,
    Block,
    Flow,
}

/// One parse event.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    StreamStart {
        span: Span,
    },
    StreamEnd {
        span: Span,
    },
    DocumentStart {
        implicit: bool,
        span: Span,
    },
    DocumentEnd {
        implicit: bool,
        span: Span,
    },
    Scalar {
        value: String,
        style: ScalarStyle,
        tag: Option<String>,
        anchor: Option<String>,
        span: Span,
    },
    SequenceStart {
        style: CollectionStyle,
        tag: Option<String>,
        anchor: Option<String>,
        span: Span,
    },
    SequenceEnd {
        span: Span,
    },
    MappingStart {
        style: CollectionStyle,
        tag: Option<String>,
        anchor: Option<String>,
        span: Span,
    },
    MappingEnd {
        span: Span,
    },
    Alias {
        name: String,
        span: Span,
    },
}

/// Fieldless discriminant of [`Event`], used for `accept`/`expect` checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    StreamStart,
    StreamEnd,
    DocumentStart,
    DocumentEnd,
    Scalar,
    SequenceStart,
    SequenceEnd,
    MappingStart,
    MappingEnd,
    Alias,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::StreamStart => "stream start",
            EventKind::StreamEnd => "stream end",
            EventKind::DocumentStart => "document start",
            EventKind::DocumentEnd => "document end",
            EventKind::Scalar => "scalar",
            EventKind::SequenceStart => "sequence start",
            EventKind::SequenceEnd => "sequence end",
            EventKind::MappingStart => "mapping start",
            EventKind::MappingEnd => "mapping end",
            EventKind::Alias => "alias",
        }
    }

    /// True for the events that begin a node.
    pub fn starts_node(self) -> bool {
        matches!(
            self,
            EventKind::Scalar | EventKind::SequenceStart | EventKind::MappingStart | EventKind::Alias
        )
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::StreamStart { .. } => EventKind::StreamStart,
            Event::StreamEnd { .. } => EventKind::StreamEnd,
            Event::DocumentStart { .. } => EventKind::DocumentStart,
            Event::DocumentEnd { .. } => EventKind::DocumentEnd,
            Event::Scalar { .. } => EventKind::Scalar,
            Event::SequenceStart { .. } => EventKind::SequenceStart,
            Event::SequenceEnd { .. } => EventKind::SequenceEnd,
            Event::MappingStart { .. } => EventKind::MappingStart,
            Event::MappingEnd { .. } => EventKind::MappingEnd,
            Event::Alias { .. } => EventKind::Alias,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Event::StreamStart { span }
            | Event::StreamEnd { span }
            | Event::DocumentStart { span, .. }
            | Event::DocumentEnd { span, .. }
            | Event::Scalar { span, .. }
            | Event::SequenceStart { span, .. }
            | Event::SequenceEnd { span }
            | Event::MappingStart { span, .. }
            | Event::MappingEnd { span }
            | Event::Alias { span, .. } => *span,
        }
    }

    /// Anchor attached to a node event, if any.
    pub fn anchor(&self) -> Option<&str> {
        match self {
            Event::Scalar { anchor, .. }
            | Event::SequenceStart { anchor, .. }
            | Event::MappingStart { anchor, .. } => anchor.as_deref(),
            _ => None,
        }
    }

    /// Tag attached to a node event, if any.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Event::Scalar { tag, .. }
            | Event::SequenceStart { tag, .. }
            | Event::MappingStart { tag, .. } => tag.as_deref(),
            _ => None,
        }
    }

    /// Plain scalar without anchor or tag.
    pub fn scalar(value: impl Into<String>) -> Self {
        Event::Scalar {
            value: value.into(),
            style: ScalarStyle::Plain,
            tag: None,
            anchor: None,
            span: Span::UNKNOWN,
        }
    }

    /// Scalar with an explicit style.
    pub fn styled_scalar(value: impl Into<String>, style: ScalarStyle) -> Self {
        Event::Scalar {
            value: value.into(),
            style,
            tag: None,
            anchor: None,
            span: Span::UNKNOWN,
        }
    }

    pub fn sequence_start() -> Self {
        Event::SequenceStart {
            style: CollectionStyle::Any,
            tag: None,
            anchor: None,
            span: Span::UNKNOWN,
        }
    }

    pub fn sequence_end() -> Self {
        Event::SequenceEnd { span: Span::UNKNOWN }
    }

    pub fn mapping_start() -> Self {
        Event::MappingStart {
            style: CollectionStyle::Any,
            tag: None,
            anchor: None,
            span: Span::UNKNOWN,
        }
    }

    pub fn mapping_end() -> Self {
        Event::MappingEnd { span: Span::UNKNOWN }
    }

    pub fn alias(name: impl Into<String>) -> Self {
        Event::Alias {
            name: name.into(),
            span: Span::UNKNOWN,
        }
    }

    pub fn document_start() -> Self {
        Event::DocumentStart {
            implicit: true,
            span: Span::UNKNOWN,
        }
    }

    pub fn document_end() -> Self {
        Event::DocumentEnd {
            implicit: true,
            span: Span::UNKNOWN,
        }
    }

    pub fn stream_start() -> Self {
        Event::StreamStart { span: Span::UNKNOWN }
    }

    pub fn stream_end() -> Self {
        Event::StreamEnd { span: Span::UNKNOWN }
    }

    /// Set the anchor of a node event; other events are returned unchanged.
    pub fn anchored(mut self, name: impl Into<String>) -> Self {
        match &mut self {
            Event::Scalar { anchor, .. }
            | Event::SequenceStart { anchor, .. }
            | Event::MappingStart { anchor, .. } => *anchor = Some(name.into()),
            _ => {}
        }
        self
    }

    /// Set the tag of a node event; other events are returned unchanged.
    pub fn tagged(mut self, name: impl Into<String>) -> Self {
        match &mut self {
            Event::Scalar { tag, .. }
            | Event::SequenceStart { tag, .. }
            | Event::MappingStart { tag, .. } => *tag = Some(name.into()),
            _ => {}
        }
        self
    }

    /// Replace the span of the event.
    pub fn at(mut self, new_span: Span) -> Self {
        match &mut self {
            Event::StreamStart { span }
            | Event::StreamEnd { span }
            | Event::DocumentStart { span, .. }
            | Event::DocumentEnd { span, .. }
            | Event::Scalar { span, .. }
            | Event::SequenceStart { span, .. }
            | Event::SequenceEnd { span }
            | Event::MappingStart { span, .. }
            | Event::MappingEnd { span }
            | Event::Alias { span, .. } => *span = new_span,
        }
        self
    }
}

/// Source of events with one-event lookahead.
pub trait EventSource {
    /// Pull the next event from the stream.
    ///
    /// Returns:
    /// - `Ok(Some(Event))` for a real event,
    /// - `Ok(None)` at true end-of-stream,
    /// - `Err(Error)` on scanner failure.
    fn next(&mut self) -> Result<Option<Event>, Error>;

    /// Peek at the next event without consuming it.
    fn peek(&mut self) -> Result<Option<&Event>, Error>;

    /// Span of the last event that `next` or `peek` has observed.
    ///
    /// Used by:
    /// - Error paths to attach a reasonable position when nothing else is available.
    fn last_span(&self) -> Span;

    /// Non-consuming check that the next event is of `kind`.
    fn accept(&mut self, kind: EventKind) -> Result<bool, Error> {
        Ok(self.peek()?.is_some_and(|ev| ev.kind() == kind))
    }

    /// Consume the next event if it is of `kind`; return whether it was consumed.
    fn try_consume(&mut self, kind: EventKind) -> Result<bool, Error> {
        if self.accept(kind)? {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consume the next event, failing unless it is of `kind`.
    fn expect(&mut self, kind: EventKind) -> Result<Event, Error> {
        match self.next()? {
            Some(ev) if ev.kind() == kind => Ok(ev),
            Some(ev) => Err(Error::unexpected(kind.name(), ev.kind().name()).with_span(ev.span())),
            None => Err(Error::eof().with_span(self.last_span())),
        }
    }

    /// Peek, turning end of stream into an error.
    fn peek_required(&mut self) -> Result<&Event, Error> {
        if self.peek()?.is_none() {
            return Err(Error::eof().with_span(self.last_span()));
        }
        match self.peek()? {
            Some(ev) => Ok(ev),
            None => Err(Error::eof()),
        }
    }
}

/// Consume the current node and everything nested in it.
///
/// Called by:
/// - Object construction when an unmatched key is skipped.
pub fn skip_node(events: &mut dyn EventSource) -> Result<(), Error> {
    let mut depth = 0usize;
    loop {
        let Some(ev) = events.next()? else {
            return Err(Error::eof().with_span(events.last_span()));
        };
        match ev.kind() {
            EventKind::SequenceStart | EventKind::MappingStart => depth += 1,
            EventKind::SequenceEnd | EventKind::MappingEnd => {
                if depth == 0 {
                    return Err(Error::msg("list or mapping end with no start").with_span(ev.span()));
                }
                depth -= 1;
            }
            EventKind::Scalar | EventKind::Alias => {}
            other => {
                return Err(Error::unexpected("node", other.name()).with_span(ev.span()));
            }
        }
        if depth == 0 {
            return Ok(());
        }
    }
}

/// Event source that replays a pre-recorded buffer.
#[derive(Clone, Debug, Default)]
pub struct ReplayEvents {
    last_span: Span,
    buf: VecDeque<Event>,
}

impl ReplayEvents {
    /// Create a replay source over `buf`, positioned at its first event.
    pub fn new(buf: Vec<Event>) -> Self {
        Self {
            last_span: buf.first().map(Event::span).unwrap_or(Span::UNKNOWN),
            buf: VecDeque::from(buf),
        }
    }

    /// Events not consumed yet.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }
}

impl From<Vec<Event>> for ReplayEvents {
    fn from(buf: Vec<Event>) -> Self {
        Self::new(buf)
    }
}

impl EventSource for ReplayEvents {
    fn next(&mut self) -> Result<Option<Event>, Error> {
        match self.buf.pop_front() {
            Some(ev) => {
                self.last_span = ev.span();
                Ok(Some(ev))
            }
            None => Ok(None),
        }
    }

    fn peek(&mut self) -> Result<Option<&Event>, Error> {
        if let Some(ev) = self.buf.front() {
            self.last_span = ev.span();
        }
        Ok(self.buf.front())
    }

    fn last_span(&self) -> Span {
        self.last_span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Location;

    #[test]
    fn accept_does_not_consume() {
        let mut src = ReplayEvents::new(vec![Event::scalar("a"), Event::scalar("b")]);
        assert!(src.accept(EventKind::Scalar).unwrap());
        assert!(!src.accept(EventKind::MappingStart).unwrap());
        assert_eq!(src.remaining(), 2);
        assert!(src.try_consume(EventKind::Scalar).unwrap());
        assert_eq!(src.remaining(), 1);
    }

    #[test]
    fn expect_reports_found_kind_and_position() {
        let at = Span::at(Location::new(3, 4));
        let mut src = ReplayEvents::new(vec![Event::sequence_start().at(at)]);
        let err = src.expect(EventKind::MappingStart).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected event: expected mapping start, found sequence start at line 3, column 4"
        );
        assert!(matches!(src.expect(EventKind::Scalar), Err(Error::Eof { .. })));
    }

    #[test]
    fn skip_node_consumes_balanced_events() {
        let mut src = ReplayEvents::new(vec![
            Event::mapping_start(),
            Event::scalar("k"),
            Event::sequence_start(),
            Event::scalar("1"),
            Event::alias("x"),
            Event::sequence_end(),
            Event::mapping_end(),
            Event::scalar("after"),
        ]);
        skip_node(&mut src).unwrap();
        assert_eq!(src.remaining(), 1);
        skip_node(&mut src).unwrap();
        assert_eq!(src.remaining(), 0);
        assert!(skip_node(&mut src).is_err());
    }

    #[test]
    fn builders_set_anchor_and_tag_on_nodes_only() {
        let ev = Event::scalar("1").anchored("x").tagged("!!int");
        assert_eq!(ev.anchor(), Some("x"));
        assert_eq!(ev.tag(), Some("!!int"));
        let end = Event::mapping_end().anchored("y");
        assert_eq!(end.anchor(), None);
    }
}
