//!
//! Parser events: a compact layer over the YAML event stream from `saphyr_parser::Parser`.
//!
//! Responsibilities
//! - Provide owned events ([`Event`]) for the constructors and the document model.
//! - Keep stream and document markers: the consumers decide what to do with them.
//! - Translate numeric anchor ids into anchor names.
//! - Track source locations for diagnostics.
//!
//! Anchors and aliases
//! - The scanner reports anchors as positive ids (0 means "no anchor") and resolves alias
//!   names to the same ids. Ids become the anchor names seen by the consumers, so an alias
//!   always names the anchor it refers to. The textual anchor name is not preserved.
//! - Aliases are passed through untouched; resolving them is the consumer's job.

use saphyr_parser::{Event as RawEvent, Parser, ScalarStyle as RawScalarStyle, StrInput};

use crate::error::Error;
use crate::events::{CollectionStyle, Event, EventSource, ScalarStyle};
use crate::location::{Span, span_from_parser};

/// Event source that wraps `saphyr_parser::Parser`.
pub struct ParserEvents<'a> {
    /// Underlying streaming parser that produces raw events from the input.
    parser: Parser<'a, StrInput<'a>>,
    /// Single-item lookahead buffer (peeked event not yet consumed).
    look: Option<Event>,
    /// Span of the last yielded event (for better error reporting).
    last_span: Span,
}

impl<'a> ParserEvents<'a> {
    /// Create a new event source over a YAML string.
    pub fn new(input: &'a str) -> Self {
        Self {
            parser: Parser::new_from_str(input),
            look: None,
            last_span: Span::UNKNOWN,
        }
    }

    /// Pull the next raw event and translate it. `Ok(None)` on true EOF.
    fn next_impl(&mut self) -> Result<Option<Event>, Error> {
        while let Some(item) = self.parser.next() {
            let (raw, span) = item.map_err(Error::from_scan_error)?;
            let span = span_from_parser(&span);
            let ev = match raw {
                RawEvent::StreamStart => Event::StreamStart { span },
                RawEvent::StreamEnd => Event::StreamEnd { span },
                RawEvent::DocumentStart(explicit) => Event::DocumentStart {
                    implicit: !explicit,
                    span,
                },
                RawEvent::DocumentEnd => Event::DocumentEnd {
                    implicit: true,
                    span,
                },
                RawEvent::Scalar(val, style, anchor_id, tag) => Event::Scalar {
                    value: val.into_owned(),
                    style: scalar_style(style),
                    tag: tag.map(|t| t.to_string()),
                    anchor: anchor_name(anchor_id),
                    span,
                },
                RawEvent::SequenceStart(anchor_id, tag) => Event::SequenceStart {
                    style: CollectionStyle::Any,
                    tag: tag.map(|t| t.to_string()),
                    anchor: anchor_name(anchor_id),
                    span,
                },
                RawEvent::SequenceEnd => Event::SequenceEnd { span },
                RawEvent::MappingStart(anchor_id, tag) => Event::MappingStart {
                    style: CollectionStyle::Any,
                    tag: tag.map(|t| t.to_string()),
                    anchor: anchor_name(anchor_id),
                    span,
                },
                RawEvent::MappingEnd => Event::MappingEnd { span },
                RawEvent::Alias(anchor_id) => Event::Alias {
                    name: anchor_id.to_string(),
                    span,
                },
                RawEvent::Nothing => continue,
            };
            return Ok(Some(ev));
        }
        Ok(None)
    }
}

fn anchor_name(id: usize) -> Option<String> {
    (id != 0).then(|| id.to_string())
}

fn scalar_style(style: RawScalarStyle) -> ScalarStyle {
    match style {
        RawScalarStyle::Plain => ScalarStyle::Plain,
        RawScalarStyle::SingleQuoted => ScalarStyle::SingleQuoted,
        RawScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
        RawScalarStyle::Literal => ScalarStyle::Literal,
        RawScalarStyle::Folded => ScalarStyle::Folded,
    }
}

impl EventSource for ParserEvents<'_> {
    /// Get the next event, using the lookahead buffer if present.
    fn next(&mut self) -> Result<Option<Event>, Error> {
        let ev = match self.look.take() {
            Some(ev) => Some(ev),
            None => self.next_impl()?,
        };
        if let Some(ev) = &ev {
            self.last_span = ev.span();
        }
        Ok(ev)
    }

    /// Peek at the next event without consuming it, filling the lookahead buffer if empty.
    fn peek(&mut self) -> Result<Option<&Event>, Error> {
        if self.look.is_none() {
            self.look = self.next_impl()?;
        }
        if let Some(ev) = &self.look {
            self.last_span = ev.span();
        }
        Ok(self.look.as_ref())
    }

    fn last_span(&self) -> Span {
        self.last_span
    }
}
