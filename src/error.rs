//! The crate error type and its positions.
use std::fmt;

#[cfg(feature = "parser")]
use saphyr_parser::ScanError;
use serde::de;

use crate::location::{Location, Span};

/// Error type for construction, document loading and representation.
///
/// Every variant that can be traced to a particular event carries a [`Span`]. Errors are
/// usually created with [`Span::UNKNOWN`] deep inside a helper and enriched with
/// [`Error::with_span`] by the caller that knows which event was being processed.
#[derive(Debug)]
pub enum Error {
    /// Free-form error with optional source location.
    Message { msg: String, span: Span },
    /// Scalar text does not match the grammar of the requested type.
    Format { msg: String, span: Span },
    /// Scalar is syntactically valid but the value is too large for the target.
    Overflow { msg: String, span: Span },
    /// No construction strategy accepts the event, or a key has no matching member.
    Shape { msg: String, span: Span },
    /// A mapping reuses a key while duplicate checking is enabled.
    DuplicateKey { key: String, span: Span },
    /// An alias references an anchor that is never defined in the document.
    UnknownAnchor { name: String, span: Span },
    /// An alias resolved later than its use, inside a collection that cannot be patched.
    ForwardReferenceUnsupported { type_name: String, span: Span },
    /// The configured nesting bound was exceeded.
    RecursionLimit { max: usize, span: Span },
    /// Error raised by user-level construction logic, re-raised with the position
    /// of the key (or mapping) being constructed.
    Construction {
        type_name: String,
        source: Box<Error>,
        span: Span,
    },
    /// Unexpected end of the event stream.
    Eof { span: Span },
    /// Structural mismatch: something else than the expected event was seen.
    Unexpected {
        expected: &'static str,
        found: &'static str,
        span: Span,
    },
    /// The YAML scanner rejected the input.
    Scan { msg: String, span: Span },
    /// Misuse of the pipelines or caches while assembling or running an engine.
    Configuration { msg: String },
}

impl Error {
    /// Construct a `Message` error with no known location.
    pub fn msg<S: Into<String>>(s: S) -> Self {
        Error::Message {
            msg: s.into(),
            span: Span::UNKNOWN,
        }
    }

    pub(crate) fn format<S: Into<String>>(s: S) -> Self {
        Error::Format {
            msg: s.into(),
            span: Span::UNKNOWN,
        }
    }

    pub(crate) fn overflow<S: Into<String>>(s: S) -> Self {
        Error::Overflow {
            msg: s.into(),
            span: Span::UNKNOWN,
        }
    }

    pub(crate) fn shape<S: Into<String>>(s: S) -> Self {
        Error::Shape {
            msg: s.into(),
            span: Span::UNKNOWN,
        }
    }

    pub(crate) fn configuration<S: Into<String>>(s: S) -> Self {
        Error::Configuration { msg: s.into() }
    }

    pub(crate) fn duplicate_key<S: Into<String>>(key: S) -> Self {
        Error::DuplicateKey {
            key: key.into(),
            span: Span::UNKNOWN,
        }
    }

    pub(crate) fn unknown_anchor<S: Into<String>>(name: S) -> Self {
        Error::UnknownAnchor {
            name: name.into(),
            span: Span::UNKNOWN,
        }
    }

    pub(crate) fn forward_reference<S: Into<String>>(type_name: S) -> Self {
        Error::ForwardReferenceUnsupported {
            type_name: type_name.into(),
            span: Span::UNKNOWN,
        }
    }

    pub(crate) fn recursion_limit(max: usize) -> Self {
        Error::RecursionLimit {
            max,
            span: Span::UNKNOWN,
        }
    }

    /// The event source ran dry inside a node.
    pub(crate) fn eof() -> Self {
        Error::Eof { span: Span::UNKNOWN }
    }

    /// `expected` and `found` are short phrases such as "sequence start".
    pub(crate) fn unexpected(expected: &'static str, found: &'static str) -> Self {
        Error::Unexpected {
            expected,
            found,
            span: Span::UNKNOWN,
        }
    }

    /// Wrap an error raised by user construction logic.
    ///
    /// Errors that already are construction wrappers or recursion/anchor failures are
    /// structural and pass through with the span filled in when missing.
    pub(crate) fn construction<S: Into<String>>(type_name: S, source: Error, span: Span) -> Self {
        match source {
            err @ (Error::Construction { .. }
            | Error::RecursionLimit { .. }
            | Error::UnknownAnchor { .. }) => err.with_span_if_unknown(span),
            source => Error::Construction {
                type_name: type_name.into(),
                source: Box::new(source),
                span,
            },
        }
    }

    /// Replace the span. Configuration errors have none and are returned unchanged.
    pub fn with_span(mut self, set_span: Span) -> Self {
        match &mut self {
            Error::Message { span, .. }
            | Error::Format { span, .. }
            | Error::Overflow { span, .. }
            | Error::Shape { span, .. }
            | Error::DuplicateKey { span, .. }
            | Error::UnknownAnchor { span, .. }
            | Error::ForwardReferenceUnsupported { span, .. }
            | Error::RecursionLimit { span, .. }
            | Error::Construction { span, .. }
            | Error::Eof { span }
            | Error::Unexpected { span, .. }
            | Error::Scan { span, .. } => {
                *span = set_span;
            }
            Error::Configuration { .. } => {}
        }
        self
    }

    /// Attach a span only if the error does not carry one yet; the innermost span wins.
    pub(crate) fn with_span_if_unknown(self, span: Span) -> Self {
        if self.span().is_some() {
            self
        } else {
            self.with_span(span)
        }
    }

    /// Attach a single-point location.
    pub fn with_location(self, location: Location) -> Self {
        self.with_span(Span::at(location))
    }

    /// If the error has a known span, return it.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Message { span, .. }
            | Error::Format { span, .. }
            | Error::Overflow { span, .. }
            | Error::Shape { span, .. }
            | Error::DuplicateKey { span, .. }
            | Error::UnknownAnchor { span, .. }
            | Error::ForwardReferenceUnsupported { span, .. }
            | Error::RecursionLimit { span, .. }
            | Error::Construction { span, .. }
            | Error::Eof { span }
            | Error::Unexpected { span, .. }
            | Error::Scan { span, .. } => span.is_known().then_some(*span),
            Error::Configuration { .. } => None,
        }
    }

    /// Start of [`Error::span`].
    pub fn location(&self) -> Option<Location> {
        self.span().map(|span| span.start)
    }

    #[cfg(feature = "parser")]
    pub(crate) fn from_scan_error(err: ScanError) -> Self {
        let mark = err.marker();
        let location = Location::new(mark.line(), mark.col() + 1).with_index(mark.index());
        Error::Scan {
            msg: err.info().to_owned(),
            span: Span::at(location),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Message { msg, span } => fmt_with_span(f, msg, span),
            Error::Format { msg, span } => fmt_with_span(f, msg, span),
            Error::Overflow { msg, span } => fmt_with_span(f, msg, span),
            Error::Shape { msg, span } => fmt_with_span(f, msg, span),
            Error::Scan { msg, span } => fmt_with_span(f, msg, span),
            Error::DuplicateKey { key, span } => {
                fmt_with_span(f, &format!("duplicate mapping key: {key}"), span)
            }
            Error::UnknownAnchor { name, span } => {
                fmt_with_span(f, &format!("alias references unknown anchor `{name}`"), span)
            }
            Error::ForwardReferenceUnsupported { type_name, span } => fmt_with_span(
                f,
                &format!("forward alias reference is not supported inside `{type_name}`"),
                span,
            ),
            Error::RecursionLimit { max, span } => {
                fmt_with_span(f, &format!("maximum nesting depth of {max} exceeded"), span)
            }
            Error::Construction {
                type_name,
                source,
                span,
            } => {
                fmt_with_span(f, &format!("failed to construct `{type_name}`"), span)?;
                write!(f, ": {source}")
            }
            Error::Eof { span } => fmt_with_span(f, "unexpected end of events", span),
            Error::Unexpected {
                expected,
                found,
                span,
            } => fmt_with_span(
                f,
                &format!("unexpected event: expected {expected}, found {found}"),
                span,
            ),
            Error::Configuration { msg } => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Construction { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::msg(msg.to_string())
    }
}

/// Print a message optionally suffixed with "at line X, column Y".
fn fmt_with_span(f: &mut fmt::Formatter<'_>, msg: &str, span: &Span) -> fmt::Result {
    if span.is_known() {
        write!(
            f,
            "{msg} at line {}, column {}",
            span.start.line, span.start.column
        )
    } else {
        write!(f, "{msg}")
    }
}
