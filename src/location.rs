//! Source positions attached to events, nodes and errors.

#[cfg(feature = "parser")]
use saphyr_parser::Span as ParserSpan;
use serde::{Deserialize, Serialize};

/// Line and column in the YAML source, both counted from 1 in characters.
///
/// A location is produced by the event source. Hand-built event streams usually carry
/// [`Location::UNKNOWN`], in which case errors are reported without coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Location {
    pub(crate) line: u32,
    pub(crate) column: u32,
    /// Character offset from the beginning of the input.
    #[serde(default)]
    pub(crate) index: u32,
}

impl Location {
    /// No position; events built by hand carry this.
    pub const UNKNOWN: Self = Self {
        line: 0,
        column: 0,
        index: 0,
    };

    /// Location at `line` and `column`, both 1-based. Values past `u32::MAX` wrap.
    pub const fn new(line: usize, column: usize) -> Self {
        Self {
            line: line as u32,
            column: column as u32,
            index: 0,
        }
    }

    pub(crate) const fn with_index(mut self, index: usize) -> Self {
        self.index = index as u32;
        self
    }

    #[inline]
    pub fn line(&self) -> u64 {
        self.line as u64
    }

    #[inline]
    pub fn column(&self) -> u64 {
        self.column as u64
    }

    /// Character offset from the beginning of the input.
    #[inline]
    pub fn index(&self) -> u64 {
        self.index as u64
    }

    #[inline]
    pub fn is_known(&self) -> bool {
        self != &Location::UNKNOWN
    }
}

/// Start/end pair of locations covering one event or node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    /// Span with no position.
    pub const UNKNOWN: Self = Self {
        start: Location::UNKNOWN,
        end: Location::UNKNOWN,
    };

    pub const fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    /// Span of a single point (start == end).
    pub const fn at(location: Location) -> Self {
        Self {
            start: location,
            end: location,
        }
    }

    #[inline]
    pub fn is_known(&self) -> bool {
        self.start.is_known()
    }
}

/// Parser columns count from 0; ours count from 1.
#[cfg(feature = "parser")]
pub(crate) fn span_from_parser(span: &ParserSpan) -> Span {
    let point = |m: &saphyr_parser::Marker| {
        Location::new(m.line(), m.col() + 1).with_index(m.index())
    };
    Span::new(point(&span.start), point(&span.end))
}
