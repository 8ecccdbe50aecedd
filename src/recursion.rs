//! Bounded nesting counter shared by every recursive walk.

use crate::error::Error;
use crate::location::Span;

/// Default maximum nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Keeps track of the current recursion level and fails when the maximum is exceeded.
///
/// Exceeding the bound yields [`Error::RecursionLimit`], never a syntax error.
#[derive(Clone, Copy, Debug)]
pub struct RecursionLevel {
    current: usize,
    maximum: usize,
}

impl RecursionLevel {
    pub fn new(maximum: usize) -> Self {
        Self {
            current: 0,
            maximum,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn maximum(&self) -> usize {
        self.maximum
    }

    /// Enter one level; fail with the position of the node being entered.
    pub fn increment(&mut self, span: Span) -> Result<(), Error> {
        if !self.try_increment() {
            return Err(Error::recursion_limit(self.maximum).with_span(span));
        }
        Ok(())
    }

    /// Enter one level if the bound allows it.
    pub fn try_increment(&mut self) -> bool {
        if self.current < self.maximum {
            self.current += 1;
            true
        } else {
            false
        }
    }

    pub fn decrement(&mut self) {
        debug_assert!(self.current > 0, "recursion level underflow");
        self.current = self.current.saturating_sub(1);
    }
}

impl Default for RecursionLevel {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}
