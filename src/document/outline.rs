//! One-line flow rendering of documents, for logs and diagnostics.
//!
//! The renderer walks the saved events and calls an [`OutlineStyle`] at the start and end
//! of every syntax element. [`PlainOutline`] adds nothing; [`AnnotatedOutline`] colours
//! the elements with ANSI escapes.

use crate::document::Document;
use crate::error::Error;
use crate::events::{Event, ScalarStyle};

/// Hooks around each syntax element of an outline. Every method defaults to a no-op.
pub trait OutlineStyle {
    fn anchor_start(&mut self, _out: &mut String) {}
    fn anchor_end(&mut self, _out: &mut String) {}
    fn alias_start(&mut self, _out: &mut String) {}
    fn alias_end(&mut self, _out: &mut String) {}
    fn tag_start(&mut self, _out: &mut String) {}
    fn tag_end(&mut self, _out: &mut String) {}
    fn scalar_start(&mut self, _out: &mut String, _style: ScalarStyle) {}
    fn scalar_end(&mut self, _out: &mut String, _style: ScalarStyle) {}
    fn mapping_key_start(&mut self, _out: &mut String) {}
    fn mapping_key_end(&mut self, _out: &mut String) {}
    fn mapping_value_start(&mut self, _out: &mut String) {}
    fn mapping_value_end(&mut self, _out: &mut String) {}
    /// Around `[`, `]`, `{`, `}`, `,` and `:`.
    fn indicator_start(&mut self, _out: &mut String) {}
    fn indicator_end(&mut self, _out: &mut String) {}
}

/// No decoration.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainOutline;

impl OutlineStyle for PlainOutline {}

const RESET: &str = "\x1b[0m";
const BLUE: &str = "\x1b[94m";
const DARK_BLUE: &str = "\x1b[34m";
const WHITE: &str = "\x1b[97m";
const MAGENTA: &str = "\x1b[35m";
const GRAY: &str = "\x1b[37m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";

/// ANSI colours per element; nested elements restore the colour of their parent.
#[derive(Clone, Debug, Default)]
pub struct AnnotatedOutline {
    colors: Vec<&'static str>,
}

impl AnnotatedOutline {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, out: &mut String, color: &'static str) {
        self.colors.push(color);
        out.push_str(color);
    }

    fn pop(&mut self, out: &mut String) {
        self.colors.pop();
        out.push_str(self.colors.last().copied().unwrap_or(RESET));
    }
}

impl OutlineStyle for AnnotatedOutline {
    fn anchor_start(&mut self, out: &mut String) {
        self.push(out, BLUE);
    }
    fn anchor_end(&mut self, out: &mut String) {
        self.pop(out);
    }
    fn alias_start(&mut self, out: &mut String) {
        self.push(out, DARK_BLUE);
    }
    fn alias_end(&mut self, out: &mut String) {
        self.pop(out);
    }
    fn tag_start(&mut self, out: &mut String) {
        self.push(out, GREEN);
    }
    fn tag_end(&mut self, out: &mut String) {
        self.pop(out);
    }
    fn scalar_start(&mut self, out: &mut String, style: ScalarStyle) {
        match style {
            ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted => self.push(out, YELLOW),
            ScalarStyle::Literal | ScalarStyle::Folded => self.push(out, CYAN),
            ScalarStyle::Plain | ScalarStyle::Any => {}
        }
    }
    fn scalar_end(&mut self, out: &mut String, style: ScalarStyle) {
        if !style.is_plain() {
            self.pop(out);
        }
    }
    fn mapping_key_start(&mut self, out: &mut String) {
        self.push(out, MAGENTA);
    }
    fn mapping_key_end(&mut self, out: &mut String) {
        self.pop(out);
    }
    fn mapping_value_start(&mut self, out: &mut String) {
        self.push(out, GRAY);
    }
    fn mapping_value_end(&mut self, out: &mut String) {
        self.pop(out);
    }
    fn indicator_start(&mut self, out: &mut String) {
        self.push(out, WHITE);
    }
    fn indicator_end(&mut self, out: &mut String) {
        self.pop(out);
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Frame {
    Sequence { first: bool },
    /// `key` is true while the next node is a mapping key.
    Mapping { first: bool, key: bool },
}

struct Renderer<'s> {
    style: &'s mut dyn OutlineStyle,
    out: String,
    frames: Vec<Frame>,
}

impl Renderer<'_> {
    fn indicator(&mut self, text: &str) {
        self.style.indicator_start(&mut self.out);
        self.out.push_str(text);
        self.style.indicator_end(&mut self.out);
    }

    /// Separators and role hooks before a node.
    fn before_node(&mut self) {
        match self.frames.last().copied() {
            Some(Frame::Sequence { first }) => {
                if !first {
                    self.indicator(",");
                    self.out.push(' ');
                }
            }
            Some(Frame::Mapping { first, key: true }) => {
                if !first {
                    self.indicator(",");
                    self.out.push(' ');
                }
                self.style.mapping_key_start(&mut self.out);
            }
            Some(Frame::Mapping { key: false, .. }) => {
                self.indicator(":");
                self.out.push(' ');
                self.style.mapping_value_start(&mut self.out);
            }
            None => {}
        }
    }

    fn after_node(&mut self) {
        match self.frames.last_mut() {
            Some(Frame::Sequence { first }) => *first = false,
            Some(Frame::Mapping { first, key }) => {
                if *key {
                    self.style.mapping_key_end(&mut self.out);
                } else {
                    self.style.mapping_value_end(&mut self.out);
                    *first = false;
                }
                *key = !*key;
            }
            None => {}
        }
    }

    fn properties(&mut self, anchor: Option<&str>, tag: Option<&str>) {
        if let Some(anchor) = anchor {
            self.style.anchor_start(&mut self.out);
            self.out.push('&');
            self.out.push_str(anchor);
            self.style.anchor_end(&mut self.out);
            self.out.push(' ');
        }
        if let Some(tag) = tag {
            self.style.tag_start(&mut self.out);
            if !tag.starts_with('!') {
                self.out.push('!');
            }
            self.out.push_str(tag);
            self.style.tag_end(&mut self.out);
            self.out.push(' ');
        }
    }

    fn event(&mut self, event: &Event) {
        match event {
            Event::Scalar {
                value,
                style,
                tag,
                anchor,
                ..
            } => {
                self.before_node();
                self.properties(anchor.as_deref(), tag.as_deref());
                self.style.scalar_start(&mut self.out, *style);
                push_scalar(&mut self.out, value, *style);
                self.style.scalar_end(&mut self.out, *style);
                self.after_node();
            }
            Event::Alias { name, .. } => {
                self.before_node();
                self.style.alias_start(&mut self.out);
                self.out.push('*');
                self.out.push_str(name);
                self.style.alias_end(&mut self.out);
                self.after_node();
            }
            Event::SequenceStart { tag, anchor, .. } => {
                self.before_node();
                self.properties(anchor.as_deref(), tag.as_deref());
                self.indicator("[");
                self.frames.push(Frame::Sequence { first: true });
            }
            Event::MappingStart { tag, anchor, .. } => {
                self.before_node();
                self.properties(anchor.as_deref(), tag.as_deref());
                self.indicator("{");
                self.frames.push(Frame::Mapping {
                    first: true,
                    key: true,
                });
            }
            Event::SequenceEnd { .. } => {
                self.frames.pop();
                self.indicator("]");
                self.after_node();
            }
            Event::MappingEnd { .. } => {
                self.frames.pop();
                self.indicator("}");
                self.after_node();
            }
            Event::StreamStart { .. }
            | Event::StreamEnd { .. }
            | Event::DocumentStart { .. }
            | Event::DocumentEnd { .. } => {}
        }
    }
}

fn push_scalar(out: &mut String, value: &str, style: ScalarStyle) {
    match style {
        ScalarStyle::Plain | ScalarStyle::Any if !value.is_empty() => out.push_str(value),
        ScalarStyle::SingleQuoted => {
            out.push('\'');
            out.push_str(&value.replace('\'', "''"));
            out.push('\'');
        }
        _ => {
            out.push('"');
            for c in value.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('"');
        }
    }
}

impl Document {
    /// Render the document on one line in flow style, decorated by `style`.
    pub fn outline(&self, style: &mut dyn OutlineStyle, max_depth: usize) -> Result<String, Error> {
        let events = self.save(max_depth)?;
        let mut renderer = Renderer {
            style,
            out: String::new(),
            frames: Vec::new(),
        };
        for event in &events {
            renderer.event(event);
        }
        Ok(renderer.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ReplayEvents;
    use crate::recursion::DEFAULT_MAX_DEPTH;

    fn sample() -> Document {
        let events = vec![
            Event::mapping_start(),
            Event::scalar("name"),
            Event::styled_scalar("it's", ScalarStyle::SingleQuoted),
            Event::scalar("tags"),
            Event::sequence_start().anchored("t"),
            Event::scalar("a"),
            Event::scalar("b").tagged("!x"),
            Event::sequence_end(),
            Event::scalar("again"),
            Event::alias("t"),
            Event::mapping_end(),
        ];
        Document::load(&mut ReplayEvents::new(events), DEFAULT_MAX_DEPTH).unwrap()
    }

    #[test]
    fn plain_outline_is_flow_yaml() {
        let text = sample().outline(&mut PlainOutline, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(text, "{name: 'it''s', tags: &t [a, !x b], again: *t}");
    }

    #[test]
    fn annotated_outline_colours_and_resets() {
        let text = sample()
            .outline(&mut AnnotatedOutline::new(), DEFAULT_MAX_DEPTH)
            .unwrap();
        assert!(text.contains(&format!("{BLUE}&t")), "{text:?}");
        assert!(text.contains(&format!("{DARK_BLUE}*t")), "{text:?}");
        assert!(text.ends_with(RESET), "{text:?}");
        let stripped: String = {
            let mut s = text.clone();
            for code in [RESET, BLUE, DARK_BLUE, WHITE, MAGENTA, GRAY, YELLOW, CYAN, GREEN] {
                s = s.replace(code, "");
            }
            s
        };
        assert_eq!(stripped, "{name: 'it''s', tags: &t [a, !x b], again: *t}");
    }
}
