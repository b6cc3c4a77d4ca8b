//! Line grammar for nested lists
//!
//! A [`ListGrammar`] is compiled for one literal leading marker (for example
//! `*` or `#*`). It recognises runs of consecutive lines that start with that
//! marker, splits each line into items, and absorbs deeper-nested lines (the
//! marker followed by one more of `:;#*`) into the preceding full item.
//!
//! Markers are matched against one line at a time, so a marker can never
//! swallow a line break. Blanks between a marker and its item text are not
//! part of the item.

use crate::error::{ExtractError, Result};
use regex::Regex;
use std::ops::Range;
use std::sync::Arc;

/// Compiled matcher for one list marker
#[derive(Debug, Clone)]
pub struct ListGrammar {
    pattern: String,
    marker: Regex,
    sub_line: Regex,
}

/// One list run found by a [`ListGrammar`]
///
/// All ranges are relative to `source`, the text the grammar ran against.
/// `range` is the extent of the run inside `source`. Every run found by one
/// [`ListGrammar::find_all`] call shares the same `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMatch {
    pub source: Arc<str>,
    pub range: Range<usize>,
    /// Leading marker of every top-level line
    pub markers: Vec<Range<usize>>,
    /// The same marker at the start of every absorbed sub-line
    pub sub_markers: Vec<Range<usize>>,
    pub items: Vec<Range<usize>>,
    /// Items with their absorbed sub-lines, leading marker excluded
    pub fullitems: Vec<Range<usize>>,
}

impl ListMatch {
    pub fn start(&self) -> usize {
        self.range.start
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Whether this parse still describes `shadow`
    ///
    /// Cheap structural probe: same length, and the parsed text still sits
    /// at the same relative offset. An edit that keeps both intact goes
    /// unnoticed.
    pub fn is_valid_for(&self, shadow: &str) -> bool {
        self.range.len() == shadow.len() && self.source.find(shadow) == Some(self.range.start)
    }

    /// Translate a source range into coordinates relative to the match start
    pub fn relative(&self, range: &Range<usize>) -> Range<usize> {
        range.start - self.range.start..range.end - self.range.start
    }

    /// Text of the first leading marker
    pub fn first_marker(&self) -> &str {
        self.markers.first().map_or("", |m| &self.source[m.clone()])
    }
}

/// Byte index of the end of the line starting at `pos` (the `\n` or the end of text)
fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map_or(text.len(), |i| pos + i)
}

/// Start of the line after the one ending at `end`
fn next_line(text: &str, end: usize) -> usize {
    if end < text.len() { end + 1 } else { end }
}

/// Skip spaces and tabs between a marker and the item text
fn skip_blanks(text: &str, pos: usize, end: usize) -> usize {
    text[pos..end]
        .find(|c: char| c != ' ' && c != '\t')
        .map_or(end, |i| pos + i)
}

/// A marker ending in `;` starts an inline definition (`; term : definition`)
fn is_definition_marker(marker: &str) -> bool {
    marker.trim_end().ends_with(';')
}

impl ListGrammar {
    pub fn compile(pattern: &str) -> Result<Self> {
        let invalid = |reason: String| ExtractError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };
        if pattern.is_empty() {
            return Err(invalid("a list marker cannot be empty".to_string()));
        }
        if pattern.contains('\n') {
            return Err(invalid("a list marker cannot span lines".to_string()));
        }

        let escaped = regex::escape(pattern);
        let marker = Regex::new(&format!(r"\A{escaped}")).map_err(|e| invalid(e.to_string()))?;
        let sub_line = Regex::new(&format!(r"\A{escaped}[:;#*]")).map_err(|e| invalid(e.to_string()))?;

        log::debug!("[wikisplice-grammar] compiled list grammar for pattern {pattern:?}");
        Ok(Self {
            pattern: pattern.to_string(),
            marker,
            sub_line,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Match the whole of `text` as one list
    pub fn full_match(&self, text: &str) -> Option<ListMatch> {
        self.match_at(text, 0).filter(|m| m.range.end == text.len())
    }

    /// Every maximal list run in `text`, in document order
    pub fn find_all(&self, text: &str) -> Vec<ListMatch> {
        let source: Arc<str> = Arc::from(text);
        let mut found = Vec::new();
        let mut pos = 0;
        while pos < text.len() {
            match self.run_at(&source, pos) {
                Some(m) if !m.is_empty() => {
                    pos = m.range.end;
                    found.push(m);
                }
                _ => pos = next_line(text, line_end(text, pos)),
            }
        }
        found
    }

    /// The list run starting at `pos`, which must be a line start
    pub fn match_at(&self, text: &str, pos: usize) -> Option<ListMatch> {
        self.run_at(&Arc::from(text), pos)
    }

    fn run_at(&self, source: &Arc<str>, pos: usize) -> Option<ListMatch> {
        let text: &str = source;
        let mut markers = Vec::new();
        let mut sub_markers = Vec::new();
        let mut items = Vec::new();
        let mut fullitems = Vec::new();
        let mut cursor = pos;

        while cursor < text.len() {
            let end = line_end(text, cursor);
            let Some(marker) = self.marker.find(&text[cursor..end]) else {
                break;
            };

            let body_start = cursor + marker.end();
            markers.push(cursor..body_start);
            let outer = fullitems.len();
            fullitems.push(body_start..body_start);

            if is_definition_marker(marker.as_str()) {
                match text[body_start..end].find(':') {
                    Some(colon) => {
                        let colon = body_start + colon;
                        items.push(skip_blanks(text, body_start, colon)..colon);
                        fullitems.push(colon..end);
                        items.push(skip_blanks(text, colon + 1, end)..end);
                    }
                    None => items.push(skip_blanks(text, body_start, end)..end),
                }
            } else {
                items.push(skip_blanks(text, body_start, end)..end);
            }

            cursor = next_line(text, end);
            while cursor < text.len() {
                let end = line_end(text, cursor);
                if !self.sub_line.is_match(&text[cursor..end]) {
                    break;
                }
                sub_markers.push(cursor..cursor + self.pattern.len());
                cursor = next_line(text, end);
            }
            fullitems[outer].end = cursor;
        }

        if markers.is_empty() {
            return None;
        }
        Some(ListMatch {
            source: Arc::clone(source),
            range: pos..cursor,
            markers,
            sub_markers,
            items,
            fullitems,
        })
    }
}
