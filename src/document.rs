//! Shared document buffer and span registry
//!
//! Every sub-element view (tag, list, parsed contents) holds a [`SpanId`]
//! handle into a single [`Document`]. The document owns the text and the
//! absolute `(start, end)` byte range behind every handle. All edits go
//! through [`Document::replace`], which splices the text and re-indexes every
//! other registered span by the length delta of the edit.
//!
//! Templates (`{{...}}`) and comments (`<!-- ... -->`) are registered as
//! opaque regions. They have no element API; [`Document::shadow`] blanks them
//! out so the tag and list grammars never match across their boundaries.

use crate::error::{ExtractError, Result};
use itertools::Itertools;
use regex::Regex;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, LazyLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Byte written over opaque regions in a shadow
pub const PLACEHOLDER: char = '_';

// Unterminated comments run to the end of the text
static COMMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?(?:-->|\z)").unwrap());

/// Type of the element registered behind a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// The whole document
    Root,
    /// A plain text region, e.g. the parsed contents of a tag
    SubText,
    Tag,
    List,
    /// `{{...}}`, masked in shadows
    Template,
    /// `<!-- ... -->`, masked in shadows
    Comment,
}

impl ElementKind {
    /// Opaque regions are blanked out of every enclosing shadow
    pub fn is_opaque(self) -> bool {
        matches!(self, Self::Template | Self::Comment)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::SubText => "SubText",
            Self::Tag => "Tag",
            Self::List => "List",
            Self::Template => "Template",
            Self::Comment => "Comment",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle to a registered span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(usize);

/// Absolute half-open byte range into the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} is after end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies within this span (boundaries may coincide)
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether `other` lies within this span and is not identical to it
    pub fn strictly_contains(&self, other: Span) -> bool {
        self.contains(other) && *self != other
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Shift a range relative to this span's start into absolute coordinates
    pub fn absolute(&self, relative: Range<usize>) -> Span {
        Span::new(self.start + relative.start, self.start + relative.end)
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

#[derive(Debug, Clone)]
struct SpanEntry {
    kind: ElementKind,
    span: Span,
    /// Leading marker pattern, only set for lists
    pattern: Option<String>,
}

#[derive(Debug, Default)]
struct Buffer {
    text: String,
    /// Arena of spans; deregistered slots become `None` and are never reused
    entries: Vec<Option<SpanEntry>>,
}

impl Buffer {
    fn entry(&self, id: SpanId) -> Result<&SpanEntry> {
        self.entries
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(ExtractError::Deregistered(id))
    }

    fn push(&mut self, kind: ElementKind, span: Span, pattern: Option<String>) -> SpanId {
        let id = SpanId(self.entries.len());
        self.entries.push(Some(SpanEntry { kind, span, pattern }));
        id
    }

    fn find(&self, kind: ElementKind, span: Span, pattern: Option<&str>) -> Option<SpanId> {
        self.entries.iter().position(|entry| {
            entry
                .as_ref()
                .is_some_and(|e| e.kind == kind && e.span == span && e.pattern.as_deref() == pattern)
        })
        .map(SpanId)
    }

    /// Adjust every live span after `[a, b)` was replaced by `inserted` bytes
    ///
    /// `edited` is the span the edit went through (before the edit). It and
    /// every span containing it stretch over the new text. Other spans that
    /// merely touch `[a, b)` at a boundary stay outside it, and element or
    /// opaque spans covering exactly `[a, b)` are deregistered with the text
    /// they described. Plain text views over exactly `[a, b)` keep covering it.
    fn reindex(&mut self, edited: Span, a: usize, b: usize, inserted: usize) {
        let shift = |pos: usize| pos - b + a + inserted;
        let replaced = Span::new(a, b);
        let mut dropped = 0usize;

        for slot in self.entries.iter_mut() {
            let Some(entry) = slot.as_mut() else {
                continue;
            };
            let Span { start: s, end: e } = entry.span;
            let plain = matches!(entry.kind, ElementKind::Root | ElementKind::SubText);

            if entry.span.contains(edited) || (plain && entry.span == replaced) {
                // The edited element, one of its ancestors, or a text view over the edit
                entry.span.end = shift(e);
            } else if e <= a {
                // Entirely before the edit, or ends where an insertion begins
            } else if s >= b {
                entry.span = Span::new(shift(s), shift(e));
            } else if a <= s && e <= b {
                *slot = None;
                dropped += 1;
            } else if s <= a && b <= e {
                // Overlaps the edited element but contains the edit
                entry.span.end = shift(e);
            } else if s < a {
                // Tail of the span was replaced
                entry.span.end = a;
            } else {
                // Head of the span was replaced
                entry.span = Span::new(a + inserted, shift(e));
            }
        }

        if dropped > 0 {
            log::debug!("[wikisplice-document] deregistered {dropped} span(s) inside replaced range {a}..{b}");
        }
    }

    /// Register opaque regions found in `text[offset..offset + len]`
    fn register_opaque_regions(&mut self, offset: usize, len: usize) {
        let found = detect_opaque_regions(&self.text[offset..offset + len]);
        for (kind, range) in found {
            let span = Span::new(offset + range.start, offset + range.end);
            if self.find(kind, span, None).is_none() {
                self.push(kind, span, None);
            }
        }
    }
}

/// Find comment and template regions in `text`
///
/// Templates are matched with a brace stack so nested templates each get
/// their own region. Braces inside comments are ignored.
pub fn detect_opaque_regions(text: &str) -> Vec<(ElementKind, Range<usize>)> {
    let comments: Vec<Range<usize>> = COMMENT_REGEX.find_iter(text).map(|m| m.range()).collect();
    let mut regions: Vec<(ElementKind, Range<usize>)> =
        comments.iter().map(|r| (ElementKind::Comment, r.clone())).collect();

    let bytes = text.as_bytes();
    let mut stack: Vec<usize> = Vec::new();
    let mut comment_iter = comments.iter().peekable();
    let mut i = 0;

    while i + 1 < bytes.len() {
        // Jump over comments
        while comment_iter.peek().is_some_and(|c| c.end <= i) {
            comment_iter.next();
        }
        if let Some(comment) = comment_iter.peek()
            && comment.start <= i
        {
            i = comment.end;
            continue;
        }

        match (bytes[i], bytes[i + 1]) {
            (b'{', b'{') => {
                stack.push(i);
                i += 2;
            }
            (b'}', b'}') if !stack.is_empty() => {
                if let Some(start) = stack.pop() {
                    regions.push((ElementKind::Template, start..i + 2));
                }
                i += 2;
            }
            _ => i += 1,
        }
    }

    regions.sort_by_key(|(_, r)| (r.start, std::cmp::Reverse(r.end)));
    regions
}

/// A mutable text buffer shared by every element view created over it
///
/// Cloning a `Document` clones the handle, not the text.
#[derive(Debug, Clone)]
pub struct Document {
    inner: Arc<RwLock<Buffer>>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let len = text.len();
        let mut buffer = Buffer { text, entries: Vec::new() };
        buffer.push(ElementKind::Root, Span::new(0, len), None);
        buffer.register_opaque_regions(0, len);

        Self {
            inner: Arc::new(RwLock::new(buffer)),
        }
    }

    fn buffer(&self) -> RwLockReadGuard<'_, Buffer> {
        self.inner.read().expect("Document buffer lock poisoned")
    }

    fn buffer_mut(&self) -> RwLockWriteGuard<'_, Buffer> {
        self.inner.write().expect("Document buffer lock poisoned")
    }

    /// Handle of the span covering the whole document
    pub fn root(&self) -> SpanId {
        SpanId(0)
    }

    /// Whether two handles refer to the same underlying buffer
    pub fn same_buffer(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The complete current text
    pub fn text(&self) -> String {
        self.buffer().text.clone()
    }

    pub fn span(&self, id: SpanId) -> Result<Span> {
        Ok(self.buffer().entry(id)?.span)
    }

    pub fn kind(&self, id: SpanId) -> Result<ElementKind> {
        Ok(self.buffer().entry(id)?.kind)
    }

    pub fn is_registered(&self, id: SpanId) -> bool {
        self.buffer().entry(id).is_ok()
    }

    pub fn pattern(&self, id: SpanId) -> Result<Option<String>> {
        Ok(self.buffer().entry(id)?.pattern.clone())
    }

    pub fn set_pattern(&self, id: SpanId, pattern: impl Into<String>) -> Result<()> {
        let mut buffer = self.buffer_mut();
        match buffer.entries.get_mut(id.0).and_then(Option::as_mut) {
            Some(entry) => {
                entry.pattern = Some(pattern.into());
                Ok(())
            }
            None => Err(ExtractError::Deregistered(id)),
        }
    }

    /// Raw text of a span
    pub fn read(&self, id: SpanId) -> Result<String> {
        let buffer = self.buffer();
        let span = buffer.entry(id)?.span;
        Ok(buffer.text[span.as_range()].to_string())
    }

    /// Masked text of a span: same length, opaque regions strictly inside it blanked
    pub fn shadow(&self, id: SpanId) -> Result<String> {
        let buffer = self.buffer();
        let span = buffer.entry(id)?.span;

        let masked = buffer
            .entries
            .iter()
            .flatten()
            .filter(|e| e.kind.is_opaque() && span.strictly_contains(e.span))
            .map(|e| e.span)
            .sorted_by_key(|s| s.start);

        let mut shadow = String::with_capacity(span.len());
        let mut cursor = span.start;
        for region in masked {
            if region.end <= cursor {
                continue;
            }
            let from = region.start.max(cursor);
            shadow.push_str(&buffer.text[cursor..from]);
            shadow.extend(std::iter::repeat_n(PLACEHOLDER, region.end - from));
            cursor = region.end;
        }
        shadow.push_str(&buffer.text[cursor..span.end]);

        debug_assert_eq!(shadow.len(), span.len());
        Ok(shadow)
    }

    /// Replace `relative` (offsets within the span of `id`) with `new_text`
    ///
    /// This is the only way text changes. Every other registered span is
    /// re-indexed; spans wholly inside the replaced range are deregistered,
    /// unless they contain `id`'s span.
    pub fn replace(&self, id: SpanId, relative: Range<usize>, new_text: &str) -> Result<()> {
        let mut buffer = self.buffer_mut();
        let span = buffer.entry(id)?.span;

        let invalid = ExtractError::InvalidRange {
            start: relative.start,
            end: relative.end,
            len: span.len(),
        };
        if relative.start > relative.end || relative.end > span.len() {
            return Err(invalid);
        }
        let a = span.start + relative.start;
        let b = span.start + relative.end;
        if !buffer.text.is_char_boundary(a) || !buffer.text.is_char_boundary(b) {
            return Err(invalid);
        }

        buffer.text.replace_range(a..b, new_text);
        buffer.reindex(span, a, b, new_text.len());
        buffer.register_opaque_regions(a, new_text.len());

        log::debug!(
            "[wikisplice-document] replaced {a}..{b} with {} byte(s) via {:?}",
            new_text.len(),
            id
        );
        Ok(())
    }

    pub fn register(&self, kind: ElementKind, span: Span, pattern: Option<&str>) -> SpanId {
        let id = self.buffer_mut().push(kind, span, pattern.map(str::to_string));
        log::debug!("[wikisplice-document] registered {kind} {span:?} as {id:?}");
        id
    }

    /// Return the live span with the same kind, extent and pattern, registering it if needed
    pub fn find_or_register(&self, kind: ElementKind, span: Span, pattern: Option<&str>) -> SpanId {
        if let Some(id) = self.buffer().find(kind, span, pattern) {
            return id;
        }
        self.register(kind, span, pattern)
    }

    /// Live spans of `kind` accepted by `predicate`, in document order
    pub fn lookup<F>(&self, kind: ElementKind, predicate: F) -> Vec<SpanId>
    where
        F: Fn(Span, Option<&str>) -> bool,
    {
        let buffer = self.buffer();
        buffer
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|entry| (SpanId(index), entry)))
            .filter(|(_, entry)| entry.kind == kind && predicate(entry.span, entry.pattern.as_deref()))
            .sorted_by_key(|(_, entry)| (entry.span.start, std::cmp::Reverse(entry.span.end)))
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of live spans of `kind`
    pub fn count(&self, kind: ElementKind) -> usize {
        self.buffer().entries.iter().flatten().filter(|e| e.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shadow_masks_templates_and_comments() {
        let doc = Document::new("a{{b|{{c}}}}d<!-- x -->e");
        let shadow = doc.shadow(doc.root()).unwrap();
        assert_eq!(shadow, format!("a{}d{}e", "_".repeat(11), "_".repeat(10)));
        assert_eq!(shadow.len(), doc.text().len());
        assert_eq!(doc.count(ElementKind::Template), 2);
        assert_eq!(doc.count(ElementKind::Comment), 1);
    }

    #[test]
    fn test_shadow_does_not_mask_the_span_itself() {
        let doc = Document::new("x{{t}}y");
        let template = doc.lookup(ElementKind::Template, |_, _| true)[0];
        assert_eq!(doc.shadow(template).unwrap(), "{{t}}");
    }

    #[test]
    fn test_braces_inside_comments_are_ignored() {
        let regions = detect_opaque_regions("<!-- {{ -->}}");
        assert_eq!(regions, vec![(ElementKind::Comment, 0..11)]);
    }

    #[test]
    fn test_unterminated_comment_runs_to_end() {
        let regions = detect_opaque_regions("a<!-- b");
        assert_eq!(regions, vec![(ElementKind::Comment, 1..7)]);
    }

    #[test]
    fn test_shadow_handles_multibyte_text() {
        let doc = Document::new("é{{ü}}ß");
        let shadow = doc.shadow(doc.root()).unwrap();
        assert_eq!(shadow.len(), "é{{ü}}ß".len());
        assert!(shadow.starts_with('é'));
        assert!(shadow.ends_with('ß'));
    }

    #[test]
    fn test_replace_shifts_following_spans() {
        let doc = Document::new("aaa bbb ccc");
        let first = doc.register(ElementKind::SubText, Span::new(0, 3), None);
        let last = doc.register(ElementKind::SubText, Span::new(8, 11), None);

        doc.replace(first, 0..3, "xxxxx").unwrap();

        assert_eq!(doc.text(), "xxxxx bbb ccc");
        assert_eq!(doc.span(first).unwrap(), Span::new(0, 5));
        assert_eq!(doc.span(last).unwrap(), Span::new(10, 13));
        assert_eq!(doc.read(last).unwrap(), "ccc");
        assert_eq!(doc.span(doc.root()).unwrap(), Span::new(0, 13));
    }

    #[test]
    fn test_replace_leaves_preceding_spans_alone() {
        let doc = Document::new("aaa bbb");
        let first = doc.register(ElementKind::SubText, Span::new(0, 3), None);
        let second = doc.register(ElementKind::SubText, Span::new(4, 7), None);

        doc.replace(second, 0..3, "b").unwrap();

        assert_eq!(doc.read(first).unwrap(), "aaa");
        assert_eq!(doc.read(second).unwrap(), "b");
    }

    #[test]
    fn test_replace_deregisters_spans_inside_replaced_range() {
        let doc = Document::new("<t>a{{x}}b</t>");
        let outer = doc.register(ElementKind::Tag, Span::new(0, 14), None);
        let template = doc.lookup(ElementKind::Template, |_, _| true)[0];

        doc.replace(outer, 3..10, "plain").unwrap();

        assert!(!doc.is_registered(template));
        assert!(matches!(doc.read(template), Err(ExtractError::Deregistered(_))));
        assert_eq!(doc.read(outer).unwrap(), "<t>plain</t>");
    }

    #[test]
    fn test_replace_registers_inserted_templates() {
        let doc = Document::new("<t></t>");
        let tag = doc.register(ElementKind::Tag, Span::new(0, 7), None);
        doc.replace(tag, 3..3, "{{new}}").unwrap();
        assert_eq!(doc.count(ElementKind::Template), 1);
        assert_eq!(doc.shadow(tag).unwrap(), format!("<t>{}</t>", "_".repeat(7)));
    }

    #[test]
    fn test_replace_clips_partially_overlapping_spans() {
        let doc = Document::new("0123456789");
        let edited = doc.register(ElementKind::SubText, Span::new(3, 7), None);
        let head = doc.register(ElementKind::SubText, Span::new(1, 5), None);
        let tail = doc.register(ElementKind::SubText, Span::new(5, 9), None);

        doc.replace(edited, 1..3, "xy").unwrap();

        assert_eq!(doc.text(), "0123xy6789");
        assert_eq!(doc.span(head).unwrap(), Span::new(1, 4));
        assert_eq!(doc.span(tail).unwrap(), Span::new(6, 9));
    }

    #[test]
    fn test_insertion_at_a_boundary_leaves_touching_siblings_outside() {
        let doc = Document::new("abcd");
        let parent = doc.register(ElementKind::Tag, Span::new(0, 4), None);
        let left = doc.register(ElementKind::Tag, Span::new(0, 2), None);
        let right = doc.register(ElementKind::Tag, Span::new(2, 4), None);

        doc.replace(parent, 2..2, "XY").unwrap();

        assert_eq!(doc.text(), "abXYcd");
        assert_eq!(doc.span(parent).unwrap(), Span::new(0, 6));
        assert_eq!(doc.read(left).unwrap(), "ab");
        assert_eq!(doc.read(right).unwrap(), "cd");
    }

    #[test]
    fn test_insertion_at_own_end_grows_the_edited_span() {
        let doc = Document::new("abcd");
        let left = doc.register(ElementKind::Tag, Span::new(0, 2), None);
        let right = doc.register(ElementKind::Tag, Span::new(2, 4), None);

        doc.replace(left, 2..2, "XY").unwrap();

        assert_eq!(doc.read(left).unwrap(), "abXY");
        assert_eq!(doc.read(right).unwrap(), "cd");
        assert_eq!(doc.span(doc.root()).unwrap(), Span::new(0, 6));
    }

    #[test]
    fn test_insertion_after_template_is_not_masked() {
        let doc = Document::new("<t a={{x}}>");
        let tag = doc.register(ElementKind::Tag, Span::new(0, 11), None);

        doc.replace(tag, 10..10, " n").unwrap();

        let template = doc.lookup(ElementKind::Template, |_, _| true)[0];
        assert_eq!(doc.read(template).unwrap(), "{{x}}");
        assert_eq!(doc.shadow(tag).unwrap(), "<t a=_____ n>");
    }

    #[test]
    fn test_replace_drops_elements_covering_exactly_the_replaced_range() {
        let doc = Document::new("<t>{{x}}</t>");
        let outer = doc.register(ElementKind::Tag, Span::new(0, 12), None);
        let inner = doc.register(ElementKind::Tag, Span::new(3, 8), None);
        let contents = doc.register(ElementKind::SubText, Span::new(3, 8), None);
        let template = doc.lookup(ElementKind::Template, |_, _| true)[0];

        doc.replace(outer, 3..8, "<b>y</b>").unwrap();

        assert!(!doc.is_registered(template));
        assert!(!doc.is_registered(inner));
        assert_eq!(doc.read(contents).unwrap(), "<b>y</b>");
        assert_eq!(doc.count(ElementKind::Template), 0);
        assert_eq!(doc.shadow(doc.root()).unwrap(), "<t><b>y</b></t>");
    }

    #[test]
    fn test_replace_rejects_out_of_range_and_split_chars() {
        let doc = Document::new("é");
        let root = doc.root();
        assert!(matches!(
            doc.replace(root, 0..5, "x"),
            Err(ExtractError::InvalidRange { .. })
        ));
        assert!(matches!(
            doc.replace(root, 1..2, "x"),
            Err(ExtractError::InvalidRange { .. })
        ));
        assert_eq!(doc.text(), "é");
    }

    #[test]
    fn test_find_or_register_reuses_identical_span() {
        let doc = Document::new("* a\n");
        let first = doc.find_or_register(ElementKind::List, Span::new(0, 4), Some(r"\*"));
        let again = doc.find_or_register(ElementKind::List, Span::new(0, 4), Some(r"\*"));
        let other = doc.find_or_register(ElementKind::List, Span::new(0, 4), Some("#"));
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(doc.count(ElementKind::List), 2);
    }

    #[test]
    fn test_lookup_returns_document_order() {
        let doc = Document::new("abcdef");
        let late = doc.register(ElementKind::SubText, Span::new(4, 6), None);
        let early = doc.register(ElementKind::SubText, Span::new(0, 2), None);
        assert_eq!(doc.lookup(ElementKind::SubText, |_, _| true), vec![early, late]);
    }
}
