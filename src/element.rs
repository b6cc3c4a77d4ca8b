//! Views over registered spans
//!
//! [`SubElement`] is implemented by every view type. It gives read access to
//! the raw text and the shadow of the span, and discovers nested tags and
//! lists inside it. Discovered elements are registered in the document (or
//! an identical registered span is reused), so repeated searches hand out
//! views over the same spans.

use crate::document::{Document, ElementKind, Span, SpanId};
use crate::error::Result;
use crate::grammar::ListGrammar;
use crate::list::List;
use crate::tag::{Tag, find_tags};
use std::fmt;
use std::sync::Arc;

/// Markers searched by [`SubElement::lists_default`]
pub const DEFAULT_LIST_MARKERS: [&str; 4] = ["#", "*", ":", ";"];

pub trait SubElement {
    fn document(&self) -> &Document;

    fn id(&self) -> SpanId;

    /// Absolute extent in the document
    fn span(&self) -> Result<Span> {
        self.document().span(self.id())
    }

    /// Current raw text, always read from the live buffer
    fn string(&self) -> Result<String> {
        self.document().read(self.id())
    }

    /// Current text with nested templates and comments blanked out
    fn shadow(&self) -> Result<String> {
        self.document().shadow(self.id())
    }

    /// Every tag inside this element, in document order
    fn tags(&self) -> Result<Vec<Tag>> {
        let span = self.span()?;
        let shadow = self.shadow()?;
        Ok(find_tags(&shadow)
            .into_iter()
            .map(|range| Tag::from_span(self.document(), span.absolute(range)))
            .collect())
    }

    /// Every list whose top-level lines start with `marker`
    fn lists(&self, marker: &str) -> Result<Vec<List>> {
        let grammar = Arc::new(ListGrammar::compile(marker)?);
        let span = self.span()?;
        let shadow = self.shadow()?;

        Ok(grammar
            .find_all(&shadow)
            .into_iter()
            .map(|found| {
                let absolute = span.absolute(found.range.clone());
                let id = self
                    .document()
                    .find_or_register(ElementKind::List, absolute, Some(marker));
                List::with_match(self.document().clone(), id, Arc::clone(&grammar), found)
            })
            .collect())
    }

    /// Lists for every marker in [`DEFAULT_LIST_MARKERS`], in document order
    fn lists_default(&self) -> Result<Vec<List>> {
        let mut lists = Vec::new();
        for marker in DEFAULT_LIST_MARKERS {
            lists.extend(self.lists(marker)?);
        }
        lists.sort_by_key(|list| list.span().map(|s| s.start).unwrap_or(usize::MAX));
        Ok(lists)
    }
}

/// `Kind("raw text")`, or `Kind(<deregistered>)` once the span is gone
pub(crate) fn fmt_element(f: &mut fmt::Formatter<'_>, kind: &str, element: &impl SubElement) -> fmt::Result {
    match element.string() {
        Ok(text) => write!(f, "{kind}({text:?})"),
        Err(_) => write!(f, "{kind}(<deregistered>)"),
    }
}

/// A plain region of text, searchable for nested elements
pub struct SubText {
    document: Document,
    id: SpanId,
}

impl SubText {
    /// A new document holding `text`, viewed as a whole
    pub fn new(text: impl Into<String>) -> Self {
        let document = Document::new(text);
        let id = document.root();
        Self { document, id }
    }

    pub fn from_id(document: Document, id: SpanId) -> Self {
        Self { document, id }
    }

    /// Replace the whole text of this element
    pub fn set_string(&mut self, text: &str) -> Result<()> {
        let len = self.span()?.len();
        self.document.replace(self.id, 0..len, text)
    }
}

impl SubElement for SubText {
    fn document(&self) -> &Document {
        &self.document
    }

    fn id(&self) -> SpanId {
        self.id
    }
}

impl fmt::Debug for SubText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_element(f, "SubText", self)
    }
}

impl fmt::Display for SubText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string().unwrap_or_default())
    }
}
