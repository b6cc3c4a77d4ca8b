//! Nested list extraction and editing
//!
//! A [`List`] is a run of lines sharing one literal leading marker. The
//! marker lives in the document's span registry next to the list's span,
//! so every view over the same span agrees on it.
//!
//! The last parse is memoized together with the shadow it was derived
//! from and re-derived only when [`ListMatch::is_valid_for`] rejects the
//! current shadow.

use crate::document::{Document, ElementKind, SpanId};
use crate::element::{SubElement, fmt_element};
use crate::error::{ExtractError, Result};
use crate::grammar::{ListGrammar, ListMatch};
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, Mutex};

pub struct List {
    document: Document,
    id: SpanId,
    cache: Mutex<Option<Arc<ListMatch>>>,
    grammar: Mutex<Option<Arc<ListGrammar>>>,
}

impl List {
    /// Parse `text` as a complete list in a document of its own
    pub fn new(text: impl Into<String>, pattern: &str) -> Result<Self> {
        let document = Document::new(text);
        let span = document.span(document.root())?;
        let id = document.register(ElementKind::List, span, Some(pattern));
        let list = Self::from_id(document, id);
        list.current_match()?;
        Ok(list)
    }

    /// A view over a span that is already registered as a list
    pub fn from_id(document: Document, id: SpanId) -> Self {
        Self {
            document,
            id,
            cache: Mutex::new(None),
            grammar: Mutex::new(None),
        }
    }

    /// A view seeded with a parse found while searching an enclosing element
    pub(crate) fn with_match(document: Document, id: SpanId, grammar: Arc<ListGrammar>, found: ListMatch) -> Self {
        Self {
            document,
            id,
            cache: Mutex::new(Some(Arc::new(found))),
            grammar: Mutex::new(Some(grammar)),
        }
    }

    /// The literal marker every top-level line starts with
    pub fn pattern(&self) -> Result<String> {
        Ok(self.document.pattern(self.id)?.unwrap_or_default())
    }

    fn grammar(&self) -> Result<Arc<ListGrammar>> {
        let pattern = self.pattern()?;
        let mut cached = self.grammar.lock().expect("List grammar mutex poisoned");
        if let Some(grammar) = cached.as_ref()
            && grammar.pattern() == pattern
        {
            return Ok(Arc::clone(grammar));
        }

        let grammar = Arc::new(ListGrammar::compile(&pattern)?);
        *cached = Some(Arc::clone(&grammar));
        Ok(grammar)
    }

    fn current_match(&self) -> Result<Arc<ListMatch>> {
        let shadow = self.shadow()?;
        let mut cache = self.cache.lock().expect("List match cache mutex poisoned");
        if let Some(found) = cache.as_ref()
            && found.is_valid_for(&shadow)
        {
            return Ok(Arc::clone(found));
        }

        let grammar = self.grammar()?;
        let Some(found) = grammar.full_match(&shadow) else {
            return Err(ExtractError::GrammarMismatch {
                kind: ElementKind::List,
                text: self.string().unwrap_or(shadow),
            });
        };
        log::debug!(
            "[wikisplice-list] re-parsed {:?} with marker {:?}: {} item(s)",
            self.id,
            grammar.pattern(),
            found.items.len()
        );

        let found = Arc::new(found);
        *cache = Some(Arc::clone(&found));
        Ok(found)
    }

    fn slices(&self, found: &ListMatch, ranges: &[Range<usize>]) -> Result<Vec<String>> {
        let string = self.string()?;
        Ok(ranges
            .iter()
            .map(|range| string[found.relative(range)].to_string())
            .collect())
    }

    /// Item texts, without markers or absorbed sub-lines
    pub fn items(&self) -> Result<Vec<String>> {
        let found = self.current_match()?;
        self.slices(&found, &found.items)
    }

    /// Item texts with their absorbed sub-lines, leading marker excluded
    pub fn fullitems(&self) -> Result<Vec<String>> {
        let found = self.current_match()?;
        self.slices(&found, &found.fullitems)
    }

    pub fn item(&self, index: usize) -> Result<String> {
        let items = self.items()?;
        let len = items.len();
        items.into_iter().nth(index).ok_or(ExtractError::InvalidIndex { index, len })
    }

    pub fn fullitem(&self, index: usize) -> Result<String> {
        let fullitems = self.fullitems()?;
        let len = fullitems.len();
        fullitems
            .into_iter()
            .nth(index)
            .ok_or(ExtractError::InvalidIndex { index, len })
    }

    /// One-based nesting depth: the length of the leading marker
    pub fn level(&self) -> Result<usize> {
        Ok(self.current_match()?.first_marker().chars().count())
    }

    /// Lists with marker `pattern + marker` nested in full item `index`
    ///
    /// Candidates are discovered in this list's text and then collected from
    /// the registry, so previously registered sub-lists are found too. An
    /// out-of-range `index` yields no lists.
    pub fn sublists(&self, index: usize, marker: &str) -> Result<Vec<List>> {
        let found = self.current_match()?;
        let Some(fullitem) = found.fullitems.get(index) else {
            return Ok(Vec::new());
        };
        let item = self.span()?.absolute(found.relative(fullitem));

        let pattern = format!("{}{marker}", self.pattern()?);
        self.lists(&pattern)?;

        Ok(self
            .document
            .lookup(ElementKind::List, |span, registered| {
                registered == Some(pattern.as_str()) && item.start < span.start && span.end <= item.end
            })
            .into_iter()
            .map(|id| List::from_id(self.document.clone(), id))
            .collect())
    }

    /// Rewrite every leading marker (sub-lines included) to `new_marker`
    pub fn convert(&mut self, new_marker: &str) -> Result<()> {
        let grammar = Arc::new(ListGrammar::compile(new_marker)?);
        let found = self.current_match()?;

        let mut markers: Vec<Range<usize>> = found
            .markers
            .iter()
            .chain(&found.sub_markers)
            .map(|marker| found.relative(marker))
            .collect();
        markers.sort_by_key(|marker| marker.start);

        for marker in markers.into_iter().rev() {
            self.document.replace(self.id, marker, new_marker)?;
        }
        self.document.set_pattern(self.id, new_marker)?;

        *self.cache.lock().expect("List match cache mutex poisoned") = None;
        *self.grammar.lock().expect("List grammar mutex poisoned") = Some(grammar);
        log::debug!("[wikisplice-list] converted {:?} to marker {new_marker:?}", self.id);
        Ok(())
    }
}

impl SubElement for List {
    fn document(&self) -> &Document {
        &self.document
    }

    fn id(&self) -> SpanId {
        self.id
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_element(f, "List", self)
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string().unwrap_or_default())
    }
}
