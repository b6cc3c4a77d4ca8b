//! Tag extraction and editing
//!
//! A [`Tag`] is a view over one markup element in a shared [`Document`]:
//! either a self-closing start marker (`<br/>`) or a start marker, content
//! and a matching end marker (`<ref name=a>text</ref>`). Every accessor
//! re-parses the current shadow of the tag's span, so edits made elsewhere
//! in the document are always observed. Every mutator is a single splice
//! through [`Document::replace`].
//!
//! Content is not required to balance nested tags of the same name; the
//! first matching end marker closes a tag found by [`find_tags`].

use crate::document::{Document, ElementKind, Span, SpanId};
use crate::element::{SubElement, SubText, fmt_element};
use crate::error::{ExtractError, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

// Unquoted values stop at whitespace, quotes, `=`, `<`, `>` and backticks
const ATTR_BODY: &str = r#"\s+[^\s/>="']+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?"#;

static ATTR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\s+(?P<attr_name>[^\s/>="']+)(?:\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<uq>[^\s"'=<>`]+)))?"#,
    )
    .unwrap()
});

fn start_tag_pattern(anchor: &str) -> String {
    format!(r"{anchor}<(?P<name>[^\s/>]+)(?P<attrs>(?:{ATTR_BODY})*)(?P<tail>\s*(?P<self_closing>/)?>)")
}

/// A start marker at the very beginning of the text
static START_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(&start_tag_pattern(r"\A")).unwrap());

/// Start markers anywhere in the text
static START_TAG_SEARCH_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(&start_tag_pattern("")).unwrap());

static END_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</(?P<name>[^\s/>]+)\s*>").unwrap());

/// An end marker that finishes the text
static END_TAG_SUFFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</(?P<name>[^\s/>]+)\s*>\z").unwrap());

/// How an attribute value is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrQuote {
    /// `name=value`, or a bare `name` with no value at all
    Unquoted,
    /// `name='value'`
    Single,
    /// `name="value"`
    Double,
}

/// One attribute occurrence, in the order it appears in the start marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub quote: AttrQuote,
    /// `None` for a bare attribute such as `<input checked>`
    pub value: Option<String>,
}

/// The parts of a start marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub self_closing: bool,
}

/// Parse the start marker at the beginning of `text`
pub fn parse_start_tag(text: &str) -> Option<StartTag> {
    let caps = START_TAG_REGEX.captures(text)?;
    let attrs = caps.name("attrs")?;
    Some(StartTag {
        name: caps.name("name")?.as_str().to_string(),
        attributes: scan_attributes(text, attrs.range())
            .iter()
            .map(|a| a.resolve(text))
            .collect(),
        self_closing: caps.name("self_closing").is_some(),
    })
}

/// Ranges of every tag in `shadow`, in document order
///
/// A non-self-closing start marker is paired with the next end marker of the
/// same name (ASCII case-insensitive). Start markers without one are skipped.
pub fn find_tags(shadow: &str) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    for caps in START_TAG_SEARCH_REGEX.captures_iter(shadow) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.name("name")) else {
            continue;
        };
        if caps.name("self_closing").is_some() {
            found.push(whole.range());
            continue;
        }
        let end = END_TAG_REGEX
            .captures_iter(&shadow[whole.end()..])
            .find(|end| end.name("name").is_some_and(|n| n.as_str().eq_ignore_ascii_case(name.as_str())))
            .and_then(|end| end.get(0));
        if let Some(end) = end {
            found.push(whole.start()..whole.end() + end.end());
        }
    }
    found
}

/// Attribute occurrence with offsets relative to the tag text
#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSpan {
    /// Whole occurrence including its leading whitespace
    range: Range<usize>,
    name: Range<usize>,
    quote: AttrQuote,
    value: Option<Range<usize>>,
}

impl AttrSpan {
    fn from_captures(caps: &Captures<'_>, offset: usize) -> Option<Self> {
        let shift = |r: Range<usize>| r.start + offset..r.end + offset;
        let (quote, value) = if let Some(v) = caps.name("dq") {
            (AttrQuote::Double, Some(v.range()))
        } else if let Some(v) = caps.name("sq") {
            (AttrQuote::Single, Some(v.range()))
        } else {
            (AttrQuote::Unquoted, caps.name("uq").map(|v| v.range()))
        };
        Some(Self {
            range: shift(caps.get(0)?.range()),
            name: shift(caps.name("attr_name")?.range()),
            quote,
            value: value.map(shift),
        })
    }

    fn name<'a>(&self, text: &'a str) -> &'a str {
        &text[self.name.clone()]
    }

    fn value<'a>(&self, text: &'a str) -> &'a str {
        self.value.clone().map_or("", |v| &text[v])
    }

    fn resolve(&self, text: &str) -> Attribute {
        Attribute {
            name: self.name(text).to_string(),
            quote: self.quote,
            value: self.value.clone().map(|v| text[v].to_string()),
        }
    }
}

fn scan_attributes(text: &str, region: Range<usize>) -> Vec<AttrSpan> {
    ATTR_REGEX
        .captures_iter(&text[region.clone()])
        .filter_map(|caps| AttrSpan::from_captures(&caps, region.start))
        .collect()
}

/// Structure of one tag, offsets relative to the tag text
#[derive(Debug, Clone)]
struct TagParse {
    name: Range<usize>,
    attrs: Vec<AttrSpan>,
    /// Where a new attribute is inserted: right after the last one
    attrs_end: usize,
    /// `>`, `/>` or ` />` closing the start marker
    tail: Range<usize>,
    contents: Option<Range<usize>>,
    end_name: Option<Range<usize>>,
}

impl TagParse {
    fn parse(shadow: &str) -> Option<Self> {
        let caps = START_TAG_REGEX.captures(shadow)?;
        let start = caps.get(0)?;
        let name = caps.name("name")?;
        let attrs = caps.name("attrs")?;
        let tail = caps.name("tail")?.range();

        let (contents, end_name) = if caps.name("self_closing").is_some() {
            if start.end() != shadow.len() {
                return None;
            }
            (None, None)
        } else {
            let end = END_TAG_SUFFIX_REGEX.captures(&shadow[start.end()..])?;
            let end_marker = end.get(0)?;
            let end_name = end.name("name")?;
            if !end_name.as_str().eq_ignore_ascii_case(name.as_str()) {
                return None;
            }
            let offset = start.end();
            (
                Some(offset..offset + end_marker.start()),
                Some(offset + end_name.start()..offset + end_name.end()),
            )
        };

        Some(Self {
            name: name.range(),
            attrs: scan_attributes(shadow, attrs.range()),
            attrs_end: attrs.end(),
            tail,
            contents,
            end_name,
        })
    }
}

/// A markup tag bound to a span of a shared document
pub struct Tag {
    document: Document,
    id: SpanId,
}

impl Tag {
    /// Parse `text` as a complete tag in a document of its own
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let document = Document::new(text);
        let span = document.span(document.root())?;
        let id = document.register(ElementKind::Tag, span, None);
        let tag = Self { document, id };
        tag.parse()?;
        Ok(tag)
    }

    /// A view over a span that is already registered as a tag
    pub fn from_id(document: Document, id: SpanId) -> Self {
        Self { document, id }
    }

    /// Register `span` of `document` as a tag and return a view over it
    pub fn from_span(document: &Document, span: Span) -> Self {
        let id = document.find_or_register(ElementKind::Tag, span, None);
        Self::from_id(document.clone(), id)
    }

    fn parse(&self) -> Result<TagParse> {
        let shadow = self.shadow()?;
        TagParse::parse(&shadow).ok_or_else(|| ExtractError::GrammarMismatch {
            kind: ElementKind::Tag,
            text: self.string().unwrap_or(shadow),
        })
    }

    pub fn name(&self) -> Result<String> {
        let parse = self.parse()?;
        Ok(self.string()?[parse.name].to_string())
    }

    /// Rename the start marker and, if present, the end marker
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        let parse = self.parse()?;
        if let Some(end_name) = parse.end_name {
            self.document.replace(self.id, end_name, name)?;
        }
        self.document.replace(self.id, parse.name, name)
    }

    pub fn is_self_closing(&self) -> Result<bool> {
        Ok(self.parse()?.contents.is_none())
    }

    /// The start marker as parsed from the current text
    pub fn start_marker(&self) -> Result<StartTag> {
        let parse = self.parse()?;
        let string = self.string()?;
        Ok(StartTag {
            name: string[parse.name].to_string(),
            attributes: parse.attrs.iter().map(|a| a.resolve(&string)).collect(),
            self_closing: parse.contents.is_none(),
        })
    }

    /// Text between the start and end markers, `None` for a self-closing tag
    pub fn contents(&self) -> Result<Option<String>> {
        let parse = self.parse()?;
        let string = self.string()?;
        Ok(parse.contents.map(|r| string[r].to_string()))
    }

    /// Replace the contents; a self-closing tag becomes a paired tag
    pub fn set_contents(&mut self, value: &str) -> Result<()> {
        let parse = self.parse()?;
        match parse.contents {
            Some(contents) => self.document.replace(self.id, contents, value),
            None => {
                let string = self.string()?;
                let name = &string[parse.name];
                self.document
                    .replace(self.id, parse.tail, &format!(">{value}</{name}>"))
            }
        }
    }

    /// A view over the contents that can be searched for nested elements
    ///
    /// The contents span is registered once; later calls on an unchanged tag
    /// return a view over the same registered span.
    pub fn parsed_contents(&self) -> Result<Option<SubText>> {
        let parse = self.parse()?;
        let span = self.span()?;
        Ok(parse.contents.map(|contents| {
            let id = self
                .document
                .find_or_register(ElementKind::SubText, span.absolute(contents), None);
            SubText::from_id(self.document.clone(), id)
        }))
    }

    /// Every attribute occurrence in document order, duplicates included
    pub fn attributes(&self) -> Result<Vec<Attribute>> {
        let parse = self.parse()?;
        let string = self.string()?;
        Ok(parse.attrs.iter().map(|a| a.resolve(&string)).collect())
    }

    /// Value of the last occurrence of `name`; a bare attribute yields `""`
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        let parse = self.parse()?;
        let string = self.string()?;
        Ok(parse
            .attrs
            .iter()
            .rev()
            .find(|a| a.name(&string) == name)
            .map(|a| a.value(&string).to_string()))
    }

    /// Set the value of the last occurrence of `name`, or append the attribute
    ///
    /// The rewritten value is always double-quoted; an empty value leaves a
    /// bare attribute name. Earlier duplicates of `name` are left untouched.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let parse = self.parse()?;
        let string = self.string()?;
        let assignment = if value.is_empty() {
            String::new()
        } else {
            format!("=\"{value}\"")
        };

        match parse.attrs.iter().rev().find(|a| a.name(&string) == name) {
            Some(attr) => self
                .document
                .replace(self.id, attr.name.end..attr.range.end, &assignment),
            None => self.document.replace(
                self.id,
                parse.attrs_end..parse.attrs_end,
                &format!(" {name}{assignment}"),
            ),
        }
    }

    /// Remove every occurrence of `name`
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let parse = self.parse()?;
        let string = self.string()?;
        for attr in parse.attrs.iter().rev().filter(|a| a.name(&string) == name) {
            self.document.replace(self.id, attr.range.clone(), "")?;
        }
        Ok(())
    }

    pub fn has(&self, name: &str) -> Result<bool> {
        let parse = self.parse()?;
        let string = self.string()?;
        Ok(parse.attrs.iter().any(|a| a.name(&string) == name))
    }

    /// Attribute names mapped to values, later duplicates winning
    pub fn attrs(&self) -> Result<HashMap<String, String>> {
        let parse = self.parse()?;
        let string = self.string()?;
        Ok(parse
            .attrs
            .iter()
            .map(|a| (a.name(&string).to_string(), a.value(&string).to_string()))
            .collect())
    }
}

impl SubElement for Tag {
    fn document(&self) -> &Document {
        &self.document
    }

    fn id(&self) -> SpanId {
        self.id
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_element(f, "Tag", self)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string().unwrap_or_default())
    }
}
