//! Span-preserving extraction and in-place editing of wikitext sub-elements
//!
//! A [`Document`] owns the text and a registry of spans. [`Tag`], [`List`]
//! and [`SubText`] are views over registered spans; editing through one view
//! re-indexes every other span in the same document.

pub mod config;
pub mod document;
pub mod element;
pub mod error;
pub mod exit_codes;
pub mod grammar;
pub mod list;
pub mod tag;

pub use crate::document::{Document, ElementKind, Span, SpanId};
pub use crate::element::{DEFAULT_LIST_MARKERS, SubElement, SubText};
pub use crate::error::{ExtractError, Result};
pub use crate::grammar::{ListGrammar, ListMatch};
pub use crate::list::List;
pub use crate::tag::{AttrQuote, Attribute, StartTag, Tag, find_tags, parse_start_tag};
