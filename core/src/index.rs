use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::tokenizer::Tokenizer;

pub type TermId = u32;
pub type DocId = u32;

/// Indexed document fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Body,
}

impl Field {
    pub const ALL: [Field; 2] = [Field::Title, Field::Body];

    pub fn index(self) -> usize {
        match self {
            Field::Title => 0,
            Field::Body => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Body => "body",
        }
    }
}

/// Kind of page a record describes. The generator only emits labels from this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Section,
    Page,
    Type,
    Method,
    Function,
    Module,
    Macro,
    Constant,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Section => "section",
            Category::Page => "page",
            Category::Type => "type",
            Category::Method => "method",
            Category::Function => "function",
            Category::Module => "module",
            Category::Macro => "macro",
            Category::Constant => "constant",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "section" => Ok(Category::Section),
            "page" => Ok(Category::Page),
            "type" => Ok(Category::Type),
            "method" => Ok(Category::Method),
            "function" => Ok(Category::Function),
            "module" => Ok(Category::Module),
            "macro" => Ok(Category::Macro),
            "constant" => Ok(Category::Constant),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub location: String,
    pub page: String,
    pub title: String,
    pub category: Category,
    pub body: String,
}

impl Document {
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Body => &self.body,
        }
    }
}

/// Half-open byte range within a field's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub field: Field,
    pub frequency: u32,
    /// Word positions within the field, ascending.
    pub positions: Vec<u32>,
}

/// Corpus-wide statistics the ranker needs. Computed once at build time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusStats {
    pub num_docs: u32,
    /// Average kept-token count per field, indexed by `Field::index`.
    pub avg_field_len: [f32; 2],
    pub doc_field_len: Vec<[u32; 2]>,
    /// Number of documents containing each term, indexed by `TermId`.
    pub doc_freq: Vec<u32>,
}

impl CorpusStats {
    pub fn avg_len(&self, field: Field) -> f32 {
        self.avg_field_len[field.index()]
    }

    pub fn field_len(&self, doc_id: DocId, field: Field) -> u32 {
        self.doc_field_len.get(doc_id as usize).map_or(0, |lens| lens[field.index()])
    }

    pub fn df(&self, term: TermId) -> u32 {
        self.doc_freq.get(term as usize).copied().unwrap_or(0)
    }
}

/// Byte ranges of the indexed words of one document, per field, keyed by word
/// position. Dropped words have no entry.
pub(crate) type FieldOffsets = [Vec<(u32, Span)>; 2];

/// Immutable inverted index over one corpus.
#[derive(Debug)]
pub struct Index {
    pub(crate) docs: Vec<Arc<Document>>,
    /// Term text to id; ordered so prefix lookups are range scans.
    pub(crate) dictionary: BTreeMap<String, TermId>,
    pub(crate) terms: Vec<String>,
    /// Unstemmed forms seen in the corpus, each mapped to its term.
    pub(crate) surfaces: BTreeMap<String, TermId>,
    pub(crate) postings: Vec<Vec<Posting>>, // sorted by (doc_id, field)
    pub(crate) offsets: Vec<FieldOffsets>,
    pub(crate) stats: CorpusStats,
    pub(crate) config: SearchConfig,
    pub(crate) tokenizer: Tokenizer,
}

impl Index {
    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn document(&self, doc_id: DocId) -> Option<&Arc<Document>> {
        self.docs.get(doc_id as usize)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.docs.iter()
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.dictionary.get(term).copied()
    }

    pub fn term(&self, term: TermId) -> &str {
        &self.terms[term as usize]
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, TermId)> {
        self.dictionary.iter().map(|(t, &id)| (t.as_str(), id))
    }

    pub fn postings(&self, term: TermId) -> &[Posting] {
        self.postings.get(term as usize).map_or(&[], Vec::as_slice)
    }

    /// Postings of `term` that belong to `doc_id`, at most one per field.
    pub fn doc_postings(&self, term: TermId, doc_id: DocId) -> &[Posting] {
        let list = self.postings(term);
        let start = list.partition_point(|p| p.doc_id < doc_id);
        let end = start + list[start..].partition_point(|p| p.doc_id == doc_id);
        &list[start..end]
    }

    pub fn stats(&self) -> &CorpusStats {
        &self.stats
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Byte range of the word at `position` in a document field, or `None`
    /// when that word was not indexed.
    pub fn span(&self, doc_id: DocId, field: Field, position: u32) -> Option<Span> {
        let offsets = &self.offsets.get(doc_id as usize)?[field.index()];
        offsets
            .binary_search_by_key(&position, |(pos, _)| *pos)
            .ok()
            .map(|i| offsets[i].1)
    }

    /// Terms whose text starts with `prefix`.
    pub fn terms_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = TermId> + 'a {
        self.dictionary
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(t, _)| t.starts_with(prefix))
            .map(|(_, &id)| id)
    }

    /// Terms reachable from a surface form starting with `prefix`.
    pub fn surfaces_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = TermId> + 'a {
        self.surfaces
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(s, _)| s.starts_with(prefix))
            .map(|(_, &id)| id)
    }

    pub fn surfaces(&self) -> impl Iterator<Item = (&str, TermId)> {
        self.surfaces.iter().map(|(s, &id)| (s.as_str(), id))
    }
}
