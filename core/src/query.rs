//! Query parsing, term resolution, candidate retrieval and highlighting.
//!
//! A query is re-parsed on every keystroke. While the input ends inside a word
//! that word is treated as incomplete and expanded to every indexed term it
//! prefixes; once the input ends with whitespace or punctuation all words are
//! matched whole.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::index::{DocId, Document, Field, Index, Span, TermId};
use crate::ranker::{self, DocMatch};
use crate::tokenizer::{self, Token, Tokenizer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Hits returned when the caller gives no limit.
    pub default_limit: usize,
    /// Weight of terms reached through prefix expansion rather than an exact match.
    pub prefix_weight: f32,
    /// Typo tolerance; off unless configured.
    pub fuzzy: Option<FuzzyConfig>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_limit: 10, prefix_weight: 0.375, fuzzy: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Allowed edits as a fraction of the query word's length.
    pub max_edit_ratio: f32,
    pub max_distance: usize,
    pub weight: f32,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self { max_edit_ratio: 0.2, max_distance: 2, weight: 0.45 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryState {
    /// Nothing searchable in the input.
    Empty,
    /// The last word may still be being typed.
    Prefix,
    /// Every word is finished.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub state: QueryState,
    pub tokens: Vec<Token>,
}

impl Query {
    pub fn parse(raw: &str, tokenizer: &Tokenizer) -> Self {
        let words: Vec<_> = tokenizer::words(raw).collect();
        let last = words.len().saturating_sub(1);
        // a word running to the end of the input may still be being typed
        let open_word = words.last().is_some_and(|m| m.end() == raw.len());
        let mut tokens = Vec::with_capacity(words.len());
        for (i, mat) in words.into_iter().enumerate() {
            if let Some(token) = tokenizer.analyze(mat, i as u32, Field::Body, open_word && i == last) {
                tokens.push(token);
            }
        }
        let state = if tokens.is_empty() {
            QueryState::Empty
        } else if open_word && tokens.last().map(|t| t.position) == Some(last as u32) {
            QueryState::Prefix
        } else {
            QueryState::Complete
        };
        Self { state, tokens }
    }

    fn is_open(&self, i: usize) -> bool {
        self.state == QueryState::Prefix && i + 1 == self.tokens.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub field: Field,
    /// Sorted, non-overlapping byte ranges into the field text.
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub document: Arc<Document>,
    pub score: f32,
    /// Index terms that matched, in lexical order.
    pub matched_terms: Vec<String>,
    pub highlights: Vec<Highlight>,
}

#[derive(Debug, Clone)]
pub struct SearchResults {
    pub state: QueryState,
    /// Number of matching documents before truncation to the limit.
    pub total_hits: usize,
    pub hits: Vec<SearchHit>,
}

impl SearchResults {
    fn empty(state: QueryState) -> Self {
        Self { state, total_hits: 0, hits: Vec::new() }
    }
}

/// Run `raw_input` against `index`, returning at most `top_k` hits
/// (the configured default when `None`).
pub fn query(raw_input: &str, index: &Index, top_k: Option<usize>) -> SearchResults {
    let parsed = Query::parse(raw_input, index.tokenizer());
    if parsed.state == QueryState::Empty {
        return SearchResults::empty(QueryState::Empty);
    }
    let config = &index.config().query;
    let limit = top_k.unwrap_or(config.default_limit);

    // each index term counts once, at the best weight any query word gave it
    let mut resolved: BTreeMap<TermId, f32> = BTreeMap::new();
    for (i, token) in parsed.tokens.iter().enumerate() {
        for (term, weight) in resolve(token, parsed.is_open(i), index, config) {
            let w = resolved.entry(term).or_insert(weight);
            *w = w.max(weight);
        }
    }

    let mut candidates: BTreeMap<DocId, Vec<DocMatch<'_>>> = BTreeMap::new();
    for (&term, &weight) in &resolved {
        for posting in index.postings(term) {
            candidates.entry(posting.doc_id).or_default().push(DocMatch { term, weight, posting });
        }
    }

    let stats = index.stats();
    let params = &index.config().ranking;
    let mut scored: Vec<(DocId, f32, Vec<DocMatch<'_>>)> = candidates
        .into_iter()
        .map(|(doc_id, matches)| {
            let score = ranker::score(&matches, stats, params);
            (doc_id, score, matches)
        })
        .collect();
    scored.sort_by(|a, b| {
        ranker::compare_ranked(
            (a.1, index.docs[a.0 as usize].location.as_str()),
            (b.1, index.docs[b.0 as usize].location.as_str()),
        )
    });

    let total_hits = scored.len();
    let hits: Vec<SearchHit> = scored
        .into_iter()
        .take(limit)
        .map(|(doc_id, score, matches)| SearchHit {
            document: Arc::clone(&index.docs[doc_id as usize]),
            score,
            matched_terms: matches
                .iter()
                .map(|m| index.term(m.term).to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            highlights: highlights(index, doc_id, &matches),
        })
        .collect();

    debug!(query = raw_input, state = ?parsed.state, total_hits, returned = hits.len(), "query evaluated");
    SearchResults { state: parsed.state, total_hits, hits }
}

/// Index terms a query token stands for, each with its best weight.
fn resolve(token: &Token, open: bool, index: &Index, config: &QueryConfig) -> BTreeMap<TermId, f32> {
    let mut out: BTreeMap<TermId, f32> = BTreeMap::new();
    let mut offer = |term: TermId, weight: f32| {
        let w = out.entry(term).or_insert(weight);
        if weight > *w {
            *w = weight;
        }
    };

    if let Some(term) = index.term_id(&token.term) {
        offer(term, 1.0);
    }
    if open {
        for term in index.terms_with_prefix(&token.surface).chain(index.surfaces_with_prefix(&token.surface)) {
            offer(term, config.prefix_weight);
        }
    }
    if let Some(fuzzy) = &config.fuzzy {
        let len = token.surface.chars().count();
        let max = ((len as f32 * fuzzy.max_edit_ratio).floor() as usize).min(fuzzy.max_distance);
        if max > 0 {
            for (surface, term) in index.surfaces() {
                if surface.chars().count().abs_diff(len) > max {
                    continue;
                }
                if strsim::levenshtein(&token.surface, surface) <= max {
                    offer(term, fuzzy.weight);
                }
            }
        }
    }
    out
}

fn highlights(index: &Index, doc_id: DocId, matches: &[DocMatch<'_>]) -> Vec<Highlight> {
    let mut per_field: BTreeMap<Field, Vec<Span>> = BTreeMap::new();
    for m in matches {
        let field = m.posting.field;
        let spans = per_field.entry(field).or_default();
        spans.extend(m.posting.positions.iter().filter_map(|&pos| index.span(doc_id, field, pos)));
    }
    per_field
        .into_iter()
        .filter(|(_, spans)| !spans.is_empty())
        .map(|(field, spans)| Highlight { field, spans: merge_spans(spans) })
        .collect()
}

/// Sort spans and merge the ones that overlap or touch.
pub fn merge_spans(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort();
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}
