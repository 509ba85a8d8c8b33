//! BM25 scoring with per-field boosts.
//!
//! A document's score is the sum, over every matched (term, field) posting, of
//!
//! ```text
//! boost(field) * weight * idf(term) * tf * (k1 + 1) / (tf + k1 * (1 - b + b * len / avg_len))
//! ```
//!
//! where `weight` is how strongly the query term resolved to the index term
//! (1.0 for an exact match, less for prefix or fuzzy expansions).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::index::{CorpusStats, Field, Posting, TermId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingParams {
    pub k1: f32,
    pub b: f32,
    pub title_boost: f32,
    pub body_boost: f32,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75, title_boost: 2.0, body_boost: 1.0 }
    }
}

impl RankingParams {
    pub fn boost(&self, field: Field) -> f32 {
        match field {
            Field::Title => self.title_boost,
            Field::Body => self.body_boost,
        }
    }
}

/// One posting of a query-matched term inside the document being scored.
#[derive(Debug, Clone, Copy)]
pub struct DocMatch<'a> {
    pub term: TermId,
    pub weight: f32,
    pub posting: &'a Posting,
}

/// BM25 idf; always positive for `doc_freq <= num_docs`.
pub fn idf(num_docs: u32, doc_freq: u32) -> f32 {
    let n = num_docs as f32;
    let df = doc_freq as f32;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// Length-normalized term-frequency component of BM25.
pub fn saturation(tf: u32, field_len: u32, avg_len: f32, params: &RankingParams) -> f32 {
    if tf == 0 {
        return 0.0;
    }
    let tf = tf as f32;
    let avg = if avg_len > 0.0 { avg_len } else { 1.0 };
    let norm = 1.0 - params.b + params.b * (field_len as f32 / avg);
    tf * (params.k1 + 1.0) / (tf + params.k1 * norm)
}

/// Score a single document from the postings its matched terms have in it.
pub fn score(matches: &[DocMatch<'_>], stats: &CorpusStats, params: &RankingParams) -> f32 {
    matches
        .iter()
        .map(|m| {
            let p = m.posting;
            let len = stats.field_len(p.doc_id, p.field);
            params.boost(p.field)
                * m.weight
                * idf(stats.num_docs, stats.df(m.term))
                * saturation(p.frequency, len, stats.avg_len(p.field), params)
        })
        .sum()
}

/// Result order: higher score first, then location with fewer characters, then
/// location text.
pub fn compare_ranked(a: (f32, &str), b: (f32, &str)) -> Ordering {
    b.0.total_cmp(&a.0)
        .then_with(|| a.1.chars().count().cmp(&b.1.chars().count()))
        .then_with(|| a.1.cmp(b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> CorpusStats {
        CorpusStats {
            num_docs: 2,
            avg_field_len: [2.0, 3.0],
            doc_field_len: vec![[2, 3], [2, 3]],
            doc_freq: vec![1, 2],
        }
    }

    fn posting(field: Field, frequency: u32) -> Posting {
        Posting { doc_id: 0, field, frequency, positions: (0..frequency).collect() }
    }

    #[test]
    fn rarer_terms_weigh_more() {
        assert!(idf(10, 1) > idf(10, 5));
        assert!(idf(1, 1) > 0.0);
    }

    #[test]
    fn title_boost_doubles_contribution() {
        let params = RankingParams::default();
        let stats = CorpusStats { avg_field_len: [3.0, 3.0], doc_field_len: vec![[3, 3]], ..stats() };
        let title = posting(Field::Title, 1);
        let body = posting(Field::Body, 1);
        let t = score(&[DocMatch { term: 0, weight: 1.0, posting: &title }], &stats, &params);
        let b = score(&[DocMatch { term: 0, weight: 1.0, posting: &body }], &stats, &params);
        assert!((t - 2.0 * b).abs() < 1e-5);
    }

    #[test]
    fn no_matches_scores_zero() {
        assert_eq!(score(&[], &stats(), &RankingParams::default()), 0.0);
    }

    #[test]
    fn frequency_saturates() {
        let params = RankingParams::default();
        let one = saturation(1, 3, 3.0, &params);
        let ten = saturation(10, 3, 3.0, &params);
        assert!(ten > one);
        assert!(ten < params.k1 + 1.0);
    }

    #[test]
    fn ties_prefer_shorter_then_lexicographic_location() {
        assert_eq!(compare_ranked((1.0, "/b"), (1.0, "/aa")), Ordering::Less);
        assert_eq!(compare_ranked((1.0, "/a"), (1.0, "/b")), Ordering::Less);
        assert_eq!(compare_ranked((2.0, "/long"), (1.0, "/a")), Ordering::Less);
    }

    #[test]
    fn location_length_counts_characters() {
        // "/éé" is 5 bytes but 3 characters
        assert_eq!(compare_ranked((1.0, "/éé"), (1.0, "/abcd")), Ordering::Less);
        assert_eq!(compare_ranked((1.0, "/ab"), (1.0, "/éé")), Ordering::Less);
    }
}
