//! Index construction.
//!
//! Documents are tokenized in parallel with rayon, each into its own buffer.
//! Buffers are then folded into the shared index by a single writer, walking
//! documents in feed order so term ids and postings order are reproducible.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::config::SearchConfig;
use crate::error::{DocumentIssue, Result, SearchError};
use crate::feed::FeedRecord;
use crate::index::{Category, CorpusStats, DocId, Document, Field, FieldOffsets, Index, Posting, TermId};
use crate::tokenizer::Tokenizer;

/// Shared flag used to abandon a build that has been superseded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn same(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Default)]
struct PendingTerm {
    surfaces: BTreeSet<String>,
    positions: [Vec<u32>; 2],
}

/// Everything one document contributes, before term ids exist.
struct DocBuffer {
    terms: BTreeMap<String, PendingTerm>,
    field_len: [u32; 2],
    offsets: FieldOffsets,
}

pub struct IndexBuilder {
    config: SearchConfig,
    tokenizer: Tokenizer,
}

impl IndexBuilder {
    pub fn new(config: SearchConfig) -> Self {
        let tokenizer = Tokenizer::new(&config.tokenizer);
        Self { config, tokenizer }
    }

    pub fn build(&self, records: &[FeedRecord]) -> Result<Index> {
        self.build_cancellable(records, &CancelToken::new())
    }

    /// Build an index, giving up with `Cancelled` as soon as `cancel` is set.
    pub fn build_cancellable(&self, records: &[FeedRecord], cancel: &CancelToken) -> Result<Index> {
        let docs = validate(records)?;

        let buffers = docs
            .par_iter()
            .map(|doc| {
                if cancel.is_cancelled() {
                    return Err(SearchError::Cancelled);
                }
                Ok(self.tokenize_document(doc))
            })
            .collect::<Result<Vec<DocBuffer>>>()?;

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        let index = self.merge(docs, buffers);
        info!(
            num_docs = index.num_docs(),
            num_terms = index.num_terms(),
            avg_title_len = index.stats.avg_len(Field::Title),
            avg_body_len = index.stats.avg_len(Field::Body),
            "index build complete"
        );
        Ok(index)
    }

    fn tokenize_document(&self, doc: &Document) -> DocBuffer {
        let mut buf = DocBuffer { terms: BTreeMap::new(), field_len: [0; 2], offsets: Default::default() };
        for field in Field::ALL {
            for token in self.tokenizer.tokenize(doc.field(field), field) {
                buf.field_len[field.index()] += 1;
                buf.offsets[field.index()].push((token.position, token.span));
                let pending = buf.terms.entry(token.term).or_default();
                pending.positions[field.index()].push(token.position);
                pending.surfaces.insert(token.surface);
            }
        }
        buf
    }

    fn merge(&self, docs: Vec<Document>, buffers: Vec<DocBuffer>) -> Index {
        let mut dictionary: BTreeMap<String, TermId> = BTreeMap::new();
        let mut terms: Vec<String> = Vec::new();
        let mut surfaces: BTreeMap<String, TermId> = BTreeMap::new();
        let mut postings: Vec<Vec<Posting>> = Vec::new();
        let mut doc_freq: Vec<u32> = Vec::new();
        let mut doc_field_len: Vec<[u32; 2]> = Vec::with_capacity(docs.len());
        let mut offsets: Vec<FieldOffsets> = Vec::with_capacity(docs.len());

        for (doc_id, buf) in buffers.into_iter().enumerate() {
            let doc_id = doc_id as DocId;
            for (term, pending) in buf.terms {
                let tid = match dictionary.get(&term) {
                    Some(&id) => id,
                    None => {
                        let id = terms.len() as TermId;
                        dictionary.insert(term.clone(), id);
                        terms.push(term);
                        postings.push(Vec::new());
                        doc_freq.push(0);
                        id
                    }
                };
                doc_freq[tid as usize] += 1;
                for surface in pending.surfaces {
                    surfaces.entry(surface).or_insert(tid);
                }
                for (field, positions) in Field::ALL.into_iter().zip(pending.positions) {
                    if positions.is_empty() {
                        continue;
                    }
                    postings[tid as usize].push(Posting {
                        doc_id,
                        field,
                        frequency: positions.len() as u32,
                        positions,
                    });
                }
            }
            doc_field_len.push(buf.field_len);
            offsets.push(buf.offsets);
        }
        for list in postings.iter_mut() {
            list.sort_by_key(|p| (p.doc_id, p.field));
        }

        let num_docs = docs.len() as u32;
        let mut avg_field_len = [0.0f32; 2];
        if num_docs > 0 {
            for field in Field::ALL {
                let total: u64 = doc_field_len.iter().map(|l| l[field.index()] as u64).sum();
                avg_field_len[field.index()] = total as f32 / num_docs as f32;
            }
        }

        Index {
            docs: docs.into_iter().map(Arc::new).collect(),
            dictionary,
            terms,
            surfaces,
            postings,
            offsets,
            stats: CorpusStats { num_docs, avg_field_len, doc_field_len, doc_freq },
            config: self.config.clone(),
            tokenizer: self.tokenizer.clone(),
        }
    }
}

/// Build an index from a complete feed.
pub fn build(records: &[FeedRecord], config: &SearchConfig) -> Result<Index> {
    IndexBuilder::new(config.clone()).build(records)
}

/// Check every record and assign document ids in feed order. All problems are
/// reported together.
pub fn validate(records: &[FeedRecord]) -> Result<Vec<Document>> {
    let mut issues = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    let mut docs = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        if record.location.trim().is_empty() {
            issues.push(DocumentIssue::EmptyLocation { index, title: record.title.clone() });
        } else if let Some(&first) = seen.get(record.location.as_str()) {
            issues.push(DocumentIssue::DuplicateLocation {
                location: record.location.clone(),
                first,
                first_title: records[first].title.clone(),
                second: index,
                second_title: record.title.clone(),
            });
        } else {
            seen.insert(&record.location, index);
        }
        match record.category.parse::<Category>() {
            Ok(category) => docs.push(Document {
                id: docs.len() as DocId,
                location: record.location.clone(),
                page: record.page.clone(),
                title: record.title.clone(),
                category,
                body: record.text.clone(),
            }),
            Err(_) => issues.push(DocumentIssue::UnknownCategory {
                index,
                location: record.location.clone(),
                label: record.category.clone(),
            }),
        }
    }

    if issues.is_empty() {
        Ok(docs)
    } else {
        Err(SearchError::InvalidDocument(issues))
    }
}
