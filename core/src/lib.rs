//! In-memory full-text search over documentation feeds.
//!
//! Records from a generator's search payload are validated, tokenized and
//! folded into an immutable [`Index`]. Queries are evaluated as the user types:
//! the last word is prefix-matched until it is finished, hits are ranked with
//! BM25 (titles boosted over bodies) and come back with highlight spans.

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod index;
pub mod query;
pub mod ranker;
pub mod tokenizer;

pub use builder::{build, CancelToken, IndexBuilder};
pub use config::SearchConfig;
pub use engine::{BuildSummary, QueryEngine};
pub use error::{DocumentIssue, Result, SearchError};
pub use feed::{coalesce_by_location, parse_feed, read_feed, FeedRecord};
pub use index::{Category, CorpusStats, DocId, Document, Field, Index, Posting, Span, TermId};
pub use query::{query, Highlight, Query, QueryState, SearchHit, SearchResults};
