use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::builder::{CancelToken, IndexBuilder};
use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::feed::FeedRecord;
use crate::index::{Field, Index};
use crate::query::{self, SearchResults};

#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    /// Incremented on every successful publish, starting at 1.
    pub generation: u64,
    pub num_docs: usize,
    pub num_terms: usize,
    pub avg_title_len: f32,
    pub avg_body_len: f32,
    pub took_s: f64,
}

/// Owns the active index and serves queries against it.
///
/// Queries take a cheap `Arc` snapshot and never wait on a build. A rebuild
/// cancels any build still in flight and replaces the active index in one swap;
/// when it fails the previous index stays in service.
pub struct QueryEngine {
    config: SearchConfig,
    active: RwLock<Option<Arc<Index>>>,
    in_flight: Mutex<Option<CancelToken>>,
    generation: AtomicU64,
}

impl QueryEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self { config, active: RwLock::new(None), in_flight: Mutex::new(None), generation: AtomicU64::new(0) }
    }

    /// Engine serving an index built elsewhere; later rebuilds reuse its config.
    pub fn with_index(index: Index) -> Self {
        let engine = Self::new(index.config().clone());
        engine.publish(index);
        engine
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.active.read().is_some()
    }

    /// Replace the active index. Returns the new generation.
    pub fn publish(&self, index: Index) -> u64 {
        let index = Arc::new(index);
        let mut active = self.active.write();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *active = Some(index);
        generation
    }

    /// Build an index from `records` and make it active.
    pub fn rebuild(&self, records: &[FeedRecord]) -> Result<BuildSummary> {
        let token = CancelToken::new();
        if let Some(previous) = self.in_flight.lock().replace(token.clone()) {
            previous.cancel();
            debug!("cancelled in-flight build");
        }

        let start = Instant::now();
        let result = IndexBuilder::new(self.config.clone()).build_cancellable(records, &token);

        // Publishing under the in-flight lock keeps a superseded build from
        // overwriting a newer one.
        let mut in_flight = self.in_flight.lock();
        let current = in_flight.as_ref().is_some_and(|t| t.same(&token));
        if current {
            *in_flight = None;
        }
        let index = match result {
            Ok(_) if !current || token.is_cancelled() => return Err(SearchError::Cancelled),
            Ok(index) => index,
            Err(SearchError::Cancelled) => return Err(SearchError::Cancelled),
            Err(e) => {
                warn!(error = %e, "rebuild failed; keeping previous index");
                return Err(e);
            }
        };

        let summary_stats = (index.num_docs(), index.num_terms(), index.stats().avg_len(Field::Title), index.stats().avg_len(Field::Body));
        let generation = self.publish(index);
        drop(in_flight);

        let (num_docs, num_terms, avg_title_len, avg_body_len) = summary_stats;
        let took_s = start.elapsed().as_secs_f64();
        info!(generation, num_docs, num_terms, took_s, "published index");
        Ok(BuildSummary { generation, num_docs, num_terms, avg_title_len, avg_body_len, took_s })
    }

    /// The active index, or `EmptyIndex` before the first successful build.
    pub fn snapshot(&self) -> Result<Arc<Index>> {
        self.active.read().clone().ok_or(SearchError::EmptyIndex)
    }

    pub fn query(&self, raw_input: &str, top_k: Option<usize>) -> Result<SearchResults> {
        let index = self.snapshot()?;
        Ok(query::query(raw_input, &index, top_k))
    }
}
