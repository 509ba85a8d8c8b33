use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use docsift_core::{
    coalesce_by_location, parse_feed, read_feed, BuildSummary, Field, Highlight, QueryEngine, QueryState, SearchConfig,
    SearchError, Span,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Deserialize)]
pub struct ReloadParams {
    #[serde(default)]
    pub coalesce: bool,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub state: QueryState,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: u32,
    pub score: f32,
    pub location: String,
    pub title: String,
    pub category: String,
    pub matched_terms: Vec<String>,
    pub highlights: Vec<Highlight>,
    pub snippet: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub admin_token: Option<String>,
}

type ApiError = (StatusCode, String);

/// Create an engine, building the initial index from `feed` when given.
pub fn load_engine(config: SearchConfig, feed: Option<&str>, coalesce: bool) -> anyhow::Result<Arc<QueryEngine>> {
    let engine = Arc::new(QueryEngine::new(config));
    if let Some(path) = feed {
        let mut records = read_feed(path)?;
        if coalesce {
            records = coalesce_by_location(records);
        }
        let summary = engine.rebuild(&records)?;
        tracing::info!(feed = path, num_docs = summary.num_docs, "initial index ready");
    }
    Ok(engine)
}

/// Router with admin token and CORS origins taken from the environment.
pub fn build_app(engine: Arc<QueryEngine>) -> Router {
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };
    router(AppState { engine, admin_token }).layer(cors)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let k = params.k.clamp(1, 100);
    let results = state.engine.query(&params.q, Some(k)).map_err(error_response)?;

    let hits = results
        .hits
        .into_iter()
        .map(|hit| {
            let body_spans = hit
                .highlights
                .iter()
                .find(|h| h.field == Field::Body)
                .map_or(&[][..], |h| h.spans.as_slice());
            let snippet = snippet(&hit.document.body, body_spans);
            SearchHit {
                doc_id: hit.document.id,
                score: hit.score,
                location: hit.document.location.clone(),
                title: hit.document.title.clone(),
                category: hit.document.category.to_string(),
                matched_terms: hit.matched_terms,
                highlights: hit.highlights,
                snippet,
            }
        })
        .collect();

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        state: results.state,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits: results.total_hits,
        results: hits,
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<u32>) -> Result<Json<serde_json::Value>, ApiError> {
    let index = state.engine.snapshot().map_err(error_response)?;
    match index.document(doc_id) {
        Some(doc) => Ok(Json(serde_json::json!({
            "doc_id": doc.id,
            "location": doc.location,
            "page": doc.page,
            "title": doc.title,
            "category": doc.category,
            "text": doc.body,
        }))),
        None => Err((StatusCode::NOT_FOUND, format!("no document {doc_id}"))),
    }
}

/// Replace the whole corpus with the feed in the request body.
async fn reload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ReloadParams>,
    body: String,
) -> Result<Json<BuildSummary>, ApiError> {
    authorize(&state, &headers)?;
    let mut records = parse_feed(&body).map_err(error_response)?;
    if params.coalesce {
        records = coalesce_by_location(records);
    }
    let engine = Arc::clone(&state.engine);
    let summary = tokio::task::spawn_blocking(move || engine.rebuild(&records))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("build task failed: {e}")))?
        .map_err(error_response)?;
    Ok(Json(summary))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

fn error_response(err: SearchError) -> ApiError {
    let status = match &err {
        SearchError::EmptyIndex => StatusCode::SERVICE_UNAVAILABLE,
        SearchError::Cancelled => StatusCode::CONFLICT,
        SearchError::InvalidDocument(_) | SearchError::Feed(_) | SearchError::Json(_) => StatusCode::BAD_REQUEST,
        SearchError::Config(_) | SearchError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(error = %err, %status, "request failed");
    (status, err.to_string())
}

const SNIPPET_BEFORE: usize = 80;
const SNIPPET_LEN: usize = 240;

/// Excerpt of `text` around the first highlighted span, with every span in
/// the excerpt wrapped in `<em>`.
pub fn snippet(text: &str, spans: &[Span]) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let Some(first) = spans.first() else {
        return Some(text.chars().take(SNIPPET_LEN).collect());
    };
    let start = floor_boundary(text, first.start.saturating_sub(SNIPPET_BEFORE));
    let end = ceil_boundary(text, (start + SNIPPET_LEN).max(first.end));

    let mut out = String::with_capacity(end - start + 16);
    let mut cursor = start;
    for span in spans.iter().filter(|s| s.start >= start && s.end <= end) {
        out.push_str(&text[cursor..span.start]);
        out.push_str("<em>");
        out.push_str(&text[span.start..span.end]);
        out.push_str("</em>");
        cursor = span.end;
    }
    out.push_str(&text[cursor..end]);
    Some(out)
}

fn floor_boundary(text: &str, mut i: usize) -> usize {
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(text: &str, mut i: usize) -> usize {
    if i >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}
