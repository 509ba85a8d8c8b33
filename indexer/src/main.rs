use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use docsift_core::{coalesce_by_location, query, read_feed, Field, FeedRecord, Index, IndexBuilder, SearchConfig};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "docsift-indexer")]
#[command(about = "Build and query an in-memory documentation search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Source {
    /// Feed file or directory of feed files (.json, .jsonl, .js)
    #[arg(long)]
    input: String,
    /// Merge records that share a location before indexing
    #[arg(long, default_value_t = false)]
    coalesce: bool,
    /// JSON file overriding tokenizer, ranking and query settings
    #[arg(long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index and print a summary
    Build {
        #[command(flatten)]
        source: Source,
    },
    /// Build the index and run a single query against it
    Query {
        #[command(flatten)]
        source: Source,
        /// Query text; a trailing space marks the last word as complete
        #[arg(long)]
        q: String,
        /// Maximum number of hits
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
}

#[derive(Debug, Serialize)]
struct BuildReport {
    num_docs: usize,
    num_terms: usize,
    avg_title_len: f32,
    avg_body_len: f32,
    took_s: f64,
    created_at: String,
    version: u32,
}

#[derive(Serialize)]
struct HitReport<'a> {
    location: &'a str,
    title: &'a str,
    category: &'a str,
    score: f32,
    matched_terms: &'a [String],
    highlights: &'a [docsift_core::Highlight],
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { source } => {
            let (index, took_s) = build_index(&source)?;
            let report = report(&index, took_s);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Query { source, q, k } => {
            let (index, _) = build_index(&source)?;
            let results = query(&q, &index, Some(k));
            tracing::info!(state = ?results.state, total_hits = results.total_hits, "query done");
            let hits: Vec<HitReport<'_>> = results
                .hits
                .iter()
                .map(|h| HitReport {
                    location: &h.document.location,
                    title: &h.document.title,
                    category: h.document.category.as_str(),
                    score: h.score,
                    matched_terms: &h.matched_terms,
                    highlights: &h.highlights,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
    }
    Ok(())
}

fn build_index(source: &Source) -> Result<(Index, f64)> {
    let config = match &source.config {
        Some(path) => SearchConfig::from_json_file(path).with_context(|| format!("loading config {path}"))?,
        None => SearchConfig::default(),
    };
    let mut records = load_records(Path::new(&source.input))?;
    let loaded = records.len();
    if source.coalesce {
        records = coalesce_by_location(records);
    }
    tracing::info!(loaded, indexed = records.len(), input = %source.input, "feed loaded");

    let start = Instant::now();
    let index = IndexBuilder::new(config).build(&records).context("building index")?;
    Ok((index, start.elapsed().as_secs_f64()))
}

fn load_records(input_path: &Path) -> Result<Vec<FeedRecord>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl" | "js") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        bail!("input {} does not exist", input_path.display());
    }

    let mut records = Vec::new();
    for file in files {
        let batch = read_feed(&file).with_context(|| format!("reading feed {}", file.display()))?;
        tracing::debug!(file = %file.display(), records = batch.len(), "read feed file");
        records.extend(batch);
    }
    Ok(records)
}

fn report(index: &Index, took_s: f64) -> BuildReport {
    BuildReport {
        num_docs: index.num_docs(),
        num_terms: index.num_terms(),
        avg_title_len: index.stats().avg_len(Field::Title),
        avg_body_len: index.stats().avg_len(Field::Body),
        took_s,
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_default(),
        version: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_every_feed_file_in_a_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"[{"location":"/a","title":"Viterbi","category":"function"}]"#).unwrap();
        fs::write(dir.path().join("b.jsonl"), "{\"location\":\"/b\",\"title\":\"Forward\",\"category\":\"function\"}\n").unwrap();
        fs::write(dir.path().join("c.js"), r#"var documenterSearchIndex = {"docs": [{"location":"/c","title":"Tutorial","category":"page"}]};"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let records = load_records(dir.path()).unwrap();
        let locations: Vec<&str> = records.iter().map(|r| r.location.as_str()).collect();
        assert_eq!(locations, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn coalesce_flag_merges_paragraph_records() {
        let dir = tempdir().unwrap();
        let feed = dir.path().join("search_index.js");
        fs::write(
            &feed,
            r#"var documenterSearchIndex = {"docs": [
                {"location":"tutorial/","page":"Tutorial","title":"Tutorial","text":"first","category":"page"},
                {"location":"tutorial/","page":"Tutorial","title":"Tutorial","text":"second","category":"page"}]}"#,
        )
        .unwrap();
        let source = Source { input: feed.to_string_lossy().to_string(), coalesce: false, config: None };
        assert!(build_index(&source).is_err());

        let source = Source { coalesce: true, ..source };
        let (index, _) = build_index(&source).unwrap();
        assert_eq!(report(&index, 0.0).num_docs, 1);
    }

    #[test]
    fn missing_input_is_an_error() {
        assert!(load_records(Path::new("/definitely/not/here.json")).is_err());
    }
}
