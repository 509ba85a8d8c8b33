use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use docsift_core::SearchConfig;
use server::{build_app, load_engine};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Feed to index at startup; without it the server waits for /index/reload
    #[arg(long)]
    feed: Option<String>,
    /// Merge records that share a location before indexing
    #[arg(long, default_value_t = false)]
    coalesce: bool,
    /// JSON file overriding tokenizer, ranking and query settings
    #[arg(long)]
    config: Option<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SearchConfig::from_json_file(path).with_context(|| format!("loading config {path}"))?,
        None => SearchConfig::default(),
    };
    let engine = load_engine(config, args.feed.as_deref(), args.coalesce)?;
    let app: Router = build_app(engine);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
