pub mod core;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::core::config::{AppConfig, ConfigError};
use crate::core::feed::fetcher::{build_client, FetchError};
use crate::core::feed::reader::HttpFeedReader;
use crate::core::query::render::{render_html, render_text, NewsItem, RenderFormat};
use crate::core::query::QueryService;
use crate::core::storage::{EntryStore, StorageError};
use crate::core::sync::{FetchCycle, Scheduler};

#[derive(Clone)]
struct SharedState {
    query: QueryService,
}

#[derive(Debug, Clone, Deserialize)]
struct NewsParams {
    #[serde(default)]
    format: RenderFormat,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Errors surfaced to HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Storage(error) => {
                tracing::error!(%error, "failed to read entries");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    None,
                )
            }
        };
        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

/// Anything that stops the process from coming up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("http client error: {0}")]
    Client(#[from] FetchError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn router(query: QueryService) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/api/news/{count}", get(latest_news))
        .with_state(SharedState { query })
}

async fn welcome() -> &'static str {
    "Welcome to the news aggregator!"
}

async fn latest_news(
    State(state): State<SharedState>,
    Path(count): Path<i64>,
    Query(params): Query<NewsParams>,
) -> Result<Response, AppError> {
    let entries = state.query.latest(count).await?;
    let response = match params.format {
        RenderFormat::Html => Html(render_html(&entries)).into_response(),
        RenderFormat::Text => render_text(&entries).into_response(),
        RenderFormat::Json => {
            let items: Vec<NewsItem> = entries.into_iter().map(NewsItem::from).collect();
            Json(items).into_response()
        }
    };
    Ok(response)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Loads configuration, starts the scheduler and serves the read endpoint
/// until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    init_tracing();

    let config = AppConfig::load()?;
    let store = EntryStore::connect(&config.database_url, config.db_max_connections).await?;
    tracing::info!(
        database = %config.database_url,
        entries = store.count().await?,
        "store ready"
    );

    let reader = Arc::new(HttpFeedReader::new(build_client(config.fetch_timeout)?));
    let cycle = FetchCycle::new(reader, store.clone(), config.date_fallback);
    let scheduler = Scheduler::new(
        config.feeds.feeds.clone(),
        config.feeds.refresh_interval(),
        cycle,
    )
    .skip_in_flight(config.skip_in_flight)
    .spawn();

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, router(QueryService::new(store)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
