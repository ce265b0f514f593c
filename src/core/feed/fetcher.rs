use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
}

/// Client shared by every fetch; `timeout` bounds each whole request.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Single GET with no retry. A failed fetch waits for the next tick.
pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> Result<FetchedFeed, FetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    let body = response.bytes().await?.to_vec();

    Ok(FetchedFeed { body, content_type })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::Response;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct AppState {
        request_count: Arc<AtomicUsize>,
    }

    async fn feed_handler(State(state): State<AppState>) -> Response {
        state.request_count.fetch_add(1, Ordering::SeqCst);
        let mut response = Response::new(axum::body::Body::from(
            include_str!("../../../fixtures/sample.rss.xml").to_string(),
        ));
        response.headers_mut().insert(
            CONTENT_TYPE,
            "application/rss+xml".parse().expect("header must parse"),
        );
        response
    }

    async fn failing_handler(State(state): State<AppState>) -> Response {
        state.request_count.fetch_add(1, Ordering::SeqCst);
        let mut response = Response::new(axum::body::Body::from("temporary failure"));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    }

    async fn slow_handler() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "too late"
    }

    async fn spawn_test_server() -> (String, Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
        let request_count = Arc::new(AtomicUsize::new(0));
        let state = AppState {
            request_count: Arc::clone(&request_count),
        };
        let app = Router::new()
            .route("/feed.xml", get(feed_handler))
            .route("/broken.xml", get(failing_handler))
            .route("/slow.xml", get(slow_handler))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        let join_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server should run");
        });
        (format!("http://{address}"), request_count, join_handle)
    }

    #[tokio::test]
    async fn fetch_feed_returns_body_and_content_type() {
        let (base, _, server_task) = spawn_test_server().await;
        let client = build_client(Duration::from_secs(5)).expect("client should build");

        let fetched = fetch_feed(&client, &format!("{base}/feed.xml"))
            .await
            .expect("fetch should succeed");

        assert!(fetched.body.starts_with(b"<?xml"));
        assert_eq!(fetched.content_type.as_deref(), Some("application/rss+xml"));

        server_task.abort();
    }

    #[tokio::test]
    async fn server_error_fails_without_retrying() {
        let (base, request_count, server_task) = spawn_test_server().await;
        let client = build_client(Duration::from_secs(5)).expect("client should build");

        let error = fetch_feed(&client, &format!("{base}/broken.xml"))
            .await
            .expect_err("500 must be an error");

        assert!(matches!(error, FetchError::HttpStatus(500)));
        assert_eq!(request_count.load(Ordering::SeqCst), 1);

        server_task.abort();
    }

    #[tokio::test]
    async fn hung_feed_is_cut_off_by_timeout() {
        let (base, _, server_task) = spawn_test_server().await;
        let client = build_client(Duration::from_millis(200)).expect("client should build");

        let error = fetch_feed(&client, &format!("{base}/slow.xml"))
            .await
            .expect_err("slow feed must time out");

        match error {
            FetchError::Request(inner) => assert!(inner.is_timeout()),
            other => panic!("expected a timeout, got {other:?}"),
        }

        server_task.abort();
    }
}
