//! Demo web form in front of a loaded [`SentimentClassifier`].
//!
//! A single text box posts to `/` and the prediction is rendered back as
//! `LABEL (score)`. The same inference is exposed as JSON on `/api/predict`.
//! Requests are answered one at a time.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;

use crate::classifier::SentimentClassifier;
use crate::error::{Result, SentimentError};
use crate::sentiment::Prediction;

pub const DEFAULT_ADDR: &str = "127.0.0.1:7860";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 7860)),
            title: "Movie review sentiment".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    classifier: Arc<SentimentClassifier>,
    /// Single permit: inference requests are processed sequentially
    permit: Arc<Semaphore>,
    title: Arc<str>,
}

impl AppState {
    pub fn new(classifier: Arc<SentimentClassifier>, title: &str) -> Self {
        Self {
            classifier,
            permit: Arc::new(Semaphore::new(1)),
            title: Arc::from(title),
        }
    }

    async fn predict(&self, text: String) -> Result<Prediction, ApiError> {
        let _permit = self
            .permit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ApiError::Unavailable)?;

        let classifier = Arc::clone(&self.classifier);
        tokio::task::spawn_blocking(move || classifier.predict(&text))
            .await
            .map_err(|e| ApiError::Inference(SentimentError::ServerError(e.to_string())))?
            .map_err(ApiError::Inference)
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    encoder: String,
}

#[derive(Debug)]
pub enum ApiError {
    Inference(SentimentError),
    Unavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Inference(err) => {
                log::error!("Inference failed: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down".to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(form_handler).post(submit_handler))
        .route("/api/predict", post(api_predict_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn form_handler(State(state): State<AppState>) -> Html<String> {
    Html(render_page(&state.title, "", None))
}

async fn submit_handler(
    State(state): State<AppState>,
    Form(request): Form<PredictRequest>,
) -> Result<Html<String>, ApiError> {
    let text = request.text;
    let prediction = state.predict(text.clone()).await?;
    log::debug!("Form prediction: {} ({:.4})", prediction.label, prediction.score);
    Ok(Html(render_page(&state.title, &text, Some(&prediction))))
}

async fn api_predict_handler(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<Prediction>, ApiError> {
    Ok(Json(state.predict(request.text).await?))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        encoder: state.classifier.encoder().name().to_string(),
    })
}

fn render_page(title: &str, text: &str, prediction: Option<&Prediction>) -> String {
    let output = prediction
        .map(|p| format!("{} ({:.4})", p.label, p.score))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<h1>{title}</h1>
<form method="post" action="/">
<textarea name="text" rows="4" cols="60">{text}</textarea>
<br><button type="submit">Submit</button>
</form>
<output id="prediction">{output}</output>
</body>
</html>
"#,
        title = escape_html(title),
        text = escape_html(text),
        output = escape_html(&output),
    )
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Entry point for starting the demo.
pub struct DemoServer;

impl DemoServer {
    /// Binds `config.addr` and serves the demo in a background task.
    ///
    /// Port 0 picks a free port; the bound address is on the handle.
    pub async fn launch(classifier: Arc<SentimentClassifier>, config: ServerConfig) -> Result<DemoHandle> {
        let listener = tokio::net::TcpListener::bind(config.addr)
            .await
            .map_err(|e| SentimentError::ServerError(format!("Failed to bind {}: {}", config.addr, e)))?;
        let local_addr = listener.local_addr()?;

        let app = build_router(AppState::new(classifier, &config.title));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        log::info!("Demo server listening on http://{}", local_addr);
        Ok(DemoHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// A running demo server. Dropping the handle without calling
/// [`DemoHandle::close`] also stops the server once in-flight requests finish.
pub struct DemoHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl DemoHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Stops accepting connections and waits for the server task to finish.
    pub async fn close(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let served = (&mut self.task)
            .await
            .map_err(|e| SentimentError::ServerError(e.to_string()))?;
        served.map_err(|e| SentimentError::ServerError(e.to_string()))?;
        log::info!("Demo server on {} closed", self.local_addr);
        Ok(())
    }
}
