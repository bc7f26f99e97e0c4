//! HTTP runtime for the agent entry point.
//!
//! `POST /invocations` runs the agent, `GET /ping` answers health checks and
//! `POST /search` runs the search tool without the agent.

use crate::agent::{Entrypoint, InvocationAgent};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::retrieval::SearchPipeline;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, instrument};

/// Shared application state.
pub struct AppState<A> {
    entrypoint: Entrypoint<A>,
    pipeline: Arc<SearchPipeline>,
}

impl<A: InvocationAgent> AppState<A> {
    pub fn new(entrypoint: Entrypoint<A>, pipeline: Arc<SearchPipeline>) -> Self {
        Self {
            entrypoint,
            pipeline,
        }
    }
}

/// Build the router over the given state.
pub fn router<A: InvocationAgent + 'static>(state: Arc<AppState<A>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ping", get(ping))
        .route("/invocations", post(invocations::<A>))
        .route("/search", post(search::<A>))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP runtime.
pub async fn run_serve(host: Option<&str>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let host = host.unwrap_or(&settings.server.host).to_string();
    let port = port.unwrap_or(settings.server.port);

    let orchestrator = Orchestrator::new(settings)?;
    let state = Arc::new(AppState::new(
        orchestrator.entrypoint()?,
        orchestrator.pipeline(),
    ));
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Vidseek Runtime");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /ping");
    Output::kv("Invoke", "POST /invocations");
    Output::kv("Search", "POST /search");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
}

async fn ping() -> impl IntoResponse {
    Json(json!({ "status": "Healthy" }))
}

#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
async fn invocations<A: InvocationAgent>(
    State(state): State<Arc<AppState<A>>>,
    body: Bytes,
) -> impl IntoResponse {
    // A body that is not JSON is treated like one without a prompt.
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let invocation = state.entrypoint.invoke(&payload).await;
    info!("Invocation finished with status {}", invocation.status);

    let status = StatusCode::from_u16(invocation.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(invocation.body))
}

#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
async fn search<A: InvocationAgent>(
    State(state): State<Arc<AppState<A>>>,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    Json(state.pipeline.run_tool(&req.query).await.to_value())
}
