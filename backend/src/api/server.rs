//! HTTP server for matchrecon.
//!
//! Reconciles a record set and a document posted by the client; fetching
//! from the API and the database stays with the CLI.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | GET    | `/api/mappings`   | Active mapping configuration         |
//! | POST   | `/api/reconcile`  | Reconcile posted records + document  |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, log_warning, LOG_BROADCASTER};
use super::types::{error_response, ReconcileRequest, ReconcileResponse};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::mapping::MappingConfig;
use crate::models::FlatRecordSet;
use crate::reconcile::engine;

type AppState = Arc<MappingConfig>;

/// Build the router with its state.
pub fn router(mappings: MappingConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/mappings", get(get_mappings))
        .route("/api/reconcile", post(reconcile))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(Arc::new(mappings))
}

/// Start the HTTP server
pub async fn start_server(port: u16, mappings: MappingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(mappings);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 matchrecon server running on http://localhost:{}", port);
    println!("   POST /api/reconcile - Reconcile records against a document");
    println!("   GET  /api/mappings  - Active mapping tables");
    println!("   GET  /api/logs      - SSE log stream");
    println!("   GET  /health        - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "matchrecon",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "reconcile": "POST /api/reconcile",
            "mappings": "GET /api/mappings",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn get_mappings(State(mappings): State<AppState>) -> Json<MappingConfig> {
    Json(mappings.as_ref().clone())
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Reconcile endpoint
async fn reconcile(
    State(mappings): State<AppState>,
    Json(request): Json<ReconcileRequest>,
) -> Result<Json<ReconcileResponse>, (StatusCode, Json<Value>)> {
    let label = request
        .match_id
        .map(|id| format!("match {}", id))
        .unwrap_or_else(|| "posted match".to_string());
    log_info(format!("Reconciling {} ({} records)", label, request.records.len()));

    let response = run_request(request, &mappings).map_err(|e| {
        log_error(format!("{}: {}", label, e));
        (status_of(&e), Json(error_response(&e.to_string())))
    })?;

    if response.summary.pairing_failures > 0 || response.summary.mismatched > 0 {
        log_warning(format!("{}: {}", label, response.summary));
    }
    Ok(Json(response))
}

/// Validate a request and run the engine on it.
pub fn run_request(request: ReconcileRequest, default_mappings: &MappingConfig) -> ServerResult<ReconcileResponse> {
    let custom;
    let mappings = match request.mappings {
        Some(value) => {
            custom = MappingConfig::from_value(value)
                .map_err(|e| ServerError::BadRequest(e.to_string()))?;
            &custom
        }
        None => default_mappings,
    };

    let flat = FlatRecordSet::from_values(request.match_id.unwrap_or_default(), request.records)
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    if !request.document.is_object() {
        return Err(ServerError::BadRequest("document must be a JSON object".to_string()));
    }

    let report = engine::reconcile(&flat, &request.document, mappings).map_err(PipelineError::from)?;
    Ok(ReconcileResponse::new(request.match_id, report))
}

fn status_of(error: &ServerError) -> StatusCode {
    match error {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Reconcile(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
