//! HTTP Server for the lead normalization API.
//!
//! # API Endpoints
//!
//! | Method | Path                     | Description                       |
//! |--------|--------------------------|-----------------------------------|
//! | GET    | `/health`                | Health check                      |
//! | POST   | `/api/normalize`         | Upload CSV for normalization      |
//! | POST   | `/api/normalize/records` | Normalize a JSON array of records |
//! | GET    | `/api/mappings`          | Active mapping set                |
//! | PUT    | `/api/mappings`          | Replace the active mapping set    |
//! | GET    | `/api/logs`              | SSE stream for real-time logs     |
//!
//! Both normalize endpoints accept `?geo=true`.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, IMPORT_LOG};
use super::types::{error_response, NormalizeResponse};
use crate::config::{DEFAULT_MAX_REPORTED_ERRORS, MAX_UPLOAD_SIZE};
use crate::error::{PipelineError, ServerResult};
use crate::transform::mapping::MappingSet;
use crate::transform::pipeline::{
    normalize_bytes, normalize_records, records_from_json, NormalizationReport, PipelineOptions,
};
use crate::transform::shared::SharedMappings;

type ApiError = (StatusCode, Json<Value>);

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub mappings: Arc<SharedMappings>,
    pub max_reported_errors: usize,
}

impl AppState {
    pub fn new(mappings: Arc<SharedMappings>) -> Self {
        Self {
            mappings,
            max_reported_errors: DEFAULT_MAX_REPORTED_ERRORS,
        }
    }

    fn options(&self, query: &NormalizeQuery) -> PipelineOptions {
        let mut options = PipelineOptions::with_mapping(self.mappings.current()).geo(query.geo);
        options.max_reported_errors = self.max_reported_errors;
        options
    }
}

/// Query parameters of the normalize endpoints
#[derive(Debug, Default, Deserialize)]
pub struct NormalizeQuery {
    #[serde(default)]
    pub geo: bool,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/normalize", post(normalize_upload))
        .route("/api/normalize/records", post(normalize_json))
        .route("/api/mappings", get(get_mappings).put(put_mappings))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, state: AppState) -> ServerResult<()> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Leadnorm server running on http://localhost:{}", port);
    println!("   POST /api/normalize         - Upload CSV file");
    println!("   POST /api/normalize/records - Normalize JSON records");
    println!("   GET  /api/mappings          - Active mapping set");
    println!("   GET  /api/logs              - SSE log stream");
    println!("   GET  /health                - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "leadnorm",
        "version": env!("CARGO_PKG_VERSION"),
        "mappingSet": state.mappings.current().name(),
        "endpoints": {
            "normalize": "POST /api/normalize",
            "records": "POST /api/normalize/records",
            "mappings": "GET|PUT /api/mappings",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = IMPORT_LOG.subscribe();

    // Lagged receivers drop the missed entries
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload CSV endpoint
async fn normalize_upload(
    State(state): State<AppState>,
    Query(query): Query<NormalizeQuery>,
    mut multipart: Multipart,
) -> Result<Json<NormalizeResponse>, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| bad_request(&format!("Read error: {}", e)))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| bad_request("No file provided"))?;

    log_info(format!(
        "📄 New upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let options = state.options(&query);
    let report = run_blocking(move || normalize_bytes(&bytes, &options)).await?;
    Ok(Json(NormalizeResponse::from(report)))
}

/// JSON records endpoint
async fn normalize_json(
    State(state): State<AppState>,
    Query(query): Query<NormalizeQuery>,
    Json(body): Json<Value>,
) -> Result<Json<NormalizeResponse>, ApiError> {
    let options = state.options(&query);
    let report = run_blocking(move || {
        let records = records_from_json(&body)?;
        normalize_records(&records, &options)
    })
    .await?;
    Ok(Json(NormalizeResponse::from(report)))
}

/// Active mapping set, in configuration form
async fn get_mappings(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let current = state.mappings.current();
    serde_json::to_value(current.as_ref())
        .map(Json)
        .map_err(|e| internal_error(&e.to_string()))
}

/// Replace the active mapping set
async fn put_mappings(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let set = MappingSet::from_value(&body).map_err(|e| bad_request(&e.to_string()))?;
    let name = set.name().to_string();
    let fields = set.len();
    let previous = state.mappings.replace(set);

    log_info(format!(
        "🔁 Mapping set \"{}\" replaced by \"{}\" ({} fields)",
        previous.name(),
        name,
        fields
    ));

    Ok(Json(json!({
        "status": "ok",
        "mappingSet": name,
        "fields": fields,
        "previous": previous.name()
    })))
}

/// Run a pipeline call off the async runtime and map its errors.
async fn run_blocking<F>(job: F) -> Result<NormalizationReport, ApiError>
where
    F: FnOnce() -> Result<NormalizationReport, PipelineError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| internal_error(&format!("Worker failed: {}", e)))?
        .map_err(pipeline_error)
}

fn pipeline_error(error: PipelineError) -> ApiError {
    eprintln!("❌ Normalize error: {}", error);
    let status = match error {
        PipelineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(error_response(&error.to_string())))
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(error_response(message)))
}

fn internal_error(message: &str) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response(message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(Arc::new(SharedMappings::default()))
    }

    #[tokio::test]
    async fn test_health_reports_mapping_set() {
        let Json(body) = health(State(state())).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["mappingSet"], "leads");
    }

    #[tokio::test]
    async fn test_normalize_json_records() {
        let body = json!([
            { "Nome Completo": "Ana", "Celular": "1199", "Latitude": "-23.5" },
            { "Celular": "2199" }
        ]);
        let query = NormalizeQuery { geo: true };

        let Json(response) = normalize_json(State(state()), Query(query), Json(body))
            .await
            .unwrap();

        assert_eq!(response.status, "warning");
        assert_eq!(response.records[0]["nome"], "Ana");
        assert_eq!(response.records[0]["lat"], json!(-23.5));
        assert_eq!(response.metadata.validation.invalid, 1);
        assert!(response.metadata.csv_info.is_none());
    }

    #[tokio::test]
    async fn test_normalize_json_rejects_scalars() {
        let result = normalize_json(
            State(state()),
            Query(NormalizeQuery::default()),
            Json(json!(42)),
        )
        .await;

        let (status, Json(body)) = result.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_replace_mappings() {
        let state = state();
        let config = json!({
            "name": "form",
            "mappings": [{ "targetField": "nome", "legacyAliases": ["your-name"] }]
        });

        let Json(body) = put_mappings(State(state.clone()), Json(config)).await.unwrap();
        assert_eq!(body["previous"], "leads");
        assert_eq!(state.mappings.current().name(), "form");

        let Json(current) = get_mappings(State(state.clone())).await.unwrap();
        assert_eq!(current["mappings"][0]["legacyAliases"][0], "your-name");

        let bad = json!({ "mappings": [{ "targetField": "" }] });
        let (status, _) = put_mappings(State(state), Json(bad)).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
