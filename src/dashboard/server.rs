//! HTTP server implementation for the web dashboard.
//!
//! This module provides the axum-based HTTP server that serves the dashboard
//! shell, static assets, the raw task store and the derived schedule views.

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    middleware::from_fn_with_state,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::auth::{BasicAuth, require_basic_auth};
use super::templates;
use crate::config::Config;
use crate::error::{ApiError, ErrorCode};
use crate::export::{export_filename, export_rows};
use crate::schedule::ScheduleModel;
use crate::schedule::stats::{Stats, compute_statistics};
use crate::schedule::years::{Bucket, YearFilter};
use crate::store::{SharedStore, build_model};
use crate::types::{Link, Task, TaskStatus};

/// Project name reported by the health check.
pub const PROJECT_NAME: &str = "Westmere Factory Development";

/// Dashboard server state shared across handlers.
#[derive(Clone)]
pub struct DashboardServer {
    store: Arc<SharedStore>,
    config: Arc<Config>,
}

impl DashboardServer {
    /// Create a new dashboard server instance.
    pub fn new(store: Arc<SharedStore>, config: Arc<Config>) -> Self {
        Self { store, config }
    }

    /// Get the task store.
    pub fn store(&self) -> &Arc<SharedStore> {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the model for `filter` from the current store snapshot.
    fn model_for(&self, filter: YearFilter) -> Result<ScheduleModel, Response> {
        let snapshot = self.store.snapshot();
        let file = snapshot.task_file().map_err(|e| {
            error!("Error loading tasks: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, ApiError::from(e))
        })?;
        build_model(file, filter, self.config.schedule.validation_policy()).map_err(|e| {
            warn!(error = %e, "Task store is not a valid schedule");
            api_error(StatusCode::UNPROCESSABLE_ENTITY, ApiError::from(&e))
        })
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    project: &'static str,
    version: &'static str,
}

/// `?year=` query accepted by the derived views.
#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    year: Option<String>,
}

impl ViewQuery {
    fn filter(&self) -> Result<YearFilter, Response> {
        match self.year.as_deref() {
            None => Ok(YearFilter::All),
            Some(raw) => raw.parse().map_err(|msg: String| {
                api_error(
                    StatusCode::BAD_REQUEST,
                    ApiError::new(ErrorCode::InvalidFieldValue, msg),
                )
            }),
        }
    }
}

/// A task with its computed fields.
#[derive(Serialize)]
struct TaskView<'a> {
    #[serde(flatten)]
    task: &'a Task,
    level: usize,
    end_date: Option<String>,
    status: TaskStatus,
    bucket: Option<&'a Bucket>,
}

/// Body of `/api/schedule`.
#[derive(Serialize)]
struct ScheduleView<'a> {
    filter: String,
    stats: Stats,
    tasks: Vec<TaskView<'a>>,
    links: &'a [Link],
}

fn api_error(status: StatusCode, err: ApiError) -> Response {
    (status, Json(err)).into_response()
}

/// Root endpoint - serves `index.html` from the static directory, or the
/// embedded shell when there is none.
async fn root(State(state): State<DashboardServer>) -> Html<String> {
    let index = state.config().server.public_dir.join("index.html");
    match tokio::fs::read_to_string(&index).await {
        Ok(html) => Html(html),
        Err(_) => Html(templates::INDEX_TEMPLATE.to_string()),
    }
}

/// The task store, verbatim.
async fn api_tasks(State(state): State<DashboardServer>) -> Response {
    let snapshot = state.store().snapshot();
    match snapshot.body() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response(),
        Err(e) => {
            error!("Error loading tasks: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to load tasks" })),
            )
                .into_response()
        }
    }
}

async fn api_stats(
    State(state): State<DashboardServer>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let filter = match query.filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match state.model_for(filter) {
        Ok(model) => Json(compute_statistics(model.each_task())).into_response(),
        Err(resp) => resp,
    }
}

/// Tasks with level, end date, status and year bucket, plus statistics.
async fn api_schedule(
    State(state): State<DashboardServer>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let filter = match query.filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let model = match state.model_for(filter) {
        Ok(model) => model,
        Err(resp) => return resp,
    };

    let buckets = &state.config().schedule.year_buckets;
    let tasks = model
        .each_task()
        .map(|task| TaskView {
            task,
            level: model.level(&task.id).unwrap_or_default(),
            end_date: task
                .end_date()
                .map(|d| d.format(crate::types::DATE_FORMAT).to_string()),
            status: task.status(),
            bucket: buckets.bucket_for(task.start_date),
        })
        .collect();

    Json(ScheduleView {
        filter: filter.to_string(),
        stats: compute_statistics(model.each_task()),
        tasks,
        links: model.links(),
    })
    .into_response()
}

/// CSV download of the hierarchical export.
async fn api_export(
    State(state): State<DashboardServer>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let filter = match query.filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let model = match state.model_for(filter) {
        Ok(model) => model,
        Err(resp) => return resp,
    };

    let report = export_rows(&model);
    if !report.errors.is_empty() {
        warn!(
            degraded_rows = report.errors.len(),
            "Export completed with degraded rows"
        );
    }
    let filename = export_filename(
        &state.config().schedule.export_slug,
        chrono::Local::now().date_naive(),
    );
    info!(rows = report.rows.len(), %filename, "Exported schedule");

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        report.to_csv(),
    )
        .into_response()
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        project: PROJECT_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the router with all routes.
pub fn build_router(state: DashboardServer) -> Router {
    let auth = Arc::new(BasicAuth::new(
        &state.config().auth,
        &state.config().server.realm,
    ));
    let static_files = ServeDir::new(&state.config().server.public_dir);

    Router::new()
        .route("/", get(root))
        .route("/api/tasks", get(api_tasks))
        .route("/api/stats", get(api_stats))
        .route("/api/schedule", get(api_schedule))
        .route("/api/export", get(api_export))
        .route("/healthz", get(health))
        .fallback_service(static_files)
        .layer(from_fn_with_state(auth, require_basic_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
///
/// Returns a oneshot sender that can be used to signal shutdown,
/// and the actual address the server is bound to.
pub async fn start_server(
    store: Arc<SharedStore>,
    config: Arc<Config>,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let state = DashboardServer::new(store, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Dashboard server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Dashboard server shutting down");
            })
            .await
        {
            error!("Dashboard server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}
