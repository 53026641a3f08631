use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use crew_core::Launcher;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api::{ErrorResponse, RunRequest, RunResponse};

/// Shown to the user whenever the pipeline process exits non-zero.
pub const AGENT_FAILURE: &str = "The agent encountered an error.";

const INDEX_HTML: &str = include_str!("../assets/index.html");
const LOADING_HTML: &str = include_str!("../assets/loading.html");

#[derive(Clone)]
pub struct AppState {
    pub launcher: Arc<dyn Launcher>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/loading-fragment", get(loading_fragment))
        .route("/health", get(health_check))
        .route("/run-grant-writer", post(run_grant_writer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- HANDLERS ---

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn loading_fragment() -> Html<&'static str> {
    Html(LOADING_HTML)
}

async fn health_check() -> &'static str {
    "Grant Writer Gateway: Operational"
}

/// One request, one pipeline process. Blocks until the child exits.
async fn run_grant_writer(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection, "unreadable run request");
            return failure(
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: rejection.body_text(),
                    details: None,
                    field: None,
                },
            );
        }
    };

    // STEP 1: VALIDATE (nothing is launched for a bad request)
    let inputs = match request.validate() {
        Ok(inputs) => inputs,
        Err(e) => {
            info!(field = e.field, "rejected run request");
            return failure(
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: e.to_string(),
                    details: None,
                    field: Some(e.field.to_string()),
                },
            );
        }
    };

    // STEP 2: LAUNCH (org type first, then mission)
    info!(org_type = %inputs.org_type, "launching grant crew");
    let launched = state
        .launcher
        .launch(&[inputs.org_type.as_str(), inputs.mission.as_str()])
        .await;

    // STEP 3: REPORT
    match launched {
        Ok(outcome) if outcome.success => {
            info!(report_len = outcome.stdout.len(), "grant crew finished");
            (
                StatusCode::OK,
                Json(RunResponse {
                    report_markdown: outcome.stdout,
                }),
            )
                .into_response()
        }
        Ok(outcome) => {
            error!(exit_code = ?outcome.exit_code, "grant crew failed");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: AGENT_FAILURE.to_string(),
                    details: Some(outcome.diagnostics().to_string()),
                    field: None,
                },
            )
        }
        Err(e) => {
            error!(error = %e, "could not run grant crew");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: e.to_string(),
                    details: None,
                    field: None,
                },
            )
        }
    }
}

fn failure(status: StatusCode, body: ErrorResponse) -> Response {
    (status, Json(body)).into_response()
}
