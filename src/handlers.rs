//! HTTP route handlers.
//!
//! Two groups of routes:
//!
//! - stateless forwarding (`/api/check-reasoning`, `/api/hint`): the browser
//!   sends already-extracted lines and gets the normalized reply back;
//! - notebook routes (`/api/notebook/...`): the server-side controller owns
//!   the document, applies edits, and runs checks against its own lines.

use crate::error::{NotebookError, Result};
use crate::models::{CheckOutcome, CheckRequest, CheckState, HintOutcome, HintRequest, LineEdit};
use crate::snapshot::NotebookFile;
use crate::templates::render_notebook_page;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    response::{Html, IntoResponse},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

// ============================================================================
// Page
// ============================================================================

pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_notebook_page(
        state.config.demo_mode,
        state.config.api_key.is_some(),
    ))
}

// ============================================================================
// Stateless Reasoning Routes
// ============================================================================

pub async fn check_reasoning(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckRequest>,
) -> Result<Json<CheckOutcome>> {
    tracing::info!(
        problem_lines = body.problem_lines.len(),
        user_lines = body.user_lines.len(),
        "check-reasoning request"
    );
    let outcome = state.reasoning.check_reasoning(&body).await?;
    Ok(Json(outcome))
}

pub async fn hint(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HintRequest>,
) -> Result<Json<HintOutcome>> {
    tracing::info!(
        problem_lines = body.problem_lines.len(),
        user_lines = body.user_lines.len(),
        "hint request"
    );
    let outcome = state.reasoning.get_hint(&body).await?;
    Ok(Json(outcome))
}

// ============================================================================
// Notebook Routes
// ============================================================================

pub async fn get_notebook(State(state): State<Arc<AppState>>) -> Json<NotebookFile> {
    Json(state.lock_notebook().export())
}

pub async fn put_notebook(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<NotebookFile>> {
    let mut notebook = state.lock_notebook();
    notebook.import_value(&body)?;
    Ok(Json(notebook.export()))
}

pub async fn reset_notebook(State(state): State<Arc<AppState>>) -> Json<NotebookFile> {
    let mut notebook = state.lock_notebook();
    notebook.reset();
    Json(notebook.export())
}

pub async fn edit_notebook(
    State(state): State<Arc<AppState>>,
    Json(edit): Json<LineEdit>,
) -> Result<Json<NotebookFile>> {
    let mut notebook = state.lock_notebook();
    notebook.apply_edit(edit)?;
    Ok(Json(notebook.export()))
}

pub async fn load_template(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<NotebookFile>> {
    let mut notebook = state.lock_notebook();
    notebook.load_template(&name)?;
    tracing::info!(template = %name, "loaded template");
    Ok(Json(notebook.export()))
}

pub async fn export_latex(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tex = state.lock_notebook().export_latex();
    ([(CONTENT_TYPE, "application/x-tex; charset=utf-8")], tex)
}

#[derive(Serialize)]
pub struct LineCheckResponse {
    pub state: CheckState,
    pub notebook: NotebookFile,
}

#[derive(Serialize)]
pub struct LineHintResponse {
    pub hint: Option<String>,
    pub notebook: NotebookFile,
}

/// Check the line at `index` against the server-side notebook. The lock is
/// released while the reasoning service is working.
///
/// The service call and the reply are run on their own task, so a client
/// that disconnects mid-check still leaves the line settled.
pub async fn check_line(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<LineCheckResponse>> {
    let pending = {
        let mut notebook = state.lock_notebook();
        notebook.begin_check(index)?
    };

    let task_state = state.clone();
    let check_state = tokio::spawn(async move {
        let result = task_state.reasoning.check_reasoning(&pending.request).await;
        let mut notebook = task_state.lock_notebook();
        notebook.finish_check(pending, result)
    })
    .await
    .map_err(|e| NotebookError::Upstream(format!("check task failed: {}", e)))??;

    Ok(Json(LineCheckResponse {
        state: check_state,
        notebook: state.lock_notebook().export(),
    }))
}

pub async fn hint_line(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<LineHintResponse>> {
    let pending = {
        let notebook = state.lock_notebook();
        notebook.begin_hint(index)?
    };

    let result = state.reasoning.get_hint(&pending.request).await;

    let mut notebook = state.lock_notebook();
    let hint = notebook.finish_hint(pending, result)?;
    Ok(Json(LineHintResponse {
        hint,
        notebook: notebook.export(),
    }))
}
