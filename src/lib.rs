//! Mathpad library - the notebook core and its web server.
//!
//! - `models`: lines, annotations, and reasoning-service wire types
//! - `document`: the Line Store
//! - `sections`: section bounds and context extraction
//! - `prompt`: prompt assembly for checks and hints
//! - `reasoning`: the hosted-model client and reply decoding
//! - `controller`: owns a notebook and reconciles replies onto lines
//! - `snapshot`: persisted format, import validation, snapshot stores
//! - `handlers` / `templates`: the HTTP surface

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod handlers;
pub mod latex;
pub mod models;
pub mod prompt;
pub mod reasoning;
pub mod samples;
pub mod sections;
pub mod snapshot;
pub mod templates;
pub mod url_validator;

use config::Config;
use controller::NotebookController;
use snapshot::SledSnapshotStore;

// ============================================================================
// Application State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub notebook: Arc<Mutex<NotebookController>>,
    pub reasoning: Arc<dyn ReasoningService>,
}

impl AppState {
    /// Open the snapshot database, restore the notebook, and build the
    /// reasoning client from `config`.
    pub fn new(config: Config) -> error::Result<Self> {
        let db = sled::open(&config.db_path)?;
        let store = Arc::new(SledSnapshotStore::open(&db)?);
        let controller = NotebookController::restore(store, config.demo_mode);
        let reasoning = Arc::new(AnthropicReasoningClient::from_config(&config));
        Ok(Self::with_parts(config, controller, reasoning))
    }

    pub fn with_parts(
        config: Config,
        controller: NotebookController,
        reasoning: Arc<dyn ReasoningService>,
    ) -> Self {
        Self {
            config,
            notebook: Arc::new(Mutex::new(controller)),
            reasoning,
        }
    }

    /// Lock the notebook. Never held across an await.
    pub fn lock_notebook(&self) -> MutexGuard<'_, NotebookController> {
        self.notebook.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// All routes, with request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        // Stateless reasoning routes
        .route("/api/check-reasoning", post(handlers::check_reasoning))
        .route("/api/hint", post(handlers::hint))
        // Notebook routes
        .route(
            "/api/notebook",
            get(handlers::get_notebook)
                .put(handlers::put_notebook)
                .delete(handlers::reset_notebook),
        )
        .route("/api/notebook/edit", post(handlers::edit_notebook))
        .route("/api/notebook/latex", get(handlers::export_latex))
        .route("/api/notebook/template/{name}", post(handlers::load_template))
        .route("/api/notebook/lines/{index}/check", post(handlers::check_line))
        .route("/api/notebook/lines/{index}/hint", post(handlers::hint_line))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Re-export commonly used types
pub use controller::{PendingCheck, PendingHint};
pub use document::Document;
pub use error::{NotebookError, Result};
pub use models::{
    CheckOutcome, CheckRequest, CheckState, ExtractedContext, Feedback, FeedbackMap,
    FeedbackStatus, HintMap, HintOutcome, HintRequest, Line, LineDraft, LineEdit, LineId,
    LineKind, ProblemLine, StepIssue, WorkLine,
};
pub use prompt::{PromptMode, ReasoningPrompt};
pub use reasoning::{AnthropicReasoningClient, ReasoningService};
pub use sections::{bounds_containing, extract};
pub use snapshot::{MemorySnapshotStore, NotebookFile, SnapshotStore};
