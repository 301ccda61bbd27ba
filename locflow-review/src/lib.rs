//! locflow-review library interface
//!
//! Multi-phase localization review engine: segments imported from a draft
//! translation pass through Cultural, Regulatory and Quality review, each
//! phase with its own approval gate, and are consolidated into one final
//! document.
//!
//! Exposes the engine and HTTP surface for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod store;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult, ReviewError, ReviewResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use locflow_common::events::EventBus;

use crate::gateway::AnalysisGateway;
use crate::workflow::WorkflowOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Analysis gateway shared by every run
    pub gateway: AnalysisGateway,
    /// Live workflow runs
    pub runs: Arc<RwLock<HashMap<Uuid, Arc<WorkflowOrchestrator>>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, gateway: AnalysisGateway) -> Self {
        Self {
            db,
            event_bus,
            gateway,
            runs: Arc::new(RwLock::new(HashMap::new())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Look up a live run
    pub async fn run(&self, run_id: Uuid) -> ApiResult<Arc<WorkflowOrchestrator>> {
        self.runs
            .read()
            .await
            .get(&run_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("Workflow run not found: {}", run_id)))
    }

    /// Write the run's current snapshot to the database
    ///
    /// Skipped once the run has been discarded. The run map stays read-locked
    /// until the row is written, so a discard cannot interleave.
    pub async fn persist(&self, run: &WorkflowOrchestrator) -> ApiResult<()> {
        let runs = self.runs.read().await;
        if !runs.contains_key(&run.run_id()) {
            tracing::debug!(run_id = %run.run_id(), "Run discarded, snapshot not persisted");
            return Ok(());
        }

        let result = self.save_snapshot(run).await;
        drop(runs);
        result
    }

    /// Write a snapshot regardless of whether the run is registered yet
    pub(crate) async fn save_snapshot(&self, run: &WorkflowOrchestrator) -> ApiResult<()> {
        let snapshot = run.snapshot().await;
        match db::runs::save_run(&self.db, &snapshot).await {
            Ok(_) => {
                *self.last_error.write().await = None;
                Ok(())
            }
            Err(e) => {
                tracing::error!(run_id = %snapshot.run_id, error = %e, "Failed to persist workflow run");
                *self.last_error.write().await =
                    Some(format!("persist run {}: {}", snapshot.run_id, e));
                Err(e.into())
            }
        }
    }

    /// Load every stored run into memory
    ///
    /// Snapshots that cannot be restored are skipped with a warning. Returns
    /// the number of runs restored.
    pub async fn restore_runs(&self) -> ApiResult<usize> {
        let snapshots = db::runs::load_all_runs(&self.db).await?;
        let mut runs = self.runs.write().await;

        for snapshot in snapshots {
            let run_id = snapshot.run_id;
            match WorkflowOrchestrator::from_snapshot(snapshot, self.gateway.clone()) {
                Ok(run) => {
                    runs.insert(run_id, Arc::new(run.with_events(self.event_bus.clone())));
                }
                Err(e) => {
                    tracing::warn!(run_id = %run_id, error = %e, "Skipping unrestorable workflow run");
                }
            }
        }

        Ok(runs.len())
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::run_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
