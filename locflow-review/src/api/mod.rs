//! HTTP API handlers for locflow-review
//!
//! REST operator surface over workflow runs, plus SSE event streaming.

pub mod health;
pub mod runs;
pub mod sse;

pub use health::health_routes;
pub use runs::run_routes;
pub use sse::event_stream;
