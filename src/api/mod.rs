//! HTTP API Handlers and Routes
//!
//! # API Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /api/research` - Start a run; returns `completed`, `interrupted` or `ended`
//! - `POST /api/research/stream` - Start a run and stream its events (SSE)
//! - `POST /api/research/{thread_id}/feedback` - Answer a plan review (`[ACCEPTED]` / `[EDIT_PLAN] ...`)
//! - `POST /api/research/{thread_id}/feedback/stream` - Answer a plan review and stream the rest of the run
//! - `GET /api/research/{thread_id}` - Inspect a stored run
//! - `DELETE /api/research/{thread_id}` - Discard a run

/// Request handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
