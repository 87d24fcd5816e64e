//! HTTP surface of the prize draw backend.
//!
//! Endpoints:
//! - GET  /health
//! - POST /api/prizes: register a win
//! - GET  /api/prizes: list wins, newest first
//! - GET  /api/prizes/eligibility?email=: cooldown check
//! - GET  /api/stats
//! - POST /api/notifications/retry: re-send pending notifications
//! - GET  /api/notifications/diagnostics: provider health

pub mod routes;
pub mod state;
