//! ABOUTME: HTTP interface over the engine: MJPEG feed, stats, alerts, control
//! ABOUTME: Thin actix-web surface; no authentication or dashboard

use cw_engine::{AlertLog, SessionController};
use std::sync::Arc;

pub mod routes;

pub use routes::configure_routes;

/// Shared state handed to every route handler
#[derive(Clone)]
pub struct AppState {
    /// The single session controller
    pub controller: Arc<SessionController>,
    /// Bundled alert log collaborator, for the listing endpoint
    pub alert_log: Arc<AlertLog>,
}

impl AppState {
    pub fn new(controller: Arc<SessionController>, alert_log: Arc<AlertLog>) -> Self {
        Self {
            controller,
            alert_log,
        }
    }
}
