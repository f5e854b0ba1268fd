//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use fitlog_core::{WorkoutParser, WorkoutService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: WorkoutService,
    pub parser: Arc<dyn WorkoutParser>,
}
