pub mod rest;
pub mod state;

// Re-export the handlers so the binary can build the router from one place.
pub use rest::{
    delete_goal_handler, delete_workout_handler, edit_workout_handler, get_workout_handler,
    goal_progress_handler, list_goals_handler, list_records_handler, log_workout_handler,
};
