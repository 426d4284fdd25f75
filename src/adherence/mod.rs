mod dto;
pub mod engine;
pub mod handlers;
pub mod period;

pub use engine::{compute, AdherenceSummary, DayStatus};
pub use period::Period;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
