mod dto;
pub mod handlers;
pub mod openfoodfacts;
pub mod repo;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::router()
}
