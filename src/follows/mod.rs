use crate::state::AppState;
use axum::Router;

pub mod graph;
pub mod handlers;
pub mod repo;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::follow_routes())
}
