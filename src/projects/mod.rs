use crate::state::AppState;
use axum::Router;

mod countries;
pub mod dto;
pub mod form;
pub mod handlers;
pub mod repo;
pub mod repo_types;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_router())
        .merge(handlers::write_router())
}
