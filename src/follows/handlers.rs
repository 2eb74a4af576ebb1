use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    graph::FollowOutcome,
    repo,
    services::{follow_user, unfollow_user},
};
use crate::{
    auth::jwt::AuthUser, dto::DetailResponse, error::AppError, pagination::Pagination,
    state::AppState, users::dto::UserResponse,
};

pub fn follow_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:id/follow", post(follow))
        .route("/users/:id/unfollow", post(unfollow))
        .route("/users/:id/followers", get(followers))
        .route("/users/:id/following", get(following))
}

#[instrument(skip(state))]
pub async fn follow(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<DetailResponse>), AppError> {
    match follow_user(state.graph.as_ref(), me, id).await? {
        FollowOutcome::Created => Ok((
            StatusCode::CREATED,
            Json(DetailResponse::new("Followed successfully.")),
        )),
        FollowOutcome::AlreadyFollowing => {
            Ok((StatusCode::OK, Json(DetailResponse::new("Already following."))))
        }
    }
}

#[instrument(skip(state))]
pub async fn unfollow(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DetailResponse>, AppError> {
    unfollow_user(state.graph.as_ref(), me, id).await?;
    Ok(Json(DetailResponse::new("Unfollowed successfully.")))
}

async fn ensure_user(state: &AppState, id: Uuid) -> Result<(), AppError> {
    match state.graph.counts(id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound("User")),
    }
}

#[instrument(skip(state))]
pub async fn followers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    ensure_user(&state, id).await?;
    let (limit, offset) = page.bounds();
    let users = repo::list_followers(&state.db, id, limit, offset).await?;
    Ok(Json(UserResponse::present_all(state.storage.as_ref(), &users).await?))
}

#[instrument(skip(state))]
pub async fn following(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    ensure_user(&state, id).await?;
    let (limit, offset) = page.bounds();
    let users = repo::list_following(&state.db, id, limit, offset).await?;
    Ok(Json(UserResponse::present_all(state.storage.as_ref(), &users).await?))
}
