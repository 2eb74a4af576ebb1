use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{UpdateUserRequest, UserResponse},
    repo::AccountUpdate,
    repo_types::User,
};
use crate::{
    auth::{
        jwt::AuthUser,
        password::{hash_password, validate_password},
        services::parse_email,
    },
    error::AppError,
    pagination::Pagination,
    state::AppState,
    uploads::{self, read_upload, require_image, store_upload},
};

const PROFILE_IMAGE_FIELD: &str = "profile_image";
const PROFILE_IMAGE_PREFIX: &str = "profile_images";

pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).patch(update_user).delete(delete_user))
}

pub fn write_router() -> Router<AppState> {
    Router::new()
        .route("/users/:id/profile-image", put(upload_profile_image))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

/// Users may manage their own account; staff may manage any.
fn ensure_self_or_staff(actor: &User, target: Uuid) -> Result<(), AppError> {
    if actor.id == target || actor.is_staff {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to perform this action.".into(),
        ))
    }
}

async fn load_actor(state: &AppState, id: Uuid) -> Result<User, AppError> {
    User::find_by_id(&state.db, id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = load_actor(&state, user_id).await?;
    Ok(Json(UserResponse::present(state.storage.as_ref(), &user).await?))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let (limit, offset) = page.bounds();
    let users = User::list(&state.db, limit, offset).await?;
    Ok(Json(UserResponse::present_all(state.storage.as_ref(), &users).await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok(Json(UserResponse::present(state.storage.as_ref(), &user).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    // validate the whole body before any lookup or write
    let email = payload.email.as_deref().map(parse_email).transpose()?;
    if let Some(password) = payload.password.as_deref() {
        validate_password(password)?;
    }

    let actor = load_actor(&state, user_id).await?;
    ensure_self_or_staff(&actor, id)?;

    let hash = payload.password.as_deref().map(hash_password).transpose()?;
    match User::update_account(&state.db, id, email.as_deref(), hash.as_deref()).await? {
        AccountUpdate::Updated(user) => {
            info!(user_id = %user.id, by = %actor.id, email_changed = email.is_some(),
                  password_changed = hash.is_some(), "user updated");
            Ok(Json(UserResponse::present(state.storage.as_ref(), &user).await?))
        }
        AccountUpdate::EmailTaken => {
            warn!(user_id = %id, "email already in use");
            Err(AppError::Conflict("user with this email address already exists.".into()))
        }
        AccountUpdate::Missing => Err(AppError::NotFound("User")),
    }
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let actor = load_actor(&state, user_id).await?;
    ensure_self_or_staff(&actor, id)?;

    let purged = state
        .graph
        .purge_user(id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    info!(user_id = %id, by = %actor.id, files = purged.file_keys.len(), "user deleted");

    uploads::discard(state.storage.as_ref(), purged.file_keys).await;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, mp))]
pub async fn upload_profile_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> Result<Json<UserResponse>, AppError> {
    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::validation(PROFILE_IMAGE_FIELD, format!("malformed form: {e}")))?
    {
        if field.name() == Some(PROFILE_IMAGE_FIELD) {
            upload = Some(read_upload(field, PROFILE_IMAGE_FIELD).await?);
        }
    }
    let upload = upload
        .ok_or_else(|| AppError::validation(PROFILE_IMAGE_FIELD, "No file was submitted."))?;
    require_image(&upload, PROFILE_IMAGE_FIELD)?;

    let actor = load_actor(&state, user_id).await?;
    ensure_self_or_staff(&actor, id)?;

    let storage = state.storage.as_ref();
    let key = store_upload(storage, PROFILE_IMAGE_PREFIX, id, upload).await?;
    let previous = match User::replace_profile_image(&state.db, id, &key).await {
        Ok(Some(previous)) => previous,
        Ok(None) => {
            uploads::discard(storage, [key]).await;
            return Err(AppError::NotFound("User"));
        }
        Err(e) => {
            uploads::discard(storage, [key]).await;
            return Err(e.into());
        }
    };
    uploads::discard(storage, previous).await;

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    info!(user_id = %id, "profile image replaced");
    Ok(Json(UserResponse::present(storage, &user).await?))
}
