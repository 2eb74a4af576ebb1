use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{ProjectListQuery, ProjectResponse},
    form::ProjectForm,
    repo::{NewProjectRow, ProjectChanges},
    repo_types::Project,
};
use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    state::AppState,
    storage::StorageClient,
    uploads::{self, store_upload, Upload},
    users::repo_types::User,
};

const COVER_PREFIX: &str = "cover_images";
const PRODUCT_PREFIX: &str = "project_products";
const DOCUMENT_PREFIX: &str = "project_documents";

pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects))
        .route("/projects/:id", get(get_project).delete(delete_project))
}

pub fn write_router() -> Router<AppState> {
    Router::new()
        .route("/projects", post(create_project))
        .route("/projects/:id", patch(update_project))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

/// Objects written during one request, removed again if the row write fails.
struct Staged<'a> {
    storage: &'a dyn StorageClient,
    owner: Uuid,
    keys: Vec<String>,
}

impl<'a> Staged<'a> {
    fn new(storage: &'a dyn StorageClient, owner: Uuid) -> Self {
        Self {
            storage,
            owner,
            keys: Vec::new(),
        }
    }

    async fn put(&mut self, prefix: &str, upload: Option<Upload>) -> anyhow::Result<Option<String>> {
        let Some(upload) = upload else {
            return Ok(None);
        };
        let key = store_upload(self.storage, prefix, self.owner, upload).await?;
        self.keys.push(key.clone());
        Ok(Some(key))
    }

    async fn rollback(self) {
        uploads::discard(self.storage, self.keys).await;
    }
}

fn ensure_owner(project: &Project, user_id: Uuid) -> Result<(), AppError> {
    if project.user_id == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to perform this action.".into(),
        ))
    }
}

async fn load_project(state: &AppState, id: Uuid) -> Result<Project, AppError> {
    Project::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("Project"))
}

#[instrument(skip(state))]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> Result<Json<Vec<ProjectResponse>>, AppError> {
    let (limit, offset) = query.page().bounds();
    let projects = Project::list(&state.db, query.user_id, limit, offset).await?;
    let mut out = Vec::with_capacity(projects.len());
    for project in &projects {
        out.push(ProjectResponse::present(state.storage.as_ref(), project).await?);
    }
    Ok(Json(out))
}

#[instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectResponse>, AppError> {
    let project = load_project(&state, id).await?;
    Ok(Json(ProjectResponse::present(state.storage.as_ref(), &project).await?))
}

#[instrument(skip(state, mp))]
pub async fn create_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> Result<(StatusCode, Json<ProjectResponse>), AppError> {
    let new = ProjectForm::read(mp).await?.into_new()?;

    User::find_by_id(&state.db, user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    let storage = state.storage.as_ref();
    let mut staged = Staged::new(storage, user_id);
    let stored = async {
        let cover_image = staged
            .put(COVER_PREFIX, Some(new.cover_image))
            .await?
            .ok_or_else(|| anyhow::anyhow!("cover image not stored"))?;
        let product_image = staged.put(PRODUCT_PREFIX, new.product_image).await?;
        let document = staged.put(DOCUMENT_PREFIX, new.document).await?;
        let row = NewProjectRow {
            name: new.name,
            description: new.description,
            location: new.location,
            field: new.field,
            cover_image,
            product_image,
            document,
        };
        Ok::<_, anyhow::Error>(Project::insert(&state.db, user_id, &row).await?)
    }
    .await;

    let project = match stored {
        Ok(project) => project,
        Err(e) => {
            staged.rollback().await;
            return Err(e.into());
        }
    };

    info!(project_id = %project.id, %user_id, "project created");
    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse::present(storage, &project).await?),
    ))
}

#[instrument(skip(state, mp))]
pub async fn update_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> Result<Json<ProjectResponse>, AppError> {
    let patch = ProjectForm::read(mp).await?.into_patch()?;

    let current = load_project(&state, id).await?;
    if let Err(e) = ensure_owner(&current, user_id) {
        warn!(project_id = %id, %user_id, "update by non-owner");
        return Err(e);
    }

    let storage = state.storage.as_ref();
    let mut staged = Staged::new(storage, user_id);
    let updated = async {
        let changes = ProjectChanges {
            name: patch.name,
            description: patch.description,
            location: patch.location,
            field: patch.field,
            cover_image: staged.put(COVER_PREFIX, patch.cover_image).await?,
            product_image: staged.put(PRODUCT_PREFIX, patch.product_image).await?,
            document: staged.put(DOCUMENT_PREFIX, patch.document).await?,
        };
        let project = Project::update(&state.db, id, &changes).await?;
        Ok::<_, anyhow::Error>((project, changes))
    }
    .await;

    let (project, changes) = match updated {
        Ok((Some(project), changes)) => (project, changes),
        Ok((None, _)) => {
            staged.rollback().await;
            return Err(AppError::NotFound("Project"));
        }
        Err(e) => {
            staged.rollback().await;
            return Err(e.into());
        }
    };

    // files that were swapped out are no longer referenced
    let mut replaced = Vec::new();
    if changes.cover_image.is_some() {
        replaced.push(current.cover_image);
    }
    if changes.product_image.is_some() {
        replaced.extend(current.product_image);
    }
    if changes.document.is_some() {
        replaced.extend(current.document);
    }
    uploads::discard(storage, replaced).await;

    info!(project_id = %id, %user_id, "project updated");
    Ok(Json(ProjectResponse::present(storage, &project).await?))
}

#[instrument(skip(state))]
pub async fn delete_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let project = load_project(&state, id).await?;
    if let Err(e) = ensure_owner(&project, user_id) {
        warn!(project_id = %id, %user_id, "delete by non-owner");
        return Err(e);
    }

    if !Project::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Project"));
    }
    uploads::discard(state.storage.as_ref(), project.file_keys()).await;

    info!(project_id = %id, %user_id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}
