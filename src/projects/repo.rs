use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Project, ProjectField};

/// Column values for a new row; file fields are storage keys.
#[derive(Debug)]
pub struct NewProjectRow {
    pub name: String,
    pub description: String,
    pub location: String,
    pub field: ProjectField,
    pub cover_image: String,
    pub product_image: Option<String>,
    pub document: Option<String>,
}

/// `None` leaves the column as it is.
#[derive(Debug, Default)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub field: Option<ProjectField>,
    pub cover_image: Option<String>,
    pub product_image: Option<String>,
    pub document: Option<String>,
}

const COLUMNS: &str = "id, user_id, name, description, cover_image, location, field, \
                       product_image, document, created_at, updated_at";

impl Project {
    pub async fn insert(db: &PgPool, user_id: Uuid, row: &NewProjectRow) -> anyhow::Result<Project> {
        let sql = format!(
            r#"
            INSERT INTO projects
                (user_id, name, description, location, field, cover_image, product_image, document)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        );
        let project = sqlx::query_as::<_, Project>(&sql)
            .bind(user_id)
            .bind(&row.name)
            .bind(&row.description)
            .bind(&row.location)
            .bind(row.field.as_str())
            .bind(&row.cover_image)
            .bind(&row.product_image)
            .bind(&row.document)
            .fetch_one(db)
            .await
            .context("insert project")?;
        Ok(project)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Project>> {
        let sql = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        let project = sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
            .context("find project by id")?;
        Ok(project)
    }

    /// Newest first, optionally restricted to one owner.
    pub async fn list(
        db: &PgPool,
        user_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Project>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM projects
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, Project>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await
            .context("list projects")?;
        Ok(rows)
    }

    pub async fn update(db: &PgPool, id: Uuid, changes: &ProjectChanges) -> anyhow::Result<Option<Project>> {
        let sql = format!(
            r#"
            UPDATE projects
               SET name          = COALESCE($2, name),
                   description   = COALESCE($3, description),
                   location      = COALESCE($4, location),
                   field         = COALESCE($5, field),
                   cover_image   = COALESCE($6, cover_image),
                   product_image = COALESCE($7, product_image),
                   document      = COALESCE($8, document),
                   updated_at    = now()
             WHERE id = $1
            RETURNING {COLUMNS}
            "#
        );
        let project = sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.description)
            .bind(&changes.location)
            .bind(changes.field.map(ProjectField::as_str))
            .bind(&changes.cover_image)
            .bind(&changes.product_image)
            .bind(&changes.document)
            .fetch_optional(db)
            .await
            .context("update project")?;
        Ok(project)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let affected = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete project")?
            .rows_affected();
        Ok(affected == 1)
    }
}
