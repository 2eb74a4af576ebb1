use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Project, ProjectField};
use crate::{pagination::Pagination, storage::StorageClient, uploads};

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub cover_image: String, // presigned URL
    pub location: String,
    pub field: ProjectField,
    pub product_image: Option<String>,
    pub document: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ProjectResponse {
    pub async fn present(storage: &dyn StorageClient, project: &Project) -> anyhow::Result<Self> {
        Ok(Self {
            id: project.id,
            user_id: project.user_id,
            name: project.name.clone(),
            description: project.description.clone(),
            cover_image: storage
                .presign_get(&project.cover_image, uploads::PRESIGN_TTL_SECS)
                .await?,
            location: project.location.clone(),
            field: project.field,
            product_image: uploads::presign(storage, project.product_image.as_deref()).await?,
            document: uploads::presign(storage, project.document.as_deref()).await?,
            created_at: project.created_at,
            updated_at: project.updated_at,
        })
    }
}

/// `GET /projects?user_id=&limit=&offset=`
#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ProjectListQuery {
    pub fn page(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            limit: self.limit.unwrap_or(defaults.limit),
            offset: self.offset.unwrap_or(defaults.offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn files_are_presented_as_urls() {
        let project = Project {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Seed Bank".into(),
            description: "Shared seed storage".into(),
            cover_image: "cover_images/u/c.png".into(),
            location: "GH".into(),
            field: ProjectField::Agri,
            product_image: None,
            document: Some("project_documents/u/d.pdf".into()),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let storage = MemoryStorage::new();
        let json = serde_json::to_value(ProjectResponse::present(&storage, &project).await.unwrap())
            .unwrap();

        assert_eq!(json["cover_image"], "https://fake.local/cover_images/u/c.png");
        assert_eq!(json["document"], "https://fake.local/project_documents/u/d.pdf");
        assert!(json["product_image"].is_null());
        assert_eq!(json["field"], "AGRI");
        assert_eq!(json["location"], "GH");
    }

    #[test]
    fn list_query_falls_back_to_default_page() {
        let q = ProjectListQuery {
            user_id: None,
            limit: None,
            offset: Some(40),
        };
        assert_eq!(q.page().bounds(), (20, 40));
    }
}
