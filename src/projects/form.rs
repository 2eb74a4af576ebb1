//! Multipart body shared by project create and update.

use axum::extract::Multipart;

use super::{countries::normalize_country, repo_types::ProjectField};
use crate::{
    error::AppError,
    uploads::{read_upload, require_image, Upload},
};

const MAX_NAME_LEN: usize = 255;

/// Raw form fields as submitted; nothing validated yet.
#[derive(Debug, Default)]
pub struct ProjectForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub field: Option<String>,
    pub cover_image: Option<Upload>,
    pub product_image: Option<Upload>,
    pub document: Option<Upload>,
}

#[derive(Debug)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub location: String,
    pub field: ProjectField,
    pub cover_image: Upload,
    pub product_image: Option<Upload>,
    pub document: Option<Upload>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub field: Option<ProjectField>,
    pub cover_image: Option<Upload>,
    pub product_image: Option<Upload>,
    pub document: Option<Upload>,
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &'static str) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::validation(name, format!("unreadable value: {e}")))
}

impl ProjectForm {
    pub async fn read(mut mp: Multipart) -> Result<Self, AppError> {
        let mut form = ProjectForm::default();
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| AppError::validation("form", format!("malformed form: {e}")))?
        {
            match field.name() {
                Some("name") => form.name = Some(read_text(field, "name").await?),
                Some("description") => {
                    form.description = Some(read_text(field, "description").await?)
                }
                Some("location") => form.location = Some(read_text(field, "location").await?),
                Some("field") => form.field = Some(read_text(field, "field").await?),
                Some("cover_image") => {
                    form.cover_image = Some(read_upload(field, "cover_image").await?)
                }
                Some("product_image") => {
                    form.product_image = Some(read_upload(field, "product_image").await?)
                }
                Some("document") => form.document = Some(read_upload(field, "document").await?),
                _ => {}
            }
        }
        Ok(form)
    }

    pub fn into_new(self) -> Result<NewProject, AppError> {
        let name = self.name.ok_or_else(|| required("name"))?;
        let description = self.description.ok_or_else(|| required("description"))?;
        let location = self.location.ok_or_else(|| required("location"))?;
        let field = self.field.ok_or_else(|| required("field"))?;
        let cover_image = self
            .cover_image
            .ok_or_else(|| AppError::validation("cover_image", "No file was submitted."))?;
        require_image(&cover_image, "cover_image")?;
        if let Some(product) = &self.product_image {
            require_image(product, "product_image")?;
        }

        Ok(NewProject {
            name: check_name(name)?,
            description: check_description(description)?,
            location: check_location(&location)?,
            field: check_field(&field)?,
            cover_image,
            product_image: self.product_image,
            document: self.document,
        })
    }

    pub fn into_patch(self) -> Result<ProjectPatch, AppError> {
        if let Some(cover) = &self.cover_image {
            require_image(cover, "cover_image")?;
        }
        if let Some(product) = &self.product_image {
            require_image(product, "product_image")?;
        }
        Ok(ProjectPatch {
            name: self.name.map(check_name).transpose()?,
            description: self.description.map(check_description).transpose()?,
            location: self.location.as_deref().map(check_location).transpose()?,
            field: self.field.as_deref().map(check_field).transpose()?,
            cover_image: self.cover_image,
            product_image: self.product_image,
            document: self.document,
        })
    }
}

fn required(field: &'static str) -> AppError {
    AppError::validation(field, "This field is required.")
}

fn check_name(raw: String) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::validation("name", "This field may not be blank."));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(
            "name",
            format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
        ));
    }
    Ok(name.to_string())
}

fn check_description(raw: String) -> Result<String, AppError> {
    if raw.trim().is_empty() {
        return Err(AppError::validation("description", "This field may not be blank."));
    }
    Ok(raw)
}

fn check_location(raw: &str) -> Result<String, AppError> {
    normalize_country(raw).ok_or_else(|| {
        AppError::validation("location", format!("\"{}\" is not a valid choice.", raw.trim()))
    })
}

fn check_field(raw: &str) -> Result<ProjectField, AppError> {
    raw.trim()
        .parse()
        .map_err(|e: super::repo_types::ParseProjectFieldError| {
            AppError::validation("field", e.to_string())
        })
}
