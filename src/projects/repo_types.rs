use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Industry a project belongs to; stored as its upper-case code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProjectField {
    Tech,
    Agri,
    Fash,
    Health,
    Edu,
    Fin,
}

#[derive(Debug, Error)]
#[error("\"{0}\" is not a valid choice.")]
pub struct ParseProjectFieldError(pub String);

impl ProjectField {
    pub const ALL: [ProjectField; 6] = [
        ProjectField::Tech,
        ProjectField::Agri,
        ProjectField::Fash,
        ProjectField::Health,
        ProjectField::Edu,
        ProjectField::Fin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectField::Tech => "TECH",
            ProjectField::Agri => "AGRI",
            ProjectField::Fash => "FASH",
            ProjectField::Health => "HEALTH",
            ProjectField::Edu => "EDU",
            ProjectField::Fin => "FIN",
        }
    }
}

impl fmt::Display for ProjectField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectField {
    type Err = ParseProjectFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ParseProjectFieldError(s.to_string()))
    }
}

impl TryFrom<String> for ProjectField {
    type Error = ParseProjectFieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Project record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub cover_image: String, // object-storage key
    pub location: String,    // ISO 3166-1 alpha-2
    #[sqlx(try_from = "String")]
    pub field: ProjectField,
    pub product_image: Option<String>,
    pub document: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Project {
    /// Every storage key the row references.
    pub fn file_keys(&self) -> Vec<String> {
        let mut keys = vec![self.cover_image.clone()];
        keys.extend(self.product_image.clone());
        keys.extend(self.document.clone());
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_codes_round_trip_through_text_and_json() {
        for field in ProjectField::ALL {
            assert_eq!(field.as_str().parse::<ProjectField>().unwrap(), field);
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.as_str()));
        }
    }

    #[test]
    fn unknown_or_lowercase_codes_are_rejected() {
        assert!("tech".parse::<ProjectField>().is_err());
        let err = ProjectField::try_from("SPACE".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "\"SPACE\" is not a valid choice.");
    }
}
