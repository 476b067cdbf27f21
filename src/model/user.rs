use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "John Doe")]
    pub full_name: String,
    /// Staff-class identity code; unique when present.
    #[schema(example = "EMP-1042", nullable = true)]
    pub personnel_code: Option<String>,
    /// Faculty-class identity code; unique when present.
    #[schema(example = "0012345678", nullable = true)]
    pub national_code: Option<String>,
    #[serde(skip_serializing)]
    pub password: String,
    #[schema(value_type = Vec<String>, example = json!(["officer", "staff"]))]
    pub roles: Json<Vec<Role>>,
    /// Department memberships, referenced by name.
    #[schema(value_type = Vec<String>, example = json!(["Education"]))]
    pub departments: Json<Vec<String>>,
    pub room_location: Option<String>,
    pub phone_number: Option<String>,
    pub avatar: String,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

/// Slim identity used when a record resolves its subject or recorder.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: Option<u64>,
    #[schema(example = "John Doe")]
    pub full_name: String,
    pub personnel_code: Option<String>,
}

impl UserRef {
    /// Fallback label for records whose recorder no longer resolves.
    pub fn system() -> Self {
        Self {
            id: None,
            full_name: "system".to_string(),
            personnel_code: None,
        }
    }
}
