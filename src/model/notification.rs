use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Typed category; the frontend keys icons off these values.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    sqlx::Type,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    AttendanceJustified,
    AttendanceUpdated,
    PasswordChanged,
    RoleUpdated,
    ProfileUpdatedByAdmin,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[schema(example = 1)]
    pub id: u64,
    pub recipient_id: u64,
    pub sender_id: Option<u64>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Payload for the fire-and-forget creation path.
#[derive(Debug)]
pub struct NewNotification {
    pub recipient_id: u64,
    pub sender_id: Option<u64>,
    pub kind: NotificationType,
    pub message: String,
    pub link: Option<String>,
}
