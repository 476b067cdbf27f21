use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::types::Json;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::role::{self, Role};

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Justified,
}

/// Pre-edit snapshot captured in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditSnapshot {
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    pub is_justified: bool,
}

/// Append-only audit entry; past entries are never rewritten or pruned.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditHistoryEntry {
    pub editor: u64,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
    pub previous_state: EditSnapshot,
}

/// One row per (user, calendar-day); the unique index enforces it.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,
    pub user_id: u64,
    /// Regional calendar-day key, e.g. `1403/05/01`.
    #[schema(example = "1403/05/01")]
    pub date: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    pub is_justified: bool,
    pub justification_notes: Option<String>,
    pub recorded_by: u64,
    pub last_edited_by: Option<u64>,
    #[schema(value_type = Vec<Object>)]
    pub edit_history: Json<Vec<EditHistoryEntry>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn snapshot(&self) -> EditSnapshot {
        EditSnapshot {
            check_in: self.check_in,
            check_out: self.check_out,
            status: self.status,
            is_justified: self.is_justified,
        }
    }
}

/// Distinguishes an absent field from an explicit `null` (used to clear
/// the check-out time).
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttendance {
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<DateTime<Utc>>,
    /// `null` clears the stored check-out; omitting the field leaves it alone.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub check_out: Option<Option<DateTime<Utc>>>,
    pub status: Option<AttendanceStatus>,
    pub is_justified: Option<bool>,
    pub justification_notes: Option<String>,
}

impl UpdateAttendance {
    pub fn touches_justification(&self) -> bool {
        self.is_justified.is_some() || self.justification_notes.is_some()
    }
}

/// Fields that actually differ from the stored record. Only members of
/// this set are subject to (and granted by) authorization.
#[derive(Debug, Default, PartialEq)]
pub struct ChangeSet {
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<Option<DateTime<Utc>>>,
    pub status: Option<AttendanceStatus>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.check_in.is_none() && self.check_out.is_none() && self.status.is_none()
    }
}

/// Field-level change detection: a proposed value enters the set only if
/// it differs from the stored one. `checkOut: null` is an explicit clear.
pub fn detect_changes(record: &AttendanceRecord, update: &UpdateAttendance) -> ChangeSet {
    let mut changes = ChangeSet::default();

    if let Some(proposed) = update.check_in {
        if record.check_in != Some(proposed) {
            changes.check_in = Some(proposed);
        }
    }

    match update.check_out {
        Some(Some(proposed)) if record.check_out != Some(proposed) => {
            changes.check_out = Some(Some(proposed));
        }
        Some(None) if record.check_out.is_some() => {
            changes.check_out = Some(None);
        }
        _ => {}
    }

    if let Some(proposed) = update.status {
        if record.status != proposed {
            changes.status = Some(proposed);
        }
    }

    changes
}

/// Authorization gate for [`detect_changes`] output.
///
/// Admins may apply anything, including the justification fields. An
/// officer is constrained per changed field: check-in only as the original
/// recorder within `edit_limit_minutes` of creation; check-out only when
/// none exists yet or they authored the last one, within the window of the
/// last update. Everyone else is rejected outright.
pub fn authorize_update(
    record: &AttendanceRecord,
    changes: &ChangeSet,
    update: &UpdateAttendance,
    actor_id: u64,
    actor_roles: &[Role],
    now: DateTime<Utc>,
    edit_limit_minutes: i64,
) -> Result<(), AppError> {
    let is_admin = actor_roles.contains(&Role::Admin);
    let is_officer = actor_roles.contains(&Role::Officer);

    if is_admin {
        return Ok(());
    }
    if !is_officer {
        return Err(AppError::forbidden(
            "You are not allowed to perform this operation",
        ));
    }

    let window = Duration::minutes(edit_limit_minutes);

    if changes.check_in.is_some() {
        if record.recorded_by != actor_id {
            return Err(AppError::forbidden(
                "You may only edit a check-in you recorded yourself",
            ));
        }
        if record.created_at + window < now {
            return Err(AppError::validation(format!(
                "The {edit_limit_minutes}-minute window for editing this check-in has expired"
            )));
        }
    }

    if changes.check_out.is_some() && record.check_out.is_some() {
        if record.last_edited_by != Some(actor_id) {
            return Err(AppError::forbidden(
                "You may only edit a check-out you recorded yourself",
            ));
        }
        if record.updated_at + window < now {
            return Err(AppError::validation(format!(
                "The {edit_limit_minutes}-minute window for editing this check-out has expired"
            )));
        }
    }

    if update.touches_justification() {
        return Err(AppError::forbidden(
            "You are not allowed to justify attendance records",
        ));
    }

    Ok(())
}

/// Status decision at check-in: lateness applies to staff-class roles
/// only, and only strictly after the threshold time-of-day.
pub fn checkin_status(
    user_roles: &[Role],
    local_time: NaiveTime,
    late_threshold: NaiveTime,
) -> AttendanceStatus {
    if role::is_staff_class(user_roles) && local_time > late_threshold {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;
    use actix_web::http::StatusCode;
    use chrono::TimeZone;

    fn record() -> AttendanceRecord {
        let created = Utc.with_ymd_and_hms(2026, 8, 30, 5, 15, 0).unwrap();
        AttendanceRecord {
            id: 1,
            user_id: 7,
            date: "1405/06/08".to_string(),
            check_in: Some(created),
            check_out: None,
            status: AttendanceStatus::Present,
            is_justified: false,
            justification_notes: None,
            recorded_by: 42,
            last_edited_by: None,
            edit_history: Json(vec![]),
            created_at: created,
            updated_at: created,
        }
    }

    fn threshold() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 30, 0).unwrap()
    }

    #[test]
    fn staff_after_threshold_is_late() {
        let t = NaiveTime::from_hms_opt(8, 45, 0).unwrap();
        assert_eq!(
            checkin_status(&[Role::Staff], t, threshold()),
            AttendanceStatus::Late
        );
    }

    #[test]
    fn staff_at_or_before_threshold_is_present() {
        assert_eq!(
            checkin_status(&[Role::Staff], threshold(), threshold()),
            AttendanceStatus::Present
        );
        let early = NaiveTime::from_hms_opt(7, 59, 0).unwrap();
        assert_eq!(
            checkin_status(&[Role::Officer], early, threshold()),
            AttendanceStatus::Present
        );
    }

    #[test]
    fn faculty_is_never_late() {
        let t = NaiveTime::from_hms_opt(11, 0, 0).unwrap();
        assert_eq!(
            checkin_status(&[Role::Professor], t, threshold()),
            AttendanceStatus::Present
        );
        assert_eq!(
            checkin_status(&[Role::Faculty], t, threshold()),
            AttendanceStatus::Present
        );
    }

    #[test]
    fn detect_changes_skips_equal_values() {
        let rec = record();
        let update = UpdateAttendance {
            check_in: rec.check_in,
            status: Some(AttendanceStatus::Present),
            ..Default::default()
        };
        assert!(detect_changes(&rec, &update).is_empty());
    }

    #[test]
    fn detect_changes_picks_up_differences() {
        let rec = record();
        let new_in = rec.check_in.unwrap() + Duration::minutes(5);
        let update = UpdateAttendance {
            check_in: Some(new_in),
            status: Some(AttendanceStatus::Late),
            ..Default::default()
        };
        let changes = detect_changes(&rec, &update);
        assert_eq!(changes.check_in, Some(new_in));
        assert_eq!(changes.status, Some(AttendanceStatus::Late));
    }

    #[test]
    fn explicit_null_clears_checkout_only_when_set() {
        let mut rec = record();
        let update = UpdateAttendance {
            check_out: Some(None),
            ..Default::default()
        };
        // No stored check-out: clearing is a no-op, not a change.
        assert!(detect_changes(&rec, &update).is_empty());

        rec.check_out = Some(rec.created_at + Duration::hours(6));
        let changes = detect_changes(&rec, &update);
        assert_eq!(changes.check_out, Some(None));
    }

    #[test]
    fn admin_may_change_anything() {
        let rec = record();
        let update = UpdateAttendance {
            is_justified: Some(true),
            ..Default::default()
        };
        let changes = ChangeSet {
            status: Some(AttendanceStatus::Justified),
            ..Default::default()
        };
        let late_now = rec.created_at + Duration::hours(48);
        assert!(
            authorize_update(&rec, &changes, &update, 99, &[Role::Admin], late_now, 30).is_ok()
        );
    }

    #[test]
    fn officer_checkin_edit_requires_being_recorder() {
        let rec = record();
        let changes = ChangeSet {
            check_in: Some(rec.created_at + Duration::minutes(1)),
            ..Default::default()
        };
        let update = UpdateAttendance::default();
        let now = rec.created_at + Duration::minutes(5);

        let err = authorize_update(&rec, &changes, &update, 7, &[Role::Officer], now, 30)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        // The original recorder within the window succeeds.
        assert!(authorize_update(&rec, &changes, &update, 42, &[Role::Officer], now, 30).is_ok());
    }

    #[test]
    fn officer_checkin_edit_window_expires() {
        let rec = record();
        let changes = ChangeSet {
            check_in: Some(rec.created_at + Duration::minutes(1)),
            ..Default::default()
        };
        let update = UpdateAttendance::default();
        let now = rec.created_at + Duration::minutes(31);

        let err = authorize_update(&rec, &changes, &update, 42, &[Role::Officer], now, 30)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn officer_checkout_rules() {
        let mut rec = record();
        let update = UpdateAttendance::default();
        let changes = ChangeSet {
            check_out: Some(Some(rec.created_at + Duration::hours(6))),
            ..Default::default()
        };
        let now = rec.created_at + Duration::minutes(5);

        // First check-out: any officer may set it.
        assert!(authorize_update(&rec, &changes, &update, 7, &[Role::Officer], now, 30).is_ok());

        // Existing check-out authored by someone else: forbidden.
        rec.check_out = Some(rec.created_at + Duration::hours(5));
        rec.last_edited_by = Some(42);
        let err = authorize_update(&rec, &changes, &update, 7, &[Role::Officer], now, 30)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        // The last editor inside the window may amend it.
        assert!(authorize_update(&rec, &changes, &update, 42, &[Role::Officer], now, 30).is_ok());

        // ... but not once the window has elapsed.
        let expired = rec.updated_at + Duration::minutes(45);
        let err = authorize_update(&rec, &changes, &update, 42, &[Role::Officer], expired, 30)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn officer_may_never_justify() {
        let rec = record();
        let update = UpdateAttendance {
            is_justified: Some(true),
            ..Default::default()
        };
        let now = rec.created_at + Duration::minutes(1);
        let err = authorize_update(
            &rec,
            &ChangeSet::default(),
            &update,
            42,
            &[Role::Officer, Role::Staff],
            now,
            30,
        )
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn plain_staff_is_rejected_outright() {
        let rec = record();
        let err = authorize_update(
            &rec,
            &ChangeSet::default(),
            &UpdateAttendance::default(),
            7,
            &[Role::Staff],
            rec.created_at,
            30,
        )
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn snapshot_captures_pre_edit_state() {
        let rec = record();
        let snap = rec.snapshot();
        assert_eq!(snap.check_in, rec.check_in);
        assert_eq!(snap.status, AttendanceStatus::Present);
        assert!(!snap.is_justified);
    }
}
