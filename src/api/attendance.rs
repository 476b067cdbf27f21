use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use sqlx::types::Json;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::{AppError, db_error};
use crate::model::attendance::{
    self, AttendanceRecord, AttendanceStatus, EditHistoryEntry, UpdateAttendance,
};
use crate::model::notification::{NewNotification, NotificationType};
use crate::model::role::Role;
use crate::model::user::UserRef;
use crate::models::{Page, page_params};
use crate::utils::calendar;
use crate::utils::db_utils::{SqlValue, WhereClause, bind_values, bind_values_scalar};
use crate::utils::settings_cache;

use super::notification::create_notification;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordAttendanceReq {
    #[schema(example = 7)]
    pub user_id: u64,
    /// `check-in` or `check-out`.
    #[schema(example = "check-in")]
    pub r#type: String,
    /// Defaults to now when omitted.
    #[schema(value_type = Option<String>, format = "date-time")]
    pub timestamp: Option<DateTime<Utc>>,
}

async fn load_record(
    pool: &MySqlPool,
    record_id: u64,
) -> Result<Option<AttendanceRecord>, AppError> {
    let record = sqlx::query_as::<_, AttendanceRecord>("SELECT * FROM attendance WHERE id = ?")
        .bind(record_id)
        .fetch_optional(pool)
        .await?;
    Ok(record)
}

async fn load_record_for_day(
    pool: &MySqlPool,
    user_id: u64,
    date: &str,
) -> Result<Option<AttendanceRecord>, AppError> {
    let record = sqlx::query_as::<_, AttendanceRecord>(
        "SELECT * FROM attendance WHERE user_id = ? AND date = ?",
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

/// Record a check-in or check-out for a user
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = RecordAttendanceReq,
    responses(
        (status = 201, description = "Event recorded"),
        (status = 400, description = "Invalid operation type or missing check-in"),
        (status = 404, description = "Subject user not found"),
        (status = 409, description = "Duplicate check-in or check-out for today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn record_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<RecordAttendanceReq>,
) -> Result<impl Responder, AppError> {
    auth.require_any(&[Role::Admin, Role::Officer])?;

    let subject_roles = sqlx::query_scalar::<_, Json<Vec<Role>>>(
        "SELECT roles FROM users WHERE id = ? AND is_active = TRUE",
    )
    .bind(payload.user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?
    .0;

    let now = payload.timestamp.unwrap_or_else(Utc::now);
    let offset = calendar::offset_from_minutes(config.local_offset_minutes);
    let day = calendar::day_key(now, offset);

    let existing = load_record_for_day(pool.get_ref(), payload.user_id, &day).await?;

    let (record_id, check_in, check_out) = match payload.r#type.as_str() {
        "check-in" => {
            if existing.as_ref().is_some_and(|r| r.check_in.is_some()) {
                return Err(AppError::conflict(
                    "A check-in is already recorded for this user today",
                ));
            }

            let status = attendance::checkin_status(
                &subject_roles,
                calendar::local_time(now, offset),
                settings_cache::current().late_threshold(),
            );

            match existing {
                // A placeholder (e.g. an absent marker) already holds the
                // day slot; reset it into a fresh check-in.
                Some(record) => {
                    sqlx::query(
                        r#"
                        UPDATE attendance
                        SET check_in = ?, check_out = NULL, status = ?, recorded_by = ?
                        WHERE id = ?
                        "#,
                    )
                    .bind(now)
                    .bind(status)
                    .bind(auth.user_id)
                    .bind(record.id)
                    .execute(pool.get_ref())
                    .await?;
                    (record.id, Some(now), None)
                }
                None => {
                    let result = sqlx::query(
                        r#"
                        INSERT INTO attendance (user_id, date, check_in, status, recorded_by, edit_history)
                        VALUES (?, ?, ?, ?, ?, '[]')
                        "#,
                    )
                    .bind(payload.user_id)
                    .bind(&day)
                    .bind(now)
                    .bind(status)
                    .bind(auth.user_id)
                    .execute(pool.get_ref())
                    .await
                    // A concurrent check-in for the same user/day loses at
                    // the unique index.
                    .map_err(|e| {
                        db_error(e, "A check-in is already recorded for this user today")
                    })?;
                    (result.last_insert_id(), Some(now), None)
                }
            }
        }
        "check-out" => {
            let record = existing
                .filter(|r| r.check_in.is_some())
                .ok_or_else(|| AppError::validation("A check-in must be recorded first"))?;
            if record.check_out.is_some() {
                return Err(AppError::conflict(
                    "A check-out is already recorded for this user today",
                ));
            }

            sqlx::query("UPDATE attendance SET check_out = ?, last_edited_by = ? WHERE id = ?")
                .bind(now)
                .bind(auth.user_id)
                .bind(record.id)
                .execute(pool.get_ref())
                .await?;
            (record.id, record.check_in, Some(now))
        }
        other => {
            return Err(AppError::validation(format!(
                "Invalid operation type: {other} (expected check-in or check-out)"
            )));
        }
    };

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": format!("{} recorded successfully", payload.r#type),
        "data": {
            "id": record_id,
            "user": payload.user_id,
            "type": payload.r#type,
            "checkIn": check_in,
            "checkOut": check_out,
        }
    })))
}

/// Update a record through the role-gated edit engine
#[utoipa::path(
    put,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record ID")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Record updated (or unchanged no-op)"),
        (status = 400, description = "Edit window expired"),
        (status = 403, description = "Not allowed to edit this field"),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendance>,
) -> Result<impl Responder, AppError> {
    let record_id = path.into_inner();
    let update = payload.into_inner();

    let mut record = load_record(pool.get_ref(), record_id)
        .await?
        .ok_or_else(|| AppError::not_found("Attendance record not found"))?;

    let changes = attendance::detect_changes(&record, &update);
    let now = Utc::now();
    let limit = settings_cache::current().officer_edit_time_limit;

    attendance::authorize_update(
        &record,
        &changes,
        &update,
        auth.user_id,
        &auth.roles,
        now,
        limit,
    )?;

    // Nothing actually changed: no-op, return the record untouched.
    if changes.is_empty() && !update.touches_justification() {
        return Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "No changes to apply",
            "data": record,
        })));
    }

    // Audit first: the pre-change snapshot goes onto the append-only log.
    record.edit_history.0.push(EditHistoryEntry {
        editor: auth.user_id,
        timestamp: now,
        previous_state: record.snapshot(),
    });

    // Apply only the authorization-filtered change set, never the raw
    // payload; unauthorized fields must not leak through.
    let checkout_touched = changes.check_out.is_some();
    if let Some(checked_in) = changes.check_in {
        record.check_in = Some(checked_in);
    }
    if let Some(check_out) = changes.check_out {
        record.check_out = check_out;
    }
    if let Some(status) = changes.status {
        record.status = status;
    }

    let mut justified_now = false;
    if auth.is_admin() {
        if let Some(is_justified) = update.is_justified {
            justified_now = is_justified && !record.is_justified;
            record.is_justified = is_justified;
        }
        if let Some(notes) = update.justification_notes.clone() {
            record.justification_notes = Some(notes);
        }
    }

    // lastEditedBy tracks whoever last touched check-out or the admin
    // justification fields.
    if checkout_touched || (auth.is_admin() && update.touches_justification()) {
        record.last_edited_by = Some(auth.user_id);
    }

    sqlx::query(
        r#"
        UPDATE attendance
        SET check_in = ?, check_out = ?, status = ?, is_justified = ?,
            justification_notes = ?, last_edited_by = ?, edit_history = ?
        WHERE id = ?
        "#,
    )
    .bind(record.check_in)
    .bind(record.check_out)
    .bind(record.status)
    .bind(record.is_justified)
    .bind(&record.justification_notes)
    .bind(record.last_edited_by)
    .bind(Json(&record.edit_history.0))
    .bind(record.id)
    .execute(pool.get_ref())
    .await?;

    record.updated_at = now;

    // Best-effort: an admin editing someone else's record notifies the owner.
    if auth.is_admin() && record.user_id != auth.user_id {
        let (kind, message) = if justified_now {
            (
                NotificationType::AttendanceJustified,
                format!(
                    "Your late arrival/absence on {} was justified by {}",
                    record.date, auth.full_name
                ),
            )
        } else {
            (
                NotificationType::AttendanceUpdated,
                format!(
                    "Your attendance record for {} was edited by {}",
                    record.date, auth.full_name
                ),
            )
        };
        create_notification(
            pool.get_ref(),
            NewNotification {
                recipient_id: record.user_id,
                sender_id: Some(auth.user_id),
                kind,
                message,
                link: Some(format!("/my-records?date={}", record.date)),
            },
        )
        .await;
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Record updated successfully",
        "data": record,
    })))
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct TodayQuery {
    /// `createdAt-asc` for oldest-first; anything else sorts newest-first.
    pub sort_by: Option<String>,
    /// Restrict to subjects holding this role; `all` disables the filter.
    pub role: Option<String>,
}

#[derive(sqlx::FromRow)]
struct TodayRow {
    id: u64,
    check_in: Option<DateTime<Utc>>,
    check_out: Option<DateTime<Utc>>,
    status: AttendanceStatus,
    is_justified: bool,
    subject_id: u64,
    subject_name: String,
    subject_roles: Json<Vec<Role>>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodayRecord {
    pub id: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    pub is_justified: bool,
    pub user: TodaySubject,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodaySubject {
    pub id: u64,
    pub full_name: String,
    pub roles: Vec<Role>,
}

/// Today's records with subject info
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    params(TodayQuery),
    responses((status = 200, description = "Today's records", body = [TodayRecord])),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today_records(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<TodayQuery>,
) -> Result<impl Responder, AppError> {
    auth.require_any(&[Role::Admin, Role::Officer])?;

    let today = calendar::today_key(calendar::offset_from_minutes(config.local_offset_minutes));

    let order = if query.sort_by.as_deref() == Some("createdAt-asc") {
        "ASC"
    } else {
        "DESC"
    };

    let mut filters = WhereClause::new();
    filters.push("a.date = ?", SqlValue::Str(today));
    if let Some(role) = query.role.as_deref().filter(|r| *r != "all") {
        filters.push(
            "JSON_CONTAINS(u.roles, JSON_QUOTE(?))",
            SqlValue::Str(role.to_string()),
        );
    }

    let sql = format!(
        r#"
        SELECT a.id, a.check_in, a.check_out, a.status, a.is_justified,
               u.id AS subject_id, u.full_name AS subject_name, u.roles AS subject_roles
        FROM attendance a
        JOIN users u ON u.id = a.user_id
        {}
        ORDER BY a.created_at {}
        "#,
        filters.to_sql(),
        order
    );

    let rows = bind_values(sqlx::query_as::<_, TodayRow>(&sql), filters.values())
        .fetch_all(pool.get_ref())
        .await?;

    let records: Vec<TodayRecord> = rows
        .into_iter()
        .map(|r| TodayRecord {
            id: r.id,
            check_in: r.check_in,
            check_out: r.check_out,
            status: r.status,
            is_justified: r.is_justified,
            user: TodaySubject {
                id: r.subject_id,
                full_name: r.subject_name,
                roles: r.subject_roles.0,
            },
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": records })))
}

/// Delete an attendance record
#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Neither admin nor original recorder"),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<impl Responder, AppError> {
    let record_id = path.into_inner();

    let recorded_by =
        sqlx::query_scalar::<_, u64>("SELECT recorded_by FROM attendance WHERE id = ?")
            .bind(record_id)
            .fetch_optional(pool.get_ref())
            .await?
            .ok_or_else(|| AppError::not_found("Attendance record not found"))?;

    if !auth.is_admin() && recorded_by != auth.user_id {
        return Err(AppError::forbidden(
            "You are not allowed to delete this record",
        ));
    }

    sqlx::query("DELETE FROM attendance WHERE id = ?")
        .bind(record_id)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Record deleted" })))
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct MyRecordsQuery {
    /// Inclusive calendar-day range, `YYYY/MM/DD`.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
    /// `true` / `false`; `all` (or omitted) disables the filter.
    pub is_justified: Option<String>,
}

#[derive(sqlx::FromRow)]
struct MyRecordRow {
    id: u64,
    date: String,
    check_in: Option<DateTime<Utc>>,
    check_out: Option<DateTime<Utc>>,
    status: AttendanceStatus,
    is_justified: bool,
    justification_notes: Option<String>,
    recorder_id: Option<u64>,
    recorder_name: Option<String>,
    recorder_code: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MyRecord {
    pub id: u64,
    #[schema(example = "1403/05/01")]
    pub date: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    pub is_justified: bool,
    pub justification_notes: Option<String>,
    pub recorded_by: UserRef,
}

/// The caller's own records, paginated newest-first
#[utoipa::path(
    get,
    path = "/api/attendance/my",
    params(MyRecordsQuery),
    responses((status = 200, description = "Paginated records", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_records(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MyRecordsQuery>,
) -> Result<impl Responder, AppError> {
    let (page, limit, offset) = page_params(query.page, query.limit);

    let mut filters = WhereClause::new();
    filters.push("a.user_id = ?", SqlValue::U64(auth.user_id));
    if let (Some(start), Some(end)) = (&query.start_date, &query.end_date) {
        filters.push_many(
            "a.date >= ? AND a.date <= ?",
            vec![SqlValue::Str(start.clone()), SqlValue::Str(end.clone())],
        );
    }
    if let Some(status) = query.status.as_deref().filter(|s| *s != "all") {
        filters.push("a.status = ?", SqlValue::Str(status.to_string()));
    }
    if let Some(justified) = query.is_justified.as_deref().filter(|j| *j != "all") {
        filters.push("a.is_justified = ?", SqlValue::Bool(justified == "true"));
    }

    let count_sql = format!("SELECT COUNT(*) FROM attendance a{}", filters.to_sql());
    let total = bind_values_scalar(sqlx::query_scalar::<_, i64>(&count_sql), filters.values())
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        r#"
        SELECT a.id, a.date, a.check_in, a.check_out, a.status, a.is_justified,
               a.justification_notes,
               r.id AS recorder_id, r.full_name AS recorder_name,
               r.personnel_code AS recorder_code
        FROM attendance a
        LEFT JOIN users r ON r.id = a.recorded_by
        {}
        ORDER BY a.date DESC, a.created_at DESC
        LIMIT ? OFFSET ?
        "#,
        filters.to_sql()
    );

    let rows = bind_values(sqlx::query_as::<_, MyRecordRow>(&data_sql), filters.values())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    let docs: Vec<MyRecord> = rows
        .into_iter()
        .map(|r| MyRecord {
            id: r.id,
            date: r.date,
            check_in: r.check_in,
            check_out: r.check_out,
            status: r.status,
            is_justified: r.is_justified,
            justification_notes: r.justification_notes,
            recorded_by: match r.recorder_name {
                Some(full_name) => UserRef {
                    id: r.recorder_id,
                    full_name,
                    personnel_code: r.recorder_code,
                },
                None => UserRef::system(),
            },
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": Page::new(docs, total, page, limit),
    })))
}
