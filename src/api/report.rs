use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use sqlx::types::Json;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::attendance::AttendanceStatus;
use crate::model::role::Role;
use crate::models::{Page, page_params};
use crate::utils::calendar;
use crate::utils::db_utils::{SqlValue, WhereClause, bind_values, bind_values_scalar};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    /// `true` / `false`; `all` (or omitted) disables the filter.
    pub is_justified: Option<String>,
    pub user_id: Option<u64>,
    pub recorded_by: Option<u64>,
    /// Restrict to subjects holding this role; `all` disables the filter.
    pub role: Option<String>,
    pub department: Option<String>,
    /// `asc` for oldest-first; anything else sorts newest-first.
    pub sort_order: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// `true` returns the full unpaginated array.
    pub export: Option<bool>,
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: u64,
    date: String,
    check_in: Option<DateTime<Utc>>,
    check_out: Option<DateTime<Utc>>,
    status: AttendanceStatus,
    is_justified: bool,
    justification_notes: Option<String>,
    subject_id: u64,
    subject_name: String,
    subject_code: Option<String>,
    subject_roles: Json<Vec<Role>>,
    subject_departments: Json<Vec<String>>,
    recorder_name: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
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
    pub user: ReportSubject,
    pub recorded_by: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportSubject {
    pub id: u64,
    pub full_name: String,
    pub personnel_code: Option<String>,
    pub roles: Vec<Role>,
    pub departments: Vec<String>,
}

impl From<ReportRow> for ReportRecord {
    fn from(r: ReportRow) -> Self {
        ReportRecord {
            id: r.id,
            date: r.date,
            check_in: r.check_in,
            check_out: r.check_out,
            status: r.status,
            is_justified: r.is_justified,
            justification_notes: r.justification_notes,
            user: ReportSubject {
                id: r.subject_id,
                full_name: r.subject_name,
                personnel_code: r.subject_code,
                roles: r.subject_roles.0,
                departments: r.subject_departments.0,
            },
            recorded_by: r.recorder_name.unwrap_or_else(|| "system".to_string()),
        }
    }
}

fn report_filters(auth: &AuthUser, query: &ReportQuery) -> WhereClause {
    let mut filters = WhereClause::new();

    // A pure officer only sees records they recorded or later edited.
    if !auth.is_admin() {
        filters.push_many(
            "(a.recorded_by = ? OR JSON_CONTAINS(a.edit_history, JSON_OBJECT('editor', ?)))",
            vec![SqlValue::U64(auth.user_id), SqlValue::U64(auth.user_id)],
        );
    }
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
    if let Some(user_id) = query.user_id {
        filters.push("a.user_id = ?", SqlValue::U64(user_id));
    }
    if let Some(recorder) = query.recorded_by {
        filters.push("a.recorded_by = ?", SqlValue::U64(recorder));
    }
    if let Some(role) = query.role.as_deref().filter(|r| *r != "all") {
        filters.push(
            "JSON_CONTAINS(u.roles, JSON_QUOTE(?))",
            SqlValue::Str(role.to_string()),
        );
    }
    if let Some(dept) = query.department.as_deref().filter(|d| *d != "all") {
        filters.push(
            "JSON_CONTAINS(u.departments, JSON_QUOTE(?))",
            SqlValue::Str(dept.to_string()),
        );
    }
    filters
}

/// Filterable attendance report, paginated or exported whole
#[utoipa::path(
    get,
    path = "/api/reports/comprehensive",
    params(ReportQuery),
    responses((status = 200, description = "Report page or full export", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn comprehensive_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ReportQuery>,
) -> Result<impl Responder, AppError> {
    auth.require_any(&[Role::Admin, Role::Officer])?;

    let filters = report_filters(&auth, &query);
    let order = if query.sort_order.as_deref() == Some("asc") {
        "ASC"
    } else {
        "DESC"
    };

    let select = format!(
        r#"
        SELECT a.id, a.date, a.check_in, a.check_out, a.status, a.is_justified,
               a.justification_notes,
               u.id AS subject_id, u.full_name AS subject_name,
               u.personnel_code AS subject_code, u.roles AS subject_roles,
               u.departments AS subject_departments,
               r.full_name AS recorder_name
        FROM attendance a
        JOIN users u ON u.id = a.user_id
        LEFT JOIN users r ON r.id = a.recorded_by
        {}
        ORDER BY a.date {order}, a.created_at {order}
        "#,
        filters.to_sql()
    );

    if query.export.unwrap_or(false) {
        let rows = bind_values(sqlx::query_as::<_, ReportRow>(&select), filters.values())
            .fetch_all(pool.get_ref())
            .await?;
        let records: Vec<ReportRecord> = rows.into_iter().map(Into::into).collect();
        return Ok(HttpResponse::Ok().json(json!({ "success": true, "data": records })));
    }

    let (page, limit, offset) = page_params(query.page, query.limit);

    let count_sql = format!(
        "SELECT COUNT(*) FROM attendance a JOIN users u ON u.id = a.user_id{}",
        filters.to_sql()
    );
    let total = bind_values_scalar(sqlx::query_scalar::<_, i64>(&count_sql), filters.values())
        .fetch_one(pool.get_ref())
        .await?;

    let paged = format!("{select} LIMIT ? OFFSET ?");
    let rows = bind_values(sqlx::query_as::<_, ReportRow>(&paged), filters.values())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;
    let docs: Vec<ReportRecord> = rows.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": Page::new(docs, total, page, limit),
    })))
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStatsQuery {
    pub user_id: u64,
    /// Regional calendar year, e.g. 1403.
    pub year: i32,
    /// Regional calendar month, 1..=12.
    pub month: u32,
}

#[derive(sqlx::FromRow)]
struct MonthlyRow {
    total_hours: Option<f64>,
    present_days: i64,
    late_days: i64,
}

/// Work-hour and presence stats for one user over one calendar month
#[utoipa::path(
    get,
    path = "/api/reports/monthly-stats",
    params(MonthlyStatsQuery),
    responses((status = 200, description = "Monthly stats", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn monthly_stats(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthlyStatsQuery>,
) -> Result<impl Responder, AppError> {
    auth.require_any(&[Role::Admin, Role::Officer])?;

    let (start, end) = calendar::month_bounds(query.year, query.month)?;

    // Only complete pairs count towards hours and presence.
    let row = sqlx::query_as::<_, MonthlyRow>(
        r#"
        SELECT
            SUM(TIMESTAMPDIFF(SECOND, check_in, check_out)) / 3600.0 AS total_hours,
            COUNT(*) AS present_days,
            CAST(COALESCE(SUM(status = 'late'), 0) AS SIGNED) AS late_days
        FROM attendance
        WHERE user_id = ? AND date >= ? AND date <= ?
          AND check_in IS NOT NULL AND check_out IS NOT NULL
        "#,
    )
    .bind(query.user_id)
    .bind(&start)
    .bind(&end)
    .fetch_one(pool.get_ref())
    .await?;

    let total = row.total_hours.unwrap_or(0.0);
    let average = if row.present_days > 0 {
        total / row.present_days as f64
    } else {
        0.0
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": {
            "userId": query.user_id,
            "month": calendar::format_day_key(query.year, query.month, 1),
            "totalWorkHours": round2(total),
            "averageWorkHours": round2(average),
            "presentDays": row.present_days,
            "lateDays": row.late_days,
        }
    })))
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct LateTrendQuery {
    pub department_id: u64,
    pub start_date: String,
    pub end_date: String,
}

#[derive(sqlx::FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LateTrendPoint {
    #[schema(example = "1403/05/01")]
    pub date: String,
    pub late_count: i64,
}

/// Per-day late counts for one department over a date range
#[utoipa::path(
    get,
    path = "/api/reports/department-late-trend",
    params(LateTrendQuery),
    responses(
        (status = 200, description = "Daily late counts", body = [LateTrendPoint]),
        (status = 404, description = "Department not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn department_late_trend(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LateTrendQuery>,
) -> Result<impl Responder, AppError> {
    auth.require_any(&[Role::Admin, Role::Officer])?;

    let name = sqlx::query_scalar::<_, String>("SELECT name FROM departments WHERE id = ?")
        .bind(query.department_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Department not found"))?;

    let points = sqlx::query_as::<_, LateTrendPoint>(
        r#"
        SELECT a.date, CAST(COUNT(*) AS SIGNED) AS late_count
        FROM attendance a
        JOIN users u ON u.id = a.user_id
        WHERE a.status = 'late'
          AND a.date >= ? AND a.date <= ?
          AND JSON_CONTAINS(u.departments, JSON_QUOTE(?))
        GROUP BY a.date
        ORDER BY a.date ASC
        "#,
    )
    .bind(&query.start_date)
    .bind(&query.end_date)
    .bind(&name)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": { "department": name, "trend": points }
    })))
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(sqlx::FromRow)]
struct DeptPerfRow {
    name: String,
    member_count: i64,
    late_count: i64,
    total_records: i64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentPerformance {
    pub department: String,
    pub member_count: i64,
    pub late_count: i64,
    pub total_records: i64,
    /// lates / total records in range, 4-decimal rounding; 0 when the
    /// department has no records.
    pub late_rate: f64,
}

/// Late-rate ranking across departments with at least one member
#[utoipa::path(
    get,
    path = "/api/reports/department-performance",
    params(RangeQuery),
    responses((status = 200, description = "Departments sorted by late rate", body = [DepartmentPerformance])),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn department_performance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RangeQuery>,
) -> Result<impl Responder, AppError> {
    auth.require_any(&[Role::Admin, Role::Officer])?;

    let mut join_values: Vec<SqlValue> = Vec::new();
    let mut range_sql = String::new();
    if let (Some(start), Some(end)) = (&query.start_date, &query.end_date) {
        range_sql.push_str(" AND a.date >= ? AND a.date <= ?");
        join_values.push(SqlValue::Str(start.clone()));
        join_values.push(SqlValue::Str(end.clone()));
    }

    let sql = format!(
        r#"
        SELECT d.name,
               CAST(COUNT(DISTINCT u.id) AS SIGNED) AS member_count,
               CAST(COUNT(DISTINCT CASE WHEN a.status = 'late' THEN a.id END) AS SIGNED) AS late_count,
               CAST(COUNT(DISTINCT a.id) AS SIGNED) AS total_records
        FROM departments d
        JOIN users u ON JSON_CONTAINS(u.departments, JSON_QUOTE(d.name))
        LEFT JOIN attendance a ON a.user_id = u.id{range_sql}
        GROUP BY d.name
        "#
    );

    let rows = bind_values(sqlx::query_as::<_, DeptPerfRow>(&sql), &join_values)
        .fetch_all(pool.get_ref())
        .await?;

    let mut perf: Vec<DepartmentPerformance> = rows
        .into_iter()
        .map(|r| DepartmentPerformance {
            department: r.name,
            member_count: r.member_count,
            late_count: r.late_count,
            total_records: r.total_records,
            late_rate: late_rate(r.late_count, r.total_records),
        })
        .collect();
    perf.sort_by(|a, b| b.late_rate.total_cmp(&a.late_rate));

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": perf })))
}

/// lates over the total record count in range, absences included.
fn late_rate(lates: i64, total_records: i64) -> f64 {
    if total_records == 0 {
        0.0
    } else {
        round4(lates as f64 / total_records as f64)
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ScorecardQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub user_id: Option<u64>,
    pub department: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ScorecardRow {
    user_id: u64,
    full_name: String,
    personnel_code: Option<String>,
    late_count: i64,
    absent_count: i64,
    total_hours: Option<f64>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScorecardEntry {
    pub user_id: u64,
    pub full_name: String,
    pub personnel_code: Option<String>,
    pub late_count: i64,
    /// Unjustified absences only.
    pub absent_count: i64,
    pub total_work_hours: f64,
    /// 100 minus 2 per late minus 5 per unjustified absence.
    pub score: i64,
}

/// Per-user discipline scores, worst first
#[utoipa::path(
    get,
    path = "/api/reports/scorecard",
    params(ScorecardQuery),
    responses((status = 200, description = "Scorecard entries sorted ascending", body = [ScorecardEntry])),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn scorecard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ScorecardQuery>,
) -> Result<impl Responder, AppError> {
    auth.require_any(&[Role::Admin, Role::Officer])?;

    let mut filters = WhereClause::new();
    filters.push("u.is_active = ?", SqlValue::Bool(true));
    if let Some(user_id) = query.user_id {
        filters.push("u.id = ?", SqlValue::U64(user_id));
    }
    if let Some(dept) = query.department.as_deref().filter(|d| *d != "all") {
        filters.push(
            "JSON_CONTAINS(u.departments, JSON_QUOTE(?))",
            SqlValue::Str(dept.to_string()),
        );
    }

    // The range placeholders sit in the join clause, so their values bind
    // ahead of the WHERE values.
    let mut join_values: Vec<SqlValue> = Vec::new();
    let mut range_sql = String::new();
    if let (Some(start), Some(end)) = (&query.start_date, &query.end_date) {
        range_sql.push_str(" AND a.date >= ? AND a.date <= ?");
        join_values.push(SqlValue::Str(start.clone()));
        join_values.push(SqlValue::Str(end.clone()));
    }

    let sql = format!(
        r#"
        SELECT u.id AS user_id, u.full_name, u.personnel_code,
               CAST(COUNT(CASE WHEN a.status = 'late' THEN 1 END) AS SIGNED) AS late_count,
               CAST(COUNT(CASE WHEN a.status = 'absent' AND NOT a.is_justified THEN 1 END) AS SIGNED) AS absent_count,
               SUM(CASE WHEN a.check_in IS NOT NULL AND a.check_out IS NOT NULL
                        THEN TIMESTAMPDIFF(SECOND, a.check_in, a.check_out) END) / 3600.0 AS total_hours
        FROM users u
        LEFT JOIN attendance a ON a.user_id = u.id{range_sql}
        {}
        GROUP BY u.id, u.full_name, u.personnel_code
        "#,
        filters.to_sql()
    );

    let query_builder = bind_values(sqlx::query_as::<_, ScorecardRow>(&sql), &join_values);
    let rows = bind_values(query_builder, filters.values())
        .fetch_all(pool.get_ref())
        .await?;

    let mut entries: Vec<ScorecardEntry> = rows
        .into_iter()
        .map(|r| ScorecardEntry {
            user_id: r.user_id,
            full_name: r.full_name,
            personnel_code: r.personnel_code,
            late_count: r.late_count,
            absent_count: r.absent_count,
            total_work_hours: round2(r.total_hours.unwrap_or(0.0)),
            score: attendance_score(r.late_count, r.absent_count),
        })
        .collect();
    entries.sort_by_key(|e| e.score);

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": entries })))
}

fn attendance_score(lates: i64, absents: i64) -> i64 {
    100 - 2 * lates - 5 * absents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_penalizes_lates_and_absents() {
        assert_eq!(attendance_score(0, 0), 100);
        assert_eq!(attendance_score(3, 0), 94);
        assert_eq!(attendance_score(0, 2), 90);
        assert_eq!(attendance_score(10, 20), -20);
    }

    #[test]
    fn late_rate_divides_by_all_records() {
        // 2 lates out of 10 records is 0.2 regardless of how many of the
        // remaining records are absences.
        assert_eq!(late_rate(2, 10), 0.2);
        assert_eq!(late_rate(1, 3), 0.3333);
        assert_eq!(late_rate(0, 7), 0.0);
    }

    #[test]
    fn late_rate_handles_empty_departments() {
        assert_eq!(late_rate(0, 0), 0.0);
        assert_eq!(late_rate(5, 0), 0.0);
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(round2(7.12549), 7.13);
        assert_eq!(round4(0.123456), 0.1235);
    }
}
