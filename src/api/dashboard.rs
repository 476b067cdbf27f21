use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::STAFF_CLASS;
use crate::utils::calendar;
use crate::utils::db_utils::{SqlValue, WhereClause, bind_values};
use crate::utils::ml;

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn staff_roles_json() -> String {
    serde_json::to_string(&STAFF_CLASS).unwrap_or_else(|_| "[]".to_string())
}

fn range_filters(range: &Option<(String, String)>) -> WhereClause {
    let mut filters = WhereClause::new();
    if let Some((start, end)) = range {
        filters.push_many(
            "a.date >= ? AND a.date <= ?",
            vec![SqlValue::Str(start.clone()), SqlValue::Str(end.clone())],
        );
    }
    filters
}

#[derive(sqlx::FromRow)]
struct KpiRow {
    total_records: i64,
    late_count: i64,
    justified_count: i64,
    avg_hours: Option<f64>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardKpis {
    pub total_records: i64,
    pub late_count: i64,
    pub justified_count: i64,
    pub average_work_hours: f64,
    /// Share of all records that were not late, whole percent; 100 when
    /// there are no records.
    pub on_time_percentage: i64,
    pub active_staff_count: i64,
}

fn on_time_percentage(total_records: i64, late_count: i64) -> i64 {
    if total_records == 0 {
        100
    } else {
        ((total_records - late_count) as f64 / total_records as f64 * 100.0).round() as i64
    }
}

async fn kpis(
    pool: &MySqlPool,
    range: &Option<(String, String)>,
) -> Result<DashboardKpis, AppError> {
    let filters = range_filters(range);
    let sql = format!(
        r#"
        SELECT CAST(COUNT(*) AS SIGNED) AS total_records,
               CAST(COALESCE(SUM(a.status = 'late'), 0) AS SIGNED) AS late_count,
               CAST(COALESCE(SUM(a.is_justified), 0) AS SIGNED) AS justified_count,
               AVG(CASE WHEN a.check_in IS NOT NULL AND a.check_out IS NOT NULL
                        THEN TIMESTAMPDIFF(SECOND, a.check_in, a.check_out) END) / 3600.0 AS avg_hours
        FROM attendance a{}
        "#,
        filters.to_sql()
    );
    let row = bind_values(sqlx::query_as::<_, KpiRow>(&sql), filters.values())
        .fetch_one(pool)
        .await?;

    let active_staff = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE is_active = TRUE AND JSON_OVERLAPS(roles, ?)",
    )
    .bind(staff_roles_json())
    .fetch_one(pool)
    .await?;

    Ok(DashboardKpis {
        total_records: row.total_records,
        late_count: row.late_count,
        justified_count: row.justified_count,
        average_work_hours: ((row.avg_hours.unwrap_or(0.0)) * 100.0).round() / 100.0,
        on_time_percentage: on_time_percentage(row.total_records, row.late_count),
        active_staff_count: active_staff,
    })
}

#[derive(sqlx::FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    #[schema(example = "1403/05/01")]
    pub date: String,
    pub present_count: i64,
    pub late_count: i64,
}

async fn daily_series(
    pool: &MySqlPool,
    range: &Option<(String, String)>,
) -> Result<Vec<DailyPoint>, AppError> {
    let filters = range_filters(range);
    let sql = format!(
        r#"
        SELECT a.date,
               CAST(SUM(a.status = 'present') AS SIGNED) AS present_count,
               CAST(SUM(a.status = 'late') AS SIGNED) AS late_count
        FROM attendance a{}
        GROUP BY a.date
        ORDER BY a.date ASC
        "#,
        filters.to_sql()
    );
    let points = bind_values(sqlx::query_as::<_, DailyPoint>(&sql), filters.values())
        .fetch_all(pool)
        .await?;
    Ok(points)
}

#[derive(sqlx::FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentLate {
    pub department: String,
    pub late_count: i64,
}

async fn top_late_departments(
    pool: &MySqlPool,
    range: &Option<(String, String)>,
) -> Result<Vec<DepartmentLate>, AppError> {
    let mut filters = range_filters(range);
    filters.push("a.status = ?", SqlValue::Str("late".to_string()));
    let sql = format!(
        r#"
        SELECT d.name AS department, CAST(COUNT(*) AS SIGNED) AS late_count
        FROM attendance a
        JOIN users u ON u.id = a.user_id
        JOIN departments d ON JSON_CONTAINS(u.departments, JSON_QUOTE(d.name))
        {}
        GROUP BY d.name
        ORDER BY late_count DESC
        LIMIT 5
        "#,
        filters.to_sql()
    );
    let rows = bind_values(sqlx::query_as::<_, DepartmentLate>(&sql), filters.values())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

#[derive(sqlx::FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerformerEntry {
    pub user_id: u64,
    pub full_name: String,
    pub late_count: i64,
}

async fn performers(
    pool: &MySqlPool,
    range: &Option<(String, String)>,
    best: bool,
) -> Result<Vec<PerformerEntry>, AppError> {
    let filters = range_filters(range);
    let (having, order) = if best {
        ("HAVING late_count <= 1", "ASC")
    } else {
        ("HAVING late_count >= 3", "DESC")
    };
    let sql = format!(
        r#"
        SELECT u.id AS user_id, u.full_name,
               CAST(SUM(a.status = 'late') AS SIGNED) AS late_count
        FROM attendance a
        JOIN users u ON u.id = a.user_id
        {}
        GROUP BY u.id, u.full_name
        {having}
        ORDER BY late_count {order}, u.full_name ASC
        LIMIT 5
        "#,
        filters.to_sql()
    );
    let rows = bind_values(sqlx::query_as::<_, PerformerEntry>(&sql), filters.values())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

#[derive(sqlx::FromRow)]
struct LateTodayRow {
    user_id: u64,
    full_name: String,
    check_in: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LateArrival {
    pub user_id: u64,
    pub full_name: String,
    /// Local wall-clock arrival, `HH:mm`.
    #[schema(example = "08:47")]
    pub check_in_time: String,
}

async fn todays_late_arrivals(
    pool: &MySqlPool,
    today: &str,
    offset: FixedOffset,
) -> Result<Vec<LateArrival>, AppError> {
    let rows = sqlx::query_as::<_, LateTodayRow>(
        r#"
        SELECT u.id AS user_id, u.full_name, a.check_in
        FROM attendance a
        JOIN users u ON u.id = a.user_id
        WHERE a.date = ? AND a.status = 'late'
        ORDER BY a.check_in ASC
        "#,
    )
    .bind(today)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| LateArrival {
            user_id: r.user_id,
            full_name: r.full_name,
            check_in_time: r
                .check_in
                .map(|t| calendar::local_hhmm(t, offset))
                .unwrap_or_default(),
        })
        .collect())
}

#[derive(sqlx::FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AbsentStaff {
    pub user_id: u64,
    pub full_name: String,
    pub personnel_code: Option<String>,
}

async fn absent_staff_today(pool: &MySqlPool, today: &str) -> Result<Vec<AbsentStaff>, AppError> {
    let rows = sqlx::query_as::<_, AbsentStaff>(
        r#"
        SELECT u.id AS user_id, u.full_name, u.personnel_code
        FROM users u
        WHERE u.is_active = TRUE
          AND JSON_OVERLAPS(u.roles, ?)
          AND NOT EXISTS (SELECT 1 FROM attendance a WHERE a.user_id = u.id AND a.date = ?)
        ORDER BY u.full_name ASC
        "#,
    )
    .bind(staff_roles_json())
    .bind(today)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// One subprocess failing must not fail the dashboard; the section carries
/// its own error marker instead.
fn ml_section(result: Result<Value, AppError>) -> Value {
    match result {
        Ok(data) => json!({ "data": data }),
        Err(e) => {
            log::warn!("dashboard ML section failed: {e}");
            json!({ "error": e.to_string() })
        }
    }
}

/// Aggregated admin dashboard
#[utoipa::path(
    get,
    path = "/api/dashboard",
    params(DashboardQuery),
    responses((status = 200, description = "Dashboard sections", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<DashboardQuery>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;

    let range = match (&query.start_date, &query.end_date) {
        (Some(s), Some(e)) => Some((s.clone(), e.clone())),
        _ => None,
    };
    let offset = calendar::offset_from_minutes(config.local_offset_minutes);
    let today = calendar::today_key(offset);

    let pool = pool.get_ref();
    let (
        kpis,
        series,
        late_departments,
        best_performers,
        risky_performers,
        late_today,
        absent_today,
        anomalies,
        clusters,
    ) = tokio::join!(
        kpis(pool, &range),
        daily_series(pool, &range),
        top_late_departments(pool, &range),
        performers(pool, &range, true),
        performers(pool, &range, false),
        todays_late_arrivals(pool, &today, offset),
        absent_staff_today(pool, &today),
        ml::daily_anomalies(config.get_ref(), &today),
        ml::employee_clusters(config.get_ref()),
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": {
            "kpis": kpis?,
            "dailyTrend": series?,
            "topLateDepartments": late_departments?,
            "bestPerformers": best_performers?,
            "riskyPerformers": risky_performers?,
            "lateToday": late_today?,
            "absentToday": absent_today?,
            "anomalies": ml_section(anomalies),
            "clusters": ml_section(clusters),
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_time_counts_every_non_late_record() {
        // Absences are not lates: 2 lates out of 10 records is 80%.
        assert_eq!(on_time_percentage(10, 2), 80);
        assert_eq!(on_time_percentage(3, 3), 0);
        assert_eq!(on_time_percentage(7, 0), 100);
    }

    #[test]
    fn empty_range_is_fully_on_time() {
        assert_eq!(on_time_percentage(0, 0), 100);
    }

    #[test]
    fn failed_ml_section_carries_an_error_marker() {
        let section = ml_section(Err(crate::error::AppError::internal("boom")));
        assert!(section.get("error").is_some());
        assert!(section.get("data").is_none());

        let ok = ml_section(Ok(json!([1, 2])));
        assert_eq!(ok.get("data"), Some(&json!([1, 2])));
    }
}
