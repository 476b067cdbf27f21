use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::notification::{NewNotification, Notification};
use crate::models::{Page, page_params};
use crate::utils::db_utils::{SqlValue, WhereClause, bind_values, bind_values_scalar};

/// Fire-and-forget: a notification that fails to persist is logged and
/// dropped, never failing the operation that produced it.
pub async fn create_notification(pool: &MySqlPool, notification: NewNotification) {
    let result = sqlx::query(
        "INSERT INTO notifications (recipient_id, sender_id, type, message, link) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(notification.recipient_id)
    .bind(notification.sender_id)
    .bind(notification.kind)
    .bind(&notification.message)
    .bind(&notification.link)
    .execute(pool)
    .await;

    if let Err(e) = result {
        log::warn!(
            "failed to create {} notification for user {}: {e}",
            notification.kind,
            notification.recipient_id
        );
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsQuery {
    /// `unread`, `read`, or `all` (default).
    pub filter: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// The caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationsQuery),
    responses((status = 200, description = "Notification page", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn my_notifications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<NotificationsQuery>,
) -> Result<impl Responder, AppError> {
    let (page, limit, offset) = page_params(query.page, query.limit);

    let mut filters = WhereClause::new();
    filters.push("recipient_id = ?", SqlValue::U64(auth.user_id));
    match query.filter.as_deref() {
        Some("unread") => filters.push("is_read = ?", SqlValue::Bool(false)),
        Some("read") => filters.push("is_read = ?", SqlValue::Bool(true)),
        _ => {}
    }

    let count_sql = format!("SELECT COUNT(*) FROM notifications{}", filters.to_sql());
    let total = bind_values_scalar(sqlx::query_scalar::<_, i64>(&count_sql), filters.values())
        .fetch_one(pool.get_ref())
        .await?;

    let unread = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND is_read = FALSE",
    )
    .bind(auth.user_id)
    .fetch_one(pool.get_ref())
    .await?;

    let data_sql = format!(
        "SELECT * FROM notifications{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        filters.to_sql()
    );
    let docs = bind_values(sqlx::query_as::<_, Notification>(&data_sql), filters.values())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": Page::new(docs, total, page, limit),
        "unreadCount": unread,
    })))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadReq {
    /// Explicit ids, or omitted to mark every unread notification.
    pub ids: Option<Vec<u64>>,
}

/// Mark notifications as read
#[utoipa::path(
    post,
    path = "/api/notifications/mark-read",
    request_body = MarkReadReq,
    responses((status = 200, description = "Count of notifications marked")),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn mark_as_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<MarkReadReq>,
) -> Result<impl Responder, AppError> {
    let marked = match &payload.ids {
        Some(ids) if !ids.is_empty() => {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "UPDATE notifications SET is_read = TRUE WHERE recipient_id = ? AND id IN ({placeholders})"
            );
            let mut q = sqlx::query(&sql).bind(auth.user_id);
            for id in ids {
                q = q.bind(*id);
            }
            q.execute(pool.get_ref()).await?.rows_affected()
        }
        Some(_) => 0,
        None => {
            sqlx::query(
                "UPDATE notifications SET is_read = TRUE WHERE recipient_id = ? AND is_read = FALSE",
            )
            .bind(auth.user_id)
            .execute(pool.get_ref())
            .await?
            .rows_affected()
        }
    };

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": { "marked": marked } })))
}

/// Delete one notification
#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(("id" = u64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Deleted (also for already-gone ids)"),
        (status = 403, description = "Not the recipient")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn delete_notification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();

    let recipient = sqlx::query_scalar::<_, u64>(
        "SELECT recipient_id FROM notifications WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await?;

    match recipient {
        // Deleting something already gone is a success, not an error.
        None => {}
        Some(recipient_id) if recipient_id == auth.user_id || auth.is_admin() => {
            sqlx::query("DELETE FROM notifications WHERE id = ?")
                .bind(id)
                .execute(pool.get_ref())
                .await?;
        }
        Some(_) => {
            return Err(AppError::forbidden(
                "You are not allowed to delete this notification",
            ));
        }
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Notification deleted" })))
}
