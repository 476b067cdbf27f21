use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use sqlx::types::Json;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, db_error};
use crate::model::notification::{NewNotification, NotificationType};
use crate::model::role::{self, Role};
use crate::model::user::User;
use crate::models::{Page, page_params};
use crate::utils::db_utils::{SqlValue, WhereClause, bind_values, bind_values_scalar};
use crate::utils::department_cache;

use super::notification::create_notification;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserReq {
    #[schema(example = "John Doe")]
    pub full_name: String,
    pub personnel_code: Option<String>,
    pub national_code: Option<String>,
    pub password: String,
    #[schema(value_type = Vec<String>, example = json!(["officer"]))]
    pub roles: Vec<Role>,
    #[schema(value_type = Vec<String>, example = json!(["Education"]))]
    pub departments: Vec<String>,
    pub room_location: Option<String>,
    pub phone_number: Option<String>,
}

/// Staff-class users identify by personnel code, faculty-class by national
/// code; a user holding roles from both classes needs both.
async fn validate_identity(
    pool: &MySqlPool,
    roles: &[Role],
    personnel_code: &Option<String>,
    national_code: &Option<String>,
    departments: &[String],
) -> Result<(), AppError> {
    if roles.is_empty() {
        return Err(AppError::validation("At least one role is required"));
    }
    if role::is_staff_class(roles) && personnel_code.is_none() {
        return Err(AppError::validation(
            "A personnel code is required for staff roles",
        ));
    }
    if role::is_faculty_class(roles) && national_code.is_none() {
        return Err(AppError::validation(
            "A national code is required for faculty roles",
        ));
    }
    if let Some(unknown) = department_cache::find_unknown(pool, departments)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?
    {
        return Err(AppError::validation(format!(
            "Unknown department: {unknown}"
        )));
    }
    Ok(())
}

/// Pre-checks the unique code columns so the caller gets a code-specific
/// message; the unique indexes still arbitrate races.
async fn check_code_conflicts(
    pool: &MySqlPool,
    personnel_code: &Option<String>,
    national_code: &Option<String>,
    exclude_id: Option<u64>,
) -> Result<(), AppError> {
    let exclude = exclude_id.unwrap_or(0);
    if let Some(code) = personnel_code {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE personnel_code = ? AND id != ?)",
        )
        .bind(code)
        .bind(exclude)
        .fetch_one(pool)
        .await?;
        if taken {
            return Err(AppError::conflict("This personnel code is already in use"));
        }
    }
    if let Some(code) = national_code {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE national_code = ? AND id != ?)",
        )
        .bind(code)
        .bind(exclude)
        .fetch_one(pool)
        .await?;
        if taken {
            return Err(AppError::conflict("This national code is already in use"));
        }
    }
    Ok(())
}

async fn load_user(pool: &MySqlPool, id: u64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Missing identity code or unknown department"),
        (status = 409, description = "Identity code already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateUserReq>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let req = payload.into_inner();

    if req.password.len() < 8 {
        return Err(AppError::validation(
            "Password must be at least 8 characters",
        ));
    }
    validate_identity(
        pool.get_ref(),
        &req.roles,
        &req.personnel_code,
        &req.national_code,
        &req.departments,
    )
    .await?;
    check_code_conflicts(pool.get_ref(), &req.personnel_code, &req.national_code, None).await?;

    let hashed = hash_password(&req.password);

    let result = sqlx::query(
        r#"
        INSERT INTO users (full_name, personnel_code, national_code, password,
                           roles, departments, room_location, phone_number)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&req.full_name)
    .bind(&req.personnel_code)
    .bind(&req.national_code)
    .bind(&hashed)
    .bind(Json(&req.roles))
    .bind(Json(&req.departments))
    .bind(&req.room_location)
    .bind(&req.phone_number)
    .execute(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "An identity code is already in use"))?;

    let user = load_user(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(json!({ "success": true, "data": user })))
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    /// Restrict to users holding this role; `all` disables the filter.
    pub role: Option<String>,
    pub department: Option<String>,
    /// Matches name and identity codes.
    pub search: Option<String>,
    /// `all` includes deactivated users.
    pub is_active: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Filterable user listing, paginated
#[utoipa::path(
    get,
    path = "/api/users",
    params(ListUsersQuery),
    responses((status = 200, description = "User page", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ListUsersQuery>,
) -> Result<impl Responder, AppError> {
    auth.require_any(&[Role::Admin, Role::Officer])?;
    let (page, limit, offset) = page_params(query.page, query.limit);

    let mut filters = WhereClause::new();
    if let Some(role) = query.role.as_deref().filter(|r| *r != "all") {
        filters.push(
            "JSON_CONTAINS(roles, JSON_QUOTE(?))",
            SqlValue::Str(role.to_string()),
        );
    }
    if let Some(dept) = query.department.as_deref().filter(|d| *d != "all") {
        filters.push(
            "JSON_CONTAINS(departments, JSON_QUOTE(?))",
            SqlValue::Str(dept.to_string()),
        );
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        filters.push_many(
            "(full_name LIKE ? OR personnel_code LIKE ? OR national_code LIKE ?)",
            vec![
                SqlValue::Str(pattern.clone()),
                SqlValue::Str(pattern.clone()),
                SqlValue::Str(pattern),
            ],
        );
    }
    if query.is_active.as_deref() != Some("all") {
        filters.push("is_active = ?", SqlValue::Bool(true));
    }

    let count_sql = format!("SELECT COUNT(*) FROM users{}", filters.to_sql());
    let total = bind_values_scalar(sqlx::query_scalar::<_, i64>(&count_sql), filters.values())
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT * FROM users{} ORDER BY full_name ASC LIMIT ? OFFSET ?",
        filters.to_sql()
    );
    let docs = bind_values(sqlx::query_as::<_, User>(&data_sql), filters.values())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": Page::new(docs, total, page, limit),
    })))
}

/// The caller's own profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses((status = 200, description = "Profile", body = User)),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn my_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<impl Responder, AppError> {
    let user = load_user(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": user })))
}

/// One user by id
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<impl Responder, AppError> {
    auth.require_any(&[Role::Admin, Role::Officer])?;
    let user = load_user(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": user })))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserReq {
    pub full_name: Option<String>,
    pub personnel_code: Option<String>,
    pub national_code: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    pub roles: Option<Vec<Role>>,
    #[schema(value_type = Option<Vec<String>>)]
    pub departments: Option<Vec<String>>,
    pub room_location: Option<String>,
    pub phone_number: Option<String>,
    pub is_active: Option<bool>,
}

/// Admin update of a user's profile
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User ID")),
    request_body = UpdateUserReq,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 404, description = "User not found"),
        (status = 409, description = "Identity code already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateUserReq>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let id = path.into_inner();
    let req = payload.into_inner();

    let mut user = load_user(pool.get_ref(), id).await?;

    let roles = req.roles.clone().unwrap_or_else(|| user.roles.0.clone());
    let personnel_code = req.personnel_code.clone().or_else(|| user.personnel_code.clone());
    let national_code = req.national_code.clone().or_else(|| user.national_code.clone());
    let departments = req
        .departments
        .clone()
        .unwrap_or_else(|| user.departments.0.clone());

    validate_identity(
        pool.get_ref(),
        &roles,
        &personnel_code,
        &national_code,
        &departments,
    )
    .await?;
    check_code_conflicts(pool.get_ref(), &req.personnel_code, &req.national_code, Some(id))
        .await?;

    let roles_changed = req.roles.as_ref().is_some_and(|r| *r != user.roles.0);

    if let Some(full_name) = req.full_name {
        user.full_name = full_name;
    }
    user.personnel_code = personnel_code;
    user.national_code = national_code;
    user.roles = Json(roles);
    user.departments = Json(departments);
    if let Some(room) = req.room_location {
        user.room_location = Some(room);
    }
    if let Some(phone) = req.phone_number {
        user.phone_number = Some(phone);
    }
    if let Some(active) = req.is_active {
        user.is_active = active;
    }

    sqlx::query(
        r#"
        UPDATE users
        SET full_name = ?, personnel_code = ?, national_code = ?, roles = ?,
            departments = ?, room_location = ?, phone_number = ?, is_active = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.full_name)
    .bind(&user.personnel_code)
    .bind(&user.national_code)
    .bind(Json(&user.roles.0))
    .bind(Json(&user.departments.0))
    .bind(&user.room_location)
    .bind(&user.phone_number)
    .bind(user.is_active)
    .bind(id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "An identity code is already in use"))?;

    if id != auth.user_id {
        let (kind, message) = if roles_changed {
            (
                NotificationType::RoleUpdated,
                format!("Your roles were updated by {}", auth.full_name),
            )
        } else {
            (
                NotificationType::ProfileUpdatedByAdmin,
                format!("Your profile was updated by {}", auth.full_name),
            )
        };
        create_notification(
            pool.get_ref(),
            NewNotification {
                recipient_id: id,
                sender_id: Some(auth.user_id),
                kind,
                message,
                link: Some("/profile".to_string()),
            },
        )
        .await;
    }

    let user = load_user(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": user })))
}

fn guard_self_delete(acting_id: u64, target_id: u64) -> Result<(), AppError> {
    if acting_id == target_id {
        return Err(AppError::validation("You cannot delete your own account"));
    }
    Ok(())
}

/// Delete a user together with their attendance and notification rows
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 400, description = "Attempted self-deletion"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let id = path.into_inner();
    guard_self_delete(auth.user_id, id)?;

    // Dependent rows first; attendance recorded FOR the user goes with the
    // account, records they entered for others keep a dangling recorded_by.
    let mut tx = pool.get_ref().begin().await?;
    sqlx::query("DELETE FROM notifications WHERE recipient_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM attendance WHERE user_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("User not found"));
    }
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "User deleted" })))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordReq {
    pub current_password: String,
    pub new_password: String,
}

/// Change the caller's own password
#[utoipa::path(
    post,
    path = "/api/users/change-password",
    request_body = ChangePasswordReq,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Current password incorrect")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ChangePasswordReq>,
) -> Result<impl Responder, AppError> {
    if payload.new_password.len() < 8 {
        return Err(AppError::validation(
            "New password must be at least 8 characters",
        ));
    }

    let user = load_user(pool.get_ref(), auth.user_id).await?;
    if !verify_password(&payload.current_password, &user.password) {
        return Err(AppError::unauthorized("Current password is incorrect"));
    }

    let hashed = hash_password(&payload.new_password);
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;

    create_notification(
        pool.get_ref(),
        NewNotification {
            recipient_id: auth.user_id,
            sender_id: None,
            kind: NotificationType::PasswordChanged,
            message: "Your password was changed".to_string(),
            link: None,
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Password changed" })))
}

#[cfg(test)]
mod tests {
    use actix_web::ResponseError;
    use actix_web::http::StatusCode;

    use super::*;

    #[test]
    fn admins_cannot_delete_themselves() {
        let err = guard_self_delete(7, 7).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(guard_self_delete(7, 9).is_ok());
    }
}
