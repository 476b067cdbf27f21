use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::{AppError, db_error};
use crate::model::department::Department;
use crate::utils::department_cache;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentReq {
    #[schema(example = "Computer Engineering")]
    pub name: String,
    pub description: Option<String>,
}

fn normalized_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::validation("Department name must not be empty"));
    }
    Ok(name.to_string())
}

/// Create a department
#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = DepartmentReq,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 409, description = "Name already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Departments"
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<DepartmentReq>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let name = normalized_name(&payload.name)?;

    let result = sqlx::query("INSERT INTO departments (name, description) VALUES (?, ?)")
        .bind(&name)
        .bind(&payload.description)
        .execute(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "A department with this name already exists"))?;

    let department =
        sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
            .bind(result.last_insert_id())
            .fetch_one(pool.get_ref())
            .await?;

    department_cache::mark_known(&name).await;

    Ok(HttpResponse::Created().json(json!({ "success": true, "data": department })))
}

/// All departments, name ascending
#[utoipa::path(
    get,
    path = "/api/departments",
    responses((status = 200, description = "Departments", body = [Department])),
    security(("bearer_auth" = [])),
    tag = "Departments"
)]
pub async fn list_departments(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<impl Responder, AppError> {
    let departments =
        sqlx::query_as::<_, Department>("SELECT * FROM departments ORDER BY name ASC")
            .fetch_all(pool.get_ref())
            .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": departments })))
}

/// One department by id
#[utoipa::path(
    get,
    path = "/api/departments/{id}",
    params(("id" = u64, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Department", body = Department),
        (status = 404, description = "Department not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Departments"
)]
pub async fn get_department(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<impl Responder, AppError> {
    let department = sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
        .bind(path.into_inner())
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Department not found"))?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": department })))
}

/// Rename a department
#[utoipa::path(
    put,
    path = "/api/departments/{id}",
    params(("id" = u64, Path, description = "Department ID")),
    request_body = DepartmentReq,
    responses(
        (status = 200, description = "Department renamed", body = Department),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Name already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Departments"
)]
pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<DepartmentReq>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let id = path.into_inner();
    let name = normalized_name(&payload.name)?;

    let old_name = sqlx::query_scalar::<_, String>("SELECT name FROM departments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Department not found"))?;

    sqlx::query("UPDATE departments SET name = ?, description = COALESCE(?, description) WHERE id = ?")
        .bind(&name)
        .bind(&payload.description)
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "A department with this name already exists"))?;

    // Users still reference the old string; keep membership lookups honest.
    sqlx::query(
        r#"
        UPDATE users
        SET departments = JSON_REPLACE(
            departments,
            JSON_UNQUOTE(JSON_SEARCH(departments, 'one', ?)),
            ?
        )
        WHERE JSON_CONTAINS(departments, JSON_QUOTE(?))
        "#,
    )
    .bind(&old_name)
    .bind(&name)
    .bind(&old_name)
    .execute(pool.get_ref())
    .await?;

    department_cache::forget(&old_name).await;
    department_cache::mark_known(&name).await;

    let department = sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
        .bind(id)
        .fetch_one(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": department })))
}

/// Delete a department with no remaining members
#[utoipa::path(
    delete,
    path = "/api/departments/{id}",
    params(("id" = u64, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 400, description = "Users are still assigned"),
        (status = 404, description = "Department not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Departments"
)]
pub async fn delete_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let id = path.into_inner();

    let name = sqlx::query_scalar::<_, String>("SELECT name FROM departments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Department not found"))?;

    let assigned = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE JSON_CONTAINS(departments, JSON_QUOTE(?))",
    )
    .bind(&name)
    .fetch_one(pool.get_ref())
    .await?;

    if assigned > 0 {
        return Err(AppError::validation(format!(
            "Cannot delete department: {assigned} user(s) are still assigned to it"
        )));
    }

    sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    department_cache::forget(&name).await;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Department deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_non_empty() {
        assert_eq!(normalized_name("  Education ").unwrap(), "Education");
        assert!(normalized_name("   ").is_err());
        assert!(normalized_name("").is_err());
    }
}
