use actix_web::cookie::{Cookie, SameSite, time::Duration as CookieDuration};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use sqlx::types::Json;
use tracing::info;
use utoipa::ToSchema;

use crate::auth::jwt::{generate_access_token, generate_refresh_token, verify_token};
use crate::auth::password::verify_password;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::TokenType;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginReq {
    /// Personnel code (staff-class) or national code (faculty-class).
    #[schema(example = "EMP-1042")]
    pub identifier: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReq {
    pub refresh_token: Option<String>,
}

#[derive(sqlx::FromRow)]
struct LoginRow {
    id: u64,
    full_name: String,
    password: String,
    roles: Json<Vec<Role>>,
}

fn auth_cookie(name: &'static str, value: String, max_age_secs: usize) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(max_age_secs as i64))
        .finish()
}

/// Login with an identity code and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Authenticated; tokens set as cookies and returned"),
        (status = 401, description = "Unknown identifier or wrong password")
    ),
    tag = "Auth"
)]
pub async fn login(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<LoginReq>,
) -> Result<impl Responder, AppError> {
    let identifier = payload.identifier.trim();
    if identifier.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation(
            "Identifier and password must not be empty",
        ));
    }

    let user = sqlx::query_as::<_, LoginRow>(
        r#"
        SELECT id, full_name, password, roles
        FROM users
        WHERE (personnel_code = ? OR national_code = ?) AND is_active = TRUE
        "#,
    )
    .bind(identifier)
    .bind(identifier)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::unauthorized("Invalid credentials"))?;

    if !verify_password(&payload.password, &user.password) {
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let roles = user.roles.0;
    let access = generate_access_token(
        user.id,
        user.full_name.clone(),
        roles.clone(),
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| AppError::internal(e.to_string()))?;
    let refresh = generate_refresh_token(
        user.id,
        user.full_name.clone(),
        roles.clone(),
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| AppError::internal(e.to_string()))?;

    info!(user_id = user.id, "user logged in");

    Ok(HttpResponse::Ok()
        .cookie(auth_cookie("access_token", access.clone(), config.access_token_ttl))
        .cookie(auth_cookie(
            "refresh_token",
            refresh.clone(),
            config.refresh_token_ttl,
        ))
        .json(json!({
            "success": true,
            "data": {
                "accessToken": access,
                "refreshToken": refresh,
                "user": {
                    "id": user.id,
                    "fullName": user.full_name,
                    "roles": roles,
                }
            }
        })))
}

/// Exchange a refresh token for a fresh access token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshReq,
    responses(
        (status = 200, description = "New access token issued"),
        (status = 401, description = "Missing, invalid or non-refresh token")
    ),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    config: web::Data<Config>,
    payload: Option<web::Json<RefreshReq>>,
) -> Result<impl Responder, AppError> {
    let token = payload
        .and_then(|p| p.refresh_token.clone())
        .or_else(|| req.cookie("refresh_token").map(|c| c.value().to_string()))
        .ok_or_else(|| AppError::unauthorized("Missing refresh token"))?;

    let claims = verify_token(&token, &config.jwt_secret)
        .map_err(|_| AppError::unauthorized("Invalid or expired refresh token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::unauthorized("Not a refresh token"));
    }

    let access = generate_access_token(
        claims.user_id,
        claims.sub,
        claims.roles,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| AppError::internal(e.to_string()))?;

    Ok(HttpResponse::Ok()
        .cookie(auth_cookie("access_token", access.clone(), config.access_token_ttl))
        .json(json!({
            "success": true,
            "data": { "accessToken": access }
        })))
}

/// Clear the auth cookies
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 200, description = "Cookies cleared")),
    tag = "Auth"
)]
pub async fn logout() -> impl Responder {
    let expire = |name: &'static str| {
        let mut cookie = Cookie::build(name, "").path("/").http_only(true).finish();
        cookie.make_removal();
        cookie
    };

    HttpResponse::Ok()
        .cookie(expire("access_token"))
        .cookie(expire("refresh_token"))
        .json(json!({ "success": true, "message": "Logged out" }))
}
