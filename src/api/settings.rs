use std::collections::HashMap;

use actix_web::{HttpResponse, Responder, web};
use serde_json::{Map, Value, json};
use sqlx::MySqlPool;
use sqlx::types::Json;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::utils::settings_cache;

/// Branding keys safe to expose without authentication; the login page
/// renders these before anyone signs in.
const PUBLIC_KEYS: &[&str] = &["university_name", "title", "logo_path"];

const KNOWN_KEYS: &[&str] = &[
    "work_start_time",
    "work_end_time",
    "late_threshold_time",
    "working_days",
    "officer_edit_time_limit",
    "university_name",
    "title",
    "logo_path",
];

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper_next = false;
    for c in snake.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// All settings as a key/value map
#[utoipa::path(
    get,
    path = "/api/settings",
    responses((status = 200, description = "Settings map", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
pub async fn get_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;

    let map = settings_cache::fetch_all(pool.get_ref())
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;

    // Policy keys answer with their effective defaults even when no row
    // exists yet; branding keys appear only once stored.
    let effective = settings_cache::AppSettings::from_map(&map);
    let mut data = Map::new();
    data.insert("workStartTime".into(), json!(effective.work_start_time));
    data.insert("workEndTime".into(), json!(effective.work_end_time));
    data.insert(
        "lateThresholdTime".into(),
        json!(effective.late_threshold_time),
    );
    data.insert("workingDays".into(), json!(effective.working_days));
    data.insert(
        "officerEditTimeLimit".into(),
        json!(effective.officer_edit_time_limit),
    );
    for key in PUBLIC_KEYS {
        if let Some(value) = map.get(*key) {
            data.insert(camel_case(key), value.clone());
        }
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
}

/// Upsert settings pairs, then reload the process-wide cache
#[utoipa::path(
    put,
    path = "/api/settings",
    request_body = Object,
    responses(
        (status = 200, description = "Settings saved"),
        (status = 400, description = "Unknown settings key")
    ),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
pub async fn update_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<HashMap<String, Value>>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let pairs = payload.into_inner();

    if pairs.is_empty() {
        return Err(AppError::validation("No settings provided"));
    }
    if let Some(unknown) = pairs.keys().find(|k| !KNOWN_KEYS.contains(&k.as_str())) {
        return Err(AppError::validation(format!(
            "Unknown settings key: {unknown}"
        )));
    }

    for (key, value) in &pairs {
        sqlx::query(
            "INSERT INTO settings (`key`, value) VALUES (?, ?) ON DUPLICATE KEY UPDATE value = VALUES(value)",
        )
        .bind(key)
        .bind(Json(value))
        .execute(pool.get_ref())
        .await?;
    }

    // Readers see the new values only after this completes; a brief stale
    // window during the write is acceptable.
    settings_cache::reload(pool.get_ref())
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Settings saved" })))
}

/// Public branding subset of the settings, no authentication required
#[utoipa::path(
    get,
    path = "/settings/public",
    responses((status = 200, description = "Public settings map", body = Object)),
    tag = "Settings"
)]
pub async fn public_settings(pool: web::Data<MySqlPool>) -> Result<impl Responder, AppError> {
    let map = settings_cache::fetch_all(pool.get_ref())
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;

    let mut data = Map::new();
    for key in PUBLIC_KEYS {
        if let Some(value) = map.get(*key) {
            data.insert(camel_case(key), value.clone());
        }
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_keys_become_camel() {
        assert_eq!(camel_case("work_start_time"), "workStartTime");
        assert_eq!(camel_case("university_name"), "universityName");
        assert_eq!(camel_case("title"), "title");
    }

    #[test]
    fn public_keys_are_a_subset_of_known_keys() {
        for key in PUBLIC_KEYS {
            assert!(KNOWN_KEYS.contains(key));
        }
    }
}
