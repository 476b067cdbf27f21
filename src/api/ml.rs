use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::utils::calendar;
use crate::utils::ml;
use crate::utils::scheduler::TRAINING_SCRIPTS;

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AnomaliesQuery {
    /// Calendar day to analyze, `YYYY/MM/DD`.
    pub date: String,
}

/// Anomalous attendance patterns for one day
#[utoipa::path(
    get,
    path = "/api/ml/anomalies",
    params(AnomaliesQuery),
    responses(
        (status = 200, description = "Anomaly report", body = Object),
        (status = 400, description = "Missing or malformed date"),
        (status = 500, description = "Detection script failed")
    ),
    security(("bearer_auth" = [])),
    tag = "ML"
)]
pub async fn anomalies(
    auth: AuthUser,
    config: web::Data<Config>,
    query: web::Query<AnomaliesQuery>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    calendar::parse_day_key(&query.date)?;

    let data = ml::daily_anomalies(config.get_ref(), &query.date).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
}

/// Behavioral clusters over the whole history
#[utoipa::path(
    get,
    path = "/api/ml/clusters",
    responses(
        (status = 200, description = "Cluster assignments", body = Object),
        (status = 500, description = "Clustering script failed")
    ),
    security(("bearer_auth" = [])),
    tag = "ML"
)]
pub async fn clusters(
    auth: AuthUser,
    config: web::Data<Config>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let data = ml::employee_clusters(config.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
}

/// Retrain both models on demand
#[utoipa::path(
    post,
    path = "/api/ml/train",
    responses(
        (status = 200, description = "Training output per script"),
        (status = 500, description = "A training script failed")
    ),
    security(("bearer_auth" = [])),
    tag = "ML"
)]
pub async fn train(auth: AuthUser, config: web::Data<Config>) -> Result<impl Responder, AppError> {
    auth.require_admin()?;

    let mut outputs = Vec::with_capacity(TRAINING_SCRIPTS.len());
    for script in TRAINING_SCRIPTS {
        let output = ml::run_training(config.get_ref(), script)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?;
        outputs.push(json!({ "script": script, "output": output.trim() }));
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": outputs })))
}
