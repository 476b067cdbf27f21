use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Operational error carrying its HTTP status. The boundary layer
/// serializes every variant as `{success: false, message}`.
#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "{}", _0)]
    Validation(String),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "{}", _0)]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // Unexpected detail stays in the logs outside development builds.
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                if cfg!(debug_assertions) {
                    detail.clone()
                } else {
                    "Internal Server Error".to_string()
                }
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": message,
        }))
    }
}

// Duplicate unique key and foreign-key violations share SQLSTATE 23000;
// only the MySQL errno tells them apart.
const ER_DUP_ENTRY: u32 = 1062;
const ER_ROW_IS_REFERENCED: u32 = 1451;
const ER_NO_REFERENCED_ROW: u32 = 1452;

fn constraint_error(errno: u32, conflict_msg: &str) -> Option<AppError> {
    match errno {
        ER_DUP_ENTRY => Some(AppError::conflict(conflict_msg)),
        ER_ROW_IS_REFERENCED => Some(AppError::conflict(
            "Other records still reference this record",
        )),
        ER_NO_REFERENCED_ROW => {
            Some(AppError::validation("A referenced record does not exist"))
        }
        _ => None,
    }
}

/// Duplicate unique keys surface as Conflict so a concurrent double
/// check-in loses cleanly at the storage layer.
pub fn db_error(e: sqlx::Error, conflict_msg: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if let Some(mysql) = db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
            if let Some(mapped) = constraint_error(mysql.number().into(), conflict_msg) {
                return mapped;
            }
        }
    }
    if matches!(e, sqlx::Error::RowNotFound) {
        return AppError::not_found("Record not found");
    }
    AppError::internal(e.to_string())
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        db_error(e, "Duplicate record")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_kinds() {
        assert_eq!(
            AppError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn duplicate_key_and_fk_violations_map_differently() {
        let dup = constraint_error(1062, "Already checked in").unwrap();
        assert_eq!(dup.status_code(), StatusCode::CONFLICT);
        assert!(dup.to_string().contains("Already checked in"));

        let referenced = constraint_error(1451, "Already checked in").unwrap();
        assert_eq!(referenced.status_code(), StatusCode::CONFLICT);
        assert!(referenced.to_string().contains("reference"));

        let missing_parent = constraint_error(1452, "Already checked in").unwrap();
        assert_eq!(missing_parent.status_code(), StatusCode::BAD_REQUEST);

        // Lock timeouts and other engine errors fall through to Internal.
        assert!(constraint_error(1205, "x").is_none());
    }
}
