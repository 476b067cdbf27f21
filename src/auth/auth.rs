use actix_web::{FromRequest, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::{self, Role};
use crate::models::TokenType;

/// Authenticated caller, extracted from the `Authorization: Bearer`
/// header or the `access_token` cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub full_name: String,
    /// Multi-valued role set carried in the claims.
    pub roles: Vec<Role>,
}

fn bearer_or_cookie(req: &HttpRequest) -> Option<String> {
    if let Some(token) = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }
    req.cookie("access_token").map(|c| c.value().to_string())
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = match bearer_or_cookie(req) {
            Some(t) => t,
            None => return ready(Err(AppError::unauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(AppError::internal("Config missing"))),
        };

        let claims = match verify_token(&token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(AppError::unauthorized("Invalid or expired token"))),
        };

        if claims.token_type != TokenType::Access {
            return ready(Err(AppError::unauthorized("Not an access token")));
        }

        ready(Ok(AuthUser {
            user_id: claims.user_id,
            full_name: claims.sub,
            roles: claims.roles,
        }))
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }

    pub fn require_any(&self, required: &[Role]) -> Result<(), AppError> {
        if role::has_any(&self.roles, required) {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "You are not allowed to perform this operation",
            ))
        }
    }
}
