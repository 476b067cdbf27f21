use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::model::role::Role;
use crate::models::{Claims, TokenType};

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as usize
}

fn issue(
    user_id: u64,
    full_name: String,
    roles: Vec<Role>,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    let claims = Claims {
        user_id,
        sub: full_name,
        roles,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn generate_access_token(
    user_id: u64,
    full_name: String,
    roles: Vec<Role>,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    issue(user_id, full_name, roles, TokenType::Access, secret, ttl)
}

pub fn generate_refresh_token(
    user_id: u64,
    full_name: String,
    roles: Vec<Role>,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    issue(user_id, full_name, roles, TokenType::Refresh, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trip() {
        let token = generate_access_token(
            7,
            "John Doe".to_string(),
            vec![Role::Officer, Role::Staff],
            "test-secret",
            600,
        )
        .unwrap();

        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.roles, vec![Role::Officer, Role::Staff]);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token =
            generate_access_token(7, "x".to_string(), vec![Role::Admin], "secret-a", 600).unwrap();
        assert!(verify_token(&token, "secret-b").is_err());
    }
}
