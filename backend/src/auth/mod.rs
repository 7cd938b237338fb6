//! Session tokens. A signed JWT travels in the `access_token` cookie; the
//! `Authorization: Bearer` header is accepted as a fallback.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Role, User};

pub mod cookie;
pub mod middleware;
pub mod password;

pub use middleware::{authenticate, optional_user, require_admin, CurrentUser, MaybeUser};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub fn create_token(
    user: &User,
    jwt_secret: &str,
    ttl_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        role: user.role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthProvider;

    fn user() -> User {
        User::new(
            "tenant".to_string(),
            "tenant@example.com".to_string(),
            AuthProvider::Local,
            Utc::now(),
        )
    }

    #[test]
    fn token_round_trips_subject_and_role() {
        let user = user();
        let token = create_token(&user, "secret", 1).unwrap();
        let claims = validate_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::User);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token(&user(), "secret", 1).unwrap();
        assert!(validate_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token(&user(), "secret", -2).unwrap();
        assert!(validate_token(&token, "secret").is_err());
    }
}
