// utils/token.rs
use axum::http::StatusCode;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorMessage, HttpError};

/// Claims as issued by the identity service. This service only ever
/// validates tokens; it never mints them.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<String, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    );

    match decoded {
        Ok(token) => Ok(token.claims.sub),
        Err(_) => Err(HttpError::new(
            ErrorMessage::InvalidToken.to_string(),
            StatusCode::UNAUTHORIZED,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn make_token(user_id: &str, secret: &[u8], expires_in_minutes: i64) -> String {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + Duration::minutes(expires_in_minutes)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[test]
    fn token_round_trips_user_id() {
        let user_id = Uuid::new_v4().to_string();
        let secret = b"test-secret";

        let token = make_token(&user_id, secret, 60);
        let decoded = decode_token(token, secret).unwrap();

        assert_eq!(decoded, user_id);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = make_token("some-user", b"secret-a", 60);
        assert!(decode_token(token, b"secret-b").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = make_token("some-user", b"secret", -10);
        assert!(decode_token(token, b"secret").is_err());
    }
}
