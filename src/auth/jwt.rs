use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::AuthError;
use crate::config::AuthConfig;
use crate::store::Role;

/// Name of the cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "jwt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing and verification keys.
pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Keys {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Keys from the configured secret, or a random per-process secret.
    pub fn from_config(auth: &AuthConfig) -> Self {
        match auth.jwt_secret.as_deref() {
            Some(secret) => Self::new(secret.as_bytes()),
            None => {
                warn!("No JWT secret configured; sessions will not survive a restart");
                let secret: [u8; 32] = rand::random();
                Self::new(&secret)
            }
        }
    }

    pub fn issue(&self, user_id: i64, role: Role, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Encode)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            })
    }
}

/// HttpOnly, SameSite=Strict session cookie living as long as the token.
pub fn session_cookie(token: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build()
}

/// Cookie that matches the session cookie, for removal from a jar.
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, "")).path("/").build()
}
