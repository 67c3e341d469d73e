//! Request guards.
//!
//! The token is read from the `jwt` cookie, falling back to an
//! `Authorization: Bearer` header.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use super::{AuthError, TOKEN_COOKIE};
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::store::{users, Role, UserRecord};

/// An authenticated, active user. Rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserRecord);

/// An authenticated admin. Rejects with 401, or 403 for non-admins.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserRecord);

/// The caller if a valid session is present; never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<UserRecord>);

fn session_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
}

/// The credential of a `Bearer` authorization value. The scheme is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<UserRecord> {
    let token = session_token(parts).ok_or(AuthError::Missing)?;
    let claims = state.keys.verify(&token)?;

    let user = state
        .store
        .call(move |conn| Ok(users::find_by_id(conn, claims.sub)?))
        .await?;

    match user {
        Some(user) if user.active => Ok(user),
        _ => Err(AuthError::UnknownUser.into()),
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        authenticate(parts, state).await.map(AuthUser)
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = authenticate(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AppError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Infallible> {
        if session_token(parts).is_none() {
            return Ok(MaybeUser(None));
        }
        match authenticate(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(e) => {
                debug!("Ignoring unusable session on optional-auth route: {}", e);
                Ok(MaybeUser(None))
            }
        }
    }
}
