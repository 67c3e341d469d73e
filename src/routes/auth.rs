use std::sync::LazyLock;

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::extract::AppJson;
use crate::auth::{clear_session_cookie, password, session_cookie, AdminUser, AuthUser};
use crate::error::{AppError, Result};
use crate::imaging::to_data_url;
use crate::state::AppState;
use crate::store::{users, Avatar, Role, UserRecord};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern must compile")
});

const BAD_CREDENTIALS: &str = "Incorrect email or password";
const EMAIL_TAKEN: &str = "This email is already registered";

/// User fields returned after login or registration.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&UserRecord> for SessionUser {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Full account view, avatar inlined as a data URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AccountView {
    pub fn new(user: UserRecord, avatar: Option<Avatar>) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar: avatar.map(|a| to_data_url(&a.mime, &a.bytes)),
            role: user.role,
            active: user.active,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Trimmed, non-empty value of an optional body field.
pub(crate) fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Issue a token for `user` and attach it as the session cookie.
fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: &UserRecord,
    remember: bool,
) -> Result<CookieJar> {
    let auth = &state.config.auth;
    let ttl = if remember {
        Duration::days(auth.remember_me_days)
    } else {
        Duration::hours(auth.token_ttl_hours)
    };
    let token = state.keys.issue(user.id, user.role, ttl)?;
    Ok(jar.add(session_cookie(token, ttl, auth.secure_cookies)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(body): AppJson<RegisterRequest>,
) -> Result<(CookieJar, (StatusCode, Json<Value>))> {
    let password = body.password.as_deref().filter(|p| !p.trim().is_empty());
    let (Some(name), Some(email), Some(password)) = (filled(&body.name), filled(&body.email), password)
    else {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    };
    if !EMAIL.is_match(email) {
        return Err(AppError::BadRequest("Please provide a valid email address".to_string()));
    }

    let lookup = email.to_string();
    let existing = state
        .store
        .call(move |conn| Ok(users::find_by_email(conn, &lookup)?))
        .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest(EMAIL_TAKEN.to_string()));
    }

    let hash = password::hash(password.to_string(), state.config.auth.bcrypt_cost).await?;
    let (name, email) = (name.to_string(), email.to_string());
    let user = state
        .store
        .call(move |conn| {
            let id = match users::insert(conn, &name, &email, &hash, Role::User) {
                Ok(id) => id,
                Err(e) if users::is_unique_violation(&e) => {
                    return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
                }
                Err(e) => return Err(e.into()),
            };
            users::find_by_id(conn, id)?
                .ok_or_else(|| AppError::internal("registered user vanished"))
        })
        .await?;

    let jar = start_session(&state, jar, &user, false)?;
    info!("Registered user {} ({})", user.id, user.email);

    Ok((
        jar,
        (
            StatusCode::CREATED,
            Json(json!({ "success": true, "user": SessionUser::from(&user) })),
        ),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub remember_me: bool,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(body): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<Value>)> {
    let password = body.password.as_deref().filter(|p| !p.is_empty());
    let (Some(email), Some(password)) = (filled(&body.email), password) else {
        return Err(AppError::BadRequest("Please provide email and password".to_string()));
    };

    let lookup = email.to_string();
    let user = state
        .store
        .call(move |conn| Ok(users::find_by_email(conn, &lookup)?))
        .await?;
    let Some(user) = user else {
        warn!("Login attempt for unknown email {}", email);
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
    };

    if !password::verify(password.to_string(), user.password_hash.clone()).await? {
        warn!("Failed login for user {}", user.id);
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }
    if !user.active {
        return Err(AppError::Unauthorized("Your account has been deactivated".to_string()));
    }

    let id = user.id;
    state
        .store
        .call(move |conn| Ok(users::touch_last_login(conn, id)?))
        .await?;

    let jar = start_session(&state, jar, &user, body.remember_me)?;
    info!("User {} logged in", user.id);

    Ok((jar, Json(json!({ "success": true, "user": SessionUser::from(&user) }))))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    (
        jar.remove(clear_session_cookie()),
        Json(json!({ "success": true, "message": "Logged out" })),
    )
}

pub async fn me(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Value>> {
    let id = user.id;
    let avatar = state.store.call(move |conn| Ok(users::avatar(conn, id)?)).await?;
    Ok(Json(json!({ "success": true, "user": AccountView::new(user, avatar) })))
}

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Value>> {
    let accounts = state
        .store
        .call(|conn| {
            users::list(conn)?
                .into_iter()
                .map(|user| -> Result<AccountView> {
                    let avatar = users::avatar(conn, user.id)?;
                    Ok(AccountView::new(user, avatar))
                })
                .collect::<Result<Vec<_>>>()
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": accounts.len(),
        "users": accounts,
    })))
}
