//! Session tokens, password hashing and the request guards built on them.

pub mod extract;
pub mod jwt;
pub mod password;

use thiserror::Error;
use tracing::info;

use crate::store::{users, Role, Store};

pub use extract::{AdminUser, AuthUser, MaybeUser};
pub use jwt::{clear_session_cookie, session_cookie, Claims, Keys, TOKEN_COOKIE};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please log in")]
    Missing,

    #[error("Invalid authentication token")]
    Invalid,

    #[error("Authentication token has expired")]
    Expired,

    #[error("User does not exist or has been deactivated")]
    UnknownUser,

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Token encoding failed: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

const DEFAULT_USERS: &[(&str, &str, &str, Role)] = &[
    ("Admin User", "admin@example.com", "admin123", Role::Admin),
    ("Normal User", "user@example.com", "user123", Role::User),
];

/// Create the demo admin and user accounts when they are missing.
pub async fn seed_default_users(store: &Store, bcrypt_cost: u32) -> crate::error::Result<()> {
    for &(name, email, plain, role) in DEFAULT_USERS {
        let exists = store
            .call(move |conn| Ok(users::find_by_email(conn, email)?.is_some()))
            .await?;
        if exists {
            continue;
        }
        let hash = password::hash(plain.to_string(), bcrypt_cost).await?;
        store
            .call(move |conn| Ok(users::insert(conn, name, email, &hash, role)?))
            .await?;
        info!("Seeded default {} account {}", role, email);
    }
    Ok(())
}
