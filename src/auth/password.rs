use tokio::task::spawn_blocking;

use super::AuthError;
use crate::error::Result;

/// bcrypt hash on the blocking pool.
pub async fn hash(password: String, cost: u32) -> Result<String> {
    let hashed = spawn_blocking(move || bcrypt::hash(password, cost)).await?;
    Ok(hashed.map_err(AuthError::from)?)
}

/// Check `password` against a stored bcrypt hash on the blocking pool.
pub async fn verify(password: String, hash: String) -> Result<bool> {
    let matched = spawn_blocking(move || bcrypt::verify(password, &hash)).await?;
    Ok(matched.map_err(AuthError::from)?)
}
