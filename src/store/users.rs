use rusqlite::{params, types::Type, Connection, ErrorCode, OptionalExtension, Row};
use tracing::info;

use super::{now, Avatar, Role, UserRecord};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, active, avatar_mime, avatar_size,
     last_login, created_at, updated_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    let role: String = row.get(4)?;
    let role = role
        .parse::<Role>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?;

    Ok(UserRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role,
        active: row.get(5)?,
        avatar_mime: row.get(6)?,
        avatar_size: row.get(7)?,
        last_login: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// True when the error is a UNIQUE constraint violation (e.g. duplicate email).
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

pub fn insert(
    conn: &Connection,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> rusqlite::Result<i64> {
    let ts = now();
    conn.execute(
        "INSERT INTO users (name, email, password_hash, role, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
        params![name, email, password_hash, role.as_str(), ts],
    )?;
    let id = conn.last_insert_rowid();
    info!("Created {} account {} ({})", role, id, email);
    Ok(id)
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<UserRecord>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        map_user,
    )
    .optional()
}

/// Case-insensitive lookup.
pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<UserRecord>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        params![email],
        map_user,
    )
    .optional()
}

pub fn list(conn: &Connection) -> rusqlite::Result<Vec<UserRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
    let rows = stmt.query_map([], map_user)?;
    rows.collect()
}

pub fn count_active(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users WHERE active = 1", [], |row| row.get(0))
}

pub fn touch_last_login(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    let ts = now();
    conn.execute(
        "UPDATE users SET last_login = ?1, updated_at = ?1 WHERE id = ?2",
        params![ts, id],
    )?;
    Ok(())
}

/// Returns false when the user doesn't exist.
pub fn update_name(conn: &Connection, id: i64, name: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET name = ?1, updated_at = ?2 WHERE id = ?3",
        params![name, now(), id],
    )?;
    Ok(changed > 0)
}

pub fn update_password(conn: &Connection, id: i64, password_hash: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
        params![password_hash, now(), id],
    )?;
    Ok(changed > 0)
}

pub fn set_avatar(conn: &Connection, id: i64, bytes: &[u8], mime: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET avatar = ?1, avatar_mime = ?2, avatar_size = ?3, updated_at = ?4
         WHERE id = ?5",
        params![bytes, mime, bytes.len() as i64, now(), id],
    )?;
    Ok(changed > 0)
}

pub fn avatar(conn: &Connection, id: i64) -> rusqlite::Result<Option<Avatar>> {
    let found = conn
        .query_row(
            "SELECT avatar, avatar_mime FROM users WHERE id = ?1",
            params![id],
            |row| {
                let bytes: Option<Vec<u8>> = row.get(0)?;
                let mime: Option<String> = row.get(1)?;
                Ok(bytes.zip(mime))
            },
        )
        .optional()?;

    Ok(found
        .flatten()
        .filter(|(bytes, _)| !bytes.is_empty())
        .map(|(bytes, mime)| Avatar { bytes, mime }))
}

/// Delete a user with their defects and detections in one transaction.
pub fn delete_cascade(conn: &mut Connection, id: i64) -> rusqlite::Result<bool> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM defects WHERE detection_id IN (SELECT id FROM detections WHERE user_id = ?1)",
        params![id],
    )?;
    tx.execute("DELETE FROM detections WHERE user_id = ?1", params![id])?;
    let removed = tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    tx.commit()?;

    if removed > 0 {
        info!("Deleted account {} and its detection history", id);
    }
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing;

    #[test]
    fn test_insert_and_find() {
        let conn = testing::conn();
        let id = insert(&conn, "Ada", "ada@example.com", "h", Role::Admin).unwrap();

        let user = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(user.name, "Ada");
        assert_eq!(user.role, Role::Admin);
        assert!(user.active);
        assert!(user.last_login.is_none());
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_email_lookup_ignores_case() {
        let conn = testing::conn();
        insert(&conn, "Bob", "Bob@Example.com", "h", Role::User).unwrap();
        assert!(find_by_email(&conn, "bob@example.com").unwrap().is_some());
        assert!(find_by_email(&conn, "nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_is_unique_violation() {
        let conn = testing::conn();
        insert(&conn, "A", "dup@example.com", "h", Role::User).unwrap();
        let err = insert(&conn, "B", "DUP@example.com", "h", Role::User).unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_avatar_round_trip() {
        let conn = testing::conn();
        let id = testing::user(&conn, "pic@example.com");
        assert!(avatar(&conn, id).unwrap().is_none());

        assert!(set_avatar(&conn, id, b"\x89PNG", "image/png").unwrap());
        let stored = avatar(&conn, id).unwrap().unwrap();
        assert_eq!(stored.bytes, b"\x89PNG");
        assert_eq!(stored.mime, "image/png");

        let user = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(user.avatar_size, Some(4));
        assert!(avatar(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn test_updates_report_missing_user() {
        let conn = testing::conn();
        let id = testing::user(&conn, "u@example.com");
        assert!(update_name(&conn, id, "Renamed").unwrap());
        assert!(!update_name(&conn, 999, "Ghost").unwrap());
        assert_eq!(find_by_id(&conn, id).unwrap().unwrap().name, "Renamed");

        touch_last_login(&conn, id).unwrap();
        assert!(find_by_id(&conn, id).unwrap().unwrap().last_login.is_some());
    }

    #[test]
    fn test_count_active() {
        let conn = testing::conn();
        let a = testing::user(&conn, "a@example.com");
        testing::user(&conn, "b@example.com");
        testing::deactivate(&conn, a);
        assert_eq!(count_active(&conn).unwrap(), 1);
    }
}
