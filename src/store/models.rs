use rusqlite::{params, Connection, Row};
use tracing::info;

use super::{now, ModelRecord};

fn map_model(row: &Row<'_>) -> rusqlite::Result<ModelRecord> {
    Ok(ModelRecord {
        id: row.get(0)?,
        model_name: row.get(1)?,
        model_version: row.get(2)?,
        model_file: row.get(3)?,
        is_active: row.get(4)?,
        uploaded_by: row.get(5)?,
        uploaded_at: row.get(6)?,
    })
}

/// Register a model file. An active model deactivates all others first.
pub fn insert(
    conn: &mut Connection,
    name: &str,
    version: &str,
    file: &str,
    active: bool,
    uploaded_by: Option<i64>,
) -> rusqlite::Result<ModelRecord> {
    let tx = conn.transaction()?;
    if active {
        let demoted = tx.execute(
            "UPDATE detection_models SET is_active = 0 WHERE is_active = 1",
            [],
        )?;
        if demoted > 0 {
            info!("Deactivated {} previously active model(s)", demoted);
        }
    }
    let uploaded_at = now();
    tx.execute(
        "INSERT INTO detection_models (model_name, model_version, model_file, is_active,
             uploaded_by, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![name, version, file, active, uploaded_by, uploaded_at],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    info!("Registered model {} v{} ({}) active={}", name, version, file, active);
    Ok(ModelRecord {
        id,
        model_name: name.to_string(),
        model_version: version.to_string(),
        model_file: file.to_string(),
        is_active: active,
        uploaded_by,
        uploaded_at,
    })
}

/// All registered models, newest first.
pub fn list(conn: &Connection) -> rusqlite::Result<Vec<ModelRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, model_name, model_version, model_file, is_active, uploaded_by, uploaded_at
         FROM detection_models ORDER BY uploaded_at DESC, id DESC",
    )?;
    let rows = stmt.query_map([], map_model)?;
    rows.collect()
}

pub fn has_active(conn: &Connection) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM detection_models WHERE is_active = 1)",
        [],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing;

    #[test]
    fn test_activating_model_demotes_others() {
        let mut conn = testing::conn();
        let admin = testing::user(&conn, "admin@example.com");
        assert!(!has_active(&conn).unwrap());

        let first = insert(&mut conn, "YOLO", "1.0", "a.onnx", true, Some(admin)).unwrap();
        insert(&mut conn, "YOLO", "1.1-rc", "b.onnx", false, Some(admin)).unwrap();
        let third = insert(&mut conn, "YOLO", "2.0", "c.onnx", true, None).unwrap();

        let models = list(&conn).unwrap();
        assert_eq!(models.len(), 3);
        let active: Vec<i64> = models.iter().filter(|m| m.is_active).map(|m| m.id).collect();
        assert_eq!(active, vec![third.id]);
        assert!(models.iter().any(|m| m.id == first.id && !m.is_active));
        assert!(has_active(&conn).unwrap());
    }

    #[test]
    fn test_uploader_delete_keeps_model() {
        let mut conn = testing::conn();
        let admin = testing::user(&conn, "admin@example.com");
        insert(&mut conn, "YOLO", "1.0", "a.onnx", true, Some(admin)).unwrap();
        crate::store::users::delete_cascade(&mut conn, admin).unwrap();

        let models = list(&conn).unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].uploaded_by, None);
    }
}
