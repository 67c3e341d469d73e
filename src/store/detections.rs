use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use tracing::info;

use super::{
    now, DefectRecord, DetectionRecord, DetectionSummary, HistoryQuery, HistorySearch, NewDefect,
    NewDetection,
};

const SUMMARY_COLUMNS: &str =
    "d.id, d.user_id, d.defect_count, d.average_confidence, d.detection_time, d.created_at";

fn map_summary(row: &Row<'_>) -> rusqlite::Result<DetectionSummary> {
    Ok(DetectionSummary {
        id: row.get(0)?,
        user_id: row.get(1)?,
        defect_count: row.get(2)?,
        average_confidence: row.get(3)?,
        detection_time: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_defect(row: &Row<'_>) -> rusqlite::Result<DefectRecord> {
    Ok(DefectRecord {
        id: row.get(0)?,
        detection_id: row.get(1)?,
        defect_type: row.get(2)?,
        class_id: row.get(3)?,
        x_center: row.get(4)?,
        y_center: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
        confidence: row.get(8)?,
        thumbnail: row.get(9)?,
    })
}

/// Escape LIKE wildcards so user text matches literally (used with `ESCAPE '\'`).
pub fn like_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Persist a detection run and its defect records atomically. Returns the run id.
pub fn insert_with_defects(
    conn: &mut Connection,
    detection: &NewDetection,
    defects: &[NewDefect],
) -> rusqlite::Result<i64> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO detections (user_id, original_image, original_image_type, result_image,
             defect_count, average_confidence, detection_time, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            detection.user_id,
            detection.original_image,
            detection.original_image_type,
            detection.result_image,
            detection.defect_count,
            detection.average_confidence,
            detection.detection_time,
            now(),
        ],
    )?;
    let id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO defects (detection_id, defect_type, class_id, x_center, y_center,
                 width, height, confidence, thumbnail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for defect in defects {
            stmt.execute(params![
                id,
                defect.defect_type,
                defect.class_id,
                defect.x_center,
                defect.y_center,
                defect.width,
                defect.height,
                defect.confidence,
                defect.thumbnail,
            ])?;
        }
    }

    tx.commit()?;
    info!(
        "Saved detection {} for user {} with {} defects",
        id,
        detection.user_id,
        defects.len()
    );
    Ok(id)
}

/// Load a run with its images, only if it belongs to `user_id`.
pub fn find_owned(
    conn: &Connection,
    id: i64,
    user_id: i64,
) -> rusqlite::Result<Option<DetectionRecord>> {
    conn.query_row(
        &format!(
            "SELECT {SUMMARY_COLUMNS}, d.original_image, d.original_image_type, d.result_image
             FROM detections d WHERE d.id = ?1 AND d.user_id = ?2"
        ),
        params![id, user_id],
        |row| {
            Ok(DetectionRecord {
                summary: map_summary(row)?,
                original_image: row.get(6)?,
                original_image_type: row.get(7)?,
                result_image: row.get(8)?,
            })
        },
    )
    .optional()
}

pub fn defects_for(conn: &Connection, detection_id: i64) -> rusqlite::Result<Vec<DefectRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, detection_id, defect_type, class_id, x_center, y_center, width, height,
             confidence, thumbnail
         FROM defects WHERE detection_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![detection_id], map_defect)?;
    rows.collect()
}

/// Distinct defect types of one run, in order of first occurrence.
pub fn defect_types_for(conn: &Connection, detection_id: i64) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT defect_type FROM defects WHERE detection_id = ?1
         GROUP BY defect_type ORDER BY MIN(id)",
    )?;
    let rows = stmt.query_map(params![detection_id], |row| row.get(0))?;
    rows.collect()
}

/// One filtered, sorted page of a user's history plus the total match count.
pub fn query_history(
    conn: &Connection,
    query: &HistoryQuery,
) -> rusqlite::Result<(i64, Vec<DetectionSummary>)> {
    let mut clauses = vec!["d.user_id = ?".to_string()];
    let mut values: Vec<Value> = vec![Value::Integer(query.user_id)];

    match &query.search {
        Some(HistorySearch::Id(digits)) => {
            clauses.push(r"CAST(d.id AS TEXT) LIKE ? ESCAPE '\'".to_string());
            values.push(Value::Text(format!("%{}%", like_escape(digits))));
        }
        Some(HistorySearch::Date(text)) => {
            clauses.push(
                r"(substr(d.created_at, 1, 10) LIKE ? ESCAPE '\'
                   OR replace(substr(d.created_at, 1, 16), 'T', ' ') LIKE ? ESCAPE '\')"
                    .to_string(),
            );
            let pattern = format!("%{}%", like_escape(text));
            values.push(Value::Text(pattern.clone()));
            values.push(Value::Text(pattern));
        }
        None => {}
    }

    if let Some(since) = &query.since {
        clauses.push("d.created_at >= ?".to_string());
        values.push(Value::Text(since.clone()));
    }

    if let Some(defect_type) = &query.defect_type {
        clauses.push(
            "EXISTS (SELECT 1 FROM defects f WHERE f.detection_id = d.id AND f.defect_type = ?)"
                .to_string(),
        );
        values.push(Value::Text(defect_type.clone()));
    }

    match query.has_defects {
        Some(true) => clauses.push("d.defect_count > 0".to_string()),
        Some(false) => clauses.push("d.defect_count = 0".to_string()),
        None => {}
    }

    let where_sql = clauses.join(" AND ");

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM detections d WHERE {where_sql}"),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let order = query.order.keyword();
    let sql = format!(
        "SELECT {SUMMARY_COLUMNS} FROM detections d WHERE {where_sql}
         ORDER BY d.{} {order}, d.id {order} LIMIT ? OFFSET ?",
        query.sort.column()
    );
    values.push(Value::Integer(query.limit));
    values.push(Value::Integer(query.offset));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), map_summary)?;
    let page = rows.collect::<rusqlite::Result<Vec<_>>>()?;

    Ok((total, page))
}

/// Newest runs, either for one user or across the system.
pub fn recent(
    conn: &Connection,
    user_id: Option<i64>,
    limit: i64,
) -> rusqlite::Result<Vec<DetectionSummary>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM detections d
         WHERE (?1 IS NULL OR d.user_id = ?1)
         ORDER BY d.created_at DESC, d.id DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![user_id, limit], map_summary)?;
    rows.collect()
}

/// Delete an owned run and its defects. Returns false if it isn't the caller's.
fn delete_owned_in(conn: &Connection, id: i64, user_id: i64) -> rusqlite::Result<bool> {
    let owned: Option<i64> = conn
        .query_row(
            "SELECT id FROM detections WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    if owned.is_none() {
        return Ok(false);
    }
    conn.execute("DELETE FROM defects WHERE detection_id = ?1", params![id])?;
    conn.execute("DELETE FROM detections WHERE id = ?1", params![id])?;
    Ok(true)
}

pub fn delete_owned(conn: &mut Connection, id: i64, user_id: i64) -> rusqlite::Result<bool> {
    let tx = conn.transaction()?;
    let deleted = delete_owned_in(&tx, id, user_id)?;
    tx.commit()?;
    if deleted {
        info!("Deleted detection {} of user {}", id, user_id);
    }
    Ok(deleted)
}

/// Delete several owned runs in one transaction, reporting per-id outcome.
pub fn delete_many_owned(
    conn: &mut Connection,
    ids: &[i64],
    user_id: i64,
) -> rusqlite::Result<Vec<(i64, bool)>> {
    let tx = conn.transaction()?;
    let mut outcome = Vec::with_capacity(ids.len());
    for &id in ids {
        outcome.push((id, delete_owned_in(&tx, id, user_id)?));
    }
    tx.commit()?;
    Ok(outcome)
}
