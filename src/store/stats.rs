//! Aggregate queries behind the dashboard, profile and admin statistics.

use rusqlite::{params, Connection, OptionalExtension};

use super::detections::like_escape;

/// Totals over a set of detection runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionAggregate {
    pub count: i64,
    /// Runs with at least one defect.
    pub defective: i64,
    /// Sum of per-run defect counts.
    pub total_defects: i64,
    /// Mean of per-run average confidence, 0..1.
    pub average_confidence: f64,
    /// Mean detection time in ms.
    pub average_detection_time: f64,
}

impl DetectionAggregate {
    /// Percent of runs without defects; 100 when there are none.
    pub fn quality_rate(&self) -> f64 {
        if self.count == 0 {
            100.0
        } else {
            (self.count - self.defective) as f64 / self.count as f64 * 100.0
        }
    }

    /// Percent of runs with defects; 0 when there are none.
    pub fn defect_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.defective as f64 / self.count as f64 * 100.0
        }
    }
}

/// Aggregate runs, optionally scoped to one user and/or a lower created_at bound.
pub fn aggregate(
    conn: &Connection,
    user_id: Option<i64>,
    since: Option<&str>,
) -> rusqlite::Result<DetectionAggregate> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(defect_count > 0), 0),
                COALESCE(SUM(defect_count), 0),
                COALESCE(AVG(average_confidence), 0.0),
                COALESCE(AVG(detection_time), 0.0)
         FROM detections
         WHERE (?1 IS NULL OR user_id = ?1) AND (?2 IS NULL OR created_at >= ?2)",
        params![user_id, since],
        |row| {
            Ok(DetectionAggregate {
                count: row.get(0)?,
                defective: row.get(1)?,
                total_defects: row.get(2)?,
                average_confidence: row.get(3)?,
                average_detection_time: row.get(4)?,
            })
        },
    )
}

/// Runs created in `[from, to)`, system-wide.
pub fn count_between(conn: &Connection, from: &str, to: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM detections WHERE created_at >= ?1 AND created_at < ?2",
        params![from, to],
        |row| row.get(0),
    )
}

/// Number of stored defect records.
pub fn count_defects(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM defects", [], |row| row.get(0))
}

/// Defect types by frequency, most common first. `limit` of None means all.
pub fn defect_type_counts(
    conn: &Connection,
    user_id: Option<i64>,
    limit: Option<i64>,
) -> rusqlite::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT f.defect_type, COUNT(*) AS n
         FROM defects f JOIN detections d ON d.id = f.detection_id
         WHERE (?1 IS NULL OR d.user_id = ?1)
         GROUP BY f.defect_type
         ORDER BY n DESC, f.defect_type
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit.unwrap_or(-1)], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })?;
    rows.collect()
}

/// created_at and defect count of the user's newest run.
pub fn last_detection(
    conn: &Connection,
    user_id: i64,
) -> rusqlite::Result<Option<(String, i64)>> {
    conn.query_row(
        "SELECT created_at, defect_count FROM detections WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT 1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

/// Ids of the user's runs starting with `prefix`, ascending, with created_at.
pub fn id_suggestions(
    conn: &Connection,
    user_id: i64,
    prefix: &str,
    limit: i64,
) -> rusqlite::Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare(
        r"SELECT id, created_at FROM detections
         WHERE user_id = ?1 AND CAST(id AS TEXT) LIKE ?2 ESCAPE '\'
         ORDER BY id LIMIT ?3",
    )?;
    let pattern = format!("{}%", like_escape(prefix));
    let rows = stmt.query_map(params![user_id, pattern, limit], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })?;
    rows.collect()
}

/// `YYYY-MM-DD` days containing `text` that have runs, newest first, with counts.
pub fn date_suggestions(
    conn: &Connection,
    user_id: i64,
    text: &str,
    limit: i64,
) -> rusqlite::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        r"SELECT substr(created_at, 1, 10) AS day, COUNT(*)
         FROM detections
         WHERE user_id = ?1 AND substr(created_at, 1, 10) LIKE ?2 ESCAPE '\'
         GROUP BY day ORDER BY day DESC LIMIT ?3",
    )?;
    let pattern = format!("%{}%", like_escape(text));
    let rows = stmt.query_map(params![user_id, pattern, limit], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })?;
    rows.collect()
}
