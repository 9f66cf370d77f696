use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::db::{
    helpers::{format_datetime, parse_datetime},
    SqliteEventLog,
};
use crate::event_log::ErrorRecord;

pub fn insert(conn: &Connection, record: &ErrorRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO errors (timestamp, kind, message) VALUES (?1, ?2, ?3)",
        params![format_datetime(&record.timestamp), record.kind, record.message],
    )
    .context("failed to insert error record")?;
    Ok(())
}

impl SqliteEventLog {
    pub async fn recent_errors(&self, limit: usize) -> Result<Vec<ErrorRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT timestamp, kind, message
                 FROM errors
                 ORDER BY id DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(ErrorRecord {
                    timestamp: parse_datetime(&row.get::<_, String>(0)?, "timestamp")?,
                    kind: row.get(1)?,
                    message: row.get(2)?,
                });
            }

            Ok(records)
        })
        .await
    }
}
