use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::info;
use rusqlite::{params, Connection};

use crate::db::{
    helpers::{format_datetime, parse_datetime, parse_intervention, parse_method, parse_platform},
    SqliteEventLog,
};
use crate::event_log::InterventionRecord;

const MAX_LOG_AGE_DAYS: i64 = 30;
const ROTATION_THRESHOLD: i64 = 1000;

pub fn insert(conn: &Connection, record: &InterventionRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO interventions (id, timestamp, platform, method, action, source_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id,
            format_datetime(&record.timestamp),
            record.platform.as_str(),
            record.method.as_str(),
            record.action.as_str(),
            record.source_id,
        ],
    )
    .context("failed to insert intervention record")?;
    Ok(())
}

/// Drops records older than the retention window once the table grows past
/// the rotation threshold.
pub fn rotate_if_needed(conn: &Connection, now: DateTime<Utc>) -> Result<()> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM interventions", [], |row| row.get(0))
        .context("failed to count intervention records")?;

    if count <= ROTATION_THRESHOLD {
        return Ok(());
    }

    let cutoff = now - Duration::days(MAX_LOG_AGE_DAYS);
    let deleted = conn
        .execute(
            "DELETE FROM interventions WHERE timestamp < ?1",
            params![format_datetime(&cutoff)],
        )
        .context("failed to rotate intervention records")?;
    info!("Event log rotation deleted {deleted} intervention records");
    Ok(())
}

impl SqliteEventLog {
    pub async fn recent_interventions(&self, limit: usize) -> Result<Vec<InterventionRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, platform, method, action, source_id
                 FROM interventions
                 ORDER BY timestamp DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(InterventionRecord {
                    id: row.get(0)?,
                    timestamp: parse_datetime(&row.get::<_, String>(1)?, "timestamp")?,
                    platform: parse_platform(&row.get::<_, String>(2)?)?,
                    method: parse_method(&row.get::<_, String>(3)?)?,
                    action: parse_intervention(&row.get::<_, String>(4)?)?,
                    source_id: row.get(5)?,
                });
            }

            Ok(records)
        })
        .await
    }

    pub async fn intervention_count(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM interventions", [], |row| row.get(0))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute_batch("DELETE FROM interventions; DELETE FROM errors;")
                .context("failed to clear event log")?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::EventLog;
    use crate::models::{DetectionMethod, InterventionKind, Platform, Verdict};

    fn record_at(timestamp: DateTime<Utc>) -> InterventionRecord {
        let verdict = Verdict::target(Platform::YouTube, 0.95, DetectionMethod::UiElement);
        let mut record =
            InterventionRecord::new(&verdict, InterventionKind::GoBack, "com.google.android.youtube");
        record.timestamp = timestamp;
        record
    }

    #[tokio::test]
    async fn records_are_read_back_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let log = SqliteEventLog::open(dir.path().join("events.sqlite3")).unwrap();

        let now = Utc::now();
        let newest = record_at(now);
        log.record_intervention(record_at(now - Duration::minutes(5)));
        log.record_intervention(newest.clone());

        let records = log.recent_interventions(10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, newest.id);
        assert_eq!(records[0].platform, Platform::YouTube);
        assert_eq!(records[0].action, InterventionKind::GoBack);
    }

    #[tokio::test]
    async fn rotation_only_kicks_in_past_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let log = SqliteEventLog::open(dir.path().join("events.sqlite3")).unwrap();
        let now = Utc::now();

        log.execute(move |conn| {
            let tx = conn.transaction()?;
            for _ in 0..ROTATION_THRESHOLD {
                insert(&tx, &record_at(now - Duration::days(MAX_LOG_AGE_DAYS + 1)))?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(log.intervention_count().await.unwrap(), 1000);

        log.record_intervention(record_at(now));
        assert_eq!(log.intervention_count().await.unwrap(), 1);
    }
}
