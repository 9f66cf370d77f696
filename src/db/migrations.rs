use anyhow::{bail, Context, Result};
use log::info;
use rusqlite::Connection;

/// Schema scripts in order; entry `n` upgrades `user_version` `n` to `n + 1`.
const MIGRATIONS: &[(&str, &str)] = &[("schema_v1.sql", include_str!("schemas/schema_v1.sql"))];

fn target_version() -> i32 {
    MIGRATIONS.len() as i32
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read event log schema version")?;
    let target = target_version();

    if current > target {
        bail!("event log schema v{current} is newer than this build understands (v{target})");
    }
    if current == target {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;
    for (index, (name, script)) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        tx.execute_batch(script)
            .with_context(|| format!("failed to apply {name}"))?;
        info!("Applied event log migration {} ({name})", index + 1);
    }
    tx.pragma_update(None, "user_version", target)
        .context("failed to bump event log schema version")?;
    tx.commit().context("failed to commit event log migrations")?;

    Ok(())
}
