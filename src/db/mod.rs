use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod helpers;
mod migrations;
mod repositories;

use migrations::run_migrations;

use crate::event_log::{ErrorRecord, EventLog, InterventionRecord};

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to event log thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join event log thread: {join_err:?}");
            }
        }
    }
}

/// SQLite-backed [`EventLog`]. One worker thread owns the connection; writes
/// are queued without waiting, reads go through [`SqliteEventLog::execute`].
#[derive(Clone)]
pub struct SqliteEventLog {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl SqliteEventLog {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create event log directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("shortguard-eventlog".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite event log")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run event log migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Event log initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => task(&mut conn),
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Event log thread shutting down");
            })
            .context("failed to spawn event log worker thread")?;

        ready_rx
            .recv()
            .context("event log worker exited before signaling readiness")??;

        info!("Event log initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Event log caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to event log thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("event log thread terminated unexpectedly"))?
    }

    /// Queues a write; failures are logged on the worker thread.
    fn submit<F>(&self, what: &'static str, task: F)
    where
        F: FnOnce(&mut Connection) -> Result<()> + Send + 'static,
    {
        let command = DbCommand::Execute(Box::new(move |conn| {
            if let Err(err) = task(conn) {
                error!("Failed to {what}: {err:#}");
            }
        }));

        if let Err(err) = self.inner.sender.send(command) {
            error!("Event log thread is gone, dropping {what}: {err}");
        }
    }
}

impl EventLog for SqliteEventLog {
    fn record_intervention(&self, record: InterventionRecord) {
        self.submit("record intervention", move |conn| {
            repositories::interventions::insert(conn, &record)?;
            repositories::interventions::rotate_if_needed(conn, record.timestamp)
        });
    }

    fn record_error(&self, record: ErrorRecord) {
        self.submit("record error", move |conn| {
            repositories::errors::insert(conn, &record)
        });
    }
}
