use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use tokio::sync::oneshot;

use super::surfaces::Surfaces;

type UiTask = Box<dyn FnOnce(&mut Surfaces) + Send + 'static>;

enum UiCommand {
    Run(UiTask),
    Shutdown,
}

struct UiThreadInner {
    sender: mpsc::Sender<UiCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UiThreadInner {
    fn take_worker(&self) -> Option<JoinHandle<()>> {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take()
    }
}

impl Drop for UiThreadInner {
    fn drop(&mut self) {
        if let Some(handle) = self.take_worker() {
            if let Err(err) = self.sender.send(UiCommand::Shutdown) {
                error!("Failed to send shutdown to UI thread: {err}");
            }
            // Last handle released by a task on the UI thread itself.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join UI thread: {join_err:?}");
            }
        }
    }
}

/// Single thread that owns the action surfaces.
///
/// Every cover/alert/navigation call is queued here, so surface mutations
/// never run concurrently and never run on a worker thread. Tasks run in
/// submission order.
#[derive(Clone)]
pub struct UiThread {
    inner: Arc<UiThreadInner>,
}

impl UiThread {
    pub fn new(surfaces: Surfaces) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<UiCommand>();

        let worker = thread::Builder::new()
            .name("shortguard-ui".into())
            .spawn(move || {
                let mut surfaces = surfaces;
                while let Ok(command) = command_rx.recv() {
                    match command {
                        UiCommand::Run(task) => {
                            let outcome = catch_unwind(AssertUnwindSafe(|| task(&mut surfaces)));
                            if outcome.is_err() {
                                error!("UI task panicked; surface state may be stale");
                            }
                        }
                        UiCommand::Shutdown => break,
                    }
                }

                info!("UI thread shutting down");
            })
            .context("failed to spawn UI thread")?;

        Ok(Self {
            inner: Arc::new(UiThreadInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    /// Runs `task` on the UI thread and waits for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Surfaces) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = UiCommand::Run(Box::new(move |surfaces| {
            let result = task(surfaces);
            if reply_tx.send(result).is_err() {
                error!("UI caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send task to UI thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("UI task panicked or UI thread terminated"))
    }

    /// Blocking variant of [`UiThread::execute`] for callers that are not
    /// running on the async runtime, such as host callback threads.
    pub fn run_blocking<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Surfaces) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel();

        let command = UiCommand::Run(Box::new(move |surfaces| {
            let _ = reply_tx.send(task(surfaces));
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send task to UI thread: {err}"))?;

        reply_rx
            .recv()
            .map_err(|_| anyhow!("UI task panicked or UI thread terminated"))
    }

    /// Queues `task` without waiting. Safe to call from any thread,
    /// including the UI thread itself.
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce(&mut Surfaces) + Send + 'static,
    {
        if self.inner.sender.send(UiCommand::Run(Box::new(task))).is_err() {
            error!("UI thread is gone; dropping posted task");
        }
    }

    /// Resolves once everything queued before it has run.
    pub async fn flush(&self) -> Result<()> {
        self.execute(|_| ()).await
    }

    pub async fn shutdown(&self) {
        let Some(handle) = self.inner.take_worker() else {
            return;
        };
        if let Err(err) = self.inner.sender.send(UiCommand::Shutdown) {
            error!("Failed to send shutdown to UI thread: {err}");
        }
        match tokio::task::spawn_blocking(move || handle.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(join_err)) => error!("Failed to join UI thread: {join_err:?}"),
            Err(err) => error!("UI thread join task failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSurfaces;
    use crate::ui::alerts;

    #[tokio::test]
    async fn tasks_run_in_submission_order() {
        let recording = RecordingSurfaces::new();
        let ui = UiThread::new(recording.surfaces()).unwrap();

        ui.post(|s| {
            let _ = s.alerts.show(&alerts::resumed());
        });
        ui.post(|s| {
            let _ = s.navigator.go_back();
        });
        let can_show = ui.execute(|s| s.cover.can_show()).await.unwrap();

        assert!(can_show);
        assert_eq!(recording.alert_count(), 1);
        assert_eq!(recording.go_back_count(), 1);
        ui.shutdown().await;
    }

    #[tokio::test]
    async fn panicking_task_does_not_kill_thread() {
        let recording = RecordingSurfaces::new();
        let ui = UiThread::new(recording.surfaces()).unwrap();

        let result: Result<()> = ui.execute(|_| panic!("boom")).await;
        assert!(result.is_err());

        ui.execute(|s| s.navigator.go_back()).await.unwrap().unwrap();
        assert_eq!(recording.go_back_count(), 1);
        ui.shutdown().await;
    }

    #[tokio::test]
    async fn execute_after_shutdown_fails() {
        let ui = UiThread::new(RecordingSurfaces::new().surfaces()).unwrap();
        ui.shutdown().await;
        assert!(ui.flush().await.is_err());
    }
}
