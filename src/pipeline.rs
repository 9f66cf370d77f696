//! Wiring of the detection-and-intervention pipeline.
//!
//! ```text
//! on_snapshot ─> RateDebouncer ─> gate ─> DetectionEngine ─> ActionDispatcher ─> UI thread
//!                 (per source)    (enabled?)  (blocking pool)                  (surfaces)
//! ```

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use log::info;
use tokio::runtime::Handle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use uuid::Uuid;

use crate::action::{ActionDispatcher, CoverController, DispatchOutcome};
use crate::clock::{Clock, SystemClock};
use crate::config::GuardConfig;
use crate::db::SqliteEventLog;
use crate::debounce::RateDebouncer;
use crate::detection::DetectionEngine;
use crate::disable::{TemporaryDisable, WakeTimer};
use crate::error::{ErrorHandler, GuardError};
use crate::event_log::EventLog;
use crate::models::UiSnapshot;
use crate::safe_mode::SafeMode;
use crate::settings::{FileSettingsStore, SettingsStore};
use crate::ui::{Surfaces, UiThread};
use crate::{log_debug, log_error, log_info, log_warn};

const ENABLE_LOGS: bool = true;

/// Host-provided collaborators shared by every pipeline component.
#[derive(Clone)]
pub struct GuardContext {
    pub settings: Arc<dyn SettingsStore>,
    pub event_log: Arc<dyn EventLog>,
    pub wake_timer: Arc<dyn WakeTimer>,
    pub clock: Arc<dyn Clock>,
}

impl GuardContext {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        event_log: Arc<dyn EventLog>,
        wake_timer: Arc<dyn WakeTimer>,
    ) -> Self {
        Self {
            settings,
            event_log,
            wake_timer,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Settings and event log stored under `data_dir`.
    pub fn open(data_dir: &Path, wake_timer: Arc<dyn WakeTimer>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let settings = FileSettingsStore::new(data_dir.join("settings.json"))?;
        let event_log = SqliteEventLog::open(data_dir.join("shortguard.sqlite3"))?;

        Ok(Self::new(Arc::new(settings), Arc::new(event_log), wake_timer))
    }
}

struct PipelineInner {
    settings: Arc<dyn SettingsStore>,
    ui: UiThread,
    errors: Arc<ErrorHandler>,
    engine: Arc<DetectionEngine>,
    dispatcher: Arc<ActionDispatcher>,
    debouncer: Arc<RateDebouncer>,
    disable: Arc<TemporaryDisable>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    runtime: Handle,
}

#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

impl Pipeline {
    /// Builds every component and starts the settings watcher. Must be
    /// called from within a tokio runtime.
    pub fn new(context: GuardContext, config: GuardConfig, surfaces: Surfaces) -> Result<Self> {
        let runtime = Handle::try_current().context("pipeline requires a tokio runtime")?;
        let ui = UiThread::new(surfaces)?;

        let safe_mode = SafeMode::new(config.safe_mode.clone(), ui.clone(), runtime.clone());
        let errors = Arc::new(ErrorHandler::new(
            safe_mode,
            context.event_log.clone(),
            ui.clone(),
        ));
        let engine = Arc::new(DetectionEngine::with_default_classifiers(
            &config,
            context.settings.clone(),
            errors.clone(),
        ));
        let disable = Arc::new(TemporaryDisable::new(
            context.settings.clone(),
            context.wake_timer.clone(),
            context.clock.clone(),
            ui.clone(),
        ));
        let cover = Arc::new(CoverController::new(
            ui.clone(),
            disable.clone(),
            config.cover_auto_dismiss(),
            config.cover_suspend_minutes,
            runtime.clone(),
        ));
        let dispatcher = Arc::new(ActionDispatcher::new(
            ui.clone(),
            cover,
            context.settings.clone(),
            context.event_log.clone(),
            errors.clone(),
        ));
        let debouncer = RateDebouncer::new(config.debounce_interval(), runtime.clone());

        let inner = Arc::new(PipelineInner {
            settings: context.settings,
            ui,
            errors,
            engine,
            dispatcher,
            debouncer,
            disable,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            runtime,
        });

        if let Err(err) = inner.disable.check_and_reconcile() {
            log_error!("Failed to reconcile temporary disable at startup: {err:#}");
        }
        inner.spawn_settings_watch();

        info!(
            "Pipeline started (debounce {:?}, cache {})",
            config.debounce_interval(),
            config.cache_capacity
        );
        Ok(Self { inner })
    }

    /// Single entry point for foreground UI changes. Never blocks.
    pub fn on_snapshot(&self, snapshot: UiSnapshot) {
        if self.inner.cancel.is_cancelled() || !self.inner.engine.handles(&snapshot.source_id) {
            return;
        }

        let key = snapshot.source_id.clone();
        let inner = self.inner.clone();
        self.inner
            .debouncer
            .debounce(&key, move || inner.spawn_cycle(snapshot));
    }

    /// `service_enabled && !tripped && no running pause`.
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Forwards a wake-timer delivery. Returns whether the token was ours.
    pub fn handle_wake(&self, token: &str) -> bool {
        match self.inner.disable.on_wake(token) {
            Ok(handled) => handled,
            Err(err) => {
                self.inner
                    .errors
                    .handle(&GuardError::System(format!("wake handling failed: {err:#}")));
                false
            }
        }
    }

    pub fn reconcile(&self) -> Result<()> {
        self.inner.disable.check_and_reconcile()
    }

    pub fn engine(&self) -> &Arc<DetectionEngine> {
        &self.inner.engine
    }

    pub fn safe_mode(&self) -> &Arc<SafeMode> {
        self.inner.errors.safe_mode()
    }

    pub fn temporary_disable(&self) -> &Arc<TemporaryDisable> {
        &self.inner.disable
    }

    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        &self.inner.dispatcher
    }

    pub fn ui(&self) -> &UiThread {
        &self.inner.ui
    }

    /// Snapshots parked by the debouncer and not yet run.
    pub fn pending_cycles(&self) -> usize {
        self.inner.debouncer.pending_count()
    }

    /// Stops accepting snapshots, drops parked work, waits for in-flight
    /// cycles, removes any cover and stops the UI thread.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return;
        }
        info!("Pipeline shutting down");

        inner.cancel.cancel();
        inner.debouncer.shutdown();
        inner.tracker.close();
        inner.tracker.wait().await;

        inner.dispatcher.cover().cleanup().await;
        inner.errors.safe_mode().shutdown();
        inner.ui.shutdown().await;
        info!("Pipeline stopped");
    }
}

impl PipelineInner {
    fn is_active(&self) -> bool {
        self.settings.settings().service_enabled
            && !self.errors.safe_mode().is_tripped()
            && !self.disable.is_active()
    }

    fn spawn_cycle(self: &Arc<Self>, snapshot: UiSnapshot) {
        if self.cancel.is_cancelled() {
            return;
        }
        let inner = self.clone();
        self.tracker
            .spawn_on(async move { inner.run_cycle(snapshot).await }, &self.runtime);
    }

    async fn run_cycle(self: Arc<Self>, snapshot: UiSnapshot) {
        let cycle = Uuid::new_v4();
        if !self.is_active() {
            log_debug!("[{cycle}] pipeline inactive; ignoring {}", snapshot.source_id);
            return;
        }

        let engine = self.engine.clone();
        let classified = self
            .runtime
            .spawn_blocking(move || {
                let verdict = engine.detect(&snapshot);
                (verdict, snapshot)
            })
            .await;

        let (verdict, snapshot) = match classified {
            Ok(result) => result,
            Err(err) => {
                self.errors
                    .handle(&GuardError::System(format!("classification task failed: {err}")));
                return;
            }
        };

        let Some(verdict) = verdict else {
            return;
        };
        if !verdict.is_target {
            log_debug!("[{cycle}] {} is not a short-video screen", snapshot.cache_key());
            self.errors.safe_mode().record_success();
            return;
        }
        if self.cancel.is_cancelled() {
            return;
        }

        log_info!(
            "[{cycle}] {} detected via {} ({:.2})",
            verdict.platform.surface_name(),
            verdict.method.label(),
            verdict.confidence
        );
        let outcome = self.dispatcher.dispatch(&verdict, &snapshot).await;
        if outcome.is_success() {
            self.errors.safe_mode().record_success();
        } else if outcome == DispatchOutcome::Failed {
            log_info!("[{cycle}] intervention failed; safe mode notified");
        }
    }

    /// Drops cached verdicts as soon as the enabled-platform set changes,
    /// and parked snapshots as soon as the service is switched off.
    fn spawn_settings_watch(self: &Arc<Self>) {
        let mut changes = self.settings.subscribe();
        let engine = self.engine.clone();
        let debouncer = self.debouncer.clone();
        let cancel = self.cancel.clone();

        self.tracker.spawn_on(
            async move {
                let (mut enabled, mut service_enabled) = {
                    let settings = changes.borrow_and_update();
                    (settings.enabled_platforms.clone(), settings.service_enabled)
                };
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        changed = changes.changed() => {
                            if changed.is_err() {
                                log_warn!("Settings store closed; no longer watching for changes");
                                break;
                            }
                            let (next, next_service) = {
                                let settings = changes.borrow_and_update();
                                (settings.enabled_platforms.clone(), settings.service_enabled)
                            };
                            if next != enabled {
                                log_info!("Enabled platforms changed to {next:?}");
                                engine.clear_cache();
                                enabled = next;
                            }
                            if service_enabled && !next_service {
                                log_info!("Service switched off; dropping parked snapshots");
                                debouncer.reset_all();
                            }
                            service_enabled = next_service;
                        }
                    }
                }
            },
            &self.runtime,
        );
    }
}
