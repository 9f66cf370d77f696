//! Safe mode: a circuit breaker over consecutive pipeline failures.
//!
//! ```text
//!   Normal ──(failure_threshold consecutive failures)──> Tripped
//!   Tripped ──(cooldown elapsed | exit())──> Normal
//! ```
//!
//! A failure (re)arms a reset timer that zeroes the counter after a quiet
//! period. Entering and leaving the tripped state raise an alert.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex, MutexGuard, Weak,
    },
    time::Duration,
};

use log::{error, info, warn};
use serde::Serialize;
use tokio::{runtime::Handle, task::JoinHandle, time::Instant};

use crate::config::SafeModeConfig;
use crate::ui::{alerts, Alert, UiThread};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerState {
    pub consecutive_failures: u32,
    pub is_tripped: bool,
    #[serde(skip)]
    pub tripped_until: Option<Instant>,
}

pub struct SafeMode {
    config: SafeModeConfig,
    consecutive_failures: AtomicU32,
    tripped: AtomicBool,
    closed: AtomicBool,
    tripped_until: Mutex<Option<Instant>>,
    reset_timer: Mutex<Option<JoinHandle<()>>>,
    cooldown_timer: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
    ui: UiThread,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn replace_timer(slot: &Mutex<Option<JoinHandle<()>>>, next: Option<JoinHandle<()>>) {
    if let Some(previous) = std::mem::replace(&mut *lock(slot), next) {
        previous.abort();
    }
}

impl SafeMode {
    pub fn new(config: SafeModeConfig, ui: UiThread, runtime: Handle) -> Arc<Self> {
        Arc::new(Self {
            config,
            consecutive_failures: AtomicU32::new(0),
            tripped: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            tripped_until: Mutex::new(None),
            reset_timer: Mutex::new(None),
            cooldown_timer: Mutex::new(None),
            runtime,
            ui,
        })
    }

    pub fn record_failure(self: &Arc<Self>) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        warn!(
            "Pipeline failure {failures}/{} recorded",
            self.config.failure_threshold
        );

        let reset = self.spawn_after(self.config.failure_reset(), |safe_mode| {
            safe_mode.consecutive_failures.store(0, Ordering::Release);
            info!("Failure counter reset after quiet period");
        });
        replace_timer(&self.reset_timer, Some(reset));

        if failures >= self.config.failure_threshold && self.trip() {
            self.enter();
        }
    }

    /// Zeroes the counter; the tripped state is left alone.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        replace_timer(&self.reset_timer, None);
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    pub fn state(&self) -> BreakerState {
        // `tripped` and `tripped_until` only change together under this lock.
        let tripped_until = lock(&self.tripped_until);
        BreakerState {
            consecutive_failures: self.consecutive_failures.load(Ordering::Acquire),
            is_tripped: self.is_tripped(),
            tripped_until: *tripped_until,
        }
    }

    /// Forces the breaker back to normal. Returns whether it was tripped.
    pub fn exit(&self) -> bool {
        replace_timer(&self.cooldown_timer, None);
        self.leave("manual override")
    }

    /// Cancels both timers and ignores failures from now on.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        replace_timer(&self.reset_timer, None);
        replace_timer(&self.cooldown_timer, None);
    }

    /// Normal -> Tripped. Only the caller that wins the transition gets
    /// `true`.
    fn trip(&self) -> bool {
        let mut tripped_until = lock(&self.tripped_until);
        if self.tripped.load(Ordering::Acquire) {
            return false;
        }
        *tripped_until = Some(Instant::now() + self.config.cooldown());
        self.tripped.store(true, Ordering::Release);
        true
    }

    fn enter(self: &Arc<Self>) {
        let cooldown = self.config.cooldown();
        error!(
            "Safe mode activated after {} consecutive failures; pausing for {cooldown:?}",
            self.config.failure_threshold
        );

        let timer = self.spawn_after(cooldown, |safe_mode| {
            // The timer is finishing; drop its own handle rather than abort it.
            lock(&safe_mode.cooldown_timer).take();
            safe_mode.leave("cooldown elapsed");
        });
        replace_timer(&self.cooldown_timer, Some(timer));

        self.show(alerts::safe_mode_entered(cooldown));
    }

    fn leave(&self, reason: &str) -> bool {
        {
            let mut tripped_until = lock(&self.tripped_until);
            if !self.tripped.swap(false, Ordering::AcqRel) {
                return false;
            }
            tripped_until.take();
        }
        self.consecutive_failures.store(0, Ordering::Release);
        info!("Safe mode deactivated ({reason})");
        self.show(alerts::safe_mode_exited());
        true
    }

    fn show(&self, alert: Alert) {
        self.ui.post(move |surfaces| {
            if let Err(err) = surfaces.alerts.show(&alert) {
                error!("Failed to show safe mode alert: {err}");
            }
        });
    }

    fn spawn_after<F>(self: &Arc<Self>, delay: Duration, on_fire: F) -> JoinHandle<()>
    where
        F: FnOnce(Arc<SafeMode>) + Send + 'static,
    {
        let weak: Weak<SafeMode> = Arc::downgrade(self);
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(safe_mode) = weak.upgrade() {
                on_fire(safe_mode);
            }
        })
    }
}

impl Drop for SafeMode {
    fn drop(&mut self) {
        self.shutdown();
    }
}
