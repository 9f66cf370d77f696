//! In-memory fakes of the host capabilities, for tests and for hosts that
//! want to exercise the pipeline without a device.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use crate::disable::WakeTimer;
use crate::event_log::{ErrorRecord, EventLog, InterventionRecord};
use crate::ui::{
    Alert, AlertCategory, AlertSurface, CoverCallback, CoverHandle, InterceptionSurface,
    Navigator, SurfaceError, Surfaces,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Yields to the runtime a few times so freshly woken tasks get to run.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
struct Recorded {
    go_backs: usize,
    cover_shows: usize,
    cover_dismissals: usize,
    next_cover: u64,
    active_cover: Option<CoverHandle>,
    cover_callbacks: Option<(CoverCallback, CoverCallback)>,
    alerts: Vec<Alert>,
    dismissed: Vec<AlertCategory>,
    cover_unavailable: bool,
    go_back_error: Option<SurfaceError>,
    cover_error: Option<SurfaceError>,
    alert_error: Option<SurfaceError>,
}

/// Records every surface call. Clones share the same record.
#[derive(Clone, Default)]
pub struct RecordingSurfaces {
    state: Arc<Mutex<Recorded>>,
}

impl RecordingSurfaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surfaces(&self) -> Surfaces {
        Surfaces::new(
            RecordingNavigator(self.state.clone()),
            RecordingCover(self.state.clone()),
            RecordingAlerts(self.state.clone()),
        )
    }

    pub fn set_cover_available(&self, available: bool) {
        lock(&self.state).cover_unavailable = !available;
    }

    pub fn fail_go_back(&self, err: Option<SurfaceError>) {
        lock(&self.state).go_back_error = err;
    }

    pub fn fail_cover(&self, err: Option<SurfaceError>) {
        lock(&self.state).cover_error = err;
    }

    pub fn fail_alerts(&self, err: Option<SurfaceError>) {
        lock(&self.state).alert_error = err;
    }

    pub fn go_back_count(&self) -> usize {
        lock(&self.state).go_backs
    }

    pub fn cover_show_count(&self) -> usize {
        lock(&self.state).cover_shows
    }

    pub fn cover_dismiss_count(&self) -> usize {
        lock(&self.state).cover_dismissals
    }

    pub fn active_cover(&self) -> Option<CoverHandle> {
        lock(&self.state).active_cover
    }

    pub fn alert_count(&self) -> usize {
        lock(&self.state).alerts.len()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        lock(&self.state).alerts.clone()
    }

    pub fn alerts_in(&self, category: AlertCategory) -> usize {
        lock(&self.state)
            .alerts
            .iter()
            .filter(|alert| alert.category == category)
            .count()
    }

    pub fn alert_titles(&self) -> Vec<String> {
        lock(&self.state)
            .alerts
            .iter()
            .map(|alert| alert.title.clone())
            .collect()
    }

    pub fn dismissals_of(&self, category: AlertCategory) -> usize {
        lock(&self.state)
            .dismissed
            .iter()
            .filter(|dismissed| **dismissed == category)
            .count()
    }

    /// Simulates the user pressing "go back" on the visible cover.
    pub fn press_cover_go_back(&self) -> Result<()> {
        let (on_go_back, _) = self.take_callbacks()?;
        on_go_back();
        Ok(())
    }

    /// Simulates the user choosing to pause blocking from the visible cover.
    pub fn press_cover_suspend(&self) -> Result<()> {
        let (_, on_suspend) = self.take_callbacks()?;
        on_suspend();
        Ok(())
    }

    fn take_callbacks(&self) -> Result<(CoverCallback, CoverCallback)> {
        lock(&self.state)
            .cover_callbacks
            .take()
            .ok_or_else(|| anyhow!("no cover is showing"))
    }
}

struct RecordingNavigator(Arc<Mutex<Recorded>>);

impl Navigator for RecordingNavigator {
    fn go_back(&mut self) -> Result<(), SurfaceError> {
        let mut state = lock(&self.0);
        if let Some(err) = state.go_back_error.clone() {
            return Err(err);
        }
        state.go_backs += 1;
        Ok(())
    }
}

struct RecordingCover(Arc<Mutex<Recorded>>);

impl InterceptionSurface for RecordingCover {
    fn can_show(&self) -> bool {
        !lock(&self.0).cover_unavailable
    }

    fn show(
        &mut self,
        on_go_back: CoverCallback,
        on_suspend: CoverCallback,
    ) -> Result<CoverHandle, SurfaceError> {
        let mut state = lock(&self.0);
        if let Some(err) = state.cover_error.clone() {
            return Err(err);
        }
        state.next_cover += 1;
        let handle = CoverHandle(state.next_cover);
        state.cover_shows += 1;
        state.active_cover = Some(handle);
        state.cover_callbacks = Some((on_go_back, on_suspend));
        Ok(handle)
    }

    fn dismiss(&mut self, handle: CoverHandle) -> Result<(), SurfaceError> {
        let mut state = lock(&self.0);
        if state.active_cover == Some(handle) {
            state.active_cover = None;
            state.cover_callbacks = None;
            state.cover_dismissals += 1;
        }
        Ok(())
    }
}

struct RecordingAlerts(Arc<Mutex<Recorded>>);

impl AlertSurface for RecordingAlerts {
    fn show(&mut self, alert: &Alert) -> Result<(), SurfaceError> {
        let mut state = lock(&self.0);
        if let Some(err) = state.alert_error.clone() {
            return Err(err);
        }
        state.alerts.push(alert.clone());
        Ok(())
    }

    fn dismiss(&mut self, category: AlertCategory) {
        lock(&self.0).dismissed.push(category);
    }
}

/// Keeps every record in memory.
#[derive(Default)]
pub struct MemoryEventLog {
    interventions: Mutex<Vec<InterventionRecord>>,
    errors: Mutex<Vec<ErrorRecord>>,
}

impl MemoryEventLog {
    pub fn interventions(&self) -> Vec<InterventionRecord> {
        lock(&self.interventions).clone()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        lock(&self.errors).clone()
    }
}

impl EventLog for MemoryEventLog {
    fn record_intervention(&self, record: InterventionRecord) {
        lock(&self.interventions).push(record);
    }

    fn record_error(&self, record: ErrorRecord) {
        lock(&self.errors).push(record);
    }
}

/// Wake timer that only remembers what it was asked to do.
#[derive(Default)]
pub struct RecordingWakeTimer {
    armed: Mutex<Vec<(DateTime<Utc>, String)>>,
    disarmed: Mutex<Vec<String>>,
    fail_arm: Mutex<bool>,
}

impl RecordingWakeTimer {
    pub fn armed(&self) -> Vec<(DateTime<Utc>, String)> {
        lock(&self.armed).clone()
    }

    pub fn disarm_count(&self) -> usize {
        lock(&self.disarmed).len()
    }

    pub fn set_fail_arm(&self, fail: bool) {
        *lock(&self.fail_arm) = fail;
    }
}

impl WakeTimer for RecordingWakeTimer {
    fn arm(&self, at: DateTime<Utc>, token: &str) -> Result<()> {
        if *lock(&self.fail_arm) {
            return Err(anyhow!("alarm permission missing"));
        }
        lock(&self.armed).push((at, token.to_string()));
        Ok(())
    }

    fn disarm(&self, token: &str) {
        lock(&self.disarmed).push(token.to_string());
    }
}
