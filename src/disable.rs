//! User-requested pause of the blocker for a number of minutes.
//!
//! The end of the pause lives in [`Settings::disable_until`] so it survives
//! restarts. A host wake timer is armed for that instant; since delivery is
//! best-effort, [`TemporaryDisable::check_and_reconcile`] cleans up a
//! window whose wake-up was missed.
//!
//! [`Settings::disable_until`]: crate::settings::Settings::disable_until

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};

use crate::clock::Clock;
use crate::settings::SettingsStore;
use crate::ui::{alerts, Alert, AlertCategory, UiThread};

/// Token the wake timer is armed with.
pub const WAKE_TOKEN: &str = "shortguard.re-enable";

/// Host alarm that calls back into [`crate::Pipeline::handle_wake`].
pub trait WakeTimer: Send + Sync {
    fn arm(&self, at: DateTime<Utc>, token: &str) -> Result<()>;

    fn disarm(&self, token: &str);
}

pub struct TemporaryDisable {
    settings: Arc<dyn SettingsStore>,
    wake: Arc<dyn WakeTimer>,
    clock: Arc<dyn Clock>,
    ui: UiThread,
}

impl TemporaryDisable {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        wake: Arc<dyn WakeTimer>,
        clock: Arc<dyn Clock>,
        ui: UiThread,
    ) -> Self {
        Self {
            settings,
            wake,
            clock,
            ui,
        }
    }

    pub fn schedule(&self, minutes: i64) -> Result<()> {
        if minutes <= 0 {
            return self.cancel();
        }

        let end = self.clock.now() + Duration::minutes(minutes);
        self.settings.set_disable_until(Some(end))?;

        // The window is already persisted; a missing alarm is caught by the
        // enabled check and the next reconcile.
        if let Err(err) = self.wake.arm(end, WAKE_TOKEN) {
            warn!("Failed to arm re-enable timer: {err:#}");
        }

        info!("Blocker paused for {minutes} minutes (until {end})");
        self.show(alerts::paused(minutes));
        Ok(())
    }

    pub fn cancel(&self) -> Result<()> {
        self.settings.set_disable_until(None)?;
        self.wake.disarm(WAKE_TOKEN);
        self.dismiss_paused();
        info!("Temporary disable cancelled");
        Ok(())
    }

    /// Brings timer and alert in line with the persisted window. Safe to
    /// call any number of times.
    pub fn check_and_reconcile(&self) -> Result<()> {
        match self.end_time() {
            None => {
                self.wake.disarm(WAKE_TOKEN);
                self.dismiss_paused();
            }
            Some(end) if self.clock.now() >= end => {
                info!("Pause ended at {end} without a wake-up; re-enabling");
                self.settings.set_disable_until(None)?;
                self.wake.disarm(WAKE_TOKEN);
                self.dismiss_paused();
                self.show(alerts::resumed());
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Handles a wake-timer delivery. Returns `false` for foreign tokens.
    pub fn on_wake(&self, token: &str) -> Result<bool> {
        if token != WAKE_TOKEN {
            return Ok(false);
        }

        let was_paused = self.end_time().is_some();
        self.settings.set_disable_until(None)?;
        self.dismiss_paused();
        if was_paused {
            info!("Pause over; blocker re-enabled");
            self.show(alerts::resumed());
        }
        Ok(true)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.settings.settings().disable_until
    }

    /// True while a window is set and has not yet passed, reconciled or not.
    pub fn is_active(&self) -> bool {
        self.end_time().is_some_and(|end| self.clock.now() < end)
    }

    pub fn remaining(&self) -> Option<Duration> {
        let end = self.end_time()?;
        let remaining = end - self.clock.now();
        (remaining > Duration::zero()).then_some(remaining)
    }

    fn show(&self, alert: Alert) {
        self.ui.post(move |surfaces| {
            if let Err(err) = surfaces.alerts.show(&alert) {
                error!("Failed to show {:?} alert: {err}", alert.category);
            }
        });
    }

    fn dismiss_paused(&self) {
        self.ui
            .post(|surfaces| surfaces.alerts.dismiss(AlertCategory::Paused));
    }
}
