//! Process-wide owner of the full-screen cover.
//!
//! At most one cover is visible. Every check-and-show runs on the UI thread,
//! which makes the `active` slot the single point of mutual exclusion. A
//! cover goes away through one of its buttons, the auto-dismiss timer or
//! [`CoverController::cleanup`].

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use log::{error, info, warn};
use tokio::{runtime::Handle, task::JoinHandle};

use crate::disable::TemporaryDisable;
use crate::ui::{CoverHandle, SurfaceError, Surfaces, UiThread};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverOutcome {
    Shown(CoverHandle),
    AlreadyActive,
    /// The surface reported it cannot show right now.
    Unavailable,
}

struct ActiveCover {
    id: u64,
    handle: CoverHandle,
    auto_dismiss: Option<JoinHandle<()>>,
}

type ActiveSlot = Arc<Mutex<Option<ActiveCover>>>;

fn lock(slot: &ActiveSlot) -> MutexGuard<'_, Option<ActiveCover>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Dismisses the cover if it is still the one identified by `id`. Must run
/// on the UI thread.
fn dismiss_if_current(surfaces: &mut Surfaces, active: &ActiveSlot, id: u64, reason: &str) -> bool {
    let current = {
        let mut guard = lock(active);
        match guard.as_ref() {
            Some(cover) if cover.id == id => guard.take(),
            _ => None,
        }
    };
    let Some(cover) = current else {
        return false;
    };

    if let Some(timer) = cover.auto_dismiss {
        timer.abort();
    }
    if let Err(err) = surfaces.cover.dismiss(cover.handle) {
        error!("Failed to dismiss cover {:?}: {err}", cover.handle);
    }
    info!("Cover dismissed ({reason})");
    true
}

pub struct CoverController {
    ui: UiThread,
    active: ActiveSlot,
    next_id: AtomicU64,
    auto_dismiss_after: Duration,
    suspend_minutes: i64,
    disable: Arc<TemporaryDisable>,
    runtime: Handle,
}

impl CoverController {
    pub fn new(
        ui: UiThread,
        disable: Arc<TemporaryDisable>,
        auto_dismiss_after: Duration,
        suspend_minutes: i64,
        runtime: Handle,
    ) -> Self {
        Self {
            ui,
            active: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
            auto_dismiss_after,
            suspend_minutes,
            disable,
            runtime,
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub async fn show(&self) -> Result<CoverOutcome, SurfaceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = self.active.clone();
        let ui = self.ui.clone();
        let disable = self.disable.clone();
        let runtime = self.runtime.clone();
        let auto_dismiss_after = self.auto_dismiss_after;
        let suspend_minutes = self.suspend_minutes;

        self.ui
            .execute(move |surfaces| -> Result<CoverOutcome, SurfaceError> {
                if lock(&active).is_some() {
                    return Ok(CoverOutcome::AlreadyActive);
                }
                if !surfaces.cover.can_show() {
                    return Ok(CoverOutcome::Unavailable);
                }

                let on_go_back = {
                    let ui = ui.clone();
                    let active = active.clone();
                    Box::new(move || {
                        ui.post(move |surfaces| {
                            dismiss_if_current(surfaces, &active, id, "user went back");
                            if let Err(err) = surfaces.navigator.go_back() {
                                error!("Go back from cover failed: {err}");
                            }
                        });
                    })
                };
                let on_suspend = {
                    let ui = ui.clone();
                    let active = active.clone();
                    Box::new(move || {
                        ui.post(move |surfaces| {
                            dismiss_if_current(surfaces, &active, id, "user paused blocking");
                        });
                        if let Err(err) = disable.schedule(suspend_minutes) {
                            error!("Failed to pause blocking from cover: {err:#}");
                        }
                    })
                };

                let handle = surfaces.cover.show(on_go_back, on_suspend)?;

                let auto_dismiss = {
                    let ui = ui.clone();
                    let active = active.clone();
                    runtime.spawn(async move {
                        tokio::time::sleep(auto_dismiss_after).await;
                        ui.post(move |surfaces| {
                            dismiss_if_current(surfaces, &active, id, "timed out");
                        });
                    })
                };

                *lock(&active) = Some(ActiveCover {
                    id,
                    handle,
                    auto_dismiss: Some(auto_dismiss),
                });
                Ok(CoverOutcome::Shown(handle))
            })
            .await
            .map_err(|err| SurfaceError::Failed(format!("{err:#}")))?
    }

    /// Dismisses whatever cover is showing. Used on shutdown.
    pub async fn cleanup(&self) {
        let Some(id) = lock(&self.active).as_ref().map(|cover| cover.id) else {
            return;
        };
        let active = self.active.clone();
        if let Err(err) = self
            .ui
            .execute(move |surfaces| dismiss_if_current(surfaces, &active, id, "cleanup"))
            .await
        {
            warn!("Cover cleanup could not reach the UI thread: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::settings::{FileSettingsStore, Settings, SettingsStore};
    use crate::testing::{RecordingSurfaces, RecordingWakeTimer};

    struct Fixture {
        cover: CoverController,
        settings: Arc<FileSettingsStore>,
        recording: RecordingSurfaces,
        ui: UiThread,
    }

    fn fixture(auto_dismiss: Duration) -> Fixture {
        let recording = RecordingSurfaces::new();
        let ui = UiThread::new(recording.surfaces()).unwrap();
        let settings = Arc::new(FileSettingsStore::in_memory(Settings::default()));
        let disable = Arc::new(TemporaryDisable::new(
            settings.clone(),
            Arc::new(RecordingWakeTimer::default()),
            Arc::new(SystemClock),
            ui.clone(),
        ));
        let cover = CoverController::new(ui.clone(), disable, auto_dismiss, 30, Handle::current());
        Fixture {
            cover,
            settings,
            recording,
            ui,
        }
    }

    #[tokio::test]
    async fn second_show_is_a_no_op() {
        let fx = fixture(Duration::from_secs(10));

        assert!(matches!(fx.cover.show().await, Ok(CoverOutcome::Shown(_))));
        assert_eq!(fx.cover.show().await, Ok(CoverOutcome::AlreadyActive));
        assert_eq!(fx.recording.cover_show_count(), 1);

        fx.cover.cleanup().await;
        assert!(!fx.cover.is_active());
        assert_eq!(fx.recording.cover_dismiss_count(), 1);
    }

    #[tokio::test]
    async fn unavailable_surface_is_reported() {
        let fx = fixture(Duration::from_secs(10));
        fx.recording.set_cover_available(false);
        assert_eq!(fx.cover.show().await, Ok(CoverOutcome::Unavailable));
        assert_eq!(fx.recording.cover_show_count(), 0);
    }

    #[tokio::test]
    async fn go_back_button_dismisses_and_navigates() {
        let fx = fixture(Duration::from_secs(10));
        fx.cover.show().await.unwrap();

        fx.recording.press_cover_go_back().unwrap();
        fx.ui.flush().await.unwrap();

        assert!(!fx.cover.is_active());
        assert_eq!(fx.recording.go_back_count(), 1);
        assert!(fx.recording.active_cover().is_none());
    }

    #[tokio::test]
    async fn suspend_button_pauses_blocking() {
        let fx = fixture(Duration::from_secs(10));
        fx.cover.show().await.unwrap();

        fx.recording.press_cover_suspend().unwrap();
        fx.ui.flush().await.unwrap();

        assert!(!fx.cover.is_active());
        assert!(fx.settings.settings().disable_until.is_some());
    }

    #[tokio::test]
    async fn cover_times_out() {
        let fx = fixture(Duration::from_millis(20));
        fx.cover.show().await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        fx.ui.flush().await.unwrap();

        assert!(!fx.cover.is_active());
        assert_eq!(fx.recording.cover_dismiss_count(), 1);

        assert!(matches!(fx.cover.show().await, Ok(CoverOutcome::Shown(_))));
        fx.cover.cleanup().await;
    }
}
