//! Short-form-video detection and intervention pipeline.
//!
//! The host feeds foreground UI snapshots into [`Pipeline::on_snapshot`];
//! the pipeline decides whether a YouTube Shorts, Instagram Reels or TikTok
//! feed is on screen and intervenes through the host's surfaces.

pub mod action;
pub mod clock;
pub mod config;
mod db;
pub mod debounce;
pub mod detection;
pub mod disable;
pub mod error;
pub mod event_log;
pub mod models;
pub mod pipeline;
pub mod safe_mode;
pub mod settings;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod ui;
mod utils;

pub use action::{ActionDispatcher, CoverController, CoverOutcome, DispatchOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DetectionConfig, GuardConfig, SafeModeConfig};
pub use db::SqliteEventLog;
pub use debounce::RateDebouncer;
pub use detection::{Classifier, DetectionEngine};
pub use disable::{TemporaryDisable, WakeTimer, WAKE_TOKEN};
pub use error::{ErrorHandler, GuardError};
pub use event_log::{ErrorRecord, EventLog, InterventionRecord, NullEventLog};
pub use models::{DetectionMethod, InterventionKind, Platform, UiElement, UiSnapshot, Verdict};
pub use pipeline::{GuardContext, Pipeline};
pub use safe_mode::{BreakerState, SafeMode};
pub use settings::{FileSettingsStore, Settings, SettingsStore};
pub use ui::{
    Alert, AlertCategory, AlertPriority, AlertSurface, CoverCallback, CoverHandle,
    InterceptionSurface, Navigator, SurfaceError, Surfaces, UiThread,
};

/// Installs `env_logger` reading `RUST_LOG`, defaulting to `info`. Calling
/// it again is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
