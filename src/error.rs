//! Failure taxonomy of the pipeline and the single place failures are routed.

use std::sync::Arc;

use log::{error, warn};
use thiserror::Error;

use crate::event_log::{ErrorRecord, EventLog};
use crate::models::{InterventionKind, Platform};
use crate::safe_mode::SafeMode;
use crate::ui::{alerts, SurfaceError, UiThread};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GuardError {
    #[error("permission denied: {capability}")]
    PermissionDenied { capability: String },

    #[error("{} classifier failed: {message}", platform.as_str())]
    Classification { platform: Platform, message: String },

    #[error("{} action failed: {message}", kind.as_str())]
    Action {
        kind: InterventionKind,
        message: String,
        retryable: bool,
    },

    #[error("system failure: {0}")]
    System(String),
}

impl GuardError {
    pub fn kind(&self) -> &'static str {
        match self {
            GuardError::PermissionDenied { .. } => "permission",
            GuardError::Classification { .. } => "classification",
            GuardError::Action { .. } => "action",
            GuardError::System(_) => "system",
        }
    }

    /// Maps a surface failure raised while performing `kind`.
    pub fn from_surface(kind: InterventionKind, err: SurfaceError) -> Self {
        match err {
            SurfaceError::PermissionDenied { capability } => {
                GuardError::PermissionDenied { capability }
            }
            SurfaceError::Unavailable(message) => GuardError::Action {
                kind,
                message,
                retryable: true,
            },
            SurfaceError::Failed(message) => GuardError::Action {
                kind,
                message,
                retryable: false,
            },
        }
    }
}

/// Logs, records and routes failures. Everything except a permission
/// denial counts toward safe mode; permission denials become an alert.
pub struct ErrorHandler {
    safe_mode: Arc<SafeMode>,
    event_log: Arc<dyn EventLog>,
    ui: UiThread,
}

impl ErrorHandler {
    pub fn new(safe_mode: Arc<SafeMode>, event_log: Arc<dyn EventLog>, ui: UiThread) -> Self {
        Self {
            safe_mode,
            event_log,
            ui,
        }
    }

    pub fn handle(&self, err: &GuardError) {
        match err {
            GuardError::PermissionDenied { capability } => {
                warn!("Permission missing: {capability}");
            }
            GuardError::Action {
                retryable: true, ..
            } => warn!("{err}"),
            _ => error!("{err}"),
        }

        self.event_log.record_error(ErrorRecord::from(err));

        if let GuardError::PermissionDenied { capability } = err {
            let alert = alerts::permission_required(capability);
            self.ui.post(move |surfaces| {
                if let Err(show_err) = surfaces.alerts.show(&alert) {
                    error!("Failed to show permission alert: {show_err}");
                }
            });
            return;
        }

        self.safe_mode.record_failure();
    }

    pub fn safe_mode(&self) -> &Arc<SafeMode> {
        &self.safe_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SafeModeConfig;
    use crate::testing::{MemoryEventLog, RecordingSurfaces};
    use crate::ui::AlertCategory;

    fn handler(recording: &RecordingSurfaces, log: Arc<MemoryEventLog>) -> ErrorHandler {
        let ui = UiThread::new(recording.surfaces()).unwrap();
        let safe_mode = SafeMode::new(
            SafeModeConfig::default(),
            ui.clone(),
            tokio::runtime::Handle::current(),
        );
        ErrorHandler::new(safe_mode, log, ui)
    }

    #[tokio::test]
    async fn permission_denial_alerts_without_counting() {
        let recording = RecordingSurfaces::new();
        let log = Arc::new(MemoryEventLog::default());
        let handler = handler(&recording, log.clone());

        handler.handle(&GuardError::PermissionDenied {
            capability: "overlay".into(),
        });
        handler.ui.flush().await.unwrap();

        assert_eq!(handler.safe_mode().state().consecutive_failures, 0);
        assert_eq!(recording.alerts_in(AlertCategory::Permission), 1);
        assert_eq!(log.errors()[0].kind, "permission");
    }

    #[tokio::test]
    async fn other_failures_feed_safe_mode() {
        let recording = RecordingSurfaces::new();
        let log = Arc::new(MemoryEventLog::default());
        let handler = handler(&recording, log.clone());

        handler.handle(&GuardError::Classification {
            platform: Platform::YouTube,
            message: "bad tree".into(),
        });
        handler.handle(&GuardError::System("worker panicked".into()));

        assert_eq!(handler.safe_mode().state().consecutive_failures, 2);
        assert_eq!(log.errors().len(), 2);
        handler.safe_mode().shutdown();
    }

    #[test]
    fn surface_errors_map_to_taxonomy() {
        let err = GuardError::from_surface(
            InterventionKind::Cover,
            SurfaceError::Unavailable("no window".into()),
        );
        assert!(matches!(err, GuardError::Action { retryable: true, .. }));
        assert!(matches!(
            GuardError::from_surface(
                InterventionKind::Alert,
                SurfaceError::PermissionDenied {
                    capability: "notifications".into()
                }
            ),
            GuardError::PermissionDenied { .. }
        ));
    }
}
