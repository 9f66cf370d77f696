use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use super::cover::{CoverController, CoverOutcome};
use crate::error::{ErrorHandler, GuardError};
use crate::event_log::{EventLog, InterventionRecord};
use crate::models::{InterventionKind, UiSnapshot, Verdict};
use crate::settings::SettingsStore;
use crate::ui::{alerts, SurfaceError, UiThread};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum DispatchOutcome {
    Performed {
        kind: InterventionKind,
    },
    FellBack {
        requested: InterventionKind,
        performed: InterventionKind,
    },
    /// A cover from an earlier dispatch is still up.
    AlreadyCovered,
    PermissionDenied {
        capability: String,
    },
    Failed,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            DispatchOutcome::Performed { .. }
                | DispatchOutcome::FellBack { .. }
                | DispatchOutcome::AlreadyCovered
        )
    }
}

/// What the primary step of a kind ended up doing.
enum Primary {
    Done,
    Covered,
    CoverUnavailable,
}

pub struct ActionDispatcher {
    ui: UiThread,
    cover: Arc<CoverController>,
    settings: Arc<dyn SettingsStore>,
    event_log: Arc<dyn EventLog>,
    errors: Arc<ErrorHandler>,
}

impl ActionDispatcher {
    pub fn new(
        ui: UiThread,
        cover: Arc<CoverController>,
        settings: Arc<dyn SettingsStore>,
        event_log: Arc<dyn EventLog>,
        errors: Arc<ErrorHandler>,
    ) -> Self {
        Self {
            ui,
            cover,
            settings,
            event_log,
            errors,
        }
    }

    pub fn cover(&self) -> &Arc<CoverController> {
        &self.cover
    }

    /// Runs the configured intervention for a positive verdict. Never fails:
    /// errors are routed to the error handler and the fallback chain.
    pub async fn dispatch(&self, verdict: &Verdict, snapshot: &UiSnapshot) -> DispatchOutcome {
        let requested = self.settings.settings().intervention_kind;

        let outcome = match self.primary(requested, verdict).await {
            Ok(Primary::Done) => DispatchOutcome::Performed { kind: requested },
            Ok(Primary::Covered) => DispatchOutcome::AlreadyCovered,
            Ok(Primary::CoverUnavailable) => {
                info!("Cover unavailable; going back instead");
                self.fallback(
                    requested,
                    verdict,
                    &[InterventionKind::GoBack, InterventionKind::Alert],
                    None,
                )
                .await
            }
            Err(err) => {
                self.errors.handle(&err);
                let chain: &[InterventionKind] = match requested {
                    InterventionKind::GoBack => &[InterventionKind::Alert],
                    InterventionKind::Alert => &[InterventionKind::GoBack],
                    _ => &[InterventionKind::GoBack, InterventionKind::Alert],
                };
                self.fallback(requested, verdict, chain, denied_capability(&err))
                    .await
            }
        };

        if requested == InterventionKind::Combined && outcome.is_success() {
            let ended_on_alert = matches!(
                outcome,
                DispatchOutcome::FellBack {
                    performed: InterventionKind::Alert,
                    ..
                }
            );
            if !ended_on_alert {
                self.post_detail_alert(verdict);
            }
        }

        if let Some(action) = performed_kind(&outcome) {
            self.event_log
                .record_intervention(InterventionRecord::new(verdict, action, &snapshot.source_id));
        }

        info!(
            "Dispatched {} for {}: {outcome:?}",
            requested.as_str(),
            verdict.platform.as_str()
        );
        outcome
    }

    async fn primary(
        &self,
        kind: InterventionKind,
        verdict: &Verdict,
    ) -> Result<Primary, GuardError> {
        match kind {
            InterventionKind::GoBack => self.go_back(verdict).await.map(|_| Primary::Done),
            InterventionKind::Alert => self.detail_alert(verdict).await.map(|_| Primary::Done),
            InterventionKind::Cover | InterventionKind::Combined => {
                match self.cover.show().await {
                    Ok(CoverOutcome::Shown(_)) => Ok(Primary::Done),
                    Ok(CoverOutcome::AlreadyActive) => Ok(Primary::Covered),
                    Ok(CoverOutcome::Unavailable) => Ok(Primary::CoverUnavailable),
                    Err(err) => Err(GuardError::from_surface(kind, err)),
                }
            }
        }
    }

    /// Tries each step in turn; every failed step is reported. If nothing
    /// works and a permission was missing along the way, the outcome names
    /// that capability.
    async fn fallback(
        &self,
        requested: InterventionKind,
        verdict: &Verdict,
        chain: &[InterventionKind],
        mut denied: Option<String>,
    ) -> DispatchOutcome {
        for &step in chain {
            let result = match step {
                InterventionKind::Alert => self.detail_alert(verdict).await,
                _ => self.go_back(verdict).await,
            };
            match result {
                Ok(()) => {
                    return DispatchOutcome::FellBack {
                        requested,
                        performed: step,
                    }
                }
                Err(err) => {
                    self.errors.handle(&err);
                    if denied.is_none() {
                        denied = denied_capability(&err);
                    }
                }
            }
        }
        warn!("Every intervention for {} failed", verdict.platform.as_str());
        match denied {
            Some(capability) => DispatchOutcome::PermissionDenied { capability },
            None => DispatchOutcome::Failed,
        }
    }

    /// Goes back, then confirms with a brief alert. Only the navigation
    /// counts toward success.
    async fn go_back(&self, verdict: &Verdict) -> Result<(), GuardError> {
        let brief = alerts::intervention_brief(verdict);
        self.ui
            .execute(move |surfaces| -> Result<(), SurfaceError> {
                surfaces.navigator.go_back()?;
                if let Err(err) = surfaces.alerts.show(&brief) {
                    warn!("Brief alert after going back failed: {err}");
                }
                Ok(())
            })
            .await
            .map_err(|err| GuardError::System(format!("{err:#}")))?
            .map_err(|err| GuardError::from_surface(InterventionKind::GoBack, err))
    }

    async fn detail_alert(&self, verdict: &Verdict) -> Result<(), GuardError> {
        let detail = alerts::intervention_detail(verdict);
        self.ui
            .execute(move |surfaces| surfaces.alerts.show(&detail))
            .await
            .map_err(|err| GuardError::System(format!("{err:#}")))?
            .map_err(|err| GuardError::from_surface(InterventionKind::Alert, err))
    }

    /// Best-effort extra alert for `Combined`; outside the fallback chain.
    fn post_detail_alert(&self, verdict: &Verdict) {
        let detail = alerts::intervention_detail(verdict);
        self.ui.post(move |surfaces| {
            if let Err(err) = surfaces.alerts.show(&detail) {
                warn!("Combined detail alert failed: {err}");
            }
        });
    }
}

fn denied_capability(err: &GuardError) -> Option<String> {
    match err {
        GuardError::PermissionDenied { capability } => Some(capability.clone()),
        _ => None,
    }
}

fn performed_kind(outcome: &DispatchOutcome) -> Option<InterventionKind> {
    match outcome {
        DispatchOutcome::Performed { kind } => Some(*kind),
        DispatchOutcome::FellBack { performed, .. } => Some(*performed),
        _ => None,
    }
}
