mod common;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Duration;
use common::{eventually, harness, harness_with, home_snapshot, quiet_period, shorts_snapshot};
use shortguard::{
    AlertCategory, Classifier, GuardConfig, InterventionKind, Platform, Settings, SettingsStore,
    UiSnapshot, Verdict, WAKE_TOKEN,
};

#[tokio::test]
async fn shorts_player_with_go_back_navigates_once_and_alerts_once() {
    let h = harness(Settings::default());

    h.pipeline.on_snapshot(shorts_snapshot());

    assert!(eventually(|| h.recording.go_back_count() == 1).await);
    assert!(eventually(|| h.log.interventions().len() == 1).await);
    h.pipeline.ui().flush().await.unwrap();

    assert_eq!(h.recording.go_back_count(), 1);
    assert_eq!(h.recording.alerts_in(AlertCategory::Intervention), 1);
    assert_eq!(h.recording.alert_count(), 1);

    let record = &h.log.interventions()[0];
    assert_eq!(record.platform, Platform::YouTube);
    assert_eq!(record.action, InterventionKind::GoBack);
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn regular_screens_and_foreign_apps_are_left_alone() {
    let h = harness(Settings::default());

    h.pipeline.on_snapshot(home_snapshot());
    h.pipeline
        .on_snapshot(UiSnapshot::new("com.android.chrome", None, vec![]));
    quiet_period().await;

    assert_eq!(h.recording.go_back_count(), 0);
    assert_eq!(h.recording.alert_count(), 0);
    assert!(h.pipeline.engine().cache_stats().0 <= 1);
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn disabled_platform_and_disabled_service_do_nothing() {
    let h = harness(Settings::default());
    h.settings
        .set_platform_enabled(Platform::YouTube, false)
        .unwrap();
    h.pipeline.on_snapshot(shorts_snapshot());
    quiet_period().await;
    assert_eq!(h.recording.go_back_count(), 0);
    h.pipeline.shutdown().await;

    let h = harness(Settings {
        service_enabled: false,
        ..Settings::default()
    });
    assert!(!h.pipeline.is_active());
    h.pipeline.on_snapshot(shorts_snapshot());
    quiet_period().await;
    assert_eq!(h.recording.go_back_count(), 0);
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn cover_unavailable_falls_back_to_go_back() {
    let h = harness(Settings {
        intervention_kind: InterventionKind::Cover,
        ..Settings::default()
    });
    h.recording.set_cover_available(false);

    h.pipeline.on_snapshot(shorts_snapshot());

    assert!(eventually(|| h.recording.go_back_count() == 1).await);
    assert_eq!(h.recording.cover_show_count(), 0);
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn pause_suspends_pipeline_until_window_passes() {
    let h = harness(Settings::default());

    h.pipeline.temporary_disable().schedule(30).unwrap();
    assert!(!h.pipeline.is_active());
    assert_eq!(h.wake.armed()[0].1, WAKE_TOKEN);

    h.pipeline.on_snapshot(shorts_snapshot());
    quiet_period().await;
    assert_eq!(h.recording.go_back_count(), 0);

    h.pipeline.reconcile().unwrap();
    assert!(h.pipeline.temporary_disable().is_active());

    // An expired window stops pausing the pipeline even before reconcile.
    h.clock.advance(Duration::minutes(31));
    assert!(h.pipeline.is_active());

    h.pipeline.reconcile().unwrap();
    h.pipeline.reconcile().unwrap();
    h.pipeline.ui().flush().await.unwrap();
    assert_eq!(h.recording.alerts_in(AlertCategory::Resumed), 1);
    assert!(h.settings.settings().disable_until.is_none());
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn wake_delivery_re_enables() {
    let h = harness(Settings::default());
    h.pipeline.temporary_disable().schedule(5).unwrap();

    assert!(!h.pipeline.handle_wake("other.token"));
    assert!(h.pipeline.handle_wake(WAKE_TOKEN));
    assert!(h.pipeline.is_active());

    h.pipeline.ui().flush().await.unwrap();
    assert_eq!(h.recording.alerts_in(AlertCategory::Paused), 1);
    assert_eq!(h.recording.alerts_in(AlertCategory::Resumed), 1);
    h.pipeline.shutdown().await;
}

struct BrokenClassifier;

impl Classifier for BrokenClassifier {
    fn platform(&self) -> Platform {
        Platform::Unknown
    }

    fn handles(&self, source_id: &str) -> bool {
        source_id.starts_with("com.broken.")
    }

    fn classify(&self, _snapshot: &UiSnapshot) -> Result<Verdict> {
        Err(anyhow!("accessibility tree missing"))
    }
}

#[tokio::test]
async fn repeated_classifier_failures_enter_safe_mode() {
    let mut settings = Settings::default();
    settings.enabled_platforms.insert(Platform::Unknown);
    let h = harness(settings);
    h.pipeline.engine().register(Arc::new(BrokenClassifier));

    for n in 0..5 {
        h.pipeline
            .on_snapshot(UiSnapshot::new(format!("com.broken.app{n}"), None, vec![]));
    }

    assert!(eventually(|| h.pipeline.safe_mode().is_tripped()).await);
    assert!(!h.pipeline.is_active());
    assert_eq!(h.log.errors().len(), 5);

    h.pipeline.ui().flush().await.unwrap();
    assert_eq!(h.recording.alerts_in(AlertCategory::SafeMode), 1);

    h.pipeline.on_snapshot(shorts_snapshot());
    quiet_period().await;
    assert_eq!(h.recording.go_back_count(), 0);

    assert!(h.pipeline.safe_mode().exit());
    assert!(h.pipeline.is_active());
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn enabled_set_change_clears_cache() {
    let h = harness(Settings::default());
    h.pipeline.on_snapshot(home_snapshot());
    assert!(eventually(|| h.pipeline.engine().cache_stats().0 == 1).await);

    h.settings
        .set_platform_enabled(Platform::Instagram, false)
        .unwrap();
    assert!(eventually(|| h.pipeline.engine().cache_stats().0 == 0).await);
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn shutdown_removes_cover_and_stops_intake() {
    let config = GuardConfig {
        cover_auto_dismiss_ms: 60_000,
        ..GuardConfig::default()
    };
    let h = harness_with(
        Settings {
            intervention_kind: InterventionKind::Cover,
            ..Settings::default()
        },
        config,
    );

    h.pipeline.on_snapshot(shorts_snapshot());
    assert!(eventually(|| h.recording.cover_show_count() == 1).await);

    h.pipeline.shutdown().await;
    assert_eq!(h.recording.cover_dismiss_count(), 1);
    assert!(h.recording.active_cover().is_none());

    h.pipeline.on_snapshot(shorts_snapshot());
    quiet_period().await;
    assert_eq!(h.recording.cover_show_count(), 1);
}

#[tokio::test]
async fn switching_service_off_drops_parked_snapshots() {
    let config = GuardConfig {
        debounce_interval_ms: 60_000,
        ..GuardConfig::default()
    };
    let h = harness_with(Settings::default(), config);

    h.pipeline.on_snapshot(shorts_snapshot());
    assert!(eventually(|| h.recording.go_back_count() == 1).await);
    h.pipeline.on_snapshot(shorts_snapshot());
    assert_eq!(h.pipeline.pending_cycles(), 1);

    h.settings.set_service_enabled(false).unwrap();
    assert!(eventually(|| h.pipeline.pending_cycles() == 0).await);
    assert_eq!(h.recording.go_back_count(), 1);
    h.pipeline.shutdown().await;
}
