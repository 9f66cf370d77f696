#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use shortguard::testing::{MemoryEventLog, RecordingSurfaces, RecordingWakeTimer};
use shortguard::{
    FileSettingsStore, GuardConfig, GuardContext, ManualClock, Pipeline, Settings, UiElement,
    UiSnapshot,
};

pub const YOUTUBE: &str = "com.google.android.youtube";

pub struct Harness {
    pub pipeline: Pipeline,
    pub recording: RecordingSurfaces,
    pub settings: Arc<FileSettingsStore>,
    pub log: Arc<MemoryEventLog>,
    pub wake: Arc<RecordingWakeTimer>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(settings: Settings) -> Harness {
    harness_with(settings, GuardConfig::default())
}

pub fn harness_with(settings: Settings, config: GuardConfig) -> Harness {
    let recording = RecordingSurfaces::new();
    let settings = Arc::new(FileSettingsStore::in_memory(settings));
    let log = Arc::new(MemoryEventLog::default());
    let wake = Arc::new(RecordingWakeTimer::default());
    let clock = Arc::new(ManualClock::default());

    let context = GuardContext::new(settings.clone(), log.clone(), wake.clone())
        .with_clock(clock.clone());
    let pipeline = Pipeline::new(context, config, recording.surfaces()).unwrap();

    Harness {
        pipeline,
        recording,
        settings,
        log,
        wake,
        clock,
    }
}

pub fn shorts_snapshot() -> UiSnapshot {
    UiSnapshot::new(
        YOUTUBE,
        Some("shorts_player".into()),
        vec![UiElement::with_resource_id("shorts_player_fragment")],
    )
}

pub fn home_snapshot() -> UiSnapshot {
    UiSnapshot::new(
        YOUTUBE,
        Some("WatchWhileActivity".into()),
        vec![UiElement::with_text("Home").selected()],
    )
}

/// Polls `condition` for up to two seconds.
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Gives the pipeline time to act on something it should ignore.
pub async fn quiet_period() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}
