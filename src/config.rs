use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the safe-mode circuit breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeModeConfig {
    /// Consecutive failures that trip safe mode.
    pub failure_threshold: u32,

    /// Quiet period after which the failure counter is zeroed.
    pub failure_reset_ms: u64,

    /// How long detection stays suspended once tripped.
    pub cooldown_ms: u64,
}

impl Default for SafeModeConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_reset_ms: 60_000,
            cooldown_ms: 5 * 60_000,
        }
    }
}

impl SafeModeConfig {
    pub fn failure_reset(&self) -> Duration {
        Duration::from_millis(self.failure_reset_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Confidence reported by each detection strategy.
///
/// The tab-selection values differ per platform; nothing downstream depends
/// on the exact numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub ui_element: f32,
    pub youtube_tab: f32,
    pub instagram_tab: f32,
    pub instagram_tab_icon: f32,
    pub url_pattern: f32,
    pub youtube_screen: f32,
    pub instagram_screen: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            ui_element: 0.95,
            youtube_tab: 0.85,
            instagram_tab: 0.90,
            instagram_tab_icon: 0.85,
            url_pattern: 0.80,
            youtube_screen: 0.70,
            instagram_screen: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub debounce_interval_ms: u64,
    pub cache_capacity: usize,
    pub cover_auto_dismiss_ms: u64,
    /// Pause length offered by the cover's "suspend" choice.
    pub cover_suspend_minutes: i64,
    pub safe_mode: SafeModeConfig,
    pub detection: DetectionConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            debounce_interval_ms: 100,
            cache_capacity: 20,
            cover_auto_dismiss_ms: 10_000,
            cover_suspend_minutes: 30,
            safe_mode: SafeModeConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}

impl GuardConfig {
    /// Defaults adjusted by `SHORTGUARD_DEBUG` (short safe-mode timers) and
    /// `SHORTGUARD_DEBOUNCE_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        let debug_mode = std::env::var("SHORTGUARD_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            config.safe_mode.failure_reset_ms = 10_000;
            config.safe_mode.cooldown_ms = 30_000;
        }

        if let Some(ms) = std::env::var("SHORTGUARD_DEBOUNCE_MS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            config.debounce_interval_ms = ms;
        }

        config
    }

    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_interval_ms)
    }

    pub fn cover_auto_dismiss(&self) -> Duration {
        Duration::from_millis(self.cover_auto_dismiss_ms)
    }
}
