use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fs, path::PathBuf, sync::RwLock};
use tokio::sync::watch;

use crate::models::{InterventionKind, Platform};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub service_enabled: bool,
    pub enabled_platforms: BTreeSet<Platform>,
    pub intervention_kind: InterventionKind,
    /// End of the user's temporary pause, if one is set.
    pub disable_until: Option<DateTime<Utc>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_enabled: true,
            enabled_platforms: Platform::monitored().into_iter().collect(),
            intervention_kind: InterventionKind::default(),
            disable_until: None,
        }
    }
}

/// Durable user settings as seen by the pipeline.
pub trait SettingsStore: Send + Sync {
    fn settings(&self) -> Settings;

    /// Receives every settings value written after subscription.
    fn subscribe(&self) -> watch::Receiver<Settings>;

    fn update(&self, apply: &mut dyn FnMut(&mut Settings)) -> Result<()>;

    fn set_service_enabled(&self, enabled: bool) -> Result<()> {
        self.update(&mut |s: &mut Settings| s.service_enabled = enabled)
    }

    fn set_platform_enabled(&self, platform: Platform, enabled: bool) -> Result<()> {
        self.update(&mut |s: &mut Settings| {
            if enabled {
                s.enabled_platforms.insert(platform);
            } else {
                s.enabled_platforms.remove(&platform);
            }
        })
    }

    fn set_intervention_kind(&self, kind: InterventionKind) -> Result<()> {
        self.update(&mut |s: &mut Settings| s.intervention_kind = kind)
    }

    fn set_disable_until(&self, until: Option<DateTime<Utc>>) -> Result<()> {
        self.update(&mut |s: &mut Settings| s.disable_until = until)
    }
}

/// JSON-file backed store. `in_memory()` skips the file entirely.
pub struct FileSettingsStore {
    path: Option<PathBuf>,
    data: RwLock<Settings>,
    changes: watch::Sender<Settings>,
}

impl FileSettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Settings file {} is unreadable ({err}); using defaults", path.display());
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self::with_data(Some(path), data))
    }

    pub fn in_memory(initial: Settings) -> Self {
        Self::with_data(None, initial)
    }

    fn with_data(path: Option<PathBuf>, data: Settings) -> Self {
        let (changes, _) = watch::channel(data.clone());
        Self {
            path,
            data: RwLock::new(data),
            changes,
        }
    }

    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = fs::read_to_string(path)?;
        let data: Settings = serde_json::from_str(&contents)?;
        {
            let mut guard = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = data.clone();
        }
        self.changes.send_replace(data);
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}

impl SettingsStore for FileSettingsStore {
    fn settings(&self) -> Settings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn subscribe(&self) -> watch::Receiver<Settings> {
        self.changes.subscribe()
    }

    fn update(&self, apply: &mut dyn FnMut(&mut Settings)) -> Result<()> {
        let updated = {
            let mut guard = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            let mut next = guard.clone();
            apply(&mut next);
            if next == *guard {
                return Ok(());
            }
            self.persist(&next)?;
            *guard = next.clone();
            next
        };
        self.changes.send_replace(updated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = FileSettingsStore::new(path.clone()).unwrap();
        store.set_intervention_kind(InterventionKind::Cover).unwrap();
        store.set_platform_enabled(Platform::TikTok, false).unwrap();

        let reopened = FileSettingsStore::new(path).unwrap();
        let settings = reopened.settings();
        assert_eq!(settings.intervention_kind, InterventionKind::Cover);
        assert!(!settings.enabled_platforms.contains(&Platform::TikTok));
        assert!(settings.enabled_platforms.contains(&Platform::YouTube));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileSettingsStore::new(path).unwrap();
        assert_eq!(store.settings(), Settings::default());
    }

    #[test]
    fn subscribers_see_changes_but_not_no_ops() {
        let store = FileSettingsStore::in_memory(Settings::default());
        let mut rx = store.subscribe();

        store.set_service_enabled(true).unwrap();
        assert!(!rx.has_changed().unwrap());

        store.set_service_enabled(false).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().service_enabled);
    }
}
