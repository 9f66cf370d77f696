use std::{
    collections::BTreeSet,
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard, RwLock},
};

use lru::LruCache;

use super::{
    classifier::Classifier, instagram::InstagramClassifier, tiktok::TikTokClassifier,
    youtube::YouTubeClassifier,
};
use crate::config::GuardConfig;
use crate::error::{ErrorHandler, GuardError};
use crate::models::{Platform, UiSnapshot, Verdict};
use crate::settings::SettingsStore;
use crate::{log_debug, log_info};

const ENABLE_LOGS: bool = false;

struct VerdictCache {
    entries: LruCache<String, Verdict>,
    /// Enabled-platform set the current entries were computed under.
    filled_under: Option<BTreeSet<Platform>>,
}

impl VerdictCache {
    fn sync_enabled(&mut self, enabled: &BTreeSet<Platform>) {
        if self.filled_under.as_ref() != Some(enabled) {
            if !self.entries.is_empty() {
                log_info!("Enabled platforms changed; dropping {} cached verdicts", self.entries.len());
            }
            self.entries.clear();
            self.filled_under = Some(enabled.clone());
        }
    }
}

/// Classifier registry plus a bounded verdict cache keyed by
/// [`UiSnapshot::cache_key`].
pub struct DetectionEngine {
    classifiers: RwLock<Vec<Arc<dyn Classifier>>>,
    cache: Mutex<VerdictCache>,
    settings: Arc<dyn SettingsStore>,
    errors: Arc<ErrorHandler>,
}

impl DetectionEngine {
    pub fn new(
        capacity: usize,
        settings: Arc<dyn SettingsStore>,
        errors: Arc<ErrorHandler>,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            classifiers: RwLock::new(Vec::new()),
            cache: Mutex::new(VerdictCache {
                entries: LruCache::new(capacity),
                filled_under: None,
            }),
            settings,
            errors,
        }
    }

    /// Engine with the YouTube, Instagram and TikTok classifiers registered.
    pub fn with_default_classifiers(
        config: &GuardConfig,
        settings: Arc<dyn SettingsStore>,
        errors: Arc<ErrorHandler>,
    ) -> Self {
        let engine = Self::new(config.cache_capacity, settings, errors);
        engine.register(Arc::new(YouTubeClassifier::new(config.detection.clone())));
        engine.register(Arc::new(InstagramClassifier::new(config.detection.clone())));
        engine.register(Arc::new(TikTokClassifier));
        engine
    }

    /// Adds a classifier after the existing ones. Earlier registrations win
    /// when two classifiers claim the same source.
    pub fn register(&self, classifier: Arc<dyn Classifier>) {
        self.classifiers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(classifier);
    }

    pub fn classifier_for(&self, platform: Platform) -> Option<Arc<dyn Classifier>> {
        self.classifiers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .find(|classifier| classifier.platform() == platform)
            .cloned()
    }

    pub fn handles(&self, source_id: &str) -> bool {
        self.classifier_for_source(source_id).is_some()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().entries.clear();
    }

    /// `(entries, capacity)`
    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.lock_cache();
        (cache.entries.len(), cache.entries.cap().get())
    }

    /// Verdict for `snapshot`, or `None` when nothing should happen: safe
    /// mode is on, no classifier handles the source, or classification
    /// failed.
    pub fn detect(&self, snapshot: &UiSnapshot) -> Option<Verdict> {
        if self.errors.safe_mode().is_tripped() {
            log_debug!("Safe mode active; skipping detection for {}", snapshot.source_id);
            return None;
        }

        let enabled = self.settings.settings().enabled_platforms;
        let key = snapshot.cache_key();

        {
            let mut cache = self.lock_cache();
            cache.sync_enabled(&enabled);
            if let Some(verdict) = cache.entries.get(&key) {
                log_debug!("Cache hit for {key}");
                return Some(verdict.clone());
            }
        }

        let classifier = self.classifier_for_source(&snapshot.source_id)?;
        let platform = classifier.platform();

        if !enabled.contains(&platform) {
            let verdict = Verdict::not_target(platform);
            self.store(key, &enabled, verdict.clone());
            return Some(verdict);
        }

        match classifier.classify(snapshot) {
            Ok(verdict) => {
                log_debug!(
                    "{} classified {key}: target={} confidence={:.2}",
                    platform.as_str(),
                    verdict.is_target,
                    verdict.confidence
                );
                self.store(key, &enabled, verdict.clone());
                Some(verdict)
            }
            Err(err) => {
                self.errors.handle(&GuardError::Classification {
                    platform,
                    message: format!("{err:#}"),
                });
                None
            }
        }
    }

    /// Skips the insert if the enabled set moved on while classifying.
    fn store(&self, key: String, enabled: &BTreeSet<Platform>, verdict: Verdict) {
        let mut cache = self.lock_cache();
        if cache.filled_under.as_ref() == Some(enabled) {
            cache.entries.put(key, verdict);
        }
    }

    fn classifier_for_source(&self, source_id: &str) -> Option<Arc<dyn Classifier>> {
        self.classifiers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .find(|classifier| classifier.handles(source_id))
            .cloned()
    }

    fn lock_cache(&self) -> MutexGuard<'_, VerdictCache> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
