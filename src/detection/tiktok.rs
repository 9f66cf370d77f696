use anyhow::Result;

use super::classifier::Classifier;
use crate::models::{DetectionMethod, Platform, UiSnapshot, Verdict};

pub const PACKAGES: [&str; 2] = ["com.zhiliaoapp.musically", "com.ss.android.ugc.trill"];

/// The whole app is a short-video feed, so every snapshot is a target.
#[derive(Debug, Default)]
pub struct TikTokClassifier;

impl Classifier for TikTokClassifier {
    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    fn handles(&self, source_id: &str) -> bool {
        PACKAGES.contains(&source_id)
    }

    fn classify(&self, _snapshot: &UiSnapshot) -> Result<Verdict> {
        Ok(Verdict::target(Platform::TikTok, 1.0, DetectionMethod::Heuristic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_screen_is_a_target() {
        let snapshot = UiSnapshot::new(PACKAGES[1], None, vec![]);
        let verdict = TikTokClassifier.classify(&snapshot).unwrap();
        assert!(verdict.is_target);
        assert_eq!(verdict.method, DetectionMethod::Heuristic);
        assert!(!TikTokClassifier.handles("com.instagram.android"));
    }
}
