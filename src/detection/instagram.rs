use anyhow::Result;

use super::classifier::{
    contains_ignore_case, first_match, labelled, resource_id_matches, screen_matches, Classifier,
    Strategy,
};
use crate::config::DetectionConfig;
use crate::models::{DetectionMethod, Platform, UiSnapshot, Verdict};

pub const PACKAGES: [&str; 2] = ["com.instagram.android", "com.instagram.lite"];

const VIEWER_IDS: [&str; 5] = [
    "clips_viewer_view_pager",
    "clips_viewer",
    "reels_viewer",
    "clips_tab",
    "clips_viewer_container",
];
const TAB_LABEL: &str = "Reels";
const ICON_CLASS: &str = "ImageView";
const SCREEN_PATTERNS: [&str; 2] = ["reels", "clips"];

const STRATEGIES: [Strategy; 4] = [viewer_element, reels_tab, reels_icon, reels_screen];

fn viewer_element(snapshot: &UiSnapshot, config: &DetectionConfig) -> Option<Verdict> {
    snapshot
        .elements
        .iter()
        .any(|element| resource_id_matches(element, &VIEWER_IDS))
        .then(|| {
            Verdict::target(Platform::Instagram, config.ui_element, DetectionMethod::UiElement)
        })
}

fn reels_tab(snapshot: &UiSnapshot, config: &DetectionConfig) -> Option<Verdict> {
    snapshot
        .elements
        .iter()
        .any(|element| element.is_active() && labelled(element, TAB_LABEL))
        .then(|| {
            Verdict::target(Platform::Instagram, config.instagram_tab, DetectionMethod::UiElement)
        })
}

/// Icon-only tab bars carry the label in the image description.
fn reels_icon(snapshot: &UiSnapshot, config: &DetectionConfig) -> Option<Verdict> {
    snapshot
        .elements
        .iter()
        .any(|element| {
            element.is_active()
                && element
                    .class_name
                    .as_deref()
                    .is_some_and(|class| class.contains(ICON_CLASS))
                && element
                    .description
                    .as_deref()
                    .is_some_and(|description| contains_ignore_case(description, TAB_LABEL))
        })
        .then(|| {
            Verdict::target(
                Platform::Instagram,
                config.instagram_tab_icon,
                DetectionMethod::UiElement,
            )
        })
}

fn reels_screen(snapshot: &UiSnapshot, config: &DetectionConfig) -> Option<Verdict> {
    screen_matches(snapshot, &SCREEN_PATTERNS).then(|| {
        Verdict::target(
            Platform::Instagram,
            config.instagram_screen,
            DetectionMethod::ScreenName,
        )
    })
}

pub struct InstagramClassifier {
    config: DetectionConfig,
}

impl InstagramClassifier {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }
}

impl Classifier for InstagramClassifier {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn handles(&self, source_id: &str) -> bool {
        PACKAGES.contains(&source_id)
    }

    fn classify(&self, snapshot: &UiSnapshot) -> Result<Verdict> {
        Ok(first_match(&STRATEGIES, snapshot, &self.config, Platform::Instagram))
    }
}
