use anyhow::Result;

use super::classifier::{
    contains_ignore_case, first_match, labelled, resource_id_matches, screen_matches, Classifier,
    Strategy,
};
use crate::config::DetectionConfig;
use crate::models::{DetectionMethod, Platform, UiSnapshot, Verdict};

pub const PACKAGES: [&str; 2] = ["com.google.android.youtube", "com.google.android.youtube.tv"];

const PLAYER_IDS: [&str; 4] = [
    "shorts_player_fragment",
    "reel_player_page_container",
    "shorts_container",
    "reel_watch_player",
];
const TAB_LABEL: &str = "Shorts";
const URL_FRAGMENT: &str = "/shorts/";
const SCREEN_PATTERNS: [&str; 2] = ["short", "reel"];

const STRATEGIES: [Strategy; 4] = [player_element, shorts_tab, shorts_url, shorts_screen];

fn player_element(snapshot: &UiSnapshot, config: &DetectionConfig) -> Option<Verdict> {
    snapshot
        .elements
        .iter()
        .any(|element| resource_id_matches(element, &PLAYER_IDS))
        .then(|| Verdict::target(Platform::YouTube, config.ui_element, DetectionMethod::UiElement))
}

fn shorts_tab(snapshot: &UiSnapshot, config: &DetectionConfig) -> Option<Verdict> {
    snapshot
        .elements
        .iter()
        .any(|element| element.is_active() && labelled(element, TAB_LABEL))
        .then(|| Verdict::target(Platform::YouTube, config.youtube_tab, DetectionMethod::UiElement))
}

fn shorts_url(snapshot: &UiSnapshot, config: &DetectionConfig) -> Option<Verdict> {
    snapshot
        .elements
        .iter()
        .filter_map(|element| element.text.as_deref())
        .any(|text| contains_ignore_case(text, URL_FRAGMENT))
        .then(|| Verdict::target(Platform::YouTube, config.url_pattern, DetectionMethod::UrlPattern))
}

fn shorts_screen(snapshot: &UiSnapshot, config: &DetectionConfig) -> Option<Verdict> {
    screen_matches(snapshot, &SCREEN_PATTERNS).then(|| {
        Verdict::target(
            Platform::YouTube,
            config.youtube_screen,
            DetectionMethod::ScreenName,
        )
    })
}

pub struct YouTubeClassifier {
    config: DetectionConfig,
}

impl YouTubeClassifier {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }
}

impl Classifier for YouTubeClassifier {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    fn handles(&self, source_id: &str) -> bool {
        PACKAGES.contains(&source_id)
    }

    fn classify(&self, snapshot: &UiSnapshot) -> Result<Verdict> {
        Ok(first_match(&STRATEGIES, snapshot, &self.config, Platform::YouTube))
    }
}
