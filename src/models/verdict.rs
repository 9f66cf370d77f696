use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Platform {
    YouTube,
    Instagram,
    TikTok,
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::Unknown => "Unknown",
        }
    }

    /// Name of the short-video surface as shown to the user.
    pub fn surface_name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube Shorts",
            Platform::Instagram => "Instagram Reels",
            Platform::TikTok => "TikTok",
            Platform::Unknown => "Short Video",
        }
    }

    pub fn monitored() -> [Platform; 3] {
        [Platform::YouTube, Platform::Instagram, Platform::TikTok]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DetectionMethod {
    UiElement,
    UrlPattern,
    ScreenName,
    Heuristic,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::UiElement => "UiElement",
            DetectionMethod::UrlPattern => "UrlPattern",
            DetectionMethod::ScreenName => "ScreenName",
            DetectionMethod::Heuristic => "Heuristic",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DetectionMethod::UiElement => "UI Element",
            DetectionMethod::UrlPattern => "URL Pattern",
            DetectionMethod::ScreenName => "Screen Name",
            DetectionMethod::Heuristic => "Heuristic",
        }
    }
}

/// Answer of a classifier for one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_target: bool,
    pub platform: Platform,
    pub confidence: f32,
    pub method: DetectionMethod,
}

impl Verdict {
    pub fn target(platform: Platform, confidence: f32, method: DetectionMethod) -> Self {
        Self {
            is_target: true,
            platform,
            confidence: confidence.clamp(0.0, 1.0),
            method,
        }
    }

    /// Negative verdicts are always certain.
    pub fn not_target(platform: Platform) -> Self {
        Self {
            is_target: false,
            platform,
            confidence: 1.0,
            method: DetectionMethod::Heuristic,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InterventionKind {
    Cover,
    GoBack,
    Alert,
    Combined,
}

impl Default for InterventionKind {
    fn default() -> Self {
        InterventionKind::GoBack
    }
}

impl InterventionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionKind::Cover => "Cover",
            InterventionKind::GoBack => "GoBack",
            InterventionKind::Alert => "Alert",
            InterventionKind::Combined => "Combined",
        }
    }
}
