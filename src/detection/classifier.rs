use anyhow::Result;

use crate::config::DetectionConfig;
use crate::models::{Platform, UiElement, UiSnapshot, Verdict};

/// Per-platform detector. Implementations are pure: same snapshot, same
/// verdict.
pub trait Classifier: Send + Sync {
    fn platform(&self) -> Platform;

    fn handles(&self, source_id: &str) -> bool;

    fn classify(&self, snapshot: &UiSnapshot) -> Result<Verdict>;
}

/// One detection strategy. Returns a positive verdict or passes.
pub(crate) type Strategy = fn(&UiSnapshot, &DetectionConfig) -> Option<Verdict>;

/// Runs strategies in order; the first positive answer wins.
pub(crate) fn first_match(
    strategies: &[Strategy],
    snapshot: &UiSnapshot,
    config: &DetectionConfig,
    platform: Platform,
) -> Verdict {
    strategies
        .iter()
        .find_map(|strategy| strategy(snapshot, config))
        .unwrap_or_else(|| Verdict::not_target(platform))
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub(crate) fn resource_id_matches(element: &UiElement, markers: &[&str]) -> bool {
    element
        .resource_id
        .as_deref()
        .is_some_and(|id| markers.iter().any(|marker| contains_ignore_case(id, marker)))
}

/// Text or description equals `label` (trimmed, case-insensitive).
pub(crate) fn labelled(element: &UiElement, label: &str) -> bool {
    [element.text.as_deref(), element.description.as_deref()]
        .into_iter()
        .flatten()
        .any(|value| value.trim().eq_ignore_ascii_case(label))
}

pub(crate) fn screen_matches(snapshot: &UiSnapshot, patterns: &[&str]) -> bool {
    snapshot
        .screen_id
        .as_deref()
        .is_some_and(|screen| patterns.iter().any(|p| contains_ignore_case(screen, p)))
}
