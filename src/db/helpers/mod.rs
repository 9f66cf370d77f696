use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{DetectionMethod, InterventionKind, Platform};

/// Fixed-width RFC 3339 so that string order matches time order in SQL.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_platform(value: &str) -> Result<Platform> {
    match value {
        "YouTube" => Ok(Platform::YouTube),
        "Instagram" => Ok(Platform::Instagram),
        "TikTok" => Ok(Platform::TikTok),
        "Unknown" => Ok(Platform::Unknown),
        other => Err(anyhow!("unknown platform {other}")),
    }
}

pub fn parse_method(value: &str) -> Result<DetectionMethod> {
    match value {
        "UiElement" => Ok(DetectionMethod::UiElement),
        "UrlPattern" => Ok(DetectionMethod::UrlPattern),
        "ScreenName" => Ok(DetectionMethod::ScreenName),
        "Heuristic" => Ok(DetectionMethod::Heuristic),
        other => Err(anyhow!("unknown detection method {other}")),
    }
}

pub fn parse_intervention(value: &str) -> Result<InterventionKind> {
    match value {
        "Cover" => Ok(InterventionKind::Cover),
        "GoBack" => Ok(InterventionKind::GoBack),
        "Alert" => Ok(InterventionKind::Alert),
        "Combined" => Ok(InterventionKind::Combined),
        other => Err(anyhow!("unknown intervention kind {other}")),
    }
}
