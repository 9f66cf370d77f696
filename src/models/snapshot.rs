//! Foreground UI snapshot models.
//!
//! A `UiSnapshot` is the normalized view of one foreground UI change: which
//! app produced it, which screen is showing, and the visible element tree
//! flattened in pre-order. It is built once per event and dropped after the
//! pipeline is done with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UiElement {
    pub resource_id: Option<String>,
    pub text: Option<String>,
    pub description: Option<String>,
    pub class_name: Option<String>,
    pub is_selected: bool,
    pub is_focused: bool,
}

impl UiElement {
    pub fn with_resource_id(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: Some(resource_id.into()),
            ..Self::default()
        }
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn selected(mut self) -> Self {
        self.is_selected = true;
        self
    }

    pub fn focused(mut self) -> Self {
        self.is_focused = true;
        self
    }

    /// Selected or focused; tab bars report either depending on the app.
    pub fn is_active(&self) -> bool {
        self.is_selected || self.is_focused
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSnapshot {
    pub source_id: String,
    pub screen_id: Option<String>,
    pub elements: Vec<UiElement>,
    pub captured_at: DateTime<Utc>,
}

impl UiSnapshot {
    pub fn new(
        source_id: impl Into<String>,
        screen_id: Option<String>,
        elements: Vec<UiElement>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            screen_id,
            elements,
            captured_at: Utc::now(),
        }
    }

    /// Key used by the detection cache: `source:screen`, with `unknown` for
    /// snapshots that carry no screen identifier.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}",
            self.source_id,
            self.screen_id.as_deref().unwrap_or("unknown")
        )
    }
}
