//! Capabilities the pipeline drives but does not implement.
//!
//! The host (accessibility service) provides one implementation of each
//! trait. They are moved onto the UI thread at startup and only ever called
//! from there, so they need to be `Send` but not `Sync`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("permission denied for {capability}")]
    PermissionDenied { capability: String },
    #[error("surface unavailable: {0}")]
    Unavailable(String),
    #[error("surface failed: {0}")]
    Failed(String),
}

/// Opaque handle returned by the interception surface for a shown cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoverHandle(pub u64);

/// User choice wired into a cover button. Invoked at most once.
pub type CoverCallback = Box<dyn FnOnce() + Send + 'static>;

/// "Go back" primitive, assumed always available.
pub trait Navigator: Send {
    fn go_back(&mut self) -> Result<(), SurfaceError>;
}

/// Full-screen interception surface with two user choices.
pub trait InterceptionSurface: Send {
    fn can_show(&self) -> bool;

    fn show(
        &mut self,
        on_go_back: CoverCallback,
        on_suspend: CoverCallback,
    ) -> Result<CoverHandle, SurfaceError>;

    fn dismiss(&mut self, handle: CoverHandle) -> Result<(), SurfaceError>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AlertCategory {
    Intervention,
    Detail,
    SafeMode,
    Paused,
    Resumed,
    Permission,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AlertPriority {
    Low,
    Default,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub category: AlertCategory,
    pub priority: AlertPriority,
    /// Stays visible until dismissed explicitly.
    pub ongoing: bool,
}

/// User-visible alerts. May fail with `PermissionDenied` when the host has
/// not been granted the right to post them.
pub trait AlertSurface: Send {
    fn show(&mut self, alert: &Alert) -> Result<(), SurfaceError>;

    fn dismiss(&mut self, category: AlertCategory);
}

/// Everything the UI thread owns.
pub struct Surfaces {
    pub navigator: Box<dyn Navigator>,
    pub cover: Box<dyn InterceptionSurface>,
    pub alerts: Box<dyn AlertSurface>,
}

impl Surfaces {
    pub fn new(
        navigator: impl Navigator + 'static,
        cover: impl InterceptionSurface + 'static,
        alerts: impl AlertSurface + 'static,
    ) -> Self {
        Self {
            navigator: Box::new(navigator),
            cover: Box::new(cover),
            alerts: Box::new(alerts),
        }
    }
}
