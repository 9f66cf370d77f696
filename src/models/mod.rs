pub mod snapshot;
pub mod verdict;

pub use snapshot::{UiElement, UiSnapshot};
pub use verdict::{DetectionMethod, InterventionKind, Platform, Verdict};
