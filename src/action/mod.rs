pub mod cover;
pub mod dispatcher;

pub use cover::{CoverController, CoverOutcome};
pub use dispatcher::{ActionDispatcher, DispatchOutcome};
