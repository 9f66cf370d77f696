pub mod alerts;
pub mod surfaces;
pub mod thread;

pub use surfaces::{
    Alert, AlertCategory, AlertPriority, AlertSurface, CoverCallback, CoverHandle,
    InterceptionSurface, Navigator, SurfaceError, Surfaces,
};
pub use thread::UiThread;
