//! Conditional logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! Hot paths (per-snapshot detection, debounce scheduling) log a lot; each
//! module decides whether its chatter is worth keeping:
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info};
//!
//! log_debug!("cache hit for {key}");
//! ```

/// Debug-level log, skipped when the calling module sets `ENABLE_LOGS = false`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Info-level log, skipped when the calling module sets `ENABLE_LOGS = false`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn-level log, skipped when the calling module sets `ENABLE_LOGS = false`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error-level log, skipped when the calling module sets `ENABLE_LOGS = false`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
