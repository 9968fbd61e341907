//! Logging macros for the scheduling engines with verbosity level control.
//!
//! Records go through the `log` facade, so the host decides where they end up.
//! Nothing is formatted when the verbosity gate is closed.
//! Verbosity levels:
//! - 0: SILENT (nothing)
//! - 1: CHANGES (date assignments, moved tasks)
//! - 2: CHECKS (constraint evaluations, rollup decisions)
//! - 3: DEBUG (full pass internals)

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// `log` target used by every engine record.
pub const LOG_TARGET: &str = "wbs";

/// Log at CHANGES level (verbosity >= 1), emitted as `info`.
///
/// Used for: date assignments, shifts, snapped starts.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            log::info!(target: $crate::logging::LOG_TARGET, $($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2), emitted as `debug`.
///
/// Used for: constraint bounds, rollup decisions, conflict checks.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            log::debug!(target: $crate::logging::LOG_TARGET, $($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3), emitted as `trace`.
///
/// Used for: forward/backward pass internals.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            log::trace!(target: $crate::logging::LOG_TARGET, $($arg)*);
        }
    };
}
