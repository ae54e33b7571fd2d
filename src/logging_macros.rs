#![warn(clippy::all, rust_2018_idioms)]

/// Stage-tagged logging macros used by the graph builders.
///
/// Every record goes to both the `log` facade and `tracing`, carrying the
/// source location and the build stage that emitted it, so embedders that
/// only install a `log` backend still see synthesis progress.
#[macro_export]
macro_rules! synth_trace {
    ($stage:expr, $($arg:tt)*) => {
        log::trace!("[{}:{}] [{}] {}", file!(), line!(), $stage, format!($($arg)*));
        tracing::trace!(stage = %$stage, "[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! synth_debug {
    ($stage:expr, $($arg:tt)*) => {
        log::debug!("[{}:{}] [{}] {}", file!(), line!(), $stage, format!($($arg)*));
        tracing::debug!(stage = %$stage, "[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! synth_info {
    ($stage:expr, $($arg:tt)*) => {
        log::info!("[{}:{}] [{}] {}", file!(), line!(), $stage, format!($($arg)*));
        tracing::info!(stage = %$stage, "[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! synth_warn {
    ($stage:expr, $($arg:tt)*) => {
        log::warn!("[{}:{}] [{}] {}", file!(), line!(), $stage, format!($($arg)*));
        tracing::warn!(stage = %$stage, "[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}

/// Only used where a build is about to be abandoned; the error itself is
/// still returned to the caller.
#[macro_export]
macro_rules! synth_error {
    ($stage:expr, $($arg:tt)*) => {
        log::error!("[{}:{}] [{}] {}", file!(), line!(), $stage, format!($($arg)*));
        tracing::error!(stage = %$stage, "[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}
