//! Logging macros that vanish unless the `tracing` feature is on.
//!
//! Unit tests always get real events, so `FACET_LOG=facet_mapper=trace` shows
//! cache and resolution activity while debugging a failing test.

/// Emit a trace-level event.
#[cfg(any(test, feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! trace {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*);
    };
}

/// Emit a trace-level event (no-op version).
#[cfg(not(any(test, feature = "tracing")))]
#[macro_export]
#[doc(hidden)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Emit a debug-level event.
#[cfg(any(test, feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! debug {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*);
    };
}

/// Emit a debug-level event (no-op version).
#[cfg(not(any(test, feature = "tracing")))]
#[macro_export]
#[doc(hidden)]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
