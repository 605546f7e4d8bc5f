//! Profiling support via Tracy.
//!
//! Instrumentation is enabled through the `profiling` Cargo feature; without
//! it every macro in this module compiles to a no-op with zero runtime
//! overhead.
//!
//! ```toml
//! [dependencies]
//! framegraph = { version = "0.1", features = ["profiling"] }
//! ```

// Re-export tracy-client internals for the macros below.
#[cfg(feature = "profiling")]
pub use tracy_client::span;

/// Create a profiling span for the current scope.
///
/// The span automatically ends when the scope exits.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span for the entire function.
///
/// Place this at the start of a function to profile its entire execution.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Create a profiling span for function (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

pub use profile_function;
pub use profile_scope;
