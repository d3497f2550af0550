//! Process-wide tracing setup shared by the binaries and test harnesses.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize tracing with the format chosen by `COMMERCE_LOG_FORMAT`
/// (`json`, the default, or `pretty`).
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}

/// Human-readable output captured by the test harness.
pub fn init_for_tests() {
    tracing::init_test();
}
