//! Process-wide tracing setup shared by the binary and tests.

/// Tracing subscriber configuration.
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Install the global subscriber using `RUST_LOG` / `PROPLEDGER_LOG_FORMAT`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env(), "info");
}
