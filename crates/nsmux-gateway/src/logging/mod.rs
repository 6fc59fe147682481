//! Logging infrastructure
//!
//! Provides structured logging with:
//! - Trace IDs correlating the log lines of one routed operation
//! - An `EnvFilter` formatter for binaries and tests

mod op_context;

pub use op_context::{generate_trace_id, OperationContext, OperationSpan};

use tracing_subscriber::EnvFilter;

/// Install the global formatter. `RUST_LOG` wins over `default_filter`.
/// Later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
