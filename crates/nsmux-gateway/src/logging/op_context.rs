//! Operation Context - correlation of the log lines of one operation
//!
//! Generates short trace IDs and the span every dispatched operation runs in.

use std::sync::atomic::{AtomicU64, Ordering};

use nsmux_core::{ManagementError, ObjectName};
use tracing::{debug, info_span, Span};

/// Global operation counter for trace ID generation
static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a short, unique trace ID for this operation
/// Format: 6 hex characters (e.g., "a1b2c3")
pub fn generate_trace_id() -> String {
    let counter = OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);

    // Mix counter and timestamp for uniqueness
    let mixed = counter.wrapping_add(timestamp);
    format!("{:06x}", mixed & 0xFFFFFF)
}

/// Correlation data of one dispatched operation
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Unique trace ID (6 hex chars)
    pub trace_id: String,
    /// Connection verb (e.g. get_attribute)
    pub verb: &'static str,
    /// Target name, if the verb has one
    pub name: Option<String>,
    pub started_at: std::time::Instant,
}

impl OperationContext {
    pub fn new(verb: &'static str, name: Option<&ObjectName>) -> Self {
        Self {
            trace_id: generate_trace_id(),
            verb,
            name: name.map(|n| n.to_string()),
            started_at: std::time::Instant::now(),
        }
    }

    /// Get elapsed time since the operation started
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Name for logging, `-` when the verb has none
    pub fn short_name(&self) -> &str {
        self.name.as_deref().unwrap_or("-")
    }
}

/// Span builder for dispatched operations
pub struct OperationSpan;

impl OperationSpan {
    /// This span will automatically include trace_id in all child logs.
    pub fn enter(ctx: &OperationContext) -> Span {
        info_span!(
            "operation",
            trace_id = %ctx.trace_id,
            verb = ctx.verb,
        )
    }

    /// Log operation completion (single consolidated line)
    pub fn log_exit(ctx: &OperationContext, error: Option<&ManagementError>) {
        let elapsed = ctx.elapsed_ms();

        match error {
            Some(e) => debug!(
                trace_id = %ctx.trace_id,
                code = e.code(),
                "← {} {} failed: {} ({}ms)",
                ctx.verb,
                ctx.short_name(),
                e,
                elapsed
            ),
            None => debug!(
                trace_id = %ctx.trace_id,
                "← {} {} ({}ms)",
                ctx.verb,
                ctx.short_name(),
                elapsed
            ),
        }
    }
}
