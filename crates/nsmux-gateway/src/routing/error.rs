//! Error translation at the delegate boundary

use nsmux_core::ManagementError;
use tracing::debug;

/// Map an error raised by a delegate connection to what the caller of a
/// routing connection sees.
///
/// Security and management-runtime errors, and every declared error, pass
/// through unchanged. Undeclared runtime failures become `Operations`, and
/// checked I/O failures become `RuntimeIo`.
pub fn normalize_delegate_error(error: ManagementError) -> ManagementError {
    match error {
        ManagementError::Runtime(message) => {
            debug!(error = %message, "[Routing] Wrapping delegate runtime failure");
            ManagementError::Operations(message)
        }
        ManagementError::Io(message) => {
            debug!(error = %message, "[Routing] Wrapping delegate I/O failure");
            ManagementError::RuntimeIo(message)
        }
        other => other,
    }
}
