//! Error taxonomy for management connections
//!
//! Every verb of [`MBeanServerConnection`](crate::MBeanServerConnection) returns a
//! [`ManagementError`]. The variants mirror what a management client can observe:
//! declared failures (missing instance, bad attribute, ...), permission denials,
//! and the checked/unchecked pairs that routing layers convert between.

use thiserror::Error;

/// Result type for management operations
pub type ManagementResult<T> = Result<T, ManagementError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagementError {
    /// Malformed name, or a name outside the scope of a router
    #[error("invalid object name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("instance already exists: {0}")]
    InstanceAlreadyExists(String),

    #[error("attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("invalid attribute value: {0}")]
    InvalidAttributeValue(String),

    #[error("registration failed: {0}")]
    Registration(String),

    /// Raised by the resource itself while serving an operation
    #[error("resource error: {0}")]
    Resource(String),

    #[error("reflection failure: {0}")]
    Reflection(String),

    #[error("not a compliant resource: {0}")]
    NotCompliant(String),

    #[error("listener not found: {0}")]
    ListenerNotFound(String),

    /// Permission denied by the authorizer
    #[error("access denied: {0}")]
    Security(String),

    /// Declared runtime failure of the management layer
    #[error("management runtime error: {0}")]
    ManagementRuntime(String),

    /// Undeclared runtime failure, wrapped so it can cross a namespace boundary
    #[error("operation failed: {0}")]
    Operations(String),

    /// Connectivity failure reported by a transport
    #[error("connection failure: {0}")]
    Io(String),

    /// Connectivity failure converted to its unchecked form
    #[error("connection failure (unchecked): {0}")]
    RuntimeIo(String),

    /// Raw runtime failure of a delegate, before normalization
    #[error("runtime failure: {0}")]
    Runtime(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

impl ManagementError {
    /// Shorthand for an [`InvalidName`](ManagementError::InvalidName) error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Stable snake-case code, used as a structured log field
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "invalid_name",
            Self::InstanceNotFound(_) => "instance_not_found",
            Self::InstanceAlreadyExists(_) => "instance_already_exists",
            Self::AttributeNotFound(_) => "attribute_not_found",
            Self::InvalidAttributeValue(_) => "invalid_attribute_value",
            Self::Registration(_) => "registration",
            Self::Resource(_) => "resource",
            Self::Reflection(_) => "reflection",
            Self::NotCompliant(_) => "not_compliant",
            Self::ListenerNotFound(_) => "listener_not_found",
            Self::Security(_) => "security",
            Self::ManagementRuntime(_) => "management_runtime",
            Self::Operations(_) => "operations",
            Self::Io(_) => "io",
            Self::RuntimeIo(_) => "runtime_io",
            Self::Runtime(_) => "runtime",
            Self::Unsupported(_) => "unsupported",
        }
    }

    pub fn is_security(&self) -> bool {
        matches!(self, Self::Security(_))
    }

    /// Declared errors are part of the connection contract and cross
    /// namespace boundaries unchanged.
    pub fn is_declared(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Runtime(_))
    }
}
