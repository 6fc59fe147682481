//! # nsmux Core Library
//!
//! Naming, routing and connection contracts shared by every nsmux layer.
//!
//! ## Modules
//!
//! - `name` - Object names, namespace paths and the `NameRouter`
//! - `model` - Attributes, instances, metadata and notifications
//! - `connection` - The management connection contract (`MBeanServerConnection`)
//! - `resource` - Managed resources hosted by a server
//! - `server` - In-process resource server (`LocalServer`)
//! - `error` - The `ManagementError` taxonomy

pub mod connection;
pub mod error;
pub mod model;
pub mod name;
pub mod resource;
pub mod server;

// Re-export commonly used types
pub use connection::{
    ListenerRef, MBeanServerConnection, NotificationFilter, NotificationListener,
    RegistrationFilter,
};
pub use error::{ManagementError, ManagementResult};
pub use model::*;
pub use name::{
    concat_paths, domain_handler_name, handler_name, namespace_of, normalize_domain,
    normalize_namespace_path, NameRouter, ObjectName, NAMESPACE_SEPARATOR,
};
pub use resource::{ManagedResource, StandardResource};
pub use server::{LocalServer, ResourceFactory, DELEGATE_NAME};
