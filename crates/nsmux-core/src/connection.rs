//! Management connection contract
//!
//! [`MBeanServerConnection`] is the verb set every layer both implements and
//! wraps: the in-process [`LocalServer`](crate::LocalServer), routing
//! connections, interceptors and dispatchers. Implementations must be usable
//! concurrently from many tasks.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ManagementResult;
use crate::model::{
    Attribute, AttributeList, MBeanInfo, Notification, ObjectInstance,
    REGISTRATION_NOTIFICATION, UNREGISTRATION_NOTIFICATION,
};
use crate::name::ObjectName;
use crate::resource::ManagedResource;

/// Receives notifications from an emitting resource
pub trait NotificationListener: Send + Sync {
    fn handle_notification(&self, notification: &Notification, handback: Option<&Value>);
}

/// Decides which notifications reach a listener
pub trait NotificationFilter: Send + Sync {
    fn is_notification_enabled(&self, notification: &Notification) -> bool;
}

/// A listener given either by reference or by the name of a registered
/// resource that handles notifications
#[derive(Clone)]
pub enum ListenerRef {
    Object(Arc<dyn NotificationListener>),
    Name(ObjectName),
}

impl ListenerRef {
    /// Identity comparison: same object, or same resource name
    pub fn same_listener(&self, other: &ListenerRef) -> bool {
        match (self, other) {
            (ListenerRef::Object(a), ListenerRef::Object(b)) => {
                std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
            }
            (ListenerRef::Name(a), ListenerRef::Name(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for ListenerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerRef::Object(listener) => f
                .debug_tuple("Object")
                .field(&(Arc::as_ptr(listener) as *const ()))
                .finish(),
            ListenerRef::Name(name) => f.debug_tuple("Name").field(name).finish(),
        }
    }
}

/// Filter for delegate notifications: registration and unregistration of
/// resources whose name matches a pattern
#[derive(Debug, Clone)]
pub struct RegistrationFilter {
    pattern: ObjectName,
}

impl RegistrationFilter {
    pub fn new(pattern: ObjectName) -> Self {
        Self { pattern }
    }

    /// Every resource of one domain
    pub fn for_domain(domain: &str) -> ManagementResult<Self> {
        Ok(Self::new(ObjectName::parse(&format!("{}:*", domain))?))
    }

    pub fn pattern(&self) -> &ObjectName {
        &self.pattern
    }
}

impl NotificationFilter for RegistrationFilter {
    fn is_notification_enabled(&self, notification: &Notification) -> bool {
        let lifecycle = notification.notification_type == REGISTRATION_NOTIFICATION
            || notification.notification_type == UNREGISTRATION_NOTIFICATION;
        match (&notification.subject, lifecycle) {
            (Some(subject), true) => self.pattern.apply(subject),
            _ => false,
        }
    }
}

/// The management connection verb set
#[async_trait]
pub trait MBeanServerConnection: Send + Sync {
    /// Create a resource through a registered class factory and register it
    async fn create_mbean(
        &self,
        class_name: &str,
        name: Option<&ObjectName>,
        loader_name: Option<&ObjectName>,
        params: &[Value],
    ) -> ManagementResult<ObjectInstance>;

    /// Register an existing resource. `None` lets the resource choose its name.
    async fn register_mbean(
        &self,
        resource: Arc<dyn ManagedResource>,
        name: Option<&ObjectName>,
    ) -> ManagementResult<ObjectInstance>;

    async fn unregister_mbean(&self, name: &ObjectName) -> ManagementResult<()>;

    async fn get_object_instance(&self, name: &ObjectName) -> ManagementResult<ObjectInstance>;

    /// Instances matching `pattern` (every instance when `None`)
    async fn query_mbeans(
        &self,
        pattern: Option<&ObjectName>,
    ) -> ManagementResult<Vec<ObjectInstance>>;

    /// Names matching `pattern` (every name when `None`)
    async fn query_names(&self, pattern: Option<&ObjectName>)
        -> ManagementResult<Vec<ObjectName>>;

    async fn is_registered(&self, name: &ObjectName) -> ManagementResult<bool>;

    async fn get_mbean_count(&self) -> ManagementResult<usize>;

    async fn get_attribute(&self, name: &ObjectName, attribute: &str) -> ManagementResult<Value>;

    /// Values of the readable attributes among `attributes`
    async fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[String],
    ) -> ManagementResult<AttributeList>;

    async fn set_attribute(&self, name: &ObjectName, attribute: Attribute)
        -> ManagementResult<()>;

    /// Set several attributes, returning those actually set
    async fn set_attributes(
        &self,
        name: &ObjectName,
        attributes: AttributeList,
    ) -> ManagementResult<AttributeList>;

    async fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        params: &[Value],
        signature: &[String],
    ) -> ManagementResult<Value>;

    async fn get_default_domain(&self) -> ManagementResult<String>;

    async fn get_domains(&self) -> ManagementResult<Vec<String>>;

    async fn add_notification_listener(
        &self,
        name: &ObjectName,
        listener: ListenerRef,
        filter: Option<Arc<dyn NotificationFilter>>,
        handback: Option<Value>,
    ) -> ManagementResult<()>;

    /// Remove every registration of `listener` on `name`
    async fn remove_notification_listener(
        &self,
        name: &ObjectName,
        listener: &ListenerRef,
    ) -> ManagementResult<()>;

    async fn get_mbean_info(&self, name: &ObjectName) -> ManagementResult<MBeanInfo>;

    async fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> ManagementResult<bool>;

    /// Legacy: build a resource without registering it
    async fn instantiate(
        &self,
        class_name: &str,
        params: &[Value],
    ) -> ManagementResult<Arc<dyn ManagedResource>>;

    /// Legacy: decode raw bytes in the context of a class
    async fn deserialize(&self, class_name: &str, data: &[u8]) -> ManagementResult<Value>;

    /// Legacy: classes this server knows how to create
    async fn class_loader_repository(&self) -> ManagementResult<Vec<String>>;

    /// Downcast hook, used to detect connections that can be merged
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}
