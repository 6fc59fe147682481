//! Value types exchanged over a management connection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::name::ObjectName;

/// Notification type emitted by the delegate when a resource is registered
pub const REGISTRATION_NOTIFICATION: &str = "JMX.mbean.registered";

/// Notification type emitted by the delegate when a resource is unregistered
pub const UNREGISTRATION_NOTIFICATION: &str = "JMX.mbean.unregistered";

/// A named attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Value,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered list of attributes, as returned by batch get/set
pub type AttributeList = Vec<Attribute>;

/// A registered resource: its name and implementation class
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectInstance {
    pub name: ObjectName,
    pub class_name: String,
}

impl ObjectInstance {
    pub fn new(name: ObjectName, class_name: impl Into<String>) -> Self {
        Self {
            name,
            class_name: class_name.into(),
        }
    }

    /// Same class under another name (used when crossing a namespace boundary)
    pub fn with_name(&self, name: ObjectName) -> Self {
        Self {
            name,
            class_name: self.class_name.clone(),
        }
    }
}

/// Description of one attribute of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    pub type_name: String,
    pub description: Option<String>,
    pub readable: bool,
    pub writable: bool,
}

/// Description of one operation of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationInfo {
    pub name: String,
    pub signature: Vec<String>,
    pub return_type: String,
    pub description: Option<String>,
}

/// Metadata of a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MBeanInfo {
    pub class_name: String,
    pub description: Option<String>,
    pub attributes: Vec<AttributeInfo>,
    pub operations: Vec<OperationInfo>,
    /// Notification types the resource may emit
    pub notifications: Vec<String>,
}

/// A notification emitted by a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_type: String,
    /// Name of the emitting resource
    pub source: ObjectName,
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Resource the notification is about (registration notifications)
    pub subject: Option<ObjectName>,
    pub user_data: Option<Value>,
}

impl Notification {
    pub fn new(
        notification_type: impl Into<String>,
        source: ObjectName,
        sequence_number: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_type: notification_type.into(),
            source,
            sequence_number,
            timestamp: Utc::now(),
            message: message.into(),
            subject: None,
            user_data: None,
        }
    }

    pub fn with_subject(mut self, subject: ObjectName) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_user_data(mut self, user_data: Value) -> Self {
        self.user_data = Some(user_data);
        self
    }

    /// Whether this is a registration or unregistration notification
    pub fn is_lifecycle(&self) -> bool {
        self.notification_type == REGISTRATION_NOTIFICATION
            || self.notification_type == UNREGISTRATION_NOTIFICATION
    }
}
