//! Managed resources
//!
//! A [`ManagedResource`] is what a server hosts under an object name: it
//! exposes attributes and operations and may handle notifications when used
//! as a listener by name.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;

use crate::error::{ManagementError, ManagementResult};
use crate::model::{Attribute, AttributeInfo, AttributeList, MBeanInfo, Notification, OperationInfo};
use crate::name::ObjectName;

/// Operation implementation of a [`StandardResource`]
pub type OperationHandler = Arc<dyn Fn(&[Value]) -> ManagementResult<Value> + Send + Sync>;

#[async_trait]
pub trait ManagedResource: Send + Sync {
    fn class_name(&self) -> &str;

    fn mbean_info(&self) -> MBeanInfo;

    async fn get_attribute(&self, attribute: &str) -> ManagementResult<Value>;

    async fn set_attribute(&self, attribute: Attribute) -> ManagementResult<()>;

    async fn invoke(
        &self,
        operation: &str,
        params: &[Value],
        signature: &[String],
    ) -> ManagementResult<Value>;

    /// Readable attributes among `attributes`; unreadable ones are skipped
    async fn get_attributes(&self, attributes: &[String]) -> AttributeList {
        let mut list = AttributeList::with_capacity(attributes.len());
        for name in attributes {
            match self.get_attribute(name).await {
                Ok(value) => list.push(Attribute::new(name.clone(), value)),
                Err(e) => debug!(attribute = %name, error = %e, "[Resource] Skipping attribute"),
            }
        }
        list
    }

    /// Set each attribute in turn, returning those that were set
    async fn set_attributes(&self, attributes: AttributeList) -> AttributeList {
        let mut set = AttributeList::with_capacity(attributes.len());
        for attribute in attributes {
            match self.set_attribute(attribute.clone()).await {
                Ok(()) => set.push(attribute),
                Err(e) => {
                    debug!(attribute = %attribute.name, error = %e, "[Resource] Attribute not set")
                }
            }
        }
        set
    }

    fn is_instance_of(&self, class_name: &str) -> bool {
        self.class_name() == class_name
    }

    /// Choose the registration name. Resources that can name themselves
    /// override this to accept `None`.
    fn pre_register(&self, name: Option<&ObjectName>) -> ManagementResult<ObjectName> {
        name.cloned().ok_or_else(|| {
            ManagementError::Registration(format!(
                "{} requires an explicit object name",
                self.class_name()
            ))
        })
    }

    /// Called when this resource is registered as a listener by name
    fn handle_notification(&self, _notification: &Notification, _handback: Option<&Value>) {}
}

struct AttributeSlot {
    value: Value,
    writable: bool,
}

/// A resource backed by an attribute map and a table of operations
pub struct StandardResource {
    class_name: String,
    description: Option<String>,
    interfaces: Vec<String>,
    default_name: Option<ObjectName>,
    attributes: RwLock<BTreeMap<String, AttributeSlot>>,
    operations: HashMap<String, OperationHandler>,
    received: Mutex<Vec<Notification>>,
}

impl StandardResource {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            description: None,
            interfaces: Vec::new(),
            default_name: None,
            attributes: RwLock::new(BTreeMap::new()),
            operations: HashMap::new(),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare an additional class this resource is an instance of
    pub fn with_interface(mut self, class_name: impl Into<String>) -> Self {
        self.interfaces.push(class_name.into());
        self
    }

    /// Name used when registered without an explicit one
    pub fn with_default_name(mut self, name: ObjectName) -> Self {
        self.default_name = Some(name);
        self
    }

    /// Read-only attribute
    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.write().insert(
            name.into(),
            AttributeSlot {
                value: value.into(),
                writable: false,
            },
        );
        self
    }

    pub fn with_writable_attribute(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.write().insert(
            name.into(),
            AttributeSlot {
                value: value.into(),
                writable: true,
            },
        );
        self
    }

    pub fn with_operation<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[Value]) -> ManagementResult<Value> + Send + Sync + 'static,
    {
        self.operations.insert(name.into(), Arc::new(handler));
        self
    }

    /// Notifications delivered to this resource as a named listener
    pub fn received_notifications(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }
}

fn type_name_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl ManagedResource for StandardResource {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn mbean_info(&self) -> MBeanInfo {
        let attributes = self
            .attributes
            .read()
            .iter()
            .map(|(name, slot)| AttributeInfo {
                name: name.clone(),
                type_name: type_name_of(&slot.value).to_string(),
                description: None,
                readable: true,
                writable: slot.writable,
            })
            .collect();

        let mut operations: Vec<OperationInfo> = self
            .operations
            .keys()
            .map(|name| OperationInfo {
                name: name.clone(),
                signature: Vec::new(),
                return_type: "object".to_string(),
                description: None,
            })
            .collect();
        operations.sort_by(|a, b| a.name.cmp(&b.name));

        MBeanInfo {
            class_name: self.class_name.clone(),
            description: self.description.clone(),
            attributes,
            operations,
            notifications: Vec::new(),
        }
    }

    async fn get_attribute(&self, attribute: &str) -> ManagementResult<Value> {
        self.attributes
            .read()
            .get(attribute)
            .map(|slot| slot.value.clone())
            .ok_or_else(|| ManagementError::AttributeNotFound(attribute.to_string()))
    }

    async fn set_attribute(&self, attribute: Attribute) -> ManagementResult<()> {
        let mut attributes = self.attributes.write();
        let slot = attributes
            .get_mut(&attribute.name)
            .ok_or_else(|| ManagementError::AttributeNotFound(attribute.name.clone()))?;
        if !slot.writable {
            return Err(ManagementError::AttributeNotFound(format!(
                "{} is read-only",
                attribute.name
            )));
        }
        if !slot.value.is_null() && type_name_of(&slot.value) != type_name_of(&attribute.value) {
            return Err(ManagementError::InvalidAttributeValue(format!(
                "{} expects a {}",
                attribute.name,
                type_name_of(&slot.value)
            )));
        }
        slot.value = attribute.value;
        Ok(())
    }

    async fn invoke(
        &self,
        operation: &str,
        params: &[Value],
        _signature: &[String],
    ) -> ManagementResult<Value> {
        let handler = self.operations.get(operation).ok_or_else(|| {
            ManagementError::Reflection(format!(
                "{} has no operation '{}'",
                self.class_name, operation
            ))
        })?;
        handler(params)
    }

    fn is_instance_of(&self, class_name: &str) -> bool {
        self.class_name == class_name || self.interfaces.iter().any(|i| i == class_name)
    }

    fn pre_register(&self, name: Option<&ObjectName>) -> ManagementResult<ObjectName> {
        match (name, &self.default_name) {
            (Some(name), _) => Ok(name.clone()),
            (None, Some(default)) => Ok(default.clone()),
            (None, None) => Err(ManagementError::Registration(format!(
                "{} requires an explicit object name",
                self.class_name
            ))),
        }
    }

    fn handle_notification(&self, notification: &Notification, _handback: Option<&Value>) {
        self.received.lock().push(notification.clone());
    }
}
