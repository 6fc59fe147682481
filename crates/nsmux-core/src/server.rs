//! Local Server - in-process resource server
//!
//! `LocalServer` owns a registry of managed resources and implements the full
//! [`MBeanServerConnection`] verb set over it. It is the delegate that routing
//! layers ultimately reach.
//!
//! Key behaviours:
//! - A delegate resource (`JMImplementation:type=MBeanServerDelegate`) is always
//!   registered and emits a notification for every registration and
//!   unregistration.
//! - Names with an empty domain live in the default domain.
//! - `create_mbean` and `instantiate` go through class factories registered with
//!   [`LocalServer::register_factory`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::connection::{ListenerRef, MBeanServerConnection, NotificationFilter};
use crate::error::{ManagementError, ManagementResult};
use crate::model::{
    Attribute, AttributeList, MBeanInfo, Notification, ObjectInstance,
    REGISTRATION_NOTIFICATION, UNREGISTRATION_NOTIFICATION,
};
use crate::name::ObjectName;
use crate::resource::{ManagedResource, StandardResource};

/// Name of the delegate resource of every server
pub const DELEGATE_NAME: &str = "JMImplementation:type=MBeanServerDelegate";

/// Domain reserved for the server's own resources
const RESERVED_DOMAIN: &str = "JMImplementation";

/// Class of the delegate resource
const DELEGATE_CLASS: &str = "JMImplementation.MBeanServerDelegate";

/// Builds a resource for `create_mbean` / `instantiate`
pub type ResourceFactory =
    Arc<dyn Fn(&[Value]) -> ManagementResult<Arc<dyn ManagedResource>> + Send + Sync>;

struct ListenerEntry {
    source: ObjectName,
    listener: ListenerRef,
    filter: Option<Arc<dyn NotificationFilter>>,
    handback: Option<Value>,
}

pub struct LocalServer {
    server_id: String,
    default_domain: String,
    delegate_name: ObjectName,
    resources: RwLock<BTreeMap<ObjectName, Arc<dyn ManagedResource>>>,
    factories: RwLock<HashMap<String, ResourceFactory>>,
    listeners: RwLock<Vec<ListenerEntry>>,
    sequence: AtomicU64,
}

impl LocalServer {
    /// Create a server whose default domain is `default_domain`
    pub fn new(default_domain: impl Into<String>) -> Self {
        let server_id = Uuid::new_v4().to_string();
        let delegate_name = ObjectName::new_unchecked(RESERVED_DOMAIN, &[("type", "MBeanServerDelegate")]);

        let delegate: Arc<dyn ManagedResource> = Arc::new(
            StandardResource::new(DELEGATE_CLASS)
                .with_description("Emits registration notifications for this server")
                .with_attribute("MBeanServerId", server_id.clone())
                .with_attribute("ImplementationName", "nsmux")
                .with_attribute("ImplementationVersion", env!("CARGO_PKG_VERSION")),
        );

        let mut resources = BTreeMap::new();
        resources.insert(delegate_name.clone(), delegate);

        let default_domain = default_domain.into();
        info!(
            server_id = %server_id,
            default_domain = %default_domain,
            "[LocalServer] Created"
        );

        Self {
            server_id,
            default_domain,
            delegate_name,
            resources: RwLock::new(resources),
            factories: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            sequence: AtomicU64::new(1),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn delegate_name(&self) -> &ObjectName {
        &self.delegate_name
    }

    /// Register a class factory used by `create_mbean` and `instantiate`
    pub fn register_factory<F>(&self, class_name: impl Into<String>, factory: F)
    where
        F: Fn(&[Value]) -> ManagementResult<Arc<dyn ManagedResource>> + Send + Sync + 'static,
    {
        let class_name = class_name.into();
        debug!(class_name = %class_name, "[LocalServer] Registered factory");
        self.factories.write().insert(class_name, Arc::new(factory));
    }

    /// Next notification sequence number
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Deliver a notification to the listeners registered on its source
    ///
    /// Listeners are called synchronously, in registration order, with no
    /// lock held.
    pub fn emit(&self, notification: Notification) {
        let targets: Vec<(ListenerRef, Option<Value>)> = self
            .listeners
            .read()
            .iter()
            .filter(|entry| entry.source == notification.source)
            .filter(|entry| {
                entry
                    .filter
                    .as_ref()
                    .map_or(true, |f| f.is_notification_enabled(&notification))
            })
            .map(|entry| (entry.listener.clone(), entry.handback.clone()))
            .collect();

        for (listener, handback) in targets {
            match listener {
                ListenerRef::Object(listener) => {
                    listener.handle_notification(&notification, handback.as_ref())
                }
                ListenerRef::Name(name) => {
                    let resource = self.resources.read().get(&name).cloned();
                    match resource {
                        Some(resource) => {
                            resource.handle_notification(&notification, handback.as_ref())
                        }
                        None => debug!(
                            listener = %name,
                            "[LocalServer] Listener resource vanished, dropping notification"
                        ),
                    }
                }
            }
        }
    }

    fn emit_lifecycle(&self, notification_type: &str, subject: &ObjectName) {
        let notification = Notification::new(
            notification_type,
            self.delegate_name.clone(),
            self.next_sequence(),
            format!("{} {}", notification_type, subject),
        )
        .with_subject(subject.clone());
        self.emit(notification);
    }

    /// Names with an empty domain belong to the default domain
    fn qualify(&self, name: &ObjectName) -> ManagementResult<ObjectName> {
        if name.domain().is_empty() {
            name.with_domain(&self.default_domain)
        } else {
            Ok(name.clone())
        }
    }

    fn resource(&self, name: &ObjectName) -> ManagementResult<(ObjectName, Arc<dyn ManagedResource>)> {
        let name = self.qualify(name)?;
        let resource = self
            .resources
            .read()
            .get(&name)
            .cloned()
            .ok_or_else(|| ManagementError::InstanceNotFound(name.to_string()))?;
        Ok((name, resource))
    }

    fn factory(&self, class_name: &str) -> ManagementResult<ResourceFactory> {
        self.factories
            .read()
            .get(class_name)
            .cloned()
            .ok_or_else(|| ManagementError::Reflection(format!("unknown class {}", class_name)))
    }

    fn matching(
        &self,
        pattern: Option<&ObjectName>,
    ) -> ManagementResult<Vec<(ObjectName, Arc<dyn ManagedResource>)>> {
        let pattern = pattern.map(|p| self.qualify(p)).transpose()?;
        let resources = self.resources.read();
        let found = match pattern {
            None => resources
                .iter()
                .map(|(n, r)| (n.clone(), r.clone()))
                .collect(),
            Some(p) if p.is_pattern() => resources
                .iter()
                .filter(|(n, _)| p.apply(n))
                .map(|(n, r)| (n.clone(), r.clone()))
                .collect(),
            Some(p) => resources
                .get(&p)
                .map(|r| vec![(p.clone(), r.clone())])
                .unwrap_or_default(),
        };
        Ok(found)
    }
}

impl Default for LocalServer {
    fn default() -> Self {
        Self::new("DefaultDomain")
    }
}

#[async_trait]
impl MBeanServerConnection for LocalServer {
    async fn create_mbean(
        &self,
        class_name: &str,
        name: Option<&ObjectName>,
        loader_name: Option<&ObjectName>,
        params: &[Value],
    ) -> ManagementResult<ObjectInstance> {
        if let Some(loader) = loader_name {
            self.resource(loader)?;
        }
        let factory = self.factory(class_name)?;
        let resource = factory(params)?;
        self.register_mbean(resource, name).await
    }

    async fn register_mbean(
        &self,
        resource: Arc<dyn ManagedResource>,
        name: Option<&ObjectName>,
    ) -> ManagementResult<ObjectInstance> {
        let name = self.qualify(&resource.pre_register(name)?)?;
        if name.is_pattern() {
            return Err(ManagementError::invalid_name(
                name.to_string(),
                "cannot register under a pattern",
            ));
        }
        if name.domain() == RESERVED_DOMAIN {
            return Err(ManagementError::ManagementRuntime(format!(
                "domain {} is reserved",
                RESERVED_DOMAIN
            )));
        }

        let class_name = resource.class_name().to_string();
        {
            let mut resources = self.resources.write();
            if resources.contains_key(&name) {
                return Err(ManagementError::InstanceAlreadyExists(name.to_string()));
            }
            resources.insert(name.clone(), resource);
        }

        debug!(name = %name, class_name = %class_name, "[LocalServer] Registered");
        self.emit_lifecycle(REGISTRATION_NOTIFICATION, &name);
        Ok(ObjectInstance::new(name, class_name))
    }

    async fn unregister_mbean(&self, name: &ObjectName) -> ManagementResult<()> {
        let name = self.qualify(name)?;
        if name == self.delegate_name {
            return Err(ManagementError::ManagementRuntime(
                "the delegate cannot be unregistered".to_string(),
            ));
        }
        if self.resources.write().remove(&name).is_none() {
            return Err(ManagementError::InstanceNotFound(name.to_string()));
        }
        self.listeners.write().retain(|entry| entry.source != name);

        debug!(name = %name, "[LocalServer] Unregistered");
        self.emit_lifecycle(UNREGISTRATION_NOTIFICATION, &name);
        Ok(())
    }

    async fn get_object_instance(&self, name: &ObjectName) -> ManagementResult<ObjectInstance> {
        let (name, resource) = self.resource(name)?;
        Ok(ObjectInstance::new(name, resource.class_name()))
    }

    async fn query_mbeans(
        &self,
        pattern: Option<&ObjectName>,
    ) -> ManagementResult<Vec<ObjectInstance>> {
        Ok(self
            .matching(pattern)?
            .into_iter()
            .map(|(name, resource)| ObjectInstance::new(name, resource.class_name()))
            .collect())
    }

    async fn query_names(
        &self,
        pattern: Option<&ObjectName>,
    ) -> ManagementResult<Vec<ObjectName>> {
        Ok(self
            .matching(pattern)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    async fn is_registered(&self, name: &ObjectName) -> ManagementResult<bool> {
        let name = self.qualify(name)?;
        Ok(self.resources.read().contains_key(&name))
    }

    async fn get_mbean_count(&self) -> ManagementResult<usize> {
        Ok(self.resources.read().len())
    }

    async fn get_attribute(&self, name: &ObjectName, attribute: &str) -> ManagementResult<Value> {
        let (_, resource) = self.resource(name)?;
        resource.get_attribute(attribute).await
    }

    async fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[String],
    ) -> ManagementResult<AttributeList> {
        let (_, resource) = self.resource(name)?;
        Ok(resource.get_attributes(attributes).await)
    }

    async fn set_attribute(
        &self,
        name: &ObjectName,
        attribute: Attribute,
    ) -> ManagementResult<()> {
        let (_, resource) = self.resource(name)?;
        resource.set_attribute(attribute).await
    }

    async fn set_attributes(
        &self,
        name: &ObjectName,
        attributes: AttributeList,
    ) -> ManagementResult<AttributeList> {
        let (_, resource) = self.resource(name)?;
        Ok(resource.set_attributes(attributes).await)
    }

    async fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        params: &[Value],
        signature: &[String],
    ) -> ManagementResult<Value> {
        let (_, resource) = self.resource(name)?;
        resource.invoke(operation, params, signature).await
    }

    async fn get_default_domain(&self) -> ManagementResult<String> {
        Ok(self.default_domain.clone())
    }

    async fn get_domains(&self) -> ManagementResult<Vec<String>> {
        let domains: BTreeSet<String> = self
            .resources
            .read()
            .keys()
            .map(|name| name.domain().to_string())
            .collect();
        Ok(domains.into_iter().collect())
    }

    async fn add_notification_listener(
        &self,
        name: &ObjectName,
        listener: ListenerRef,
        filter: Option<Arc<dyn NotificationFilter>>,
        handback: Option<Value>,
    ) -> ManagementResult<()> {
        let (source, _) = self.resource(name)?;
        let listener = match listener {
            ListenerRef::Name(listener_name) => {
                let (listener_name, _) = self.resource(&listener_name)?;
                ListenerRef::Name(listener_name)
            }
            other => other,
        };

        debug!(source = %source, listener = ?listener, "[LocalServer] Listener added");
        self.listeners.write().push(ListenerEntry {
            source,
            listener,
            filter,
            handback,
        });
        Ok(())
    }

    async fn remove_notification_listener(
        &self,
        name: &ObjectName,
        listener: &ListenerRef,
    ) -> ManagementResult<()> {
        let (source, _) = self.resource(name)?;
        let listener = match listener {
            ListenerRef::Name(listener_name) => ListenerRef::Name(self.qualify(listener_name)?),
            other => other.clone(),
        };

        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|entry| !(entry.source == source && entry.listener.same_listener(&listener)));
        if listeners.len() == before {
            return Err(ManagementError::ListenerNotFound(format!(
                "{:?} on {}",
                listener, source
            )));
        }
        Ok(())
    }

    async fn get_mbean_info(&self, name: &ObjectName) -> ManagementResult<MBeanInfo> {
        let (_, resource) = self.resource(name)?;
        Ok(resource.mbean_info())
    }

    async fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> ManagementResult<bool> {
        let (_, resource) = self.resource(name)?;
        Ok(resource.is_instance_of(class_name))
    }

    async fn instantiate(
        &self,
        class_name: &str,
        params: &[Value],
    ) -> ManagementResult<Arc<dyn ManagedResource>> {
        let factory = self.factory(class_name)?;
        factory(params)
    }

    async fn deserialize(&self, class_name: &str, data: &[u8]) -> ManagementResult<Value> {
        self.factory(class_name)?;
        serde_json::from_slice(data).map_err(|e| {
            ManagementError::Operations(format!("cannot decode data for {}: {}", class_name, e))
        })
    }

    async fn class_loader_repository(&self) -> ManagementResult<Vec<String>> {
        let mut classes: Vec<String> = self.factories.read().keys().cloned().collect();
        classes.sort();
        Ok(classes)
    }
}
