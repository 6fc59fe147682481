//! Mock implementations for testing
//!
//! Connections, connectors and policies that record what reaches them and
//! can be told to fail.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use nsmux_core::{
    Attribute, AttributeList, ListenerRef, LocalServer, MBeanInfo, MBeanServerConnection,
    ManagedResource, ManagementError, ManagementResult, Notification, NotificationFilter,
    NotificationListener, ObjectInstance, ObjectName,
};
use nsmux_gateway::{Action, Connector, PermissionPolicy, PolicyContext, Subject};

// ============================================================================
// MockConnection
// ============================================================================

/// A verb that reached the mock, with the name it carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub verb: &'static str,
    pub name: Option<String>,
}

/// Connection backed by a [`LocalServer`] that records every call and can
/// fail chosen verbs
pub struct MockConnection {
    inner: LocalServer,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<HashMap<&'static str, ManagementError>>,
    extra_query_names: Mutex<Vec<ObjectName>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            inner: LocalServer::new("mock"),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            extra_query_names: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &LocalServer {
        &self.inner
    }

    /// Make every later call of `verb` fail with `error`
    pub fn fail(&self, verb: &'static str, error: ManagementError) {
        self.failures.lock().insert(verb, error);
    }

    /// Names appended to every query result, whether they match or not
    pub fn add_query_result(&self, name: ObjectName) {
        self.extra_query_names.lock().push(name);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Names received by `verb`, in call order
    pub fn names_seen(&self, verb: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.verb == verb)
            .filter_map(|c| c.name.clone())
            .collect()
    }

    pub fn call_count(&self, verb: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.verb == verb).count()
    }

    fn enter(&self, verb: &'static str, name: Option<&ObjectName>) -> ManagementResult<()> {
        self.calls.lock().push(RecordedCall {
            verb,
            name: name.map(|n| n.to_string()),
        });
        match self.failures.lock().get(verb) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MBeanServerConnection for MockConnection {
    async fn create_mbean(
        &self,
        class_name: &str,
        name: Option<&ObjectName>,
        loader_name: Option<&ObjectName>,
        params: &[Value],
    ) -> ManagementResult<ObjectInstance> {
        self.enter("create_mbean", name)?;
        self.inner
            .create_mbean(class_name, name, loader_name, params)
            .await
    }

    async fn register_mbean(
        &self,
        resource: Arc<dyn ManagedResource>,
        name: Option<&ObjectName>,
    ) -> ManagementResult<ObjectInstance> {
        self.enter("register_mbean", name)?;
        self.inner.register_mbean(resource, name).await
    }

    async fn unregister_mbean(&self, name: &ObjectName) -> ManagementResult<()> {
        self.enter("unregister_mbean", Some(name))?;
        self.inner.unregister_mbean(name).await
    }

    async fn get_object_instance(&self, name: &ObjectName) -> ManagementResult<ObjectInstance> {
        self.enter("get_object_instance", Some(name))?;
        self.inner.get_object_instance(name).await
    }

    async fn query_mbeans(
        &self,
        pattern: Option<&ObjectName>,
    ) -> ManagementResult<Vec<ObjectInstance>> {
        self.enter("query_mbeans", pattern)?;
        let mut instances = self.inner.query_mbeans(pattern).await?;
        instances.extend(
            self.extra_query_names
                .lock()
                .iter()
                .map(|n| ObjectInstance::new(n.clone(), "mock.Extra")),
        );
        Ok(instances)
    }

    async fn query_names(
        &self,
        pattern: Option<&ObjectName>,
    ) -> ManagementResult<Vec<ObjectName>> {
        self.enter("query_names", pattern)?;
        let mut names = self.inner.query_names(pattern).await?;
        names.extend(self.extra_query_names.lock().iter().cloned());
        Ok(names)
    }

    async fn is_registered(&self, name: &ObjectName) -> ManagementResult<bool> {
        self.enter("is_registered", Some(name))?;
        self.inner.is_registered(name).await
    }

    async fn get_mbean_count(&self) -> ManagementResult<usize> {
        self.enter("get_mbean_count", None)?;
        self.inner.get_mbean_count().await
    }

    async fn get_attribute(&self, name: &ObjectName, attribute: &str) -> ManagementResult<Value> {
        self.enter("get_attribute", Some(name))?;
        self.inner.get_attribute(name, attribute).await
    }

    async fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[String],
    ) -> ManagementResult<AttributeList> {
        self.enter("get_attributes", Some(name))?;
        self.inner.get_attributes(name, attributes).await
    }

    async fn set_attribute(
        &self,
        name: &ObjectName,
        attribute: Attribute,
    ) -> ManagementResult<()> {
        self.enter("set_attribute", Some(name))?;
        self.inner.set_attribute(name, attribute).await
    }

    async fn set_attributes(
        &self,
        name: &ObjectName,
        attributes: AttributeList,
    ) -> ManagementResult<AttributeList> {
        self.enter("set_attributes", Some(name))?;
        self.inner.set_attributes(name, attributes).await
    }

    async fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        params: &[Value],
        signature: &[String],
    ) -> ManagementResult<Value> {
        self.enter("invoke", Some(name))?;
        self.inner.invoke(name, operation, params, signature).await
    }

    async fn get_default_domain(&self) -> ManagementResult<String> {
        self.enter("get_default_domain", None)?;
        self.inner.get_default_domain().await
    }

    async fn get_domains(&self) -> ManagementResult<Vec<String>> {
        self.enter("get_domains", None)?;
        self.inner.get_domains().await
    }

    async fn add_notification_listener(
        &self,
        name: &ObjectName,
        listener: ListenerRef,
        filter: Option<Arc<dyn NotificationFilter>>,
        handback: Option<Value>,
    ) -> ManagementResult<()> {
        self.enter("add_notification_listener", Some(name))?;
        self.inner
            .add_notification_listener(name, listener, filter, handback)
            .await
    }

    async fn remove_notification_listener(
        &self,
        name: &ObjectName,
        listener: &ListenerRef,
    ) -> ManagementResult<()> {
        self.enter("remove_notification_listener", Some(name))?;
        self.inner.remove_notification_listener(name, listener).await
    }

    async fn get_mbean_info(&self, name: &ObjectName) -> ManagementResult<MBeanInfo> {
        self.enter("get_mbean_info", Some(name))?;
        self.inner.get_mbean_info(name).await
    }

    async fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> ManagementResult<bool> {
        self.enter("is_instance_of", Some(name))?;
        self.inner.is_instance_of(name, class_name).await
    }

    async fn instantiate(
        &self,
        class_name: &str,
        params: &[Value],
    ) -> ManagementResult<Arc<dyn ManagedResource>> {
        self.enter("instantiate", None)?;
        self.inner.instantiate(class_name, params).await
    }

    async fn deserialize(&self, class_name: &str, data: &[u8]) -> ManagementResult<Value> {
        self.enter("deserialize", None)?;
        self.inner.deserialize(class_name, data).await
    }

    async fn class_loader_repository(&self) -> ManagementResult<Vec<String>> {
        self.enter("class_loader_repository", None)?;
        self.inner.class_loader_repository().await
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

// ============================================================================
// CountingConnector
// ============================================================================

/// Connector handing out one connection until told to reconnect, counting
/// how often it was asked
pub struct CountingConnector {
    current: Mutex<Arc<dyn MBeanServerConnection>>,
    requests: AtomicUsize,
}

impl CountingConnector {
    pub fn new(connection: Arc<dyn MBeanServerConnection>) -> Self {
        Self {
            current: Mutex::new(connection),
            requests: AtomicUsize::new(0),
        }
    }

    /// Replace the connection handed out from now on
    pub fn reconnect(&self, connection: Arc<dyn MBeanServerConnection>) {
        *self.current.lock() = connection;
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for CountingConnector {
    async fn connection(&self) -> ManagementResult<Arc<dyn MBeanServerConnection>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.current.lock().clone())
    }

    async fn connection_for(
        &self,
        _subject: &Subject,
    ) -> ManagementResult<Arc<dyn MBeanServerConnection>> {
        self.connection().await
    }

    fn connection_id(&self) -> String {
        "counting".to_string()
    }

    async fn close(&self) -> ManagementResult<()> {
        Ok(())
    }
}

// ============================================================================
// RecordingPolicy
// ============================================================================

/// A permission hook that reached the policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCheck {
    pub action: Action,
    pub name: Option<String>,
    pub member: Option<String>,
}

/// Policy that records every check and denies chosen actions, names and
/// members
#[derive(Default)]
pub struct RecordingPolicy {
    checks: Mutex<Vec<RecordedCheck>>,
    denied_actions: Mutex<HashSet<Action>>,
    denied_names: Mutex<HashSet<String>>,
    denied_members: Mutex<HashSet<String>>,
}

impl RecordingPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_action(&self, action: Action) {
        self.denied_actions.lock().insert(action);
    }

    pub fn deny_name(&self, name: &str) {
        self.denied_names.lock().insert(name.to_string());
    }

    pub fn deny_member(&self, member: &str) {
        self.denied_members.lock().insert(member.to_string());
    }

    pub fn checks(&self) -> Vec<RecordedCheck> {
        self.checks.lock().clone()
    }
}

#[async_trait]
impl PermissionPolicy for RecordingPolicy {
    fn is_enforcing(&self) -> bool {
        true
    }

    async fn check(
        &self,
        _ctx: &PolicyContext<'_>,
        name: Option<&ObjectName>,
        member: Option<&str>,
        action: Action,
    ) -> ManagementResult<()> {
        let name = name.map(|n| n.to_string());
        self.checks.lock().push(RecordedCheck {
            action,
            name: name.clone(),
            member: member.map(str::to_string),
        });

        let denied = self.denied_actions.lock().contains(&action)
            || name.is_some_and(|n| self.denied_names.lock().contains(&n))
            || member.is_some_and(|m| self.denied_members.lock().contains(m));
        if denied {
            return Err(ManagementError::Security(format!("{} denied", action)));
        }
        Ok(())
    }

    async fn check_create(
        &self,
        ctx: &PolicyContext<'_>,
        name: Option<&ObjectName>,
        _class_name: &str,
        action: Action,
    ) -> ManagementResult<()> {
        self.check(ctx, name, None, action).await
    }

    async fn excludes_from_result(
        &self,
        ctx: &PolicyContext<'_>,
        name: &ObjectName,
        action: Action,
    ) -> ManagementResult<bool> {
        self.check_query(ctx, name, action).await
    }
}

// ============================================================================
// RecordingListener
// ============================================================================

/// Listener collecting every notification it receives
#[derive(Default)]
pub struct RecordingListener {
    received: Mutex<Vec<Notification>>,
}

impl RecordingListener {
    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }
}

impl NotificationListener for RecordingListener {
    fn handle_notification(&self, notification: &Notification, _handback: Option<&Value>) {
        self.received.lock().push(notification.clone());
    }
}
