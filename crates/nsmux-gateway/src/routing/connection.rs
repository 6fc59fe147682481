//! Routing connection: translates names between a caller's view and the
//! view of the connection it wraps

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use nsmux_core::{
    handler_name, Attribute, AttributeList, ListenerRef, MBeanInfo, MBeanServerConnection,
    ManagedResource, ManagementError, ManagementResult, NameRouter, NotificationFilter,
    ObjectInstance, ObjectName, NAMESPACE_SEPARATOR,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::normalize_delegate_error;
use crate::dispatch::{DEFAULT_DOMAIN_ATTRIBUTE, DOMAINS_ATTRIBUTE, MBEAN_COUNT_ATTRIBUTE};
use crate::permissions::{Action, PermissionPolicy, PermitAll, PolicyContext};

/// A connection that rewrites every name it passes to `source` from the
/// target view into the source view, and every name it returns back into
/// the target view. Each verb first runs the matching permission hook.
pub struct RoutingConnection {
    source: Arc<dyn MBeanServerConnection>,
    router: NameRouter,
    policy: Arc<dyn PermissionPolicy>,
    default_domain: RwLock<Option<String>>,
}

impl RoutingConnection {
    /// Routing without permission checks
    pub fn new(source: Arc<dyn MBeanServerConnection>, router: NameRouter) -> Self {
        Self::with_policy(source, router, Arc::new(PermitAll))
    }

    pub fn with_policy(
        source: Arc<dyn MBeanServerConnection>,
        router: NameRouter,
        policy: Arc<dyn PermissionPolicy>,
    ) -> Self {
        Self {
            source,
            router,
            policy,
            default_domain: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &Arc<dyn MBeanServerConnection> {
        &self.source
    }

    pub fn router(&self) -> &NameRouter {
        &self.router
    }

    pub fn policy(&self) -> &Arc<dyn PermissionPolicy> {
        &self.policy
    }

    fn context(&self) -> PolicyContext<'_> {
        PolicyContext {
            source: self.source.as_ref(),
            router: &self.router,
        }
    }

    /// Caller-supplied name into the source view
    fn to_source(&self, name: &ObjectName) -> ManagementResult<ObjectName> {
        self.router.to_source_view(name, true).map_err(|e| {
            warn!(name = %name, error = %e, "[Routing] Cannot route name to source");
            ManagementError::invalid_name(
                name.to_string(),
                format!(
                    "not reachable from namespace '{}': {}",
                    self.router.target_namespace(),
                    e
                ),
            )
        })
    }

    /// Single delegate result back into the target view
    fn to_target(&self, name: &ObjectName) -> ManagementResult<ObjectName> {
        self.router.to_target_view(name, false).map_err(|e| {
            ManagementError::Operations(format!(
                "cannot translate {} out of namespace '{}': {}",
                name,
                self.router.source_namespace(),
                e
            ))
        })
    }

    fn to_target_instance(&self, instance: ObjectInstance) -> ManagementResult<ObjectInstance> {
        let name = self.to_target(&instance.name)?;
        Ok(instance.with_name(name))
    }

    fn to_source_listener(&self, listener: &ListenerRef) -> ManagementResult<ListenerRef> {
        match listener {
            ListenerRef::Name(name) => Ok(ListenerRef::Name(self.to_source(name)?)),
            ListenerRef::Object(_) => Ok(listener.clone()),
        }
    }

    /// Name under which a new resource is registered in the source. Only a
    /// root router lets the resource pick its own name.
    fn new_source_mbean_name(
        &self,
        name: Option<&ObjectName>,
    ) -> ManagementResult<Option<ObjectName>> {
        match name {
            Some(name) => self.to_source(name).map(Some),
            None if self.router.is_root() => Ok(None),
            None => Err(ManagementError::Registration(format!(
                "an explicit name is required to register through namespace '{}'",
                self.router.source_namespace()
            ))),
        }
    }

    /// Query pattern in the source view. `None` means everything the target
    /// namespace can see.
    fn source_pattern(&self, pattern: Option<&ObjectName>) -> ManagementResult<Option<ObjectName>> {
        if self.router.is_identity() {
            return Ok(pattern.cloned());
        }
        let pattern = match pattern {
            Some(pattern) => pattern.clone(),
            None => self.namespace_wildcard()?,
        };
        self.to_source(&pattern).map(Some)
    }

    fn namespace_wildcard(&self) -> ManagementResult<ObjectName> {
        let target = self.router.target_namespace();
        if target.is_empty() {
            return Ok(ObjectName::wildcard());
        }
        ObjectName::wildcard().with_domain(&format!("{}{}*", target, NAMESPACE_SEPARATOR))
    }

    /// A query result element as the caller may see it, or `None` when it is
    /// dropped
    async fn visible_result(
        &self,
        ctx: &PolicyContext<'_>,
        name: &ObjectName,
        action: Action,
    ) -> ManagementResult<Option<ObjectName>> {
        let target = match self.router.to_target_view(name, false) {
            Ok(target) => target,
            Err(e) => {
                warn!(name = %name, error = %e, "[Routing] Dropping untranslatable query result");
                return Ok(None);
            }
        };
        if self.policy.excludes_from_result(ctx, &target, action).await? {
            debug!(name = %target, action = %action, "[Routing] Query result hidden by policy");
            return Ok(None);
        }
        Ok(Some(target))
    }

    fn is_scoped(&self) -> bool {
        !self.router.source_namespace().is_empty()
    }

    /// Attribute of the handler resource of the source namespace
    async fn handler_attribute(&self, attribute: &str) -> ManagementResult<Value> {
        let handler = handler_name(self.router.source_namespace())?;
        self.source
            .get_attribute(&handler, attribute)
            .await
            .map_err(normalize_delegate_error)
    }
}

#[async_trait]
impl MBeanServerConnection for RoutingConnection {
    async fn create_mbean(
        &self,
        class_name: &str,
        name: Option<&ObjectName>,
        loader_name: Option<&ObjectName>,
        params: &[Value],
    ) -> ManagementResult<ObjectInstance> {
        let ctx = self.context();
        self.policy
            .check_create(&ctx, name, class_name, Action::Instantiate)
            .await?;
        self.policy
            .check_create(&ctx, name, class_name, Action::RegisterMBean)
            .await?;

        let source_name = self.new_source_mbean_name(name)?;
        let source_loader = loader_name.map(|l| self.to_source(l)).transpose()?;
        let instance = self
            .source
            .create_mbean(
                class_name,
                source_name.as_ref(),
                source_loader.as_ref(),
                params,
            )
            .await
            .map_err(normalize_delegate_error)?;
        self.to_target_instance(instance)
    }

    async fn register_mbean(
        &self,
        resource: Arc<dyn ManagedResource>,
        name: Option<&ObjectName>,
    ) -> ManagementResult<ObjectInstance> {
        self.policy
            .check_create(
                &self.context(),
                name,
                resource.class_name(),
                Action::RegisterMBean,
            )
            .await?;

        let source_name = self.new_source_mbean_name(name)?;
        let instance = self
            .source
            .register_mbean(resource, source_name.as_ref())
            .await
            .map_err(normalize_delegate_error)?;
        self.to_target_instance(instance)
    }

    async fn unregister_mbean(&self, name: &ObjectName) -> ManagementResult<()> {
        self.policy
            .check(&self.context(), Some(name), None, Action::UnregisterMBean)
            .await?;
        let source_name = self.to_source(name)?;
        self.source
            .unregister_mbean(&source_name)
            .await
            .map_err(normalize_delegate_error)
    }

    async fn get_object_instance(&self, name: &ObjectName) -> ManagementResult<ObjectInstance> {
        self.policy
            .check(&self.context(), Some(name), None, Action::GetObjectInstance)
            .await?;
        let source_name = self.to_source(name)?;
        let instance = self
            .source
            .get_object_instance(&source_name)
            .await
            .map_err(normalize_delegate_error)?;
        self.to_target_instance(instance)
    }

    async fn query_mbeans(
        &self,
        pattern: Option<&ObjectName>,
    ) -> ManagementResult<Vec<ObjectInstance>> {
        let ctx = self.context();
        self.policy
            .check_pattern(&ctx, pattern, None, Action::QueryMBeans)
            .await?;

        let source_pattern = self.source_pattern(pattern)?;
        let instances = self
            .source
            .query_mbeans(source_pattern.as_ref())
            .await
            .map_err(normalize_delegate_error)?;

        let mut visible = Vec::with_capacity(instances.len());
        for instance in instances {
            if let Some(name) = self
                .visible_result(&ctx, &instance.name, Action::QueryMBeans)
                .await?
            {
                visible.push(instance.with_name(name));
            }
        }
        Ok(visible)
    }

    async fn query_names(
        &self,
        pattern: Option<&ObjectName>,
    ) -> ManagementResult<Vec<ObjectName>> {
        let ctx = self.context();
        self.policy
            .check_pattern(&ctx, pattern, None, Action::QueryNames)
            .await?;

        let source_pattern = self.source_pattern(pattern)?;
        let names = self
            .source
            .query_names(source_pattern.as_ref())
            .await
            .map_err(normalize_delegate_error)?;

        let mut visible = Vec::with_capacity(names.len());
        for name in names {
            if let Some(name) = self.visible_result(&ctx, &name, Action::QueryNames).await? {
                visible.push(name);
            }
        }
        Ok(visible)
    }

    async fn is_registered(&self, name: &ObjectName) -> ManagementResult<bool> {
        match self
            .policy
            .check(&self.context(), Some(name), None, Action::IsRegistered)
            .await
        {
            Ok(()) => {}
            Err(e @ ManagementError::Security(_)) => {
                debug!(name = %name, error = %e, "[Routing] Hiding registration");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
        let source_name = self.to_source(name)?;
        self.source
            .is_registered(&source_name)
            .await
            .map_err(normalize_delegate_error)
    }

    async fn get_mbean_count(&self) -> ManagementResult<usize> {
        if !self.is_scoped() {
            return self
                .source
                .get_mbean_count()
                .await
                .map_err(normalize_delegate_error);
        }
        let count = self.handler_attribute(MBEAN_COUNT_ATTRIBUTE).await?;
        count
            .as_u64()
            .and_then(|c| usize::try_from(c).ok())
            .ok_or_else(|| ManagementError::Operations(format!("invalid MBeanCount: {}", count)))
    }

    async fn get_attribute(&self, name: &ObjectName, attribute: &str) -> ManagementResult<Value> {
        self.policy
            .check(
                &self.context(),
                Some(name),
                Some(attribute),
                Action::GetAttribute,
            )
            .await?;
        let source_name = self.to_source(name)?;
        self.source
            .get_attribute(&source_name, attribute)
            .await
            .map_err(normalize_delegate_error)
    }

    async fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[String],
    ) -> ManagementResult<AttributeList> {
        let allowed = self
            .policy
            .check_attribute_names(
                &self.context(),
                name,
                attributes.to_vec(),
                Action::GetAttribute,
            )
            .await?;
        let source_name = self.to_source(name)?;
        self.source
            .get_attributes(&source_name, &allowed)
            .await
            .map_err(normalize_delegate_error)
    }

    async fn set_attribute(
        &self,
        name: &ObjectName,
        attribute: Attribute,
    ) -> ManagementResult<()> {
        self.policy
            .check(
                &self.context(),
                Some(name),
                Some(attribute.name.as_str()),
                Action::SetAttribute,
            )
            .await?;
        let source_name = self.to_source(name)?;
        self.source
            .set_attribute(&source_name, attribute)
            .await
            .map_err(normalize_delegate_error)
    }

    async fn set_attributes(
        &self,
        name: &ObjectName,
        attributes: AttributeList,
    ) -> ManagementResult<AttributeList> {
        let allowed = self
            .policy
            .check_attribute_list(&self.context(), name, attributes, Action::SetAttribute)
            .await?;
        let source_name = self.to_source(name)?;
        self.source
            .set_attributes(&source_name, allowed)
            .await
            .map_err(normalize_delegate_error)
    }

    async fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        params: &[Value],
        signature: &[String],
    ) -> ManagementResult<Value> {
        self.policy
            .check(&self.context(), Some(name), Some(operation), Action::Invoke)
            .await?;
        let source_name = self.to_source(name)?;
        self.source
            .invoke(&source_name, operation, params, signature)
            .await
            .map_err(normalize_delegate_error)
    }

    async fn get_default_domain(&self) -> ManagementResult<String> {
        if let Some(domain) = self.default_domain.read().clone() {
            return Ok(domain);
        }

        let domain = if self.is_scoped() {
            let value = self.handler_attribute(DEFAULT_DOMAIN_ATTRIBUTE).await?;
            match value {
                Value::String(domain) => domain,
                other => {
                    return Err(ManagementError::Operations(format!(
                        "invalid DefaultDomain: {}",
                        other
                    )))
                }
            }
        } else {
            self.source
                .get_default_domain()
                .await
                .map_err(normalize_delegate_error)?
        };

        *self.default_domain.write() = Some(domain.clone());
        Ok(domain)
    }

    async fn get_domains(&self) -> ManagementResult<Vec<String>> {
        let domains = if self.is_scoped() {
            let value = self.handler_attribute(DOMAINS_ATTRIBUTE).await?;
            serde_json::from_value::<Vec<String>>(value)
                .map_err(|e| ManagementError::Operations(format!("invalid Domains: {}", e)))?
        } else {
            self.source
                .get_domains()
                .await
                .map_err(normalize_delegate_error)?
        };

        Ok(self
            .policy
            .check_domains(&self.context(), domains, Action::GetDomains)
            .await)
    }

    async fn add_notification_listener(
        &self,
        name: &ObjectName,
        listener: ListenerRef,
        filter: Option<Arc<dyn NotificationFilter>>,
        handback: Option<Value>,
    ) -> ManagementResult<()> {
        self.policy
            .check(
                &self.context(),
                Some(name),
                None,
                Action::AddNotificationListener,
            )
            .await?;
        let source_name = self.to_source(name)?;
        let listener = self.to_source_listener(&listener)?;
        self.source
            .add_notification_listener(&source_name, listener, filter, handback)
            .await
            .map_err(normalize_delegate_error)
    }

    async fn remove_notification_listener(
        &self,
        name: &ObjectName,
        listener: &ListenerRef,
    ) -> ManagementResult<()> {
        self.policy
            .check(
                &self.context(),
                Some(name),
                None,
                Action::RemoveNotificationListener,
            )
            .await?;
        let source_name = self.to_source(name)?;
        let listener = self.to_source_listener(listener)?;
        self.source
            .remove_notification_listener(&source_name, &listener)
            .await
            .map_err(normalize_delegate_error)
    }

    async fn get_mbean_info(&self, name: &ObjectName) -> ManagementResult<MBeanInfo> {
        self.policy
            .check(&self.context(), Some(name), None, Action::GetMBeanInfo)
            .await?;
        let source_name = self.to_source(name)?;
        self.source
            .get_mbean_info(&source_name)
            .await
            .map_err(normalize_delegate_error)
    }

    async fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> ManagementResult<bool> {
        self.policy
            .check(&self.context(), Some(name), None, Action::IsInstanceOf)
            .await?;
        let source_name = self.to_source(name)?;
        self.source
            .is_instance_of(&source_name, class_name)
            .await
            .map_err(normalize_delegate_error)
    }

    async fn instantiate(
        &self,
        _class_name: &str,
        _params: &[Value],
    ) -> ManagementResult<Arc<dyn ManagedResource>> {
        Err(ManagementError::Unsupported("instantiate"))
    }

    async fn deserialize(&self, _class_name: &str, _data: &[u8]) -> ManagementResult<Value> {
        Err(ManagementError::Unsupported("deserialize"))
    }

    async fn class_loader_repository(&self) -> ManagementResult<Vec<String>> {
        Err(ManagementError::Unsupported("class_loader_repository"))
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}
