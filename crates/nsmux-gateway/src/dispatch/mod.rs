//! Dispatcher: the top-level connection of a gateway
//!
//! Owns a [`LocalServer`] and the mounted interceptors. Every name-bearing
//! verb is dispatched by the name's domain:
//! - `ns//...` goes to the interceptor of namespace `ns`
//! - a mounted domain goes to its domain interceptor
//! - anything else, handler resources included, stays local

mod handler;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::try_join_all;
use nsmux_core::name::pattern::{has_wildcard, wildcard_match};
use nsmux_core::name::{is_domain_handler_name, is_handler_name};
use nsmux_core::{
    domain_handler_name, handler_name, namespace_of, normalize_namespace_path, Attribute,
    AttributeList, ListenerRef, LocalServer, MBeanInfo, MBeanServerConnection, ManagedResource,
    ManagementError, ManagementResult, NotificationFilter, ObjectInstance, ObjectName,
    NAMESPACE_SEPARATOR,
};
use serde_json::Value;
use tracing::{info, Instrument};

use crate::config::GatewayConfig;
use crate::interceptor::{DomainInterceptor, NamespaceInterceptor};
use crate::logging::{OperationContext, OperationSpan};
use crate::permissions::Authorizer;

pub use handler::{
    DomainHandler, NamespaceHandler, DEFAULT_DOMAIN_ATTRIBUTE, DOMAINS_ATTRIBUTE,
    DOMAIN_ATTRIBUTE, MBEAN_COUNT_ATTRIBUTE, SOURCE_NAMESPACE_ATTRIBUTE,
};

/// Top-level connection dispatching names to mounted interceptors
pub struct Dispatcher {
    server_name: String,
    local: Arc<LocalServer>,
    namespaces: DashMap<String, Arc<NamespaceInterceptor>>,
    domains: DashMap<String, Arc<DomainInterceptor>>,
    authorizer: Option<Arc<dyn Authorizer>>,
}

impl Dispatcher {
    pub fn new(config: &GatewayConfig) -> Self {
        Self::with_server(
            config.server_name.as_str(),
            Arc::new(LocalServer::new(config.default_domain.as_str())),
            config.security.authorizer(),
        )
    }

    pub fn with_server(
        server_name: impl Into<String>,
        local: Arc<LocalServer>,
        authorizer: Option<Arc<dyn Authorizer>>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            local,
            namespaces: DashMap::new(),
            domains: DashMap::new(),
            authorizer,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn local(&self) -> &Arc<LocalServer> {
        &self.local
    }

    /// Mount `source` (seen from its `source_namespace`) as namespace
    /// `namespace`. Returns the name of the registered handler resource.
    pub async fn mount_namespace(
        &self,
        namespace: &str,
        source: Arc<dyn MBeanServerConnection>,
        source_namespace: &str,
    ) -> ManagementResult<ObjectName> {
        let namespace = normalize_namespace_path(namespace, true, true, false)?;
        if namespace.is_empty()
            || namespace.contains(NAMESPACE_SEPARATOR)
            || has_wildcard(&namespace)
        {
            return Err(ManagementError::invalid_name(
                namespace,
                "a mounted namespace must be a single plain segment",
            ));
        }

        let handler = handler_name(&namespace)?;
        if self.namespaces.contains_key(&namespace) {
            return Err(ManagementError::InstanceAlreadyExists(handler.to_string()));
        }

        let interceptor = Arc::new(NamespaceInterceptor::new(
            &self.server_name,
            &namespace,
            source,
            source_namespace,
            self.authorizer.clone(),
        )?);
        self.local
            .register_mbean(
                Arc::new(NamespaceHandler::new(interceptor.clone())),
                Some(&handler),
            )
            .await?;
        self.namespaces.insert(namespace.clone(), interceptor);

        info!(namespace = %namespace, "[Dispatcher] Namespace mounted");
        Ok(handler)
    }

    /// Serve `domain` from `source`. Returns the name of the registered
    /// handler resource.
    pub async fn mount_domain(
        &self,
        domain: &str,
        source: Arc<dyn MBeanServerConnection>,
    ) -> ManagementResult<ObjectName> {
        let interceptor = Arc::new(DomainInterceptor::new(
            &self.server_name,
            domain,
            source,
            self.authorizer.clone(),
            &self.local,
        )?);

        let handler = domain_handler_name(domain)?;
        if self.domains.contains_key(domain) {
            return Err(ManagementError::InstanceAlreadyExists(handler.to_string()));
        }
        self.local
            .register_mbean(
                Arc::new(DomainHandler::new(interceptor.clone())),
                Some(&handler),
            )
            .await?;
        self.domains.insert(domain.to_string(), interceptor);

        info!(domain = %domain, "[Dispatcher] Domain mounted");
        Ok(handler)
    }

    /// Unmount a namespace or a domain
    pub async fn unmount(&self, mount: &str) -> ManagementResult<()> {
        let namespace = normalize_namespace_path(mount, true, true, false)
            .unwrap_or_else(|_| mount.to_string());
        if let Some((namespace, _)) = self.namespaces.remove(&namespace) {
            self.local.unregister_mbean(&handler_name(&namespace)?).await?;
            info!(namespace = %namespace, "[Dispatcher] Namespace unmounted");
            return Ok(());
        }

        if let Some((domain, interceptor)) = self.domains.remove(mount) {
            interceptor.remove_lifecycle_bridge().await?;
            self.local
                .unregister_mbean(&domain_handler_name(&domain)?)
                .await?;
            info!(domain = %domain, "[Dispatcher] Domain unmounted");
            return Ok(());
        }

        Err(ManagementError::InstanceNotFound(format!(
            "nothing mounted at {}",
            mount
        )))
    }

    pub fn mounted_namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self.namespaces.iter().map(|e| e.key().clone()).collect();
        namespaces.sort();
        namespaces
    }

    pub fn mounted_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.domains.iter().map(|e| e.key().clone()).collect();
        domains.sort();
        domains
    }

    /// Connection responsible for `name`
    async fn route(&self, name: &ObjectName) -> ManagementResult<Arc<dyn MBeanServerConnection>> {
        if let Some(namespace) = namespace_of(name.domain()) {
            if is_local_handler(name) {
                return Ok(self.local.clone());
            }
            let interceptor = self.namespaces.get(namespace).map(|e| e.value().clone());
            return match interceptor {
                Some(interceptor) => Ok(interceptor.connection().clone()),
                None => Err(ManagementError::InstanceNotFound(format!(
                    "{} (no namespace '{}')",
                    name, namespace
                ))),
            };
        }

        if is_domain_handler_name(name) {
            return Ok(self.local.clone());
        }
        let interceptor = self.domains.get(name.domain()).map(|e| e.value().clone());
        match interceptor {
            Some(interceptor) => self.domain_connection(&interceptor).await,
            None => Ok(self.local.clone()),
        }
    }

    async fn domain_connection(
        &self,
        interceptor: &DomainInterceptor,
    ) -> ManagementResult<Arc<dyn MBeanServerConnection>> {
        interceptor.ensure_lifecycle_bridge().await?;
        Ok(interceptor.connection().clone())
    }

    /// Namespace interceptor for a namespaced query pattern: `None` when the
    /// pattern is not namespaced, `Some(None)` when its namespace is not
    /// mounted.
    fn namespace_for_pattern(
        &self,
        pattern: Option<&ObjectName>,
    ) -> Option<Option<Arc<NamespaceInterceptor>>> {
        let pattern = pattern.filter(|p| !is_local_handler(p))?;
        let namespace = namespace_of(pattern.domain())?;
        Some(self.namespaces.get(namespace).map(|e| e.value().clone()))
    }

    /// Domain interceptors whose domain a query pattern covers
    fn domains_for_pattern(&self, pattern: Option<&ObjectName>) -> Vec<Arc<DomainInterceptor>> {
        let mut matching: Vec<Arc<DomainInterceptor>> = self
            .domains
            .iter()
            .filter(|e| pattern.map_or(true, |p| wildcard_match(p.domain(), e.key())))
            .map(|e| e.value().clone())
            .collect();
        matching.sort_by(|a, b| a.domain().cmp(b.domain()));
        matching
    }

    async fn traced<T, F>(
        &self,
        verb: &'static str,
        name: Option<&ObjectName>,
        call: F,
    ) -> ManagementResult<T>
    where
        F: Future<Output = ManagementResult<T>> + Send,
    {
        let ctx = OperationContext::new(verb, name);
        let result = call.instrument(OperationSpan::enter(&ctx)).await;
        OperationSpan::log_exit(&ctx, result.as_ref().err());
        result
    }
}

/// Handler of a namespace mounted here (`ns//:type=JMXNamespace`), as
/// opposed to one of a nested namespace
fn is_local_handler(name: &ObjectName) -> bool {
    is_handler_name(name)
        && name
            .domain()
            .trim_start_matches('/')
            .matches(NAMESPACE_SEPARATOR)
            .count()
            == 1
}

#[async_trait]
impl MBeanServerConnection for Dispatcher {
    async fn create_mbean(
        &self,
        class_name: &str,
        name: Option<&ObjectName>,
        loader_name: Option<&ObjectName>,
        params: &[Value],
    ) -> ManagementResult<ObjectInstance> {
        self.traced("create_mbean", name, async {
            let target: Arc<dyn MBeanServerConnection> = match name {
                Some(name) => self.route(name).await?,
                None => self.local.clone(),
            };
            target
                .create_mbean(class_name, name, loader_name, params)
                .await
        })
        .await
    }

    async fn register_mbean(
        &self,
        resource: Arc<dyn ManagedResource>,
        name: Option<&ObjectName>,
    ) -> ManagementResult<ObjectInstance> {
        self.traced("register_mbean", name, async move {
            let target: Arc<dyn MBeanServerConnection> = match name {
                Some(name) => self.route(name).await?,
                None => self.local.clone(),
            };
            target.register_mbean(resource, name).await
        })
        .await
    }

    async fn unregister_mbean(&self, name: &ObjectName) -> ManagementResult<()> {
        self.traced("unregister_mbean", Some(name), async {
            self.route(name).await?.unregister_mbean(name).await
        })
        .await
    }

    async fn get_object_instance(&self, name: &ObjectName) -> ManagementResult<ObjectInstance> {
        self.traced("get_object_instance", Some(name), async {
            self.route(name).await?.get_object_instance(name).await
        })
        .await
    }

    async fn query_mbeans(
        &self,
        pattern: Option<&ObjectName>,
    ) -> ManagementResult<Vec<ObjectInstance>> {
        self.traced("query_mbeans", pattern, async {
            if let Some(interceptor) = self.namespace_for_pattern(pattern) {
                return match interceptor {
                    Some(interceptor) => interceptor.connection().query_mbeans(pattern).await,
                    None => Ok(Vec::new()),
                };
            }

            let mut instances = self.local.query_mbeans(pattern).await?;
            let domains = self.domains_for_pattern(pattern);
            let results = try_join_all(domains.iter().map(|interceptor| async move {
                self.domain_connection(interceptor)
                    .await?
                    .query_mbeans(pattern)
                    .await
            }))
            .await?;
            instances.extend(results.into_iter().flatten());
            Ok(instances)
        })
        .await
    }

    async fn query_names(
        &self,
        pattern: Option<&ObjectName>,
    ) -> ManagementResult<Vec<ObjectName>> {
        self.traced("query_names", pattern, async {
            if let Some(interceptor) = self.namespace_for_pattern(pattern) {
                return match interceptor {
                    Some(interceptor) => interceptor.connection().query_names(pattern).await,
                    None => Ok(Vec::new()),
                };
            }

            let mut names = self.local.query_names(pattern).await?;
            let domains = self.domains_for_pattern(pattern);
            let results = try_join_all(domains.iter().map(|interceptor| async move {
                self.domain_connection(interceptor)
                    .await?
                    .query_names(pattern)
                    .await
            }))
            .await?;
            names.extend(results.into_iter().flatten());
            Ok(names)
        })
        .await
    }

    async fn is_registered(&self, name: &ObjectName) -> ManagementResult<bool> {
        match self.route(name).await {
            Ok(target) => target.is_registered(name).await,
            Err(ManagementError::InstanceNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_mbean_count(&self) -> ManagementResult<usize> {
        let local = self.local.get_mbean_count().await?;
        let domains = self.domains_for_pattern(None);
        let counts = try_join_all(domains.iter().map(|interceptor| interceptor.mbean_count())).await?;
        Ok(local + counts.into_iter().sum::<usize>())
    }

    async fn get_attribute(&self, name: &ObjectName, attribute: &str) -> ManagementResult<Value> {
        self.traced("get_attribute", Some(name), async {
            self.route(name).await?.get_attribute(name, attribute).await
        })
        .await
    }

    async fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[String],
    ) -> ManagementResult<AttributeList> {
        self.traced("get_attributes", Some(name), async {
            self.route(name).await?.get_attributes(name, attributes).await
        })
        .await
    }

    async fn set_attribute(
        &self,
        name: &ObjectName,
        attribute: Attribute,
    ) -> ManagementResult<()> {
        self.traced("set_attribute", Some(name), async move {
            self.route(name).await?.set_attribute(name, attribute).await
        })
        .await
    }

    async fn set_attributes(
        &self,
        name: &ObjectName,
        attributes: AttributeList,
    ) -> ManagementResult<AttributeList> {
        self.traced("set_attributes", Some(name), async move {
            self.route(name).await?.set_attributes(name, attributes).await
        })
        .await
    }

    async fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        params: &[Value],
        signature: &[String],
    ) -> ManagementResult<Value> {
        self.traced("invoke", Some(name), async {
            self.route(name)
                .await?
                .invoke(name, operation, params, signature)
                .await
        })
        .await
    }

    async fn get_default_domain(&self) -> ManagementResult<String> {
        self.local.get_default_domain().await
    }

    async fn get_domains(&self) -> ManagementResult<Vec<String>> {
        let mut domains: BTreeSet<String> = self.local.get_domains().await?.into_iter().collect();
        let mounted = self.domains_for_pattern(None);
        let results = try_join_all(
            mounted
                .iter()
                .map(|interceptor| interceptor.connection().get_domains()),
        )
        .await?;
        domains.extend(results.into_iter().flatten());
        Ok(domains.into_iter().collect())
    }

    async fn add_notification_listener(
        &self,
        name: &ObjectName,
        listener: ListenerRef,
        filter: Option<Arc<dyn NotificationFilter>>,
        handback: Option<Value>,
    ) -> ManagementResult<()> {
        self.traced("add_notification_listener", Some(name), async move {
            self.route(name)
                .await?
                .add_notification_listener(name, listener, filter, handback)
                .await
        })
        .await
    }

    async fn remove_notification_listener(
        &self,
        name: &ObjectName,
        listener: &ListenerRef,
    ) -> ManagementResult<()> {
        self.traced("remove_notification_listener", Some(name), async {
            self.route(name)
                .await?
                .remove_notification_listener(name, listener)
                .await
        })
        .await
    }

    async fn get_mbean_info(&self, name: &ObjectName) -> ManagementResult<MBeanInfo> {
        self.traced("get_mbean_info", Some(name), async {
            self.route(name).await?.get_mbean_info(name).await
        })
        .await
    }

    async fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> ManagementResult<bool> {
        self.traced("is_instance_of", Some(name), async {
            self.route(name).await?.is_instance_of(name, class_name).await
        })
        .await
    }

    async fn instantiate(
        &self,
        class_name: &str,
        params: &[Value],
    ) -> ManagementResult<Arc<dyn ManagedResource>> {
        self.local.instantiate(class_name, params).await
    }

    async fn deserialize(&self, class_name: &str, data: &[u8]) -> ManagementResult<Value> {
        self.local.deserialize(class_name, data).await
    }

    async fn class_loader_repository(&self) -> ManagementResult<Vec<String>> {
        self.local.class_loader_repository().await
    }
}
