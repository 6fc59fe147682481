//! Handler resources registered for mounted namespaces and domains

use std::sync::Arc;

use async_trait::async_trait;
use nsmux_core::{
    Attribute, AttributeInfo, MBeanInfo, MBeanServerConnection, ManagedResource, ManagementError,
    ManagementResult,
};
use serde_json::{json, Value};

use crate::interceptor::{DomainInterceptor, NamespaceInterceptor};

pub const DOMAINS_ATTRIBUTE: &str = "Domains";
pub const DEFAULT_DOMAIN_ATTRIBUTE: &str = "DefaultDomain";
pub const MBEAN_COUNT_ATTRIBUTE: &str = "MBeanCount";
pub const SOURCE_NAMESPACE_ATTRIBUTE: &str = "SourceNamespace";
pub const DOMAIN_ATTRIBUTE: &str = "Domain";

const NAMESPACE_HANDLER_CLASS: &str = "nsmux.JMXNamespace";
const DOMAIN_HANDLER_CLASS: &str = "nsmux.JMXDomain";

fn read_only(name: &str, type_name: &str, description: &str) -> AttributeInfo {
    AttributeInfo {
        name: name.to_string(),
        type_name: type_name.to_string(),
        description: Some(description.to_string()),
        readable: true,
        writable: false,
    }
}

fn read_only_error(attribute: &Attribute) -> ManagementError {
    ManagementError::AttributeNotFound(format!("{} is read-only", attribute.name))
}

/// Answers namespace-scoped questions (domains, default domain, count) for
/// the namespace it is mounted for
pub struct NamespaceHandler {
    interceptor: Arc<NamespaceInterceptor>,
}

impl NamespaceHandler {
    pub fn new(interceptor: Arc<NamespaceInterceptor>) -> Self {
        Self { interceptor }
    }
}

#[async_trait]
impl ManagedResource for NamespaceHandler {
    fn class_name(&self) -> &str {
        NAMESPACE_HANDLER_CLASS
    }

    fn mbean_info(&self) -> MBeanInfo {
        MBeanInfo {
            class_name: NAMESPACE_HANDLER_CLASS.to_string(),
            description: Some(format!("Namespace {}", self.interceptor.namespace())),
            attributes: vec![
                read_only(DOMAINS_ATTRIBUTE, "string[]", "Domains inside the namespace"),
                read_only(DEFAULT_DOMAIN_ATTRIBUTE, "string", "Default domain inside the namespace"),
                read_only(MBEAN_COUNT_ATTRIBUTE, "integer", "Resources inside the namespace"),
                read_only(SOURCE_NAMESPACE_ATTRIBUTE, "string", "Namespace served by the source"),
            ],
            ..MBeanInfo::default()
        }
    }

    async fn get_attribute(&self, attribute: &str) -> ManagementResult<Value> {
        let connection = self.interceptor.connection();
        match attribute {
            DOMAINS_ATTRIBUTE => Ok(json!(connection.get_domains().await?)),
            DEFAULT_DOMAIN_ATTRIBUTE => Ok(Value::String(connection.get_default_domain().await?)),
            MBEAN_COUNT_ATTRIBUTE => Ok(json!(connection.get_mbean_count().await?)),
            SOURCE_NAMESPACE_ATTRIBUTE => Ok(Value::String(
                connection.router().source_namespace().to_string(),
            )),
            other => Err(ManagementError::AttributeNotFound(other.to_string())),
        }
    }

    async fn set_attribute(&self, attribute: Attribute) -> ManagementResult<()> {
        Err(read_only_error(&attribute))
    }

    async fn invoke(
        &self,
        operation: &str,
        _params: &[Value],
        _signature: &[String],
    ) -> ManagementResult<Value> {
        Err(ManagementError::Reflection(format!(
            "no operation {} on namespace handler",
            operation
        )))
    }
}

/// Describes a mounted domain
pub struct DomainHandler {
    interceptor: Arc<DomainInterceptor>,
}

impl DomainHandler {
    pub fn new(interceptor: Arc<DomainInterceptor>) -> Self {
        Self { interceptor }
    }
}

#[async_trait]
impl ManagedResource for DomainHandler {
    fn class_name(&self) -> &str {
        DOMAIN_HANDLER_CLASS
    }

    fn mbean_info(&self) -> MBeanInfo {
        MBeanInfo {
            class_name: DOMAIN_HANDLER_CLASS.to_string(),
            description: Some(format!("Domain {}", self.interceptor.domain())),
            attributes: vec![
                read_only(DOMAIN_ATTRIBUTE, "string", "Mounted domain"),
                read_only(MBEAN_COUNT_ATTRIBUTE, "integer", "Resources in the domain"),
            ],
            ..MBeanInfo::default()
        }
    }

    async fn get_attribute(&self, attribute: &str) -> ManagementResult<Value> {
        match attribute {
            DOMAIN_ATTRIBUTE => Ok(Value::String(self.interceptor.domain().to_string())),
            MBEAN_COUNT_ATTRIBUTE => Ok(json!(self.interceptor.mbean_count().await?)),
            other => Err(ManagementError::AttributeNotFound(other.to_string())),
        }
    }

    async fn set_attribute(&self, attribute: Attribute) -> ManagementResult<()> {
        Err(read_only_error(&attribute))
    }

    async fn invoke(
        &self,
        operation: &str,
        _params: &[Value],
        _signature: &[String],
    ) -> ManagementResult<Value> {
        Err(ManagementError::Reflection(format!(
            "no operation {} on domain handler",
            operation
        )))
    }
}
