//! Permission checks for routed connections
//!
//! A [`PermissionPolicy`] is injected into every
//! [`RoutingConnection`](crate::routing::RoutingConnection). The connection
//! always calls the hooks; the default bodies grant everything, so a policy
//! only overrides what it enforces.

mod domain;
mod namespace;
mod rules;

use std::fmt;

use async_trait::async_trait;
use nsmux_core::{
    AttributeList, MBeanServerConnection, ManagementError, ManagementResult, NameRouter, ObjectName,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use domain::{DomainPolicy, UNKNOWN_CLASS};
pub use namespace::NamespacePolicy;
pub use rules::{GrantRule, PermissionPattern, RuleAuthorizer};

/// A guarded action of the connection verb set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    AddNotificationListener,
    GetAttribute,
    GetClassLoaderRepository,
    GetDomains,
    GetMBeanInfo,
    GetObjectInstance,
    Instantiate,
    Invoke,
    IsInstanceOf,
    IsRegistered,
    QueryMBeans,
    QueryNames,
    RegisterMBean,
    RemoveNotificationListener,
    SetAttribute,
    UnregisterMBean,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::AddNotificationListener => "addNotificationListener",
            Action::GetAttribute => "getAttribute",
            Action::GetClassLoaderRepository => "getClassLoaderRepository",
            Action::GetDomains => "getDomains",
            Action::GetMBeanInfo => "getMBeanInfo",
            Action::GetObjectInstance => "getObjectInstance",
            Action::Instantiate => "instantiate",
            Action::Invoke => "invoke",
            Action::IsInstanceOf => "isInstanceOf",
            Action::IsRegistered => "isRegistered",
            Action::QueryMBeans => "queryMBeans",
            Action::QueryNames => "queryNames",
            Action::RegisterMBean => "registerMBean",
            Action::RemoveNotificationListener => "removeNotificationListener",
            Action::SetAttribute => "setAttribute",
            Action::UnregisterMBean => "unregisterMBean",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a permission guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    /// A resource inside a mounted domain
    Resource,
    /// Anything reached through a namespace
    Namespace,
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionKind::Resource => f.write_str("resource"),
            PermissionKind::Namespace => f.write_str("namespace"),
        }
    }
}

/// A requested permission. Absent parts render as `-` and are not
/// constrained by grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub kind: PermissionKind,
    pub server_name: String,
    pub class_name: Option<String>,
    pub member: Option<String>,
    pub name: Option<ObjectName>,
    pub action: Action,
}

impl Permission {
    pub fn new(kind: PermissionKind, server_name: impl Into<String>, action: Action) -> Self {
        Self {
            kind,
            server_name: server_name.into(),
            class_name: None,
            member: None,
            name: None,
            action,
        }
    }

    pub fn with_class(mut self, class_name: Option<&str>) -> Self {
        self.class_name = class_name.map(str::to_string);
        self
    }

    pub fn with_member(mut self, member: Option<&str>) -> Self {
        self.member = member.map(str::to_string);
        self
    }

    pub fn with_name(mut self, name: Option<&ObjectName>) -> Self {
        self.name = name.cloned();
        self
    }

    /// `class#member[name]`
    pub fn target(&self) -> String {
        format!(
            "{}#{}[{}]",
            self.class_name.as_deref().unwrap_or("-"),
            self.member.as_deref().unwrap_or("-"),
            self.name
                .as_ref()
                .map(|n| n.canonical_name().to_string())
                .unwrap_or_else(|| "-".to_string())
        )
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.kind, self.target(), self.action)
    }
}

/// The ambient security context: decides single permissions
pub trait Authorizer: Send + Sync {
    /// `Ok` when granted, `ManagementError::Security` when denied
    fn check_permission(&self, permission: &Permission) -> ManagementResult<()>;
}

/// What a policy may look at while deciding
pub struct PolicyContext<'a> {
    /// The connection the routing layer delegates to
    pub source: &'a dyn MBeanServerConnection,
    pub router: &'a NameRouter,
}

/// Permission hooks called by a routing connection before and after each
/// delegated verb. Names passed in are in the target (caller) view.
#[async_trait]
pub trait PermissionPolicy: Send + Sync {
    /// Whether checks can deny at all
    fn is_enforcing(&self) -> bool {
        false
    }

    async fn check(
        &self,
        _ctx: &PolicyContext<'_>,
        _name: Option<&ObjectName>,
        _member: Option<&str>,
        _action: Action,
    ) -> ManagementResult<()> {
        Ok(())
    }

    async fn check_create(
        &self,
        _ctx: &PolicyContext<'_>,
        _name: Option<&ObjectName>,
        _class_name: &str,
        _action: Action,
    ) -> ManagementResult<()> {
        Ok(())
    }

    /// Blanket check on the resource, then drop each attribute the caller
    /// may not touch. Order is preserved.
    async fn check_attribute_names(
        &self,
        ctx: &PolicyContext<'_>,
        name: &ObjectName,
        attributes: Vec<String>,
        action: Action,
    ) -> ManagementResult<Vec<String>> {
        self.check(ctx, Some(name), None, action).await?;
        if !self.is_enforcing() {
            return Ok(attributes);
        }

        let mut allowed = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            let outcome = self
                .check(ctx, Some(name), Some(attribute.as_str()), action)
                .await;
            match outcome {
                Ok(()) => allowed.push(attribute),
                Err(e @ ManagementError::Security(_)) => debug!(
                    name = %name,
                    attribute = %attribute,
                    error = %e,
                    "[Permissions] Dropping attribute"
                ),
                Err(e) => return Err(e),
            }
        }
        Ok(allowed)
    }

    /// Same shape as [`check_attribute_names`](Self::check_attribute_names)
    /// for attribute/value pairs
    async fn check_attribute_list(
        &self,
        ctx: &PolicyContext<'_>,
        name: &ObjectName,
        attributes: AttributeList,
        action: Action,
    ) -> ManagementResult<AttributeList> {
        self.check(ctx, Some(name), None, action).await?;
        if !self.is_enforcing() {
            return Ok(attributes);
        }

        let mut allowed = AttributeList::with_capacity(attributes.len());
        for attribute in attributes {
            let outcome = self
                .check(ctx, Some(name), Some(attribute.name.as_str()), action)
                .await;
            match outcome {
                Ok(()) => allowed.push(attribute),
                Err(e @ ManagementError::Security(_)) => debug!(
                    name = %name,
                    attribute = %attribute.name,
                    error = %e,
                    "[Permissions] Dropping attribute"
                ),
                Err(e) => return Err(e),
            }
        }
        Ok(allowed)
    }

    /// `Ok(true)` when the caller may not see `name` in a query result.
    /// Only a security denial hides a name.
    async fn check_query(
        &self,
        ctx: &PolicyContext<'_>,
        name: &ObjectName,
        action: Action,
    ) -> ManagementResult<bool> {
        match self.check(ctx, Some(name), None, action).await {
            Ok(()) => Ok(false),
            Err(ManagementError::Security(_)) => Ok(true),
            Err(e) => Err(e),
        }
    }

    async fn check_domains(
        &self,
        _ctx: &PolicyContext<'_>,
        domains: Vec<String>,
        _action: Action,
    ) -> Vec<String> {
        domains
    }

    /// A priori check before running a query: the caller must hold the
    /// action at all. Per-element filtering happens afterwards.
    async fn check_pattern(
        &self,
        ctx: &PolicyContext<'_>,
        _pattern: Option<&ObjectName>,
        member: Option<&str>,
        action: Action,
    ) -> ManagementResult<()> {
        self.check(ctx, None, member, action).await
    }

    /// Whether a query result element is hidden from the caller
    async fn excludes_from_result(
        &self,
        _ctx: &PolicyContext<'_>,
        _name: &ObjectName,
        _action: Action,
    ) -> ManagementResult<bool> {
        Ok(false)
    }
}

/// Grants everything
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAll;

impl PermissionPolicy for PermitAll {}
