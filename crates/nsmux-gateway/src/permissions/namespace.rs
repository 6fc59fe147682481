//! Permission policy of a namespace interceptor

use std::sync::Arc;

use async_trait::async_trait;
use nsmux_core::{ManagementResult, ObjectName};

use super::{Action, Authorizer, Permission, PermissionKind, PermissionPolicy, PolicyContext};

/// Checks namespace permissions on every name crossing into a namespace.
/// Without an authorizer every check grants.
#[derive(Clone)]
pub struct NamespacePolicy {
    server_name: String,
    namespace: String,
    authorizer: Option<Arc<dyn Authorizer>>,
}

impl NamespacePolicy {
    pub fn new(
        server_name: impl Into<String>,
        namespace: impl Into<String>,
        authorizer: Option<Arc<dyn Authorizer>>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            namespace: namespace.into(),
            authorizer,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn permission(
        &self,
        name: Option<&ObjectName>,
        member: Option<&str>,
        action: Action,
    ) -> Permission {
        Permission::new(PermissionKind::Namespace, self.server_name.as_str(), action)
            .with_member(member)
            .with_name(name)
    }
}

#[async_trait]
impl PermissionPolicy for NamespacePolicy {
    fn is_enforcing(&self) -> bool {
        self.authorizer.is_some()
    }

    async fn check(
        &self,
        _ctx: &PolicyContext<'_>,
        name: Option<&ObjectName>,
        member: Option<&str>,
        action: Action,
    ) -> ManagementResult<()> {
        match &self.authorizer {
            Some(authorizer) => authorizer.check_permission(&self.permission(name, member, action)),
            None => Ok(()),
        }
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
