//! Permission policy of a domain interceptor

use std::sync::Arc;

use async_trait::async_trait;
use nsmux_core::{ManagementResult, ObjectName};
use tracing::debug;

use super::{Action, Authorizer, Permission, PermissionKind, PermissionPolicy, PolicyContext};

/// Class name used when the class of a resource cannot be resolved
pub const UNKNOWN_CLASS: &str = "<unknown>";

/// Checks resource permissions for the resources of one mounted domain and
/// hides everything outside that domain.
#[derive(Clone)]
pub struct DomainPolicy {
    server_name: String,
    domain: String,
    authorizer: Option<Arc<dyn Authorizer>>,
}

impl DomainPolicy {
    pub fn new(
        server_name: impl Into<String>,
        domain: impl Into<String>,
        authorizer: Option<Arc<dyn Authorizer>>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            domain: domain.into(),
            authorizer,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Class of the resource behind `name`, or [`UNKNOWN_CLASS`]
    async fn resolve_class(&self, ctx: &PolicyContext<'_>, name: &ObjectName) -> String {
        let source_name = match ctx.router.to_source_view(name, true) {
            Ok(source_name) => source_name,
            Err(e) => {
                debug!(name = %name, error = %e, "[DomainPolicy] Cannot route name for class lookup");
                return UNKNOWN_CLASS.to_string();
            }
        };
        match ctx.source.get_object_instance(&source_name).await {
            Ok(instance) => instance.class_name,
            Err(e) => {
                debug!(name = %name, error = %e, "[DomainPolicy] Class lookup failed");
                UNKNOWN_CLASS.to_string()
            }
        }
    }

    fn authorize(&self, authorizer: &dyn Authorizer, permission: Permission) -> ManagementResult<()> {
        authorizer.check_permission(&permission)
    }
}

#[async_trait]
impl PermissionPolicy for DomainPolicy {
    fn is_enforcing(&self) -> bool {
        self.authorizer.is_some()
    }

    async fn check(
        &self,
        ctx: &PolicyContext<'_>,
        name: Option<&ObjectName>,
        member: Option<&str>,
        action: Action,
    ) -> ManagementResult<()> {
        let Some(authorizer) = &self.authorizer else {
            return Ok(());
        };
        let permission = Permission::new(PermissionKind::Resource, self.server_name.as_str(), action);

        // Domain checks carry no class and no member
        if action == Action::GetDomains {
            return self.authorize(authorizer.as_ref(), permission.with_name(name));
        }

        let class_name = match name {
            Some(name) if !name.is_pattern() => Some(self.resolve_class(ctx, name).await),
            _ => None,
        };
        self.authorize(
            authorizer.as_ref(),
            permission
                .with_class(class_name.as_deref())
                .with_member(member)
                .with_name(name),
        )
    }

    async fn check_create(
        &self,
        _ctx: &PolicyContext<'_>,
        name: Option<&ObjectName>,
        class_name: &str,
        action: Action,
    ) -> ManagementResult<()> {
        let Some(authorizer) = &self.authorizer else {
            return Ok(());
        };
        self.authorize(
            authorizer.as_ref(),
            Permission::new(PermissionKind::Resource, self.server_name.as_str(), action)
                .with_class(Some(class_name))
                .with_name(name),
        )
    }

    async fn check_domains(
        &self,
        ctx: &PolicyContext<'_>,
        mut domains: Vec<String>,
        action: Action,
    ) -> Vec<String> {
        domains.retain(|domain| domain == &self.domain);
        if self.authorizer.is_none() {
            return domains;
        }

        let mut allowed = Vec::with_capacity(domains.len());
        for domain in domains {
            let Ok(marker) = ObjectName::parse(&format!("{}:x=x", domain)) else {
                debug!(domain = %domain, "[DomainPolicy] Dropping unparseable domain");
                continue;
            };
            match self.check(ctx, Some(&marker), None, action).await {
                Ok(()) => allowed.push(domain),
                Err(e) => debug!(domain = %domain, error = %e, "[DomainPolicy] Hiding domain"),
            }
        }
        allowed
    }

    async fn check_pattern(
        &self,
        _ctx: &PolicyContext<'_>,
        _pattern: Option<&ObjectName>,
        member: Option<&str>,
        action: Action,
    ) -> ManagementResult<()> {
        let Some(authorizer) = &self.authorizer else {
            return Ok(());
        };
        self.authorize(
            authorizer.as_ref(),
            Permission::new(PermissionKind::Resource, self.server_name.as_str(), action)
                .with_member(member),
        )
    }

    async fn excludes_from_result(
        &self,
        ctx: &PolicyContext<'_>,
        name: &ObjectName,
        action: Action,
    ) -> ManagementResult<bool> {
        if name.domain() != self.domain {
            return Ok(true);
        }
        self.check_query(ctx, name, action).await
    }
}
