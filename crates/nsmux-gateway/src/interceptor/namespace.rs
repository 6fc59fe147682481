use std::sync::Arc;

use nsmux_core::{MBeanServerConnection, ManagementResult, NameRouter};

use crate::permissions::{Authorizer, NamespacePolicy};
use crate::routing::RoutingConnection;

/// Routes names under `namespace//` into a source connection, checking
/// namespace permissions on the way
pub struct NamespaceInterceptor {
    namespace: String,
    connection: Arc<RoutingConnection>,
}

impl NamespaceInterceptor {
    /// `source_namespace` is the namespace inside `source` that `namespace`
    /// maps onto; empty for the whole source.
    pub fn new(
        server_name: &str,
        namespace: &str,
        source: Arc<dyn MBeanServerConnection>,
        source_namespace: &str,
        authorizer: Option<Arc<dyn Authorizer>>,
    ) -> ManagementResult<Self> {
        let router = NameRouter::new(namespace, source_namespace)?;
        let namespace = router.target_namespace().to_string();
        let policy = NamespacePolicy::new(server_name, namespace.as_str(), authorizer);
        Ok(Self {
            namespace,
            connection: Arc::new(RoutingConnection::with_policy(
                source,
                router,
                Arc::new(policy),
            )),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn connection(&self) -> &Arc<RoutingConnection> {
        &self.connection
    }
}
