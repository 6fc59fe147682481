//! Opening routing scopes over existing connections

use std::sync::Arc;

use nsmux_core::{
    concat_paths, handler_name, normalize_namespace_path, MBeanServerConnection, ManagementError,
    ManagementResult, NameRouter,
};
use tracing::debug;

use super::connection::RoutingConnection;

/// A connection that sees `source` from inside namespace `sub_path`.
///
/// Narrowing a routing connection whose target namespace is empty collapses
/// into a single layer over its delegate, so repeated narrowing never stacks.
pub fn cd(
    source: Arc<dyn MBeanServerConnection>,
    sub_path: &str,
) -> ManagementResult<Arc<dyn MBeanServerConnection>> {
    let sub_path = normalize_namespace_path(sub_path, true, true, false)?;
    if sub_path.is_empty() {
        return Ok(source);
    }

    let collapsible = source
        .as_any()
        .and_then(|any| any.downcast_ref::<RoutingConnection>())
        .filter(|routing| routing.router().target_namespace().is_empty());
    if let Some(routing) = collapsible {
        let path = concat_paths(routing.router().source_namespace(), &sub_path)?;
        debug!(path = %path, "[Routing] Collapsing nested namespace");
        return Ok(Arc::new(RoutingConnection::with_policy(
            routing.source().clone(),
            NameRouter::new("", &path)?,
            routing.policy().clone(),
        )));
    }

    debug!(path = %sub_path, "[Routing] Narrowing into namespace");
    Ok(Arc::new(RoutingConnection::new(
        source,
        NameRouter::new("", &sub_path)?,
    )))
}

/// Like [`cd`], but fails when `namespace` is not mounted in `source`
pub async fn narrow_to_namespace(
    source: Arc<dyn MBeanServerConnection>,
    namespace: &str,
) -> ManagementResult<Arc<dyn MBeanServerConnection>> {
    let handler = handler_name(namespace)?;
    if !source.is_registered(&handler).await? {
        return Err(ManagementError::InstanceNotFound(format!(
            "no such namespace: {}",
            namespace
        )));
    }
    cd(source, namespace)
}
