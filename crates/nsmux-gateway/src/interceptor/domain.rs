//! Domain interceptor and its lifecycle bridge
//!
//! A mounted domain lives in another connection. Registration notifications
//! for that domain are emitted by the other connection's delegate, so the
//! interceptor relays them to the parent server's delegate. The relay is
//! installed on first use and removed on unmount.

use std::sync::{Arc, Weak};

use nsmux_core::name::pattern::has_wildcard;
use nsmux_core::{
    LocalServer, ListenerRef, MBeanServerConnection, ManagementError, ManagementResult,
    NameRouter, Notification, NotificationFilter, NotificationListener, ObjectName,
    RegistrationFilter, DELEGATE_NAME, NAMESPACE_SEPARATOR,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::permissions::{Authorizer, DomainPolicy};
use crate::routing::{normalize_delegate_error, RoutingConnection};

/// An installed listener, kept so it can be removed again
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    pub emitter: ObjectName,
    pub listener: ListenerRef,
}

/// Re-emits lifecycle notifications from the parent's delegate
struct LifecycleRelay {
    domain: String,
    parent: Weak<LocalServer>,
}

impl NotificationListener for LifecycleRelay {
    fn handle_notification(&self, notification: &Notification, _handback: Option<&Value>) {
        let Some(parent) = self.parent.upgrade() else {
            debug!(domain = %self.domain, "[DomainInterceptor] Parent server gone, dropping notification");
            return;
        };

        let mut relayed = notification.clone();
        relayed.source = parent.delegate_name().clone();
        relayed.sequence_number = parent.next_sequence();
        debug!(
            domain = %self.domain,
            notification_type = %relayed.notification_type,
            "[DomainInterceptor] Relaying lifecycle notification"
        );
        parent.emit(relayed);
    }
}

/// Serves one whole domain from another connection
pub struct DomainInterceptor {
    domain: String,
    connection: Arc<RoutingConnection>,
    parent: Weak<LocalServer>,
    bridge: Mutex<Option<ListenerHandle>>,
}

impl DomainInterceptor {
    pub fn new(
        server_name: &str,
        domain: &str,
        source: Arc<dyn MBeanServerConnection>,
        authorizer: Option<Arc<dyn Authorizer>>,
        parent: &Arc<LocalServer>,
    ) -> ManagementResult<Self> {
        if domain.is_empty() || domain.contains(NAMESPACE_SEPARATOR) || has_wildcard(domain) {
            return Err(ManagementError::invalid_name(
                domain,
                "a mounted domain must be a plain domain name",
            ));
        }

        let policy = DomainPolicy::new(server_name, domain, authorizer);
        Ok(Self {
            domain: domain.to_string(),
            connection: Arc::new(RoutingConnection::with_policy(
                source,
                NameRouter::root(),
                Arc::new(policy),
            )),
            parent: Arc::downgrade(parent),
            bridge: Mutex::new(None),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn connection(&self) -> &Arc<RoutingConnection> {
        &self.connection
    }

    /// Number of resources of this domain the caller may see
    pub async fn mbean_count(&self) -> ManagementResult<usize> {
        Ok(self.connection.query_names(None).await?.len())
    }

    /// Install the lifecycle relay unless it is already there. Returns
    /// whether this call installed it.
    pub async fn ensure_lifecycle_bridge(&self) -> ManagementResult<bool> {
        let mut bridge = self.bridge.lock().await;
        if bridge.is_some() {
            return Ok(false);
        }

        let emitter = ObjectName::parse(DELEGATE_NAME)?;
        let relay: Arc<dyn NotificationListener> = Arc::new(LifecycleRelay {
            domain: self.domain.clone(),
            parent: self.parent.clone(),
        });
        let listener = ListenerRef::Object(relay);
        let filter: Arc<dyn NotificationFilter> =
            Arc::new(RegistrationFilter::for_domain(&self.domain)?);

        self.connection
            .source()
            .add_notification_listener(&emitter, listener.clone(), Some(filter), None)
            .await
            .map_err(normalize_delegate_error)?;

        info!(domain = %self.domain, "[DomainInterceptor] Lifecycle bridge installed");
        *bridge = Some(ListenerHandle { emitter, listener });
        Ok(true)
    }

    /// Remove the lifecycle relay if installed. Returns whether one was
    /// removed.
    pub async fn remove_lifecycle_bridge(&self) -> ManagementResult<bool> {
        let mut bridge = self.bridge.lock().await;
        let Some(handle) = bridge.take() else {
            return Ok(false);
        };

        match self
            .connection
            .source()
            .remove_notification_listener(&handle.emitter, &handle.listener)
            .await
        {
            Ok(()) => {}
            // Already gone on the source side
            Err(ManagementError::ListenerNotFound(_)) | Err(ManagementError::InstanceNotFound(_)) => {
                debug!(domain = %self.domain, "[DomainInterceptor] Lifecycle bridge already removed");
            }
            Err(e) => {
                *bridge = Some(handle);
                return Err(normalize_delegate_error(e));
            }
        }

        info!(domain = %self.domain, "[DomainInterceptor] Lifecycle bridge removed");
        Ok(true)
    }

    pub async fn has_lifecycle_bridge(&self) -> bool {
        self.bridge.lock().await.is_some()
    }
}
