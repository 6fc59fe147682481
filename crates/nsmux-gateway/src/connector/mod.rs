//! Connectors hand out connections to a (possibly remote) server
//!
//! - [`Connector`] - the connector contract
//! - [`LocalConnector`] - a connector over an in-process connection
//! - [`CachingConnector`] - wraps every connection another connector hands
//!   out, returning the same wrapper for the same connection

mod caching;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use nsmux_core::{MBeanServerConnection, ManagementError, ManagementResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use caching::{narrow_connector, CachingConnector, ConnectionWrapper, NarrowingWrapper};

/// Identity a connection is requested for
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub principals: Vec<String>,
}

impl Subject {
    pub fn new(principals: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            principals: principals.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// The connection of this connector. Connectors typically return the same
    /// connection on every call.
    async fn connection(&self) -> ManagementResult<Arc<dyn MBeanServerConnection>>;

    /// A connection acting on behalf of `subject`
    async fn connection_for(
        &self,
        subject: &Subject,
    ) -> ManagementResult<Arc<dyn MBeanServerConnection>>;

    fn connection_id(&self) -> String;

    async fn close(&self) -> ManagementResult<()>;
}

/// Connector over a connection living in this process
pub struct LocalConnector {
    id: String,
    connection: Arc<dyn MBeanServerConnection>,
    closed: AtomicBool,
}

impl LocalConnector {
    pub fn new(id: impl Into<String>, connection: Arc<dyn MBeanServerConnection>) -> Self {
        Self {
            id: id.into(),
            connection,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> ManagementResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ManagementError::Io(format!("connector {} is closed", self.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for LocalConnector {
    async fn connection(&self) -> ManagementResult<Arc<dyn MBeanServerConnection>> {
        self.ensure_open()?;
        Ok(self.connection.clone())
    }

    async fn connection_for(
        &self,
        subject: &Subject,
    ) -> ManagementResult<Arc<dyn MBeanServerConnection>> {
        self.ensure_open()?;
        debug!(
            connector = %self.id,
            principals = ?subject.principals,
            "[Connector] Local connections do not delegate, sharing the connection"
        );
        Ok(self.connection.clone())
    }

    fn connection_id(&self) -> String {
        self.id.clone()
    }

    async fn close(&self) -> ManagementResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
