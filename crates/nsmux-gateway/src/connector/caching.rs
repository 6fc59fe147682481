//! Caching connector wrapper
//!
//! Wrapping a connection must preserve identity: asking twice for the same
//! underlying connection yields the same wrapper. Cache entries hold weak
//! references only, so a wrapper lives exactly as long as its callers keep
//! it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use nsmux_core::{normalize_namespace_path, MBeanServerConnection, ManagementResult};
use parking_lot::Mutex;
use tracing::debug;

use super::{Connector, Subject};
use crate::routing::cd;

/// Turns a raw connection into the connection handed to callers
pub trait ConnectionWrapper: Send + Sync {
    fn wrap(
        &self,
        connection: Arc<dyn MBeanServerConnection>,
    ) -> ManagementResult<Arc<dyn MBeanServerConnection>>;

    /// Wrap a connection obtained for `subject`
    fn wrap_with_subject(
        &self,
        connection: Arc<dyn MBeanServerConnection>,
        _subject: &Subject,
    ) -> ManagementResult<Arc<dyn MBeanServerConnection>> {
        self.wrap(connection)
    }
}

struct CacheEntry {
    raw: Weak<dyn MBeanServerConnection>,
    wrapper: Weak<dyn MBeanServerConnection>,
}

impl CacheEntry {
    /// The wrapper, if both it and `raw` are still the live pair
    fn live_wrapper(
        &self,
        raw: &Arc<dyn MBeanServerConnection>,
    ) -> Option<Arc<dyn MBeanServerConnection>> {
        let cached_raw = self.raw.upgrade()?;
        if connection_key(&cached_raw) != connection_key(raw) {
            return None;
        }
        self.wrapper.upgrade()
    }

    fn is_dead(&self) -> bool {
        self.raw.strong_count() == 0 || self.wrapper.strong_count() == 0
    }
}

fn connection_key(connection: &Arc<dyn MBeanServerConnection>) -> usize {
    Arc::as_ptr(connection) as *const () as usize
}

/// A connector whose connections are wrapped on first use and cached by
/// identity of the underlying connection
pub struct CachingConnector<W: ConnectionWrapper> {
    inner: Arc<dyn Connector>,
    wrapper: W,
    cache: Mutex<HashMap<usize, CacheEntry>>,
}

impl<W: ConnectionWrapper> CachingConnector<W> {
    pub fn new(inner: Arc<dyn Connector>, wrapper: W) -> Self {
        Self {
            inner,
            wrapper,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &Arc<dyn Connector> {
        &self.inner
    }

    pub fn wrapper(&self) -> &W {
        &self.wrapper
    }

    /// Number of live cache entries
    pub fn cached_connections(&self) -> usize {
        let mut cache = self.cache.lock();
        cache.retain(|_, entry| !entry.is_dead());
        cache.len()
    }

    fn lookup(&self, raw: &Arc<dyn MBeanServerConnection>) -> Option<Arc<dyn MBeanServerConnection>> {
        self.cache
            .lock()
            .get(&connection_key(raw))
            .and_then(|entry| entry.live_wrapper(raw))
    }

    fn cached_or_wrap<F>(
        &self,
        raw: Arc<dyn MBeanServerConnection>,
        wrap: F,
    ) -> ManagementResult<Arc<dyn MBeanServerConnection>>
    where
        F: FnOnce(Arc<dyn MBeanServerConnection>) -> ManagementResult<Arc<dyn MBeanServerConnection>>,
    {
        if let Some(wrapper) = self.lookup(&raw) {
            return Ok(wrapper);
        }

        // Wrap outside the lock; a concurrent miss may publish first
        let wrapped = wrap(raw.clone())?;

        let key = connection_key(&raw);
        let mut cache = self.cache.lock();
        cache.retain(|_, entry| !entry.is_dead());
        if let Some(existing) = cache.get(&key).and_then(|entry| entry.live_wrapper(&raw)) {
            debug!(connector = %self.inner.connection_id(), "[CachingConnector] Lost wrap race, reusing published wrapper");
            return Ok(existing);
        }

        cache.insert(
            key,
            CacheEntry {
                raw: Arc::downgrade(&raw),
                wrapper: Arc::downgrade(&wrapped),
            },
        );
        debug!(connector = %self.inner.connection_id(), "[CachingConnector] Wrapped new connection");
        Ok(wrapped)
    }
}

#[async_trait]
impl<W: ConnectionWrapper> Connector for CachingConnector<W> {
    async fn connection(&self) -> ManagementResult<Arc<dyn MBeanServerConnection>> {
        let raw = self.inner.connection().await?;
        self.cached_or_wrap(raw, |raw| self.wrapper.wrap(raw))
    }

    async fn connection_for(
        &self,
        subject: &Subject,
    ) -> ManagementResult<Arc<dyn MBeanServerConnection>> {
        let raw = self.inner.connection_for(subject).await?;
        self.cached_or_wrap(raw, |raw| self.wrapper.wrap_with_subject(raw, subject))
    }

    fn connection_id(&self) -> String {
        self.inner.connection_id()
    }

    async fn close(&self) -> ManagementResult<()> {
        self.cache.lock().clear();
        self.inner.close().await
    }
}

/// Narrows every connection into one namespace
#[derive(Debug, Clone)]
pub struct NarrowingWrapper {
    namespace: String,
}

impl NarrowingWrapper {
    pub fn new(namespace: &str) -> ManagementResult<Self> {
        Ok(Self {
            namespace: normalize_namespace_path(namespace, true, true, false)?,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl ConnectionWrapper for NarrowingWrapper {
    fn wrap(
        &self,
        connection: Arc<dyn MBeanServerConnection>,
    ) -> ManagementResult<Arc<dyn MBeanServerConnection>> {
        cd(connection, &self.namespace)
    }
}

/// A connector whose connections all see `connector`'s server from inside
/// `namespace`
pub fn narrow_connector(
    connector: Arc<dyn Connector>,
    namespace: &str,
) -> ManagementResult<CachingConnector<NarrowingWrapper>> {
    Ok(CachingConnector::new(
        connector,
        NarrowingWrapper::new(namespace)?,
    ))
}
