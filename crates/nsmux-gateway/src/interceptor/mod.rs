//! Interceptors mounted by the dispatcher
//!
//! Each interceptor is a [`RoutingConnection`](crate::routing::RoutingConnection)
//! composed with the permission policy of what it guards.

mod domain;
mod namespace;

pub use domain::{DomainInterceptor, ListenerHandle};
pub use namespace::NamespaceInterceptor;
