//! nsmux Gateway
//!
//! Namespace routing layer over management connections:
//! - Object-name routing across namespace boundaries (`RoutingConnection`)
//! - Permission checks and result filtering via injected policies
//! - Namespace and domain interceptors mounted in a `Dispatcher`
//! - Connector wrapping with identity-preserving connection caching

pub mod config;
pub mod connector;
pub mod dispatch;
pub mod interceptor;
pub mod logging;
pub mod permissions;
pub mod routing;

pub use config::{GatewayConfig, SecurityConfig};
pub use connector::{
    narrow_connector, CachingConnector, ConnectionWrapper, Connector, LocalConnector,
    NarrowingWrapper, Subject,
};
pub use dispatch::{Dispatcher, DomainHandler, NamespaceHandler};
pub use interceptor::{DomainInterceptor, NamespaceInterceptor};
pub use permissions::{
    Action, Authorizer, DomainPolicy, GrantRule, NamespacePolicy, Permission, PermissionKind,
    PermissionPolicy, PermitAll, PolicyContext, RuleAuthorizer, UNKNOWN_CLASS,
};
pub use routing::{cd, narrow_to_namespace, normalize_delegate_error, RoutingConnection};
