//! Permission checks on resource creation

use std::sync::Arc;

use nsmux_core::{LocalServer, MBeanServerConnection, ManagedResource, NameRouter};
use nsmux_gateway::{Action, GrantRule, NamespaceInterceptor, RoutingConnection};
use pretty_assertions::assert_eq;
use tests::fixtures::{authorizer, cache_resource, name};
use tests::RecordingPolicy;

fn server_with_factory() -> Arc<LocalServer> {
    let server = Arc::new(LocalServer::new("test"));
    server.register_factory("app.Cache", |_| {
        Ok(Arc::new(cache_resource()) as Arc<dyn ManagedResource>)
    });
    server
}

#[tokio::test]
async fn create_checks_instantiate_then_register() {
    let server = server_with_factory();
    let policy = Arc::new(RecordingPolicy::new());
    let routing = RoutingConnection::with_policy(server.clone(), NameRouter::root(), policy.clone());

    let instance = routing
        .create_mbean("app.Cache", Some(&name("D:k=new")), None, &[])
        .await
        .unwrap();
    assert_eq!(instance.class_name, "app.Cache");

    let actions: Vec<Action> = policy.checks().iter().map(|c| c.action).collect();
    assert_eq!(actions, vec![Action::Instantiate, Action::RegisterMBean]);
}

#[tokio::test]
async fn denied_instantiate_stops_before_registration() {
    let server = server_with_factory();
    let policy = Arc::new(RecordingPolicy::new());
    policy.deny_action(Action::Instantiate);
    let routing = RoutingConnection::with_policy(server.clone(), NameRouter::root(), policy.clone());

    let err = routing
        .create_mbean("app.Cache", Some(&name("D:k=new")), None, &[])
        .await
        .unwrap_err();
    assert!(err.is_security());
    assert_eq!(policy.checks().len(), 1);
    assert!(!server.is_registered(&name("D:k=new")).await.unwrap());
}

#[tokio::test]
async fn register_only_grant_cannot_create() {
    let server = server_with_factory();
    let interceptor = NamespaceInterceptor::new(
        "srv",
        "ns",
        server.clone(),
        "",
        Some(authorizer(vec![GrantRule::new("register")
            .including("[ns//D:*]")
            .allowing("registerMBean")])),
    )
    .unwrap();
    let connection = interceptor.connection();

    let err = connection
        .create_mbean("app.Cache", Some(&name("ns//D:k=created")), None, &[])
        .await
        .unwrap_err();
    assert!(err.is_security());

    let instance = connection
        .register_mbean(Arc::new(cache_resource()), Some(&name("ns//D:k=registered")))
        .await
        .unwrap();
    assert_eq!(instance.name.to_string(), "ns//D:k=registered");
    assert!(server.is_registered(&name("D:k=registered")).await.unwrap());
}
