//! RoutingConnection over recording mocks

use std::sync::Arc;

use nsmux_core::{
    Attribute, ListenerRef, MBeanServerConnection, ManagementError, NameRouter, ObjectName,
};
use nsmux_gateway::{Action, RoutingConnection};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::fixtures::{cache_resource, name, register_static_handler, sorted_names};
use tests::{MockConnection, RecordingListener, RecordingPolicy};

/// A mock holding `names` behind a routing connection into `ns1`
async fn ns1_routing(names: &[&str]) -> (Arc<MockConnection>, RoutingConnection) {
    let mock = Arc::new(MockConnection::new());
    for text in names {
        mock.inner()
            .register_mbean(Arc::new(cache_resource()), Some(&name(text)))
            .await
            .unwrap();
    }
    let routing = RoutingConnection::new(mock.clone(), NameRouter::new("", "ns1").unwrap());
    (mock, routing)
}

#[tokio::test]
async fn names_reach_the_delegate_in_source_view() {
    let (mock, routing) = ns1_routing(&["ns1//D:k=v"]).await;

    assert_eq!(routing.get_attribute(&name("D:k=v"), "x").await.unwrap(), json!(1));
    routing
        .set_attribute(&name("D:k=v"), Attribute::new("Size", 42))
        .await
        .unwrap();
    assert_eq!(
        routing
            .invoke(&name("D:k=v"), "clear", &[], &[])
            .await
            .unwrap(),
        json!("cleared")
    );

    assert_eq!(mock.names_seen("get_attribute"), vec!["ns1//D:k=v"]);
    assert_eq!(mock.names_seen("set_attribute"), vec!["ns1//D:k=v"]);
    assert_eq!(mock.names_seen("invoke"), vec!["ns1//D:k=v"]);
    assert_eq!(
        mock.inner()
            .get_attribute(&name("ns1//D:k=v"), "Size")
            .await
            .unwrap(),
        json!(42)
    );
}

#[tokio::test]
async fn returned_instances_are_in_target_view() {
    let (_mock, routing) = ns1_routing(&["ns1//D:k=v"]).await;

    let instance = routing.get_object_instance(&name("D:k=v")).await.unwrap();
    assert_eq!(instance.name.to_string(), "D:k=v");

    let created = routing
        .register_mbean(Arc::new(cache_resource()), Some(&name("D:k=new")))
        .await
        .unwrap();
    assert_eq!(created.name.to_string(), "D:k=new");
}

#[tokio::test]
async fn unrestricted_query_is_scoped_to_the_namespace() {
    let (mock, routing) = ns1_routing(&["ns1//D:k=1", "ns1//E:k=2", "ns2//D:k=3"]).await;

    let names = routing.query_names(None).await.unwrap();
    assert_eq!(sorted_names(&names), vec!["D:k=1", "E:k=2"]);
    assert_eq!(mock.names_seen("query_names"), vec!["ns1//*:*"]);

    let instances = routing.query_mbeans(Some(&name("D:*"))).await.unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].name.to_string(), "D:k=1");
    assert_eq!(mock.names_seen("query_mbeans"), vec!["ns1//D:*"]);
}

#[tokio::test]
async fn untranslatable_query_results_are_dropped() {
    tests::init_test_logging();
    let (mock, routing) = ns1_routing(&["ns1//D:k=1", "ns1//D:k=2"]).await;
    mock.add_query_result(name("elsewhere//D:k=3"));

    let names = routing.query_names(None).await.unwrap();
    assert_eq!(sorted_names(&names), vec!["D:k=1", "D:k=2"]);

    let instances = routing.query_mbeans(None).await.unwrap();
    assert_eq!(instances.len(), 2);
}

#[tokio::test]
async fn policy_hidden_results_are_dropped() {
    let mock = Arc::new(MockConnection::new());
    for text in ["ns1//D:k=a", "ns1//D:k=b", "ns1//D:k=c"] {
        mock.inner()
            .register_mbean(Arc::new(cache_resource()), Some(&name(text)))
            .await
            .unwrap();
    }
    let policy = Arc::new(RecordingPolicy::new());
    policy.deny_name("D:k=c");
    let routing = RoutingConnection::with_policy(
        mock.clone(),
        NameRouter::new("", "ns1").unwrap(),
        policy.clone(),
    );

    let names = routing.query_names(None).await.unwrap();
    assert_eq!(sorted_names(&names), vec!["D:k=a", "D:k=b"]);
}

#[tokio::test]
async fn delegate_errors_are_normalized() {
    let (mock, routing) = ns1_routing(&["ns1//D:k=v"]).await;
    mock.fail("get_attribute", ManagementError::Runtime("boom".into()));
    mock.fail("invoke", ManagementError::Io("link down".into()));
    mock.fail("unregister_mbean", ManagementError::Security("no".into()));
    mock.fail(
        "is_registered",
        ManagementError::ManagementRuntime("reserved".into()),
    );
    mock.fail(
        "get_object_instance",
        ManagementError::invalid_name("ns1//D:k=v", "bad"),
    );

    assert_eq!(
        routing.get_attribute(&name("D:k=v"), "x").await.unwrap_err(),
        ManagementError::Operations("boom".into())
    );
    assert_eq!(
        routing
            .invoke(&name("D:k=v"), "clear", &[], &[])
            .await
            .unwrap_err(),
        ManagementError::RuntimeIo("link down".into())
    );
    assert_eq!(
        routing.unregister_mbean(&name("D:k=v")).await.unwrap_err(),
        ManagementError::Security("no".into())
    );
    assert_eq!(
        routing.is_registered(&name("D:k=v")).await.unwrap_err(),
        ManagementError::ManagementRuntime("reserved".into())
    );
    assert!(matches!(
        routing.get_object_instance(&name("D:k=v")).await.unwrap_err(),
        ManagementError::InvalidName { .. }
    ));
}

#[tokio::test]
async fn denied_hook_never_reaches_the_delegate() {
    let mock = Arc::new(MockConnection::new());
    let policy = Arc::new(RecordingPolicy::new());
    policy.deny_action(Action::GetAttribute);
    policy.deny_action(Action::UnregisterMBean);
    policy.deny_action(Action::QueryNames);
    let routing = RoutingConnection::with_policy(
        mock.clone(),
        NameRouter::new("", "ns1").unwrap(),
        policy.clone(),
    );

    assert!(routing
        .get_attribute(&name("D:k=v"), "x")
        .await
        .unwrap_err()
        .is_security());
    assert!(routing
        .unregister_mbean(&name("D:k=v"))
        .await
        .unwrap_err()
        .is_security());
    assert!(routing.query_names(None).await.unwrap_err().is_security());

    assert!(mock.calls().is_empty());
    let checks = policy.checks();
    assert_eq!(checks[0].action, Action::GetAttribute);
    assert_eq!(checks[0].name.as_deref(), Some("D:k=v"));
    assert_eq!(checks[0].member.as_deref(), Some("x"));
    assert_eq!(checks[1].action, Action::UnregisterMBean);
    assert_eq!(checks[2].action, Action::QueryNames);
    assert_eq!(checks[2].name, None);
}

#[tokio::test]
async fn hooks_see_caller_view_names() {
    let (mock, _) = ns1_routing(&["ns1//D:k=v"]).await;
    let policy = Arc::new(RecordingPolicy::new());
    let routing = RoutingConnection::with_policy(
        mock.clone(),
        NameRouter::new("", "ns1").unwrap(),
        policy.clone(),
    );

    routing.get_mbean_info(&name("D:k=v")).await.unwrap();
    assert!(routing
        .is_instance_of(&name("D:k=v"), "app.Cache")
        .await
        .unwrap());

    let checks = policy.checks();
    assert_eq!(checks.len(), 2);
    assert_eq!(checks[0].action, Action::GetMBeanInfo);
    assert_eq!(checks[1].action, Action::IsInstanceOf);
    assert!(checks.iter().all(|c| c.name.as_deref() == Some("D:k=v")));
    assert_eq!(mock.names_seen("is_instance_of"), vec!["ns1//D:k=v"]);
}

#[tokio::test]
async fn names_outside_the_target_namespace_are_invalid() {
    let mock = Arc::new(MockConnection::new());
    let routing = RoutingConnection::new(mock.clone(), NameRouter::new("outer", "").unwrap());

    let err = routing
        .get_attribute(&name("other//D:k=v"), "x")
        .await
        .unwrap_err();
    assert!(matches!(err, ManagementError::InvalidName { .. }));
    assert_eq!(mock.call_count("get_attribute"), 0);
}

#[tokio::test]
async fn scoped_verbs_read_the_namespace_handler() {
    let (mock, routing) = ns1_routing(&["ns1//D:k=v"]).await;
    register_static_handler(mock.inner(), "ns1", &["D", "E"], "D", 7).await;

    assert_eq!(routing.get_domains().await.unwrap(), vec!["D", "E"]);
    assert_eq!(routing.get_mbean_count().await.unwrap(), 7);
    assert_eq!(routing.get_default_domain().await.unwrap(), "D");
    assert_eq!(routing.get_default_domain().await.unwrap(), "D");

    // The default domain is read once and cached
    let handler_reads = mock.names_seen("get_attribute");
    assert_eq!(handler_reads.len(), 3);
    assert!(handler_reads.iter().all(|n| n == "ns1//:type=JMXNamespace"));
}

#[tokio::test]
async fn unscoped_verbs_go_to_the_delegate() {
    let mock = Arc::new(MockConnection::new());
    let routing = RoutingConnection::new(mock.clone(), NameRouter::root());

    assert_eq!(routing.get_default_domain().await.unwrap(), "mock");
    assert_eq!(routing.get_mbean_count().await.unwrap(), 1);
    assert_eq!(routing.get_domains().await.unwrap(), vec!["JMImplementation"]);
    assert_eq!(mock.call_count("get_default_domain"), 1);
    assert_eq!(mock.call_count("get_mbean_count"), 1);
}

#[tokio::test]
async fn legacy_verbs_are_unsupported() {
    let mock = Arc::new(MockConnection::new());
    let routing = RoutingConnection::new(mock.clone(), NameRouter::root());

    assert_eq!(
        routing.instantiate("app.Cache", &[]).await.err(),
        Some(ManagementError::Unsupported("instantiate"))
    );
    assert_eq!(
        routing.deserialize("app.Cache", b"{}").await.unwrap_err(),
        ManagementError::Unsupported("deserialize")
    );
    assert_eq!(
        routing.class_loader_repository().await.unwrap_err(),
        ManagementError::Unsupported("class_loader_repository")
    );
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn named_listeners_are_translated() {
    let (mock, routing) = ns1_routing(&["ns1//D:k=emitter", "ns1//D:k=listener"]).await;

    routing
        .add_notification_listener(
            &name("D:k=emitter"),
            ListenerRef::Name(name("D:k=listener")),
            None,
            None,
        )
        .await
        .unwrap();
    routing
        .remove_notification_listener(&name("D:k=emitter"), &ListenerRef::Name(name("D:k=listener")))
        .await
        .unwrap();

    assert_eq!(
        mock.names_seen("add_notification_listener"),
        vec!["ns1//D:k=emitter"]
    );
    let err = routing
        .remove_notification_listener(&name("D:k=emitter"), &ListenerRef::Name(name("D:k=listener")))
        .await
        .unwrap_err();
    assert!(matches!(err, ManagementError::ListenerNotFound(_)));
}

#[tokio::test]
async fn object_listeners_receive_untranslated_notifications() {
    let (mock, routing) = ns1_routing(&[]).await;
    let listener = Arc::new(RecordingListener::default());
    let delegate: ObjectName = mock.inner().delegate_name().clone();

    let router = NameRouter::root();
    let root = RoutingConnection::new(mock.clone(), router);
    root.add_notification_listener(&delegate, ListenerRef::Object(listener.clone()), None, None)
        .await
        .unwrap();

    routing
        .register_mbean(Arc::new(cache_resource()), Some(&name("D:k=v")))
        .await
        .unwrap();

    let received = listener.received();
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0].subject.as_ref().map(|s| s.to_string()).as_deref(),
        Some("ns1//D:k=v")
    );
}
