//! Grant rules loaded from gateway configuration

use nsmux_core::ObjectName;
use nsmux_gateway::{Action, GatewayConfig, Permission, PermissionKind};
use tests::fixtures::name;

fn resource(action: Action, class_name: &str, member: Option<&str>, target: &ObjectName) -> Permission {
    Permission::new(PermissionKind::Resource, "edge-1", action)
        .with_class(Some(class_name))
        .with_member(member)
        .with_name(Some(target))
}

const CONFIG: &str = r#"{
    "serverName": "edge-1",
    "security": {
        "enabled": true,
        "rules": [
            {
                "id": "ops",
                "kind": "resource",
                "include": ["app.*#*[metrics:*]"],
                "exclude": ["*#Password[*]"],
                "actions": ["get*", "query*"]
            },
            {
                "id": "admin",
                "include": ["[admin//*]"],
                "actions": ["*"]
            }
        ]
    }
}"#;

#[test]
fn configured_rules_grant_and_deny() {
    let config = GatewayConfig::from_json_str(CONFIG).unwrap();
    let authorizer = config.security.authorizer().unwrap();
    let cache = name("metrics:type=Cache");

    assert!(authorizer
        .check_permission(&resource(Action::GetAttribute, "app.Cache", Some("Size"), &cache))
        .is_ok());
    assert!(authorizer
        .check_permission(&resource(Action::SetAttribute, "app.Cache", Some("Size"), &cache))
        .is_err());
    assert!(authorizer
        .check_permission(&resource(
            Action::GetAttribute,
            "app.Cache",
            Some("Password"),
            &cache
        ))
        .is_err());
    assert!(authorizer
        .check_permission(&resource(
            Action::GetAttribute,
            "sys.Cache",
            Some("Size"),
            &cache
        ))
        .is_err());
}

#[test]
fn rule_kind_restricts_matching() {
    let config = GatewayConfig::from_json_str(CONFIG).unwrap();
    let authorizer = config.security.authorizer().unwrap();

    let namespace_read = Permission::new(PermissionKind::Namespace, "edge-1", Action::GetAttribute)
        .with_member(Some("Size"))
        .with_name(Some(&name("metrics:type=Cache")));
    assert!(authorizer.check_permission(&namespace_read).is_err());

    let admin = Permission::new(PermissionKind::Namespace, "edge-1", Action::UnregisterMBean)
        .with_name(Some(&name("admin//D:k=v")));
    assert!(authorizer.check_permission(&admin).is_ok());
}

#[test]
fn denial_names_the_permission() {
    let config = GatewayConfig::from_json_str(CONFIG).unwrap();
    let authorizer = config.security.authorizer().unwrap();

    let err = authorizer
        .check_permission(&resource(
            Action::Invoke,
            "app.Cache",
            Some("clear"),
            &name("metrics:type=Cache"),
        ))
        .unwrap_err();
    assert!(err.is_security());
    assert!(err.to_string().contains("app.Cache#clear[metrics:type=Cache] invoke"));
}

#[test]
fn disabled_security_has_no_authorizer() {
    let config = GatewayConfig::from_json_str(r#"{ "security": { "rules": [] } }"#).unwrap();
    assert!(config.security.authorizer().is_none());
}
