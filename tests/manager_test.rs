use std::sync::Arc;

use rusty_authz::auth::user::{UserInfo, UserLoader};
use rusty_authz::authz::abac::{Condition, Effect, Operator, Policy};
use rusty_authz::authz::rbac::Permission;
use rusty_authz::config::{AuthConfig, JwtConfig, OAuth2Config, PermissionMode};
use rusty_authz::{AttrValue, Attributes, AuthManager, AuthzError};

const SECRET: &str = "manager-integration-key-8d31f0";

fn jwt_manager(mode: PermissionMode) -> AuthManager {
    AuthManager::new(AuthConfig::jwt(JwtConfig::new(SECRET), mode), None).unwrap()
}

fn loader() -> UserLoader {
    Arc::new(|id: u64| {
        if id == 404 {
            return Err(AuthzError::UserNotFound(id));
        }
        let mut user = UserInfo::new(id, format!("user-{}", id));
        user.roles = vec!["member".to_string()];
        user.attrs.insert("dept".to_string(), AttrValue::from("eng"));
        Ok(user)
    })
}

#[test]
fn test_jwt_issue_validate_refresh() {
    let manager = jwt_manager(PermissionMode::Rbac);

    let roles = vec!["admin".to_string()];
    let (access, refresh) = manager.issue_token(11, "eve", &roles, &Attributes::new()).unwrap();

    let principal = manager.validate_token(&access).unwrap();
    assert_eq!(principal.user_id, 11);
    assert_eq!(principal.display_name, "eve");
    assert_eq!(principal.roles, roles);

    let renewed = manager.refresh_token(&refresh).unwrap();
    let principal = manager.validate_token(&renewed).unwrap();
    assert_eq!(principal.user_id, 11);
    assert_eq!(principal.display_name, "eve");
}

#[test]
fn test_oauth2_rejects_generic_issue() {
    let manager = AuthManager::new(
        AuthConfig::oauth2(OAuth2Config::default(), PermissionMode::Rbac),
        None,
    )
    .unwrap();
    assert!(matches!(
        manager.issue_token(1, "x", &[], &Attributes::new()),
        Err(AuthzError::UnsupportedFlow(_))
    ));
}

#[test]
fn test_oauth2_validation_enriched_by_loader() {
    let manager = AuthManager::new(
        AuthConfig::oauth2(OAuth2Config::default(), PermissionMode::Rbac),
        Some(loader()),
    )
    .unwrap();
    let server = manager.oauth2().unwrap();
    server.register_client("c1", "s1", "https://cb", &["read"]).unwrap();

    let code = server.issue_authorization_code("c1", 42, "https://cb", &[]).unwrap();
    let info = server.exchange_code(&code, "c1", "s1").unwrap();

    let principal = manager.validate_token(&info.access_token).unwrap();
    assert_eq!(principal.user_id, 42);
    assert_eq!(principal.display_name, "user-42");
    assert_eq!(principal.roles, vec!["member"]);

    let renewed = manager.refresh_token(&info.refresh_token).unwrap();
    assert_eq!(manager.validate_token(&renewed).unwrap().user_id, 42);
    assert_eq!(manager.validate_token(&info.access_token), Err(AuthzError::InvalidToken));
}

#[test]
fn test_oauth2_loader_failure_degrades() {
    let manager = AuthManager::new(
        AuthConfig::oauth2(OAuth2Config::default(), PermissionMode::Rbac),
        Some(loader()),
    )
    .unwrap();
    let server = manager.oauth2().unwrap();
    server.register_client("c1", "s1", "https://cb", &[]).unwrap();

    let code = server.issue_authorization_code("c1", 404, "https://cb", &[]).unwrap();
    let info = server.exchange_code(&code, "c1", "s1").unwrap();

    let principal = manager.validate_token(&info.access_token).unwrap();
    assert_eq!(principal.user_id, 404);
    assert!(principal.display_name.is_empty());
    assert!(principal.roles.is_empty());
}

#[test]
fn test_rbac_permission_checks() {
    let manager = jwt_manager(PermissionMode::Rbac);
    let rbac = manager.rbac().unwrap();
    rbac.add_role("admin", [Permission::new("user", "read")]).unwrap();
    rbac.assign_role(7, "admin").unwrap();

    let none = Attributes::new();
    assert!(manager.check_permission(7, "user", "read", &none).is_ok());
    assert!(matches!(
        manager.check_permission(7, "user", "delete", &none),
        Err(AuthzError::PermissionDenied { .. })
    ));
    assert!(manager.has_permission(7, "user", "read", &none));
    assert!(!manager.has_permission(7, "user", "delete", &none));
}

#[test]
fn test_abac_uses_loaded_attributes_and_id() {
    let manager = AuthManager::new(
        AuthConfig::jwt(JwtConfig::new(SECRET), PermissionMode::Abac),
        Some(loader()),
    )
    .unwrap();
    let abac = manager.abac().unwrap();
    abac.add_policy(
        Policy::new("eng-docs", "engineers read docs", Effect::Allow)
            .with_subject("dept", "eng")
            .with_resource("type", "doc")
            .with_action("read"),
    )
    .unwrap();
    abac.add_policy(
        Policy::new("owner-edit", "owners edit", Effect::Allow)
            .with_action("edit")
            .with_condition(Condition::new("subject.id", Operator::Eq, 404)),
    )
    .unwrap();

    let doc: Attributes = [("type".to_string(), AttrValue::from("doc"))].into_iter().collect();

    assert!(manager.check_permission(1, "doc", "read", &doc).is_ok());

    // Loader failure leaves only the injected id
    assert_eq!(
        manager.check_permission(404, "doc", "read", &doc),
        Err(AuthzError::AccessDenied(None))
    );
    assert!(manager.has_permission(404, "doc", "edit", &doc));
    assert!(!manager.has_permission(1, "doc", "edit", &doc));
}

#[test]
fn test_abac_without_loader_defaults_to_id_only() {
    let manager = jwt_manager(PermissionMode::Abac);
    manager
        .abac()
        .unwrap()
        .add_policy(
            Policy::new("any-id", "anyone identified", Effect::Allow)
                .with_subject("id", "*")
                .with_action("ping"),
        )
        .unwrap();

    assert!(manager.has_permission(5, "svc", "ping", &Attributes::new()));
    assert!(!manager.has_permission(5, "svc", "pong", &Attributes::new()));
}

#[test]
fn test_abac_subject_id_matches_plain_integer_literals() {
    let manager = jwt_manager(PermissionMode::Abac);
    let abac = manager.abac().unwrap();
    abac.add_policy(
        Policy::new("own", "user 7 reads own profile", Effect::Allow)
            .with_subject("id", 7)
            .with_action("read"),
    )
    .unwrap();
    abac.add_policy(
        Policy::new("staff", "ids from 1000 administer", Effect::Allow)
            .with_action("admin")
            .with_condition(Condition::new("subject.id", Operator::Ge, 1000)),
    )
    .unwrap();
    abac.add_policy(
        Policy::new("early", "ids below 10 get beta", Effect::Allow)
            .with_action("beta")
            .with_condition(Condition::new("subject.id", Operator::Lt, 10)),
    )
    .unwrap();

    let none = Attributes::new();
    assert!(manager.has_permission(7, "profile", "read", &none));
    assert!(!manager.has_permission(8, "profile", "read", &none));

    assert!(!manager.has_permission(5, "console", "admin", &none));
    assert!(manager.has_permission(1000, "console", "admin", &none));

    assert!(manager.has_permission(5, "app", "beta", &none));
    assert!(!manager.has_permission(1000, "app", "beta", &none));
}
