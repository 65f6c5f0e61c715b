use rusty_authz::auth::oauth2::AuthorizationServer;
use rusty_authz::AuthzError;

fn server() -> AuthorizationServer {
    let server = AuthorizationServer::default();
    server
        .register_client("c1", "s1", "https://cb", &["read"])
        .unwrap();
    server
}

#[test]
fn test_authorization_code_flow() {
    let server = server();

    let code = server
        .issue_authorization_code("c1", 42, "https://cb", &["read".to_string()])
        .unwrap();
    let info = server.exchange_code(&code, "c1", "s1").unwrap();
    assert_eq!(info.subject_id, 42);
    assert_eq!(info.client_id, "c1");
    assert!(info.has_scope("read"));
    assert_ne!(info.access_token, info.refresh_token);

    let validated = server.validate_token(&info.access_token).unwrap();
    assert_eq!(validated.subject_id, 42);

    server.revoke_token(&info.access_token).unwrap();
    assert_eq!(
        server.validate_token(&info.access_token),
        Err(AuthzError::InvalidToken)
    );
}

#[test]
fn test_code_is_single_use() {
    let server = server();
    let code = server
        .issue_authorization_code("c1", 1, "https://cb", &[])
        .unwrap();

    assert!(server.exchange_code(&code, "c1", "s1").is_ok());
    assert_eq!(
        server.exchange_code(&code, "c1", "s1"),
        Err(AuthzError::InvalidCode)
    );
}

#[test]
fn test_codes_are_unique_per_issue() {
    let server = server();
    let a = server.issue_authorization_code("c1", 1, "https://cb", &[]).unwrap();
    let b = server.issue_authorization_code("c1", 1, "https://cb", &[]).unwrap();
    assert_ne!(a, b);
    assert_eq!(server.pending_code_count().unwrap(), 2);
}

#[test]
fn test_unregistered_client_cannot_exchange() {
    let server = server();
    let code = server.issue_authorization_code("c1", 1, "https://cb", &[]).unwrap();
    assert_eq!(
        server.exchange_code(&code, "ghost", "s1"),
        Err(AuthzError::InvalidClientCredentials)
    );
}

#[test]
fn test_refresh_keeps_refresh_token() {
    let server = server();
    let code = server.issue_authorization_code("c1", 9, "https://cb", &[]).unwrap();
    let info = server.exchange_code(&code, "c1", "s1").unwrap();

    let refreshed = server.refresh_access_token(&info.refresh_token).unwrap();
    assert_eq!(refreshed.refresh_token, info.refresh_token);
    assert_eq!(refreshed.subject_id, 9);
    assert!(server.validate_token(&refreshed.access_token).is_ok());
    assert!(server.validate_token(&info.access_token).is_err());

    assert_eq!(
        server.refresh_access_token("bogus"),
        Err(AuthzError::InvalidRefreshToken)
    );
}

#[test]
fn test_concurrent_exchange_succeeds_once() {
    use std::sync::Arc;
    use std::thread;

    let server = Arc::new(server());
    let code = server.issue_authorization_code("c1", 1, "https://cb", &[]).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let server = Arc::clone(&server);
            let code = code.clone();
            thread::spawn(move || server.exchange_code(&code, "c1", "s1").is_ok())
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);
}
