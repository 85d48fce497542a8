mod support;

use rideshare_client::auth_session::SESSION_KEY;
use rideshare_client::{
    ApiClient, ClientError, ConnectionSettings, FileStore, Notifications, RealtimeManager,
    SessionManager,
};
use rideshare_shared::{RegisterRequest, UpdateProfileRequest};
use serde_json::json;
use support::{booking_request, session_json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn base(server: &MockServer) -> ApiClient {
    ApiClient::new().with_base_url(format!("{}/api", server.uri()))
}

#[tokio::test]
async fn login_persists_and_restores() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("u1", "t0k")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut session = SessionManager::new(base(&server), FileStore::new(dir.path()));
    let signed_in = session.login("asha@example.com", "pw").await.unwrap();
    assert_eq!(signed_in.user.id, "u1");
    assert!(FileStore::new(dir.path()).exists(SESSION_KEY));

    let mut restored = SessionManager::new(base(&server), FileStore::new(dir.path()));
    let current = restored.restore().unwrap().cloned().unwrap();
    assert_eq!(current.token, "t0k");
    assert_eq!(restored.user_id(), Some("u1"));
}

#[tokio::test]
async fn failed_login_keeps_signed_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut session = SessionManager::new(base(&server), FileStore::new(dir.path()));
    let err = session.login("asha@example.com", "wrong").await.unwrap_err();
    assert_eq!(err.user_message(), "Invalid credentials");
    assert!(!session.is_authenticated());
    assert!(!FileStore::new(dir.path()).exists(SESSION_KEY));

    let err = session.login("", "pw").await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn logout_clears_storage_and_realtime() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("u1", "t0k")))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut session = SessionManager::new(base(&server), FileStore::new(dir.path()));
    session.login("asha@example.com", "pw").await.unwrap();

    // Nothing listens on this port; the manager just needs to be active.
    let store = Notifications::new();
    let realtime = RealtimeManager::new(ConnectionSettings::new("http://127.0.0.1:9"), store.clone());
    let _subscription = realtime.init("u1").unwrap();
    assert!(realtime.is_active());
    store.add(booking_request("n1", "b1"));

    session.logout(&realtime).unwrap();
    assert!(!realtime.is_active());
    assert!(store.is_empty());
    assert!(!session.is_authenticated());
    assert!(!FileStore::new(dir.path()).exists(SESSION_KEY));
    assert!(matches!(session.client(), Err(ClientError::NotAuthenticated)));
}

#[tokio::test]
async fn profile_update_merges_into_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("u1", "t0k")))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/user/update"))
        .and(header("x-auth-token", "t0k"))
        .and(body_json(json!({ "phone": "9811111111" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Profile updated" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut session = SessionManager::new(base(&server), FileStore::new(dir.path()));
    session.login("asha@example.com", "pw").await.unwrap();

    let update = UpdateProfileRequest {
        phone: Some("9811111111".into()),
        ..Default::default()
    };
    let user = session.update_user(&update).await.unwrap();
    assert_eq!(user.phone.as_deref(), Some("9811111111"));
    assert_eq!(user.name, "Asha");

    let mut restored = SessionManager::new(base(&server), FileStore::new(dir.path()));
    let stored = restored.restore().unwrap().cloned().unwrap();
    assert_eq!(stored.user.phone.as_deref(), Some("9811111111"));
}

#[tokio::test]
async fn register_posts_details() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "message": "User registered" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let session = SessionManager::new(base(&server), FileStore::new(dir.path()));
    let ack = session
        .register(&RegisterRequest {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            password: "pw".into(),
            phone: None,
        })
        .await
        .unwrap();
    assert_eq!(ack.message.as_deref(), Some("User registered"));
}
