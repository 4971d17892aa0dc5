//! Digest login against a mocked controller

mod support;

use std::time::Duration;

use reqwest::Method;
use rws_bridge_core::StaticCredentials;
use rws_bridge_domain::{AuthError, TransportError};
use rws_bridge_infra::{SessionClient, SessionOptions};
use support::{config_for, credentials, mount_digest_login, SESSION_COOKIE};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn digest_login_stores_session_cookie() {
    let server = MockServer::start().await;
    mount_digest_login(&server).await;

    let session = SessionClient::login(&config_for(&server), credentials().as_ref()).await.unwrap();

    let cookie = session.cookie_header().unwrap();
    assert!(cookie.contains(SESSION_COOKIE), "cookie header was {cookie}");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let authorization = requests[1].headers.get("authorization").unwrap().to_str().unwrap();
    assert!(authorization.starts_with("Digest "));
    assert!(authorization.contains(r#"username="Default User""#));
    assert!(authorization.contains(r#"uri="/rw""#));
}

#[tokio::test]
async fn session_cookie_is_sent_on_later_requests() {
    let server = MockServer::start().await;
    mount_digest_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/rw/elog/0"))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let session = SessionClient::login(&config_for(&server), credentials().as_ref()).await.unwrap();
    let response = session.request(Method::GET, "/rw/elog/0", None).await.unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn open_controller_needs_no_challenge() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rw"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    SessionClient::login(&config_for(&server), credentials().as_ref()).await.unwrap();
}

#[tokio::test]
async fn wrong_credentials_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rw"))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("www-authenticate", r#"Digest realm="robapi", nonce="n1", qop="auth""#),
        )
        .mount(&server)
        .await;

    let err = SessionClient::login(&config_for(&server), credentials().as_ref()).await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected(401)));
}

#[tokio::test]
async fn basic_only_challenge_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rw"))
        .respond_with(
            ResponseTemplate::new(401).insert_header("www-authenticate", r#"Basic realm="robapi""#),
        )
        .mount(&server)
        .await;
    Mock::given(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = SessionClient::login(&config_for(&server), credentials().as_ref()).await.unwrap_err();
    assert!(matches!(err, AuthError::Challenge(_)));
}

#[tokio::test]
async fn unexpected_first_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rw"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = SessionClient::login(&config_for(&server), credentials().as_ref()).await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected(503)));
}

#[tokio::test]
async fn empty_username_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let provider = StaticCredentials::new("".into(), "secret".into());
    let err = SessionClient::login(&config_for(&server), &provider).await.unwrap_err();
    assert!(matches!(err, AuthError::Credentials(_)));
}

#[tokio::test]
async fn slow_controller_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rw"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let options =
        SessionOptions { request_timeout: Some(Duration::from_millis(200)), ..Default::default() };
    let session = SessionClient::new(&server.uri(), options).unwrap();

    let err = session.authenticate(credentials().as_ref()).await.unwrap_err();
    assert!(matches!(err, AuthError::Transport(TransportError::Timeout(_))));
}
