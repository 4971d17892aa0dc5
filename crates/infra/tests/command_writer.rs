//! Command writer against a mocked controller

mod support;

use std::sync::Arc;

use rws_bridge_core::ExponentialBackoff;
use rws_bridge_domain::{NegotiationError, OutputConfig, Record, RwsError, WriteError};
use rws_bridge_infra::{CommandWriter, RwsOutput};
use support::{config_for, credentials, mount_digest_login};
use wiremock::matchers::{body_string, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TARGET: &str = "/rw/dipc/RMQ_T_ROB1";

fn output(msg_size: usize) -> OutputConfig {
    OutputConfig {
        target: TARGET.to_string(),
        sender: "PC_SDK_Q".to_string(),
        msg_size,
        tag_prefix: String::new(),
        field_prefix: String::new(),
    }
}

async fn controller() -> MockServer {
    let server = MockServer::start().await;
    mount_digest_login(&server).await;
    Mock::given(method("GET"))
        .and(path(TARGET))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

async fn connected_writer(server: &MockServer, msg_size: usize) -> CommandWriter {
    let mut config = config_for(server);
    config.output = Some(output(msg_size));
    let mut writer = CommandWriter::new(config, credentials()).unwrap();
    writer.connect().await.unwrap();
    writer
}

async fn mount_send(server: &MockServer, status: u16, expected: u64) {
    Mock::given(method("POST"))
        .and(path(TARGET))
        .and(query_param("action", "dipc-send"))
        .respond_with(ResponseTemplate::new(status))
        .expect(expected)
        .mount(server)
        .await;
}

fn log_event(severity: &str) -> Record {
    Record::new("elog-message")
        .with_tag("msgtype", "elog-message")
        .with_tag("endpoint", "/rw/elog/0/42")
        .with_field("msgtype", severity)
}

#[tokio::test]
async fn error_severity_sends_abort() {
    let server = controller().await;
    Mock::given(method("POST"))
        .and(path(TARGET))
        .and(query_param("action", "dipc-send"))
        .and(body_string(
            "dipc-src-queue-name=PC_SDK_Q&dipc-cmd=111&dipc-userdef=1&dipc-msgtype=1&dipc-data=ePMLCommand;[C_Abort]",
        ))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let writer = connected_writer(&server, 444).await;
    writer.write(&log_event("3")).await.unwrap();
}

#[tokio::test]
async fn warning_severity_sends_hold() {
    let server = controller().await;
    Mock::given(method("POST"))
        .and(path(TARGET))
        .and(body_string_contains("dipc-data=ePMLCommand;[C_Hold]"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let writer = connected_writer(&server, 444).await;
    writer.write(&log_event("2")).await.unwrap();
}

#[tokio::test]
async fn informational_events_send_nothing() {
    let server = controller().await;
    mount_send(&server, 204, 0).await;

    let writer = connected_writer(&server, 444).await;
    writer.write_batch(&[log_event("0"), log_event("1")]).await.unwrap();
}

#[tokio::test]
async fn unknown_severity_is_reported() {
    let server = controller().await;
    mount_send(&server, 204, 0).await;

    let writer = connected_writer(&server, 444).await;
    let err = writer.write(&log_event("7")).await.unwrap_err();
    assert!(matches!(err, WriteError::UnknownSeverity(code) if code == "7"));
}

#[tokio::test]
async fn queue_messages_pass_through() {
    let server = controller().await;
    Mock::given(method("POST"))
        .and(path(TARGET))
        .and(body_string(
            "dipc-src-queue-name=PC_SDK_Q&dipc-cmd=111&dipc-userdef=-1&dipc-msgtype=1&dipc-data=ping;[TRUE]",
        ))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let record = Record::new("rws_1")
        .with_tag("msgtype", "dipc-msg-ev")
        .with_field("dipc-userdef", "-1")
        .with_field("dipc-data", "ping;[TRUE]");

    let writer = connected_writer(&server, 444).await;
    writer.write(&record).await.unwrap();
}

#[tokio::test]
async fn fruit_grid_is_formatted() {
    let server = controller().await;
    Mock::given(method("POST"))
        .and(path(TARGET))
        .and(body_string_contains(
            "dipc-data=Fruit{4};[[12.500000,0.0,0.0,0.0,0.0,0.0,0.0],[0.0,0.0,0.0,0.0,0.0,0.0,-3.250000]",
        ))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let record = Record::new("vision")
        .with_tag("msgtype", "vis-fruit")
        .with_field("0_0", 12.5)
        .with_field("1_6", -3.25)
        .with_field("9_9", 1.0);

    let writer = connected_writer(&server, 444).await;
    writer.write(&record).await.unwrap();
}

#[tokio::test]
async fn oversized_command_never_reaches_the_network() {
    let server = controller().await;
    mount_send(&server, 204, 0).await;

    let writer = connected_writer(&server, 40).await;
    let err = writer.write(&log_event("3")).await.unwrap_err();

    assert!(matches!(err, WriteError::TooLarge { limit: 40, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn fifth_consecutive_call_is_skipped() {
    let server = controller().await;
    mount_send(&server, 204, 4).await;

    let writer = connected_writer(&server, 444).await;
    for _ in 0..5 {
        writer.write(&log_event("3")).await.unwrap();
    }
}

#[tokio::test]
async fn reconnect_resets_attempt_count() {
    let server = controller().await;
    mount_send(&server, 204, 8).await;

    let mut writer = connected_writer(&server, 444).await;
    for _ in 0..4 {
        writer.write(&log_event("3")).await.unwrap();
    }
    writer.connect().await.unwrap();
    for _ in 0..4 {
        writer.write(&log_event("3")).await.unwrap();
    }
}

#[tokio::test]
async fn server_rejection_is_retryable() {
    let server = controller().await;
    mount_send(&server, 503, 1).await;

    let writer = connected_writer(&server, 444).await;
    let err = writer.write(&log_event("3")).await.unwrap_err();

    assert!(matches!(err, WriteError::Rejected(503)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn batch_stops_at_first_failure() {
    let server = controller().await;
    mount_send(&server, 204, 1).await;

    let writer = connected_writer(&server, 444).await;
    let err = writer
        .write_batch(&[log_event("3"), log_event("9"), log_event("3")])
        .await
        .unwrap_err();

    assert!(matches!(err, WriteError::UnknownSeverity(_)));
}

#[tokio::test]
async fn missing_target_queue_fails_connect() {
    let server = MockServer::start().await;
    mount_digest_login(&server).await;

    let mut config = config_for(&server);
    config.output = Some(output(444));
    let mut writer = CommandWriter::new(config, credentials()).unwrap();

    let err = writer.connect().await.unwrap_err();
    assert!(matches!(err, RwsError::Negotiation(NegotiationError::UnknownResource(t)) if t == TARGET));
    assert!(!writer.is_connected());
}

#[tokio::test]
async fn output_plugin_uses_configured_credentials_and_policy() {
    let server = controller().await;
    mount_send(&server, 204, 2).await;

    let mut config = config_for(&server);
    config.output = Some(output(444));
    let policy = ExponentialBackoff::new(
        std::time::Duration::from_secs(60),
        std::time::Duration::from_secs(300),
    );
    let mut plugin = RwsOutput::from_config(config).unwrap().with_policy(Arc::new(policy));

    plugin.connect().await.unwrap();
    plugin.write(&[log_event("3"), log_event("2")]).await.unwrap();
    plugin.write(&[]).await.unwrap();
    plugin.close();
    assert!(!plugin.writer().is_connected());
}
