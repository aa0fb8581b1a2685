use std::time::Duration;

use serde_json::json;
use uponor_x265::{Error, JnapClient, RetryPolicy};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GET_ATTRIBUTES: &str = "http://phyn.com/jnap/uponorsky/GetAttributes";
const SET_ATTRIBUTES: &str = "http://phyn.com/jnap/uponorsky/SetAttributes";

fn client_for(server: &MockServer) -> JnapClient {
    JnapClient::builder(server.address().to_string())
        .retry_policy(RetryPolicy::none())
        .build()
        .expect("client should build")
}

fn attributes(pairs: &[(&str, serde_json::Value)]) -> serde_json::Value {
    let vars: Vec<_> = pairs
        .iter()
        .map(|(name, value)| json!({ "waspVarName": name, "waspVarValue": value }))
        .collect();
    json!({ "result": "OK", "output": { "vars": vars } })
}

#[tokio::test]
async fn fetch_all_posts_get_attributes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/JNAP/"))
        .and(header("x-jnap-action", GET_ATTRIBUTES))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(attributes(&[
            ("C1_T1_room_temperature", json!("700")),
            ("sys_heat_cool_mode", json!("0")),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let vars = client.fetch_all().await.expect("fetch should succeed");
    assert_eq!(vars.len(), 2);
    assert_eq!(vars["C1_T1_room_temperature"], "700");
    assert_eq!(vars["sys_heat_cool_mode"], "0");
}

#[tokio::test]
async fn fetch_all_stringifies_non_string_values() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(attributes(&[
            ("C1_T1_rh", json!(45)),
            ("sys_forced_eco_mode", json!("1")),
        ])))
        .mount(&server)
        .await;

    let vars = client_for(&server).fetch_all().await.unwrap();
    assert_eq!(vars["C1_T1_rh"], "45");
    assert_eq!(vars["sys_forced_eco_mode"], "1");
}

#[tokio::test]
async fn write_many_sends_string_values() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/JNAP/"))
        .and(header("x-jnap-action", SET_ATTRIBUTES))
        .and(body_json(json!({
            "vars": [
                { "waspVarName": "C1_T1_setpoint", "waspVarValue": "698" },
                { "waspVarName": "sys_heat_cool_mode", "waspVarValue": "1" },
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "OK" })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .write_many(&[
            ("C1_T1_setpoint".to_string(), "698".to_string()),
            ("sys_heat_cool_mode".to_string(), "1".to_string()),
        ])
        .await
        .expect("write should succeed");
}

#[tokio::test]
async fn write_without_result_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    client_for(&server)
        .write_many(&[("sys_forced_eco_mode".to_string(), "1".to_string())])
        .await
        .expect("missing result should be accepted");
}

#[tokio::test]
async fn write_rejected_by_device() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": "ErrorInvalidInput" })),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .write_many(&[("C1_T1_setpoint".to_string(), "698".to_string())])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Rejected(_)), "got {err:?}");
    assert!(err.is_protocol());
}

#[tokio::test]
async fn non_200_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = JnapClient::builder(server.address().to_string())
        .retry_policy(RetryPolicy {
            max_retries: 3,
            backoff_factor: Duration::ZERO,
            max_backoff: Duration::ZERO,
        })
        .build()
        .unwrap();
    let err = client.fetch_all().await.unwrap_err();
    assert!(matches!(err, Error::Status(500)), "got {err:?}");
    assert!(err.is_transport());
}

#[tokio::test]
async fn malformed_body_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_all().await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)), "got {err:?}");
}

#[tokio::test]
async fn unexpected_shape_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "OK" })))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_all().await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_host_fails_after_retries() {
    // Grab a free port and release it so nothing is listening.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut client = JnapClient::builder(format!("127.0.0.1:{port}"))
        .retry_policy(RetryPolicy {
            max_retries: 2,
            backoff_factor: Duration::ZERO,
            max_backoff: Duration::ZERO,
        })
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let err = client.fetch_all().await.unwrap_err();
    assert!(
        matches!(err, Error::Transport { attempts: 3, .. }),
        "got {err:?}"
    );
    assert!(err.is_transport());
}

#[tokio::test]
async fn message_log_records_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(attributes(&[("C1_T1_room_temperature", json!("700"))])),
        )
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let log_path = dir.path().join("jnap.ndjson");
    let mut client = JnapClient::builder(server.address().to_string())
        .retry_policy(RetryPolicy::none())
        .message_log(uponor_x265::MessageLogMode::Full, &log_path)
        .build()
        .unwrap();
    client.fetch_all().await.unwrap();

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<serde_json::Value> = log
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(lines.len() >= 2, "expected request and poll entries: {log}");
    assert_eq!(lines[0]["dir"], "req");
    assert_eq!(lines[0]["action"], GET_ATTRIBUTES);
}
