//! End-to-end tests through the stream transport against a mock Platform.
//!
//! These drive the full path a real peer exercises: NDJSON frame in,
//! dispatcher, governed client, (mock) Platform HTTP, envelope out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vanguard::dispatcher::Dispatcher;
use vanguard::transport::stdio::run_stream;
use vanguard_core::auth::{Authenticator, OAuthConfig};
use vanguard_core::client::{ApiClient, ApiClientConfig};
use vanguard_core::limiter::{RateLimiter, RateLimiterConfig};

fn gateway_client(base_url: String, max_calls: usize, window: Duration) -> Arc<ApiClient> {
    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig { max_calls, window }));
    let auth = Arc::new(Authenticator::new(OAuthConfig::default()).unwrap());
    Arc::new(
        ApiClient::new(
            ApiClientConfig {
                base_url,
                api_key: "test-api-key".to_string(),
                ..ApiClientConfig::default()
            },
            limiter,
            auth,
        )
        .unwrap(),
    )
}

fn envelope(response: Value) -> Value {
    json!({
        "Response": response,
        "ErrorCode": 1,
        "ErrorStatus": "Success",
        "Message": "Ok"
    })
}

/// Send NDJSON lines through the stream transport and collect the replies.
async fn drive_stream(client: Arc<ApiClient>, input: String) -> Vec<Value> {
    let dispatcher = Arc::new(Dispatcher::new(client));

    let (peer_side, gateway_side) = tokio::io::duplex(256 * 1024);
    let (gateway_read, gateway_write) = tokio::io::split(gateway_side);
    let (mut peer_read, mut peer_write) = tokio::io::split(peer_side);

    let transport = tokio::spawn(run_stream(
        BufReader::new(gateway_read),
        gateway_write,
        dispatcher,
    ));

    peer_write.write_all(input.as_bytes()).await.unwrap();
    peer_write.shutdown().await.unwrap();

    let mut output = String::new();
    peer_read.read_to_string(&mut output).await.unwrap();
    transport.await.unwrap().unwrap();

    output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn test_stream_invocation_returns_upstream_body_unmodified() {
    let server = MockServer::start().await;
    let body = envelope(json!({
        "profile": {
            "data": {
                "userInfo": {"membershipType": 3, "membershipId": "4611686018467260757"},
                "characterIds": ["2305843009301040757"]
            }
        }
    }));
    Mock::given(method("GET"))
        .and(path("/Destiny2/3/Profile/4611686018467260757/"))
        .and(query_param("components", "100,200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let client = gateway_client(server.uri(), 25, Duration::from_secs(10));
    let request = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {
            "name": "get_destiny_profile",
            "arguments": {"membershipType": 3, "membershipId": "4611686018467260757"}
        }
    });

    let responses = drive_stream(client, format!("{request}\n")).await;
    assert_eq!(responses.len(), 1);

    let result = &responses[0]["result"];
    assert!(result.get("isError").is_none());
    let text = result["content"][0]["text"].as_str().unwrap();
    let payload: Value = serde_json::from_str(text).unwrap();
    assert_eq!(payload, body);
}

#[tokio::test]
async fn test_stream_provider_failure_becomes_failure_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ErrorCode": 1601,
            "ErrorStatus": "DestinyAccountNotFound",
            "Message": "We were unable to find your Destiny account."
        })))
        .mount(&server)
        .await;

    let client = gateway_client(server.uri(), 25, Duration::from_secs(10));
    let request = json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "tools/call",
        "params": {"name": "get_destiny_manifest", "arguments": {}}
    });

    let responses = drive_stream(client, format!("{request}\n")).await;
    let result = &responses[0]["result"];
    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("DestinyAccountNotFound"));
    assert!(text.contains("unable to find your Destiny account"));
}

#[tokio::test]
async fn test_one_invocation_one_envelope_under_mixed_traffic() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(Value::Null)))
        .mount(&server)
        .await;

    let client = gateway_client(server.uri(), 25, Duration::from_secs(10));
    let lines = [
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#.to_string(),
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
               "params": {"name": "get_destiny_manifest", "arguments": {}}})
        .to_string(),
        "garbage frame".to_string(),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
               "params": {"name": "no_such_tool", "arguments": {}}})
        .to_string(),
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
               "params": {"name": "get_destiny_manifest"}})
        .to_string(),
    ];

    let responses = drive_stream(client, format!("{}\n", lines.join("\n"))).await;

    // Exactly one response per request; none for the notification or the
    // dropped frame.
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["id"], 1);
    assert!(responses[0]["result"].get("isError").is_none());
    assert_eq!(responses[1]["id"], 2);
    assert_eq!(responses[1]["result"]["isError"], true);
    assert_eq!(responses[2]["id"], 3);
    assert_eq!(responses[2]["result"]["isError"], true);
}

#[tokio::test]
async fn test_connections_share_the_process_wide_limiter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(Value::Null)))
        .mount(&server)
        .await;

    // One governed client, two dispatchers — the same shape two socket
    // connections produce.
    let window = Duration::from_millis(500);
    let client = gateway_client(server.uri(), 5, window);
    let conn_a = Dispatcher::new(Arc::clone(&client));
    let conn_b = Dispatcher::new(Arc::clone(&client));

    async fn call(dispatcher: &Dispatcher) -> Value {
        let kind = vanguard_core::jsonrpc::MessageKind::Request {
            id: vanguard_core::jsonrpc::JsonRpcId::Number(1),
            method: "tools/call".to_string(),
        };
        let params = json!({"name": "get_destiny_manifest", "arguments": {}});
        let resp = dispatcher.dispatch(kind, Some(params)).await.unwrap();
        resp.result.unwrap()
    }

    // Connection A issues 1 call, connection B burns the remaining 4.
    call(&conn_a).await;
    for _ in 0..4 {
        call(&conn_b).await;
    }
    assert_eq!(client.limiter().remaining().await, 0);

    // B's next call is paced by the shared window even though B never saw
    // A's admission.
    let start = Instant::now();
    call(&conn_b).await;
    assert!(
        start.elapsed() >= Duration::from_millis(250),
        "sixth admission was not delayed: {:?}",
        start.elapsed()
    );
}
