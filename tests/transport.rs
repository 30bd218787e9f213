use serde_json::json;
use slidegen::providers::{HttpRequest, HttpTransport, ReqwestTransport};
use slidegen::ProviderError;
use std::net::TcpListener;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_post_sends_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/images/generations"))
        .and(header("authorization", "Bearer ark-key"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "prompt": "sunrise" })))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":[]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(Some(Duration::from_secs(5))).unwrap();
    let request = HttpRequest::json(
        format!("{}/api/v3/images/generations", server.uri()),
        &json!({ "prompt": "sunrise" }),
    )
    .unwrap()
    .with_header("Authorization", "Bearer ark-key");

    let response = transport.post(request).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), r#"{"data":[]}"#);
}

#[tokio::test]
async fn test_error_status_is_passed_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(503).set_body_string(r#"{"error":{"message":"overloaded"}}"#),
        )
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(None).unwrap();
    let request = HttpRequest::json(server.uri(), &json!({})).unwrap();
    let response = transport.post(request).await.unwrap();
    assert_eq!(response.status, 503);
    assert!(!response.is_success());
    assert!(response.text().contains("overloaded"));
}

#[tokio::test]
async fn test_get_returns_raw_bytes() {
    let server = MockServer::start().await;
    let bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];
    Mock::given(method("GET"))
        .and(path("/images/out.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.clone()))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(None).unwrap();
    let response = transport
        .get(&format!("{}/images/out.png", server.uri()))
        .await
        .unwrap();
    assert_eq!(response.body, bytes);
}

#[tokio::test]
async fn test_timeout_is_network_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(Some(Duration::from_millis(100))).unwrap();
    let err = transport.get(&server.uri()).await.unwrap_err();
    assert!(matches!(err, ProviderError::NetworkUnavailable(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_connection_refused_is_network_unavailable() {
    // bind an ephemeral port, then release it so nothing is listening there
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let transport = ReqwestTransport::new(Some(Duration::from_secs(2))).unwrap();
    let err = transport.get(&uri).await.unwrap_err();
    assert!(matches!(err, ProviderError::NetworkUnavailable(_)));
}
