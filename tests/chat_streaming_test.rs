mod support;

use flowstream::prelude::*;
use futures_util::StreamExt;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn sse_deltas_are_concatenated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("accept", "text/event-stream"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "messages": [{"role": "user", "content": "hi"}],
            "data": {"provider": "openai", "model": "gpt-4o-mini"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            support::sse_body(&[r#"{"delta":"Hel"}"#, r#"{"delta":"lo"}"#, "[DONE]"]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(support::chat_config(format!("{}/api/chat", server.uri())))
        .unwrap()
        .with_interceptor(Arc::new(LoggingInterceptor));
    let out = client
        .aggregate(&[ChatMessage::user("hi")], &CancelHandle::new())
        .await
        .unwrap();

    assert_eq!(out.text, "Hello");
    assert_eq!(out.delta_count, 2);
    assert!(out.saw_done);
}

#[tokio::test]
async fn malformed_lines_do_not_disturb_the_text() {
    let server = MockServer::start().await;
    let body = format!(
        "{}: keep-alive\n\n{}event: message\n{}",
        support::sse_body(&[r#"{"delta":"a"}"#, "{broken"]),
        support::sse_body(&[r#"{"content":"b"}"#, "not json either"]),
        support::sse_body(&[
            r#"{"choices":[{"delta":{"content":"c"}}]}"#,
            "[DONE]",
            r#"{"delta":"late"}"#,
        ]),
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = ChatClient::new(support::chat_config(server.uri())).unwrap();
    let out = client
        .aggregate(&[ChatMessage::user("hi")], &CancelHandle::new())
        .await
        .unwrap();

    assert_eq!(out.text, "abc");
    assert_eq!(out.unparsable_count, 2);
}

#[tokio::test]
async fn ndjson_lines_are_decoded() {
    let server = MockServer::start().await;
    let body = concat!(
        "{\"message\":{\"role\":\"assistant\",\"content\":\"Hi \"},\"done\":false}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"there\"},\"done\":false}\n",
        "{\"response\":\"!\"}"
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let client = ChatClient::new(support::chat_config(server.uri())).unwrap();
    let out = client
        .aggregate(
            &[ChatMessage::system("be brief"), ChatMessage::user("hi")],
            &CancelHandle::new(),
        )
        .await
        .unwrap();

    assert_eq!(out.text, "Hi there!");
    assert!(!out.saw_done);
}

#[tokio::test]
async fn plain_json_body_is_read_whole() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [{"message": {"content": "all at once"}}]})),
        )
        .mount(&server)
        .await;

    let client = ChatClient::new(support::chat_config(server.uri())).unwrap();
    let out = client
        .aggregate(&[ChatMessage::user("hi")], &CancelHandle::new())
        .await
        .unwrap();
    assert_eq!(out.text, "all at once");
}

#[tokio::test]
async fn error_status_carries_body_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = ChatClient::new(support::chat_config(server.uri())).unwrap();
    let err = client
        .aggregate(&[ChatMessage::user("hi")], &CancelHandle::new())
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(500));
    assert!(err.to_string().contains("upstream exploded"), "{err}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unauthorized_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = ChatClient::new(support::chat_config(server.uri())).unwrap();
    let err = client
        .aggregate(&[ChatMessage::user("hi")], &CancelHandle::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::AuthenticationError { .. }), "{err:?}");
    assert_eq!(err.status_code(), Some(401));
    assert_eq!(err.category(), ErrorCategory::Authentication);
}

#[tokio::test]
async fn forbidden_reports_status_403() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("model not enabled"))
        .mount(&server)
        .await;

    let client = ChatClient::new(support::chat_config(server.uri())).unwrap();
    let err = client
        .aggregate(&[ChatMessage::user("hi")], &CancelHandle::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::AuthenticationError { code: 403, .. }), "{err:?}");
    assert_eq!(err.status_code(), Some(403));
    assert!(err.to_string().contains("model not enabled"));
}

#[tokio::test]
async fn stream_variant_yields_each_delta() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            support::sse_body(&[
                r#"{"delta":"one "}"#,
                r#"{"delta":""}"#,
                r#"{"delta":"two"}"#,
                "[DONE]",
            ]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let client = ChatClient::new(support::chat_config(server.uri())).unwrap();
    let handle = client.stream(vec![ChatMessage::user("hi")]);
    let deltas: Vec<String> = handle
        .stream
        .map(|d| d.unwrap())
        .collect()
        .await;
    assert_eq!(deltas, vec!["one ".to_string(), "two".to_string()]);
}

#[tokio::test]
async fn custom_roles_pass_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({
            "messages": [{"role": "tool", "content": "42"}],
            "data": {"provider": "openai", "model": "gpt-4o-mini"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            support::sse_body(&[r#"{"delta":"ok"}"#]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(support::chat_config(server.uri())).unwrap();
    let out = client
        .aggregate(&[ChatMessage::new("tool", "42")], &CancelHandle::new())
        .await
        .unwrap();
    assert_eq!(out.text, "ok");
}
