//! Integration tests using wiremock to simulate the API.

use futures_util::future::join_all;
use quire::observer::{DebugEvent, REDACTED};
use quire::resources::{CreateSession, SearchSessionsInput, UpdateSession};
use quire::{Backoff, Client, ClientBuilder, DebugConfig, ErrorKind, RequestDescriptor};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "qk_test_secret";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestData {
    id: u32,
    name: String,
}

fn builder_for(server: &MockServer) -> ClientBuilder {
    Client::builder()
        .api_key(API_KEY)
        .base_url(server.uri())
        .unwrap()
        .backoff(Backoff::new(Duration::from_millis(10)).without_jitter())
}

fn client_for(server: &MockServer) -> Client {
    builder_for(server).build().unwrap()
}

fn session_json(id: &str, title: &str) -> serde_json::Value {
    json!({
        "id": id,
        "projectId": "p_1",
        "title": title,
        "content": "notes",
        "status": "open"
    })
}

#[tokio::test]
async fn test_get_sends_auth_and_sdk_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .and(header("authorization", "Bearer qk_test_secret"))
        .and(header("content-type", "application/json"))
        .and(header("x-sdk-name", "quire-rust"))
        .and(header("x-sdk-language", "rust"))
        .and(header_exists("x-sdk-version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let data = client.get::<TestData>("/test").await.unwrap();

    assert_eq!(
        data,
        TestData {
            id: 1,
            name: "Test".to_string()
        }
    );
}

#[tokio::test]
async fn test_default_headers_and_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/projects"))
        .and(query_param("limit", "10"))
        .and(header("x-tenant", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder_for(&mock_server)
        .default_header("X-Tenant", "acme")
        .unwrap()
        .build()
        .unwrap();

    let page: serde_json::Value = client
        .execute(RequestDescriptor::get("/v1/projects").with_query_param("limit", "10"))
        .await
        .unwrap();
    assert_eq!(page, json!({"data": []}));
}

#[tokio::test]
async fn test_retry_on_5xx_then_success() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests fail with 500, third succeeds
    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(500).set_body_string("Server error")
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"}))
            }
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .execute_with_headers::<TestData>(RequestDescriptor::get("/test"))
        .await
        .unwrap();

    assert_eq!(response.data.id, 1);
    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_server_error_exhausts_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"message": "maintenance"})))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = builder_for(&mock_server).max_retries(2).build().unwrap();
    let err = client.get::<TestData>("/test").await.unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::Server { status: 503 });
    assert_eq!(err.message(), "maintenance");
    assert_eq!(err.context().unwrap().retry_count, 2);
    assert_eq!(err.context().unwrap().method, "GET");
}

#[tokio::test]
async fn test_validation_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/projects/p_1"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "name is required",
            "details": {"field": "name"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .put::<_, serde_json::Value>("/v1/projects/p_1", &json!({"name": ""}))
        .await
        .unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::Validation);
    assert_eq!(err.message(), "name is required");
    assert_eq!(err.details(), Some(&json!({"field": "name"})));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unauthorized_carries_suggestion_and_request_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/projects"))
        .respond_with(ResponseTemplate::new(401).insert_header("x-request-id", "req_123"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.projects().list().await.unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::Authentication);
    assert_eq!(err.code(), "authentication_error");
    assert_eq!(err.message(), "Invalid API key");
    assert_eq!(err.request_id(), Some("req_123"));
    assert!(err.suggestion().contains("API key"));

    let record = err.to_record();
    assert_eq!(record.status, Some(401));
    assert_eq!(record.context.unwrap().request_id.as_deref(), Some("req_123"));
}

#[tokio::test]
async fn test_invalid_json_is_unknown_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.get::<TestData>("/test").await.unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::Unknown { status: Some(200) });
    assert_eq!(
        err.details().unwrap()["raw_body"],
        json!("<html>oops</html>")
    );
}

#[tokio::test]
async fn test_concurrent_gets_are_deduplicated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/projects"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"id": "p_1", "name": "Docs"}]}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let projects = client.projects();
    let results = join_all((0..5).map(|_| projects.list())).await;

    let pages: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(pages.len(), 5);
    assert!(pages.iter().all(|page| *page == pages[0]));
    assert_eq!(pages[0].data[0].name, "Docs");
}

#[tokio::test]
async fn test_abandoned_get_does_not_poison_later_calls() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // Only the first request is slow.
    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(move |_req: &wiremock::Request| {
            let template =
                ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"}));
            if attempt_count_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                template.set_delay(Duration::from_millis(300))
            } else {
                template
            }
        })
        .mount(&mock_server)
        .await;

    let client = builder_for(&mock_server)
        .timeout(Duration::from_millis(100))
        .max_retries(0)
        .build()
        .unwrap();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), client.get::<TestData>("/test")).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(150)).await;

    let data = client.get::<TestData>("/test").await.unwrap();
    assert_eq!(data.id, 1);
    assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_deduplication_can_be_disabled() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 1, "name": "Test"}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = builder_for(&mock_server).deduplicate(false).build().unwrap();
    let results = join_all((0..3).map(|_| client.get::<TestData>("/test"))).await;
    assert!(results.iter().all(Result::is_ok));
}

#[tokio::test]
async fn test_posts_are_never_deduplicated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/projects"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": "p_1", "name": "Docs"}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let body = json!({"name": "Docs"});
    let (a, b) = tokio::join!(
        client.post::<_, serde_json::Value>("/v1/projects", &body),
        client.post::<_, serde_json::Value>("/v1/projects", &body),
    );
    assert!(a.is_ok() && b.is_ok());
}

#[tokio::test]
async fn test_timeout_reports_configured_duration() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 1, "name": "Test"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let client = builder_for(&mock_server)
        .timeout(Duration::from_millis(100))
        .max_retries(0)
        .build()
        .unwrap();

    let err = client.get::<TestData>("/slow").await.unwrap_err();
    assert_eq!(
        *err.kind(),
        ErrorKind::Timeout {
            timeout: Duration::from_millis(100)
        }
    );
    assert!(err.message().contains("100ms"));
}

#[tokio::test]
async fn test_request_timeout_overrides_client_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 1, "name": "Test"}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;

    let client = builder_for(&mock_server)
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let data: TestData = client
        .execute(RequestDescriptor::get("/slow").with_timeout(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(data.id, 1);
}

#[tokio::test]
async fn test_network_error_after_retries() {
    let client = Client::builder()
        .api_key(API_KEY)
        .base_url("http://127.0.0.1:1")
        .unwrap()
        .timeout(Duration::from_secs(2))
        .max_retries(1)
        .backoff(Backoff::new(Duration::from_millis(10)).without_jitter())
        .build()
        .unwrap();

    let err = client.get::<TestData>("/test").await.unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::Network);
    assert!(err
        .message()
        .contains("Max retries exceeded after 2 attempts"));
}

#[tokio::test]
async fn test_idempotency_keyed_post_is_retried_on_503() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    Mock::given(method("POST"))
        .and(path("/v1/sessions"))
        .and(header("idempotency-key", "create-s-1"))
        .and(body_partial_json(json!({"projectId": "p_1", "title": "Sync"})))
        .respond_with(move |_req: &wiremock::Request| {
            if attempt_count_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(201).set_body_json(session_json("s_1", "Sync"))
            }
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let session = client
        .sessions()
        .create(
            &CreateSession {
                project_id: "p_1".to_string(),
                title: "Sync".to_string(),
                content: None,
            },
            Some("create-s-1"),
        )
        .await
        .unwrap();

    assert_eq!(session.id, "s_1");
    assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_plain_post_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sessions"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .sessions()
        .create(
            &CreateSession {
                project_id: "p_1".to_string(),
                title: "Sync".to_string(),
                content: None,
            },
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::Server { status: 503 });
}

#[tokio::test]
async fn test_patch_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/v1/projects/p_1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .projects()
        .update("p_1", &Default::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_rate_limit_waits_then_succeeds() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(move |_req: &wiremock::Request| {
            if attempt_count_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(429).insert_header("retry-after", "0")
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"}))
            }
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .execute_with_headers::<TestData>(RequestDescriptor::get("/test"))
        .await
        .unwrap();

    assert_eq!(response.attempts, 2);
    assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rate_limit_error_carries_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder_for(&mock_server).max_retries(0).build().unwrap();
    let err = client.get::<TestData>("/test").await.unwrap_err();

    let retry_after = err.retry_after().expect("retry-after instant");
    let remaining = retry_after.duration_since(SystemTime::now()).unwrap();
    assert!(remaining > Duration::from_secs(25));
    assert!(remaining <= Duration::from_secs(30));
}

#[tokio::test]
async fn test_no_content_returns_null() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/projects/p_1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let raw: serde_json::Value = client.delete("/v1/projects/p_1").await.unwrap();
    assert_eq!(raw, serde_json::Value::Null);

    client.projects().delete("p_1").await.unwrap();
}

#[tokio::test]
async fn test_head_returns_status_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/v1/projects"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-total-count", "7"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let info = client.head("/v1/projects").await.unwrap();

    assert_eq!(info.status, 200);
    assert_eq!(info.headers.get("x-total-count").map(String::as_str), Some("7"));
}

#[tokio::test]
async fn test_conditional_read_round_trip() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/sessions/s_1"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304).insert_header("etag", "\"v1\""))
        .with_priority(1)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/sessions/s_1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"v1\"")
                .set_body_json(session_json("s_1", "Weekly sync")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let sessions = client.sessions();

    let first = sessions.get("s_1", None).await.unwrap().unwrap();
    assert_eq!(first.data.title, "Weekly sync");
    assert_eq!(first.etag.as_deref(), Some("\"v1\""));
    assert!(client.cache().unwrap().has("session:s_1"));

    // Explicit validator: unchanged means no data.
    let unchanged = sessions.get("s_1", first.etag.as_deref()).await.unwrap();
    assert!(unchanged.is_none());

    // Implicit validator from the cache: unchanged means the cached copy.
    let cached = sessions.get("s_1", None).await.unwrap().unwrap();
    assert_eq!(cached.data, first.data);
    assert_eq!(cached.etag.as_deref(), Some("\"v1\""));
}

#[tokio::test]
async fn test_conditional_read_returns_none_when_entry_evicted_before_304() {
    let mock_server = MockServer::start().await;
    let client = client_for(&mock_server);
    let evicting_client = client.clone();

    Mock::given(method("GET"))
        .and(path("/v1/sessions/s_1"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(move |_req: &wiremock::Request| {
            evicting_client.cache().unwrap().delete("session:s_1");
            ResponseTemplate::new(304)
        })
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/sessions/s_1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"v1\"")
                .set_body_json(session_json("s_1", "Weekly sync")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let sessions = client.sessions();
    assert!(sessions.get("s_1", None).await.unwrap().is_some());
    assert!(client.cache().unwrap().has("session:s_1"));

    let result = sessions.get("s_1", None).await.unwrap();
    assert!(result.is_none());
    assert!(!client.cache().unwrap().has("session:s_1"));
}

#[tokio::test]
async fn test_conditional_read_without_cache_returns_none_on_304() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/sessions/s_1"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder_for(&mock_server)
        .cache(quire::CacheConfig::disabled())
        .build()
        .unwrap();

    assert!(client.cache().is_none());
    let result = client.sessions().get("s_1", Some("\"v1\"")).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_session_writes_invalidate_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/sessions/s_1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"v1\"")
                .set_body_json(session_json("s_1", "Weekly sync")),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/v1/sessions/s_1"))
        .and(body_partial_json(json!({"title": "Daily sync"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("s_1", "Daily sync")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.sessions().get("s_1", None).await.unwrap();
    assert!(client.cache().unwrap().has("session:s_1"));

    let updated = client
        .sessions()
        .update(
            "s_1",
            &UpdateSession {
                title: Some("Daily sync".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "Daily sync");
    assert!(!client.cache().unwrap().has("session:s_1"));
}

#[tokio::test]
async fn test_invalidate_cache_by_pattern() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/sessions/s_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("s_1", "One")))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions/s_2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("s_2", "Two")))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.sessions().get("s_1", None).await.unwrap();
    client.sessions().get("s_2", None).await.unwrap();

    let removed = client.invalidate_cache(&Regex::new("^session:").unwrap());
    assert_eq!(removed, 2);
    assert!(client.cache().unwrap().is_empty());
}

#[tokio::test]
async fn test_graphql_partial_failure_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"variables": {"input": {"query": "sync"}}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"searchSessions": {"total": 1, "items": []}},
            "errors": [{"message": "shard 2 unavailable", "path": ["searchSessions"]}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .search()
        .search_sessions(&SearchSessionsInput::new("sync"))
        .await
        .unwrap_err();

    match err.kind() {
        ErrorKind::Graphql {
            errors, variables, ..
        } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].message, "shard 2 unavailable");
            assert_eq!(variables.as_ref().unwrap()["input"]["query"], "sync");
        }
        other => panic!("Expected GraphQL error, got {:?}", other),
    }
    assert_eq!(err.code(), "graphql_error");
}

#[tokio::test]
async fn test_graphql_search_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"searchSessions": {
                "total": 1,
                "nextCursor": null,
                "items": [session_json("s_1", "Weekly sync")]
            }},
            "errors": null
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let results = client
        .search()
        .search_sessions(&SearchSessionsInput::new("sync"))
        .await
        .unwrap();

    assert_eq!(results.total, 1);
    assert_eq!(results.items[0].id, "s_1");
    assert!(results.next_cursor.is_none());
}

#[tokio::test]
async fn test_debug_sink_never_sees_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/projects"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("set-cookie", "session=abc")
                .set_body_json(json!({"id": "p_1", "name": "Docs"})),
        )
        .mount(&mock_server)
        .await;

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let client = builder_for(&mock_server)
        .debug(
            DebugConfig::builder()
                .sink(move |event| sink_events.lock().unwrap().push(event.clone()))
                .build(),
        )
        .build()
        .unwrap();

    client
        .post::<_, serde_json::Value>(
            "/v1/projects",
            &json!({"name": "Docs", "webhookSecret": "whsec_123"}),
        )
        .await
        .unwrap();

    let events = events.lock().unwrap();
    let rendered = serde_json::to_string(&*events).unwrap();
    assert!(!rendered.contains(API_KEY));
    assert!(!rendered.contains("whsec_123"));
    assert!(!rendered.contains("session=abc"));

    match &events[0] {
        DebugEvent::Request { headers, body, .. } => {
            assert_eq!(headers["authorization"], REDACTED);
            assert_eq!(body.as_ref().unwrap()["webhookSecret"], REDACTED);
            assert_eq!(body.as_ref().unwrap()["name"], "Docs");
        }
        other => panic!("Expected request event, got {:?}", other),
    }
    assert!(events
        .iter()
        .any(|event| matches!(event, DebugEvent::Timing { attempts: 1, .. })));
}

#[tokio::test]
async fn test_debug_events_mask_secret_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/projects"))
        .and(query_param("token", "tok_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let client = builder_for(&mock_server)
        .debug(
            DebugConfig::builder()
                .sink(move |event| sink_events.lock().unwrap().push(event.clone()))
                .build(),
        )
        .build()
        .unwrap();

    let _: serde_json::Value = client
        .execute(
            RequestDescriptor::get("/v1/projects")
                .with_query_param("limit", "5")
                .with_query_param("token", "tok_123"),
        )
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert!(!serde_json::to_string(&*events).unwrap().contains("tok_123"));
    match &events[0] {
        DebugEvent::Request { url, .. } => {
            assert!(url.ends_with("/v1/projects?limit=5&token=[REDACTED]"));
        }
        other => panic!("Expected request event, got {:?}", other),
    }
}
