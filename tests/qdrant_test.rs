mod helpers;

use helpers::test_provider;
use mcp_server_qdrant::config::QdrantConfig;
use mcp_server_qdrant::qdrant::{Entry, QdrantConnector};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup(collection: Option<&str>) -> (MockServer, QdrantConnector) {
    let server = MockServer::start().await;
    let config = QdrantConfig {
        url: Some(server.uri()),
        api_key: Some("test-key".into()),
        collection_name: collection.map(String::from),
        ..QdrantConfig::default()
    };
    let connector = QdrantConnector::new(&config, test_provider()).unwrap();
    (server, connector)
}

fn ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "result": result, "status": "ok", "time": 0.001 }))
}

async fn mock_exists(server: &MockServer, name: &str, exists: bool) {
    Mock::given(method("GET"))
        .and(path(format!("/collections/{name}/exists")))
        .respond_with(ok(json!({ "exists": exists })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn store_creates_missing_collection_and_upserts() {
    let (server, connector) = setup(Some("memories")).await;
    mock_exists(&server, "memories", false).await;

    Mock::given(method("PUT"))
        .and(path("/collections/memories"))
        .and(header("api-key", "test-key"))
        .and(body_partial_json(json!({
            "vectors": { "fast-bge-small-en": { "size": 384, "distance": "Cosine" } }
        })))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/collections/memories/points"))
        .and(query_param("wait", "true"))
        .and(body_partial_json(json!({
            "points": [{
                "payload": { "document": "likes tea", "metadata": { "source": "chat" } }
            }]
        })))
        .respond_with(ok(json!({ "operation_id": 1, "status": "completed" })))
        .expect(1)
        .mount(&server)
        .await;

    let entry = Entry {
        content: "likes tea".into(),
        metadata: Some(json!({ "source": "chat" })),
    };
    connector.store(&entry, None).await.unwrap();
}

#[tokio::test]
async fn store_into_existing_collection_checks_vector_space() {
    let (server, connector) = setup(None).await;
    mock_exists(&server, "notes", true).await;

    Mock::given(method("GET"))
        .and(path("/collections/notes"))
        .respond_with(ok(json!({
            "config": { "params": { "vectors": {
                "fast-bge-small-en": { "size": 384, "distance": "Cosine" }
            } } }
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/collections/notes/points"))
        .respond_with(ok(json!({ "status": "completed" })))
        .expect(1)
        .mount(&server)
        .await;

    let entry = Entry {
        content: "meeting moved to friday".into(),
        metadata: None,
    };
    connector.store(&entry, Some("notes")).await.unwrap();
}

#[tokio::test]
async fn store_rejects_collection_from_another_model() {
    let (server, connector) = setup(Some("memories")).await;
    mock_exists(&server, "memories", true).await;

    Mock::given(method("GET"))
        .and(path("/collections/memories"))
        .respond_with(ok(json!({
            "config": { "params": { "vectors": {
                "fast-all-minilm-l6-v2": { "size": 384, "distance": "Cosine" }
            } } }
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/collections/memories/points"))
        .respond_with(ok(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let entry = Entry {
        content: "x".into(),
        metadata: None,
    };
    let err = connector.store(&entry, None).await.unwrap_err();
    assert!(err.to_string().contains("no vector named fast-bge-small-en"));
}

#[tokio::test]
async fn store_rejects_dimension_mismatch() {
    let (server, connector) = setup(Some("memories")).await;
    mock_exists(&server, "memories", true).await;

    Mock::given(method("GET"))
        .and(path("/collections/memories"))
        .respond_with(ok(json!({
            "config": { "params": { "vectors": {
                "fast-bge-small-en": { "size": 768, "distance": "Cosine" }
            } } }
        })))
        .mount(&server)
        .await;

    let entry = Entry {
        content: "x".into(),
        metadata: None,
    };
    let err = connector.store(&entry, None).await.unwrap_err();
    assert!(err.to_string().contains("768"));
}

#[tokio::test]
async fn search_missing_collection_returns_nothing() {
    let (server, connector) = setup(Some("memories")).await;
    mock_exists(&server, "memories", false).await;

    Mock::given(method("POST"))
        .and(path("/collections/memories/points/query"))
        .respond_with(ok(json!({ "points": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let results = connector.search("tea", None, 10).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn search_returns_entries_in_rank_order() {
    let (server, connector) = setup(Some("memories")).await;
    mock_exists(&server, "memories", true).await;

    Mock::given(method("POST"))
        .and(path("/collections/memories/points/query"))
        .and(header("api-key", "test-key"))
        .and(body_partial_json(json!({
            "using": "fast-bge-small-en",
            "limit": 3,
            "with_payload": true
        })))
        .respond_with(ok(json!({ "points": [
            { "id": "a", "score": 0.9, "payload": { "document": "likes green tea", "metadata": { "k": 1 } } },
            { "id": "b", "score": 0.7, "payload": { "document": "drinks coffee", "metadata": null } }
        ] })))
        .expect(1)
        .mount(&server)
        .await;

    let results = connector.search("tea", None, 3).await.unwrap();
    assert_eq!(
        results,
        vec![
            Entry {
                content: "likes green tea".into(),
                metadata: Some(json!({ "k": 1 })),
            },
            Entry {
                content: "drinks coffee".into(),
                metadata: None,
            },
        ]
    );
}

#[tokio::test]
async fn http_errors_are_reported() {
    let (server, connector) = setup(Some("memories")).await;

    Mock::given(method("GET"))
        .and(path("/collections/memories/exists"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = connector.search("tea", None, 3).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("500"), "unexpected error: {msg}");
    assert!(msg.contains("boom"), "unexpected error: {msg}");
}

#[tokio::test]
async fn lists_collection_names() {
    let (server, connector) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ok(json!({ "collections": [ { "name": "memories" }, { "name": "notes" } ] })))
        .mount(&server)
        .await;

    assert_eq!(
        connector.collection_names().await.unwrap(),
        vec!["memories".to_string(), "notes".to_string()]
    );
}

#[tokio::test]
async fn operations_without_collection_fail_before_any_request() {
    let (server, connector) = setup(None).await;

    let entry = Entry {
        content: "x".into(),
        metadata: None,
    };
    assert!(connector.store(&entry, None).await.is_err());
    assert!(connector.search("x", None, 5).await.is_err());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
