//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every `ApiClient`
//! operation over real HTTP through the reqwest transport.

use std::time::Duration;

use apikit_core::{
    afetch, mfetch, ApiClient, ApiConfig, ApiError, ErrorStatus, FilePart, HttpRequest,
    ResponseEnvelope, Status,
};
use mock_server::{Item, DOWNLOAD_BYTES};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Start the mock server on a random port and return its base URL.
async fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { mock_server::run(listener).await.unwrap() });
    format!("http://{addr}")
}

async fn client(config: ApiConfig) -> ApiClient {
    ApiClient::new(config).unwrap()
}

#[tokio::test]
async fn crud_lifecycle() {
    let base = start_server().await;
    let api = client(ApiConfig::new(&base)).await;

    // Step 1: list.
    let list: ResponseEnvelope<Vec<Item>> = api.get("items", None, None).await.unwrap();
    assert!(list.data().unwrap().is_empty());

    // Step 2: create.
    let created: ResponseEnvelope<Item> = api
        .post("items", Some(json!({"name": "Widget"})), None)
        .await
        .unwrap();
    assert_eq!(created.status(), Status::Success);
    assert_eq!(created.message(), "Request successful");
    let created = created.into_data().unwrap();
    assert_eq!(created.name, "Widget");

    api.set_default_resource_path("items").await;

    // Step 3: get by id under the resource path.
    let fetched: ResponseEnvelope<Item> = api.get(&created.id.to_string(), None, None).await.unwrap();
    assert_eq!(fetched.data(), Some(&created));

    // Step 4: partial update.
    let updated: ResponseEnvelope<Item> = api
        .put(&created.id.to_string(), Some(json!({"in_stock": true})), None)
        .await
        .unwrap();
    let updated = updated.into_data().unwrap();
    assert_eq!(updated.name, "Widget");
    assert!(updated.in_stock);

    // Step 5: delete returns no content.
    let deleted: ResponseEnvelope<Value> = api.delete(&created.id.to_string(), None).await.unwrap();
    assert!(deleted.is_success());
    assert!(deleted.data().is_none());

    // Step 6: get after delete fails with the server's message.
    let err = api
        .get::<Item>(&created.id.to_string(), None, None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), ErrorStatus::Code(404));
    assert_eq!(err.message(), "not found");
    assert_eq!(err.data(), Some(&json!({"message": "not found"})));
}

#[tokio::test]
async fn missing_item_under_resource_path() {
    let base = start_server().await;
    let api = client(ApiConfig::new(&base).with_resource_path("items")).await;

    let err = api.get::<Item>("7", None, None).await.unwrap_err();
    // "7" is not a UUID, so the server rejects the path before lookup.
    assert_eq!(err.status(), ErrorStatus::Code(400));

    let err = api
        .get::<Item>("00000000-0000-0000-0000-000000000007", None, None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), ErrorStatus::Code(404));
    assert_eq!(err.message(), "not found");
}

#[tokio::test]
async fn auth_token_lifecycle() {
    let base = start_server().await;
    let api = client(ApiConfig::new(&base).with_auth_token("initial")).await;

    let me: ResponseEnvelope<Value> = api.get("whoami", None, None).await.unwrap();
    assert_eq!(me.data().unwrap()["authorization"], "Bearer initial");

    api.update_auth_token(Some("refreshed")).await;
    let me: ResponseEnvelope<Value> = api.get("whoami", None, None).await.unwrap();
    assert_eq!(me.data().unwrap()["authorization"], "Bearer refreshed");

    api.update_auth_token(None).await;
    let me: ResponseEnvelope<Value> = api.get("whoami", None, None).await.unwrap();
    assert!(me.data().unwrap()["authorization"].is_null());
}

#[tokio::test]
async fn default_headers_and_interceptors_reach_the_server() {
    let base = start_server().await;
    let api = client(ApiConfig::new(&base).with_header("X-Client", "apikit")).await;

    api.set_headers([("X-Tenant", "acme")]).await;
    let id = api
        .add_interceptor(|req: &mut HttpRequest| req.set_header("X-Request-Source", "hook"))
        .await;

    let me: ResponseEnvelope<Value> = api.get("whoami", None, None).await.unwrap();
    let headers = &me.data().unwrap()["headers"];
    assert_eq!(headers["x-client"], "apikit");
    assert_eq!(headers["x-tenant"], "acme");
    assert_eq!(headers["x-request-source"], "hook");

    assert!(api.remove_interceptor(id).await);
    let me: ResponseEnvelope<Value> = api.get("whoami", None, None).await.unwrap();
    assert!(me.data().unwrap()["headers"]["x-request-source"].is_null());
}

#[tokio::test]
async fn params_become_query_string() {
    let base = start_server().await;
    let api = client(ApiConfig::new(&base)).await;

    let echoed: ResponseEnvelope<Vec<(String, String)>> = api
        .get("query", Some(json!({"page": 2, "tag": ["a", "b"]})), None)
        .await
        .unwrap();
    let pairs = echoed.into_data().unwrap();
    assert!(pairs.contains(&("page".to_string(), "2".to_string())));
    assert!(pairs.contains(&("tag".to_string(), "a".to_string())));
    assert!(pairs.contains(&("tag".to_string(), "b".to_string())));
}

#[tokio::test]
async fn cancel_in_flight_get() {
    let base = start_server().await;
    let api = client(ApiConfig::new(&base)).await;

    let token = api.cancel_token_source();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let sibling = api.clone();
    let (slow, fast) = tokio::join!(
        api.get::<Value>("slow", None, Some(&token)),
        sibling.get::<Vec<Item>>("items", None, None),
    );

    let err = slow.unwrap_err();
    assert_eq!(err.status(), ErrorStatus::Code(499));
    assert_eq!(err.message(), "Request canceled");
    assert!(fast.unwrap().is_success());
}

#[tokio::test]
async fn server_error_without_json_body() {
    let base = start_server().await;
    let api = client(ApiConfig::new(&base)).await;

    let err = api.get::<Value>("broken", None, None).await.unwrap_err();
    assert_eq!(err.status(), ErrorStatus::Code(500));
    assert_eq!(err.message(), "Request failed with status code 500");
    assert_eq!(err.data(), Some(&json!("database exploded")));
}

#[tokio::test]
async fn unreachable_server_is_500_with_transport_message() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = client(ApiConfig::new(format!("http://{addr}"))).await;
    let err = api.get::<Value>("items", None, None).await.unwrap_err();
    assert_eq!(err.status(), ErrorStatus::Code(500));
    assert_ne!(err.message(), "An unknown error occurred");
    assert!(err.data().is_none());
}

#[tokio::test]
async fn download_and_upload() {
    let base = start_server().await;
    let api = client(ApiConfig::new(&base)).await;

    let file = api.download_file("download", None).await.unwrap();
    assert_eq!(file.message(), "File downloaded successfully");
    assert_eq!(file.data().map(|b| &b[..]), Some(DOWNLOAD_BYTES));

    let uploaded = api
        .upload_file("upload", FilePart::new("notes.txt", "hello"), None)
        .await
        .unwrap();
    assert_eq!(uploaded.message(), "File uploaded successfully");
    assert_eq!(uploaded.data().map(String::as_str), Some("file:notes.txt:5"));

    let image = FilePart::new("cat.png", vec![0x89u8, 0x50, 0x4e, 0x47]).with_content_type("image/png");
    let uploaded = api.upload_image("upload", image, None).await.unwrap();
    assert_eq!(uploaded.message(), "Image uploaded successfully");
    assert_eq!(uploaded.data().map(String::as_str), Some("image:cat.png:4"));
}

#[tokio::test]
async fn reinitialize_points_at_new_server() {
    let first = start_server().await;
    let second = start_server().await;
    let api = client(ApiConfig::new(&first)).await;

    let created: ResponseEnvelope<Item> = api
        .post("items", Some(json!({"name": "only on first"})), None)
        .await
        .unwrap();
    assert!(created.is_success());

    api.initialize(ApiConfig::new(&second)).await.unwrap();
    let list: ResponseEnvelope<Vec<Item>> = api.get("items", None, None).await.unwrap();
    assert!(list.data().unwrap().is_empty());
}

#[tokio::test]
async fn afetch_never_fails() {
    let base = start_server().await;
    let api = client(ApiConfig::new(&base).with_resource_path("items")).await;

    let envelope = afetch(api.get::<Item>("00000000-0000-0000-0000-000000000000", None, None)).await;
    assert_eq!(envelope.status(), Status::Error(ErrorStatus::Code(404)));
    assert_eq!(envelope.message(), "not found");
    assert!(envelope.data().is_none());

    api.set_default_resource_path("").await;
    let envelope = afetch(api.get::<Vec<Item>>("items", None, None)).await;
    assert!(envelope.is_success());
}

#[tokio::test]
async fn mfetch_mixes_outcomes() {
    let base = start_server().await;
    let api = client(ApiConfig::new(&base)).await;

    let results = mfetch([
        ("items", api.clone()),
        ("broken", api.clone()),
        ("whoami", api.clone()),
    ]
    .map(|(path, api)| move || async move { api.get::<Value>(path, None, None).await }))
    .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_success());
    assert_eq!(results[1].status(), Status::Error(ErrorStatus::Generic));
    assert_eq!(results[1].message(), "Request failed with status code 500");
    assert!(results[1].data().is_none());
    assert!(results[2].is_success());
}

#[tokio::test]
async fn api_error_round_trips_to_response() {
    let base = start_server().await;
    let api = client(ApiConfig::new(&base)).await;

    let err: ApiError = api.get::<Value>("broken", None, None).await.unwrap_err();
    let envelope = err.to_response();
    assert_eq!(envelope.status(), Status::Error(ErrorStatus::Code(500)));
    assert_eq!(envelope.data(), Some(&json!("database exploded")));
}
