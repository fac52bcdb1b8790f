use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Delay applied by `/slow`, long enough for tests to cancel it.
pub const SLOW_DELAY: Duration = Duration::from_secs(5);

/// Bytes served by `/download`.
pub const DOWNLOAD_BYTES: &[u8] = &[0x00, 0x01, 0xfe, 0xff, 0x7f];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub in_stock: bool,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub name: String,
    #[serde(default)]
    pub in_stock: bool,
}

#[derive(Deserialize)]
pub struct UpdateItem {
    pub name: Option<String>,
    pub in_stock: Option<bool>,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Item>>>;

type ApiResult<T> = Result<T, (StatusCode, Json<Value>)>;

fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "not found" })))
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item).put(update_item).delete(delete_item))
        .route("/whoami", get(whoami))
        .route("/query", get(echo_query))
        .route("/slow", get(slow))
        .route("/upload", post(upload))
        .route("/download", get(download))
        .route("/broken", get(broken))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    let items = db.read().await;
    Json(items.values().cloned().collect())
}

async fn create_item(
    State(db): State<Db>,
    Json(input): Json<CreateItem>,
) -> (StatusCode, Json<Item>) {
    let item = Item {
        id: Uuid::new_v4(),
        name: input.name,
        in_stock: input.in_stock,
    };
    db.write().await.insert(item.id, item.clone());
    (StatusCode::CREATED, Json(item))
}

async fn get_item(State(db): State<Db>, Path(id): Path<Uuid>) -> ApiResult<Json<Item>> {
    let items = db.read().await;
    items.get(&id).cloned().map(Json).ok_or_else(not_found)
}

async fn update_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateItem>,
) -> ApiResult<Json<Item>> {
    let mut items = db.write().await;
    let item = items.get_mut(&id).ok_or_else(not_found)?;
    if let Some(name) = input.name {
        item.name = name;
    }
    if let Some(in_stock) = input.in_stock {
        item.in_stock = in_stock;
    }
    Ok(Json(item.clone()))
}

async fn delete_item(State(db): State<Db>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    let mut items = db.write().await;
    items
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(not_found)
}

/// Echo the `Authorization` header and every `x-*` header.
async fn whoami(headers: HeaderMap) -> Json<Value> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let custom: HashMap<String, String> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-"))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    Json(json!({ "authorization": authorization, "headers": custom }))
}

async fn echo_query(Query(pairs): Query<Vec<(String, String)>>) -> Json<Vec<(String, String)>> {
    Json(pairs)
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(SLOW_DELAY).await;
    Json(json!({ "done": true }))
}

/// Reply with `<field>:<file name>:<size>` for every received part.
async fn upload(mut multipart: Multipart) -> ApiResult<String> {
    let bad_request =
        |e: axum::extract::multipart::MultipartError| (StatusCode::BAD_REQUEST, Json(json!({ "message": e.body_text() })));

    let mut received = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(bad_request)?;
        received.push(format!("{name}:{file_name}:{}", bytes.len()));
    }
    if received.is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(json!({ "message": "no parts" }))));
    }
    Ok(received.join(","))
}

async fn download() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        DOWNLOAD_BYTES,
    )
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "database exploded")
}
