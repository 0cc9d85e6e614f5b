//! Test server for the httpkit client.
//!
//! Routes:
//! - `ANY /echo` reports what arrived: method, raw and parsed query, selected
//!   headers and the body.
//! - `ANY /status/{code}` answers with that status and a small JSON body.
//! - `GET /json`, `/xml`, `/text`, `/untyped` return the sample item with
//!   different content types (`/untyped` sends no `Content-Type` at all).
//! - `POST /upload` parses `multipart/form-data` and reports every part.
//! - `/items` CRUD, accepting and producing JSON or XML.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Path, Query, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
}

/// What `/echo` saw.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub raw_query: Option<String>,
    pub query: Vec<(String, String)>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
    pub body: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UploadedField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: usize,
}

/// What `/upload` parsed.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UploadReport {
    pub fields: Vec<UploadedField>,
    pub files: Vec<UploadedFile>,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Item>>>;

pub fn sample_item() -> Item {
    Item {
        id: Uuid::nil(),
        name: "sample".to_string(),
        quantity: 42,
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/json", get(json_item))
        .route("/xml", get(xml_item))
        .route("/text", get(text_item))
        .route("/untyped", get(untyped_item))
        .route("/upload", post(upload))
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item).put(update_item).delete(delete_item))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn wants_xml(headers: &HeaderMap) -> bool {
    header_string(headers, header::ACCEPT).is_some_and(|a| a.contains("xml"))
}

fn is_xml(headers: &HeaderMap) -> bool {
    header_string(headers, header::CONTENT_TYPE).is_some_and(|c| c.contains("xml"))
}

fn xml_response<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match quick_xml::se::to_string(value) {
        Ok(text) => (status, [(header::CONTENT_TYPE, "application/xml")], text).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

fn item_response(headers: &HeaderMap, status: StatusCode, item: &Item) -> Response {
    if wants_xml(headers) {
        xml_response(status, item)
    } else {
        (status, Json(item.clone())).into_response()
    }
}

async fn echo(
    method: Method,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Echo> {
    Json(Echo {
        method: method.to_string(),
        raw_query,
        query,
        accept: header_string(&headers, header::ACCEPT),
        content_type: header_string(&headers, header::CONTENT_TYPE),
        content_length: header_string(&headers, header::CONTENT_LENGTH),
        authorization: header_string(&headers, header::AUTHORIZATION),
        user_agent: header_string(&headers, header::USER_AGENT),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(serde_json::json!({ "status": code, "name": "from-status" })),
    )
        .into_response()
}

async fn json_item() -> Json<Item> {
    Json(sample_item())
}

async fn xml_item() -> Response {
    xml_response(StatusCode::OK, &sample_item())
}

async fn text_item() -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain")],
        r#"{"id":"00000000-0000-0000-0000-000000000000","name":"text","quantity":1}"#,
    )
        .into_response()
}

async fn untyped_item() -> Response {
    let body = serde_json::to_vec(&sample_item()).unwrap_or_default();
    let mut response = Response::new(Body::from(body));
    response.headers_mut().remove(header::CONTENT_TYPE);
    response
}

async fn upload(mut multipart: Multipart) -> Result<Json<UploadReport>, (StatusCode, String)> {
    let mut report = UploadReport::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        match file_name {
            Some(file_name) => report.files.push(UploadedFile {
                name,
                file_name,
                content_type,
                size: data.len(),
            }),
            None => report.fields.push(UploadedField {
                name,
                value: String::from_utf8_lossy(&data).into_owned(),
            }),
        }
    }
    Ok(Json(report))
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    let items = db.read().await;
    Json(items.values().cloned().collect())
}

fn parse_new_item(headers: &HeaderMap, body: &[u8]) -> Result<NewItem, (StatusCode, String)> {
    let parsed = if is_xml(headers) {
        quick_xml::de::from_reader(body).map_err(|e| e.to_string())
    } else {
        serde_json::from_slice(body).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e))
}

async fn create_item(
    State(db): State<Db>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, (StatusCode, String)> {
    let input = parse_new_item(&headers, &body)?;
    let item = Item {
        id: Uuid::new_v4(),
        name: input.name,
        quantity: input.quantity,
    };
    db.write().await.insert(item.id, item.clone());
    Ok(item_response(&headers, StatusCode::CREATED, &item))
}

async fn get_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    let items = db.read().await;
    let item = items.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(item_response(&headers, StatusCode::OK, item))
}

async fn update_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, (StatusCode, String)> {
    let input = parse_new_item(&headers, &body)?;
    let mut items = db.write().await;
    let item = items
        .get_mut(&id)
        .ok_or((StatusCode::NOT_FOUND, format!("no item {id}")))?;
    item.name = input.name;
    item.quantity = input.quantity;
    Ok(item_response(&headers, StatusCode::OK, item))
}

async fn delete_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut items = db.write().await;
    items
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or((StatusCode::NOT_FOUND, format!("no item {id}")))
}
