use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, sample_item, Echo, Item, UploadReport};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_reports_query_headers_and_body() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/echo?a=1&b=two+words")
                .header(http::header::ACCEPT, "application/xml")
                .header(http::header::AUTHORIZATION, "Bearer t")
                .body("payload".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.raw_query.as_deref(), Some("a=1&b=two+words"));
    assert_eq!(
        echo.query,
        vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "two words".to_string()),
        ]
    );
    assert_eq!(echo.accept.as_deref(), Some("application/xml"));
    assert_eq!(echo.authorization.as_deref(), Some("Bearer t"));
    assert_eq!(echo.body, "payload");
}

#[tokio::test]
async fn echo_without_query() {
    let resp = app().oneshot(get("/echo")).await.unwrap();
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "GET");
    assert!(echo.raw_query.is_none());
    assert!(echo.query.is_empty());
}

// --- status ---

#[tokio::test]
async fn status_route_uses_the_requested_code() {
    let resp = app().oneshot(get("/status/418")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["status"], 418);
}

// --- content types ---

#[tokio::test]
async fn xml_route_sends_xml() {
    let resp = app().oneshot(get("/xml")).await.unwrap();
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/xml");
    let bytes = body_bytes(resp).await;
    let item: Item = quick_xml::de::from_reader(bytes.as_ref()).unwrap();
    assert_eq!(item, sample_item());
}

#[tokio::test]
async fn untyped_route_has_no_content_type() {
    let resp = app().oneshot(get("/untyped")).await.unwrap();
    assert!(resp.headers().get(http::header::CONTENT_TYPE).is_none());
    let item: Item = body_json(resp).await;
    assert_eq!(item, sample_item());
}

#[tokio::test]
async fn text_route_is_plain_text() {
    let resp = app().oneshot(get("/text")).await.unwrap();
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "text/plain");
}

// --- upload ---

#[tokio::test]
async fn upload_reports_fields_and_files() {
    let body = concat!(
        "--XX\r\n",
        "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
        "hello\r\n",
        "--XX\r\n",
        "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n",
        "Content-Type: text/plain\r\n\r\n",
        "abcdef\r\n",
        "--XX--\r\n",
    );
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(http::header::CONTENT_TYPE, "multipart/form-data; boundary=XX")
                .body(body.to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let report: UploadReport = body_json(resp).await;
    assert_eq!(report.fields.len(), 1);
    assert_eq!(report.fields[0].name, "title");
    assert_eq!(report.fields[0].value, "hello");
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].file_name, "a.txt");
    assert_eq!(report.files[0].size, 6);
}

// --- items ---

#[tokio::test]
async fn create_item_returns_201() {
    let resp = app()
        .oneshot(json_request("POST", "/items", r#"{"name":"bolt","quantity":3}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let item: Item = body_json(resp).await;
    assert_eq!(item.name, "bolt");
    assert_eq!(item.quantity, 3);
}

#[tokio::test]
async fn create_item_from_xml_answers_in_xml() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/items")
                .header(http::header::CONTENT_TYPE, "application/xml")
                .header(http::header::ACCEPT, "application/xml")
                .body("<NewItem><name>nut</name><quantity>8</quantity></NewItem>".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = body_bytes(resp).await;
    let item: Item = quick_xml::de::from_reader(bytes.as_ref()).unwrap();
    assert_eq!(item.name, "nut");
    assert_eq!(item.quantity, 8);
}

#[tokio::test]
async fn create_item_malformed_json_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/items", r#"{"not_name":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn get_item_not_found() {
    let resp = app()
        .oneshot(get("/items/00000000-0000-0000-0000-000000000000"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_item_bad_uuid_returns_400() {
    let resp = app().oneshot(get("/items/not-a-uuid")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_item_not_found_has_a_body() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/items/00000000-0000-0000-0000-000000000000")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let bytes = body_bytes(resp).await;
    assert!(String::from_utf8_lossy(&bytes).contains("no item"));
}

#[tokio::test]
async fn crud_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/items", r#"{"name":"gear","quantity":1}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Item = body_json(resp).await;

    let uri = format!("/items/{}", created.id);
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("PUT", &uri, r#"{"name":"gear","quantity":5}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Item = body_json(resp).await;
    assert_eq!(updated.quantity, 5);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/items"))
        .await
        .unwrap();
    let items: Vec<Item> = body_json(resp).await;
    assert_eq!(items, vec![updated]);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get(&uri))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
