use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use vitrine_core::AdminCredentials;
use vitrine_server::{build_router, ApiConfig, AppState};

const BOUNDARY: &str = "X-VITRINE-TEST-BOUNDARY";

async fn spawn_server(tmp: &TempDir) -> std::net::SocketAddr {
    let api = ApiConfig {
        catalog_root: tmp.path().to_path_buf(),
        regen_program: "sh".to_string(),
        regen_args: vec!["-c".to_string(), "echo regenerated".to_string()],
        ..ApiConfig::default()
    };
    let state = AppState::new(api, AdminCredentials::parse("admin:admin123"));
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

async fn send_request(
    addr: std::net::SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: &[u8],
) -> (u16, String, Vec<u8>) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    req.push_str(&format!("content-length: {}\r\n\r\n", body.len()));
    let mut raw = req.into_bytes();
    raw.extend_from_slice(body);
    stream.write_all(&raw).await.expect("write request");
    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .expect("read response");
    let split = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("http response must have separator");
    let head = String::from_utf8_lossy(&response[..split]).into_owned();
    let body = response[split + 4..].to_vec();
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    (status, head, body)
}

async fn send_json(
    addr: std::net::SocketAddr,
    method: &str,
    path: &str,
    cookie: Option<&str>,
    payload: &Value,
) -> (u16, String, Value) {
    let body = serde_json::to_vec(payload).expect("encode payload");
    let mut headers = vec![("content-type", "application/json")];
    if let Some(cookie) = cookie {
        headers.push(("cookie", cookie));
    }
    let (status, head, raw) = send_request(addr, method, path, &headers, &body).await;
    let json = serde_json::from_slice(&raw).unwrap_or(Value::Null);
    (status, head, json)
}

fn session_cookie_from(head: &str) -> String {
    head.lines()
        .find_map(|line| line.strip_prefix("set-cookie: "))
        .expect("set-cookie header present")
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

async fn login(addr: std::net::SocketAddr) -> String {
    let (status, head, body) = send_json(
        addr,
        "POST",
        "/api/login",
        None,
        &json!({"username": "admin", "password": "admin123"}),
    )
    .await;
    assert_eq!(status, 200, "login failed: {body}");
    session_cookie_from(&head)
}

fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = image::ImageBuffer::from_pixel(width, height, image::Rgb([120u8, 30, 200]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

fn multipart_body(fields: &[(&str, &str)], filename: &str, image: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in fields {
        out.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\ncontent-disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    out.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\ncontent-disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\ncontent-type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    out.extend_from_slice(image);
    out.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    out
}

async fn upload_product(
    addr: std::net::SocketAddr,
    cookie: &str,
    category: &str,
    name: &str,
) -> Value {
    let body = multipart_body(
        &[("category", category), ("productName", name)],
        "upload.png",
        &png_fixture(800, 600),
    );
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
    let (status, _, raw) = send_request(
        addr,
        "POST",
        "/api/add-product",
        &[("content-type", &content_type), ("cookie", cookie)],
        &body,
    )
    .await;
    let json: Value = serde_json::from_slice(&raw).expect("upload response json");
    assert_eq!(status, 200, "upload failed: {json}");
    json
}

fn audit_actions(tmp: &TempDir) -> Vec<String> {
    let raw = std::fs::read(tmp.path().join("audit_logs.json")).expect("audit file");
    let entries: Vec<Value> = serde_json::from_slice(&raw).expect("audit json");
    entries
        .iter()
        .filter_map(|e| e.get("action").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn login_logout_and_auth_status_flow() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;

    let (status, _, body) = send_json(
        addr,
        "POST",
        "/api/login",
        None,
        &json!({"username": "admin", "password": "wrong"}),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "Unauthorized");

    let (status, _, body) = send_json(
        addr,
        "POST",
        "/api/login",
        None,
        &json!({"password": "admin123"}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["details"]["field"], "username");

    let cookie = login(addr).await;

    let (status, _, body) = send_json(addr, "GET", "/api/auth-status", Some(&cookie), &json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["isAdmin"], true);

    let (status, head, body) = send_json(addr, "POST", "/api/logout", Some(&cookie), &json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(head.contains("Max-Age=0"));

    let (status, _, body) = send_json(addr, "GET", "/api/auth-status", Some(&cookie), &json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["isAdmin"], false);

    let (status, _, _) = send_json(addr, "POST", "/api/logout", None, &json!({})).await;
    assert_eq!(status, 401);

    let actions = audit_actions(&tmp);
    assert!(actions.contains(&"LOGIN".to_string()));
    assert!(actions.contains(&"LOGIN_FALHA".to_string()));
    assert!(actions.contains(&"LOGOUT".to_string()));
}

#[tokio::test]
async fn login_rejects_blank_credentials_without_auditing() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;

    let (status, _, body) = send_json(
        addr,
        "POST",
        "/api/login",
        None,
        &json!({"username": "admin", "password": ""}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["details"]["field"], "password");

    let (status, _, body) = send_json(
        addr,
        "POST",
        "/api/login",
        None,
        &json!({"username": "  ", "password": "admin123"}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["details"]["field"], "username");

    // Validation failures are not login attempts; nothing is audited.
    assert!(!tmp.path().join("audit_logs.json").exists());
}

#[tokio::test]
async fn admin_routes_reject_anonymous_requests_without_side_effects() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;

    let (status, _, body) = send_json(
        addr,
        "POST",
        "/api/create-category",
        None,
        &json!({"categoryName": "furniture"}),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "Unauthorized");
    assert!(!tmp.path().join("furniture").exists());
    assert!(!tmp.path().join("audit_logs.json").exists());

    let (status, _, _) = send_json(addr, "GET", "/api/audit-logs", None, &json!({})).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn create_category_then_duplicate_is_rejected() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;
    let cookie = login(addr).await;

    let (status, _, body) = send_json(
        addr,
        "POST",
        "/api/create-category",
        Some(&cookie),
        &json!({"categoryName": "furniture", "subcategoryName": "chairs"}),
    )
    .await;
    assert_eq!(status, 200, "create failed: {body}");
    assert_eq!(body["success"], true);
    assert!(tmp.path().join("furniture/chairs").is_dir());

    let (status, _, body) = send_json(
        addr,
        "POST",
        "/api/create-category",
        Some(&cookie),
        &json!({"categoryName": "furniture", "subcategoryName": "chairs"}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "Conflict");

    assert!(audit_actions(&tmp).contains(&"CRIAR_CATEGORIA".to_string()));
}

#[tokio::test]
async fn add_product_writes_image_and_square_thumbnail() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;
    let cookie = login(addr).await;

    let response = upload_product(addr, &cookie, "furniture", "Chair").await;
    assert_eq!(response["imagePath"], "furniture/Chair.png");
    assert_eq!(response["needsReload"], true);

    assert!(tmp.path().join("furniture/Chair.png").is_file());
    let thumb = tmp.path().join(".thumbnails/furniture/Chair.jpg");
    assert!(thumb.is_file());
    let (w, h) = image::image_dimensions(&thumb).expect("thumbnail dimensions");
    assert_eq!((w, h), (400, 400));

    assert_eq!(audit_actions(&tmp)[0], "ADICIONAR_PRODUTO");
}

#[tokio::test]
async fn add_product_rejects_non_image_uploads() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;
    let cookie = login(addr).await;

    let body = format!(
        "--{BOUNDARY}\r\ncontent-disposition: form-data; name=\"category\"\r\n\r\nfurniture\r\n--{BOUNDARY}\r\ncontent-disposition: form-data; name=\"productName\"\r\n\r\nChair\r\n--{BOUNDARY}\r\ncontent-disposition: form-data; name=\"image\"; filename=\"nope.txt\"\r\ncontent-type: text/plain\r\n\r\nnot an image\r\n--{BOUNDARY}--\r\n"
    )
    .into_bytes();
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
    let (status, _, raw) = send_request(
        addr,
        "POST",
        "/api/add-product",
        &[("content-type", &content_type), ("cookie", &cookie)],
        &body,
    )
    .await;
    let json: Value = serde_json::from_slice(&raw).expect("error json");
    assert_eq!(status, 400);
    assert_eq!(json["error"]["code"], "ValidationFailed");
    assert!(!tmp.path().join("furniture").exists());
}

#[tokio::test]
async fn rename_moves_product_and_cleans_empty_directories() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;
    let cookie = login(addr).await;
    upload_product(addr, &cookie, "furniture", "Chair").await;

    let (status, _, body) = send_json(
        addr,
        "PUT",
        "/api/rename-product",
        Some(&cookie),
        &json!({
            "imagePath": "furniture/Chair.png",
            "newName": "Throne",
            "newCategory": "decor",
        }),
    )
    .await;
    assert_eq!(status, 200, "rename failed: {body}");
    assert_eq!(body["message"], "Produto movido e renomeado com sucesso!");

    assert!(tmp.path().join("decor/Throne.png").is_file());
    assert!(tmp.path().join(".thumbnails/decor/Throne.jpg").is_file());
    // Source directories were left empty, so the reconciler removed them.
    assert!(!tmp.path().join("furniture").exists());
    assert!(!tmp.path().join(".thumbnails/furniture").exists());

    assert_eq!(audit_actions(&tmp)[0], "MOVER_PRODUTO");
}

#[tokio::test]
async fn rename_in_place_keeps_category_and_reports_rename() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;
    let cookie = login(addr).await;
    upload_product(addr, &cookie, "furniture", "Chair").await;

    let (status, _, body) = send_json(
        addr,
        "PUT",
        "/api/rename-product",
        Some(&cookie),
        &json!({"imagePath": "furniture/Chair.png", "newName": "Armchair"}),
    )
    .await;
    assert_eq!(status, 200, "rename failed: {body}");
    assert_eq!(body["message"], "Produto renomeado com sucesso!");
    assert!(tmp.path().join("furniture/Armchair.png").is_file());
    assert_eq!(audit_actions(&tmp)[0], "RENOMEAR_PRODUTO");
}

#[tokio::test]
async fn rename_collision_and_missing_source_map_to_400_and_404() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;
    let cookie = login(addr).await;
    upload_product(addr, &cookie, "furniture", "Chair").await;
    upload_product(addr, &cookie, "furniture", "Table").await;

    let (status, _, body) = send_json(
        addr,
        "PUT",
        "/api/rename-product",
        Some(&cookie),
        &json!({"imagePath": "furniture/Chair.png", "newName": "Table"}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "Conflict");
    // Collision must leave both files untouched.
    assert!(tmp.path().join("furniture/Chair.png").is_file());
    assert!(tmp.path().join("furniture/Table.png").is_file());

    let (status, _, body) = send_json(
        addr,
        "PUT",
        "/api/rename-product",
        Some(&cookie),
        &json!({"imagePath": "furniture/Ghost.png", "newName": "Anything"}),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NotFound");
}

#[tokio::test]
async fn delete_product_removes_thumbnail_and_second_delete_is_404() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;
    let cookie = login(addr).await;
    upload_product(addr, &cookie, "furniture", "Chair").await;

    let (status, _, body) = send_json(
        addr,
        "DELETE",
        "/api/delete-product",
        Some(&cookie),
        &json!({"imagePath": "furniture/Chair.png"}),
    )
    .await;
    assert_eq!(status, 200, "delete failed: {body}");
    assert!(!tmp.path().join("furniture/Chair.png").exists());
    assert!(!tmp.path().join(".thumbnails/furniture/Chair.jpg").exists());
    // Deleting the last product never deletes the category itself.
    assert!(tmp.path().join("furniture").is_dir());
    assert!(tmp.path().join(".thumbnails/furniture").is_dir());
    assert_eq!(audit_actions(&tmp)[0], "EXCLUIR_PRODUTO");

    let (status, _, body) = send_json(
        addr,
        "DELETE",
        "/api/delete-product",
        Some(&cookie),
        &json!({"imagePath": "furniture/Chair.png"}),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NotFound");
}

#[tokio::test]
async fn audit_logs_endpoint_pages_newest_first() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;
    let cookie = login(addr).await;

    for name in ["alpha", "beta", "gamma"] {
        let (status, _, _) = send_json(
            addr,
            "POST",
            "/api/create-category",
            Some(&cookie),
            &json!({"categoryName": name}),
        )
        .await;
        assert_eq!(status, 200);
    }

    let (status, _, body) =
        send_json(addr, "GET", "/api/audit-logs?limit=2", Some(&cookie), &json!({})).await;
    assert_eq!(status, 200);
    let logs = body["logs"].as_array().expect("logs array");
    assert_eq!(logs.len(), 2);
    // 1 login + 3 category creations.
    assert_eq!(body["total"], 4);
    assert_eq!(logs[0]["action"], "CRIAR_CATEGORIA");
    assert_eq!(logs[0]["details"]["categoria"], "gamma");
    assert_eq!(logs[1]["details"]["categoria"], "beta");
}

#[tokio::test]
async fn regenerate_html_waits_for_the_script_and_returns_output() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;
    let cookie = login(addr).await;

    let (status, _, body) =
        send_json(addr, "POST", "/api/regenerate-html", Some(&cookie), &json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["output"].as_str().map(str::trim), Some("regenerated"));
    assert_eq!(audit_actions(&tmp)[0], "REGENERAR_HTML");
}

#[tokio::test]
async fn static_serving_decodes_encoded_paths_and_hides_the_audit_log() {
    let tmp = tempdir().expect("tempdir");
    let addr = spawn_server(&tmp).await;
    let cookie = login(addr).await;

    std::fs::create_dir_all(tmp.path().join("furniture")).expect("mkdir");
    std::fs::write(tmp.path().join("furniture/My Chair.jpg"), b"jpeg bytes").expect("write image");
    std::fs::write(tmp.path().join("index.html"), b"<html>catalog</html>").expect("write html");
    std::fs::write(tmp.path().join("about page.html"), b"<html>about</html>").expect("write html");

    let (status, head, body) =
        send_request(addr, "GET", "/furniture/My%20Chair.jpg", &[], &[]).await;
    assert_eq!(status, 200);
    assert!(head.contains("content-type: image/jpeg"));
    assert_eq!(body, b"jpeg bytes");

    let (status, head, _) = send_request(addr, "GET", "/", &[], &[]).await;
    assert_eq!(status, 200);
    assert!(head.contains("content-type: text/html"));

    // Non-image assets with encoded characters decode the same way.
    let (status, head, body) = send_request(addr, "GET", "/about%20page.html", &[], &[]).await;
    assert_eq!(status, 200);
    assert!(head.contains("content-type: text/html"));
    assert_eq!(body, b"<html>about</html>");

    let (status, _, _) = send_request(addr, "GET", "/furniture/Missing.jpg", &[], &[]).await;
    assert_eq!(status, 404);

    // The audit log lives in the catalog root but is never served.
    let (_, _, _) = send_json(
        addr,
        "POST",
        "/api/create-category",
        Some(&cookie),
        &json!({"categoryName": "decor"}),
    )
    .await;
    let (status, _, _) = send_request(addr, "GET", "/audit_logs.json", &[], &[]).await;
    assert_eq!(status, 404);
}
