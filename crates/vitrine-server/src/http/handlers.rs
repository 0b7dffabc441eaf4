use crate::http::response_contract::{
    api_error, api_error_response, catalog_error_response, ApiErrorCode,
};
use crate::sessions;
use crate::AppState;
use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use vitrine_core::audit::actions;
use vitrine_core::{paths, CatalogError, RenameRequest};

/// Authenticated administrator, injected by [`require_admin`].
#[derive(Debug, Clone)]
pub(crate) struct AdminActor(pub String);

/// Gate for the admin routes: resolves the session cookie and rejects with
/// 401 before any handler (and therefore any mutation) runs.
pub(crate) async fn require_admin(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let session = match sessions::session_token(request.headers()) {
        Some(token) => state.sessions.get(&token).await,
        None => None,
    };
    match session {
        Some(session) if session.is_admin => {
            request.extensions_mut().insert(AdminActor(session.username));
            next.run(request).await
        }
        _ => api_error_response(api_error(
            ApiErrorCode::Unauthorized,
            "admin session required",
            json!({}),
        )),
    }
}

/// Runs a synchronous catalog mutation on the blocking pool, translating
/// both domain failures and join failures into ready-made responses.
async fn run_blocking<T, F>(f: F) -> Result<T, Response>
where
    F: FnOnce() -> Result<T, CatalogError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(catalog_error_response(&e)),
        Err(e) => Err(api_error_response(api_error(
            ApiErrorCode::Internal,
            "blocking task failed",
            json!({"message": e.to_string()}),
        ))),
    }
}

fn missing_field(name: &str) -> Response {
    api_error_response(api_error(
        ApiErrorCode::ValidationFailed,
        "missing required field",
        json!({"field": name}),
    ))
}

/// Empty strings from HTML forms mean "not supplied".
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Response {
    let Some(username) = non_empty(req.username) else {
        return missing_field("username");
    };
    let Some(password) = non_empty(req.password) else {
        return missing_field("password");
    };

    if !state.credentials.verify(&username, &password) {
        state.audit.lock().await.append(
            &username,
            actions::LOGIN_FALHA,
            json!({"usuario": username}),
        );
        return api_error_response(api_error(
            ApiErrorCode::Unauthorized,
            "invalid credentials",
            json!({}),
        ));
    }

    let token = state.sessions.create(&username).await;
    state
        .audit
        .lock()
        .await
        .append(&username, actions::LOGIN, json!({}));
    info!(username = %username, "admin login");

    let mut response = Json(json!({"success": true, "username": username})).into_response();
    if let Ok(value) = HeaderValue::from_str(&sessions::session_cookie(&token, state.api.session_ttl))
    {
        response.headers_mut().insert("set-cookie", value);
    }
    response
}

pub(crate) async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match sessions::session_token(&headers) {
        Some(token) => state.sessions.remove(&token).await,
        None => None,
    };
    let Some(session) = session else {
        return api_error_response(api_error(
            ApiErrorCode::Unauthorized,
            "no active session",
            json!({}),
        ));
    };
    state
        .audit
        .lock()
        .await
        .append(&session.username, actions::LOGOUT, json!({}));

    let mut response = Json(json!({"success": true})).into_response();
    if let Ok(value) = HeaderValue::from_str(&sessions::clear_session_cookie()) {
        response.headers_mut().insert("set-cookie", value);
    }
    response
}

pub(crate) async fn auth_status_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let is_admin = match sessions::session_token(&headers) {
        Some(token) => state
            .sessions
            .get(&token)
            .await
            .is_some_and(|session| session.is_admin),
        None => false,
    };
    Json(json!({"isAdmin": is_admin})).into_response()
}

pub(crate) async fn audit_logs_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(state.api.audit_logs_default_limit)
        .min(vitrine_core::audit::MAX_ENTRIES);
    let audit = state.audit.lock().await;
    let logs: Vec<_> = audit.head(limit).to_vec();
    Json(json!({"logs": logs, "total": audit.total()})).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateCategoryRequest {
    category_name: Option<String>,
    subcategory_name: Option<String>,
}

pub(crate) async fn create_category_handler(
    State(state): State<AppState>,
    Extension(AdminActor(actor)): Extension<AdminActor>,
    Json(req): Json<CreateCategoryRequest>,
) -> Response {
    let Some(category) = non_empty(req.category_name) else {
        return missing_field("categoryName");
    };
    let subcategory = non_empty(req.subcategory_name);

    let _guard = state.mutations.lock().await;
    let tree = Arc::clone(&state.tree);
    let (category_cl, subcategory_cl) = (category.clone(), subcategory.clone());
    let created = match run_blocking(move || {
        tree.create_category(&category_cl, subcategory_cl.as_deref())
    })
    .await
    {
        Ok(dir) => dir,
        Err(resp) => return resp,
    };

    state.audit.lock().await.append(
        &actor,
        actions::CRIAR_CATEGORIA,
        json!({"categoria": category, "subcategoria": subcategory}),
    );
    info!(path = %created.display(), "category created");
    Json(json!({"success": true, "path": created.display().to_string()})).into_response()
}

const ALLOWED_UPLOAD_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

fn extension_for_upload(filename: Option<&str>, content_type: &str) -> Option<String> {
    if let Some(ext) = filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
    {
        if paths::is_image_extension(ext) {
            return Some(ext.to_ascii_lowercase());
        }
    }
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg".to_string()),
        "image/png" => Some("png".to_string()),
        "image/gif" => Some("gif".to_string()),
        "image/webp" => Some("webp".to_string()),
        _ => None,
    }
}

pub(crate) async fn add_product_handler(
    State(state): State<AppState>,
    Extension(AdminActor(actor)): Extension<AdminActor>,
    mut multipart: Multipart,
) -> Response {
    let mut category = None;
    let mut subcategory = None;
    let mut product_name = None;
    let mut upload: Option<(Option<String>, String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return api_error_response(api_error(
                    ApiErrorCode::ValidationFailed,
                    "malformed multipart upload",
                    json!({"message": e.to_string()}),
                ))
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "category" => category = field.text().await.ok(),
            "subcategory" => subcategory = field.text().await.ok(),
            "productName" => product_name = field.text().await.ok(),
            "image" => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((filename, content_type, bytes.to_vec())),
                    Err(e) => {
                        return api_error_response(api_error(
                            ApiErrorCode::ValidationFailed,
                            "image upload failed",
                            json!({"message": e.to_string()}),
                        ))
                    }
                }
            }
            _ => {}
        }
    }

    let Some(category) = non_empty(category) else {
        return missing_field("category");
    };
    let subcategory = non_empty(subcategory);
    let Some(product_name) = non_empty(product_name) else {
        return missing_field("productName");
    };
    let Some((filename, content_type, bytes)) = upload else {
        return missing_field("image");
    };
    if !ALLOWED_UPLOAD_TYPES.contains(&content_type.as_str()) {
        return api_error_response(api_error(
            ApiErrorCode::ValidationFailed,
            "unsupported image type; use JPG, PNG, GIF or WEBP",
            json!({"contentType": content_type}),
        ));
    }
    let Some(ext) = extension_for_upload(filename.as_deref(), &content_type) else {
        return api_error_response(api_error(
            ApiErrorCode::ValidationFailed,
            "could not determine image extension",
            json!({"filename": filename}),
        ));
    };

    let _guard = state.mutations.lock().await;
    let tree = Arc::clone(&state.tree);
    let (category_cl, subcategory_cl, name_cl) =
        (category.clone(), subcategory.clone(), product_name.clone());
    let stored = match run_blocking(move || {
        tree.store_product(&category_cl, subcategory_cl.as_deref(), &name_cl, &ext, &bytes)
    })
    .await
    {
        Ok(stored) => stored,
        Err(resp) => return resp,
    };

    state.audit.lock().await.append(
        &actor,
        actions::ADICIONAR_PRODUTO,
        json!({
            "produto": product_name,
            "categoria": category,
            "subcategoria": subcategory,
            "arquivo": stored.path.rel_string(),
        }),
    );
    info!(
        product = %stored.path.rel_string(),
        thumbnail = stored.thumbnail_ok,
        "product added"
    );
    state.regen.trigger();
    Json(json!({
        "success": true,
        "imagePath": stored.path.rel_string(),
        "needsReload": true,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenameProductRequest {
    image_path: Option<String>,
    new_name: Option<String>,
    new_category: Option<String>,
    new_subcategory: Option<String>,
}

pub(crate) async fn rename_product_handler(
    State(state): State<AppState>,
    Extension(AdminActor(actor)): Extension<AdminActor>,
    Json(req): Json<RenameProductRequest>,
) -> Response {
    let Some(image_path) = non_empty(req.image_path) else {
        return missing_field("imagePath");
    };
    let Some(new_name) = non_empty(req.new_name) else {
        return missing_field("newName");
    };
    let request = RenameRequest {
        image_path,
        new_name,
        new_category: non_empty(req.new_category),
        new_subcategory: non_empty(req.new_subcategory),
    };

    let _guard = state.mutations.lock().await;
    let tree = Arc::clone(&state.tree);
    let request_cl = request.clone();
    let outcome = match run_blocking(move || tree.rename_product(&request_cl)).await {
        Ok(outcome) => outcome,
        Err(resp) => return resp,
    };

    let action = if outcome.category_changed {
        actions::MOVER_PRODUTO
    } else {
        actions::RENOMEAR_PRODUTO
    };
    state.audit.lock().await.append(
        &actor,
        action,
        json!({
            "de": outcome.source.rel_string(),
            "para": outcome.target.rel_string(),
        }),
    );
    state.regen.trigger();

    let message = if outcome.moved {
        "Produto movido e renomeado com sucesso!"
    } else {
        "Produto renomeado com sucesso!"
    };
    Json(json!({"success": true, "message": message, "needsReload": true})).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteProductRequest {
    image_path: Option<String>,
}

pub(crate) async fn delete_product_handler(
    State(state): State<AppState>,
    Extension(AdminActor(actor)): Extension<AdminActor>,
    Json(req): Json<DeleteProductRequest>,
) -> Response {
    let Some(image_path) = non_empty(req.image_path) else {
        return missing_field("imagePath");
    };

    let _guard = state.mutations.lock().await;
    let tree = Arc::clone(&state.tree);
    let rel = image_path.clone();
    let deleted = match run_blocking(move || tree.delete_product(&rel)).await {
        Ok(product) => product,
        Err(resp) => return resp,
    };

    state.audit.lock().await.append(
        &actor,
        actions::EXCLUIR_PRODUTO,
        json!({"produto": deleted.rel_string()}),
    );
    info!(product = %deleted.rel_string(), "product deleted");
    state.regen.trigger();
    Json(json!({"success": true, "needsReload": true})).into_response()
}

pub(crate) async fn regenerate_html_handler(
    State(state): State<AppState>,
    Extension(AdminActor(actor)): Extension<AdminActor>,
) -> Response {
    match state.regen.run().await {
        Ok(out) => {
            state
                .audit
                .lock()
                .await
                .append(&actor, actions::REGENERAR_HTML, json!({}));
            Json(json!({"success": true, "output": out.stdout})).into_response()
        }
        Err(e) => api_error_response(api_error(
            ApiErrorCode::Internal,
            "catalog regeneration failed",
            json!({"message": e}),
        )),
    }
}
