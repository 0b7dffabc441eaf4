use crate::http::response_contract::{api_error, api_error_response, ApiErrorCode};
use crate::AppState;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use serde_json::json;
use std::path::{Path, PathBuf};
use vitrine_core::paths::{is_image_extension, THUMBNAIL_DIR};

/// Serves files out of the catalog root. Product image paths arrive
/// URL-encoded from the generated HTML and get an explicit decoding pass
/// before the generic static fallback; traversal, hidden files (other than
/// the thumbnail mirror) and the audit log are refused.
pub(crate) async fn serve_catalog_file(State(state): State<AppState>, uri: Uri) -> Response {
    let raw = uri.path().trim_start_matches('/');
    if let Some(response) = serve_encoded_image(&state, raw).await {
        return response;
    }
    serve_static(&state, raw).await
}

/// Explicit route for URL-encoded image paths. Returns `None` when the
/// decoded path is not an image, handing over to the generic fallback.
async fn serve_encoded_image(state: &AppState, raw: &str) -> Option<Response> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    if !extension_of(&decoded).is_some_and(is_image_extension) {
        return None;
    }
    let Some(rel_path) = safe_rel_path(&decoded) else {
        return Some(not_found(&decoded));
    };
    Some(serve_file(state, &rel_path, &decoded).await)
}

async fn serve_static(state: &AppState, raw: &str) -> Response {
    let Ok(decoded) = percent_decode_str(raw).decode_utf8() else {
        return not_found(raw);
    };
    let rel = if decoded.is_empty() {
        "index.html"
    } else {
        decoded.as_ref()
    };
    let Some(rel_path) = safe_rel_path(rel) else {
        return not_found(rel);
    };
    serve_file(state, &rel_path, rel).await
}

fn extension_of(rel: &str) -> Option<&str> {
    Path::new(rel).extension().and_then(|e| e.to_str())
}

/// Validates a decoded relative path: no traversal, no empty segments, no
/// dotfiles except the thumbnail mirror itself, and never the audit log.
fn safe_rel_path(rel: &str) -> Option<PathBuf> {
    if rel == vitrine_core::audit::LOG_FILE {
        return None;
    }
    let mut out = PathBuf::new();
    for (i, segment) in rel.split('/').enumerate() {
        if segment.is_empty() || segment == "." || segment == ".." {
            return None;
        }
        if segment.starts_with('.') && !(i == 0 && segment == THUMBNAIL_DIR) {
            return None;
        }
        out.push(segment);
    }
    Some(out)
}

async fn serve_file(state: &AppState, rel_path: &Path, rel: &str) -> Response {
    let abs = state.tree.root().join(rel_path);
    match tokio::fs::read(&abs).await {
        Ok(bytes) => {
            let mut response = bytes.into_response();
            response.headers_mut().insert(
                "content-type",
                HeaderValue::from_static(content_type_for(rel)),
            );
            response
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => not_found(rel),
        Err(e) => api_error_response(api_error(
            ApiErrorCode::Internal,
            "failed to read file",
            json!({"path": rel, "message": e.to_string()}),
        )),
    }
}

fn not_found(rel: &str) -> Response {
    let err = api_error(ApiErrorCode::NotFound, "no such file", json!({"path": rel}));
    let status = StatusCode::NOT_FOUND;
    (status, axum::Json(json!({"error": err}))).into_response()
}

fn content_type_for(rel: &str) -> &'static str {
    match extension_of(rel)
        .map(str::to_ascii_lowercase)
        .as_deref()
        .unwrap_or("")
    {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_rel_path_refuses_traversal_and_hidden_files() {
        assert!(safe_rel_path("furniture/Chair.jpg").is_some());
        assert!(safe_rel_path(".thumbnails/furniture/Chair.jpg").is_some());
        assert!(safe_rel_path("../etc/passwd").is_none());
        assert!(safe_rel_path("furniture/../../etc/passwd").is_none());
        assert!(safe_rel_path("furniture//Chair.jpg").is_none());
        assert!(safe_rel_path(".git/config").is_none());
        assert!(safe_rel_path("furniture/.hidden.jpg").is_none());
        assert!(safe_rel_path("audit_logs.json").is_none());
    }

    #[test]
    fn content_types_cover_catalog_assets() {
        assert_eq!(content_type_for("a/b.JPG"), "image/jpeg");
        assert_eq!(content_type_for("index.html"), "text/html; charset=utf-8");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
