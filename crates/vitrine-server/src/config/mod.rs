use std::path::PathBuf;
use std::time::Duration;

/// Server-side knobs. Built from the environment in `main.rs`, handed to
/// `AppState` as a plain value; handlers never read the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base directory under which all category folders live.
    pub catalog_root: PathBuf,
    /// Upper bound for multipart uploads.
    pub max_upload_bytes: usize,
    /// Lifetime of an admin session cookie.
    pub session_ttl: Duration,
    /// Program invoked to regenerate the static catalog HTML.
    pub regen_program: String,
    pub regen_args: Vec<String>,
    /// Default page size for `/api/audit-logs` when `limit` is omitted.
    pub audit_logs_default_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            catalog_root: PathBuf::from("."),
            max_upload_bytes: 5 * 1024 * 1024,
            session_ttl: Duration::from_secs(24 * 60 * 60),
            regen_program: "python3".to_string(),
            regen_args: vec!["generate_catalog.py".to_string()],
            audit_logs_default_limit: 50,
        }
    }
}

pub fn validate_startup_config_contract(api: &ApiConfig) -> Result<(), String> {
    if api.max_upload_bytes == 0 {
        return Err("upload size limit must be > 0".to_string());
    }
    if api.session_ttl.is_zero() {
        return Err("session ttl must be > 0".to_string());
    }
    if api.regen_program.trim().is_empty() {
        return Err("regeneration program must not be empty".to_string());
    }
    if api.catalog_root.as_os_str().is_empty() {
        return Err("catalog root must not be empty".to_string());
    }
    Ok(())
}
