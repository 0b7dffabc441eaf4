#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vitrine_core::AdminCredentials;
use vitrine_server::{build_router, validate_startup_config_contract, ApiConfig, AppState};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

/// Reads `VITRINE_REGEN_COMMAND` as a whitespace-split command line,
/// defaulting to the bundled generator script.
fn env_regen_command() -> (String, Vec<String>) {
    let raw = env::var("VITRINE_REGEN_COMMAND")
        .unwrap_or_else(|_| "python3 generate_catalog.py".to_string());
    let mut parts = raw.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .unwrap_or_else(|| "python3".to_string());
    (program, parts.collect())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("VITRINE_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let bind_addr = env::var("VITRINE_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let catalog_root =
        PathBuf::from(env::var("VITRINE_CATALOG_ROOT").unwrap_or_else(|_| ".".to_string()));
    let (regen_program, regen_args) = env_regen_command();

    let api_cfg = ApiConfig {
        catalog_root,
        max_upload_bytes: env_usize("VITRINE_MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
        session_ttl: env_duration_ms("VITRINE_SESSION_TTL_MS", 24 * 60 * 60 * 1000),
        regen_program,
        regen_args,
        audit_logs_default_limit: env_usize("VITRINE_AUDIT_LOGS_DEFAULT_LIMIT", 50),
    };
    validate_startup_config_contract(&api_cfg)?;

    let credentials = match env::var("VITRINE_ADMIN_USERS") {
        Ok(raw) => {
            let parsed = AdminCredentials::parse(&raw);
            if parsed.is_empty() {
                warn!("VITRINE_ADMIN_USERS contained no valid entries; using fallback accounts");
                AdminCredentials::fallback()
            } else {
                parsed
            }
        }
        Err(_) => AdminCredentials::fallback(),
    };

    if !api_cfg.catalog_root.is_dir() {
        return Err(format!(
            "catalog root {} is not a directory",
            api_cfg.catalog_root.display()
        ));
    }

    let state = AppState::new(api_cfg, credentials);
    let app = build_router(state);

    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4().map_err(|e| format!("socket v4 failed: {e}"))?
    } else {
        tokio::net::TcpSocket::new_v6().map_err(|e| format!("socket v6 failed: {e}"))?
    };
    socket
        .set_reuseaddr(true)
        .map_err(|e| format!("set_reuseaddr failed: {e}"))?;
    socket.bind(addr).map_err(|e| format!("bind failed: {e}"))?;
    let listener: TcpListener = socket
        .listen(1024)
        .map_err(|e| format!("listen failed: {e}"))?;
    info!("vitrine-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(|e| format!("server failed: {e}"))
}
