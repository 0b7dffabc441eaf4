use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// The log never grows past this many entries; the oldest fall off the tail.
pub const MAX_ENTRIES: usize = 1000;

/// File name of the persisted log, stored in the catalog root.
pub const LOG_FILE: &str = "audit_logs.json";

/// Administrative action identifiers. The Portuguese vocabulary is
/// load-bearing: existing log consumers match on these strings.
pub mod actions {
    pub const LOGIN: &str = "LOGIN";
    pub const LOGIN_FALHA: &str = "LOGIN_FALHA";
    pub const LOGOUT: &str = "LOGOUT";
    pub const CRIAR_CATEGORIA: &str = "CRIAR_CATEGORIA";
    pub const ADICIONAR_PRODUTO: &str = "ADICIONAR_PRODUTO";
    pub const RENOMEAR_PRODUTO: &str = "RENOMEAR_PRODUTO";
    pub const MOVER_PRODUTO: &str = "MOVER_PRODUTO";
    pub const EXCLUIR_PRODUTO: &str = "EXCLUIR_PRODUTO";
    pub const REGENERAR_HTML: &str = "REGENERAR_HTML";
}

/// One immutable administrative action record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Epoch milliseconds at append time; doubles as an identifier.
    pub id: i64,
    /// RFC3339 timestamp.
    pub timestamp: String,
    /// Human-readable local time, `dd/mm/yyyy, HH:MM:SS`.
    pub date: String,
    pub username: String,
    pub action: String,
    pub details: Value,
}

/// Bounded, newest-first log of administrative actions, persisted as a JSON
/// array after every append. Callers serialize access (the server holds it
/// behind a mutex); this type itself is single-writer.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    /// Opens the log at `dir/audit_logs.json`, tolerating a missing or
    /// unparseable file (an unreadable log must never block the server).
    #[must_use]
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(LOG_FILE);
        let entries = match fs::read(&path) {
            Ok(raw) => match serde_json::from_slice::<Vec<AuditEntry>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), "audit log unparseable, starting fresh: {e}");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self { path, entries }
    }

    /// Appends at the head, truncates to the cap, and persists. Persistence
    /// failures are logged and swallowed; the in-memory log stays coherent.
    pub fn append(&mut self, username: &str, action: &str, details: Value) {
        let now = Utc::now();
        let entry = AuditEntry {
            id: now.timestamp_millis(),
            timestamp: now.to_rfc3339(),
            date: Local::now().format("%d/%m/%Y, %H:%M:%S").to_string(),
            username: username.to_string(),
            action: action.to_string(),
            details,
        };
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_ENTRIES);
        self.persist();
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Newest-first slice of at most `limit` entries.
    #[must_use]
    pub fn head(&self, limit: usize) -> &[AuditEntry] {
        &self.entries[..limit.min(self.entries.len())]
    }

    fn persist(&self) {
        match serde_json::to_vec_pretty(&self.entries) {
            Ok(bytes) => {
                if let Err(e) = fs::write(&self.path, bytes) {
                    warn!(path = %self.path.display(), "audit log write failed: {e}");
                }
            }
            Err(e) => warn!("audit log serialization failed: {e}"),
        }
    }
}
