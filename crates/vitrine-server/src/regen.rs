use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

/// Outcome of one regeneration run.
#[derive(Debug)]
pub struct RegenOutput {
    pub stdout: String,
}

/// Invokes the external catalog-HTML-generation script with the catalog root
/// as working directory. The script is an opaque collaborator: exit 0 with
/// stdout means success, anything else is failure.
pub struct CatalogRegenerator {
    program: String,
    args: Vec<String>,
    workdir: PathBuf,
}

impl CatalogRegenerator {
    #[must_use]
    pub fn new(program: String, args: Vec<String>, workdir: PathBuf) -> Self {
        Self {
            program,
            args,
            workdir,
        }
    }

    /// Runs the script and waits for it, returning its stdout on success.
    pub async fn run(&self) -> Result<RegenOutput, String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.workdir)
            .output()
            .await
            .map_err(|e| format!("failed to spawn {}: {e}", self.program))?;
        if output.status.success() {
            Ok(RegenOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ))
        }
    }

    /// Fire-and-forget regeneration: a detached task whose completion only
    /// affects logging, never a response already in flight.
    pub fn trigger(self: &Arc<Self>) {
        let me = Arc::clone(self);
        tokio::spawn(async move {
            match me.run().await {
                Ok(out) => info!(
                    stdout_bytes = out.stdout.len(),
                    "catalog regeneration finished"
                ),
                Err(e) => warn!("catalog regeneration failed: {e}"),
            }
        });
    }
}
