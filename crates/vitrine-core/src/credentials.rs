use tracing::warn;

/// Injected administrator credential list. Built once at startup and passed
/// by reference into the request path; never process-wide state.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    users: Vec<(String, String)>,
}

impl AdminCredentials {
    /// Parses the `user:pass,user:pass` environment format, skipping
    /// malformed pairs.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let users = raw
            .split(',')
            .filter_map(|pair| {
                let (user, pass) = pair.trim().split_once(':')?;
                if user.is_empty() || pass.is_empty() {
                    warn!("skipping malformed admin credential pair");
                    return None;
                }
                Some((user.to_string(), pass.to_string()))
            })
            .collect();
        Self { users }
    }

    /// Hardcoded fallback used when no credentials are configured. Do not
    /// ship with these; the startup warning exists for a reason.
    #[must_use]
    pub fn fallback() -> Self {
        warn!("VITRINE_ADMIN_USERS unset; using built-in fallback credentials");
        Self {
            users: vec![
                ("admin".to_string(), "admin123".to_string()),
                ("gerente".to_string(), "vitrine2024".to_string()),
            ],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.users
            .iter()
            .any(|(user, pass)| user == username && pass == password)
    }
}
