use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub app_name: String,
    pub auth: AuthConfig,
    pub push: PushConfig,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base64 HS256 key signing session cookies.
    pub key: String,
    pub session_ttl: time::Duration,
    pub cookie_secure: bool,
    /// Reject a session cookie once its holder logged out.
    pub revocation: bool,
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub vapid_private_key: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: Option<String>,
    pub timeout: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
            timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: std::env::temp_dir(),
            app_name: "Backoffice".to_string(),
            auth: AuthConfig {
                key: "YmFja29mZmljZS10ZXN0LXNlc3Npb24ta2V5".to_string(),
                session_ttl: time::Duration::days(7),
                cookie_secure: false,
                revocation: true,
            },
            push: PushConfig::default(),
        }
    }
}
