use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8443";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for talking to the validation endpoint and writing exports.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
    pub export_dir: PathBuf,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_token: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            export_dir: PathBuf::from("."),
        }
    }
}

/// Builds the upload configuration from environment variables, falling back to defaults.
pub fn from_env() -> UploadConfig {
    from_lookup(|key| std::env::var(key).ok())
}

fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> UploadConfig {
    let defaults = UploadConfig::default();

    let base_url = lookup("FLOW_UPLOAD_BASE_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or(defaults.base_url);
    let auth_token = lookup("FLOW_UPLOAD_AUTH_TOKEN").filter(|t| !t.is_empty());
    let request_timeout = match lookup("FLOW_UPLOAD_TIMEOUT_SECS") {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                warn!("Ignoring invalid FLOW_UPLOAD_TIMEOUT_SECS '{}', using {}s", raw, DEFAULT_TIMEOUT_SECS);
                defaults.request_timeout
            }
        },
        None => defaults.request_timeout,
    };
    let export_dir = lookup("FLOW_UPLOAD_EXPORT_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.export_dir);

    info!(
        "Upload config: BaseUrl={}, Timeout={:?}, ExportDir={:?}, Token={}",
        base_url,
        request_timeout,
        export_dir,
        if auth_token.is_some() { "[set]" } else { "[none]" }
    );

    UploadConfig {
        base_url,
        auth_token,
        request_timeout,
        export_dir,
    }
}
