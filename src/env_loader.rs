use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::Path;

const ENV_PATHS: [&str; 3] = [".env", ".env.local", "../.env"];
const SECRET_KEYS: [&str; 1] = ["FLOW_UPLOAD_AUTH_TOKEN"];

/// Loads the first `.env` file found. Variables already set in the process win.
pub fn load_env() {
    let mut loaded_env = false;
    for path in ENV_PATHS.iter() {
        if Path::new(path).exists() {
            if let Err(e) = load_env_from_file(path) {
                warn!("Failed to load environment from {}: {}", path, e);
            } else {
                info!("Loaded environment variables from {}", path);
                loaded_env = true;
                break;
            }
        }
    }
    if !loaded_env {
        info!("No .env file found, using environment variables from system");
    }
}

/// Splits a `KEY=value` line, ignoring comments and blank lines. Surrounding quotes are stripped.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.starts_with('#') || trimmed.is_empty() {
        return None;
    }
    let idx = trimmed.find('=')?;
    let key = trimmed[..idx].trim();
    let value = trimmed[idx + 1..].trim().trim_matches('"');
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

pub fn load_env_from_file(file_path: &str) -> Result<()> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    info!("Attempting to load environment variables from: {}", file_path);
    let file = File::open(file_path)
        .with_context(|| format!("Could not open env file '{}'", file_path))?;
    let reader = BufReader::new(file);
    for line in reader.lines() {
        let line = line.context("Failed to read line from env file")?;
        if let Some((key, value)) = parse_line(&line) {
            if std::env::var(key).is_err() {
                std::env::set_var(key, value);
                debug!(
                    "Set env var from file: {} = {}",
                    key,
                    if SECRET_KEYS.contains(&key) { "[hidden]" } else { value }
                );
            }
        }
    }
    info!("Successfully processed env file: {}", file_path);
    Ok(())
}
