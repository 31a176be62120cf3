use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::render::RenderStyle;

/// Column holding the business name in the profiling questionnaire export.
pub const DEFAULT_IDENTIFYING_FIELD: &str = "Business Name (pas de caractères spéciaux)";

const ARTIFACT_DIR_NAME: &str = "stratagem-artifacts";

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable is present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Fallback credential used when a request does not carry its own `api_key`.
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub generation_timeout: Duration,
    pub extraction_timeout: Duration,
    pub artifact_dir: PathBuf,
    /// `None` leaves expiry to the host's temp-storage policy.
    pub artifact_ttl: Option<Duration>,
    pub render_style: RenderStyle,
    pub prompt_templates_dir: Option<PathBuf>,
    pub identifying_field: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let ttl_secs: u64 = parse_env("ARTIFACT_TTL_SECS", 86_400)?;

        Ok(Config {
            port: parse_env("PORT", 8000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_api_base: optional_env("OPENAI_API_BASE")
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            generation_timeout: Duration::from_secs(parse_env("GENERATION_TIMEOUT_SECS", 120)?),
            extraction_timeout: Duration::from_secs(parse_env("EXTRACTION_TIMEOUT_SECS", 60)?),
            artifact_dir: optional_env("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_artifact_dir),
            artifact_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            render_style: parse_env("RENDER_STYLE", RenderStyle::Styled)?,
            prompt_templates_dir: optional_env("PROMPT_TEMPLATES_DIR").map(PathBuf::from),
            identifying_field: optional_env("IDENTIFYING_FIELD")
                .unwrap_or_else(|| DEFAULT_IDENTIFYING_FIELD.to_string()),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 50 * 1024 * 1024)?,
        })
    }
}

/// A directory of our own under the system temp dir, so the expiry sweep
/// never touches files written by other processes.
fn default_artifact_dir() -> PathBuf {
    std::env::temp_dir().join(ARTIFACT_DIR_NAME)
}

/// Returns the variable if set and non-blank.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
