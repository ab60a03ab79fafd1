use anyhow::{bail, Context, Result};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_CHARS: usize = 15_000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or blank.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    /// Maximum characters kept from each of the CV and vacancy texts.
    pub max_chars: usize,
    pub security_enabled: bool,
    pub jwt_secret: Option<String>,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let security_enabled = parse_or(&lookup, "SECURITY_ENABLED", true)?;

        let jwt_secret = non_blank(&lookup, "JWT_SECRET");
        if security_enabled && jwt_secret.is_none() {
            bail!("JWT_SECRET must be set when SECURITY_ENABLED is true");
        }

        let max_chars = parse_or(&lookup, "CVREVIEW_MAX_CHARS", DEFAULT_MAX_CHARS)?;
        if max_chars == 0 {
            bail!("CVREVIEW_MAX_CHARS must be greater than zero");
        }

        Ok(Config {
            llm_api_url: require(&lookup, "LLM_API_URL")?,
            llm_api_key: require(&lookup, "LLM_API_KEY")?,
            llm_model: non_blank(&lookup, "LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_timeout_secs: parse_or(&lookup, "LLM_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            max_chars,
            security_enabled,
            jwt_secret,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn require<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    non_blank(lookup, key)
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_blank(lookup, key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
