use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::PipelineSettings;
use crate::validation::ValidatorSettings;

/// Application-level constants
pub const APP_NAME: &str = "GDAIP";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Model used for requirement extraction, rule and code generation.
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat-v3-0324:free";
/// Model used for per-batch transaction verdicts.
pub const DEFAULT_ANOMALY_MODEL: &str = "cognitivecomputations/dolphin3.0-r1-mistral-24b:free";
pub const DEFAULT_TITLE: &str = "Banking Compliance App";

/// Get the application data directory (~/GDAIP/).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Directory `/api/process` may read `file_path` documents from.
pub fn default_documents_dir() -> PathBuf {
    app_data_dir().join("documents")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "gdaip=info,gdaip_lib=info,tower_http=info"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Runtime configuration, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub anomaly_model: String,
    pub referer: Option<String>,
    pub title: String,
    pub request_timeout_secs: u64,
    pub min_call_interval_ms: u64,
    pub max_retries: usize,
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub documents_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub summary_chunk_chars: usize,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub max_pdf_pages: usize,
    pub max_upload_bytes: usize,
    pub contamination: f64,
    pub high_risk_countries: Vec<String>,
    pub high_value_threshold: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            anomaly_model: DEFAULT_ANOMALY_MODEL.to_string(),
            referer: None,
            title: DEFAULT_TITLE.to_string(),
            request_timeout_secs: 120,
            min_call_interval_ms: 1000,
            max_retries: 2,
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origin: "http://localhost:3000".to_string(),
            documents_dir: default_documents_dir(),
            chunk_size: 2000,
            chunk_overlap: 200,
            summary_chunk_chars: 3000,
            batch_size: 10,
            max_concurrency: 4,
            max_pdf_pages: 50,
            max_upload_bytes: 25 * 1024 * 1024,
            contamination: 0.1,
            high_risk_countries: vec!["DE".into(), "US".into(), "UK".into()],
            high_value_threshold: 5000.0,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present; unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let config = Self {
            api_key: get_var("OPENROUTER_API_KEY").filter(|k| !k.trim().is_empty()),
            base_url: get_var("GDAIP_BASE_URL").unwrap_or(defaults.base_url),
            model: get_var("GDAIP_MODEL").unwrap_or(defaults.model),
            anomaly_model: get_var("GDAIP_ANOMALY_MODEL").unwrap_or(defaults.anomaly_model),
            referer: get_var("GDAIP_REFERER"),
            title: get_var("GDAIP_TITLE").unwrap_or(defaults.title),
            request_timeout_secs: parse_var("GDAIP_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            min_call_interval_ms: parse_var(
                "GDAIP_MIN_CALL_INTERVAL_MS",
                defaults.min_call_interval_ms,
            )?,
            max_retries: parse_var("GDAIP_MAX_RETRIES", defaults.max_retries)?,
            host: get_var("GDAIP_HOST").unwrap_or(defaults.host),
            port: parse_var("GDAIP_PORT", defaults.port)?,
            cors_origin: get_var("GDAIP_CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            documents_dir: get_var("GDAIP_DOCUMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.documents_dir),
            chunk_size: parse_var("GDAIP_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_var("GDAIP_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            summary_chunk_chars: parse_var(
                "GDAIP_SUMMARY_CHUNK_CHARS",
                defaults.summary_chunk_chars,
            )?,
            batch_size: parse_var("GDAIP_BATCH_SIZE", defaults.batch_size)?,
            max_concurrency: parse_var("GDAIP_MAX_CONCURRENCY", defaults.max_concurrency)?,
            max_pdf_pages: parse_var("GDAIP_MAX_PDF_PAGES", defaults.max_pdf_pages)?,
            max_upload_bytes: parse_var("GDAIP_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            contamination: parse_var("GDAIP_CONTAMINATION", defaults.contamination)?,
            high_risk_countries: get_var("GDAIP_HIGH_RISK_COUNTRIES")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.high_risk_countries),
            high_value_threshold: parse_var(
                "GDAIP_HIGH_VALUE_THRESHOLD",
                defaults.high_value_threshold,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(invalid("GDAIP_CHUNK_SIZE", "must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(invalid(
                "GDAIP_CHUNK_OVERLAP",
                "must be smaller than GDAIP_CHUNK_SIZE",
            ));
        }
        if self.batch_size == 0 {
            return Err(invalid("GDAIP_BATCH_SIZE", "must be greater than 0"));
        }
        if !(0.0..0.5).contains(&self.contamination) || self.contamination == 0.0 {
            return Err(invalid("GDAIP_CONTAMINATION", "must be in (0, 0.5)"));
        }
        if !valid_cors_origin(&self.cors_origin) {
            return Err(invalid(
                "GDAIP_CORS_ORIGIN",
                "must be `*` or an http(s) origin such as http://localhost:3000",
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            model: self.model.clone(),
            anomaly_model: self.anomaly_model.clone(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            summary_chunk_chars: self.summary_chunk_chars,
            batch_size: self.batch_size,
            max_concurrency: self.max_concurrency.max(1),
            max_retries: self.max_retries,
            max_pdf_pages: self.max_pdf_pages,
        }
    }

    pub fn validator_settings(&self) -> ValidatorSettings {
        ValidatorSettings {
            contamination: self.contamination,
            high_risk_countries: self.high_risk_countries.clone(),
            high_value_threshold: self.high_value_threshold,
            ..ValidatorSettings::default()
        }
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// `*`, or a scheme-and-host origin with no path and no whitespace.
fn valid_cors_origin(origin: &str) -> bool {
    if origin == "*" {
        return true;
    }
    let rest = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"));
    match rest {
        Some(host) => {
            !host.is_empty()
                && !host.contains('/')
                && !host.chars().any(|c| c.is_whitespace() || c.is_control())
        }
        None => false,
    }
}

fn get_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_var<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_var(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
