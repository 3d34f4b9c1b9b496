use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// Cleaned secrets at or below this length are treated as absent.
const MIN_CREDENTIAL_LEN: usize = 10;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported vendors for the text model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAI => "openai",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
///
/// Credentials are stored only when they are valid; a missing or too-short
/// secret is `None` and the feature behind it degrades at request time.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub provider: Provider,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub text_model: String,
    pub heygen_api_key: Option<String>,
    pub heygen_avatar_id: Option<String>,
    pub heygen_voice_id: String,
    pub hf_api_token: Option<String>,
    pub pexels_api_key: Option<String>,
    pub min_request_interval: Duration,
    pub max_daily_requests: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let provider_str = std::env::var("TEXT_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = match provider_str.trim().to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "openai" => Provider::OpenAI,
            other => {
                return Err(ConfigError::InvalidValue(
                    "TEXT_PROVIDER".to_string(),
                    format!("'{}' is not one of gemini, openai", other),
                ));
            }
        };

        let text_model = secret("TEXT_MODEL").unwrap_or_else(|| "gemini-1.5-flash".to_string());
        let heygen_voice_id = secret("HEYGEN_VOICE_ID").unwrap_or_else(|| "en-US".to_string());

        let min_request_interval =
            Duration::from_millis(parse_number("MIN_REQUEST_INTERVAL_MS", 4000)?);
        let max_daily_requests = parse_number("MAX_DAILY_REQUESTS", 1400)?;

        Ok(Self {
            bind_address,
            log_level,
            provider,
            gemini_api_key: credential("GEMINI_API_KEY"),
            openai_api_key: credential("OPENAI_API_KEY"),
            text_model,
            heygen_api_key: credential("HEYGEN_API_KEY"),
            heygen_avatar_id: credential("HEYGEN_AVATAR_ID"),
            heygen_voice_id,
            hf_api_token: credential("HF_API_TOKEN"),
            pexels_api_key: credential("PEXELS_API_KEY"),
            min_request_interval,
            max_daily_requests,
        })
    }

    /// The key for the selected text provider, if it is valid.
    pub fn text_api_key(&self) -> Option<&str> {
        match self.provider {
            Provider::Gemini => self.gemini_api_key.as_deref(),
            Provider::OpenAI => self.openai_api_key.as_deref(),
        }
    }

    /// The avatar vendor needs both its key and an avatar identity.
    pub fn heygen_credentials(&self) -> Option<(&str, &str)> {
        self.heygen_api_key
            .as_deref()
            .zip(self.heygen_avatar_id.as_deref())
    }
}

/// Strips surrounding whitespace and every quote character from a secret.
pub fn clean_secret(raw: &str) -> String {
    raw.trim().replace(['\'', '"'], "")
}

fn secret(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| clean_secret(&raw))
        .filter(|v| !v.is_empty())
}

fn credential(name: &str) -> Option<String> {
    secret(name).filter(|v| v.len() > MIN_CREDENTIAL_LEN)
}

fn parse_number<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(name.to_string(), format!("'{}' is not a number", raw))
        }),
        Err(_) => Ok(default),
    }
}
