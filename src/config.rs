use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_ODATA_BASE_URL: &str = "https://sapes5.sapdevcenter.com/sap/opu/odata/IWBEP";

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const SAP_USER_ENV: &str = "SAP_USER";
pub const SAP_PASS_ENV: &str = "SAP_PASS";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Fixed credentials for the two upstream services, read once at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    pub openai_api_key: String,
    pub sap_user: String,
    pub sap_password: String,
}

impl Credentials {
    pub fn new(openai_api_key: &str, sap_user: &str, sap_password: &str) -> Self {
        Self {
            openai_api_key: openai_api_key.to_string(),
            sap_user: sap_user.to_string(),
            sap_password: sap_password.to_string(),
        }
    }

    /// Unset variables become empty strings; the upstream services reject them at call time.
    pub fn from_env() -> Self {
        let read = |name: &str| match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Environment variable {} is not set", name);
                String::new()
            }
        };
        Self {
            openai_api_key: read(OPENAI_API_KEY_ENV),
            sap_user: read(SAP_USER_ENV),
            sap_password: read(SAP_PASS_ENV),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |s: &str| if s.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("Credentials")
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("sap_user", &self.sap_user)
            .field("sap_password", &mask(&self.sap_password))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Base of the OpenAI-compatible API; `/chat/completions` is appended.
    pub llm_base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Base of the OData service path; `/{view}/{entity}?{filter}` is appended.
    pub odata_base_url: String,
    pub request_timeout_secs: u64,
    pub rate_limit_quota: u32,
    pub rate_limit_window_secs: u64,
    pub max_payload_size: usize,
    pub prompt_template_path: Option<PathBuf>,
    pub credentials: Credentials,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            odata_base_url: DEFAULT_ODATA_BASE_URL.to_string(),
            request_timeout_secs: 60,
            rate_limit_quota: 10,
            rate_limit_window_secs: 60,
            max_payload_size: 1024 * 1024,
            prompt_template_path: None,
            credentials: Credentials::default(),
        }
    }
}

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &RelayConfig) -> ConfigResult<()> {
        Self::validate_url("llm_base_url", &config.llm_base_url)?;
        Self::validate_url("odata_base_url", &config.odata_base_url)?;

        if config.model.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "model".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&config.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "temperature".to_string(),
                value: config.temperature.to_string(),
                reason: "Must be between 0.0 and 2.0".to_string(),
            });
        }

        if config.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        if config.rate_limit_quota == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit_quota".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        if config.rate_limit_window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit_window_secs".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        if config.max_payload_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_payload_size".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        if let Some(path) = &config.prompt_template_path {
            if !path.is_file() {
                return Err(ConfigError::InvalidValue {
                    field: "prompt_template_path".to_string(),
                    value: path.display().to_string(),
                    reason: "File does not exist".to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_url(field: &str, url: &str) -> ConfigResult<()> {
        if url.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: field.to_string(),
            });
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                value: url.to_string(),
                reason: "URL must start with http:// or https://".to_string(),
            });
        }
        if url.ends_with('/') {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                value: url.to_string(),
                reason: "URL must not end with '/'".to_string(),
            });
        }
        Ok(())
    }
}
