use crate::core::errors::ConfigError;
use crate::services::recognition::SignLetter;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
    /// Request body limit; photos arrive base64-inflated inside JSON
    pub max_body_bytes: usize,
}

/// Model configuration
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    /// Number of ONNX sessions (controls inference parallelism)
    pub session_pool_size: usize,
    pub intra_threads: usize,
    /// `None` means automatic provider selection
    pub inference_backend: Option<String>,
}

/// Verdict delivery configuration
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// `None` disables delivery
    pub url: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

/// Scratch storage configuration
#[derive(Debug, Clone)]
pub struct ScratchConfig {
    pub dir: PathBuf,
}

/// Validator service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub sink: SinkConfig,
    pub scratch: ScratchConfig,
}

const MAX_SINK_RETRIES: u32 = 10;

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        let sink_url = env::var("VERDICT_SINK_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5050/receive".to_string());
        let sink_url = Some(sink_url.trim().to_string()).filter(|s| !s.is_empty());

        Self {
            server: ServerConfig {
                port: env_or("SERVER_PORT", 5053),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level: log_level_from_env(),
                max_body_bytes: env_or("MAX_BODY_BYTES", 16 * 1024 * 1024),
            },
            model: ModelConfig {
                model_path: env::var("MODEL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("models/sign_classifier.onnx")),
                session_pool_size: env_or("ONNX_POOL_SIZE", std::cmp::max(num_cpus::get() / 2, 1)),
                intra_threads: env_or("ONNX_INTRA_THREADS", 1),
                inference_backend: env::var("INFERENCE_BACKEND")
                    .ok()
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty() && s != "auto"),
            },
            sink: SinkConfig {
                url: sink_url,
                timeout: Duration::from_millis(env_or("SINK_TIMEOUT_MS", 3000)),
                connect_timeout: Duration::from_millis(env_or("SINK_CONNECT_TIMEOUT_MS", 1000)),
                max_retries: env_or("SINK_MAX_RETRIES", 2),
                backoff_base: Duration::from_millis(env_or("SINK_BACKOFF_BASE_MS", 200)),
            },
            scratch: ScratchConfig {
                dir: env::var("SCRATCH_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| env::temp_dir().join("sign-validator")),
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref url) = self.sink.url {
            reqwest::Url::parse(url).map_err(|e| ConfigError::InvalidSinkUrl {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        }

        if self.sink.timeout.is_zero() {
            return Err(ConfigError::MustBePositive { name: "SINK_TIMEOUT_MS" });
        }
        if self.sink.connect_timeout.is_zero() {
            return Err(ConfigError::MustBePositive { name: "SINK_CONNECT_TIMEOUT_MS" });
        }
        if self.sink.max_retries > MAX_SINK_RETRIES {
            return Err(ConfigError::TooManyRetries {
                max: MAX_SINK_RETRIES,
                got: self.sink.max_retries,
            });
        }

        if self.model.session_pool_size == 0 {
            return Err(ConfigError::MustBePositive { name: "ONNX_POOL_SIZE" });
        }
        if self.model.intra_threads == 0 {
            return Err(ConfigError::MustBePositive { name: "ONNX_INTRA_THREADS" });
        }
        if let Some(ref backend) = self.model.inference_backend {
            if !matches!(backend.as_str(), "cpu" | "cuda") {
                return Err(ConfigError::UnknownBackend(backend.clone()));
            }
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::MustBePositive { name: "MAX_BODY_BYTES" });
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }
}

/// Configuration of the sink/sender companion service
#[derive(Debug, Clone)]
pub struct SinkServiceConfig {
    pub host: String,
    pub port: u16,
    pub log_level: Level,
    /// Where `/send` posts the sample photo
    pub validator_url: String,
    pub sample_image: PathBuf,
    pub sample_letter: SignLetter,
    pub request_timeout: Duration,
}

impl SinkServiceConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let validator_url = env::var("VALIDATOR_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5053/validate".to_string());
        reqwest::Url::parse(&validator_url).map_err(|e| ConfigError::InvalidValidatorUrl {
            url: validator_url.clone(),
            reason: e.to_string(),
        })?;

        let letter = env::var("SAMPLE_LETTER").unwrap_or_else(|_| "K".to_string());
        let sample_letter = SignLetter::parse(&letter)
            .ok_or_else(|| ConfigError::InvalidSampleLetter(letter.clone()))?;

        let config = Self {
            host: env::var("SINK_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("SINK_PORT", 5050),
            log_level: log_level_from_env(),
            validator_url,
            sample_image: env::var("SAMPLE_IMAGE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("TestImg.jpg")),
            sample_letter,
            request_timeout: Duration::from_millis(env_or("VALIDATOR_TIMEOUT_MS", 30_000)),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::MustBePositive { name: "VALIDATOR_TIMEOUT_MS" });
        }
        Ok(())
    }
}

/// Parse an environment variable, falling back to `default` when unset or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn log_level_from_env() -> Level {
    env::var("LOG_LEVEL")
        .ok()
        .and_then(|s| match s.to_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        })
        .unwrap_or(Level::INFO)
}

/// Lowercase level name for EnvFilter directives
pub fn level_directive(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            server: ServerConfig {
                port: 5053,
                host: "127.0.0.1".to_string(),
                log_level: Level::INFO,
                max_body_bytes: 1024,
            },
            model: ModelConfig {
                model_path: PathBuf::from("models/sign_classifier.onnx"),
                session_pool_size: 2,
                intra_threads: 1,
                inference_backend: None,
            },
            sink: SinkConfig {
                url: Some("http://127.0.0.1:5050/receive".to_string()),
                timeout: Duration::from_millis(500),
                connect_timeout: Duration::from_millis(100),
                max_retries: 2,
                backoff_base: Duration::from_millis(10),
            },
            scratch: ScratchConfig {
                dir: env::temp_dir(),
            },
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_sink_url() {
        let mut config = sample();
        config.sink.url = Some("not a url".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSinkUrl { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_timeout_and_pool() {
        let mut config = sample();
        config.sink.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.model.session_pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let mut config = sample();
        config.model.inference_backend = Some("tpu".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::UnknownBackend(_))));
    }

    #[test]
    fn test_retry_cap() {
        let mut config = sample();
        config.sink.max_retries = MAX_SINK_RETRIES + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyRetries { .. })
        ));
    }

    #[test]
    fn test_sink_service_rejects_zero_timeout() {
        let mut config = SinkServiceConfig {
            host: "127.0.0.1".to_string(),
            port: 5050,
            log_level: Level::INFO,
            validator_url: "http://127.0.0.1:5053/validate".to_string(),
            sample_image: PathBuf::from("TestImg.jpg"),
            sample_letter: SignLetter::parse("K").unwrap(),
            request_timeout: Duration::from_millis(30_000),
        };
        assert!(config.validate().is_ok());

        config.request_timeout = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MustBePositive { name: "VALIDATOR_TIMEOUT_MS" })
        ));
    }
}
