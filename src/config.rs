use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub analysis: AnalysisConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

/// OpenAI-compatible backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key; when empty the service runs with the mock parser
    pub api_key: String,
    pub model: String,
    /// Base URL of the chat completion endpoint, injectable for
    /// compatible backends and test servers
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Per-attempt round-trip bound in seconds
    pub timeout_seconds: u64,
    /// Additional attempts after the first on transient failures
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub redis_url: String,
    pub ttl_seconds: u64,
    pub enabled: bool,
}

/// Pipeline tuning knobs shared by fusion and the analyzer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Below this heuristic confidence the LLM tier is consulted
    pub heuristic_confidence_threshold: f64,
    pub use_llm_fallback: bool,
    pub default_time_minutes: i64,
    pub achievement_default_weight: i64,
    pub pii_redaction_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone)]
#[command(name = "mnemo")]
#[command(version, about = "Mnemo - Diary Action Analysis Service")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Redis URL for the result cache (overrides config file)
    #[arg(long, value_name = "URL")]
    pub redis_url: Option<String>,

    /// Logging level (overrides config file, e.g., "info,mnemo=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// OpenAI-compatible API base URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub openai_base_url: Option<String>,

    /// Enable/disable the result cache (overrides config file)
    #[arg(long, value_name = "BOOL")]
    pub cache_enabled: Option<bool>,

    /// Enable/disable the metrics endpoint (overrides config file)
    #[arg(long, value_name = "BOOL")]
    pub metrics_enabled: Option<bool>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file support
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_SERVER_HOST / APP_SERVER_PORT
    /// - APP_LOG_LEVEL
    /// - APP_DATABASE_URL
    /// - APP_OPENAI_API_KEY / APP_OPENAI_MODEL / APP_OPENAI_BASE_URL
    /// - APP_OPENAI_MAX_TOKENS / APP_OPENAI_TEMPERATURE
    /// - APP_LLM_TIMEOUT_SECONDS / APP_LLM_MAX_RETRIES
    /// - APP_REDIS_URL / APP_CACHE_TTL_SECONDS / APP_CACHE_ENABLED
    /// - APP_HEURISTIC_CONFIDENCE_THRESHOLD / APP_USE_LLM_FALLBACK
    /// - APP_DEFAULT_TIME_MINUTES / APP_ACHIEVEMENT_DEFAULT_WEIGHT
    /// - APP_METRICS_ENABLED / APP_PII_REDACTION_ENABLED
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Ok(port) = std::env::var("APP_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
                tracing::info!("Override server.port from env: {}", self.server.port);
            }
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(db_url) = std::env::var("APP_DATABASE_URL") {
            self.database.url = db_url;
            tracing::info!("Override database.url from env");
        }

        if let Ok(api_key) = std::env::var("APP_OPENAI_API_KEY") {
            self.llm.api_key = api_key;
            tracing::info!("Override llm.api_key from env");
        }

        if let Ok(model) = std::env::var("APP_OPENAI_MODEL") {
            self.llm.model = model;
            tracing::info!("Override llm.model from env: {}", self.llm.model);
        }

        if let Ok(base_url) = std::env::var("APP_OPENAI_BASE_URL") {
            self.llm.base_url = base_url;
            tracing::info!("Override llm.base_url from env: {}", self.llm.base_url);
        }

        if let Ok(max_tokens) = std::env::var("APP_OPENAI_MAX_TOKENS") {
            if let Ok(val) = max_tokens.parse() {
                self.llm.max_tokens = val;
                tracing::info!("Override llm.max_tokens from env: {}", self.llm.max_tokens);
            }
        }

        if let Ok(temperature) = std::env::var("APP_OPENAI_TEMPERATURE") {
            if let Ok(val) = temperature.parse() {
                self.llm.temperature = val;
                tracing::info!("Override llm.temperature from env: {}", self.llm.temperature);
            }
        }

        if let Ok(timeout) = std::env::var("APP_LLM_TIMEOUT_SECONDS") {
            if let Ok(val) = timeout.parse() {
                self.llm.timeout_seconds = val;
                tracing::info!("Override llm.timeout_seconds from env: {}", self.llm.timeout_seconds);
            }
        }

        if let Ok(retries) = std::env::var("APP_LLM_MAX_RETRIES") {
            if let Ok(val) = retries.parse() {
                self.llm.max_retries = val;
                tracing::info!("Override llm.max_retries from env: {}", self.llm.max_retries);
            }
        }

        if let Ok(redis_url) = std::env::var("APP_REDIS_URL") {
            self.cache.redis_url = redis_url;
            tracing::info!("Override cache.redis_url from env");
        }

        if let Ok(ttl) = std::env::var("APP_CACHE_TTL_SECONDS") {
            if let Ok(val) = ttl.parse() {
                self.cache.ttl_seconds = val;
                tracing::info!("Override cache.ttl_seconds from env: {}", self.cache.ttl_seconds);
            }
        }

        if let Ok(enabled) = std::env::var("APP_CACHE_ENABLED") {
            if let Ok(val) = enabled.parse() {
                self.cache.enabled = val;
                tracing::info!("Override cache.enabled from env: {}", self.cache.enabled);
            }
        }

        if let Ok(threshold) = std::env::var("APP_HEURISTIC_CONFIDENCE_THRESHOLD") {
            if let Ok(val) = threshold.parse() {
                self.analysis.heuristic_confidence_threshold = val;
                tracing::info!(
                    "Override analysis.heuristic_confidence_threshold from env: {}",
                    self.analysis.heuristic_confidence_threshold
                );
            }
        }

        if let Ok(fallback) = std::env::var("APP_USE_LLM_FALLBACK") {
            if let Ok(val) = fallback.parse() {
                self.analysis.use_llm_fallback = val;
                tracing::info!(
                    "Override analysis.use_llm_fallback from env: {}",
                    self.analysis.use_llm_fallback
                );
            }
        }

        if let Ok(minutes) = std::env::var("APP_DEFAULT_TIME_MINUTES") {
            if let Ok(val) = minutes.parse() {
                self.analysis.default_time_minutes = val;
                tracing::info!(
                    "Override analysis.default_time_minutes from env: {}",
                    self.analysis.default_time_minutes
                );
            }
        }

        if let Ok(weight) = std::env::var("APP_ACHIEVEMENT_DEFAULT_WEIGHT") {
            if let Ok(val) = weight.parse() {
                self.analysis.achievement_default_weight = val;
                tracing::info!(
                    "Override analysis.achievement_default_weight from env: {}",
                    self.analysis.achievement_default_weight
                );
            }
        }

        if let Ok(enabled) = std::env::var("APP_METRICS_ENABLED") {
            if let Ok(val) = enabled.parse() {
                self.metrics.enabled = val;
                tracing::info!("Override metrics.enabled from env: {}", self.metrics.enabled);
            }
        }

        if let Ok(enabled) = std::env::var("APP_PII_REDACTION_ENABLED") {
            if let Ok(val) = enabled.parse() {
                self.analysis.pii_redaction_enabled = val;
                tracing::info!(
                    "Override analysis.pii_redaction_enabled from env: {}",
                    self.analysis.pii_redaction_enabled
                );
            }
        }
    }

    /// Apply command line argument overrides (highest priority)
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
            tracing::info!("Override server.host from CLI: {}", self.server.host);
        }

        if let Some(port) = args.server_port {
            self.server.port = port;
            tracing::info!("Override server.port from CLI: {}", self.server.port);
        }

        if let Some(db_url) = &args.database_url {
            self.database.url = db_url.clone();
            tracing::info!("Override database.url from CLI");
        }

        if let Some(redis_url) = &args.redis_url {
            self.cache.redis_url = redis_url.clone();
            tracing::info!("Override cache.redis_url from CLI");
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(base_url) = &args.openai_base_url {
            self.llm.base_url = base_url.clone();
            tracing::info!("Override llm.base_url from CLI: {}", self.llm.base_url);
        }

        if let Some(enabled) = args.cache_enabled {
            self.cache.enabled = enabled;
            tracing::info!("Override cache.enabled from CLI: {}", self.cache.enabled);
        }

        if let Some(enabled) = args.metrics_enabled {
            self.metrics.enabled = enabled;
            tracing::info!("Override metrics.enabled from CLI: {}", self.metrics.enabled);
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if !(0.0..=1.0).contains(&self.analysis.heuristic_confidence_threshold) {
            anyhow::bail!("analysis.heuristic_confidence_threshold must be within [0, 1]");
        }

        if self.analysis.default_time_minutes < 0 {
            anyhow::bail!("analysis.default_time_minutes must be >= 0");
        }

        if self.analysis.achievement_default_weight < 0 {
            anyhow::bail!("analysis.achievement_default_weight must be >= 0");
        }

        if self.llm.timeout_seconds == 0 {
            anyhow::bail!("llm.timeout_seconds must be > 0");
        }

        if self.cache.enabled && self.cache.ttl_seconds == 0 {
            anyhow::bail!("cache.ttl_seconds must be > 0 when the cache is enabled");
        }

        if self.llm.api_key.is_empty() {
            tracing::warn!("No LLM API key configured, the mock parser will be used");
        }

        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,mnemo=debug".to_string(), file: None }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://data/mnemo.db".to_string() }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4-turbo-preview".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 2000,
            temperature: 0.3,
            timeout_seconds: 10,
            max_retries: 2,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        // 7 days
        Self { redis_url: "redis://localhost:6379/0".to_string(), ttl_seconds: 604_800, enabled: true }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            heuristic_confidence_threshold: 0.8,
            use_llm_fallback: true,
            default_time_minutes: 10,
            achievement_default_weight: 10,
            pii_redaction_enabled: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.analysis.heuristic_confidence_threshold, 0.8);
        assert_eq!(config.analysis.default_time_minutes, 10);
        assert_eq!(config.analysis.achievement_default_weight, 10);
        assert!(config.analysis.use_llm_fallback);
        assert!(config.analysis.pii_redaction_enabled);
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.llm.timeout_seconds, 10);
        assert_eq!(config.cache.ttl_seconds, 604_800);
    }

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.analysis.heuristic_confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let toml_src = r#"
            [server]
            port = 9000

            [analysis]
            use_llm_fallback = false
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(!config.analysis.use_llm_fallback);
        // untouched sections keep defaults
        assert_eq!(config.cache.ttl_seconds, 604_800);
        assert_eq!(config.llm.model, "gpt-4-turbo-preview");
    }
}
