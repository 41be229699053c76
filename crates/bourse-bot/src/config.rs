//! Application configuration.
//!
//! Loaded from a TOML file layered with `BOURSE__SECTION__KEY` environment
//! overrides. Secrets never live in the file; see [`Secrets`].

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use bourse_api::ApiConfig;
use bourse_core::{AccountId, InstrumentMeta, DEFAULT_STARTING_CASH};
use bourse_executor::ExecutorConfig;
use bourse_oracle::{finnhub::DEFAULT_BASE_URL, OracleConfig};
use bourse_scheduler::{AgentProfile, SchedulerConfig};
use bourse_strategy::{Persona, ReasoningConfig, StrategyConfig, MAX_COOLDOWN_SECS};
use bourse_valuation::ValuationConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{AppError, AppResult};

/// Config file used when neither `--config` nor `BOURSE_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "BOURSE_CONFIG";

/// Upstream quote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// In-process prices seeded from the instrument table (paper runs).
    #[default]
    Static,
    /// Finnhub REST API; requires `FINNHUB_API_KEY`.
    Finnhub,
}

/// Market data provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    /// Provider request budget.
    #[serde(default = "default_rate_limit_per_sec")]
    pub rate_limit_per_sec: u32,
    /// HTTP timeout per provider request (ms).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_provider_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_rate_limit_per_sec() -> u32 {
    30
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: default_provider_base_url(),
            rate_limit_per_sec: default_rate_limit_per_sec(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Ledger provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Cash seeded into every new account.
    #[serde(default = "default_starting_cash")]
    pub starting_cash: Decimal,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

fn default_starting_cash() -> Decimal {
    DEFAULT_STARTING_CASH
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_cash: default_starting_cash(),
            executor: ExecutorConfig::default(),
        }
    }
}

/// Reasoning service endpoint. The API key comes from `REASONING_API_KEY`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasoningSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// HTTP timeout (ms); the engine's own deadline is `strategy.reasoning_timeout_ms`.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Decision audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Write decisions to daily JSON-lines files.
    #[serde(default = "default_audit_enabled")]
    pub audit_enabled: bool,
    #[serde(default = "default_audit_dir")]
    pub audit_dir: String,
    /// Records buffered before a flush.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_dir() -> String {
    "data/audit".to_string()
}

fn default_buffer_size() -> usize {
    50
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            audit_enabled: default_audit_enabled(),
            audit_dir: default_audit_dir(),
            buffer_size: default_buffer_size(),
        }
    }
}

/// One automated agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: AccountId,
    pub display_name: String,
    pub persona: Persona,
    /// Provision the account paused.
    #[serde(default)]
    pub paused: bool,
}

impl AgentConfig {
    pub fn profile(&self) -> AgentProfile {
        AgentProfile {
            account_id: self.id.clone(),
            display_name: self.display_name.clone(),
            persona: self.persona.clone(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub reasoning: ReasoningSection,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub valuation: ValuationConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub instruments: Vec<InstrumentMeta>,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

impl AppConfig {
    /// Config path: CLI argument, then `BOURSE_CONFIG`, then the default.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load from a specific file with environment overrides applied.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let file = config::File::from(Path::new(path))
            .format(config::FileFormat::Toml)
            .required(true);
        Self::build(file)
    }

    /// Load from TOML text with environment overrides applied.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        Self::build(config::File::from_str(content, config::FileFormat::Toml))
    }

    fn build<S>(source: S) -> AppResult<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(source)
            .add_source(
                config::Environment::with_prefix("BOURSE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-section consistency.
    pub fn validate(&self) -> AppResult<()> {
        if self.instruments.is_empty() {
            return Err(AppError::Config("at least one instrument is required".to_string()));
        }
        if self.ledger.starting_cash <= Decimal::ZERO {
            return Err(AppError::Config("ledger.starting_cash must be positive".to_string()));
        }
        if self.scheduler.cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(AppError::Config(format!(
                "scheduler.cooldown_secs must be at most {MAX_COOLDOWN_SECS}"
            )));
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if !seen.insert(&agent.id) {
                return Err(AppError::Config(format!("duplicate agent id {}", agent.id)));
            }
            agent.persona.validate()?;
        }
        Ok(())
    }

    pub fn agent_profiles(&self) -> Vec<AgentProfile> {
        self.agents.iter().map(AgentConfig::profile).collect()
    }

    /// Reasoning client settings: env key and defaults, overlaid with this file's values.
    pub fn reasoning_config(&self, api_key: Zeroizing<String>) -> ReasoningConfig {
        let mut config = ReasoningConfig::from_env();
        config.api_key = api_key;
        if let Some(url) = &self.reasoning.base_url {
            config.base_url.clone_from(url);
        }
        if let Some(model) = &self.reasoning.model {
            config.model.clone_from(model);
        }
        if let Some(ms) = self.reasoning.timeout_ms {
            config.timeout = Duration::from_millis(ms);
        }
        config
    }
}

/// Credentials read from the environment, zeroed on drop.
#[derive(Default)]
pub struct Secrets {
    /// `FINNHUB_API_KEY`
    pub finnhub_api_key: Zeroizing<String>,
    /// `REASONING_API_KEY`
    pub reasoning_api_key: Zeroizing<String>,
    /// `BOURSE_CRON_SECRET`
    pub cron_secret: Option<Zeroizing<String>>,
}

impl Secrets {
    pub fn from_env() -> Self {
        let read = |name: &str| Zeroizing::new(std::env::var(name).unwrap_or_default());
        Self {
            finnhub_api_key: read("FINNHUB_API_KEY"),
            reasoning_api_key: read("REASONING_API_KEY"),
            cron_secret: std::env::var("BOURSE_CRON_SECRET").ok().map(Zeroizing::new),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("finnhub_api_key", &(!self.finnhub_api_key.is_empty()))
            .field("reasoning_api_key", &(!self.reasoning_api_key.is_empty()))
            .field("cron_secret", &self.cron_secret.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_strategy::{NarrationMode, StrategyKind};
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
[ledger]
starting_cash = 250000

[strategy]
narration = "advisory"

[scheduler]
cooldown_secs = 600
pacing_delay_ms = 0

[[instruments]]
id = "acme"
ticker = "ACME"
name = "Acme Corp"
sector = "Industrials"
initial_price = "100"

[[agents]]
id = "bot-momo"
display_name = "Momo"

[agents.persona]
name = "Momo"
strategy = "momentum"
risk = "high"
budget = { min_pct = "1", max_pct = "5" }
cooldown_secs = 1800
"#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.ledger.starting_cash, dec!(250000));
        assert_eq!(config.strategy.narration, NarrationMode::Advisory);
        assert_eq!(config.scheduler.cooldown_secs, 600);
        assert_eq!(config.scheduler.agent_timeout_ms, 30_000);
        assert_eq!(config.market_data.provider, ProviderKind::Static);
        assert_eq!(config.market_data.rate_limit_per_sec, 30);
        assert_eq!(config.instruments.len(), 1);

        let agent = &config.agents[0];
        assert_eq!(agent.persona.strategy, StrategyKind::Momentum);
        assert_eq!(agent.persona.cooldown_secs, Some(1800));
        assert!(!agent.paused);
    }

    #[test]
    fn test_requires_instruments() {
        let err = AppConfig::from_toml_str("[ledger]\nstarting_cash = 10\n").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_rejects_duplicate_agents() {
        let doubled = format!(
            "{SAMPLE}\n{}",
            &SAMPLE[SAMPLE.find("[[agents]]").unwrap()..]
        );
        let err = AppConfig::from_toml_str(&doubled).unwrap_err();
        assert!(err.to_string().contains("duplicate agent id"));
    }

    #[test]
    fn test_rejects_unbounded_cooldowns() {
        let scheduler = SAMPLE.replace("cooldown_secs = 600", "cooldown_secs = 100000000000000000");
        let err = AppConfig::from_toml_str(&scheduler).unwrap_err();
        assert!(err.to_string().contains("scheduler.cooldown_secs"));

        let persona = SAMPLE.replace("cooldown_secs = 1800", "cooldown_secs = 100000000000000000");
        let err = AppConfig::from_toml_str(&persona).unwrap_err();
        assert!(matches!(err, AppError::Strategy(_)));
    }

    #[test]
    fn test_reasoning_overlay() {
        let mut config = AppConfig::default();
        config.reasoning.model = Some("local-model".to_string());
        config.reasoning.timeout_ms = Some(1_500);
        let reasoning = config.reasoning_config(Zeroizing::new("k".to_string()));
        assert_eq!(reasoning.model, "local-model");
        assert_eq!(reasoning.timeout, Duration::from_millis(1_500));
        assert!(reasoning.is_configured());
    }

    #[test]
    fn test_secrets_debug_hides_values() {
        let secrets = Secrets {
            finnhub_api_key: Zeroizing::new("fh-key".to_string()),
            ..Secrets::default()
        };
        let rendered = format!("{secrets:?}");
        assert!(!rendered.contains("fh-key"));
    }
}
