//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. mission-control.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::Error;
use crate::routing::{AgentProfile, ExpertiseTable, ModelPricing, PriceTable};

/// Default config file looked up by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "mission-control.toml";

/// LLM Provider type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic Claude API
    #[default]
    Claude,
    /// OpenAI-compatible API
    OpenAi,
}

impl LlmProvider {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "openai" | "gemini" | "glm" => Self::OpenAi,
            _ => Self::Claude,
        }
    }
}

/// LLM configuration for the routing oracle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key; empty disables the oracle and routing falls back to the coordinator
    pub api_key: String,
    pub model: String,
    pub provider: LlmProvider,
    /// Base URL (optional, for custom endpoints)
    pub base_url: Option<String>,
    pub max_tokens: u64,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// USD per million tokens, keyed by model id
    pub pricing: BTreeMap<String, ModelPricing>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            provider: LlmProvider::Claude,
            base_url: None,
            max_tokens: 150,
            temperature: 0.1,
            timeout_secs: 30,
            pricing: PriceTable::default().into_map(),
        }
    }
}

impl LlmConfig {
    pub fn price_table(&self) -> PriceTable {
        PriceTable::from_map(self.pricing.clone())
    }
}

fn default_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

/// Routing configuration: roster, keyword table and spend ceiling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Agent key that receives unmatched and fallback traffic
    pub coordinator: String,
    /// Agent key returned by the expertise classifier when nothing matches
    pub fallback_agent: String,
    /// Key that denotes the human owner rather than an agent
    pub owner_key: Option<String>,
    /// Soft daily ceiling for router spend, USD
    pub daily_cost_limit: f64,
    pub agents: Vec<AgentProfile>,
    /// agent key → keywords
    pub expertise: BTreeMap<String, Vec<String>>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            coordinator: "main".to_string(),
            fallback_agent: "main".to_string(),
            owner_key: None,
            daily_cost_limit: 0.50,
            agents: AgentProfile::default_roster(),
            expertise: ExpertiseTable::default_keywords(),
        }
    }
}

impl RoutingConfig {
    pub fn expertise_table(&self) -> ExpertiseTable {
        ExpertiseTable::from_agent_keywords(&self.expertise, self.fallback_agent.clone())
    }
}

/// Outbound notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub telegram_bot_token: Option<String>,
    pub team_chat_id: Option<String>,
    /// Chat for completion/blocked alerts; falls back to the team chat
    pub owner_chat_id: Option<String>,
    /// Agent wake endpoint; `{session_key}` is substituted
    pub wake_url: Option<String>,
    pub workers: usize,
    pub queue_capacity: usize,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token: None,
            team_chat_id: None,
            owner_chat_id: None,
            wake_url: None,
            workers: 4,
            queue_capacity: 256,
            retries: 0,
            retry_delay_ms: 1_000,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Port for HTTP API server
    pub port: u16,

    /// Allowed CORS origins; `None` allows any origin
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            allowed_origins: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to SQLite database file
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "data/mission-control.db".to_string(),
        }
    }
}

/// スケジューラー設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// スケジューラーが有効かどうか
    pub enabled: bool,

    /// スケジュール設定ファイルパス
    pub config_path: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            config_path: None,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub routing: RoutingConfig,
    pub notifier: NotifierConfig,
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::with_capacity(value.len());
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 文字列から設定を読み込む (環境変数の上書きなし)
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded = Self::expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 設定ファイル内の `${VAR_NAME}` は環境変数の値に置換され、
    /// その後に環境変数で上書きされます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// デフォルトパスから設定を読み込む
    ///
    /// `./mission-control.toml` がなければ環境変数のみで構築します。
    pub fn load() -> crate::Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }
        Self::from_env()
    }

    /// Load configuration from environment variables on top of defaults
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// 環境変数で設定を上書きする
    fn apply_env_overrides(&mut self) {
        // LLM
        if let Some(api_key) = non_empty_env("LLM_API_KEY") {
            self.llm.api_key = api_key;
        }
        if let Some(model) = non_empty_env("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(provider) = non_empty_env("LLM_PROVIDER") {
            self.llm.provider = LlmProvider::parse(&provider);
        }
        if let Some(base_url) = non_empty_env("LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }

        // Store / API
        if let Some(path) = non_empty_env("DB_PATH") {
            self.store.db_path = path;
        }
        if let Some(port) = non_empty_env("API_PORT").and_then(|p| p.parse().ok()) {
            self.api.port = port;
        }
        if let Some(origins) = non_empty_env("API_ALLOWED_ORIGINS") {
            self.api.allowed_origins = Some(origins.split(',').map(|s| s.trim().to_string()).collect());
        }

        // Notifier
        if let Some(token) = non_empty_env("TELEGRAM_BOT_TOKEN") {
            self.notifier.telegram_bot_token = Some(token);
        }
        if let Some(chat) = non_empty_env("TELEGRAM_TEAM_CHAT_ID") {
            self.notifier.team_chat_id = Some(chat);
        }
        if let Some(chat) = non_empty_env("TELEGRAM_OWNER_CHAT_ID") {
            self.notifier.owner_chat_id = Some(chat);
        }
        if let Some(url) = non_empty_env("AGENT_WAKE_URL") {
            self.notifier.wake_url = Some(url);
        }

        // Routing
        if let Some(limit) = non_empty_env("ROUTER_DAILY_COST_LIMIT").and_then(|v| v.parse().ok()) {
            self.routing.daily_cost_limit = limit;
        }
        if let Some(owner) = non_empty_env("ROUTER_OWNER_KEY") {
            self.routing.owner_key = Some(owner.to_lowercase());
        }

        // Scheduler
        if let Some(enabled) = non_empty_env("SCHEDULE_ENABLED") {
            self.scheduler.enabled = enabled.to_lowercase() != "false";
        }
        if let Some(path) = non_empty_env("SCHEDULE_CONFIG_PATH") {
            self.scheduler.config_path = Some(path);
        }
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> crate::Result<()> {
        if self.routing.coordinator.trim().is_empty() {
            return Err(Error::Config("routing.coordinator must not be empty".to_string()));
        }
        if self.routing.fallback_agent.trim().is_empty() {
            return Err(Error::Config("routing.fallback_agent must not be empty".to_string()));
        }
        if self.routing.daily_cost_limit < 0.0 {
            return Err(Error::Config("routing.daily_cost_limit must not be negative".to_string()));
        }
        if self.notifier.workers == 0 {
            return Err(Error::Config("notifier.workers must be at least 1".to_string()));
        }
        if self.notifier.queue_capacity == 0 {
            return Err(Error::Config("notifier.queue_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.model, "claude-3-haiku-20240307");
        assert_eq!(config.llm.max_tokens, 150);
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.store.db_path, "data/mission-control.db");
        assert_eq!(config.routing.coordinator, "main");
        assert_eq!(config.routing.daily_cost_limit, 0.50);
        assert_eq!(config.routing.agents.len(), 6);
        assert!(config.scheduler.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_env_vars() {
        // テスト用環境変数を設定
        unsafe {
            std::env::set_var("MC_CONFIG_TEST_VAR", "test_value");
        }

        let result = Config::expand_env_vars("prefix_${MC_CONFIG_TEST_VAR}_suffix");
        assert_eq!(result, "prefix_test_value_suffix");

        // 存在しない環境変数
        let result = Config::expand_env_vars("prefix_${MC_CONFIG_NONEXISTENT}_suffix");
        assert_eq!(result, "prefix__suffix");

        unsafe {
            std::env::remove_var("MC_CONFIG_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_passthrough() {
        assert_eq!(Config::expand_env_vars("no_vars_here"), "no_vars_here");
        assert_eq!(Config::expand_env_vars("cost $5"), "cost $5");
        assert_eq!(Config::expand_env_vars("${}_content"), "_content");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_content = r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key = "test_key"

[llm.pricing."gpt-4o-mini"]
input_per_million = 0.15
output_per_million = 0.60

[routing]
coordinator = "main"
owner_key = "marcin"
daily_cost_limit = 1.5

[[routing.agents]]
key = "main"
name = "Gilfoyl"
domain = "architecture, coordination"

[routing.expertise]
main = ["deploy"]
ksiegowy = ["faktur"]

[notifier]
team_chat_id = "-100123"
workers = 2

[api]
port = 8080

[store]
db_path = "/tmp/mc.db"

[scheduler]
enabled = false
"#;

        let config = Config::from_toml_str(toml_content).unwrap();
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.pricing.len(), 1);
        assert_eq!(config.routing.owner_key.as_deref(), Some("marcin"));
        assert_eq!(config.routing.agents.len(), 1);
        assert_eq!(config.routing.expertise.len(), 2);
        assert_eq!(config.notifier.workers, 2);
        assert_eq!(config.notifier.queue_capacity, 256);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.store.db_path, "/tmp/mc.db");
        assert!(!config.scheduler.enabled);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nport = 4100\n[notifier]\nworkers = 0").unwrap();

        // workers = 0 cannot run
        let err = Config::from_toml_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::from_toml_file("/nonexistent/mission-control.toml").is_err());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(LlmProvider::parse("OpenAI"), LlmProvider::OpenAi);
        assert_eq!(LlmProvider::parse("claude"), LlmProvider::Claude);
        assert_eq!(LlmProvider::parse("anything"), LlmProvider::Claude);
    }
}
