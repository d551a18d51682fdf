//! Runtime configuration.
//!
//! Everything has a default; `Config::from_env()` overlays `VIGIL_*`
//! environment variables (after loading a `.env` file if present).

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Complete runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub agent: AgentConfig,
    pub approval: ApprovalConfig,
    pub executor: ExecutorConfig,
    pub llm: LlmConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let agent = &mut config.agent;
        if let Some(minutes) = parse_var::<u64, _>(&lookup, "VIGIL_INTERVAL_MINUTES")? {
            agent.interval_minutes = minutes.max(1);
        }
        if let Some(every) = parse_var::<u64, _>(&lookup, "VIGIL_EVOLVE_EVERY")? {
            agent.evolve_every = every.max(1);
        }
        if let Some(enabled) = parse_bool(&lookup, "VIGIL_CURIOSITY_ENABLED")? {
            agent.curiosity_enabled = enabled;
        }
        if let Some(count) = parse_var::<usize, _>(&lookup, "VIGIL_EVOLVE_QUESTIONS")? {
            agent.evolve_question_count = count;
        }
        if let Some(limit) = parse_var::<usize, _>(&lookup, "VIGIL_RECENT_TOPICS")? {
            agent.recent_topics_limit = limit;
        }

        let approval = &mut config.approval;
        if let Some(secs) = parse_var::<u64, _>(&lookup, "VIGIL_KILL_SWITCH_COOLDOWN_SECS")? {
            approval.kill_switch_cooldown = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "VIGIL_SWEEP_INTERVAL_SECS")? {
            approval.sweep_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(channel) = lookup("VIGIL_APPROVAL_CHANNEL").filter(|c| !c.trim().is_empty()) {
            approval.channel = channel;
        }

        let executor = &mut config.executor;
        if let Some(enabled) = parse_bool(&lookup, "VIGIL_CONFIRMATION_ENABLED")? {
            executor.confirmation_enabled = enabled;
        }
        if let Some(list) = lookup("VIGIL_WHITELIST") {
            executor.whitelist = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "VIGIL_SHELL_TIMEOUT_SECS")? {
            executor.shell_timeout = Duration::from_secs(secs.max(1));
        }

        let llm = &mut config.llm;
        if let Some(url) = lookup("VIGIL_LLM_BASE_URL") {
            llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("VIGIL_LLM_MODEL") {
            llm.model = model;
        }
        if let Some(key) = lookup("VIGIL_LLM_API_KEY").filter(|k| !k.is_empty()) {
            llm.api_key = Some(SecretString::from(key));
        }
        if let Some(temperature) = parse_var::<f32, _>(&lookup, "VIGIL_LLM_TEMPERATURE")? {
            llm.temperature = temperature;
        }
        if let Some(max_tokens) = parse_var::<u32, _>(&lookup, "VIGIL_LLM_MAX_TOKENS")? {
            llm.max_tokens = max_tokens;
        }

        Ok(config)
    }
}

/// Agent loop scheduling.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Minutes between scheduled cycles.
    pub interval_minutes: u64,
    /// Evolve runs on every Nth completed cycle.
    pub evolve_every: u64,
    /// Whether the evolve phase generates exploration questions at all.
    pub curiosity_enabled: bool,
    /// Bound on the loop's error history.
    pub max_recent_errors: usize,
    /// Number of recent topics pulled during perception.
    pub recent_topics_limit: usize,
    /// Questions requested per evolve phase.
    pub evolve_question_count: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            evolve_every: 5,
            curiosity_enabled: false,
            max_recent_errors: 10,
            recent_topics_limit: 10,
            evolve_question_count: 3,
        }
    }
}

impl AgentConfig {
    /// Interval between scheduled cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) * 60)
    }

    /// Set the cycle interval in minutes.
    pub fn with_interval_minutes(mut self, minutes: u64) -> Self {
        self.interval_minutes = minutes.max(1);
        self
    }

    /// Enable the evolve phase.
    pub fn with_curiosity(mut self, every: u64) -> Self {
        self.curiosity_enabled = true;
        self.evolve_every = every.max(1);
        self
    }
}

/// Approval gate behaviour.
#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    /// How long the kill switch stays active before clearing itself.
    pub kill_switch_cooldown: Duration,
    /// Period of the expiry sweep.
    pub sweep_interval: Duration,
    /// Delivery channel used when the caller does not name one.
    pub channel: String,
    /// Maximum characters of the command shown in a confirmation request.
    pub preview_chars: usize,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            kill_switch_cooldown: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(10),
            channel: "default".to_string(),
            preview_chars: 200,
        }
    }
}

impl ApprovalConfig {
    /// Set the kill switch cool-down.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.kill_switch_cooldown = cooldown;
        self
    }
}

/// Secure executor behaviour.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// When false, every operation runs without consulting the gate.
    pub confirmation_enabled: bool,
    /// Operation labels that never require confirmation.
    pub whitelist: Vec<String>,
    /// Timeout for `execute_shell`.
    pub shell_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            confirmation_enabled: true,
            whitelist: Vec::new(),
            shell_timeout: Duration::from_secs(120),
        }
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}

fn parse_bool<F>(lookup: &F, key: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected a boolean, got '{}'", other),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.interval_minutes, 30);
        assert_eq!(config.agent.evolve_every, 5);
        assert!(!config.agent.curiosity_enabled);
        assert_eq!(config.agent.max_recent_errors, 10);
        assert_eq!(
            config.approval.kill_switch_cooldown,
            Duration::from_secs(300)
        );
        assert_eq!(config.approval.sweep_interval, Duration::from_secs(10));
        assert!(config.executor.confirmation_enabled);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = Config::from_lookup(lookup_from(&[
            ("VIGIL_INTERVAL_MINUTES", "5"),
            ("VIGIL_CURIOSITY_ENABLED", "yes"),
            ("VIGIL_WHITELIST", "backup, sync ,,"),
            ("VIGIL_LLM_API_KEY", "sk-test"),
            ("VIGIL_LLM_BASE_URL", "http://localhost:8080/"),
        ]))
        .unwrap();

        assert_eq!(config.agent.interval_minutes, 5);
        assert!(config.agent.curiosity_enabled);
        assert_eq!(config.executor.whitelist, vec!["backup", "sync"]);
        assert_eq!(
            config.llm.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("sk-test".to_string())
        );
        assert_eq!(config.llm.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config =
            Config::from_lookup(lookup_from(&[("VIGIL_INTERVAL_MINUTES", "0")])).unwrap();
        assert_eq!(config.agent.interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_value_reports_key() {
        let err = Config::from_lookup(lookup_from(&[("VIGIL_EVOLVE_EVERY", "often")]))
            .unwrap_err();
        assert!(err.to_string().contains("VIGIL_EVOLVE_EVERY"));

        let err = Config::from_lookup(lookup_from(&[("VIGIL_CONFIRMATION_ENABLED", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("expected a boolean"));
    }
}
