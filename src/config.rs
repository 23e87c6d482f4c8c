use crate::error::{AlertError, Result};
use crate::risk::RiskLevel;
use crate::telemetry::FieldMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

fn load_dotenv_from(env_path: &Path) {
    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Environment variables take precedence over the file
        if std::env::var(&key).is_err() {
            // SAFETY: called from main before the async runtime starts any threads
            unsafe { std::env::set_var(&key, &value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Split at the first '='
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            if !key.is_empty() {
                pairs.push((key.to_string(), value.to_string()));
            }
        }
    }

    pairs
}

/// What the engine does with a sample that fails normalization.
///
/// Aborting reports the tick as a validation failure; substituting keeps the
/// tick alive on the fallback reading. The two are mutually exclusive
/// readings of the same failure, so the choice is left to configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidSamplePolicy {
    /// Treat the tick as a fetch failure and wait for the next one.
    #[default]
    AbortTick,
    /// Evaluate the fallback reading in place of the invalid sample.
    SubstituteFallback,
}

impl FromStr for InvalidSamplePolicy {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" | "abort_tick" => Ok(Self::AbortTick),
            "fallback" | "substitute_fallback" => Ok(Self::SubstituteFallback),
            other => Err(AlertError::Config(format!(
                "unknown invalid sample policy: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub telemetry: TelemetryConfig,
    pub classifier: ClassifierConfig,
    pub alerting: AlertingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub base_url: String,
    pub read_api_key: Option<String>,
    /// One engine is started per channel.
    pub channels: Vec<String>,
    pub timeout_secs: u64,
    pub field_map: FieldMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    pub poll_interval_secs: u64,
    pub risk_threshold: RiskLevel,
    pub cooldown_secs: u64,
    pub required_consecutive_high: u32,
    pub cue_duration_ms: u64,
    pub invalid_sample_policy: InvalidSamplePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig {
                base_url: "https://api.thingspeak.com".to_string(),
                read_api_key: None,
                channels: vec!["2412345".to_string()],
                timeout_secs: 10,
                field_map: FieldMap::default(),
            },
            classifier: ClassifierConfig {
                base_url: "http://127.0.0.1:8000".to_string(),
                timeout_secs: 10,
            },
            alerting: AlertingConfig {
                poll_interval_secs: 30,
                risk_threshold: RiskLevel::Moderate,
                cooldown_secs: 60,
                required_consecutive_high: 2,
                cue_duration_ms: 10_000,
                invalid_sample_policy: InvalidSamplePolicy::AbortTick,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from defaults overridden by whatever `lookup` returns.
    /// Unparsable numeric values are ignored and the default is kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Telemetry provider
        if let Some(url) = lookup("FIREWATCH_TELEMETRY_URL") {
            config.telemetry.base_url = url;
        }
        if let Some(key) = lookup("FIREWATCH_TELEMETRY_API_KEY") {
            config.telemetry.read_api_key = Some(key);
        }
        if let Some(channels) = lookup("FIREWATCH_CHANNELS") {
            let parsed: Vec<String> = channels
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.telemetry.channels = parsed;
            }
        }
        if let Some(v) = lookup("FIREWATCH_FETCH_TIMEOUT_SECS")
            && let Ok(secs) = v.parse()
        {
            config.telemetry.timeout_secs = secs;
        }

        // Classifier service
        if let Some(url) = lookup("FIREWATCH_CLASSIFIER_URL") {
            config.classifier.base_url = url;
        }
        if let Some(v) = lookup("FIREWATCH_CLASSIFIER_TIMEOUT_SECS")
            && let Ok(secs) = v.parse()
        {
            config.classifier.timeout_secs = secs;
        }

        // Alerting
        if let Some(v) = lookup("FIREWATCH_POLL_INTERVAL_SECS")
            && let Ok(secs) = v.parse()
        {
            config.alerting.poll_interval_secs = secs;
        }
        if let Some(v) = lookup("FIREWATCH_RISK_THRESHOLD")
            && let Ok(level) = v.parse()
        {
            config.alerting.risk_threshold = level;
        }
        if let Some(v) = lookup("FIREWATCH_COOLDOWN_SECS")
            && let Ok(secs) = v.parse()
        {
            config.alerting.cooldown_secs = secs;
        }
        if let Some(v) = lookup("FIREWATCH_REQUIRED_CONSECUTIVE")
            && let Ok(n) = v.parse()
        {
            config.alerting.required_consecutive_high = n;
        }
        if let Some(v) = lookup("FIREWATCH_CUE_DURATION_MS")
            && let Ok(ms) = v.parse()
        {
            config.alerting.cue_duration_ms = ms;
        }
        if let Some(v) = lookup("FIREWATCH_INVALID_SAMPLE_POLICY")
            && let Ok(policy) = v.parse()
        {
            config.alerting.invalid_sample_policy = policy;
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.telemetry.channels.is_empty() {
            return Err(AlertError::Config("no telemetry channels configured".into()));
        }
        if self.telemetry.timeout_secs == 0 || self.classifier.timeout_secs == 0 {
            return Err(AlertError::Config("timeouts must be non-zero".into()));
        }
        if self.alerting.poll_interval_secs == 0 {
            return Err(AlertError::Config("poll interval must be non-zero".into()));
        }
        if self.alerting.required_consecutive_high == 0 {
            return Err(AlertError::Config(
                "required consecutive high-risk count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.telemetry.timeout_secs)
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier.timeout_secs)
    }
}
