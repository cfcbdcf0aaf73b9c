//! Scan configuration: thresholds, concurrency limits, and the regex
//! pattern bank. Loaded file -> env -> CLI, validated once at the end.

use crate::error::ConfigError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub heuristic_threshold: f64,
    pub regex_threshold: f64,
    pub ner_threshold: f64,
    pub reporting_threshold: f64,
    pub stop_pipeline_on_high_confidence: bool,
    pub entropy_enabled: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            heuristic_threshold: 0.7,
            regex_threshold: 0.8,
            ner_threshold: 0.6,
            reporting_threshold: 0.5,
            stop_pipeline_on_high_confidence: true,
            entropy_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QiConfig {
    pub confidence_threshold: f64,
    pub min_correlation_coefficient: f64,
    pub max_correlation_columns_to_analyze: usize,
    pub min_group_size: usize,
    pub max_group_size: usize,
    pub low_cardinality_threshold: f64,
    pub high_cardinality_threshold: f64,
}

impl Default for QiConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.65,
            min_correlation_coefficient: 0.7,
            max_correlation_columns_to_analyze: 100,
            min_group_size: 1,
            max_group_size: 5,
            low_cardinality_threshold: 0.05,
            high_cardinality_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub default_size: usize,
    pub max_concurrent_db_queries: usize,
    pub entropy_calculation_enabled: bool,
    pub default_method: String,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            default_size: 1000,
            max_concurrent_db_queries: 5,
            entropy_calculation_enabled: false,
            default_method: "RANDOM".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout_seconds: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NerConfig {
    pub url: String,
    pub timeout_seconds: u64,
    pub max_samples: usize,
    pub retry_attempts: u32,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_seconds: 30,
            max_samples: 100,
            retry_attempts: 2,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,scanpii=debug".to_string() }
    }
}

/// One entry of the regex pattern bank: `(pattern, score, piiType)`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternBankEntry {
    pub pattern: String,
    pub score: f64,
    pub pii_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub qi: QiConfig,
    pub sampling: SamplingConfig,
    pub ner: NerConfig,
    pub logging: LoggingConfig,
    pub pattern_bank: HashMap<String, PatternBankEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            qi: QiConfig::default(),
            sampling: SamplingConfig::default(),
            ner: NerConfig::default(),
            logging: LoggingConfig::default(),
            pattern_bank: default_pattern_bank(),
        }
    }
}

/// The seven canonical pattern-bank entries required for testable behavior.
/// A config file may add more or override scores, but these always exist
/// unless explicitly removed.
pub fn default_pattern_bank() -> HashMap<String, PatternBankEntry> {
    let entries = [
        ("EMAIL_RFC5322", r"^[\w.+-]+@[\w-]+\.[a-zA-Z]{2,}$", 0.9, "EMAIL"),
        ("US_SSN", r"^\d{3}-\d{2}-\d{4}$", 0.95, "SSN"),
        ("US_PHONE", r"^\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}$", 0.75, "PHONE"),
        (
            "CREDIT_CARD",
            r"^(?:\d[ -]*?){13,19}$",
            0.85,
            "CREDIT_CARD",
        ),
        (
            "IP_ADDRESS",
            r"^(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)$",
            0.7,
            "IP_ADDRESS",
        ),
        (
            "IBAN",
            r"^[A-Z]{2}\d{2}[A-Z0-9]{11,30}$",
            0.8,
            "IBAN",
        ),
        (
            "DATE_FORMAT",
            r"^\d{4}-\d{2}-\d{2}$",
            0.6,
            "DATE_OF_BIRTH",
        ),
    ];
    entries
        .into_iter()
        .map(|(name, pattern, score, pii_type)| {
            (
                name.to_string(),
                PatternBankEntry { pattern: pattern.to_string(), score, pii_type: pii_type.to_string() },
            )
        })
        .collect()
}

/// Command line overrides layered on top of file and environment config.
#[derive(Parser, Debug, Clone)]
#[command(name = "scanpii")]
#[command(version, about = "PII/QI database scanner")]
pub struct CommandLineArgs {
    /// Path to a TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Override detection.reporting_threshold.
    #[arg(long, value_name = "FLOAT")]
    pub reporting_threshold: Option<f64>,

    /// Override sampling.max_concurrent_db_queries.
    #[arg(long, value_name = "N")]
    pub max_concurrent_db_queries: Option<usize>,

    /// Override ner.url.
    #[arg(long, value_name = "URL")]
    pub ner_url: Option<String>,

    /// Override logging.level.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Config {
    /// Layering order (highest to lowest priority): CLI args, environment
    /// variables (`SCANPII_*`), TOML file, defaults.
    pub fn load(cli_args: &CommandLineArgs) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = &cli_args.config {
            Self::from_toml(path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(cli_args);
        config.validate()?;
        Ok(config)
    }

    fn from_toml(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(Path::new(path))
            .map_err(|e| ConfigError::ParseFailure(format!("reading {path}: {e}")))?;
        let mut config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseFailure(e.to_string()))?;
        if config.pattern_bank.is_empty() {
            config.pattern_bank = default_pattern_bank();
        }
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SCANPII_REPORTING_THRESHOLD")
            && let Ok(v) = v.parse()
        {
            self.detection.reporting_threshold = v;
        }
        if let Ok(v) = std::env::var("SCANPII_MAX_CONCURRENT_DB_QUERIES")
            && let Ok(v) = v.parse()
        {
            self.sampling.max_concurrent_db_queries = v;
        }
        if let Ok(v) = std::env::var("SCANPII_NER_URL") {
            self.ner.url = v;
        }
        if let Ok(v) = std::env::var("SCANPII_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(v) = args.reporting_threshold {
            self.detection.reporting_threshold = v;
        }
        if let Some(v) = args.max_concurrent_db_queries {
            self.sampling.max_concurrent_db_queries = v;
        }
        if let Some(v) = &args.ner_url {
            self.ner.url = v.clone();
        }
        if let Some(v) = &args.log_level {
            self.logging.level = v.clone();
        }
    }

    /// Validates thresholds lie in [0,1] and required values are present;
    /// fatal at scan start.
    fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("detection.heuristic_threshold", self.detection.heuristic_threshold),
            ("detection.regex_threshold", self.detection.regex_threshold),
            ("detection.ner_threshold", self.detection.ner_threshold),
            ("detection.reporting_threshold", self.detection.reporting_threshold),
            ("qi.confidence_threshold", self.qi.confidence_threshold),
            ("qi.min_correlation_coefficient", self.qi.min_correlation_coefficient),
            ("qi.low_cardinality_threshold", self.qi.low_cardinality_threshold),
            ("qi.high_cardinality_threshold", self.qi.high_cardinality_threshold),
        ];
        for (field, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { field: field.to_string(), value });
            }
        }
        if self.sampling.max_concurrent_db_queries == 0 {
            return Err(ConfigError::MissingValue(
                "sampling.max_concurrent_db_queries must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = Config::default();
        config.detection.reporting_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_pattern_bank_contains_canonical_entries() {
        let bank = default_pattern_bank();
        for name in
            ["EMAIL_RFC5322", "US_SSN", "US_PHONE", "CREDIT_CARD", "IP_ADDRESS", "IBAN", "DATE_FORMAT"]
        {
            assert!(bank.contains_key(name), "missing canonical entry {name}");
        }
    }
}
