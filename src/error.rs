//! Error taxonomy. Each component raises a narrow, structured error; the
//! orchestrator classifies it as recoverable or fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("threshold '{field}' = {value} is outside [0,1]")]
    ThresholdOutOfRange { field: String, value: f64 },

    #[error("missing required configuration value: {0}")]
    MissingValue(String),

    #[error("unsupported database dialect: {0}")]
    UnsupportedDialect(String),

    #[error("failed to parse configuration file: {0}")]
    ParseFailure(String),
}

#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("column {column}: query failed: {message}")]
    QueryFailed { column: String, message: String },

    #[error("sampling cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("strategy {strategy} failed on column {column}: {message}")]
    Failed { strategy: String, column: String, message: String },
}

#[derive(Debug, Error)]
pub enum NerError {
    #[error("NER request timed out after {0}s")]
    Timeout(u64),

    #[error("NER transport error: {0}")]
    Transport(String),

    #[error("NER service returned non-success status: {0}")]
    Status(u16),

    #[error("circuit breaker open, NER calls suppressed")]
    CircuitOpen,

    #[error("failed to parse NER response: {0}")]
    InvalidResponse(String),
}

/// Connectivity failures from the (out-of-scope) DB connector collaborator.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("database unreachable: {0}")]
    Unreachable(String),

    #[error("connection pool exhausted after waiting {0}ms")]
    PoolExhausted(u64),
}

/// Top-level error surfaced to the orchestrator. Each variant corresponds
/// to one branch of the error taxonomy.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("connectivity error: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error("sampling error: {0}")]
    Sampling(#[from] SamplingError),

    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("NER unavailable: {0}")]
    NerUnavailable(#[from] NerError),

    #[error("scan cancelled")]
    Cancelled,

    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("report not ready: job is not in COMPLETED state")]
    NotReady,

    #[error("unknown scan job: {0}")]
    UnknownJob(uuid::Uuid),
}

/// Recoverable vs fatal classification the orchestrator applies when a
/// component error surfaces. A pure function so it is trivially unit
/// tested without constructing a running scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged, scan continues (e.g. one column's sampling failed).
    Recoverable,
    /// Scan transitions to FAILED.
    Fatal,
    /// Scan transitions to CANCELLED; no report is published.
    Cancelled,
}

pub fn classify(error: &ScanError) -> Severity {
    match error {
        ScanError::Cancelled => Severity::Cancelled,
        ScanError::Config(_) => Severity::Fatal,
        ScanError::Connectivity(ConnectivityError::Unreachable(_)) => Severity::Fatal,
        ScanError::Connectivity(ConnectivityError::PoolExhausted(_)) => Severity::Recoverable,
        ScanError::Sampling(_) => Severity::Recoverable,
        ScanError::Strategy(_) => Severity::Recoverable,
        ScanError::NerUnavailable(_) => Severity::Recoverable,
        ScanError::Fatal(_) => Severity::Fatal,
        ScanError::NotReady | ScanError::UnknownJob(_) => Severity::Recoverable,
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_column_failures_are_recoverable() {
        let err = ScanError::Sampling(SamplingError::QueryFailed {
            column: "t.c".into(),
            message: "timeout".into(),
        });
        assert_eq!(classify(&err), Severity::Recoverable);
    }

    #[test]
    fn config_errors_are_fatal_at_scan_start() {
        let err = ScanError::Config(ConfigError::MissingValue("ner.url".into()));
        assert_eq!(classify(&err), Severity::Fatal);
    }

    #[test]
    fn cancellation_is_its_own_severity() {
        assert_eq!(classify(&ScanError::Cancelled), Severity::Cancelled);
    }
}
