//! `scanpii_core`: schema-aware PII/QI discovery for relational databases.
//!
//! The crate root only declares modules and re-exports the handful of
//! types a host application wires together: a `Config`, a `Collaborators`
//! bundle of adapters, and a `ScanOrchestrator` built from both.

pub mod collaborators;
pub mod config;
pub mod detection;
pub mod dialect;
pub mod domain;
pub mod error;
pub mod fixtures;
pub mod orchestrator;
pub mod qi_correlation;
pub mod report;
pub mod risk;
pub mod sampler;
pub mod utils;

pub use collaborators::Collaborators;
pub use config::Config;
pub use error::{ScanError, ScanResult};
pub use orchestrator::ScanOrchestrator;
pub use orchestrator::events::ScanEvent;
pub use report::ScanReport;
