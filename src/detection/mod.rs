//! Detection Strategies: a closed set of variants implementing one
//! `Strategy` capability, composed into a fixed-order pipeline rather than
//! via inheritance from a shared base class.

pub mod heuristic;
pub mod ner;
pub mod pipeline;
pub mod qi;
pub mod regex_strategy;

pub use heuristic::HeuristicStrategy;
pub use ner::{HttpNerClient, NerStrategy};
pub use pipeline::DetectionPipeline;
pub use qi::QuasiIdentifierStrategy;
pub use regex_strategy::RegexStrategy;

use crate::domain::{Column, DetectionResult};
use crate::domain::detection::StrategyName;
use crate::domain::sample::SampleData;
use crate::error::StrategyError;
use async_trait::async_trait;

/// One detection strategy. `sample_data` is `None` for strategies that only
/// need column metadata (heuristic) and always `Some` for data-driven ones
/// (regex, NER, QI) — callers always pass samples when available; a
/// strategy that doesn't need them simply ignores the argument.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> StrategyName;

    async fn detect(
        &self,
        column: &Column,
        sample_data: Option<&SampleData>,
    ) -> Result<DetectionResult, StrategyError>;
}
