//! Core domain entities shared by every component of the scan pipeline.
//!
//! Schema/Table/Column/Relationship form a small arena-backed graph owned
//! exclusively by a scan for its duration (see `Schema`). Everything
//! downstream (samples, candidates, detection results, QI groups, the job
//! itself) is a plain value type handed off by reference or by value as
//! each stage finishes with it.

pub mod detection;
pub mod job;
pub mod qi;
pub mod sample;
pub mod schema;

pub use detection::{DetectionResult, PiiCandidate, StrategyName};
pub use job::{ScanJob, ScanRequest, ScanStatus, SamplingMethod};
pub use qi::QuasiIdentifierGroup;
pub use sample::{SampleData, SampleValue};
pub use schema::{Column, ColumnId, Relationship, RelationshipId, Schema, Table, TableId};
