//! Report Builder: aggregates a completed scan's results into a
//! neutral, serializable record. Building JSON/CSV/PDF views of this record
//! is the host's job; this module only assembles the domain aggregate.

use crate::domain::detection::DetectionResult;
use crate::domain::job::ScanCounts;
use crate::domain::qi::QuasiIdentifierGroup;
use crate::risk::RiskReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub job_id: Uuid,
    pub connection_id: String,
    pub generated_at: DateTime<Utc>,
    pub schema_name: String,
    pub database_product_name: String,
    pub counts: ScanCounts,
    pub detection_results: Vec<DetectionResult>,
    pub qi_groups: Vec<QuasiIdentifierGroup>,
    pub risk: RiskReport,
}

pub struct ReportBuilder;

impl ReportBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        job_id: Uuid,
        connection_id: impl Into<String>,
        schema_name: impl Into<String>,
        database_product_name: impl Into<String>,
        generated_at: DateTime<Utc>,
        counts: ScanCounts,
        detection_results: Vec<DetectionResult>,
        qi_groups: Vec<QuasiIdentifierGroup>,
        risk: RiskReport,
    ) -> ScanReport {
        ScanReport {
            job_id,
            connection_id: connection_id.into(),
            generated_at,
            schema_name: schema_name.into(),
            database_product_name: database_product_name.into(),
            counts,
            detection_results,
            qi_groups,
            risk,
        }
    }
}
