//! Risk analysis: the external analyst seam, the deterministic fallback
//! scorer, the financial metrics recalculator, and the pipeline that
//! arbitrates between them.

pub mod engine;
pub mod fallback;
pub mod metrics;
pub mod report;

pub use engine::{
    AnalysisPath, AnalysisPipeline, AnalystError, PipelineError, RetryPolicy, RiskAnalyst,
};
pub use fallback::{FallbackScorer, ScoringConfig};
pub use report::{AnalysisReport, FinancialFigures, RiskFlag, ScoreBreakdownEntry};

use crate::workflows::lending::applications::domain::{ApplicationId, DocumentBundle, LoanType};

/// Everything an analyst (or the fallback scorer) needs about one
/// application.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub application_id: ApplicationId,
    pub loan_type: Option<LoanType>,
    pub requested_amount: f64,
    pub documents: DocumentBundle,
}
