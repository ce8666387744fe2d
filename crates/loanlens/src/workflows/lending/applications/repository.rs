use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{
    ApplicationId, ApplicationStatus, DecisionEntry, DocumentBundle, LoanType, ReviewStatus,
    RiskLevel,
};

/// Repository record: everything the screening pipeline knows about one
/// application. `decision_history` is append-only; callers push entries and
/// never rewrite existing ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub application_id: ApplicationId,
    pub applicant_name: Option<String>,
    pub applicant_ic: Option<String>,
    pub loan_type: Option<LoanType>,
    pub requested_amount: Option<f64>,
    pub status: ApplicationStatus,
    pub risk_score: Option<i64>,
    pub risk_level: Option<RiskLevel>,
    pub final_decision: Option<String>,
    pub review_status: ReviewStatus,
    pub ai_decision: Option<String>,
    pub human_decision: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub override_reason: Option<String>,
    pub documents: DocumentBundle,
    pub analysis_result: Option<Value>,
    pub decision_history: Vec<DecisionEntry>,
    pub processing_time_secs: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRecord {
    pub fn new(application_id: ApplicationId, documents: DocumentBundle) -> Self {
        let now = Utc::now();
        Self {
            application_id,
            applicant_name: None,
            applicant_ic: None,
            loan_type: None,
            requested_amount: None,
            status: ApplicationStatus::Processing,
            risk_score: None,
            risk_level: None,
            final_decision: None,
            review_status: ReviewStatus::AiPending,
            ai_decision: None,
            human_decision: None,
            reviewed_by: None,
            reviewed_at: None,
            override_reason: None,
            documents,
            analysis_result: None,
            decision_history: Vec::new(),
            processing_time_secs: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn summary_view(&self) -> ApplicationSummaryView {
        ApplicationSummaryView {
            application_id: self.application_id.clone(),
            applicant_name: self
                .applicant_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            loan_type: self.loan_type.map(LoanType::label),
            requested_amount: self.requested_amount,
            status: self.status.label(),
            risk_score: self.risk_score,
            review_status: self.review_status.label(),
            ai_decision: self.ai_decision.clone(),
            human_decision: self.human_decision.clone(),
            created_at: self.created_at,
        }
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.application_id.clone(),
            status: self.status.label(),
            risk_score: self.risk_score,
            final_decision: self.final_decision.clone(),
        }
    }
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    /// Most recent first.
    fn list(&self, limit: usize) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    fn count(&self) -> Result<usize, RepositoryError>;
    /// Returns whether a record was removed.
    fn delete(&self, id: &ApplicationId) -> Result<bool, RepositoryError>;
}

/// Write-once memo of one analysis report per application.
pub trait AnalysisCacheStore: Send + Sync {
    fn get(&self, id: &ApplicationId) -> Result<Option<Value>, RepositoryError>;
    /// First write wins; later writes for the same id are ignored.
    fn put(&self, id: &ApplicationId, report: Value) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound decision notifications (e-mail adapters live behind this seam).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: DecisionNotification) -> Result<(), NotifyError>;
}

/// Payload handed to the notification transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionNotification {
    pub application_id: ApplicationId,
    pub template: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Append-only log of administrative actions (policy edits, overrides).
pub trait AuditTrail: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub details: String,
}

impl AuditEntry {
    pub fn now(actor: impl Into<String>, action: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: actor.into(),
            action: action.into(),
            details: details.into(),
        }
    }
}

/// Row shape returned by the list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationSummaryView {
    pub application_id: ApplicationId,
    pub applicant_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_amount: Option<f64>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<i64>,
    pub review_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_decision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_decision: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lightweight polling shape.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_decision: Option<String>,
}
