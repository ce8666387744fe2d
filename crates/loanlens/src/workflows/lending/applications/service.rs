use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    ApplicationId, ApplicationStatus, ApplicationSubmission, DecisionEntry, DocumentBundle,
    LoanType, ReviewStatus, RiskLevel,
};
use super::policy::{PolicyStore, RiskPolicy};
use super::repository::{
    AnalysisCacheStore, ApplicationRecord, ApplicationRepository, AuditEntry, AuditTrail,
    DecisionNotification, NotificationPublisher, RepositoryError,
};
use crate::config::AnalysisConfig;
use crate::workflows::lending::analysis::report::coerce_f64;
use crate::workflows::lending::analysis::{
    AnalysisPath, AnalysisPipeline, AnalysisReport, AnalysisRequest, FallbackScorer,
    PipelineError, RetryPolicy, RiskAnalyst, RiskFlag, ScoreBreakdownEntry, ScoringConfig,
};

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("APP-{id:06}"))
}

/// Service composing the repository, analysis pipeline, policy store, and
/// outbound notification/audit seams.
pub struct LoanApplicationService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    audit: Arc<dyn AuditTrail>,
    policy_store: Arc<dyn PolicyStore>,
    pipeline: AnalysisPipeline,
}

impl<R, N> LoanApplicationService<R, N>
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        cache: Arc<dyn AnalysisCacheStore>,
        audit: Arc<dyn AuditTrail>,
        policy_store: Arc<dyn PolicyStore>,
        analyst: Option<Arc<dyn RiskAnalyst>>,
        scoring: ScoringConfig,
        analysis: AnalysisConfig,
    ) -> Self {
        let pipeline = AnalysisPipeline::new(
            analyst,
            FallbackScorer::new(scoring),
            cache,
            RetryPolicy::from_config(&analysis),
            analysis.analyst_only,
        );
        Self {
            repository,
            notifier,
            audit,
            policy_store,
            pipeline,
        }
    }

    /// Accept a new application and store it in `Processing` state. Analysis
    /// runs separately (see [`Self::process`]); intake stays fast.
    pub fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<ApplicationRecord, ServiceError> {
        if submission.documents.is_empty() {
            return Err(IntakeError::EmptyDocuments.into());
        }

        let mut record = ApplicationRecord::new(next_application_id(), submission.documents);
        record.loan_type = submission.loan_type;
        record.requested_amount = submission.requested_amount;
        record.applicant_name = submission.applicant_name;
        record.applicant_ic = submission.applicant_ic;

        let stored = self.repository.insert(record)?;
        info!(application_id = %stored.application_id.0, "application submitted");
        Ok(stored)
    }

    /// Parse a CSV batch (one application per row) and submit every row.
    pub fn submit_batch(&self, csv_text: &str) -> Result<Vec<ApplicationId>, ServiceError> {
        let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
        let mut ids = Vec::new();
        for row in reader.deserialize::<BatchRow>() {
            let row = row.map_err(|err| IntakeError::InvalidBatch(err.to_string()))?;
            let submission = row.into_submission();
            let record = self.submit(submission)?;
            ids.push(record.application_id);
        }
        Ok(ids)
    }

    /// Run the analysis pipeline for one application and persist the outcome.
    /// Intended to be called from a background (blocking) task; the analyst
    /// retry loop sleeps between attempts.
    pub fn process(&self, id: &ApplicationId) -> Result<ScreeningOutcome, ServiceError> {
        let mut record = self.fetch(id)?;
        if !record.status.can_transition(ApplicationStatus::Analyzing) {
            return Err(ServiceError::InvalidState {
                action: "process",
                status: record.status.label(),
            });
        }
        record.status = ApplicationStatus::Analyzing;
        record.updated_at = Utc::now();
        self.repository.update(record.clone())?;

        let request = AnalysisRequest {
            application_id: record.application_id.clone(),
            loan_type: record.loan_type,
            requested_amount: record.requested_amount.unwrap_or(0.0),
            documents: record.documents.clone(),
        };

        let started = Instant::now();
        let (report, path) = match self.pipeline.resolve(&request) {
            Ok(resolved) => resolved,
            Err(err) => {
                record.status = ApplicationStatus::Failed;
                record.updated_at = Utc::now();
                self.repository.update(record)?;
                warn!(application_id = %id.0, %err, "analysis failed, application marked Failed");
                return Err(err.into());
            }
        };
        let processing_time = started.elapsed().as_secs_f64();

        self.absorb_report(&mut record, &report);
        record.processing_time_secs = Some(processing_time);
        record.updated_at = Utc::now();
        record.decision_history.push(DecisionEntry::system(
            format!(
                "Recommended '{}'",
                record.final_decision.as_deref().unwrap_or("Review Required")
            ),
            format!("Risk Score: {}", record.risk_score.unwrap_or(50)),
        ));
        self.repository.update(record.clone())?;

        info!(
            application_id = %id.0,
            status = record.status.label(),
            score = record.risk_score.unwrap_or_default(),
            ?path,
            "analysis finished"
        );

        self.notify_decision(&record, "analysis_completed");

        Ok(ScreeningOutcome {
            application_id: record.application_id,
            status: record.status,
            risk_score: record.risk_score.unwrap_or(50),
            risk_level: record.risk_level.unwrap_or(RiskLevel::Medium),
            final_decision: record
                .final_decision
                .unwrap_or_else(|| "Review Required".to_string()),
            fallback_used: path == AnalysisPath::Fallback,
        })
    }

    /// Copies score, level, decision, and extracted applicant details from a
    /// resolved report onto the record.
    fn absorb_report(&self, record: &mut ApplicationRecord, report: &AnalysisReport) {
        let profile = &report.applicant_profile;
        if let Some(name) = profile.get("name").and_then(|v| v.as_str()) {
            record.applicant_name = Some(name.to_string());
        }
        if let Some(ic) = profile.get("ic_number").and_then(|v| v.as_str()) {
            record.applicant_ic = Some(ic.to_string());
        }
        if let Some(loan_type) = profile
            .get("loan_type")
            .and_then(|v| v.as_str())
            .and_then(LoanType::parse)
        {
            record.loan_type = Some(loan_type);
        }
        if let Some(amount) = profile.get("requested_amount") {
            let amount = coerce_f64(amount);
            if amount > 0.0 {
                record.requested_amount = Some(amount);
            }
        }

        let score = report.risk_score.unwrap_or(50).clamp(0, 100);
        let decision = report
            .final_decision
            .clone()
            .unwrap_or_else(|| "Review Required".to_string());
        record.status = match decision.as_str() {
            "Approved" => ApplicationStatus::Approved,
            "Rejected" => ApplicationStatus::Rejected,
            _ => ApplicationStatus::ReviewRequired,
        };
        record.risk_score = Some(score);
        record.risk_level = Some(
            report
                .risk_level
                .as_deref()
                .and_then(RiskLevel::parse)
                .unwrap_or_else(|| {
                    warn!(
                        application_id = %record.application_id.0,
                        level = report.risk_level.as_deref().unwrap_or("<missing>"),
                        "unknown risk level in report, defaulting to Medium"
                    );
                    RiskLevel::Medium
                }),
        );
        record.ai_decision = Some(decision.clone());
        record.final_decision = Some(decision);
        record.analysis_result = serde_json::to_value(report).ok();
    }

    /// Human verification/override of the analyst decision. Allowed once the
    /// application has reached a terminal decision; appends to the decision
    /// history instead of rewriting it.
    pub fn verify(
        &self,
        id: &ApplicationId,
        command: VerifyCommand,
    ) -> Result<VerifyOutcome, ServiceError> {
        let mut record = self.fetch(id)?;
        if !record.status.is_terminal() {
            return Err(ServiceError::InvalidState {
                action: "verify",
                status: record.status.label(),
            });
        }

        let policy = self.load_policy();
        let reviewer = command
            .reviewer_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(policy.default_reviewer);

        let is_override = record
            .ai_decision
            .as_deref()
            .is_some_and(|ai| ai != command.decision);

        record.human_decision = Some(command.decision.clone());
        record.final_decision = Some(command.decision.clone());
        record.reviewed_by = Some(reviewer.clone());
        record.reviewed_at = Some(Utc::now());
        record.review_status = if is_override {
            ReviewStatus::ManualOverride
        } else {
            ReviewStatus::HumanVerified
        };
        record.status = match command.decision.as_str() {
            "Approved" => ApplicationStatus::Approved,
            "Rejected" => ApplicationStatus::Rejected,
            _ => ApplicationStatus::ReviewRequired,
        };
        if is_override {
            record.override_reason = command.override_reason.clone();
        }

        record.decision_history.push(DecisionEntry {
            timestamp: Utc::now(),
            actor: reviewer.clone(),
            action: format!("Changed decision to '{}'", command.decision),
            details: if is_override {
                "Override".to_string()
            } else {
                "Verified AI decision".to_string()
            },
            reason: command.override_reason,
        });
        record.updated_at = Utc::now();
        self.repository.update(record.clone())?;

        if let Err(err) = self.audit.record(AuditEntry::now(
            reviewer,
            "verify_application",
            format!("{} -> {}", record.application_id.0, command.decision),
        )) {
            warn!(application_id = %id.0, %err, "failed to append audit entry");
        }

        self.notify_decision(&record, "decision_verified");

        Ok(VerifyOutcome {
            review_status: record.review_status,
            is_override,
            decision_history: record.decision_history,
        })
    }

    /// Re-queue a `Failed` application for processing.
    pub fn retry(&self, id: &ApplicationId) -> Result<(), ServiceError> {
        let mut record = self.fetch(id)?;
        if record.status != ApplicationStatus::Failed {
            return Err(ServiceError::InvalidState {
                action: "retry",
                status: record.status.label(),
            });
        }
        record.status = ApplicationStatus::Processing;
        record.updated_at = Utc::now();
        self.repository.update(record)?;
        info!(application_id = %id.0, "retry scheduled");
        Ok(())
    }

    pub fn get(&self, id: &ApplicationId) -> Result<ApplicationRecord, ServiceError> {
        self.fetch(id)
    }

    /// Remove an application entirely. Removal is an administrative action
    /// and leaves an audit entry behind.
    pub fn delete(&self, id: &ApplicationId, actor: &str) -> Result<(), ServiceError> {
        if !self.repository.delete(id)? {
            return Err(RepositoryError::NotFound.into());
        }
        if let Err(err) = self.audit.record(AuditEntry::now(
            actor,
            "delete_application",
            id.0.clone(),
        )) {
            warn!(application_id = %id.0, %err, "failed to append audit entry");
        }
        info!(application_id = %id.0, "application deleted");
        Ok(())
    }

    pub fn list(&self, limit: usize) -> Result<Vec<ApplicationRecord>, ServiceError> {
        Ok(self.repository.list(limit)?)
    }

    /// Trimmed reasoning subset to keep polling payloads small.
    pub fn reasoning(&self, id: &ApplicationId) -> Result<ReasoningView, ServiceError> {
        let record = self.fetch(id)?;
        let report: Option<AnalysisReport> = record
            .analysis_result
            .clone()
            .and_then(|value| serde_json::from_value(value).ok());

        let (score_breakdown, risk_flags, reasoning_log) = match report {
            Some(report) => (
                report
                    .risk_score_analysis
                    .score_breakdown
                    .into_iter()
                    .take(15)
                    .collect(),
                report.key_risk_flags.into_iter().take(25).collect(),
                report.ai_reasoning_log.into_iter().take(20).collect(),
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        Ok(ReasoningView {
            application_id: record.application_id,
            status: record.status.label(),
            score: record.risk_score,
            risk_level: record.risk_level.map(RiskLevel::label),
            final_decision: record.final_decision,
            score_breakdown,
            risk_flags,
            reasoning_log,
        })
    }

    /// Previous/next application id by creation time, for reviewer paging.
    pub fn navigate(
        &self,
        id: &ApplicationId,
        direction: NavigateDirection,
    ) -> Result<Option<ApplicationId>, ServiceError> {
        let records = self.repository.list(usize::MAX)?;
        let index = records
            .iter()
            .position(|record| &record.application_id == id)
            .ok_or(RepositoryError::NotFound)?;

        // records are most recent first; "next" walks toward older entries
        let neighbor = match direction {
            NavigateDirection::Next => records.get(index + 1),
            NavigateDirection::Previous => index.checked_sub(1).and_then(|i| records.get(i)),
        };
        Ok(neighbor.map(|record| record.application_id.clone()))
    }

    pub fn stats(&self) -> Result<ServiceStats, ServiceError> {
        let records = self.repository.list(usize::MAX)?;
        let times: Vec<f64> = records
            .iter()
            .filter_map(|record| record.processing_time_secs)
            .collect();
        let avg = if times.is_empty() {
            0.0
        } else {
            times.iter().sum::<f64>() / times.len() as f64
        };
        Ok(ServiceStats {
            total: self.repository.count()?,
            avg_processing_time_secs: (avg * 10.0).round() / 10.0,
        })
    }

    pub fn policy(&self) -> RiskPolicy {
        self.load_policy()
    }

    /// Replace the review policy; the update is sanitized and audited.
    pub fn update_policy(
        &self,
        policy: RiskPolicy,
        actor: &str,
    ) -> Result<RiskPolicy, ServiceError> {
        let sanitized = policy.sanitized();
        self.policy_store.save(sanitized.clone())?;
        if let Err(err) = self.audit.record(AuditEntry::now(
            actor,
            "update_policy",
            format!(
                "dsr={} savings={} confidence={}",
                sanitized.dsr_threshold,
                sanitized.savings_rate_threshold,
                sanitized.confidence_threshold
            ),
        )) {
            warn!(%err, "failed to append audit entry for policy update");
        }
        Ok(sanitized)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<ApplicationRecord, ServiceError> {
        Ok(self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?)
    }

    fn load_policy(&self) -> RiskPolicy {
        match self.policy_store.load() {
            Ok(policy) => policy,
            Err(err) => {
                warn!(%err, "policy store unavailable, using defaults");
                RiskPolicy::default()
            }
        }
    }

    /// Best-effort: a failed notification never fails the workflow.
    fn notify_decision(&self, record: &ApplicationRecord, template: &str) {
        let policy = self.load_policy();
        if !policy.notify_on_decision {
            return;
        }
        let decision = record.final_decision.as_deref().unwrap_or("Review Required");
        let notification = DecisionNotification {
            application_id: record.application_id.clone(),
            template: template.to_string(),
            subject: format!(
                "Loan application {} - {decision}",
                record.application_id.0
            ),
            body: format!(
                "Application {} for {} has been assessed: {decision} (risk score {}).",
                record.application_id.0,
                record.applicant_name.as_deref().unwrap_or("Unknown"),
                record.risk_score.unwrap_or(50),
            ),
        };
        if let Err(err) = self.notifier.publish(notification) {
            warn!(application_id = %record.application_id.0, %err, "decision notification failed");
        }
    }
}

/// CSV row for batch intake. Document columns carry extracted text.
#[derive(Debug, Deserialize)]
struct BatchRow {
    #[serde(default)]
    applicant_name: Option<String>,
    #[serde(default)]
    ic_number: Option<String>,
    #[serde(default)]
    loan_type: Option<String>,
    #[serde(default)]
    requested_amount: Option<f64>,
    #[serde(default)]
    application_form: Option<String>,
    #[serde(default)]
    bank_statement: Option<String>,
    #[serde(default)]
    essay: Option<String>,
    #[serde(default)]
    payslip: Option<String>,
}

impl BatchRow {
    fn into_submission(self) -> ApplicationSubmission {
        ApplicationSubmission {
            loan_type: self.loan_type.as_deref().and_then(LoanType::parse),
            requested_amount: self.requested_amount,
            applicant_name: self.applicant_name,
            applicant_ic: self.ic_number,
            documents: DocumentBundle {
                application_form: self.application_form.unwrap_or_default(),
                bank_statement: self.bank_statement.unwrap_or_default(),
                essay: self.essay.unwrap_or_default(),
                payslip: self.payslip.unwrap_or_default(),
            },
        }
    }
}

/// Human review command.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyCommand {
    pub decision: String,
    #[serde(default)]
    pub reviewer_name: Option<String>,
    #[serde(default)]
    pub override_reason: Option<String>,
}

/// Verification response.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub review_status: ReviewStatus,
    pub is_override: bool,
    pub decision_history: Vec<DecisionEntry>,
}

/// Result of one processing run.
#[derive(Debug, Clone, Serialize)]
pub struct ScreeningOutcome {
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
    pub risk_score: i64,
    pub risk_level: RiskLevel,
    pub final_decision: String,
    pub fallback_used: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigateDirection {
    Next,
    Previous,
}

/// Operational counters for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub total: usize,
    pub avg_processing_time_secs: f64,
}

/// Trimmed reasoning payload.
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningView {
    pub application_id: ApplicationId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_decision: Option<String>,
    pub score_breakdown: Vec<ScoreBreakdownEntry>,
    pub risk_flags: Vec<RiskFlag>,
    pub reasoning_log: Vec<String>,
}

/// Intake validation failures.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("submission carries no document text")]
    EmptyDocuments,
    #[error("batch csv invalid: {0}")]
    InvalidBatch(String),
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Analysis(#[from] PipelineError),
    #[error("cannot {action} application in status '{status}'")]
    InvalidState {
        action: &'static str,
        status: &'static str,
    },
}
