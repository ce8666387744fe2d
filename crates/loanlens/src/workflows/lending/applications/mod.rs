//! Loan application intake, persistence seams, review, and HTTP routing.

pub mod domain;
pub mod policy;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    ApplicationId, ApplicationStatus, ApplicationSubmission, DecisionEntry, DocumentBundle,
    LoanType, ReviewStatus, RiskLevel,
};
pub use policy::{PolicyStore, RiskPolicy};
pub use repository::{
    AnalysisCacheStore, ApplicationRecord, ApplicationRepository, ApplicationStatusView,
    ApplicationSummaryView, AuditEntry, AuditTrail, DecisionNotification, NotificationPublisher,
    NotifyError, RepositoryError,
};
pub use router::application_router;
pub use service::{
    IntakeError, LoanApplicationService, NavigateDirection, ReasoningView, ScreeningOutcome,
    ServiceError, ServiceStats, VerifyCommand, VerifyOutcome,
};
