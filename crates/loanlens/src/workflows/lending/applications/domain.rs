use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for submitted loan applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Loan products the screening pipeline knows how to score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanType {
    #[serde(rename = "Micro-Business Loan")]
    MicroBusiness,
    #[serde(rename = "Personal Loan")]
    Personal,
    #[serde(rename = "Housing Loan")]
    Housing,
    #[serde(rename = "Car Loan")]
    Car,
}

impl LoanType {
    pub const fn label(self) -> &'static str {
        match self {
            LoanType::MicroBusiness => "Micro-Business Loan",
            LoanType::Personal => "Personal Loan",
            LoanType::Housing => "Housing Loan",
            LoanType::Car => "Car Loan",
        }
    }

    /// Accepts the labels seen on application forms, with or without the
    /// trailing "Loan" and in any case.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned = raw.trim().trim_end_matches("Loan").trim().to_lowercase();
        match cleaned.as_str() {
            "micro-business" | "micro business" => Some(LoanType::MicroBusiness),
            "personal" => Some(LoanType::Personal),
            "housing" => Some(LoanType::Housing),
            "car" | "hire purchase" => Some(LoanType::Car),
            _ => None,
        }
    }
}

/// High level status tracked throughout the screening lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Processing,
    Analyzing,
    Approved,
    Rejected,
    ReviewRequired,
    Failed,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Processing => "Processing",
            ApplicationStatus::Analyzing => "Analyzing",
            ApplicationStatus::Approved => "Approved",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::ReviewRequired => "Review Required",
            ApplicationStatus::Failed => "Failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved
                | ApplicationStatus::Rejected
                | ApplicationStatus::ReviewRequired
        )
    }

    /// One-directional lifecycle with a single loop: `Failed -> Processing`
    /// (retry). Terminal decisions may still flip between each other through
    /// human verification.
    pub fn can_transition(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        match (self, next) {
            (Processing, Analyzing) | (Processing, Failed) => true,
            (Analyzing, Approved) | (Analyzing, Rejected) | (Analyzing, ReviewRequired) => true,
            (Analyzing, Failed) => true,
            (Failed, Processing) => true,
            (from, to) if from.is_terminal() && to.is_terminal() => true,
            _ => false,
        }
    }
}

/// Qualitative risk bands attached to a scored application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

/// Review provenance of the current decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    #[serde(rename = "AI_Pending")]
    AiPending,
    #[serde(rename = "Human_Verified")]
    HumanVerified,
    #[serde(rename = "Manual_Override")]
    ManualOverride,
}

impl ReviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewStatus::AiPending => "AI_Pending",
            ReviewStatus::HumanVerified => "Human_Verified",
            ReviewStatus::ManualOverride => "Manual_Override",
        }
    }
}

/// The four extracted document texts carried by every application. Upstream
/// OCR/PDF handling is out of scope; an absent or failed extraction arrives
/// as an empty string and degrades to documentation penalties during scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBundle {
    #[serde(default)]
    pub application_form: String,
    #[serde(default)]
    pub bank_statement: String,
    #[serde(default)]
    pub essay: String,
    #[serde(default)]
    pub payslip: String,
}

impl DocumentBundle {
    /// Concatenated view fed to whole-text keyword passes, section-tagged the
    /// way the analyst prompt expects.
    pub fn combined_text(&self) -> String {
        format!(
            "=== APPLICATION FORM ===\n{}\n\n=== BANK STATEMENT ===\n{}\n\n=== LOAN APPLICATION ESSAY ===\n{}\n\n=== PAYSLIP DOCUMENT ===\n{}",
            self.application_form, self.bank_statement, self.essay, self.payslip
        )
    }

    /// A document counts as provided once it holds more than boilerplate.
    pub fn provided_count(&self) -> usize {
        [&self.bank_statement, &self.essay, &self.payslip]
            .iter()
            .filter(|text| text.trim().len() > 50)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.application_form.trim().is_empty()
            && self.bank_statement.trim().is_empty()
            && self.essay.trim().is_empty()
            && self.payslip.trim().is_empty()
    }
}

/// Intake payload: declared loan intent plus the extracted document texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub loan_type: Option<LoanType>,
    #[serde(default)]
    pub requested_amount: Option<f64>,
    #[serde(default)]
    pub applicant_name: Option<String>,
    #[serde(default)]
    pub applicant_ic: Option<String>,
    pub documents: DocumentBundle,
}

/// Append-only audit entry on an application's decision trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DecisionEntry {
    pub fn system(action: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: "AI System".to_string(),
            action: action.into(),
            details: details.into(),
            reason: None,
        }
    }
}
