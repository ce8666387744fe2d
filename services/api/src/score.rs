use std::fs;
use std::path::PathBuf;

use clap::Args;
use loanlens::error::AppError;
use loanlens::workflows::lending::analysis::{
    fallback::FallbackScorer, metrics, AnalysisRequest, ScoringConfig,
};
use loanlens::workflows::lending::applications::{ApplicationId, DocumentBundle, LoanType};

/// Offline scoring for demos and rubric tuning: feeds local text files
/// through the deterministic pipeline and prints the report.
#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Loan product, e.g. "Personal Loan" or "Micro-Business"
    #[arg(long)]
    loan_type: Option<String>,
    /// Requested amount in RM
    #[arg(long, default_value_t = 0.0)]
    amount: f64,
    /// Path to the extracted application form text
    #[arg(long)]
    application_form: Option<PathBuf>,
    /// Path to the extracted bank statement text
    #[arg(long)]
    bank_statement: Option<PathBuf>,
    /// Path to the extracted loan essay text
    #[arg(long)]
    essay: Option<PathBuf>,
    /// Path to the extracted payslip text
    #[arg(long)]
    payslip: Option<PathBuf>,
}

fn read_optional(path: Option<PathBuf>) -> Result<String, AppError> {
    match path {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => Ok(String::new()),
    }
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let documents = DocumentBundle {
        application_form: read_optional(args.application_form)?,
        bank_statement: read_optional(args.bank_statement)?,
        essay: read_optional(args.essay)?,
        payslip: read_optional(args.payslip)?,
    };

    let request = AnalysisRequest {
        application_id: ApplicationId("APP-OFFLINE".to_string()),
        loan_type: args.loan_type.as_deref().and_then(LoanType::parse),
        requested_amount: args.amount,
        documents,
    };

    let scorer = FallbackScorer::new(ScoringConfig::default());
    let mut report = scorer.score(&request);
    metrics::apply(&mut report);
    report.normalize();

    let rendered = serde_json::to_string_pretty(&report)
        .unwrap_or_else(|_| "{\"error\": \"report serialization failed\"}".to_string());
    println!("{rendered}");
    Ok(())
}
