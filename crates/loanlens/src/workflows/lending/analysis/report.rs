use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Score bands used when an analyst report carries a score but no decision.
const APPROVE_SCORE: i64 = 70;
const REVIEW_SCORE: i64 = 50;

/// One adjustment applied while scoring, kept for auditability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdownEntry {
    pub category: String,
    pub points: i64,
    pub reason: String,
    #[serde(rename = "type")]
    pub kind: AdjustmentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    Positive,
    Negative,
    Neutral,
}

/// Evidence-backed risk flag surfaced to reviewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFlag {
    pub flag: String,
    pub severity: String,
    pub description: String,
    pub evidence_quote: String,
    pub document_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_justification: Option<String>,
}

/// Raw numeric fields claimed by the extraction step. Every field degrades to
/// 0.0 when absent or unparsable so downstream arithmetic never sees a parse
/// failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialFigures {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub monthly_gross_income: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub monthly_net_income: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_monthly_debt: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_living_expenses: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub monthly_closing_balance: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub asset_value: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub loan_amount: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub loan_tenure_months: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub family_members: f64,
}

/// Accepts numbers, numeric strings ("4,500" included), or anything else as
/// 0.0.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(coerce_f64(&raw))
}

pub(crate) fn coerce_f64(raw: &Value) -> f64 {
    match raw {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.replace(',', "").trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// One recomputed metric as exposed in `financial_metrics.*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<String>,
    pub calculation: Value,
    pub assessment: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The six-ratio block of the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetricsBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debt_service_ratio: Option<MetricReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_disposable_income: Option<MetricReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_to_value_ratio: Option<MetricReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_capita_income: Option<MetricReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings_rate: Option<MetricReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_of_living_ratio: Option<MetricReport>,
}

/// Nested score block: `risk_score_analysis.*`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskScoreAnalysis {
    #[serde(default)]
    pub final_score: Option<i64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub score_breakdown: Vec<ScoreBreakdownEntry>,
}

/// Original document texts attached for reviewer display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTexts {
    #[serde(default)]
    pub bank_statement: String,
    #[serde(default)]
    pub essay: String,
    #[serde(default)]
    pub payslip: String,
}

/// Complete analysis report. Field names are a wire contract shared with the
/// external analyst; unknown analyst fields ride along in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub applicant_profile: Value,
    #[serde(default)]
    pub risk_score_analysis: RiskScoreAnalysis,
    #[serde(default)]
    pub financial_data_extraction: FinancialFigures,
    #[serde(default)]
    pub financial_metrics: FinancialMetricsBlock,
    #[serde(default)]
    pub key_risk_flags: Vec<RiskFlag>,
    #[serde(default)]
    pub ai_reasoning_log: Vec<String>,
    #[serde(default)]
    pub risk_score: Option<i64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub final_decision: Option<String>,
    #[serde(default)]
    pub document_texts: DocumentTexts,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisReport {
    /// Promotes nested score fields to the top level and derives a missing
    /// decision from the score bands, mirroring how analyst responses are
    /// reconciled before persistence.
    pub fn normalize(&mut self) {
        if self.risk_score.is_none() {
            self.risk_score = self.risk_score_analysis.final_score;
        }
        if self.risk_level.is_none() {
            self.risk_level = self.risk_score_analysis.risk_level.clone();
        }
        if self.final_decision.is_none() {
            if let Some(score) = self.risk_score {
                self.final_decision = Some(decision_for_score(score).to_string());
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.ai_reasoning_log
            .iter()
            .any(|line| line.contains("[FALLBACK]"))
    }
}

pub fn decision_for_score(score: i64) -> &'static str {
    if score >= APPROVE_SCORE {
        "Approved"
    } else if score >= REVIEW_SCORE {
        "Review Required"
    } else {
        "Rejected"
    }
}
