//! Deterministic fallback risk assessment.
//!
//! Produces a complete analysis report from keyword evidence and simple
//! ratios when the external analyst is unavailable. Behavior is fully
//! determined by the rule tables and [`ScoringConfig`]; there is no
//! randomness and no learned component, so identical documents always score
//! identically.

mod flags;
mod form;
mod income;
mod tables;

pub use flags::extract_risk_flags;
pub use form::{extract_profile, ApplicantProfile};
pub use income::{estimate_monthly_income, IncomeEstimate, IncomeSource, DEFAULT_MONTHLY_INCOME};
pub use tables::{apply_rule, count_matches, CountBand, KeywordRule, ScoringText, TextSegment};

use serde_json::json;

use super::report::{
    AdjustmentKind, AnalysisReport, DocumentTexts, FinancialFigures, RiskScoreAnalysis,
    ScoreBreakdownEntry,
};
use super::AnalysisRequest;
use crate::workflows::lending::applications::domain::LoanType;

/// Decision thresholds for one loan product: scores at or above `approve`
/// are Low risk, at or above `review` Medium, below that High.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionThresholds {
    pub approve: i64,
    pub review: i64,
}

/// Immutable scoring rubric. Defaults reproduce the production rule set;
/// tests construct variants to probe band edges.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub base_micro_business: i64,
    pub base_personal: i64,
    pub base_car: i64,
    pub base_housing: i64,
    pub base_unknown: i64,
    pub micro_business: DecisionThresholds,
    pub personal: DecisionThresholds,
    pub car: DecisionThresholds,
    pub housing: DecisionThresholds,
    pub unknown: DecisionThresholds,
    /// Assumed tenure when reporting raw figures for the metrics pass.
    pub default_tenure_months: f64,
    pub min_score: i64,
    pub max_score: i64,
}

impl ScoringConfig {
    fn base_score(&self, loan_type: Option<LoanType>) -> i64 {
        match loan_type {
            Some(LoanType::MicroBusiness) => self.base_micro_business,
            Some(LoanType::Personal) => self.base_personal,
            Some(LoanType::Car) => self.base_car,
            Some(LoanType::Housing) => self.base_housing,
            None => self.base_unknown,
        }
    }

    fn thresholds(&self, loan_type: Option<LoanType>) -> DecisionThresholds {
        match loan_type {
            Some(LoanType::MicroBusiness) => self.micro_business,
            Some(LoanType::Personal) => self.personal,
            Some(LoanType::Car) => self.car,
            Some(LoanType::Housing) => self.housing,
            None => self.unknown,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_micro_business: 60,
            base_personal: 65,
            base_car: 70,
            base_housing: 55,
            base_unknown: 65,
            micro_business: DecisionThresholds { approve: 65, review: 45 },
            personal: DecisionThresholds { approve: 70, review: 50 },
            car: DecisionThresholds { approve: 75, review: 55 },
            housing: DecisionThresholds { approve: 80, review: 60 },
            unknown: DecisionThresholds { approve: 70, review: 50 },
            default_tenure_months: 24.0,
            min_score: 20,
            max_score: 95,
        }
    }
}

/// Stateless scorer applying the rubric to one application.
pub struct FallbackScorer {
    config: ScoringConfig,
}

impl FallbackScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, request: &AnalysisRequest) -> AnalysisReport {
        let documents = &request.documents;
        let profile = extract_profile(
            &documents.application_form,
            &request.application_id.0,
            request.loan_type,
            request.requested_amount,
        );
        // The form checkbox wins over the declared intent, same as the
        // profile's own loan_type field.
        let loan_type = profile
            .loan_type
            .as_deref()
            .and_then(LoanType::parse)
            .or(request.loan_type);
        let requested_amount = profile.requested_amount;

        let text = ScoringText {
            combined: documents.combined_text().to_lowercase(),
            bank: documents.bank_statement.to_lowercase(),
            essay: documents.essay.to_lowercase(),
            payslip: documents.payslip.to_lowercase(),
        };

        let mut breakdown: Vec<ScoreBreakdownEntry> = Vec::new();
        let mut score = self.config.base_score(loan_type);
        let income = estimate_monthly_income(&documents.bank_statement, &documents.payslip);

        let rules = match loan_type {
            Some(LoanType::MicroBusiness) => tables::BUSINESS_RULES,
            Some(LoanType::Personal) => tables::PERSONAL_RULES,
            Some(LoanType::Car) => tables::CAR_RULES,
            Some(LoanType::Housing) => tables::HOUSING_RULES,
            None => tables::GENERIC_RULES,
        };
        for rule in rules {
            score += apply_rule(rule, &text, &mut breakdown);
        }
        score += ratio_adjustments(loan_type, requested_amount, income.amount, &mut breakdown);

        for rule in tables::COMMON_RULES {
            score += apply_rule(rule, &text, &mut breakdown);
        }
        score += documentation_adjustment(documents.provided_count(), &mut breakdown);

        let final_score = score.clamp(self.config.min_score, self.config.max_score);
        let thresholds = self.config.thresholds(loan_type);
        let (risk_level, decision) = if final_score >= thresholds.approve {
            ("Low", "Approved")
        } else if final_score >= thresholds.review {
            ("Medium", "Review Required")
        } else {
            ("High", "Rejected")
        };

        let key_risk_flags = extract_risk_flags(documents, loan_type);

        let combined_len = documents.combined_text().len();
        let ai_reasoning_log = vec![
            "[FALLBACK] AI analysis unavailable, using document-based heuristics".to_string(),
            format!(
                "[FALLBACK] Extracted applicant info from Application Form: {}",
                profile.name
            ),
            format!("[FALLBACK] Processed {combined_len} characters of content"),
            format!("[FALLBACK] Applied {} scoring factors", breakdown.len()),
            format!("[FALLBACK] Generated risk score: {final_score}"),
        ];

        let financial_data_extraction = FinancialFigures {
            monthly_net_income: income.amount,
            loan_amount: requested_amount,
            loan_tenure_months: self.config.default_tenure_months,
            family_members: profile.family_members.unwrap_or(0) as f64,
            ..FinancialFigures::default()
        };

        AnalysisReport {
            applicant_profile: serde_json::to_value(&profile).unwrap_or_else(|_| json!({})),
            risk_score_analysis: RiskScoreAnalysis {
                final_score: Some(final_score),
                risk_level: Some(risk_level.to_string()),
                score_breakdown: breakdown,
            },
            financial_data_extraction,
            key_risk_flags,
            ai_reasoning_log,
            risk_score: Some(final_score),
            risk_level: Some(risk_level.to_string()),
            final_decision: Some(decision.to_string()),
            document_texts: DocumentTexts {
                bank_statement: documents.bank_statement.clone(),
                essay: documents.essay.clone(),
                payslip: documents.payslip.clone(),
            },
            ..AnalysisReport::default()
        }
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

fn whole_rm(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let raw = rounded.abs().to_string();
    let mut grouped = String::new();
    let digits: Vec<char> = raw.chars().collect();
    for (index, digit) in digits.iter().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*digit);
    }
    if rounded < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Loan-type affordability checks over the estimated income. Unlike the
/// keyword passes these differ structurally per product, so they stay code.
fn ratio_adjustments(
    loan_type: Option<LoanType>,
    requested_amount: f64,
    monthly_income: f64,
    breakdown: &mut Vec<ScoreBreakdownEntry>,
) -> i64 {
    let mut delta = 0;
    match loan_type {
        Some(LoanType::MicroBusiness) => {
            // 10% annual interest against estimated monthly revenue.
            if requested_amount > 0.0 && monthly_income > 0.0 {
                let ratio = (requested_amount * 0.1) / monthly_income;
                if ratio < 0.3 {
                    delta += 10;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "Excellent Debt Service Ratio".to_string(),
                        points: 10,
                        reason: format!("Low debt service burden ({})", percent(ratio)),
                        kind: AdjustmentKind::Positive,
                    });
                } else if ratio > 0.5 {
                    delta -= 12;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "High Debt Service Risk".to_string(),
                        points: -12,
                        reason: format!("High debt service burden ({})", percent(ratio)),
                        kind: AdjustmentKind::Negative,
                    });
                }
            }
        }
        Some(LoanType::Personal) => {
            // Five-year term assumption.
            if requested_amount > 0.0 && monthly_income > 0.0 {
                let dti = (requested_amount / 60.0) / monthly_income;
                if dti < 0.2 {
                    delta += 10;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "Low Personal DTI Ratio".to_string(),
                        points: 10,
                        reason: format!("Manageable debt-to-income ratio ({})", percent(dti)),
                        kind: AdjustmentKind::Positive,
                    });
                } else if dti > 0.4 {
                    delta -= 15;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "High Personal DTI Risk".to_string(),
                        points: -15,
                        reason: format!("High debt-to-income ratio ({})", percent(dti)),
                        kind: AdjustmentKind::Negative,
                    });
                }
            }
        }
        Some(LoanType::Car) => {
            if requested_amount > 0.0 {
                if requested_amount <= 50000.0 {
                    delta += 8;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "Reasonable Vehicle Price".to_string(),
                        points: 8,
                        reason: format!("Moderate loan amount (RM {})", whole_rm(requested_amount)),
                        kind: AdjustmentKind::Positive,
                    });
                } else if requested_amount > 100000.0 {
                    delta -= 5;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "High-End Vehicle".to_string(),
                        points: -5,
                        reason: format!("Expensive vehicle (RM {})", whole_rm(requested_amount)),
                        kind: AdjustmentKind::Neutral,
                    });
                }
            }
            // Seven-year term assumption.
            if requested_amount > 0.0 && monthly_income > 0.0 {
                let affordability = (requested_amount / 84.0) / monthly_income;
                if affordability < 0.3 {
                    delta += 12;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "Excellent Car Affordability".to_string(),
                        points: 12,
                        reason: format!(
                            "Vehicle easily affordable ({} of income)",
                            percent(affordability)
                        ),
                        kind: AdjustmentKind::Positive,
                    });
                } else if affordability > 0.5 {
                    delta -= 10;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "Vehicle Affordability Concern".to_string(),
                        points: -10,
                        reason: format!("High vehicle cost ratio ({})", percent(affordability)),
                        kind: AdjustmentKind::Negative,
                    });
                }
            }
        }
        Some(LoanType::Housing) => {
            if requested_amount > 0.0 {
                if requested_amount <= 300000.0 {
                    delta += 8;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "Affordable Property".to_string(),
                        points: 8,
                        reason: format!(
                            "Reasonable property price (RM {})",
                            whole_rm(requested_amount)
                        ),
                        kind: AdjustmentKind::Positive,
                    });
                } else if requested_amount > 800000.0 {
                    delta -= 3;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "Premium Property".to_string(),
                        points: -3,
                        reason: format!("High-value property (RM {})", whole_rm(requested_amount)),
                        kind: AdjustmentKind::Neutral,
                    });
                }
            }
            // 4.5% annual interest, interest-only approximation.
            if requested_amount > 0.0 && monthly_income > 0.0 {
                let monthly_mortgage = (requested_amount * 0.045) / 12.0;
                let housing_ratio = monthly_mortgage / monthly_income;
                if housing_ratio < 0.3 {
                    delta += 20;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "Excellent Housing Affordability".to_string(),
                        points: 20,
                        reason: format!(
                            "Very manageable mortgage ({} of income)",
                            percent(housing_ratio)
                        ),
                        kind: AdjustmentKind::Positive,
                    });
                } else if housing_ratio < 0.4 {
                    delta += 10;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "Good Housing Affordability".to_string(),
                        points: 10,
                        reason: format!("Acceptable mortgage ratio ({})", percent(housing_ratio)),
                        kind: AdjustmentKind::Positive,
                    });
                } else if housing_ratio > 0.5 {
                    delta -= 20;
                    breakdown.push(ScoreBreakdownEntry {
                        category: "Housing Affordability Risk".to_string(),
                        points: -20,
                        reason: format!("High mortgage burden ({})", percent(housing_ratio)),
                        kind: AdjustmentKind::Negative,
                    });
                }
            }
        }
        None => {}
    }
    delta
}

fn documentation_adjustment(
    provided: usize,
    breakdown: &mut Vec<ScoreBreakdownEntry>,
) -> i64 {
    match provided {
        3 => {
            breakdown.push(ScoreBreakdownEntry {
                category: "Complete Documentation".to_string(),
                points: 10,
                reason: "All required documents provided".to_string(),
                kind: AdjustmentKind::Positive,
            });
            10
        }
        2 => {
            breakdown.push(ScoreBreakdownEntry {
                category: "Adequate Documentation".to_string(),
                points: 5,
                reason: "2 out of 3 documents provided".to_string(),
                kind: AdjustmentKind::Neutral,
            });
            5
        }
        _ => {
            breakdown.push(ScoreBreakdownEntry {
                category: "Incomplete Documentation".to_string(),
                points: -8,
                reason: "Insufficient documentation provided".to_string(),
                kind: AdjustmentKind::Negative,
            });
            -8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::lending::applications::domain::{ApplicationId, DocumentBundle};

    fn request(loan_type: Option<LoanType>, amount: f64, documents: DocumentBundle) -> AnalysisRequest {
        AnalysisRequest {
            application_id: ApplicationId("APP-000042".to_string()),
            loan_type,
            requested_amount: amount,
            documents,
        }
    }

    fn scorer() -> FallbackScorer {
        FallbackScorer::new(ScoringConfig::default())
    }

    #[test]
    fn score_is_always_clamped() {
        // gambling + debt + missing docs: drives the raw score far below 20
        let toxic = DocumentBundle {
            application_form: String::new(),
            bank_statement: "casino gambling lottery bet existing loan credit card debt installment outstanding balance monthly payment overdraft".repeat(2),
            essay: String::new(),
            payslip: String::new(),
        };
        let report = scorer().score(&request(Some(LoanType::Housing), 900000.0, toxic));
        let score = report.risk_score.expect("score present");
        assert!((20..=95).contains(&score));

        let pristine = DocumentBundle {
            application_form: String::new(),
            bank_statement: "savings history regular transactions account history deposit RM 9,000 savings investment balance".to_string() + &" filler".repeat(20),
            essay: "home house family children spouse married first time buyer ".repeat(4),
            payslip: "permanent senior manager professional government years experience Basic Salary: RM 20,000".to_string() + &" filler".repeat(20),
        };
        let report = scorer().score(&request(Some(LoanType::Housing), 100000.0, pristine));
        let score = report.risk_score.expect("score present");
        assert!((20..=95).contains(&score));
    }

    #[test]
    fn unknown_loan_type_uses_generic_path() {
        let documents = DocumentBundle {
            application_form: String::new(),
            bank_statement: "salary deposit credit payment received savings investment balance"
                .to_string()
                + &" filler".repeat(20),
            essay: String::new(),
            payslip: String::new(),
        };
        let report = scorer().score(&request(None, 10000.0, documents));
        let categories: Vec<&str> = report
            .risk_score_analysis
            .score_breakdown
            .iter()
            .map(|entry| entry.category.as_str())
            .collect();
        assert!(categories.contains(&"Income Evidence"));
        assert!(categories.contains(&"Financial Health"));
    }

    #[test]
    fn decision_uses_loan_type_thresholds() {
        // Identical scores decide differently per product: base 70 for car vs
        // threshold 75 means Review, while the same 70 approves a personal loan.
        let documents = DocumentBundle::default();
        let car = scorer().score(&request(Some(LoanType::Car), 0.0, documents.clone()));
        // base 70, incomplete documentation -8 => 62 => High for car (review=55 => Medium)
        assert_eq!(car.risk_score, Some(62));
        assert_eq!(car.risk_level.as_deref(), Some("Medium"));
        assert_eq!(car.final_decision.as_deref(), Some("Review Required"));

        let micro = scorer().score(&request(Some(LoanType::MicroBusiness), 0.0, documents));
        // base 60 - 8 => 52 => Medium for micro-business (review=45)
        assert_eq!(micro.risk_score, Some(52));
        assert_eq!(micro.final_decision.as_deref(), Some("Review Required"));
    }

    #[test]
    fn form_checkbox_overrides_declared_loan_type() {
        let documents = DocumentBundle {
            application_form: "NAME: Tan Mei Ling\nLOAN TYPE:\n[x] Housing\nDESIRED LOAN AMOUNT: RM 250,000\n".to_string(),
            ..DocumentBundle::default()
        };
        let report = scorer().score(&request(Some(LoanType::Personal), 10000.0, documents));
        assert_eq!(
            report.applicant_profile["loan_type"],
            serde_json::json!("Housing Loan")
        );
        // amount from the form, not the declared intent
        assert_eq!(report.applicant_profile["requested_amount"], serde_json::json!(250000.0));
        // affordable-property bonus only exists on the housing path
        assert!(report
            .risk_score_analysis
            .score_breakdown
            .iter()
            .any(|entry| entry.category == "Affordable Property"));
    }

    #[test]
    fn breakdown_records_every_adjustment() {
        let documents = DocumentBundle {
            application_form: String::new(),
            bank_statement: "casino RM 200".to_string() + &" filler".repeat(20),
            essay: String::new(),
            payslip: String::new(),
        };
        let report = scorer().score(&request(Some(LoanType::Personal), 0.0, documents));
        let breakdown = &report.risk_score_analysis.score_breakdown;
        let total: i64 = breakdown.iter().map(|entry| entry.points).sum();
        assert_eq!(
            report.risk_score.expect("score"),
            (65 + total).clamp(20, 95)
        );
        assert!(breakdown
            .iter()
            .any(|entry| entry.category == "High-Risk Activities" && entry.points == -20));
    }

    #[test]
    fn fallback_reports_are_marked() {
        let report = scorer().score(&request(None, 0.0, DocumentBundle::default()));
        assert!(report.is_fallback());
        assert!(report.risk_score_analysis.final_score.is_some());
        assert!(report.key_risk_flags.len() >= 4);
    }
}
