//! Financial ratio recomputation.
//!
//! The analyst is asked to extract raw figures *and* compute ratios from
//! them; arithmetic mistakes in the second half are common, so the six ratios
//! are always recomputed here from the raw figures with fixed formulas. Each
//! ratio is a pure function returning `Result` so callers can tell "computed
//! as 0" apart from "failed to compute"; the report merge in [`apply`] is
//! best-effort and keeps the analyst-provided values when a ratio cannot be
//! recomputed.

use serde_json::json;

use super::report::{AnalysisReport, FinancialFigures, MetricReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MetricError {
    #[error("non-finite input while recomputing {metric}")]
    NonFinite { metric: &'static str },
}

/// Per-ratio recomputation results over one set of raw figures.
#[derive(Debug, Clone)]
pub struct RecalculatedMetrics {
    pub debt_service_ratio: Result<MetricReport, MetricError>,
    pub net_disposable_income: Result<MetricReport, MetricError>,
    pub loan_to_value_ratio: Result<MetricReport, MetricError>,
    pub per_capita_income: Result<MetricReport, MetricError>,
    pub savings_rate: Result<MetricReport, MetricError>,
    pub cost_of_living_ratio: Result<MetricReport, MetricError>,
}

pub fn recalculate(figures: &FinancialFigures) -> RecalculatedMetrics {
    RecalculatedMetrics {
        debt_service_ratio: debt_service_ratio(figures),
        net_disposable_income: net_disposable_income(figures),
        loan_to_value_ratio: loan_to_value_ratio(figures),
        per_capita_income: per_capita_income(figures),
        savings_rate: savings_rate(figures),
        cost_of_living_ratio: cost_of_living_ratio(figures),
    }
}

/// Recomputes the `financial_metrics` block of a report in place. Ratios that
/// fail to recompute keep whatever the analyst supplied; analyst-provided
/// evidence and side fields on replaced metrics are carried over. Never
/// fails.
pub fn apply(report: &mut AnalysisReport) {
    let recalculated = recalculate(&report.financial_data_extraction);
    let block = &mut report.financial_metrics;

    merge(&mut block.debt_service_ratio, recalculated.debt_service_ratio);
    merge(
        &mut block.net_disposable_income,
        recalculated.net_disposable_income,
    );
    merge(&mut block.loan_to_value_ratio, recalculated.loan_to_value_ratio);
    merge(&mut block.per_capita_income, recalculated.per_capita_income);
    merge(&mut block.savings_rate, recalculated.savings_rate);
    merge(
        &mut block.cost_of_living_ratio,
        recalculated.cost_of_living_ratio,
    );
}

fn merge(slot: &mut Option<MetricReport>, recomputed: Result<MetricReport, MetricError>) {
    if let Ok(mut metric) = recomputed {
        if let Some(previous) = slot.take() {
            metric.extra = previous.extra;
        }
        *slot = Some(metric);
    }
}

fn check_finite(metric: &'static str, inputs: &[f64]) -> Result<(), MetricError> {
    if inputs.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(MetricError::NonFinite { metric })
    }
}

/// Monthly installment for the requested loan; 0 when no tenure is known.
fn new_installment(figures: &FinancialFigures) -> f64 {
    if figures.loan_tenure_months > 0.0 {
        figures.loan_amount / figures.loan_tenure_months
    } else {
        0.0
    }
}

fn percentage_string(value: f64) -> String {
    format!("{value:.1}%")
}

/// DSR % = ((existing_debt + loan_amount/tenure) / net_income) * 100,
/// 0 when net_income <= 0. Bands: <40 Low Risk, 40-60 Moderate Risk,
/// >60 High Risk.
pub fn debt_service_ratio(figures: &FinancialFigures) -> Result<MetricReport, MetricError> {
    check_finite(
        "debt_service_ratio",
        &[
            figures.total_monthly_debt,
            figures.loan_amount,
            figures.loan_tenure_months,
            figures.monthly_net_income,
        ],
    )?;

    let installment = new_installment(figures);
    let total_debt = figures.total_monthly_debt + installment;
    let value = if figures.monthly_net_income <= 0.0 {
        0.0
    } else {
        total_debt / figures.monthly_net_income * 100.0
    };

    let assessment = if value < 40.0 {
        "Low Risk (<40%)"
    } else if value <= 60.0 {
        "Moderate Risk (40-60%)"
    } else {
        "High Risk (>60%)"
    };

    Ok(MetricReport {
        value,
        percentage: Some(percentage_string(value)),
        calculation: json!({
            "existing_commitments": figures.total_monthly_debt,
            "estimated_new_installment": installment,
            "total_monthly_debt": total_debt,
            "net_monthly_income": figures.monthly_net_income,
        }),
        assessment: assessment.to_string(),
        extra: Default::default(),
    })
}

/// NDI = net_income - existing_debt - loan_amount/tenure - living_expenses.
/// Bands: >2000 Sufficient Buffer, 1000-2000 Tight, <1000 Critical.
pub fn net_disposable_income(figures: &FinancialFigures) -> Result<MetricReport, MetricError> {
    check_finite(
        "net_disposable_income",
        &[
            figures.monthly_net_income,
            figures.total_monthly_debt,
            figures.loan_amount,
            figures.loan_tenure_months,
            figures.total_living_expenses,
        ],
    )?;

    let installment = new_installment(figures);
    let value = figures.monthly_net_income
        - figures.total_monthly_debt
        - installment
        - figures.total_living_expenses;

    let assessment = if value > 2000.0 {
        "Sufficient Buffer (>RM2000)"
    } else if value >= 1000.0 {
        "Tight (RM1000-2000)"
    } else {
        "Critical (<RM1000)"
    };

    let mut metric = MetricReport {
        value,
        percentage: None,
        calculation: json!({
            "net_income": figures.monthly_net_income,
            "total_debt_commitments": figures.total_monthly_debt + installment,
            "estimated_living_expenses": figures.total_living_expenses,
        }),
        assessment: assessment.to_string(),
        extra: Default::default(),
    };
    metric
        .extra
        .insert("after_living_costs".to_string(), json!(value));
    Ok(metric)
}

/// LTV % = (loan_amount / asset_value) * 100, 0 when asset_value <= 0.
/// Bands: <=80 Within Standard, 80-90 Elevated, >90 High (standard financing
/// margins).
pub fn loan_to_value_ratio(figures: &FinancialFigures) -> Result<MetricReport, MetricError> {
    check_finite("loan_to_value_ratio", &[figures.loan_amount, figures.asset_value])?;

    let value = if figures.asset_value <= 0.0 {
        0.0
    } else {
        figures.loan_amount / figures.asset_value * 100.0
    };

    let assessment = if value <= 80.0 {
        "Within Standard (<=80%)"
    } else if value <= 90.0 {
        "Elevated (80-90%)"
    } else {
        "High (>90%)"
    };

    Ok(MetricReport {
        value,
        percentage: Some(percentage_string(value)),
        calculation: json!({
            "loan_amount": figures.loan_amount,
            "asset_value": figures.asset_value,
        }),
        assessment: assessment.to_string(),
        extra: Default::default(),
    })
}

/// Per-capita income = net_income / max(family_members, 1). Bands:
/// >2000 Comfortable, 1000-2000 Moderate, <1000 Struggling.
pub fn per_capita_income(figures: &FinancialFigures) -> Result<MetricReport, MetricError> {
    check_finite(
        "per_capita_income",
        &[figures.monthly_net_income, figures.family_members],
    )?;

    let members = figures.family_members.floor().max(1.0);
    let value = figures.monthly_net_income / members;

    let assessment = if value > 2000.0 {
        "Comfortable (>RM2000)"
    } else if value >= 1000.0 {
        "Moderate (RM1000-2000)"
    } else {
        "Struggling (<RM1000)"
    };

    Ok(MetricReport {
        value,
        percentage: None,
        calculation: json!({
            "net_monthly_income": figures.monthly_net_income,
            "family_members": members as i64,
        }),
        assessment: assessment.to_string(),
        extra: Default::default(),
    })
}

/// Savings rate % = (closing_balance / net_income) * 100, 0 when net_income
/// <= 0. Bands: >50 High Saver, 20-50 Moderate, <20 Low Saver.
pub fn savings_rate(figures: &FinancialFigures) -> Result<MetricReport, MetricError> {
    check_finite(
        "savings_rate",
        &[figures.monthly_closing_balance, figures.monthly_net_income],
    )?;

    let value = if figures.monthly_net_income <= 0.0 {
        0.0
    } else {
        figures.monthly_closing_balance / figures.monthly_net_income * 100.0
    };

    let assessment = if value > 50.0 {
        "High Saver (>50%)"
    } else if value >= 20.0 {
        "Moderate (20-50%)"
    } else {
        "Low Saver (<20%)"
    };

    Ok(MetricReport {
        value,
        percentage: Some(percentage_string(value)),
        calculation: json!({
            "monthly_closing_balance": figures.monthly_closing_balance,
            "monthly_income": figures.monthly_net_income,
        }),
        assessment: assessment.to_string(),
        extra: Default::default(),
    })
}

/// Cost-of-living % = (living_expenses / net_income) * 100, 0 when net_income
/// <= 0. Bands: <30 Frugal, 30-50 Moderate, >50 High.
pub fn cost_of_living_ratio(figures: &FinancialFigures) -> Result<MetricReport, MetricError> {
    check_finite(
        "cost_of_living_ratio",
        &[figures.total_living_expenses, figures.monthly_net_income],
    )?;

    let value = if figures.monthly_net_income <= 0.0 {
        0.0
    } else {
        figures.total_living_expenses / figures.monthly_net_income * 100.0
    };

    let assessment = if value < 30.0 {
        "Frugal (<30%)"
    } else if value <= 50.0 {
        "Moderate (30-50%)"
    } else {
        "High (>50%)"
    };

    Ok(MetricReport {
        value,
        percentage: Some(percentage_string(value)),
        calculation: json!({
            "total_living_expenses": figures.total_living_expenses,
            "net_income": figures.monthly_net_income,
        }),
        assessment: assessment.to_string(),
        extra: Default::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn figures() -> FinancialFigures {
        FinancialFigures {
            monthly_gross_income: 5000.0,
            monthly_net_income: 4000.0,
            total_monthly_debt: 500.0,
            total_living_expenses: 1200.0,
            monthly_closing_balance: 1500.0,
            asset_value: 30000.0,
            loan_amount: 24000.0,
            loan_tenure_months: 24.0,
            family_members: 3.0,
        }
    }

    #[test]
    fn ndi_matches_documented_example() {
        // 4000 - 500 - 24000/24 - 1200 = 1300
        let metric = net_disposable_income(&figures()).expect("ndi computes");
        assert_eq!(metric.value, 1300.0);
        assert_eq!(metric.assessment, "Tight (RM1000-2000)");
    }

    #[test]
    fn dsr_uses_installment_plus_existing_debt() {
        // (500 + 1000) / 4000 * 100 = 37.5
        let metric = debt_service_ratio(&figures()).expect("dsr computes");
        assert_eq!(metric.value, 37.5);
        assert_eq!(metric.percentage.as_deref(), Some("37.5%"));
        assert_eq!(metric.assessment, "Low Risk (<40%)");
    }

    #[test]
    fn zero_denominators_yield_zero_not_panic() {
        let zeroed = FinancialFigures::default();
        assert_eq!(debt_service_ratio(&zeroed).unwrap().value, 0.0);
        assert_eq!(loan_to_value_ratio(&zeroed).unwrap().value, 0.0);
        assert_eq!(savings_rate(&zeroed).unwrap().value, 0.0);
        assert_eq!(cost_of_living_ratio(&zeroed).unwrap().value, 0.0);

        let mut negative_income = figures();
        negative_income.monthly_net_income = -100.0;
        assert_eq!(debt_service_ratio(&negative_income).unwrap().value, 0.0);
        assert_eq!(savings_rate(&negative_income).unwrap().value, 0.0);
        assert_eq!(cost_of_living_ratio(&negative_income).unwrap().value, 0.0);
    }

    #[test]
    fn per_capita_clamps_family_members() {
        let mut solo = figures();
        solo.family_members = 0.0;
        let metric = per_capita_income(&solo).expect("per capita computes");
        assert_eq!(metric.value, 4000.0);
        assert_eq!(metric.assessment, "Comfortable (>RM2000)");

        let metric = per_capita_income(&figures()).expect("per capita computes");
        assert!((metric.value - 4000.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_inputs_are_reported_not_propagated() {
        let mut poisoned = figures();
        poisoned.asset_value = f64::NAN;
        assert!(matches!(
            loan_to_value_ratio(&poisoned),
            Err(MetricError::NonFinite { metric: "loan_to_value_ratio" })
        ));
        // the rest of the block still computes
        assert!(debt_service_ratio(&poisoned).is_ok());
    }

    #[test]
    fn apply_keeps_analyst_values_when_recompute_fails() {
        let mut report = AnalysisReport::default();
        report.financial_data_extraction = figures();
        report.financial_data_extraction.loan_amount = f64::INFINITY;
        report.financial_metrics.loan_to_value_ratio = Some(MetricReport {
            value: 72.0,
            percentage: Some("72.0%".to_string()),
            calculation: serde_json::json!({}),
            assessment: "analyst supplied".to_string(),
            extra: Default::default(),
        });

        apply(&mut report);

        let ltv = report
            .financial_metrics
            .loan_to_value_ratio
            .as_ref()
            .expect("ltv present");
        assert_eq!(ltv.value, 72.0);
        assert_eq!(ltv.assessment, "analyst supplied");
        // savings rate does not depend on loan_amount and is replaced
        assert!(report.financial_metrics.savings_rate.is_some());
    }

    #[test]
    fn apply_is_idempotent() {
        let mut report = AnalysisReport {
            financial_data_extraction: figures(),
            ..AnalysisReport::default()
        };
        apply(&mut report);
        let first = report.financial_metrics.clone();
        apply(&mut report);
        assert_eq!(report.financial_metrics, first);
    }
}
