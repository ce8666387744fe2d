//! Best-effort monthly income estimation from document text.
//!
//! Order of preference: a labeled salary figure on the payslip, then the
//! largest RM amount visible on the bank statement, then a constant default.

use std::sync::OnceLock;

use regex::Regex;

/// Used when neither document yields a figure.
pub const DEFAULT_MONTHLY_INCOME: f64 = 4000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomeSource {
    Payslip,
    BankDeposit,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncomeEstimate {
    pub amount: f64,
    pub source: IncomeSource,
}

fn payslip_patterns() -> &'static [Regex; 4] {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"gross pay[:\s]*rm\s*([0-9,]+)").expect("valid pattern"),
            Regex::new(r"basic salary[:\s]*rm\s*([0-9,]+)").expect("valid pattern"),
            Regex::new(r"monthly salary[:\s]*rm\s*([0-9,]+)").expect("valid pattern"),
            Regex::new(r"net pay[:\s]*rm\s*([0-9,]+)").expect("valid pattern"),
        ]
    })
}

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"rm\s*([0-9,]+)").expect("valid pattern"))
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

pub fn estimate_monthly_income(bank_text: &str, payslip_text: &str) -> IncomeEstimate {
    let payslip = payslip_text.to_lowercase();
    for pattern in payslip_patterns() {
        if let Some(captures) = pattern.captures(&payslip) {
            if let Some(amount) = captures.get(1).and_then(|m| parse_amount(m.as_str())) {
                return IncomeEstimate {
                    amount,
                    source: IncomeSource::Payslip,
                };
            }
        }
    }

    let bank = bank_text.to_lowercase();
    let largest_deposit = amount_pattern()
        .captures_iter(&bank)
        .filter_map(|captures| captures.get(1).and_then(|m| parse_amount(m.as_str())))
        .fold(None::<f64>, |best, amount| {
            Some(best.map_or(amount, |current| current.max(amount)))
        });

    if let Some(amount) = largest_deposit {
        return IncomeEstimate {
            amount,
            source: IncomeSource::BankDeposit,
        };
    }

    IncomeEstimate {
        amount: DEFAULT_MONTHLY_INCOME,
        source: IncomeSource::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payslip_label_wins_over_bank_deposits() {
        let estimate = estimate_monthly_income(
            "Deposit RM 9,000 bonus",
            "Basic Salary: RM 4,200\nNet Pay: RM 3,900",
        );
        assert_eq!(estimate.amount, 4200.0);
        assert_eq!(estimate.source, IncomeSource::Payslip);
    }

    #[test]
    fn falls_back_to_largest_bank_amount() {
        let estimate = estimate_monthly_income(
            "salary credit rm 3,500\ntransfer RM 120\nFD placement RM 8,000",
            "no labels here",
        );
        assert_eq!(estimate.amount, 8000.0);
        assert_eq!(estimate.source, IncomeSource::BankDeposit);
    }

    #[test]
    fn defaults_when_nothing_is_found() {
        let estimate = estimate_monthly_income("", "");
        assert_eq!(estimate.amount, DEFAULT_MONTHLY_INCOME);
        assert_eq!(estimate.source, IncomeSource::Default);
    }
}
