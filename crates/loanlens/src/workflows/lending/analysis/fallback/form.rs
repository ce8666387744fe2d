//! Regex extraction of applicant details from the application form text.
//!
//! The form is a fixed template with labeled fields and `[x]` checkboxes, so
//! anchored patterns are enough; anything that does not match stays `None`
//! and the profile degrades to placeholder values.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::workflows::lending::applications::domain::LoanType;

/// Applicant details as exposed in `applicant_profile`. Field names are part
/// of the report wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub name: String,
    pub ic_number: String,
    pub loan_type: Option<String>,
    pub requested_amount: f64,
    pub annual_income: Option<i64>,
    pub period: Option<String>,
    pub loan_purpose: Option<Vec<String>>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<String>,
    pub marital_status: Option<String>,
    pub family_members: Option<i64>,
    pub bank_institution: Option<String>,
    pub bank_account: Option<String>,
    pub id: String,
}

struct FormPatterns {
    name: Regex,
    ic_number: Regex,
    desired_amount: Regex,
    annual_income: Regex,
    period: Regex,
    phone: Regex,
    email: Regex,
    address: Regex,
    birth_date: Regex,
    marital_status: Regex,
    family_members: Regex,
    bank_institution: Regex,
    bank_account: Regex,
    loan_types: [(Regex, LoanType); 4],
    purposes: [(Regex, &'static str); 8],
    other_purpose: Regex,
}

fn field_pattern(raw: &str) -> Regex {
    RegexBuilder::new(raw)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .expect("valid form pattern")
}

fn patterns() -> &'static FormPatterns {
    static PATTERNS: OnceLock<FormPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| FormPatterns {
        name: field_pattern(r"NAME\s*:\s*([^\n]+)"),
        ic_number: field_pattern(r"(?:MYKAD|PASSPORT)\s*NO\s*:\s*([^\n]+)"),
        desired_amount: field_pattern(r"DESIRED LOAN AMOUNT[^\d]*(\d[\d,]*)"),
        annual_income: field_pattern(r"ANNUAL INCOME[^\d]*(\d[\d,]*)"),
        period: field_pattern(r"PERIOD\s*:\s*([^\n]+)"),
        phone: field_pattern(r"PHONE\s*NO\s*:\s*([^\n]+)"),
        email: field_pattern(r"EMAIL\s*:\s*([^\n]+)"),
        address: field_pattern(r"ADDRESS\s*:\s*([^\n]+)"),
        birth_date: field_pattern(r"BIRTH\s*DATE\s*:\s*([^\n]+)"),
        marital_status: field_pattern(r"MARITAL\s*STATUS\s*:\s*([^\n]+)"),
        family_members: field_pattern(r"NUMBER\s*OF\s*FAMILY\s*MEMBERS\s*:\s*(\d+)"),
        bank_institution: field_pattern(r"INSTITUTION\s*NAME\s*:\s*([^\n]+)"),
        bank_account: field_pattern(r"SAVING\s*ACCOUNT\s*:\s*([^\n]+)"),
        loan_types: [
            (field_pattern(r"\[x\]\s*Micro-Business"), LoanType::MicroBusiness),
            (field_pattern(r"\[x\]\s*Personal"), LoanType::Personal),
            (field_pattern(r"\[x\]\s*Housing"), LoanType::Housing),
            (field_pattern(r"\[x\]\s*Car"), LoanType::Car),
        ],
        purposes: [
            (field_pattern(r"\[x\]\s*Business\s*Launching"), "Business Launching"),
            (field_pattern(r"\[x\]\s*House\s*Buying"), "House Buying"),
            (field_pattern(r"\[x\]\s*Home\s*Improvement"), "Home Improvement"),
            (field_pattern(r"\[x\]\s*Investment"), "Investment"),
            (field_pattern(r"\[x\]\s*Education"), "Education"),
            (field_pattern(r"\[x\]\s*Car\s*Buying"), "Car Buying"),
            (field_pattern(r"\[x\]\s*Credit\s*Cards"), "Credit Cards"),
            (field_pattern(r"\[x\]\s*Internet\s*Loans"), "Internet Loans"),
        ],
        other_purpose: field_pattern(r"\[x\]\s*Other[:\s]+([^\n]+)"),
    })
}

pub fn extract_field(text: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn extract_number(text: &str, pattern: &Regex) -> Option<i64> {
    extract_field(text, pattern).and_then(|raw| {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        digits.parse::<i64>().ok()
    })
}

pub fn extract_loan_type(text: &str) -> Option<LoanType> {
    patterns()
        .loan_types
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, loan_type)| *loan_type)
}

pub fn extract_loan_purposes(text: &str) -> Option<Vec<String>> {
    let p = patterns();
    let mut purposes: Vec<String> = p
        .purposes
        .iter()
        .filter(|(pattern, _)| pattern.is_match(text))
        .map(|(_, label)| label.to_string())
        .collect();

    if let Some(other) = extract_field(text, &p.other_purpose) {
        purposes.push(format!("Other: {other}"));
    }

    if purposes.is_empty() {
        None
    } else {
        Some(purposes)
    }
}

/// Builds the applicant profile, falling back to the intake-declared loan
/// type and amount when the form does not carry them.
pub fn extract_profile(
    form_text: &str,
    application_id: &str,
    declared_loan_type: Option<LoanType>,
    declared_amount: f64,
) -> ApplicantProfile {
    let p = patterns();

    let loan_type = extract_loan_type(form_text)
        .or(declared_loan_type)
        .map(|loan_type| loan_type.label().to_string());
    let requested_amount = extract_number(form_text, &p.desired_amount)
        .map(|amount| amount as f64)
        .unwrap_or(declared_amount);

    ApplicantProfile {
        name: extract_field(form_text, &p.name).unwrap_or_else(|| "Unknown Applicant".to_string()),
        ic_number: extract_field(form_text, &p.ic_number).unwrap_or_else(|| "N/A".to_string()),
        loan_type,
        requested_amount,
        annual_income: extract_number(form_text, &p.annual_income),
        period: extract_field(form_text, &p.period),
        loan_purpose: extract_loan_purposes(form_text),
        phone: extract_field(form_text, &p.phone),
        email: extract_field(form_text, &p.email),
        address: extract_field(form_text, &p.address),
        birth_date: extract_field(form_text, &p.birth_date),
        marital_status: extract_field(form_text, &p.marital_status),
        family_members: extract_number(form_text, &p.family_members),
        bank_institution: extract_field(form_text, &p.bank_institution),
        bank_account: extract_field(form_text, &p.bank_account),
        id: application_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = "NAME: Aminah binti Hassan\n\
MYKAD NO: 880101-14-5566\n\
PHONE NO: 012-3456789\n\
EMAIL: aminah@example.com\n\
ADDRESS: 12 Jalan Melur, Ipoh\n\
BIRTH DATE: 01/01/1988\n\
MARITAL STATUS: Married\n\
NUMBER OF FAMILY MEMBERS: 4\n\
ANNUAL INCOME: RM 54,000\n\
DESIRED LOAN AMOUNT: RM 30,000\n\
PERIOD: 5 years\n\
LOAN TYPE:\n[ ] Personal\n[x] Micro-Business\n\
LOAN WILL BE USED FOR:\n[x] Business Launching\n[x] Other: stall renovation\n\
INSTITUTION NAME: Maybank\n\
SAVING ACCOUNT: 1122334455\n";

    #[test]
    fn extracts_labeled_fields() {
        let profile = extract_profile(FORM, "APP-000001", None, 0.0);
        assert_eq!(profile.name, "Aminah binti Hassan");
        assert_eq!(profile.ic_number, "880101-14-5566");
        assert_eq!(profile.loan_type.as_deref(), Some("Micro-Business Loan"));
        assert_eq!(profile.requested_amount, 30000.0);
        assert_eq!(profile.annual_income, Some(54000));
        assert_eq!(profile.family_members, Some(4));
        assert_eq!(
            profile.loan_purpose,
            Some(vec![
                "Business Launching".to_string(),
                "Other: stall renovation".to_string()
            ])
        );
        assert_eq!(profile.bank_institution.as_deref(), Some("Maybank"));
        assert_eq!(profile.id, "APP-000001");
    }

    #[test]
    fn falls_back_to_declared_intent() {
        let profile = extract_profile("", "APP-000002", Some(LoanType::Car), 80000.0);
        assert_eq!(profile.name, "Unknown Applicant");
        assert_eq!(profile.ic_number, "N/A");
        assert_eq!(profile.loan_type.as_deref(), Some("Car Loan"));
        assert_eq!(profile.requested_amount, 80000.0);
        assert_eq!(profile.loan_purpose, None);
    }

    #[test]
    fn unchecked_boxes_are_ignored() {
        assert_eq!(extract_loan_type("[ ] Personal\n[ ] Car"), None);
    }
}
