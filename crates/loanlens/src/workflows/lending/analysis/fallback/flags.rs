//! Evidence-backed risk flags pulled straight from document text.
//!
//! Reviewers see these verbatim, so every flag cites the line or sentence
//! that triggered it. The pipeline guarantees at least four flags per
//! application; when the documents are too clean, generic verification flags
//! pad the list.

use std::sync::OnceLock;

use regex::Regex;

use crate::workflows::lending::analysis::report::RiskFlag;
use crate::workflows::lending::applications::domain::{DocumentBundle, LoanType};

const MIN_RISK_FLAGS: usize = 4;
const LARGE_WITHDRAWAL_THRESHOLD: f64 = 5000.0;

const PAYSLIP_DEDUCTION_KEYWORDS: &[&str] = &[
    "loan deduction", "ptptn", "housing loan", "car loan", "personal loan", "court order",
    "garnishment", "debt recovery", "repayment",
];
const GAMBLING_KEYWORDS: &[&str] = &[
    "casino", "gambling", "genting", "jackpot", "lottery", "sports bet", "online bet", "4d",
    "toto", "magnum",
];
const CRYPTO_KEYWORDS: &[&str] = &[
    "binance", "coinbase", "crypto.com", "bitcoin", "ethereum", "btc", "eth",
];
const OVERDRAFT_KEYWORDS: &[&str] = &[
    "overdraft", "insufficient fund", "nsf", "bounced", "penalty", "late fee",
];
const ESSAY_DEBT_KEYWORDS: &[&str] = &[
    "ptptn", "default", "existing loan", "debt", "owe", "outstanding", "arrears", "pay off",
    "clear debt",
];
const ESSAY_CRITICAL_DEBT_KEYWORDS: &[&str] = &["default", "ptptn", "arrears"];
const ESSAY_CONCERN_KEYWORDS: &[(&str, &str)] = &[
    ("complex", "financial complexity"),
    ("difficult", "financial difficulties"),
    ("struggle", "financial struggles"),
    ("challenge", "financial challenges"),
    ("crisis", "financial crisis"),
    ("tight", "tight finances"),
    ("burden", "financial burden"),
];
const BUSINESS_PERSONAL_USE_KEYWORDS: &[&str] = &[
    "car", "vehicle", "house renovation", "wedding", "vacation", "personal use",
];

fn salary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(basic salary|gross pay|net pay|net salary|total earnings)[:\s]*rm\s*([0-9,]+)")
            .expect("valid pattern")
    })
}

fn withdrawal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(withdrawal|cash|atm)[^\n]*rm\s*([0-9,]+)").expect("valid pattern")
    })
}

fn tenure_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\s*(year|yr)").expect("valid pattern"))
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

/// "RM 4,500.00" style formatting for evidence text.
fn format_rm(amount: f64) -> String {
    let formatted = format!("{amount:.2}");
    let (integer, decimals) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let mut grouped = String::new();
    let digits: Vec<char> = integer.chars().collect();
    for (index, digit) in digits.iter().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 && *digit != '-' {
            grouped.push(',');
        }
        grouped.push(*digit);
    }
    format!("{grouped}.{decimals}")
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn lines_containing<'a>(text: &'a str, keywords: &[&str], limit: usize) -> Vec<&'a str> {
    let mut lines = Vec::new();
    for line in text.lines() {
        let lower = line.to_lowercase();
        if keywords.iter().any(|keyword| lower.contains(keyword)) {
            lines.push(line.trim());
            if lines.len() >= limit {
                break;
            }
        }
    }
    lines
}

fn payslip_flags(payslip_text: &str, flags: &mut Vec<RiskFlag>) {
    if payslip_text.trim().len() <= 10 {
        return;
    }
    let payslip_lower = payslip_text.to_lowercase();

    if let Some(captures) = salary_pattern().captures(&payslip_lower) {
        let label = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let raw_amount = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
        if let Some(salary) = parse_amount(raw_amount) {
            let evidence = format!("Payslip shows: {} RM {}", title_case(label), raw_amount);
            let max_repayment = salary * 0.40;
            flags.push(RiskFlag {
                flag: "Monthly Income Verified".to_string(),
                severity: "Info".to_string(),
                description: format!(
                    "Monthly salary: RM {}. Maximum safe monthly repayment: RM {} (40% DSR)",
                    format_rm(salary),
                    format_rm(max_repayment)
                ),
                evidence_quote: evidence.clone(),
                document_source: "Payslip".to_string(),
                ai_justification: None,
            });

            if salary < 2500.0 {
                flags.push(RiskFlag {
                    flag: "Low Income - High Risk".to_string(),
                    severity: "Critical".to_string(),
                    description: format!(
                        "Monthly income of RM {} is below recommended threshold for loan approval",
                        format_rm(salary)
                    ),
                    evidence_quote: evidence,
                    document_source: "Payslip".to_string(),
                    ai_justification: None,
                });
            } else if salary < 4000.0 {
                flags.push(RiskFlag {
                    flag: "Moderate Income - Careful Assessment".to_string(),
                    severity: "Medium".to_string(),
                    description: format!(
                        "Monthly income of RM {} requires careful loan amount evaluation",
                        format_rm(salary)
                    ),
                    evidence_quote: evidence,
                    document_source: "Payslip".to_string(),
                    ai_justification: None,
                });
            } else if salary > 10000.0 {
                flags.push(RiskFlag {
                    flag: "Strong Income - Good Repayment Capacity".to_string(),
                    severity: "Positive".to_string(),
                    description: format!(
                        "Strong monthly income of RM {} indicates good repayment capacity",
                        format_rm(salary)
                    ),
                    evidence_quote: evidence,
                    document_source: "Payslip".to_string(),
                    ai_justification: None,
                });
            }
        }
    }

    let deductions = lines_containing(payslip_text, PAYSLIP_DEDUCTION_KEYWORDS, 2);
    if !deductions.is_empty() {
        flags.push(RiskFlag {
            flag: "Existing Debt Obligations Detected".to_string(),
            severity: "High".to_string(),
            description: "Applicant has ongoing loan repayments reducing disposable income"
                .to_string(),
            evidence_quote: format!("Payslip shows deductions: {}", deductions.join("; ")),
            document_source: "Payslip".to_string(),
            ai_justification: None,
        });
    }
}

fn bank_flags(bank_text: &str, flags: &mut Vec<RiskFlag>) {
    if bank_text.trim().len() <= 10 {
        return;
    }
    let bank_lower = bank_text.to_lowercase();

    let gambling_found: Vec<&str> = GAMBLING_KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| bank_lower.contains(keyword))
        .collect();
    if !gambling_found.is_empty() {
        let transaction_lines = lines_containing(bank_text, &gambling_found, 2);
        let evidence = if transaction_lines.is_empty() {
            format!("Gambling keywords detected: {}", gambling_found.join(", "))
        } else {
            format!("Transactions: {}", transaction_lines.join("; "))
        };
        flags.push(RiskFlag {
            flag: "Gambling Activities - High Risk".to_string(),
            severity: "Critical".to_string(),
            description: "Bank statement shows gambling transactions - indicates financial instability"
                .to_string(),
            evidence_quote: evidence,
            document_source: "Bank Statement".to_string(),
            ai_justification: None,
        });
    }

    let crypto_found: Vec<&str> = CRYPTO_KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| bank_lower.contains(keyword))
        .collect();
    if !crypto_found.is_empty() {
        flags.push(RiskFlag {
            flag: "High-Risk Investment Activities".to_string(),
            severity: "High".to_string(),
            description: "Cryptocurrency trading detected - volatile asset exposure".to_string(),
            evidence_quote: format!(
                "Bank statement shows crypto-related transactions: {}",
                crypto_found.join(", ")
            ),
            document_source: "Bank Statement".to_string(),
            ai_justification: None,
        });
    }

    let overdraft_lines = lines_containing(bank_text, OVERDRAFT_KEYWORDS, 2);
    if !overdraft_lines.is_empty() {
        flags.push(RiskFlag {
            flag: "Poor Cash Flow Management".to_string(),
            severity: "High".to_string(),
            description: "Bank statement shows overdraft or insufficient fund issues".to_string(),
            evidence_quote: format!("Issues: {}", overdraft_lines.join("; ")),
            document_source: "Bank Statement".to_string(),
            ai_justification: None,
        });
    }

    let large_withdrawals: Vec<f64> = withdrawal_pattern()
        .captures_iter(&bank_lower)
        .filter_map(|captures| captures.get(2).and_then(|m| parse_amount(m.as_str())))
        .filter(|amount| *amount > LARGE_WITHDRAWAL_THRESHOLD)
        .collect();
    if !large_withdrawals.is_empty() {
        let total: f64 = large_withdrawals.iter().sum();
        let largest = large_withdrawals.iter().cloned().fold(0.0_f64, f64::max);
        flags.push(RiskFlag {
            flag: "Large Cash Withdrawals Detected".to_string(),
            severity: "Medium".to_string(),
            description: format!(
                "Total of RM {} in large cash withdrawals detected",
                format_rm(total)
            ),
            evidence_quote: format!(
                "Multiple withdrawals > RM 5,000 found. Largest: RM {}",
                format_rm(largest)
            ),
            document_source: "Bank Statement".to_string(),
            ai_justification: None,
        });
    }
}

fn essay_flags(essay_text: &str, loan_type: Option<LoanType>, flags: &mut Vec<RiskFlag>) {
    if essay_text.trim().len() <= 10 {
        flags.push(RiskFlag {
            flag: "Loan Essay Not Provided".to_string(),
            severity: "High".to_string(),
            description: "No loan purpose essay submitted - unable to assess loan intent and applicant's financial awareness"
                .to_string(),
            evidence_quote: "Loan essay document missing from application".to_string(),
            document_source: "Loan Essay".to_string(),
            ai_justification: None,
        });
        return;
    }

    let essay_lower = essay_text.to_lowercase();
    let sentences: Vec<&str> = essay_text
        .split('.')
        .map(str::trim)
        .filter(|sentence| sentence.len() > 20)
        .collect();
    let sentence_with = |keywords: &[&str]| -> Option<&str> {
        sentences.iter().copied().find(|sentence| {
            let lower = sentence.to_lowercase();
            keywords.iter().any(|keyword| lower.contains(keyword))
        })
    };

    if let Some(keyword) = ESSAY_DEBT_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| essay_lower.contains(keyword))
    {
        if let Some(sentence) = sentence_with(&[keyword]) {
            let severity = if ESSAY_CRITICAL_DEBT_KEYWORDS.contains(&keyword) {
                "Critical"
            } else {
                "High"
            };
            flags.push(RiskFlag {
                flag: "Existing Debt Obligations Disclosed".to_string(),
                severity: severity.to_string(),
                description: "Applicant mentions existing debt obligations".to_string(),
                evidence_quote: format!("Essay states: \"{sentence}\""),
                document_source: "Loan Essay".to_string(),
                ai_justification: None,
            });
        }
    }

    for &(keyword, description) in ESSAY_CONCERN_KEYWORDS {
        if essay_lower.contains(keyword) {
            if let Some(sentence) = sentence_with(&[keyword]) {
                flags.push(RiskFlag {
                    flag: "Financial Concerns Disclosed".to_string(),
                    severity: "High".to_string(),
                    description: format!("Applicant acknowledges {description}"),
                    evidence_quote: format!("Essay states: \"{sentence}\""),
                    document_source: "Loan Essay".to_string(),
                    ai_justification: None,
                });
            }
            break;
        }
    }

    if loan_type == Some(LoanType::MicroBusiness) {
        let personal_found: Vec<&str> = BUSINESS_PERSONAL_USE_KEYWORDS
            .iter()
            .copied()
            .filter(|keyword| essay_lower.contains(keyword))
            .collect();
        if !personal_found.is_empty() {
            if let Some(sentence) = sentence_with(&personal_found) {
                flags.push(RiskFlag {
                    flag: "Loan Purpose Mismatch - Critical".to_string(),
                    severity: "Critical".to_string(),
                    description: format!(
                        "Business loan requested but essay indicates personal use: {}",
                        personal_found.join(", ")
                    ),
                    evidence_quote: format!("Essay states: \"{sentence}\""),
                    document_source: "Loan Essay".to_string(),
                    ai_justification: None,
                });
            }
        }
    }

    if let Some(captures) = tenure_pattern().captures(&essay_lower) {
        if let Some(years) = captures.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
            if years > 7 {
                flags.push(RiskFlag {
                    flag: "Extended Repayment Period Requested".to_string(),
                    severity: "Medium".to_string(),
                    description: format!(
                        "Applicant requests {years}-year tenure - may indicate repayment concerns"
                    ),
                    evidence_quote: format!("Essay requests {years} years repayment period"),
                    document_source: "Loan Essay".to_string(),
                    ai_justification: None,
                });
            }
        }
    }

    let essay_len = essay_text.trim().len();
    if essay_len < 100 {
        flags.push(RiskFlag {
            flag: "Insufficient Essay Information".to_string(),
            severity: "Medium".to_string(),
            description: "Loan essay too brief - insufficient detail on loan purpose and financial situation"
                .to_string(),
            evidence_quote: format!(
                "Essay length: {essay_len} characters. Detailed explanation recommended."
            ),
            document_source: "Loan Essay".to_string(),
            ai_justification: None,
        });
    }
}

/// Pads the list up to the enforced minimum with generic verification flags,
/// choosing the padding by how many evidence-backed flags exist already.
fn enforce_minimum(essay_text: &str, flags: &mut Vec<RiskFlag>) {
    while flags.len() < MIN_RISK_FLAGS {
        match flags.len() {
            0 => flags.push(RiskFlag {
                flag: "Income-to-Debt Ratio Assessment Required".to_string(),
                severity: "Medium".to_string(),
                description: "Comprehensive debt servicing capacity analysis needed. The applicant's total monthly obligations including this new loan must be assessed against verified income to ensure sustainable repayment without financial strain.".to_string(),
                evidence_quote: "Application requires full income and debt obligation verification".to_string(),
                document_source: "Application Summary".to_string(),
                ai_justification: Some("Proper debt-to-income ratio assessment is fundamental to preventing over-lending and protecting both borrower and lender from default risk.".to_string()),
            }),
            1 => {
                if essay_text.trim().is_empty() {
                    flags.push(RiskFlag {
                        flag: "Income Pattern Analysis Required".to_string(),
                        severity: "Medium".to_string(),
                        description: "Bank statement requires detailed income pattern analysis to verify consistency and sustainability of income streams. Irregular income increases repayment risk.".to_string(),
                        evidence_quote: "Bank statement shows income patterns requiring detailed verification".to_string(),
                        document_source: "Bank Statement".to_string(),
                        ai_justification: Some("Stable, consistent income is the strongest predictor of loan repayment capability. Irregular patterns warrant careful assessment.".to_string()),
                    });
                } else {
                    let quote = if essay_text.chars().count() > 100 {
                        format!("{}...", essay_text.chars().take(100).collect::<String>())
                    } else {
                        essay_text.to_string()
                    };
                    flags.push(RiskFlag {
                        flag: "Financial Commitment Verification".to_string(),
                        severity: "Medium".to_string(),
                        description: "Existing financial commitments and monthly obligations need thorough verification. Any undisclosed debts or commitments could impact repayment capacity and must be investigated.".to_string(),
                        evidence_quote: quote,
                        document_source: "Loan Essay".to_string(),
                        ai_justification: Some("Undisclosed financial obligations are a common cause of loan defaults. Complete disclosure verification protects lending decision accuracy.".to_string()),
                    });
                }
            }
            2 => flags.push(RiskFlag {
                flag: "Loan Affordability Stress Test".to_string(),
                severity: "Medium".to_string(),
                description: "Monthly installment affordability must be stress-tested against applicant's income after essential expenses. A safety buffer of at least 30% should remain for emergencies and unexpected costs.".to_string(),
                evidence_quote: "Affordability requires stress-testing against income and essential expenses".to_string(),
                document_source: "Application Summary".to_string(),
                ai_justification: Some("Over-commitment to loan payments without adequate buffer is a primary default trigger, especially during economic stress or income disruption.".to_string()),
            }),
            _ => flags.push(RiskFlag {
                flag: "Repayment Source Sustainability".to_string(),
                severity: "Low".to_string(),
                description: "The sustainability and reliability of stated repayment sources should be independently verified. Applicant's repayment strategy needs to demonstrate realistic cash flow management throughout the loan tenure.".to_string(),
                evidence_quote: "Repayment plan requires verification of income source sustainability".to_string(),
                document_source: "Loan Essay".to_string(),
                ai_justification: Some("Clear, realistic repayment planning with verified income sources indicates financial responsibility and reduces default probability.".to_string()),
            }),
        }
    }
}

pub fn extract_risk_flags(documents: &DocumentBundle, loan_type: Option<LoanType>) -> Vec<RiskFlag> {
    let mut flags = Vec::new();
    payslip_flags(&documents.payslip, &mut flags);
    bank_flags(&documents.bank_statement, &mut flags);
    essay_flags(&documents.essay, loan_type, &mut flags);
    enforce_minimum(&documents.essay, &mut flags);
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(bank: &str, essay: &str, payslip: &str) -> DocumentBundle {
        DocumentBundle {
            application_form: String::new(),
            bank_statement: bank.to_string(),
            essay: essay.to_string(),
            payslip: payslip.to_string(),
        }
    }

    #[test]
    fn always_returns_at_least_four_flags() {
        let flags = extract_risk_flags(&DocumentBundle::default(), None);
        assert!(flags.len() >= 4);
        assert_eq!(flags[0].flag, "Loan Essay Not Provided");
    }

    #[test]
    fn gambling_lines_are_quoted() {
        let flags = extract_risk_flags(
            &bundle(
                "01/03 GENTING RESORT RM 500.00\n02/03 Grocery RM 80.00\n03/03 TOTO outlet RM 50.00",
                "",
                "",
            ),
            None,
        );
        let gambling = flags
            .iter()
            .find(|flag| flag.flag.starts_with("Gambling"))
            .expect("gambling flag present");
        assert_eq!(gambling.severity, "Critical");
        assert!(gambling.evidence_quote.contains("GENTING RESORT"));
    }

    #[test]
    fn low_salary_is_critical() {
        let flags = extract_risk_flags(
            &bundle("", "", "Employee payslip\nBasic Salary: RM 2,000\nEPF: RM 220"),
            None,
        );
        assert!(flags.iter().any(|flag| flag.flag == "Monthly Income Verified"));
        let low = flags
            .iter()
            .find(|flag| flag.flag == "Low Income - High Risk")
            .expect("low income flag");
        assert!(low.description.contains("RM 2,000.00"));
    }

    #[test]
    fn business_loan_personal_use_is_flagged() {
        let essay = "I want this business loan mainly to buy a new car for my family because our old vehicle broke down recently.";
        let flags = extract_risk_flags(&bundle("", essay, ""), Some(LoanType::MicroBusiness));
        assert!(flags
            .iter()
            .any(|flag| flag.flag == "Loan Purpose Mismatch - Critical"));
    }

    #[test]
    fn long_tenure_request_is_flagged() {
        let essay = "I plan to repay this loan over 10 years through my stable salary and side income from weekend catering work.";
        let flags = extract_risk_flags(&bundle("", essay, ""), Some(LoanType::Personal));
        let tenure = flags
            .iter()
            .find(|flag| flag.flag == "Extended Repayment Period Requested")
            .expect("tenure flag");
        assert!(tenure.description.contains("10-year"));
    }
}
