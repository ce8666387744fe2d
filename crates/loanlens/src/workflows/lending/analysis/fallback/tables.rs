//! Declarative keyword scoring tables.
//!
//! Every keyword pass in the fallback scorer is the same shape: count how
//! many keywords from a fixed list appear in one document segment, find the
//! highest band the count clears, and record that band's point delta. One
//! interpreter ([`apply_rule`]) evaluates all of them, so the per-loan-type
//! strategies stay data, not code.

use crate::workflows::lending::analysis::report::{AdjustmentKind, ScoreBreakdownEntry};

/// Which document segment a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSegment {
    Combined,
    BankStatement,
    Essay,
    Payslip,
}

/// Lowercased views of the submission, computed once per scoring run.
pub struct ScoringText {
    pub combined: String,
    pub bank: String,
    pub essay: String,
    pub payslip: String,
}

impl ScoringText {
    pub fn segment(&self, segment: TextSegment) -> &str {
        match segment {
            TextSegment::Combined => &self.combined,
            TextSegment::BankStatement => &self.bank,
            TextSegment::Essay => &self.essay,
            TextSegment::Payslip => &self.payslip,
        }
    }
}

/// One scoring band: cleared when the match count reaches `min_matches`.
/// `reason` may carry a `{count}` placeholder.
#[derive(Debug, Clone)]
pub struct CountBand {
    pub min_matches: usize,
    pub points: i64,
    pub category: &'static str,
    pub reason: &'static str,
    pub kind: AdjustmentKind,
}

/// A keyword list plus its ordered bands (highest threshold first).
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub segment: TextSegment,
    pub keywords: &'static [&'static str],
    pub bands: &'static [CountBand],
}

pub fn count_matches(text: &str, keywords: &[&str]) -> usize {
    keywords
        .iter()
        .filter(|keyword| text.contains(*keyword))
        .count()
}

/// Evaluates one rule, appending at most one breakdown entry (the first band
/// whose threshold the count clears). Returns the applied delta.
pub fn apply_rule(
    rule: &KeywordRule,
    text: &ScoringText,
    breakdown: &mut Vec<ScoreBreakdownEntry>,
) -> i64 {
    let count = count_matches(text.segment(rule.segment), rule.keywords);
    for band in rule.bands {
        if count >= band.min_matches {
            breakdown.push(ScoreBreakdownEntry {
                category: band.category.to_string(),
                points: band.points,
                reason: band.reason.replace("{count}", &count.to_string()),
                kind: band.kind,
            });
            return band.points;
        }
    }
    0
}

// Loan-type rule tables. Keyword lists and band deltas are the screening
// rubric; changing them changes credit decisions.

pub const BUSINESS_RULES: &[KeywordRule] = &[
    KeywordRule {
        segment: TextSegment::Essay,
        keywords: &[
            "business", "expand", "capital", "equipment", "inventory", "customers", "revenue",
            "profit", "sales",
        ],
        bands: &[
            CountBand {
                min_matches: 5,
                points: 15,
                category: "Strong Business Plan",
                reason: "Comprehensive business planning with {count} key indicators",
                kind: AdjustmentKind::Positive,
            },
            CountBand {
                min_matches: 3,
                points: 8,
                category: "Basic Business Plan",
                reason: "Basic business planning with {count} indicators",
                kind: AdjustmentKind::Neutral,
            },
        ],
    },
    KeywordRule {
        segment: TextSegment::BankStatement,
        keywords: &["monthly income", "revenue", "sales", "receipts", "cash flow", "profit"],
        bands: &[CountBand {
            min_matches: 3,
            points: 12,
            category: "Healthy Business Cash Flow",
            reason: "Strong cash flow patterns with {count} indicators",
            kind: AdjustmentKind::Positive,
        }],
    },
    KeywordRule {
        segment: TextSegment::Combined,
        keywords: &["license", "registration", "permit", "ssm", "tax", "gst"],
        bands: &[CountBand {
            min_matches: 2,
            points: 8,
            category: "Business Legitimacy",
            reason: "Evidence of proper business registration/licensing",
            kind: AdjustmentKind::Positive,
        }],
    },
];

pub const PERSONAL_RULES: &[KeywordRule] = &[
    KeywordRule {
        segment: TextSegment::Payslip,
        keywords: &["salary", "wages", "employment", "job", "work", "employer", "monthly income"],
        bands: &[
            CountBand {
                min_matches: 4,
                points: 15,
                category: "Stable Employment Income",
                reason: "Strong employment indicators with {count} factors",
                kind: AdjustmentKind::Positive,
            },
            CountBand {
                min_matches: 2,
                points: 8,
                category: "Basic Employment Evidence",
                reason: "Basic employment evidence with {count} indicators",
                kind: AdjustmentKind::Neutral,
            },
        ],
    },
    KeywordRule {
        segment: TextSegment::BankStatement,
        keywords: &["savings", "fixed deposit", "asb", "tabung haji", "investment", "epf"],
        bands: &[CountBand {
            min_matches: 2,
            points: 12,
            category: "Good Savings Habits",
            reason: "Evidence of savings/investment discipline",
            kind: AdjustmentKind::Positive,
        }],
    },
    KeywordRule {
        segment: TextSegment::Essay,
        keywords: &["emergency", "medical", "education", "home improvement", "consolidation"],
        bands: &[CountBand {
            min_matches: 1,
            points: 6,
            category: "Clear Personal Purpose",
            reason: "Valid personal loan purpose identified",
            kind: AdjustmentKind::Positive,
        }],
    },
];

pub const CAR_RULES: &[KeywordRule] = &[
    KeywordRule {
        segment: TextSegment::Essay,
        keywords: &[
            "transport", "work", "family", "commute", "business use", "delivery", "car", "vehicle",
        ],
        bands: &[CountBand {
            min_matches: 3,
            points: 10,
            category: "Clear Vehicle Need",
            reason: "Strong justification for vehicle with {count} factors",
            kind: AdjustmentKind::Positive,
        }],
    },
    KeywordRule {
        segment: TextSegment::Combined,
        keywords: &["down payment", "deposit", "advance payment", "initial payment"],
        bands: &[CountBand {
            min_matches: 1,
            points: 7,
            category: "Down Payment Evidence",
            reason: "Evidence of down payment capability",
            kind: AdjustmentKind::Positive,
        }],
    },
    KeywordRule {
        segment: TextSegment::Combined,
        keywords: &["insurance", "road tax", "maintenance", "servicing"],
        bands: &[CountBand {
            min_matches: 2,
            points: 5,
            category: "Maintenance Awareness",
            reason: "Understanding of vehicle ownership costs",
            kind: AdjustmentKind::Positive,
        }],
    },
];

pub const HOUSING_RULES: &[KeywordRule] = &[
    KeywordRule {
        segment: TextSegment::Essay,
        keywords: &["home", "house", "family", "children", "spouse", "married", "first time buyer"],
        bands: &[CountBand {
            min_matches: 4,
            points: 12,
            category: "Strong Housing Need",
            reason: "Clear housing necessity with {count} factors",
            kind: AdjustmentKind::Positive,
        }],
    },
    KeywordRule {
        segment: TextSegment::Payslip,
        keywords: &[
            "permanent", "senior", "manager", "professional", "government", "years experience",
        ],
        bands: &[CountBand {
            min_matches: 2,
            points: 15,
            category: "Employment Stability",
            reason: "Strong job security indicators",
            kind: AdjustmentKind::Positive,
        }],
    },
    KeywordRule {
        segment: TextSegment::BankStatement,
        keywords: &["savings", "deposit", "down payment", "equity", "assets", "investment"],
        bands: &[CountBand {
            min_matches: 3,
            points: 10,
            category: "Strong Asset Position",
            reason: "Evidence of sufficient assets/down payment",
            kind: AdjustmentKind::Positive,
        }],
    },
];

pub const GENERIC_RULES: &[KeywordRule] = &[
    KeywordRule {
        segment: TextSegment::Combined,
        keywords: &["salary", "income", "deposit", "credit", "payment received"],
        bands: &[CountBand {
            min_matches: 3,
            points: 12,
            category: "Income Evidence",
            reason: "Multiple income indicators",
            kind: AdjustmentKind::Positive,
        }],
    },
    KeywordRule {
        segment: TextSegment::BankStatement,
        keywords: &["savings", "investment", "balance"],
        bands: &[CountBand {
            min_matches: 2,
            points: 8,
            category: "Financial Health",
            reason: "Positive financial indicators",
            kind: AdjustmentKind::Positive,
        }],
    },
];

/// Risk factors applied to every loan type after the type-specific pass.
/// The gambling deduction fires once regardless of how many keywords match.
pub const COMMON_RULES: &[KeywordRule] = &[
    KeywordRule {
        segment: TextSegment::Combined,
        keywords: &["gambling", "crypto", "bitcoin", "bet", "lottery", "casino", "forex trading"],
        bands: &[CountBand {
            min_matches: 1,
            points: -20,
            category: "High-Risk Activities",
            reason: "Detected {count} high-risk financial activities",
            kind: AdjustmentKind::Negative,
        }],
    },
    KeywordRule {
        segment: TextSegment::Combined,
        keywords: &[
            "existing loan", "credit card debt", "installment", "outstanding balance",
            "monthly payment",
        ],
        bands: &[
            CountBand {
                min_matches: 3,
                points: -12,
                category: "Heavy Debt Burden",
                reason: "Multiple existing debt obligations",
                kind: AdjustmentKind::Negative,
            },
            CountBand {
                min_matches: 1,
                points: -5,
                category: "Some Existing Debt",
                reason: "Some existing financial obligations",
                kind: AdjustmentKind::Neutral,
            },
        ],
    },
    KeywordRule {
        segment: TextSegment::BankStatement,
        keywords: &[
            "regular transactions", "account history", "long-standing customer", "savings history",
        ],
        bands: &[CountBand {
            min_matches: 2,
            points: 8,
            category: "Strong Banking History",
            reason: "Good banking relationship evidence",
            kind: AdjustmentKind::Positive,
        }],
    },
    KeywordRule {
        segment: TextSegment::Combined,
        keywords: &["savings", "emergency fund", "investment", "financial planning", "budget"],
        bands: &[CountBand {
            min_matches: 2,
            points: 6,
            category: "Financial Discipline",
            reason: "Evidence of financial planning and discipline",
            kind: AdjustmentKind::Positive,
        }],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn text(essay: &str, bank: &str) -> ScoringText {
        ScoringText {
            combined: format!("{essay}\n{bank}"),
            bank: bank.to_string(),
            essay: essay.to_string(),
            payslip: String::new(),
        }
    }

    #[test]
    fn first_clearing_band_wins() {
        let rule = &BUSINESS_RULES[0];
        let mut breakdown = Vec::new();
        let delta = apply_rule(
            rule,
            &text("business expand capital equipment inventory", ""),
            &mut breakdown,
        );
        assert_eq!(delta, 15);
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].category, "Strong Business Plan");
        assert!(breakdown[0].reason.contains('5'));
    }

    #[test]
    fn lower_band_applies_when_upper_missed() {
        let rule = &BUSINESS_RULES[0];
        let mut breakdown = Vec::new();
        let delta = apply_rule(rule, &text("business expand capital", ""), &mut breakdown);
        assert_eq!(delta, 8);
        assert_eq!(breakdown[0].kind, AdjustmentKind::Neutral);
    }

    #[test]
    fn no_band_no_entry() {
        let rule = &BUSINESS_RULES[0];
        let mut breakdown = Vec::new();
        let delta = apply_rule(rule, &text("hello there", ""), &mut breakdown);
        assert_eq!(delta, 0);
        assert!(breakdown.is_empty());
    }

    #[test]
    fn gambling_penalty_fires_once_for_any_match_count() {
        let rule = &COMMON_RULES[0];

        let mut breakdown = Vec::new();
        let single = apply_rule(rule, &text("casino visit", ""), &mut breakdown);
        assert_eq!(single, -20);
        assert_eq!(breakdown.len(), 1);

        let mut breakdown = Vec::new();
        let many = apply_rule(
            rule,
            &text("casino gambling lottery bet bitcoin", ""),
            &mut breakdown,
        );
        assert_eq!(many, -20);
        assert_eq!(breakdown.len(), 1);
    }

    #[test]
    fn keyword_counting_is_presence_based() {
        assert_eq!(count_matches("casino casino casino", &["casino", "bet"]), 1);
    }
}
