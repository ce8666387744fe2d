//! Loan screening workflows: application intake and review on one side,
//! risk analysis (analyst seam, deterministic fallback, financial metrics)
//! on the other.

pub mod analysis;
pub mod applications;
