//! Loan application screening workflows.
//!
//! The crate is organized the same way the service thinks about the problem:
//! [`workflows::lending::applications`] owns intake, persistence seams, review,
//! and the HTTP router; [`workflows::lending::analysis`] owns the risk
//! assessment pipeline — the external analyst seam, the deterministic fallback
//! scorer, and the financial metrics recalculator.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
