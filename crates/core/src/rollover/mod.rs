//! Carry-over computation and chain reconciliation.
//!
//! - Rollover arithmetic and anomaly assessment
//! - Correction and history records
//! - Pure chain ordering, gap planning, and the forward walk

pub mod calculator;
pub mod reconciler;
pub mod types;

#[cfg(test)]
mod reconciler_props;

pub use calculator::{DRIFT_TOLERANCE, RolloverCalculator};
pub use reconciler::{ChainLink, LinkOrigin, gap_ranges, is_contiguous, order_chain, walk};
pub use types::{Correction, CorrectionKind, RolloverAnomaly, RolloverKind, RolloverRecord};
