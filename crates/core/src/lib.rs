//! Core budget logic for Carryover.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Storage is reached through traits implemented by the db crate.
//!
//! # Modules
//!
//! - `scope` - Canonical ownership resolution
//! - `spend` - Expense aggregation rules
//! - `period` - Budget periods and their schedule
//! - `rollover` - Carry-over arithmetic and chain reconciliation
//! - `engine` - Period generation, status, and reconciliation over storage
//! - `repair` - Batched, resumable repair of historical data

pub mod engine;
pub mod period;
pub mod repair;
pub mod rollover;
pub mod scope;
pub mod spend;

#[cfg(test)]
pub(crate) mod testing;
