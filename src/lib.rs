//! Incentive payout calculation and reconciliation engine.
//!
//! This crate computes incentive/compensation payouts for large entity
//! populations against versioned, tenant-defined rule sets ("plans"), and
//! verifies computed results against independent reference data through a
//! layered reconciliation engine (aggregate, segment, entity and component
//! depth), including detection of false-green aggregates.

#![warn(missing_docs)]

pub mod batch;
pub mod calculation;
pub mod config;
pub mod error;
pub mod models;
pub mod reconciliation;
pub mod resolver;
pub mod selector;
pub mod store;
