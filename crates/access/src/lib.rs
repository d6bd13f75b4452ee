//! Access control for the course → app → entry hierarchy.
//!
//! This crate provides:
//! - [`policy`]: pure decisions over a [`diary_store::ChainSnapshot`]
//! - [`AccessResolver`]: loads one snapshot per call and applies the policy
//! - [`EnrollmentGraph`]: course bindings and capacity-gated app enrollment
//! - [`StopwordLedger`]: per-app stopword reconciliation
//!
//! Authorization failures are values ([`Resolution::Denied`]), not errors.
//! [`AccessError`] is reserved for enrollment rejections, validation and
//! storage failures, and for denials that a caller chose to propagate.

mod actor;
mod enrollment;
mod error;
mod ledger;
pub mod policy;
mod resolution;
mod resolver;

pub use actor::*;
pub use enrollment::*;
pub use error::*;
pub use ledger::*;
pub use resolution::*;
pub use resolver::*;
