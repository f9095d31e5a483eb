//! Entity resolution and merge engine for the childcare client registry.
//!
//! The crate turns inconsistent legacy tabular records into a deduplicated,
//! referentially consistent document set, migrates the old single-parent
//! reference schema to a multi-parent one, and drives the live account-merge
//! workflow through which an authenticated user claims a legacy identity by
//! proving control of a phone number.

pub mod config;
pub mod domain;
pub mod error;
pub mod store;
pub mod telemetry;
pub mod workflows;
