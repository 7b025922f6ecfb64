//! Asynchronous payment dispatcher sitting in front of two upstream payment
//! processors: a cheap primary and a costlier fallback.
//!
//! Admitted payments are queued, charged at the primary with linear-backoff
//! retries, reconciled when a call times out, escalated to the fallback when
//! the primary keeps failing, and recorded exactly once when settled.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod telemetry;
