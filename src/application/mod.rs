//! Application layer: admission, the dispatch state machine and its helpers.
//!
//! The `Dispatcher` owns two bounded `tokio` queues. Admission feeds the
//! primary one; a single consumer loop drains both and runs each request in
//! its own task, retrying, reconciling or escalating it until it is settled
//! or dropped.

pub mod admin;
pub mod admission;
pub mod dispatcher;
pub mod policy;
pub mod queue;
pub mod reconciler;
pub mod scheduler;
pub mod tracker;
