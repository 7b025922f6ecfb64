//! Domain types and the ports the dispatcher talks through.

pub mod outcome;
pub mod payment;
pub mod ports;
pub mod summary;
