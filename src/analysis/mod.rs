//! Analysis modules.
//!
//! The aggregator joins applications with acceptances and averages the
//! response time per major.

pub mod aggregator;

pub use aggregator::*;
