//! Data structures for RR collection and HRV results.

pub mod hrv;
pub mod session;

pub use hrv::{compute_rmssd, HrvResult};
pub use session::{SessionAggregator, SessionState};
