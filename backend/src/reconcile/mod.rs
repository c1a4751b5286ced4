//! Reconciliation: roster pairing, the engine, and the fetch pipeline.
//!
//! - [`roster`] - Pair flat roster rows with document roster entries
//! - [`engine`] - Pure field-by-field comparison of one match
//! - [`pipeline`] - Fetch inputs, run the engine, log; single match or batch

pub mod engine;
pub mod pipeline;
pub mod roster;

pub use engine::reconcile;
pub use pipeline::{reconcile_batch, reconcile_match, BatchOutcome, MatchFailure, MatchReport};
pub use roster::{Pairing, PairingFailure, UnpairedReason};
