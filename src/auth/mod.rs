//! Authorization Module
//!
//! Decides whether a stored derived key may still be used, from remote facts
//! fetched fresh for every decision.

mod facts;
mod state;

pub use facts::*;
pub use state::*;
