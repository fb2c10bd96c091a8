//! Transaction Module
//!
//! Signs pre-built DeSo transactions with a derived key.

mod signer;

pub use signer::*;
