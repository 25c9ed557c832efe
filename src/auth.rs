//! Validated identifiers and secret wrappers shared across jobs.

pub mod id;
pub mod secret;

pub use id::*;
pub use secret::*;
