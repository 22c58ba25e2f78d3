//! Stream listing: search, availability filter and ticket issuance.

mod service;

pub use service::*;
