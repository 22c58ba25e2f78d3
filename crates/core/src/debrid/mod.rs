//! Debrid provider integration.
//!
//! `DebridProvider` is the seam to the external HTTP API; `DebridClient`
//! adds availability caching and request batching on top of it.

mod client;
mod rate_limiter;
mod realdebrid;
mod types;

pub use client::DebridClient;
pub use rate_limiter::{RateLimiter, TokenBucket};
pub use realdebrid::RealDebridProvider;
pub use types::*;
