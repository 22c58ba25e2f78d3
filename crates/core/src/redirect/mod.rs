//! Redirect-based URL indirection.
//!
//! The catalog client only ever sees `{public_url}/redirect/{ticket}`; the
//! provider-unlocked URL is produced when the ticket is followed.

mod resolver;
mod types;

pub use resolver::RedirectResolver;
pub use types::*;
