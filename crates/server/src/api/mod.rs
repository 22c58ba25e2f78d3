pub mod error;
pub mod handlers;
pub mod middleware;
pub mod redirect;
pub mod routes;
pub mod stremio;

pub use error::ApiError;
pub use routes::create_router;
