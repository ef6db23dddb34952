//! JSON HTTP surface over the lifecycle manager.
//!
//! There is no authentication: the owner comes from the request path.

mod server;

pub use server::{ApiHandle, ApiServer, build_router, start_server};
