//! Transports: streamable HTTP (with `/health`) and stdio.

mod http;
mod stdio;

pub use http::{HealthResponse, router, run_http};
pub use stdio::run_stdio;
