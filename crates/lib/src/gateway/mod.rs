//! Gateway: HTTP webhook endpoint.
//!
//! Single port serves the platform's GET verification handshake and POST event
//! deliveries on one path, plus a health probe on `/`.

mod server;

pub use server::{build_router, run_gateway, serve, GatewayState, VerifyQuery};
