//! HTTP API for the ballot node.
//!
//! Provides endpoints for:
//! - The voter ballot (open categories, `has_voted`) and vote casting
//! - Public ranked results, paginated
//! - Category and candidate administration
//! - Health and Prometheus metrics

pub mod auth;
pub mod error;
pub mod handlers;
pub mod pagination;
pub mod server;

pub use error::RpcError;
pub use server::{router, RpcServer, RpcState};
