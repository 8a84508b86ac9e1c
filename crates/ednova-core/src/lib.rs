//! Service plumbing shared by Ednova services: configuration loading,
//! tracing setup, request-id/trace layers, health checks and serde helpers.

pub mod config;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
