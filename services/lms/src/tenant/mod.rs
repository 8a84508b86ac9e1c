//! Per-tenant database routing.
//!
//! Every request under `/{tenant}/api/v1` is bound to the tenant's own
//! database through [`TenantRegistry`], which owns the process-wide cache of
//! open connections.

mod middleware;
mod registry;

pub use middleware::resolve_tenant;
pub use registry::{
    TenantConnector, TenantError, TenantHandle, TenantRegistry, TenantState, spawn_health_sweep,
};
