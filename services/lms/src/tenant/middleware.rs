use std::sync::Arc;

use axum::extract::{OriginalUri, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::{LmsError, TenantFault};

use super::registry::{TenantConnector, TenantRegistry};

/// First path segment of the original request URI, e.g. `acme` for
/// `/acme/api/v1/courses`.
fn tenant_segment(path: &str) -> Option<&str> {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// Resolve the tenant named by the first path segment and attach its handle
/// (`Arc<TenantHandle<C::Conn>>`) and [`ednova_domain::tenant::TenantName`] to
/// the request extensions.
///
/// Attach with `axum::middleware::from_fn_with_state(registry, resolve_tenant::<C>)`
/// on the router nested under `/{tenant}/api/v1`.
pub async fn resolve_tenant<C: TenantConnector>(
    State(registry): State<Arc<TenantRegistry<C>>>,
    OriginalUri(uri): OriginalUri,
    mut req: Request,
    next: Next,
) -> Result<Response, LmsError> {
    let raw = tenant_segment(uri.path()).ok_or(LmsError::InvalidTenant)?;
    let handle = registry.resolve(raw).await?;

    req.extensions_mut().insert(handle.name().clone());
    req.extensions_mut().insert(Arc::clone(&handle));

    let response = next.run(req).await;
    if response.extensions().get::<TenantFault>().is_some() {
        registry.mark_errored(&handle);
    }
    Ok(response)
}
