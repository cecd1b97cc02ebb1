//! Per-request exposure of loader state.
//!
//! Install with [`with_exposure`] or directly through
//! `axum::middleware::from_fn_with_state(extension, expose)`. Handlers read
//! the result with `Extension<TemplateLocals>`; outer layers find the same
//! locals in the response extensions.

use crate::error::ExposeResult;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::{self, Next},
    response::Response,
    Router,
};
use stagehand_core::{LoaderExtension, RequestScope, TemplateLocals};
use std::sync::Arc;
use tracing::debug;

/// Snapshot the extension's state for this request and attach it to the
/// template locals under `state`.
///
/// The first request through here freezes the extension's configuration.
pub async fn expose(
    State(extension): State<Arc<LoaderExtension>>,
    mut request: Request,
    next: Next,
) -> ExposeResult<Response> {
    let scope = request_scope(&request);
    let snapshot = extension.snapshot(&scope).await?;

    let mut locals = request
        .extensions_mut()
        .remove::<TemplateLocals>()
        .unwrap_or_default();
    locals.insert_snapshot(&snapshot);
    request.extensions_mut().insert(locals.clone());
    debug!(path = %scope.path, "Loader state attached to template locals");

    let mut response = next.run(request).await;
    response.extensions_mut().insert(locals);
    Ok(response)
}

/// Install [`expose`] on every route of `router`.
pub fn with_exposure<S>(router: Router<S>, extension: Arc<LoaderExtension>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(extension, expose))
}

fn request_scope(request: &Request) -> RequestScope {
    let uri = request.uri();
    let mut scope = RequestScope::new(uri.path());
    if let Some(query) = uri.query() {
        scope = scope.with_query(query);
    }
    copy_headers(scope, request.headers())
}

fn copy_headers(mut scope: RequestScope, headers: &HeaderMap) -> RequestScope {
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            scope = scope.with_header(name.as_str(), value);
        }
    }
    scope
}
