use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use fieldperm_auth::PermissionLoader;
use fieldperm_core::UserIdentity;

use crate::{FieldError, RequestContext};

/// Resolver-chain middleware loading the user's permissions once per request.
///
/// It holds no request state: the loaded permissions live on the
/// [`RequestContext`] it is handed, so one instance can serve every request.
#[derive(Debug, Clone)]
pub struct PermissionsMiddleware {
    loader: Arc<PermissionLoader>,
}

impl PermissionsMiddleware {
    pub fn new(loader: impl Into<Arc<PermissionLoader>>) -> Self {
        Self { loader: loader.into() }
    }

    pub fn loader(&self) -> &PermissionLoader {
        &self.loader
    }

    /// Make sure `ctx` carries permissions, then continue the chain.
    ///
    /// Anonymous users pass through untouched. Loader failures abort the
    /// field instead of calling `next`.
    pub fn resolve<T, V, N>(&self, root: &T, ctx: &RequestContext, next: N) -> Result<V, FieldError>
    where
        T: ?Sized,
        N: FnOnce(&T, &RequestContext) -> Result<V, FieldError>,
    {
        if let Err(err) = ctx.load_permissions(&self.loader) {
            tracing::error!(user = %ctx.user(), error = %err, "failed to load permissions");
            return Err(err.into());
        }
        next(root, ctx)
    }
}

/// State for [`request_context_middleware`].
#[derive(Debug, Clone)]
pub struct PermissionLayerState {
    pub middleware: PermissionsMiddleware,
    /// Load permissions before the handler runs instead of on first use.
    pub eager: bool,
}

impl PermissionLayerState {
    pub fn new(middleware: PermissionsMiddleware) -> Self {
        Self { middleware, eager: false }
    }

    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }
}

/// Give every HTTP request its own [`RequestContext`].
///
/// The identity comes from a [`UserIdentity`] extension set by the upstream
/// authentication layer; requests without one are anonymous. In eager mode
/// the permission source runs on tokio's blocking pool.
pub async fn request_context_middleware(
    State(state): State<PermissionLayerState>,
    mut req: Request,
    next: Next,
) -> Response {
    let user = req.extensions().get::<UserIdentity>().cloned().unwrap_or_default();
    let ctx = RequestContext::new(user);

    if state.eager {
        if let Err(err) = preload(state.middleware, ctx.clone()).await {
            return err.into_response();
        }
    }

    req.extensions_mut().insert(ctx);
    next.run(req).await
}

/// Load `ctx`'s permissions on the blocking pool; the source may block.
async fn preload(middleware: PermissionsMiddleware, ctx: RequestContext) -> Result<(), FieldError> {
    let loaded = tokio::task::spawn_blocking(move || ctx.load_permissions(middleware.loader()).map(|_| ()))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "permission preload task failed");
            FieldError::Resolver(anyhow::anyhow!("permission preload task failed: {e}"))
        })?;
    Ok(loaded?)
}
