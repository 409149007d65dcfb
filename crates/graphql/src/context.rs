use std::sync::Arc;

use once_cell::sync::OnceCell;

use fieldperm_auth::{LoaderError, NormalizedPermissions, PermissionLoader};
use fieldperm_core::UserIdentity;

/// Context for a single request (identity + permissions loaded for it).
///
/// Clones share the same permission slot, so every resolver of one request
/// sees the permissions loaded by whichever ran first. A new request must
/// build a new context.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    user: UserIdentity,
    permissions: Arc<OnceCell<Arc<NormalizedPermissions>>>,
}

impl RequestContext {
    pub fn new(user: UserIdentity) -> Self {
        Self {
            user,
            permissions: Arc::default(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// Permissions attached to this request, if any were loaded.
    pub fn permissions(&self) -> Option<&NormalizedPermissions> {
        self.permissions.get().map(Arc::as_ref)
    }

    /// Attach precomputed permissions. Returns `false` if already attached.
    pub fn attach_permissions(&self, permissions: NormalizedPermissions) -> bool {
        self.permissions.set(Arc::new(permissions)).is_ok()
    }

    /// Load the user's permissions through `loader` once for this request.
    ///
    /// Anonymous users get `None` and the loader is never called. Concurrent
    /// callers block on the first load instead of issuing their own.
    pub fn load_permissions(&self, loader: &PermissionLoader) -> Result<Option<&NormalizedPermissions>, LoaderError> {
        if !self.user.is_authenticated() {
            return Ok(None);
        }

        let permissions = self.permissions.get_or_try_init(|| {
            tracing::debug!(user = %self.user, "fetching permissions for request");
            loader.fetch_permissions(&self.user).map(Arc::new)
        })?;

        Ok(Some(permissions.as_ref()))
    }
}
