//! Field guards: wrap a resolver so it only runs for users holding one of
//! the required permissions.

use fieldperm_auth::{
    FieldAccessor, NormalizedPermissions, Permission, PermissionLoader, derive_scope_key,
    explain_access, has_access,
};

use crate::{AuthorizationError, FieldError, RequestContext};

/// Access requirements for one field: any of `required`, optionally within
/// the group named by the value at `scope_path` on the resolved object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGuard {
    required: Vec<Permission>,
    scope_path: Option<String>,
}

impl FieldGuard {
    pub fn new<I, P>(required: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
            scope_path: None,
        }
    }

    /// Scope the check by a dotted path on the resolved object,
    /// e.g. `"group.corporation.id"`.
    pub fn scoped_by(mut self, path: impl Into<String>) -> Self {
        self.scope_path = Some(path.into());
        self
    }

    pub fn required(&self) -> &[Permission] {
        &self.required
    }

    pub fn scope_path(&self) -> Option<&str> {
        self.scope_path.as_deref()
    }

    /// Wrap `resolver`, naming the field after `resolver_name`
    /// (`resolve_secret_notes` protects `secret_notes`).
    ///
    /// [`protect!`](crate::protect) supplies the name from the resolver's
    /// identifier.
    pub fn protect_named<F>(&self, resolver_name: &str, resolver: F) -> GuardedResolver<F> {
        GuardedResolver {
            field: field_name_from_resolver(resolver_name),
            guard: self.clone(),
            resolver,
        }
    }

    /// Check `ctx`'s permissions for `field` on `data`.
    ///
    /// Every denial becomes the same [`AuthorizationError`]; the detailed
    /// reason is logged, never returned.
    pub fn check(&self, field: &str, data: &dyn FieldAccessor, ctx: &RequestContext) -> Result<(), FieldError> {
        let scope_key = match &self.scope_path {
            Some(path) => Some(derive_scope_key(data, path)?),
            None => None,
        };

        let Some(permissions) = ctx.permissions() else {
            tracing::warn!(field, user = %ctx.user(), "no permissions attached to request; denying");
            return Err(AuthorizationError::new(field).into());
        };

        match has_access(&self.required, permissions, scope_key.as_deref()) {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(field, user = %ctx.user(), error = %err, "field access denied");
                tracing::debug!(
                    field,
                    explanation = %explanation_json(&self.required, permissions, scope_key.as_deref()),
                    "access explanation"
                );
                Err(AuthorizationError::new(field).into())
            }
        }
    }
}

fn explanation_json(required: &[Permission], permissions: &NormalizedPermissions, scope_key: Option<&str>) -> String {
    serde_json::to_string(&explain_access(required, permissions, scope_key)).unwrap_or_default()
}

/// Guard a named resolver function, taking the field name from its identifier.
///
/// ```ignore
/// let budget = protect!(FieldGuard::new(["budget.read"]), resolve_budget);
/// assert_eq!(budget.field(), "budget");
/// ```
#[macro_export]
macro_rules! protect {
    ($guard:expr, $resolver:ident $(,)?) => {
        $crate::FieldGuard::protect_named(&$guard, stringify!($resolver), $resolver)
    };
}

/// Field name for a resolver: the resolver's name without its leading token.
pub fn field_name_from_resolver(resolver_name: &str) -> String {
    match resolver_name.split_once('_') {
        Some((_, rest)) if !rest.is_empty() => rest.to_string(),
        _ => resolver_name.to_string(),
    }
}

/// A resolver wrapped by a [`FieldGuard`].
#[derive(Debug, Clone)]
pub struct GuardedResolver<F> {
    field: String,
    guard: FieldGuard,
    resolver: F,
}

impl<F> GuardedResolver<F> {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn guard(&self) -> &FieldGuard {
        &self.guard
    }

    /// Check access, then delegate to the wrapped resolver unchanged.
    pub fn call<T, V>(&self, data: &T, ctx: &RequestContext) -> Result<V, FieldError>
    where
        T: FieldAccessor,
        F: Fn(&T, &RequestContext) -> Result<V, FieldError>,
    {
        self.guard.check(&self.field, data, ctx)?;
        (self.resolver)(data, ctx)
    }

    /// Like [`call`](Self::call) for resolvers taking field arguments.
    pub fn call_with_args<T, A, V>(&self, data: &T, ctx: &RequestContext, args: A) -> Result<V, FieldError>
    where
        T: FieldAccessor,
        F: Fn(&T, &RequestContext, A) -> Result<V, FieldError>,
    {
        self.guard.check(&self.field, data, ctx)?;
        (self.resolver)(data, ctx, args)
    }
}

/// Scope selection for an inline check: walk `path` on `data`.
#[derive(Clone, Copy)]
pub struct ScopeFilter<'a> {
    pub data: &'a dyn FieldAccessor,
    pub path: &'a str,
}

impl<'a> ScopeFilter<'a> {
    pub fn new(data: &'a dyn FieldAccessor, path: &'a str) -> Self {
        Self { data, path }
    }
}

/// Inline access check for resolvers that cannot be wrapped.
///
/// Uses the request's cached permissions, loading them through `loader` if no
/// middleware did so yet. Anonymous users are checked against an empty set.
/// Unlike a guard, the detailed [`AccessError`](fieldperm_auth::AccessError)
/// is returned, so the caller decides what to expose.
pub fn check_field_access(
    ctx: &RequestContext,
    loader: &PermissionLoader,
    required: &[Permission],
    scope: Option<ScopeFilter<'_>>,
) -> Result<(), FieldError> {
    let scope_key = match scope {
        Some(filter) => Some(derive_scope_key(filter.data, filter.path)?),
        None => None,
    };

    let empty = NormalizedPermissions::empty();
    let permissions = ctx.load_permissions(loader)?.unwrap_or(&empty);

    has_access(required, permissions, scope_key.as_deref())?;
    Ok(())
}
