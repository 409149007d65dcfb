//! `fieldperm-auth` — transport-agnostic field authorization.
//!
//! This crate is intentionally decoupled from HTTP and from any GraphQL
//! engine: it normalizes permission data, derives scope keys from resolved
//! objects and decides access.

pub mod authorize;
pub mod loader;
pub mod permissions;
pub mod scope;

pub use authorize::{
    AccessError, AccessExplanation, DenialKind, DenialReason, explain_access, has_access,
    relevant_permissions,
};
pub use loader::{
    LoaderError, PermissionLoader, PermissionSource, PermissionSourceConfig, SourceModule,
    SourceRegistry,
};
pub use permissions::{
    NormalizeError, NormalizedPermissions, Permission, PermissionSet, RawPermissions, normalize,
};
pub use scope::{FieldAccessor, PathResolutionError, derive_scope_key};
