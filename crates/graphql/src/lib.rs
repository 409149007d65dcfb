//! Field-level authorization for GraphQL resolvers.
//!
//! - `context`: the per-request context and its permission slot
//! - `middleware`: resolver-chain middleware and the axum request layer
//! - `guard`: field guards wrapping individual resolvers
//! - `errors`: the user-visible error model

pub mod context;
pub mod errors;
pub mod guard;
pub mod middleware;

pub use context::RequestContext;
pub use errors::{AuthorizationError, FieldError};
pub use guard::{FieldGuard, GuardedResolver, ScopeFilter, check_field_access, field_name_from_resolver};
pub use middleware::{PermissionLayerState, PermissionsMiddleware, request_context_middleware};
