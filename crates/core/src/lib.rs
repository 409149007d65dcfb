//! `fieldperm-core` — identity primitives shared by the authorization crates.
//!
//! This crate carries no authorization logic; it only describes *who* is
//! asking.

pub mod error;
pub mod id;
pub mod identity;

pub use error::DomainError;
pub use id::UserId;
pub use identity::UserIdentity;
