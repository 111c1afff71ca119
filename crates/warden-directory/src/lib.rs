//! Directory authorization core.
//!
//! # Purpose
//! Manages principals (users and user groups), nested group membership, and a
//! polymorphic grant relation between principals, and decides whether one user
//! may read another principal. Grants attach to users or to groups; a grant
//! held by a group extends to every user transitively contained in it, and a
//! grant targeting a group covers every principal transitively contained in
//! the target.
//!
//! # Layering
//! [`store::DirectoryStore`] is the persistence contract (primitives plus the
//! closure queries and the atomic cycle-gated hierarchy insert);
//! [`store::PostgresStore`] and [`store::InMemoryStore`] implement it;
//! [`Directory`] layers the permission decision procedure and the public
//! operation surface on top. This crate has no network surface; an embedding
//! service owns transport, authentication ingress, and observability wiring.
pub mod config;
pub mod service;
pub mod store;

pub use service::Directory;
pub use warden_types::{DirectoryError, Grant, GroupId, Principal, Result, UserId};
