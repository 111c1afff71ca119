// Shared data types used across the warden crates.
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Failure taxonomy for directory operations.
///
/// The first four variants are domain outcomes and carry the identifiers that
/// triggered them; callers map them to distinct terminal statuses. `Cancelled`
/// signals a caller-initiated abort and `Store` wraps an opaque backend cause.
/// Domain errors are never folded into `Store`.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user not found: {0}")]
    UserNotFound(UserId),
    #[error("user group not found: {0}")]
    GroupNotFound(GroupId),
    #[error("adding group {child} to group {parent} would create a cycle")]
    CycleDetected { child: GroupId, parent: GroupId },
    #[error("user {user} does not have permission to access {target}")]
    PermissionDenied { user: UserId, target: Principal },
    #[error("operation cancelled")]
    Cancelled,
    #[error("store failure: {0}")]
    Store(#[from] anyhow::Error),
}

pub mod ids {
    // Strongly typed IDs so user and group identifier spaces cannot be mixed
    // at compile time. The same raw integer may name one of each; the store
    // mints both sequences independently.
    use serde::{Deserialize, Serialize};
    use std::fmt;

    macro_rules! id_type {
        ($name:ident) => {
            #[derive(
                Clone,
                Copy,
                Debug,
                Eq,
                PartialEq,
                Ord,
                PartialOrd,
                Hash,
                Serialize,
                Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(i64);

            impl $name {
                // Expose the raw value for storage bindings.
                pub fn as_i64(&self) -> i64 {
                    self.0
                }
            }

            impl From<i64> for $name {
                fn from(raw: i64) -> Self {
                    Self(raw)
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        };
    }

    id_type!(UserId);
    id_type!(GroupId);
}

pub use ids::{GroupId, UserId};

/// A permission endpoint: either a user or a user group.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    User(UserId),
    Group(GroupId),
}

impl Principal {
    /// Stable kind tag persisted in grant rows.
    pub fn kind(&self) -> &'static str {
        match self {
            Principal::User(_) => "user",
            Principal::Group(_) => "group",
        }
    }

    pub fn raw_id(&self) -> i64 {
        match self {
            Principal::User(id) => id.as_i64(),
            Principal::Group(id) => id.as_i64(),
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.raw_id())
    }
}

impl From<UserId> for Principal {
    fn from(id: UserId) -> Self {
        Principal::User(id)
    }
}

impl From<GroupId> for Principal {
    fn from(id: GroupId) -> Self {
        Principal::Group(id)
    }
}

/// A stored, directed permission tuple. Grants are ordered: `source → target`
/// never implies the reverse.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub source: Principal,
    pub target: Principal,
}

impl Grant {
    pub fn new(source: impl Into<Principal>, target: impl Into<Principal>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}
