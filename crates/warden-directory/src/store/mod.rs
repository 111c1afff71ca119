use async_trait::async_trait;
use std::collections::HashSet;
use warden_types::{Grant, GroupId, Principal, UserId};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

pub type StoreResult<T> = warden_types::Result<T>;

/// Persistence contract the engines depend on.
///
/// Beyond the row primitives, implementations own the two closure queries over
/// the group DAG, the cycle predicate, and the authoritative reach test behind
/// permission decisions. Writes are idempotent: re-adding a membership edge,
/// an existing hierarchy edge, or a grant is a successful no-op.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn create_user(&self, name: &str) -> StoreResult<UserId>;
    async fn user_name(&self, user: UserId) -> StoreResult<String>;
    async fn create_group(&self, name: &str) -> StoreResult<GroupId>;
    async fn group_name(&self, group: GroupId) -> StoreResult<String>;

    /// Records direct membership. Endpoints are not validated; an edge naming
    /// an unknown id is invisible to every query.
    async fn add_membership(&self, user: UserId, group: GroupId) -> StoreResult<()>;
    /// Direct members of `group`, ascending and distinct. Empty for unknown
    /// groups, never an error.
    async fn users_in_group(&self, group: GroupId) -> StoreResult<Vec<UserId>>;
    /// Members of `group` and of every group transitively nested in it,
    /// ascending and distinct.
    async fn users_in_group_transitive(&self, group: GroupId) -> StoreResult<Vec<UserId>>;

    /// Inserts the `child -> parent` nesting edge unless doing so would close
    /// a cycle, in which case the call fails with `CycleDetected` and no edge
    /// is persisted. The cycle check and the insert are one atomic step with
    /// respect to concurrent `add_hierarchy` calls.
    async fn add_hierarchy(&self, child: GroupId, parent: GroupId) -> StoreResult<()>;
    /// Groups directly nested in `group`, ascending and distinct.
    async fn groups_in_group(&self, group: GroupId) -> StoreResult<Vec<GroupId>>;
    /// Reflexive-transitive closure of `group` following parent -> child
    /// edges: the group itself plus everything nested below it.
    async fn descendants_of(&self, group: GroupId) -> StoreResult<HashSet<GroupId>>;
    /// Groups that transitively contain `principal`. For a group the result
    /// includes the group itself; for a user it is the closure of the user's
    /// direct memberships and never contains the user.
    async fn ancestors_of(&self, principal: Principal) -> StoreResult<HashSet<GroupId>>;
    /// True iff inserting `child -> parent` would close a cycle, including
    /// the self-loop case.
    async fn would_create_cycle(&self, child: GroupId, parent: GroupId) -> StoreResult<bool>;

    async fn add_grant(&self, grant: Grant) -> StoreResult<()>;
    /// Authoritative decision primitive: true iff some stored grant connects
    /// the source reach of `user` (the user plus its ancestor groups) to the
    /// target reach of `target` (the target plus its ancestor groups).
    async fn user_has_access(&self, user: UserId, target: Principal) -> StoreResult<bool>;

    /// Releases any backing resource. Further calls are undefined.
    async fn close(&self);
    fn backend_name(&self) -> &'static str;
}
