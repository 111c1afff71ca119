//! The directory service: public operation surface over a [`DirectoryStore`].
//!
//! Holds no mutable state of its own; every call reads or writes through the
//! store. Each operation takes a [`CancellationToken`] first and races the
//! store future against it, surfacing [`DirectoryError::Cancelled`] when the
//! token fires. A store future dropped mid-flight aborts its transaction, so
//! cancelled writes leave no partial state.
//!
//! Cycle prevention is not re-checked here; the store's `add_hierarchy` is the
//! single authoritative location.
use crate::store::DirectoryStore;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use warden_types::{DirectoryError, Grant, GroupId, Principal, Result, UserId};

/// Directory operations plus the permission decision procedure.
#[derive(Clone)]
pub struct Directory {
    store: Arc<dyn DirectoryStore>,
}

impl Directory {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    /// Race a store future against the caller's token. An already-cancelled
    /// token wins deterministically.
    async fn run<T>(
        &self,
        cancel: &CancellationToken,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DirectoryError::Cancelled),
            result = fut => result,
        }
    }

    pub async fn create_user(&self, cancel: &CancellationToken, name: &str) -> Result<UserId> {
        let id = self.run(cancel, self.store.create_user(name)).await?;
        tracing::debug!(user = %id, "created user");
        Ok(id)
    }

    pub async fn get_user_name(&self, cancel: &CancellationToken, user: UserId) -> Result<String> {
        self.run(cancel, self.store.user_name(user)).await
    }

    pub async fn create_group(&self, cancel: &CancellationToken, name: &str) -> Result<GroupId> {
        let id = self.run(cancel, self.store.create_group(name)).await?;
        tracing::debug!(group = %id, "created group");
        Ok(id)
    }

    pub async fn get_group_name(
        &self,
        cancel: &CancellationToken,
        group: GroupId,
    ) -> Result<String> {
        self.run(cancel, self.store.group_name(group)).await
    }

    pub async fn add_user_to_group(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        group: GroupId,
    ) -> Result<()> {
        self.run(cancel, self.store.add_membership(user, group)).await
    }

    pub async fn users_in_group(
        &self,
        cancel: &CancellationToken,
        group: GroupId,
    ) -> Result<Vec<UserId>> {
        self.run(cancel, self.store.users_in_group(group)).await
    }

    /// Nests `child` inside `parent`. Fails with `CycleDetected` when the edge
    /// would close a cycle; re-adding an existing edge is a no-op.
    pub async fn add_group_to_group(
        &self,
        cancel: &CancellationToken,
        child: GroupId,
        parent: GroupId,
    ) -> Result<()> {
        self.run(cancel, self.store.add_hierarchy(child, parent)).await
    }

    pub async fn groups_in_group(
        &self,
        cancel: &CancellationToken,
        group: GroupId,
    ) -> Result<Vec<GroupId>> {
        self.run(cancel, self.store.groups_in_group(group)).await
    }

    pub async fn users_in_group_transitive(
        &self,
        cancel: &CancellationToken,
        group: GroupId,
    ) -> Result<Vec<UserId>> {
        self.run(cancel, self.store.users_in_group_transitive(group))
            .await
    }

    /// Records a directed grant between any combination of user and group
    /// endpoints. Grants are never implicitly bidirectional.
    pub async fn add_grant(
        &self,
        cancel: &CancellationToken,
        source: impl Into<Principal>,
        target: impl Into<Principal>,
    ) -> Result<()> {
        self.run(cancel, self.store.add_grant(Grant::new(source, target)))
            .await
    }

    /// Name lookup gated by the permission decision. Denial wins over a
    /// missing target: the access check runs first and a negative verdict
    /// returns `PermissionDenied` without touching the principal row.
    pub async fn get_user_name_checked(
        &self,
        cancel: &CancellationToken,
        context_user: UserId,
        target_user: UserId,
    ) -> Result<String> {
        self.check_access(cancel, context_user, Principal::User(target_user))
            .await?;
        self.run(cancel, self.store.user_name(target_user)).await
    }

    pub async fn get_group_name_checked(
        &self,
        cancel: &CancellationToken,
        context_user: UserId,
        target_group: GroupId,
    ) -> Result<String> {
        self.check_access(cancel, context_user, Principal::Group(target_group))
            .await?;
        self.run(cancel, self.store.group_name(target_group)).await
    }

    async fn check_access(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        target: Principal,
    ) -> Result<()> {
        let allowed = self
            .run(cancel, self.store.user_has_access(user, target))
            .await?;
        if allowed {
            metrics::counter!("warden_permission_checks_total", "outcome" => "allowed")
                .increment(1);
            Ok(())
        } else {
            metrics::counter!("warden_permission_checks_total", "outcome" => "denied").increment(1);
            tracing::debug!(%user, %target, "permission denied");
            Err(DirectoryError::PermissionDenied { user, target })
        }
    }
}
