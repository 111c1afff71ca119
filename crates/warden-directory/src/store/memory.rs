//! In-memory implementation of the directory store.
//!
//! Backs local development and tests with `HashMap`/`BTreeSet` state guarded
//! by `tokio::sync::RwLock`. Not durable: all state is lost on restart.
//! Closure queries are explicit breadth-first walks over the nesting edges,
//! `O(V + E)` on the group DAG.
//!
//! The hierarchy lives behind a single lock and `add_hierarchy` holds the
//! write guard across the cycle check and the insert, which makes the pair
//! atomic with respect to concurrent writers; readers can never observe a
//! cyclic edge set.
use super::{DirectoryStore, StoreResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;
use warden_types::{DirectoryError, Grant, GroupId, Principal, UserId};

/// Directed nesting edges kept in both orientations so the store can walk
/// parent -> child (descendants) and child -> parent (ancestors) without
/// scanning.
#[derive(Debug, Default)]
struct Hierarchy {
    parents: HashMap<GroupId, BTreeSet<GroupId>>,
    children: HashMap<GroupId, BTreeSet<GroupId>>,
}

impl Hierarchy {
    fn insert(&mut self, child: GroupId, parent: GroupId) {
        self.parents.entry(child).or_default().insert(parent);
        self.children.entry(parent).or_default().insert(child);
    }

    fn direct_children(&self, group: GroupId) -> BTreeSet<GroupId> {
        self.children.get(&group).cloned().unwrap_or_default()
    }

    /// Reflexive-transitive closure downwards: `root` plus everything nested
    /// below it.
    fn descendants(&self, root: GroupId) -> HashSet<GroupId> {
        self.walk([root], &self.children)
    }

    /// Transitive closure upwards from a seed set; includes the seeds.
    fn ancestors(&self, seeds: impl IntoIterator<Item = GroupId>) -> HashSet<GroupId> {
        self.walk(seeds, &self.parents)
    }

    fn walk(
        &self,
        seeds: impl IntoIterator<Item = GroupId>,
        edges: &HashMap<GroupId, BTreeSet<GroupId>>,
    ) -> HashSet<GroupId> {
        let mut seen: HashSet<GroupId> = seeds.into_iter().collect();
        let mut frontier: VecDeque<GroupId> = seen.iter().copied().collect();
        while let Some(group) = frontier.pop_front() {
            if let Some(next) = edges.get(&group) {
                for &candidate in next {
                    if seen.insert(candidate) {
                        frontier.push_back(candidate);
                    }
                }
            }
        }
        seen
    }
}

/// In-memory directory store.
///
/// State is split across independently locked structures; reads proceed
/// concurrently, writes serialize per structure. Ids are minted monotonically
/// per principal table, so the user and group sequences are independent.
pub struct InMemoryStore {
    users: RwLock<BTreeMap<UserId, String>>,
    groups: RwLock<BTreeMap<GroupId, String>>,
    /// Direct membership, group -> members.
    members: RwLock<HashMap<GroupId, BTreeSet<UserId>>>,
    hierarchy: RwLock<Hierarchy>,
    grants: RwLock<HashSet<Grant>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            groups: RwLock::new(BTreeMap::new()),
            members: RwLock::new(HashMap::new()),
            hierarchy: RwLock::new(Hierarchy::default()),
            grants: RwLock::new(HashSet::new()),
        }
    }

    /// Groups the user is a direct member of.
    async fn direct_groups_of(&self, user: UserId) -> Vec<GroupId> {
        self.members
            .read()
            .await
            .iter()
            .filter(|(_, users)| users.contains(&user))
            .map(|(&group, _)| group)
            .collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryStore for InMemoryStore {
    async fn create_user(&self, name: &str) -> StoreResult<UserId> {
        let mut users = self.users.write().await;
        // No deletions in this store, so last key + 1 stays monotonic.
        let id = UserId::from(users.last_key_value().map_or(0, |(k, _)| k.as_i64()) + 1);
        users.insert(id, name.to_string());
        Ok(id)
    }

    async fn user_name(&self, user: UserId) -> StoreResult<String> {
        self.users
            .read()
            .await
            .get(&user)
            .cloned()
            .ok_or(DirectoryError::UserNotFound(user))
    }

    async fn create_group(&self, name: &str) -> StoreResult<GroupId> {
        let mut groups = self.groups.write().await;
        let id = GroupId::from(groups.last_key_value().map_or(0, |(k, _)| k.as_i64()) + 1);
        groups.insert(id, name.to_string());
        Ok(id)
    }

    async fn group_name(&self, group: GroupId) -> StoreResult<String> {
        self.groups
            .read()
            .await
            .get(&group)
            .cloned()
            .ok_or(DirectoryError::GroupNotFound(group))
    }

    async fn add_membership(&self, user: UserId, group: GroupId) -> StoreResult<()> {
        // Set insert absorbs duplicates.
        self.members
            .write()
            .await
            .entry(group)
            .or_default()
            .insert(user);
        Ok(())
    }

    async fn users_in_group(&self, group: GroupId) -> StoreResult<Vec<UserId>> {
        // BTreeSet iteration gives the ascending distinct order directly.
        Ok(self
            .members
            .read()
            .await
            .get(&group)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn users_in_group_transitive(&self, group: GroupId) -> StoreResult<Vec<UserId>> {
        let nested = self.hierarchy.read().await.descendants(group);
        let members = self.members.read().await;
        let mut users = BTreeSet::new();
        for group in nested {
            if let Some(direct) = members.get(&group) {
                users.extend(direct.iter().copied());
            }
        }
        Ok(users.into_iter().collect())
    }

    async fn add_hierarchy(&self, child: GroupId, parent: GroupId) -> StoreResult<()> {
        // The write guard spans check and insert; concurrent writers serialize
        // here, so two edges that are each acyclic in isolation cannot land
        // together and form a cycle.
        let mut hierarchy = self.hierarchy.write().await;
        if child == parent || hierarchy.descendants(child).contains(&parent) {
            metrics::counter!("warden_hierarchy_inserts_total", "outcome" => "cycle").increment(1);
            return Err(DirectoryError::CycleDetected { child, parent });
        }
        hierarchy.insert(child, parent);
        metrics::counter!("warden_hierarchy_inserts_total", "outcome" => "ok").increment(1);
        Ok(())
    }

    async fn groups_in_group(&self, group: GroupId) -> StoreResult<Vec<GroupId>> {
        Ok(self
            .hierarchy
            .read()
            .await
            .direct_children(group)
            .into_iter()
            .collect())
    }

    async fn descendants_of(&self, group: GroupId) -> StoreResult<HashSet<GroupId>> {
        Ok(self.hierarchy.read().await.descendants(group))
    }

    async fn ancestors_of(&self, principal: Principal) -> StoreResult<HashSet<GroupId>> {
        match principal {
            Principal::User(user) => {
                let seeds = self.direct_groups_of(user).await;
                Ok(self.hierarchy.read().await.ancestors(seeds))
            }
            Principal::Group(group) => Ok(self.hierarchy.read().await.ancestors([group])),
        }
    }

    async fn would_create_cycle(&self, child: GroupId, parent: GroupId) -> StoreResult<bool> {
        if child == parent {
            return Ok(true);
        }
        Ok(self.hierarchy.read().await.descendants(child).contains(&parent))
    }

    async fn add_grant(&self, grant: Grant) -> StoreResult<()> {
        self.grants.write().await.insert(grant);
        Ok(())
    }

    async fn user_has_access(&self, user: UserId, target: Principal) -> StoreResult<bool> {
        let source_groups = self.ancestors_of(Principal::User(user)).await?;
        let target_groups = self.ancestors_of(target).await?;

        let grants = self.grants.read().await;
        let allowed = grants.iter().any(|grant| {
            let source_matches = match grant.source {
                Principal::User(u) => u == user,
                Principal::Group(g) => source_groups.contains(&g),
            };
            if !source_matches {
                return false;
            }
            match (grant.target, target) {
                (Principal::User(t), Principal::User(wanted)) => t == wanted,
                (Principal::Group(g), _) => target_groups.contains(&g),
                (Principal::User(_), Principal::Group(_)) => false,
            }
        });
        Ok(allowed)
    }

    async fn close(&self) {}

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_are_monotonic_and_spaces_independent() {
        let store = InMemoryStore::new();
        let alice = store.create_user("alice").await.expect("user");
        let bob = store.create_user("bob").await.expect("user");
        assert!(bob > alice);

        let staff = store.create_group("staff").await.expect("group");
        // First group id may equal the first user id; the spaces are disjoint.
        assert_eq!(staff.as_i64(), alice.as_i64());
    }

    #[tokio::test]
    async fn name_lookups_distinguish_missing_principals() {
        let store = InMemoryStore::new();
        let alice = store.create_user("alice").await.expect("user");
        assert_eq!(store.user_name(alice).await.expect("name"), "alice");

        let err = store.user_name(UserId::from(99)).await.expect_err("missing");
        assert!(matches!(err, DirectoryError::UserNotFound(id) if id.as_i64() == 99));

        let err = store
            .group_name(GroupId::from(99))
            .await
            .expect_err("missing");
        assert!(matches!(err, DirectoryError::GroupNotFound(id) if id.as_i64() == 99));
    }

    #[tokio::test]
    async fn membership_is_idempotent_and_sorted() {
        let store = InMemoryStore::new();
        let group = store.create_group("staff").await.expect("group");
        let b = store.create_user("b").await.expect("user");
        let a = store.create_user("a").await.expect("user");

        store.add_membership(b, group).await.expect("add");
        store.add_membership(a, group).await.expect("add");
        store.add_membership(b, group).await.expect("re-add");

        // b was created first and has the smaller id.
        assert_eq!(store.users_in_group(group).await.expect("list"), vec![b, a]);
    }

    #[tokio::test]
    async fn unknown_group_queries_are_empty_not_errors() {
        let store = InMemoryStore::new();
        let ghost = GroupId::from(42);
        assert!(store.users_in_group(ghost).await.expect("list").is_empty());
        assert!(store.groups_in_group(ghost).await.expect("list").is_empty());
        assert!(
            store
                .users_in_group_transitive(ghost)
                .await
                .expect("list")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn descendants_and_ancestors_are_reflexive_for_groups() {
        let store = InMemoryStore::new();
        let outer = store.create_group("outer").await.expect("group");
        let inner = store.create_group("inner").await.expect("group");
        store.add_hierarchy(inner, outer).await.expect("nest");

        let down = store.descendants_of(outer).await.expect("descendants");
        assert!(down.contains(&outer));
        assert!(down.contains(&inner));

        let up = store
            .ancestors_of(Principal::Group(inner))
            .await
            .expect("ancestors");
        assert!(up.contains(&inner));
        assert!(up.contains(&outer));
    }

    #[tokio::test]
    async fn user_ancestors_exclude_the_user_and_climb_the_dag() {
        let store = InMemoryStore::new();
        let team = store.create_group("team").await.expect("group");
        let org = store.create_group("org").await.expect("group");
        store.add_hierarchy(team, org).await.expect("nest");

        let user = store.create_user("u").await.expect("user");
        store.add_membership(user, team).await.expect("member");

        let up = store
            .ancestors_of(Principal::User(user))
            .await
            .expect("ancestors");
        assert_eq!(up, HashSet::from([team, org]));
    }

    #[tokio::test]
    async fn hierarchy_rejects_self_loops_and_back_edges() {
        let store = InMemoryStore::new();
        let a = store.create_group("a").await.expect("group");
        let b = store.create_group("b").await.expect("group");

        let err = store.add_hierarchy(a, a).await.expect_err("self loop");
        assert!(matches!(err, DirectoryError::CycleDetected { .. }));

        store.add_hierarchy(b, a).await.expect("nest");
        // Duplicate edge is absorbed.
        store.add_hierarchy(b, a).await.expect("re-add");

        assert!(store.would_create_cycle(a, b).await.expect("probe"));
        let err = store.add_hierarchy(a, b).await.expect_err("cycle");
        assert!(
            matches!(err, DirectoryError::CycleDetected { child, parent } if child == a && parent == b)
        );

        // Refused edge left no trace.
        assert_eq!(
            store.descendants_of(a).await.expect("descendants"),
            HashSet::from([a, b])
        );
    }

    #[tokio::test]
    async fn grants_are_idempotent() {
        let store = InMemoryStore::new();
        let user = store.create_user("u").await.expect("user");
        let other = store.create_user("o").await.expect("user");
        let grant = Grant::new(user, other);

        store.add_grant(grant).await.expect("grant");
        store.add_grant(grant).await.expect("re-grant");
        assert_eq!(store.grants.read().await.len(), 1);
        assert!(
            store
                .user_has_access(user, Principal::User(other))
                .await
                .expect("check")
        );
    }

    #[tokio::test]
    async fn backend_identity() {
        let store = InMemoryStore::new();
        assert_eq!(store.backend_name(), "memory");
        store.close().await;
    }

    #[tokio::test]
    async fn access_requires_a_matching_grant_direction() {
        let store = InMemoryStore::new();
        let user = store.create_user("u").await.expect("user");
        let other = store.create_user("o").await.expect("user");

        store.add_grant(Grant::new(user, other)).await.expect("grant");
        assert!(
            !store
                .user_has_access(other, Principal::User(user))
                .await
                .expect("check")
        );
    }
}
