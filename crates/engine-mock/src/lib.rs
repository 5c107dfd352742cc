//! Scriptable engine manager for tests and local runs.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use keeper_dcs::{Cluster, Member};
use keeper_engine::{Capabilities, EngineManager, Error, Result, RoleType, UserInfo};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Capacity of the pushed-role channel.
const ROLE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug)]
struct State {
    role: String,
    is_leader: bool,
    leader_member: Option<String>,
    leader_healthy: bool,
    current_member_healthy: bool,
    unhealthy_members: HashSet<String>,
    locked: bool,
    users: BTreeMap<String, UserInfo>,
    system_accounts: Vec<UserInfo>,
    failures: HashMap<&'static str, Error>,
    calls: HashMap<&'static str, usize>,
    call_log: Vec<String>,
    role_senders: Vec<mpsc::Sender<String>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            role: "primary".to_string(),
            is_leader: false,
            leader_member: None,
            leader_healthy: true,
            current_member_healthy: true,
            unhealthy_members: HashSet::new(),
            locked: false,
            users: BTreeMap::new(),
            system_accounts: Vec::new(),
            failures: HashMap::new(),
            calls: HashMap::new(),
            call_log: Vec::new(),
            role_senders: Vec::new(),
        }
    }
}

/// Engine manager whose answers are set by the caller.
///
/// Every call is counted under its method name (`"lock"`, `"failover"`...).
/// A failure registered with [`MockEngineManager::fail`] is returned by that
/// method until cleared. Clones share state.
#[derive(Clone, Debug)]
pub struct MockEngineManager {
    member_name: String,
    capabilities: Capabilities,
    state: Arc<Mutex<State>>,
}

impl MockEngineManager {
    /// Creates a mock running next to `member_name` with every capability.
    #[must_use]
    pub fn new(member_name: impl Into<String>) -> Self {
        Self {
            member_name: member_name.into(),
            capabilities: Capabilities::all(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Replaces the declared capabilities.
    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the role reported by `get_replica_role`.
    pub fn set_role(&self, role: impl Into<String>) {
        self.state.lock().role = role.into();
    }

    /// Sets whether the local member is the leader.
    pub fn set_leader(&self, is_leader: bool) {
        self.state.lock().is_leader = is_leader;
    }

    /// Overrides which member `is_leader_member` confirms. Defaults to the
    /// cluster's lease holder.
    pub fn set_leader_member(&self, name: impl Into<String>) {
        self.state.lock().leader_member = Some(name.into());
    }

    /// Sets the outcome of `leader_healthy_check`.
    pub fn set_leader_healthy(&self, healthy: bool) {
        self.state.lock().leader_healthy = healthy;
    }

    /// Sets the health of the local member.
    pub fn set_current_member_healthy(&self, healthy: bool) {
        self.state.lock().current_member_healthy = healthy;
    }

    /// Sets the health of another member.
    pub fn set_member_healthy(&self, name: &str, healthy: bool) {
        let mut state = self.state.lock();
        if healthy {
            state.unhealthy_members.remove(name);
        } else {
            state.unhealthy_members.insert(name.to_string());
        }
    }

    /// Makes `method` fail with `error` until [`MockEngineManager::clear_failure`].
    pub fn fail(&self, method: &'static str, error: Error) {
        self.state.lock().failures.insert(method, error);
    }

    /// Removes a failure set by [`MockEngineManager::fail`].
    pub fn clear_failure(&self, method: &'static str) {
        self.state.lock().failures.remove(method);
    }

    /// Adds a system account reported by `list_system_accounts`.
    pub fn add_system_account(&self, user: UserInfo) {
        self.state.lock().system_accounts.push(user);
    }

    /// Pushes `role` to every role subscriber. Returns how many received it.
    pub fn push_role(&self, role: &str) -> usize {
        let senders = self.state.lock().role_senders.clone();
        senders
            .iter()
            .filter(|sender| sender.try_send(role.to_string()).is_ok())
            .count()
    }

    /// Whether the instance is currently locked read-only.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Number of calls made to `method`.
    #[must_use]
    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().calls.get(method).copied().unwrap_or(0)
    }

    /// Every call in order, with its main argument when there is one.
    #[must_use]
    pub fn call_log(&self) -> Vec<String> {
        self.state.lock().call_log.clone()
    }

    /// Counts the call and returns the registered failure, if any.
    fn record(&self, method: &'static str, detail: Option<&str>) -> Result<()> {
        debug!("mock engine call: {} {:?}", method, detail);

        let mut state = self.state.lock();
        *state.calls.entry(method).or_default() += 1;
        let entry = detail.map_or_else(|| method.to_string(), |d| format!("{method}:{d}"));
        state.call_log.push(entry);

        state.failures.get(method).cloned().map_or(Ok(()), Err)
    }
}

#[async_trait]
impl EngineManager for MockEngineManager {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn get_current_member_name(&self) -> String {
        self.member_name.clone()
    }

    async fn get_replica_role(&self, _cluster: &Cluster) -> Result<String> {
        self.record("get_replica_role", None)?;
        Ok(self.state.lock().role.clone())
    }

    async fn is_leader(&self, _cluster: &Cluster) -> Result<bool> {
        self.record("is_leader", None)?;
        Ok(self.state.lock().is_leader)
    }

    async fn is_leader_member(&self, cluster: &Cluster, member: &Member) -> Result<bool> {
        self.record("is_leader_member", Some(&member.name))?;

        let state = self.state.lock();
        let leader = state
            .leader_member
            .clone()
            .or_else(|| cluster.leader.as_ref().map(|l| l.name.clone()));

        Ok(leader.as_deref() == Some(member.name.as_str()))
    }

    async fn leader_healthy_check(&self, _cluster: &Cluster) -> Result<()> {
        self.record("leader_healthy_check", None)?;

        if self.state.lock().leader_healthy {
            Ok(())
        } else {
            Err(Error::Unhealthy("leader is not reachable".to_string()))
        }
    }

    async fn current_member_healthy_check(&self, _cluster: &Cluster) -> Result<()> {
        self.record("current_member_healthy_check", None)?;

        if self.state.lock().current_member_healthy {
            Ok(())
        } else {
            Err(Error::Unhealthy(format!("{} is not healthy", self.member_name)))
        }
    }

    async fn is_current_member_healthy(&self, _cluster: &Cluster) -> bool {
        let _ = self.record("is_current_member_healthy", None);
        self.state.lock().current_member_healthy
    }

    async fn is_member_healthy(&self, _cluster: &Cluster, member: &Member) -> bool {
        let _ = self.record("is_member_healthy", Some(&member.name));

        let state = self.state.lock();
        if member.name == self.member_name {
            return state.current_member_healthy;
        }
        !state.unhealthy_members.contains(&member.name)
    }

    async fn has_other_healthy_members(&self, cluster: &Cluster, leader: &str) -> Vec<Member> {
        let _ = self.record("has_other_healthy_members", Some(leader));

        let state = self.state.lock();
        cluster
            .members
            .iter()
            .filter(|m| m.name != leader)
            .filter(|m| {
                if m.name == self.member_name {
                    state.current_member_healthy
                } else {
                    !state.unhealthy_members.contains(&m.name)
                }
            })
            .cloned()
            .collect()
    }

    async fn leave_member_from_cluster(&self, _cluster: &Cluster, member_name: &str) -> Result<()> {
        self.record("leave_member_from_cluster", Some(member_name))
    }

    async fn join_current_member_to_cluster(&self, _cluster: &Cluster) -> Result<()> {
        self.record("join_current_member_to_cluster", None)
    }

    async fn lock(&self, reason: &str) -> Result<()> {
        self.record("lock", Some(reason))?;
        self.state.lock().locked = true;
        Ok(())
    }

    async fn unlock(&self) -> Result<()> {
        self.record("unlock", None)?;
        self.state.lock().locked = false;
        Ok(())
    }

    async fn failover(&self, _cluster: &Cluster, candidate: &str) -> Result<()> {
        self.record("failover", Some(candidate))
    }

    async fn post_provision(&self, _cluster: &Cluster) -> Result<()> {
        self.record("post_provision", None)
    }

    async fn pre_terminate(&self) -> Result<()> {
        self.record("pre_terminate", None)
    }

    async fn create_user(&self, user: &UserInfo) -> Result<()> {
        self.record("create_user", Some(&user.user_name))?;

        let mut state = self.state.lock();
        if state.users.contains_key(&user.user_name) {
            return Err(Error::Failed(format!("user {} already exists", user.user_name)));
        }
        let stored = UserInfo {
            password: None,
            ..user.clone()
        };
        state.users.insert(user.user_name.clone(), stored);
        Ok(())
    }

    async fn delete_user(&self, user_name: &str) -> Result<()> {
        self.record("delete_user", Some(user_name))?;

        self.state
            .lock()
            .users
            .remove(user_name)
            .map(|_| ())
            .ok_or_else(|| Error::Failed(format!("user {user_name} not found")))
    }

    async fn describe_user(&self, user_name: &str) -> Result<UserInfo> {
        self.record("describe_user", Some(user_name))?;

        self.state
            .lock()
            .users
            .get(user_name)
            .cloned()
            .ok_or_else(|| Error::Failed(format!("user {user_name} not found")))
    }

    async fn list_users(&self) -> Result<Vec<UserInfo>> {
        self.record("list_users", None)?;
        Ok(self.state.lock().users.values().cloned().collect())
    }

    async fn list_system_accounts(&self) -> Result<Vec<UserInfo>> {
        self.record("list_system_accounts", None)?;
        Ok(self.state.lock().system_accounts.clone())
    }

    async fn grant_user_role(&self, user_name: &str, role: RoleType) -> Result<()> {
        self.record("grant_user_role", Some(user_name))?;

        let mut state = self.state.lock();
        let user = state
            .users
            .get_mut(user_name)
            .ok_or_else(|| Error::Failed(format!("user {user_name} not found")))?;
        user.role_name = Some(role);
        Ok(())
    }

    async fn revoke_user_role(&self, user_name: &str, role: RoleType) -> Result<()> {
        self.record("revoke_user_role", Some(user_name))?;

        let mut state = self.state.lock();
        let user = state
            .users
            .get_mut(user_name)
            .ok_or_else(|| Error::Failed(format!("user {user_name} not found")))?;
        if user.role_name == Some(role) {
            user.role_name = None;
        }
        Ok(())
    }

    async fn subscribe_roles(&self) -> Result<mpsc::Receiver<String>> {
        if !self.capabilities.role_subscription {
            return Err(Error::NotImplemented("role subscription".to_string()));
        }
        self.record("subscribe_roles", None)?;

        let (tx, rx) = mpsc::channel(ROLE_CHANNEL_CAPACITY);
        self.state.lock().role_senders.push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use keeper_dcs::Leader;

    fn cluster() -> Cluster {
        Cluster {
            name: "redis".to_string(),
            members: ["redis-0", "redis-1", "redis-2"]
                .into_iter()
                .map(|name| Member {
                    name: name.to_string(),
                    ..Member::default()
                })
                .collect(),
            leader: Some(Leader {
                name: "redis-0".to_string(),
                ..Leader::default()
            }),
            ..Cluster::default()
        }
    }

    #[tokio::test]
    async fn test_failures_are_sticky_until_cleared() {
        let engine = MockEngineManager::new("redis-1");
        engine.fail("lock", Error::Failed("read-only fs".to_string()));

        assert_matches!(engine.lock("disk full").await, Err(Error::Failed(_)));
        assert_matches!(engine.lock("disk full").await, Err(Error::Failed(_)));
        assert!(!engine.is_locked());

        engine.clear_failure("lock");
        engine.lock("disk full").await.unwrap();
        assert!(engine.is_locked());
        assert_eq!(engine.calls("lock"), 3);
    }

    #[tokio::test]
    async fn test_other_healthy_members() {
        let engine = MockEngineManager::new("redis-1");
        engine.set_member_healthy("redis-2", false);

        let healthy = engine.has_other_healthy_members(&cluster(), "redis-0").await;

        assert_eq!(
            healthy.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            vec!["redis-1"]
        );
    }

    #[tokio::test]
    async fn test_leader_member_defaults_to_lease_holder() {
        let engine = MockEngineManager::new("redis-1");
        let cluster = cluster();

        assert!(engine.is_leader_member(&cluster, &cluster.members[0]).await.unwrap());
        assert!(!engine.is_leader_member(&cluster, &cluster.members[1]).await.unwrap());

        engine.set_leader_member("redis-1");
        assert!(engine.is_leader_member(&cluster, &cluster.members[1]).await.unwrap());
    }

    #[tokio::test]
    async fn test_role_subscription() {
        let engine = MockEngineManager::new("redis-1");
        let mut roles = engine.subscribe_roles().await.unwrap();

        assert_eq!(engine.push_role("secondary"), 1);
        assert_eq!(roles.recv().await.as_deref(), Some("secondary"));
    }

    #[tokio::test]
    async fn test_role_subscription_requires_capability() {
        let engine = MockEngineManager::new("redis-1").with_capabilities(Capabilities::default());

        assert_matches!(engine.subscribe_roles().await, Err(Error::NotImplemented(_)));
    }
}
