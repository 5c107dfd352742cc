//! Engine manager that delegates every call to a configured command.
//!
//! The command runs once per call. The call is described through environment
//! variables: `KB_METHOD` names the method, `KB_MEMBER_NAME` the local member,
//! `KB_CLUSTER` carries the cluster view as JSON, and method arguments arrive
//! as `KB_CANDIDATE`, `KB_LEADER`, `KB_TARGET_MEMBER`, `KB_REASON`,
//! `KB_USER_NAME`, `KB_PASSWORD` and `KB_ROLE_NAME`.
//!
//! Exit status 0 is success. Anything else fails the call with the command's
//! stderr. Results are read from stdout: a role as plain text, booleans as
//! `true`/`false`, member lists one name per line and accounts as JSON.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use keeper_dcs::{Cluster, Member};
use keeper_engine::{Capabilities, EngineManager, Error, Result, RoleType, UserInfo};
use tokio::process::Command;
use tracing::{debug, warn};

/// Time a command may run before it is killed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine manager running `command` for every call.
#[derive(Clone, Debug)]
pub struct CommandEngineManager {
    member_name: String,
    command: Vec<String>,
    timeout: Duration,
}

/// One pending command run.
struct Invocation<'a> {
    manager: &'a CommandEngineManager,
    method: &'static str,
    env: Vec<(&'static str, String)>,
}

impl Invocation<'_> {
    fn env(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.env.push((key, value.into()));
        self
    }

    fn cluster(self, cluster: &Cluster) -> Result<Self> {
        let json = serde_json::to_string(cluster)
            .map_err(|e| Error::InvalidArgument(format!("encoding cluster: {e}")))?;
        Ok(self.env("KB_CLUSTER", json))
    }

    /// Runs the command and returns its trimmed stdout.
    async fn run(self) -> Result<String> {
        let manager = self.manager;
        let (program, args) = manager
            .command
            .split_first()
            .ok_or_else(|| Error::InvalidArgument("empty command".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .env("KB_METHOD", self.method)
            .env("KB_MEMBER_NAME", &manager.member_name)
            .envs(self.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!("running {:?} for {}", manager.command, self.method);

        let output = tokio::time::timeout(manager.timeout, command.output())
            .await
            .map_err(|_| {
                Error::Failed(format!("{} timed out after {:?}", self.method, manager.timeout))
            })?
            .map_err(|e| Error::Failed(format!("failed to run {program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} failed ({}): {}", self.method, output.status, stderr.trim());
            return Err(Error::Failed(format!(
                "{} failed ({}): {}",
                self.method,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn parse_bool(method: &str, stdout: &str) -> Result<bool> {
    match stdout {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::Failed(format!("{method} printed {other:?}, expected true or false"))),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(method: &str, stdout: &str) -> Result<T> {
    serde_json::from_str(stdout).map_err(|e| Error::Failed(format!("{method} printed invalid JSON: {e}")))
}

impl CommandEngineManager {
    /// Creates a manager for `member_name` running `command` (program first).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `command` is empty.
    pub fn new(member_name: impl Into<String>, command: Vec<String>) -> Result<Self> {
        if command.is_empty() {
            return Err(Error::InvalidArgument("empty command".to_string()));
        }

        Ok(Self {
            member_name: member_name.into(),
            command,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Replaces the per-run timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    const fn invoke(&self, method: &'static str) -> Invocation<'_> {
        Invocation {
            manager: self,
            method,
            env: Vec::new(),
        }
    }
}

#[async_trait]
impl EngineManager for CommandEngineManager {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            role_subscription: false,
            ..Capabilities::all()
        }
    }

    fn get_current_member_name(&self) -> String {
        self.member_name.clone()
    }

    async fn get_replica_role(&self, cluster: &Cluster) -> Result<String> {
        self.invoke("get_replica_role").cluster(cluster)?.run().await
    }

    async fn is_leader(&self, cluster: &Cluster) -> Result<bool> {
        let stdout = self.invoke("is_leader").cluster(cluster)?.run().await?;
        parse_bool("is_leader", &stdout)
    }

    async fn is_leader_member(&self, cluster: &Cluster, member: &Member) -> Result<bool> {
        let stdout = self
            .invoke("is_leader_member")
            .cluster(cluster)?
            .env("KB_TARGET_MEMBER", member.name.clone())
            .run()
            .await?;
        parse_bool("is_leader_member", &stdout)
    }

    async fn leader_healthy_check(&self, cluster: &Cluster) -> Result<()> {
        self.invoke("leader_healthy_check").cluster(cluster)?.run().await.map(drop)
    }

    async fn current_member_healthy_check(&self, cluster: &Cluster) -> Result<()> {
        self.invoke("current_member_healthy_check")
            .cluster(cluster)?
            .run()
            .await
            .map(drop)
    }

    async fn is_current_member_healthy(&self, cluster: &Cluster) -> bool {
        self.current_member_healthy_check(cluster).await.is_ok()
    }

    async fn is_member_healthy(&self, cluster: &Cluster, member: &Member) -> bool {
        let Ok(invocation) = self.invoke("is_member_healthy").cluster(cluster) else {
            return false;
        };
        invocation
            .env("KB_TARGET_MEMBER", member.name.clone())
            .run()
            .await
            .is_ok()
    }

    async fn has_other_healthy_members(&self, cluster: &Cluster, leader: &str) -> Vec<Member> {
        let stdout = match self.invoke("has_other_healthy_members").cluster(cluster) {
            Ok(invocation) => invocation.env("KB_LEADER", leader).run().await,
            Err(e) => Err(e),
        };

        match stdout {
            Ok(stdout) => stdout
                .lines()
                .map(str::trim)
                .filter(|name| !name.is_empty() && *name != leader)
                .filter_map(|name| cluster.get_member_with_name(name).cloned())
                .collect(),
            Err(e) => {
                warn!("has_other_healthy_members failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn leave_member_from_cluster(&self, cluster: &Cluster, member_name: &str) -> Result<()> {
        self.invoke("leave_member_from_cluster")
            .cluster(cluster)?
            .env("KB_TARGET_MEMBER", member_name)
            .run()
            .await
            .map(drop)
    }

    async fn join_current_member_to_cluster(&self, cluster: &Cluster) -> Result<()> {
        self.invoke("join_current_member_to_cluster")
            .cluster(cluster)?
            .run()
            .await
            .map(drop)
    }

    async fn lock(&self, reason: &str) -> Result<()> {
        self.invoke("lock").env("KB_REASON", reason).run().await.map(drop)
    }

    async fn unlock(&self) -> Result<()> {
        self.invoke("unlock").run().await.map(drop)
    }

    async fn failover(&self, cluster: &Cluster, candidate: &str) -> Result<()> {
        self.invoke("failover")
            .cluster(cluster)?
            .env("KB_CANDIDATE", candidate)
            .run()
            .await
            .map(drop)
    }

    async fn post_provision(&self, cluster: &Cluster) -> Result<()> {
        self.invoke("post_provision").cluster(cluster)?.run().await.map(drop)
    }

    async fn pre_terminate(&self) -> Result<()> {
        self.invoke("pre_terminate").run().await.map(drop)
    }

    async fn create_user(&self, user: &UserInfo) -> Result<()> {
        let mut invocation = self
            .invoke("create_user")
            .env("KB_USER_NAME", user.user_name.clone());
        if let Some(password) = &user.password {
            invocation = invocation.env("KB_PASSWORD", password.clone());
        }
        invocation.run().await.map(drop)
    }

    async fn delete_user(&self, user_name: &str) -> Result<()> {
        self.invoke("delete_user")
            .env("KB_USER_NAME", user_name)
            .run()
            .await
            .map(drop)
    }

    async fn describe_user(&self, user_name: &str) -> Result<UserInfo> {
        let stdout = self
            .invoke("describe_user")
            .env("KB_USER_NAME", user_name)
            .run()
            .await?;
        parse_json("describe_user", &stdout)
    }

    async fn list_users(&self) -> Result<Vec<UserInfo>> {
        let stdout = self.invoke("list_users").run().await?;
        parse_json("list_users", &stdout)
    }

    async fn list_system_accounts(&self) -> Result<Vec<UserInfo>> {
        let stdout = self.invoke("list_system_accounts").run().await?;
        parse_json("list_system_accounts", &stdout)
    }

    async fn grant_user_role(&self, user_name: &str, role: RoleType) -> Result<()> {
        self.invoke("grant_user_role")
            .env("KB_USER_NAME", user_name)
            .env("KB_ROLE_NAME", role.to_string())
            .run()
            .await
            .map(drop)
    }

    async fn revoke_user_role(&self, user_name: &str, role: RoleType) -> Result<()> {
        self.invoke("revoke_user_role")
            .env("KB_USER_NAME", user_name)
            .env("KB_ROLE_NAME", role.to_string())
            .run()
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use keeper_dcs::Leader;

    fn shell(script: &str) -> CommandEngineManager {
        CommandEngineManager::new(
            "etcd-1",
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        )
        .unwrap()
    }

    fn cluster() -> Cluster {
        Cluster {
            name: "etcd".to_string(),
            members: ["etcd-0", "etcd-1", "etcd-2"]
                .into_iter()
                .map(|name| Member {
                    name: name.to_string(),
                    ..Member::default()
                })
                .collect(),
            leader: Some(Leader {
                name: "etcd-0".to_string(),
                ..Leader::default()
            }),
            ..Cluster::default()
        }
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert_matches!(
            CommandEngineManager::new("etcd-1", Vec::new()),
            Err(Error::InvalidArgument(_))
        );
    }

    #[tokio::test]
    async fn test_role_from_stdout() {
        let engine = shell(r#"echo "  $KB_METHOD-$KB_MEMBER_NAME  ""#);

        let role = engine.get_replica_role(&cluster()).await.unwrap();

        assert_eq!(role, "get_replica_role-etcd-1");
    }

    #[tokio::test]
    async fn test_cluster_is_passed_as_json() {
        let engine = shell(r#"case "$KB_CLUSTER" in *'"name":"etcd"'*) echo true ;; *) echo false ;; esac"#);

        assert!(engine.is_leader(&cluster()).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let engine = shell("echo 'read-only file system' >&2; exit 3");

        let error = engine.lock("disk full").await.unwrap_err();

        assert_matches!(error, Error::Failed(message) if message.contains("read-only file system"));
    }

    #[tokio::test]
    async fn test_arguments_reach_the_command() {
        let engine = shell(r#"test "$KB_REASON" = "disk full""#);

        engine.lock("disk full").await.unwrap();
        assert!(engine.lock("maintenance").await.is_err());
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let engine = shell("sleep 5").with_timeout(Duration::from_millis(100));

        assert_matches!(engine.unlock().await, Err(Error::Failed(message)) if message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_bool_parse_failure() {
        let engine = shell("echo maybe");

        assert_matches!(engine.is_leader(&cluster()).await, Err(Error::Failed(_)));
    }

    #[tokio::test]
    async fn test_healthy_members_from_lines() {
        let engine = shell(r#"printf 'etcd-0\netcd-2\nunknown\n'"#);

        let members = engine.has_other_healthy_members(&cluster(), "etcd-0").await;

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "etcd-2");
    }

    #[tokio::test]
    async fn test_users_from_json() {
        let engine = shell(r#"echo '[{"userName":"app","roleName":"readonly"}]'"#);

        let users = engine.list_users().await.unwrap();

        assert_eq!(users[0].user_name, "app");
        assert_eq!(users[0].role_name, Some(RoleType::ReadOnly));
    }

    #[tokio::test]
    async fn test_no_role_subscription() {
        let engine = shell("true");

        assert!(!engine.capabilities().role_subscription);
        assert_matches!(engine.subscribe_roles().await, Err(Error::NotImplemented(_)));
    }
}
