use std::fmt;

use async_trait::async_trait;
use keeper_engine::{RoleType, UserInfo};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::operation::{InitContext, Operation, OperationBase};
use crate::request::{OpsEvent, OpsRequest, OpsResponse};

/// Account management action.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccountAction {
    /// Create a user. Needs `userName` and `password`.
    CreateUser,

    /// Delete a user. Needs `userName`.
    DeleteUser,

    /// Describe a user. Needs `userName`.
    DescribeUser,

    /// List user accounts.
    ListUsers,

    /// List accounts the engine manages for itself.
    ListSystemAccounts,

    /// Grant a role. Needs `userName` and `roleName`.
    GrantUserRole,

    /// Revoke a role. Needs `userName` and `roleName`.
    RevokeUserRole,
}

impl AccountAction {
    /// Every account action.
    pub const ALL: [Self; 7] = [
        Self::CreateUser,
        Self::DeleteUser,
        Self::DescribeUser,
        Self::ListUsers,
        Self::ListSystemAccounts,
        Self::GrantUserRole,
        Self::RevokeUserRole,
    ];

    /// Route name of the action.
    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::CreateUser => "createuser",
            Self::DeleteUser => "deleteuser",
            Self::DescribeUser => "describeuser",
            Self::ListUsers => "listusers",
            Self::ListSystemAccounts => "listsystemaccounts",
            Self::GrantUserRole => "grantuserrole",
            Self::RevokeUserRole => "revokeuserrole",
        }
    }

    const fn needs_user(self) -> bool {
        !matches!(self, Self::ListUsers | Self::ListSystemAccounts)
    }

    const fn needs_role(self) -> bool {
        matches!(self, Self::GrantUserRole | Self::RevokeUserRole)
    }
}

impl fmt::Display for AccountAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

/// Validated account request.
struct AccountRequest {
    user_name: String,
    password: Option<String>,
    role: Option<RoleType>,
}

/// Runs one [`AccountAction`] on the engine.
pub struct AccountOperation {
    base: OperationBase,
    kind: AccountAction,
}

impl AccountOperation {
    /// Creates the operation for `kind`.
    #[must_use]
    pub fn new(kind: AccountAction) -> Self {
        Self {
            base: OperationBase::new(kind.action()),
            kind,
        }
    }

    fn parse(&self, request: &OpsRequest) -> Result<AccountRequest> {
        let user_name = request.get_str("userName");
        if self.kind.needs_user() && user_name.is_none() {
            return Err(Error::PreCheck("userName must be set".to_string()));
        }

        let password = request.get_str("password");
        if self.kind == AccountAction::CreateUser && password.is_none() {
            return Err(Error::PreCheck("password must be set".to_string()));
        }

        let role = if self.kind.needs_role() {
            let name = request
                .get_str("roleName")
                .ok_or_else(|| Error::PreCheck("roleName must be set".to_string()))?;
            Some(
                name.parse::<RoleType>()
                    .map_err(|e| Error::PreCheck(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(AccountRequest {
            user_name: user_name.unwrap_or_default().to_string(),
            password: password.map(str::to_string),
            role,
        })
    }

    fn to_value<T: Serialize>(value: &T) -> Result<Value> {
        serde_json::to_value(value)
            .map_err(|e| Error::Engine(keeper_engine::Error::Failed(e.to_string())))
    }
}

#[async_trait]
impl Operation for AccountOperation {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind_with_engine(ctx)
    }

    fn is_readonly(&self) -> bool {
        matches!(
            self.kind,
            AccountAction::DescribeUser | AccountAction::ListUsers | AccountAction::ListSystemAccounts
        )
    }

    async fn pre_check(&self, request: &OpsRequest) -> Result<()> {
        self.parse(request).map(drop)
    }

    async fn run(&self, request: OpsRequest) -> Result<Option<OpsResponse>> {
        if !self.base.capabilities().accounts {
            return Err(Error::NotImplemented(self.kind.to_string()));
        }

        let account = self.parse(&request)?;
        let engine = self.base.engine()?;
        let response = OpsResponse::new(OpsEvent::Success).with("operation", self.kind.action());

        let response = match self.kind {
            AccountAction::CreateUser => {
                let user = UserInfo {
                    user_name: account.user_name.clone(),
                    password: account.password,
                    ..UserInfo::default()
                };
                engine.create_user(&user).await?;
                info!("user {} created", account.user_name);
                response
            }
            AccountAction::DeleteUser => {
                engine.delete_user(&account.user_name).await?;
                info!("user {} deleted", account.user_name);
                response
            }
            AccountAction::DescribeUser => {
                let user = engine.describe_user(&account.user_name).await?;
                response.with("user", Self::to_value(&user)?)
            }
            AccountAction::ListUsers => {
                let users = engine.list_users().await?;
                response.with("users", Self::to_value(&users)?)
            }
            AccountAction::ListSystemAccounts => {
                let users = engine.list_system_accounts().await?;
                response.with("systemAccounts", Self::to_value(&users)?)
            }
            AccountAction::GrantUserRole | AccountAction::RevokeUserRole => {
                let role = account
                    .role
                    .ok_or_else(|| Error::PreCheck("roleName must be set".to_string()))?;
                if self.kind == AccountAction::GrantUserRole {
                    engine.grant_user_role(&account.user_name, role).await?;
                } else {
                    engine.revoke_user_role(&account.user_name, role).await?;
                }
                info!("{} {} for user {}", self.kind, role, account.user_name);
                response.with("roleName", role.to_string())
            }
        };

        Ok(Some(response))
    }
}
