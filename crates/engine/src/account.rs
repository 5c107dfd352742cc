use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Database account as reported by or sent to an engine manager.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Account name.
    pub user_name: String,

    /// Password, only set when creating an account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Expiry, as reported by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired: Option<String>,

    /// Role granted to the account, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<RoleType>,
}

/// Account roles understood across engines.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    /// Full administrative access.
    Superuser,

    /// Read and write data.
    ReadWrite,

    /// Read data only.
    ReadOnly,
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Superuser => write!(f, "superuser"),
            Self::ReadWrite => write!(f, "readwrite"),
            Self::ReadOnly => write!(f, "readonly"),
        }
    }
}

impl FromStr for RoleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "superuser" => Ok(Self::Superuser),
            "readwrite" => Ok(Self::ReadWrite),
            "readonly" => Ok(Self::ReadOnly),
            _ => Err(Error::InvalidArgument(format!("invalid role name: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("SuperUser".parse::<RoleType>().unwrap(), RoleType::Superuser);
        assert_eq!("readwrite".parse::<RoleType>().unwrap(), RoleType::ReadWrite);
        assert_eq!("READONLY".parse::<RoleType>().unwrap(), RoleType::ReadOnly);
        assert_matches!("owner".parse::<RoleType>(), Err(Error::InvalidArgument(_)));
    }

    #[test]
    fn test_role_display_round_trip() {
        for role in [RoleType::Superuser, RoleType::ReadWrite, RoleType::ReadOnly] {
            assert_eq!(role.to_string().parse::<RoleType>().unwrap(), role);
        }
    }
}
