use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
    Editor,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "administrator" | "admin" => Ok(Role::Administrator),
            "editor" => Ok(Role::Editor),
            other => Err(format!(
                "unknown role '{other}'; expected administrator or editor"
            )),
        }
    }
}

/// Public snapshot of an administrator account. This is what a session
/// carries and what the session endpoints return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AdminIdentity {
    pub fn is_administrator(&self) -> bool {
        self.role == Role::Administrator
    }
}

/// A provisioned account as stored in `admins.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub secret_hash: String,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_authenticated_at: Option<OffsetDateTime>,
}

impl AdminRecord {
    pub fn identity(&self) -> AdminIdentity {
        AdminIdentity {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminFile {
    #[serde(default)]
    pub admins: Vec<AdminRecord>,
}
