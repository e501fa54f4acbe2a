//! Authentication core: roles, session snapshots, tokens and credentials.

mod credentials;
pub mod password;
mod session;

pub use credentials::{AuthError, CredentialManager, ResetRecord};
pub use session::SessionStore;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Staff roles, ordered by privilege
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(try_from = "i64", into = "i64")]
#[repr(i32)]
pub enum Role {
    /// Read-only access to records and users
    Viewer = 0,
    /// Create, edit and delete SEES records
    Editor = 1,
    /// Everything, plus user management
    Admin = 2,
}

impl Role {
    pub fn has_at_least(&self, required: Role) -> bool {
        *self >= required
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Role> for i64 {
    fn from(role: Role) -> Self {
        role as i64
    }
}

impl TryFrom<i64> for Role {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::Viewer),
            1 => Ok(Role::Editor),
            2 => Ok(Role::Admin),
            other => Err(format!("Unknown role value: {}", other)),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "viewer" | "0" => Ok(Role::Viewer),
            "editor" | "1" => Ok(Role::Editor),
            "admin" | "2" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Identity snapshot stored with a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Generate an opaque random token (32 bytes, hex encoded)
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(Role::Viewer < Role::Editor);
        assert!(Role::Editor < Role::Admin);
        assert!(Role::Admin.has_at_least(Role::Editor));
        assert!(Role::Editor.has_at_least(Role::Editor));
        assert!(!Role::Viewer.has_at_least(Role::Editor));
    }

    #[test]
    fn test_role_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "1");
        let role: Role = serde_json::from_str("2").unwrap();
        assert_eq!(role, Role::Admin);
        assert!(serde_json::from_str::<Role>("3").is_err());
        assert!(serde_json::from_str::<Role>("-1").is_err());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("0".parse::<Role>().unwrap(), Role::Viewer);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_session_user_wire_format() {
        let user = SessionUser {
            user_id: "u1".to_string(),
            name: "Staff".to_string(),
            email: "staff@example.jp".to_string(),
            role: Role::Editor,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "userId": "u1",
                "name": "Staff",
                "email": "staff@example.jp",
                "role": 1
            })
        );
    }

    #[test]
    fn test_generate_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }
}
