//! # Role Granting
//!
//! A client announces its role in the `/ws?role=...` query string. That value is
//! untrusted input ([`AssertedRole`]); the server turns it into the [`Role`] it
//! actually acts on through an [`AccessPolicy`].

use serde::Deserialize;

/// Role a connection has been granted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Display,
    Voter,
}

impl Role {
    /// Only voters are counted in the connected total.
    pub fn is_voter(&self) -> bool {
        matches!(self, Role::Voter)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Display => "display",
            Role::Voter => "voter",
        }
    }
}

/// Query parameters supplied on the WebSocket upgrade request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssertedRole {
    pub role: Option<String>,
    pub token: Option<String>,
}

impl AssertedRole {
    /// Role as claimed by the client. Absent or unrecognised values mean voter.
    pub fn claimed(&self) -> Role {
        match self.role.as_deref() {
            Some("admin") => Role::Admin,
            Some("display") => Role::Display,
            _ => Role::Voter,
        }
    }
}

/// Why an asserted role was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("missing admin token")]
    MissingToken,
    #[error("invalid admin token")]
    InvalidToken,
}

/// Constant-time comparison for token validation.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Decides which roles are granted and who may issue admin commands.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admin_token: Option<String>,
}

impl AccessPolicy {
    /// Any claimed role is granted and anyone may issue admin commands.
    pub fn open() -> Self {
        Self { admin_token: None }
    }

    pub fn with_admin_token(token: impl Into<String>) -> Self {
        Self {
            admin_token: Some(token.into()),
        }
    }

    pub fn from_token(token: Option<String>) -> Self {
        Self { admin_token: token }
    }

    pub fn is_open(&self) -> bool {
        self.admin_token.is_none()
    }

    pub fn grant(&self, asserted: &AssertedRole) -> Result<Role, AccessDenied> {
        let claimed = asserted.claimed();
        let Some(expected) = &self.admin_token else {
            return Ok(claimed);
        };
        if claimed != Role::Admin {
            return Ok(claimed);
        }
        match asserted.token.as_deref() {
            None => Err(AccessDenied::MissingToken),
            Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
                Ok(Role::Admin)
            }
            Some(_) => Err(AccessDenied::InvalidToken),
        }
    }

    /// Whether a connection holding `role` may run `admin:*` commands.
    pub fn may_administer(&self, role: Role) -> bool {
        self.is_open() || role == Role::Admin
    }
}
