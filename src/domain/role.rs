use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Admin,
    Teacher,
    Student,
    Parent,
    Secretary,
}

impl Role {
    /// Every role the system knows about. Announcements that omit their
    /// target roles are addressed to all of these.
    pub const ALL: [Role; 6] = [
        Role::Superadmin,
        Role::Admin,
        Role::Teacher,
        Role::Student,
        Role::Parent,
        Role::Secretary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Secretary => "secretary",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "superadmin" => Some(Role::Superadmin),
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            "parent" => Some(Role::Parent),
            "secretary" => Some(Role::Secretary),
            _ => None,
        }
    }

    /// Superadmins are never locked out by maintenance mode.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Superadmin)
    }

    /// Roles allowed to manage announcements and the maintenance switch.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Superadmin | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
