use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reference to the actor behind a change. Name and role are filled in
/// when the user record is still around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRef {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
}

impl ActorRef {
    pub fn id_only(id: Uuid) -> Self {
        Self {
            id,
            username: None,
            full_name: None,
            role: None,
        }
    }
}

impl From<&User> for ActorRef {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: Some(user.username.clone()),
            full_name: Some(user.full_name.clone()),
            role: Some(user.role),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}
