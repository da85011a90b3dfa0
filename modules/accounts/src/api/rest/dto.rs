use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::contract::model::{Organization, Team, User};

/// Shapes handed to the JSON:API schemas for dumping.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationDto {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: u64,
    pub email: String,
    pub display_name: String,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Loaded only when the organization is included.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrganizationDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamDto {
    pub id: u64,
    pub name: String,
    pub user_ids: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserDto>>,
}

impl From<Organization> for OrganizationDto {
    fn from(org: Organization) -> Self {
        Self {
            id: org.id,
            name: org.name,
            created_at: org.created_at,
        }
    }
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            organization_id: user.organization_id,
            created_at: user.created_at,
            updated_at: user.updated_at,
            organization: None,
        }
    }
}

impl From<Team> for TeamDto {
    fn from(team: Team) -> Self {
        Self {
            id: team.id,
            name: team.name,
            user_ids: team.user_ids,
            users: None,
        }
    }
}
