use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Pure models shared between the domain and the REST layer (no serde).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub display_name: String,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub organization_id: Option<Uuid>,
}

/// Partial update; `organization_id: Some(None)` detaches the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub organization_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: u64,
    pub name: String,
    /// Members in insertion order, without duplicates.
    pub user_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTeam {
    pub name: String,
    pub user_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TeamPatch {
    pub name: Option<String>,
    pub user_ids: Option<Vec<u64>>,
}
