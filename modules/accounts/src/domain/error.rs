use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Organization not found: {id}")]
    OrganizationNotFound { id: Uuid },

    #[error("User not found: {id}")]
    UserNotFound { id: u64 },

    #[error("Team not found: {id}")]
    TeamNotFound { id: u64 },

    #[error("User with email '{email}' already exists")]
    EmailAlreadyExists { email: String },

    #[error("Invalid email format: '{email}'")]
    InvalidEmail { email: String },

    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} too long: {len} characters (max: {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

impl DomainError {
    /// Attribute the error is about, if it concerns a single one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::EmailAlreadyExists { .. } | Self::InvalidEmail { .. } => Some("email"),
            Self::Empty { field } | Self::TooLong { field, .. } => Some(*field),
            _ => None,
        }
    }
}
