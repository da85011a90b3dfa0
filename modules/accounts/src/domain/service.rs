//! Accounts domain service over an in-memory store.

use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::contract::model::{
    NewTeam, NewUser, Organization, Team, TeamPatch, User, UserPatch,
};
use crate::domain::error::DomainError;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub max_name_length: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_name_length: 100,
        }
    }
}

#[derive(Default)]
struct State {
    organizations: BTreeMap<Uuid, Organization>,
    users: BTreeMap<u64, User>,
    teams: BTreeMap<u64, Team>,
    next_user_id: u64,
    next_team_id: u64,
}

impl State {
    fn organization(&self, id: Uuid) -> Result<&Organization, DomainError> {
        self.organizations
            .get(&id)
            .ok_or(DomainError::OrganizationNotFound { id })
    }

    fn user(&self, id: u64) -> Result<&User, DomainError> {
        self.users.get(&id).ok_or(DomainError::UserNotFound { id })
    }

    fn team_mut(&mut self, id: u64) -> Result<&mut Team, DomainError> {
        self.teams.get_mut(&id).ok_or(DomainError::TeamNotFound { id })
    }

    fn ensure_email_free(&self, email: &str, owner: Option<u64>) -> Result<(), DomainError> {
        let taken = self
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != owner);
        if taken {
            return Err(DomainError::EmailAlreadyExists {
                email: email.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_users(&self, ids: &[u64]) -> Result<(), DomainError> {
        ids.iter().try_for_each(|id| self.user(*id).map(|_| ()))
    }
}

/// Organizations, users and teams with their relationships.
///
/// Every operation takes the lock once, so multi-entity updates are atomic.
pub struct Service {
    state: RwLock<State>,
    config: ServiceConfig,
}

impl Default for Service {
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}

impl Service {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            state: RwLock::new(State {
                next_user_id: 1,
                next_team_id: 1,
                ..State::default()
            }),
            config,
        }
    }

    fn check_name(&self, field: &'static str, value: &str) -> Result<(), DomainError> {
        let len = value.trim().chars().count();
        if len == 0 {
            return Err(DomainError::Empty { field });
        }
        if len > self.config.max_name_length {
            return Err(DomainError::TooLong {
                field,
                len,
                max: self.config.max_name_length,
            });
        }
        Ok(())
    }

    fn check_email(email: &str) -> Result<(), DomainError> {
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(DomainError::InvalidEmail {
                email: email.to_string(),
            }),
        }
    }

    // Organizations

    pub fn create_organization(&self, name: &str) -> Result<Organization, DomainError> {
        self.check_name("name", name)?;
        let org = Organization {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };
        self.state.write().organizations.insert(org.id, org.clone());
        tracing::info!(organization_id = %org.id, "created organization");
        Ok(org)
    }

    pub fn get_organization(&self, id: Uuid) -> Result<Organization, DomainError> {
        self.state.read().organization(id).cloned()
    }

    pub fn list_organizations(&self) -> Vec<Organization> {
        self.state.read().organizations.values().cloned().collect()
    }

    pub fn rename_organization(&self, id: Uuid, name: &str) -> Result<Organization, DomainError> {
        self.check_name("name", name)?;
        let mut state = self.state.write();
        let org = state
            .organizations
            .get_mut(&id)
            .ok_or(DomainError::OrganizationNotFound { id })?;
        org.name = name.trim().to_string();
        Ok(org.clone())
    }

    /// Members are kept and detached from the organization.
    pub fn delete_organization(&self, id: Uuid) -> Result<(), DomainError> {
        let mut state = self.state.write();
        state
            .organizations
            .remove(&id)
            .ok_or(DomainError::OrganizationNotFound { id })?;
        let now = Utc::now();
        for user in state.users.values_mut() {
            if user.organization_id == Some(id) {
                user.organization_id = None;
                user.updated_at = now;
            }
        }
        tracing::info!(organization_id = %id, "deleted organization");
        Ok(())
    }

    // Users

    pub fn create_user(&self, new_user: NewUser) -> Result<User, DomainError> {
        Self::check_email(&new_user.email)?;
        self.check_name("display_name", &new_user.display_name)?;

        let mut state = self.state.write();
        state.ensure_email_free(&new_user.email, None)?;
        if let Some(org) = new_user.organization_id {
            state.organization(org)?;
        }
        let now = Utc::now();
        let user = User {
            id: state.next_user_id,
            email: new_user.email,
            display_name: new_user.display_name.trim().to_string(),
            organization_id: new_user.organization_id,
            created_at: now,
            updated_at: now,
        };
        state.next_user_id += 1;
        state.users.insert(user.id, user.clone());
        tracing::info!(user_id = user.id, "created user");
        Ok(user)
    }

    pub fn get_user(&self, id: u64) -> Result<User, DomainError> {
        self.state.read().user(id).cloned()
    }

    /// Users ordered by id, optionally restricted to one organization.
    pub fn list_users(&self, organization: Option<Uuid>) -> Vec<User> {
        self.state
            .read()
            .users
            .values()
            .filter(|u| organization.is_none() || u.organization_id == organization)
            .cloned()
            .collect()
    }

    pub fn update_user(&self, id: u64, patch: UserPatch) -> Result<User, DomainError> {
        if let Some(email) = &patch.email {
            Self::check_email(email)?;
        }
        if let Some(name) = &patch.display_name {
            self.check_name("display_name", name)?;
        }

        let mut state = self.state.write();
        state.user(id)?;
        if let Some(email) = &patch.email {
            state.ensure_email_free(email, Some(id))?;
        }
        if let Some(Some(org)) = patch.organization_id {
            state.organization(org)?;
        }
        let user = state
            .users
            .get_mut(&id)
            .ok_or(DomainError::UserNotFound { id })?;
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(name) = patch.display_name {
            user.display_name = name.trim().to_string();
        }
        if let Some(org) = patch.organization_id {
            user.organization_id = org;
        }
        user.updated_at = Utc::now();
        tracing::debug!(user_id = id, "updated user");
        Ok(user.clone())
    }

    /// Removes the user from every team as well.
    pub fn delete_user(&self, id: u64) -> Result<(), DomainError> {
        let mut state = self.state.write();
        state.users.remove(&id).ok_or(DomainError::UserNotFound { id })?;
        for team in state.teams.values_mut() {
            team.user_ids.retain(|member| *member != id);
        }
        tracing::info!(user_id = id, "deleted user");
        Ok(())
    }

    // Teams

    pub fn create_team(&self, new_team: NewTeam) -> Result<Team, DomainError> {
        self.check_name("name", &new_team.name)?;
        let mut state = self.state.write();
        state.ensure_users(&new_team.user_ids)?;
        let team = Team {
            id: state.next_team_id,
            name: new_team.name.trim().to_string(),
            user_ids: dedup(new_team.user_ids),
        };
        state.next_team_id += 1;
        state.teams.insert(team.id, team.clone());
        tracing::info!(team_id = team.id, "created team");
        Ok(team)
    }

    pub fn get_team(&self, id: u64) -> Result<Team, DomainError> {
        self.state
            .read()
            .teams
            .get(&id)
            .cloned()
            .ok_or(DomainError::TeamNotFound { id })
    }

    pub fn list_teams(&self) -> Vec<Team> {
        self.state.read().teams.values().cloned().collect()
    }

    pub fn update_team(&self, id: u64, patch: TeamPatch) -> Result<Team, DomainError> {
        if let Some(name) = &patch.name {
            self.check_name("name", name)?;
        }
        let mut state = self.state.write();
        if let Some(ids) = &patch.user_ids {
            state.ensure_users(ids)?;
        }
        let team = state.team_mut(id)?;
        if let Some(name) = patch.name {
            team.name = name.trim().to_string();
        }
        if let Some(ids) = patch.user_ids {
            team.user_ids = dedup(ids);
        }
        Ok(team.clone())
    }

    pub fn delete_team(&self, id: u64) -> Result<(), DomainError> {
        self.state
            .write()
            .teams
            .remove(&id)
            .map(|_| tracing::info!(team_id = id, "deleted team"))
            .ok_or(DomainError::TeamNotFound { id })
    }

    pub fn team_members(&self, id: u64) -> Result<Vec<User>, DomainError> {
        let state = self.state.read();
        let team = state.teams.get(&id).ok_or(DomainError::TeamNotFound { id })?;
        team.user_ids
            .iter()
            .map(|uid| state.user(*uid).cloned())
            .collect()
    }

    pub fn set_team_members(&self, id: u64, user_ids: Vec<u64>) -> Result<Team, DomainError> {
        self.update_team(
            id,
            TeamPatch {
                name: None,
                user_ids: Some(user_ids),
            },
        )
    }

    /// Adds members not already present; existing members are left alone.
    pub fn add_team_members(&self, id: u64, user_ids: &[u64]) -> Result<Team, DomainError> {
        let mut state = self.state.write();
        state.ensure_users(user_ids)?;
        let team = state.team_mut(id)?;
        for uid in user_ids {
            if !team.user_ids.contains(uid) {
                team.user_ids.push(*uid);
            }
        }
        Ok(team.clone())
    }

    /// Removing a non-member is not an error.
    pub fn remove_team_members(&self, id: u64, user_ids: &[u64]) -> Result<Team, DomainError> {
        let mut state = self.state.write();
        let team = state.team_mut(id)?;
        team.user_ids.retain(|uid| !user_ids.contains(uid));
        Ok(team.clone())
    }
}

fn dedup(ids: Vec<u64>) -> Vec<u64> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(service: &Service, email: &str, org: Option<Uuid>) -> User {
        service
            .create_user(NewUser {
                email: email.into(),
                display_name: "Someone".into(),
                organization_id: org,
            })
            .unwrap()
    }

    #[test]
    fn user_ids_are_sequential() {
        let service = Service::default();
        assert_eq!(user(&service, "a@x.io", None).id, 1);
        assert_eq!(user(&service, "b@x.io", None).id, 2);
    }

    #[test]
    fn email_must_be_valid_and_unique() {
        let service = Service::default();
        user(&service, "a@x.io", None);
        let dup = service.create_user(NewUser {
            email: "A@X.io".into(),
            display_name: "Other".into(),
            organization_id: None,
        });
        assert!(matches!(dup, Err(DomainError::EmailAlreadyExists { .. })));

        let bad = service.create_user(NewUser {
            email: "nope".into(),
            display_name: "Other".into(),
            organization_id: None,
        });
        assert_eq!(bad.unwrap_err().field(), Some("email"));
    }

    #[test]
    fn names_are_bounded() {
        let service = Service::new(ServiceConfig { max_name_length: 3 });
        assert!(matches!(
            service.create_organization("   "),
            Err(DomainError::Empty { field: "name" })
        ));
        assert!(matches!(
            service.create_organization("acme"),
            Err(DomainError::TooLong { len: 4, max: 3, .. })
        ));
    }

    #[test]
    fn unknown_organization_is_rejected() {
        let service = Service::default();
        let missing = Uuid::new_v4();
        let err = service
            .create_user(NewUser {
                email: "a@x.io".into(),
                display_name: "A".into(),
                organization_id: Some(missing),
            })
            .unwrap_err();
        assert_eq!(err, DomainError::OrganizationNotFound { id: missing });
    }

    #[test]
    fn deleting_an_organization_detaches_members() {
        let service = Service::default();
        let org = service.create_organization("Acme").unwrap();
        let u = user(&service, "a@x.io", Some(org.id));
        assert_eq!(service.list_users(Some(org.id)).len(), 1);

        service.delete_organization(org.id).unwrap();
        assert_eq!(service.get_user(u.id).unwrap().organization_id, None);
        assert!(service.list_users(Some(org.id)).is_empty());
    }

    #[test]
    fn team_membership_operations() {
        let service = Service::default();
        let a = user(&service, "a@x.io", None);
        let b = user(&service, "b@x.io", None);
        let team = service
            .create_team(NewTeam {
                name: "core".into(),
                user_ids: vec![a.id, a.id],
            })
            .unwrap();
        assert_eq!(team.user_ids, vec![a.id]);

        let team = service.add_team_members(team.id, &[b.id, a.id]).unwrap();
        assert_eq!(team.user_ids, vec![a.id, b.id]);

        let team = service.remove_team_members(team.id, &[a.id, 99]).unwrap();
        assert_eq!(team.user_ids, vec![b.id]);

        assert_eq!(
            service.set_team_members(team.id, vec![7]).unwrap_err(),
            DomainError::UserNotFound { id: 7 }
        );
        let team = service.set_team_members(team.id, vec![]).unwrap();
        assert!(team.user_ids.is_empty());
    }

    #[test]
    fn deleting_a_user_leaves_teams() {
        let service = Service::default();
        let a = user(&service, "a@x.io", None);
        let team = service
            .create_team(NewTeam {
                name: "core".into(),
                user_ids: vec![a.id],
            })
            .unwrap();
        service.delete_user(a.id).unwrap();
        assert!(service.team_members(team.id).unwrap().is_empty());
    }
}
