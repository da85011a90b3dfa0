use std::sync::Arc;

use jsonapi_kit::{JsonApi, RegistrationError};

use crate::api::rest::handlers::{Organizations, TeamUsers, Teams, Users};
use crate::api::rest::schemas::{organization_schema, team_schema, user_schema};
use crate::config::AccountsConfig;
use crate::domain::service::Service;

/// Mount organizations, users, teams and the team membership linkage.
///
/// Parents are registered before the relationship resource that hangs off them.
pub fn register_routes(
    app: &mut JsonApi,
    service: Arc<Service>,
    config: &AccountsConfig,
) -> Result<(), RegistrationError> {
    let base = config.base_path.as_str();
    app.register(Organizations::new(service.clone(), organization_schema()?), base)?;
    app.register(Users::new(service.clone(), user_schema()?, config), base)?;
    app.register(Teams::new(service.clone(), team_schema()?), base)?;
    app.register_relationship(TeamUsers::new(service))?;
    tracing::info!(base_path = %base, "accounts resources registered");
    Ok(())
}
