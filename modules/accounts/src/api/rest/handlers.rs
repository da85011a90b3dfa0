//! JSON:API resources backed by the accounts [`Service`].

use std::sync::Arc;

use http::{header, HeaderValue, StatusCode};
use jsonapi_kit::{
    async_trait, ApiError, ApiResult, ErrorObject, IdMask, IncludeRelations, Inclusion,
    JsonApiError, JsonApiResponse, Linkage, PageNumberPaginator, RelationshipOptions,
    RelationshipResource, RelationshipScope, RequestHooks, Resource, ResourceOptions, Schema,
    Scope, SerializeOptions,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::api::rest::dto::{OrganizationDto, TeamDto, UserDto};
use crate::api::rest::schemas::{ORGANIZATIONS, TEAMS, USERS};
use crate::config::AccountsConfig;
use crate::contract::model::{NewTeam, NewUser, TeamPatch, UserPatch};
use crate::domain::service::Service;

const ORGANIZATION_FILTER: &str = "filter[organization]";

// Ids already satisfy the route mask; anything that still fails to parse cannot exist.

fn int_id(id: &str, what: &str) -> ApiResult<u64> {
    id.parse()
        .map_err(|_| ApiError::from(JsonApiError::resource_not_found(Some(&format!("{what} not found.")))))
}

fn uuid_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id)
        .map_err(|_| ApiError::from(JsonApiError::resource_not_found(Some("Organization not found."))))
}

fn string_attr(attrs: &Map<String, Value>, name: &str) -> Option<String> {
    attrs.get(name).and_then(Value::as_str).map(str::to_owned)
}

/// The body may repeat the id; it must then match the URL.
fn check_body_id(attrs: &Map<String, Value>, id: &str) -> ApiResult<()> {
    let body_id = match attrs.get("id") {
        None => return Ok(()),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    if body_id == id {
        return Ok(());
    }
    Err(JsonApiError::with_errors(
        StatusCode::CONFLICT,
        None,
        vec![ErrorObject::new("Resource id does not match the URL.").with_pointer("/data/id")],
    )
    .into())
}

/// Loaded to-one organization linkage: a uuid string or `null`.
fn organization_linkage(value: &Value) -> ApiResult<Option<Uuid>> {
    match value {
        Value::Null => Ok(None),
        Value::String(id) => Uuid::parse_str(id).map(Some).map_err(|_| {
            ApiError::from(JsonApiError::with_errors(
                StatusCode::BAD_REQUEST,
                None,
                vec![ErrorObject::new("Invalid `id` specified")
                    .with_pointer("/data/relationships/organization")],
            ))
        }),
        _ => Err(ApiError::internal(anyhow::anyhow!(
            "unexpected organization linkage {value}"
        ))),
    }
}

fn user_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> ApiResult<Vec<u64>> {
    ids.into_iter().map(|id| int_id(id, "User")).collect()
}

fn loaded_user_ids(value: &Value) -> ApiResult<Vec<u64>> {
    let ids = value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    user_ids(ids)
}

fn to_value<T: serde::Serialize>(data: &T) -> ApiResult<Value> {
    serde_json::to_value(data).map_err(ApiError::internal)
}

fn created(scope: &Scope<'_>, route: &str, id: &str, body: Value) -> ApiResult<JsonApiResponse> {
    let response = JsonApiResponse::created(body);
    match scope.url_path_for(route, &[("id", id)]) {
        Ok(path) => {
            let location = HeaderValue::from_str(&path).map_err(ApiError::internal)?;
            Ok(response.with_header(header::LOCATION, location))
        }
        Err(err) => {
            tracing::warn!(route, error = %err, "no Location header for created resource");
            Ok(response)
        }
    }
}

// Organizations

pub struct Organizations {
    service: Arc<Service>,
    schema: Arc<Schema>,
}

impl Organizations {
    pub fn new(service: Arc<Service>, schema: Arc<Schema>) -> Self {
        Self { service, schema }
    }
}

impl RequestHooks for Organizations {}

#[async_trait]
impl Resource for Organizations {
    fn options(&self) -> ResourceOptions {
        ResourceOptions::new(ORGANIZATIONS, self.schema.clone()).id_mask(IdMask::Uuid)
    }

    async fn get(&self, scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        let org = OrganizationDto::from(self.service.get_organization(uuid_id(id)?)?);
        let body = scope.serialize(&org, SerializeOptions::single()).await?;
        Ok(scope.to_response(body, None))
    }

    async fn get_many(&self, scope: &Scope<'_>) -> ApiResult<JsonApiResponse> {
        let orgs: Vec<OrganizationDto> = self
            .service
            .list_organizations()
            .into_iter()
            .map(Into::into)
            .collect();
        let body = scope.serialize(&orgs, SerializeOptions::many()).await?;
        let mut meta = Map::new();
        meta.insert("total".to_string(), orgs.len().into());
        Ok(scope.to_response(body, Some(meta)))
    }

    async fn post(&self, scope: &Scope<'_>) -> ApiResult<JsonApiResponse> {
        let attrs = scope.deserialize_body(false).await?;
        let name = string_attr(&attrs, "name").unwrap_or_default();
        let org = OrganizationDto::from(self.service.create_organization(&name)?);
        let body = scope.serialize(&org, SerializeOptions::single()).await?;
        created(scope, "organizations:get", &org.id.to_string(), body)
    }

    async fn patch(&self, scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        let attrs = scope.deserialize_body(true).await?;
        check_body_id(&attrs, id)?;
        let id = uuid_id(id)?;
        let org = match string_attr(&attrs, "name") {
            Some(name) => self.service.rename_organization(id, &name)?,
            None => self.service.get_organization(id)?,
        };
        let body = scope
            .serialize(&OrganizationDto::from(org), SerializeOptions::single())
            .await?;
        Ok(scope.to_response(body, None))
    }

    async fn delete(&self, _scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        self.service.delete_organization(uuid_id(id)?)?;
        Ok(JsonApiResponse::no_content())
    }
}

// Users

pub struct Users {
    service: Arc<Service>,
    schema: Arc<Schema>,
    page_size: usize,
    max_page_size: usize,
}

impl Users {
    pub fn new(service: Arc<Service>, schema: Arc<Schema>, config: &AccountsConfig) -> Self {
        Self {
            service,
            schema,
            page_size: config.page_size,
            max_page_size: config.max_page_size,
        }
    }

    fn organization_filter(scope: &Scope<'_>) -> ApiResult<Option<Uuid>> {
        let Some(raw) = scope.request().query_param(ORGANIZATION_FILTER) else {
            return Ok(None);
        };
        Uuid::parse_str(raw).map(Some).map_err(|_| {
            ApiError::from(JsonApiError::with_errors(
                StatusCode::BAD_REQUEST,
                None,
                vec![ErrorObject::new("Organization filter must be a UUID.")
                    .with_parameter(ORGANIZATION_FILTER)],
            ))
        })
    }
}

impl RequestHooks for Users {}

#[async_trait]
impl IncludeRelations for Users {
    async fn include_relations(&self, obj: &mut Value, relations: &[String]) -> ApiResult<()> {
        if relations.iter().any(|r| r == "organization") {
            include_organization(&self.service, obj)?;
        }
        Ok(())
    }
}

fn include_organization(service: &Service, user: &mut Value) -> ApiResult<()> {
    let org = match user.get("organization_id").and_then(Value::as_str) {
        Some(id) => {
            let org = service.get_organization(uuid_id(id)?)?;
            to_value(&OrganizationDto::from(org))?
        }
        None => Value::Null,
    };
    user["organization"] = org;
    Ok(())
}

#[async_trait]
impl Resource for Users {
    fn options(&self) -> ResourceOptions {
        ResourceOptions::new(USERS, self.schema.clone())
            .id_mask(IdMask::Int)
            .pagination(
                PageNumberPaginator::default()
                    .with_page_size(self.page_size)
                    .with_max_page_size(self.max_page_size),
            )
    }

    async fn get(&self, scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        let user = UserDto::from(self.service.get_user(int_id(id, "User")?)?);
        let body = scope.serialize(&user, SerializeOptions::single()).await?;
        Ok(scope.to_response(body, None))
    }

    async fn get_many(&self, scope: &Scope<'_>) -> ApiResult<JsonApiResponse> {
        let organization = Self::organization_filter(scope)?;
        let users: Vec<UserDto> = self
            .service
            .list_users(organization)
            .into_iter()
            .map(Into::into)
            .collect();
        let total = users.len();
        let body = scope.serialize(&users, SerializeOptions::paginated()).await?;
        let mut meta = Map::new();
        meta.insert("total".to_string(), total.into());
        Ok(scope.to_response(body, Some(meta)))
    }

    async fn post(&self, scope: &Scope<'_>) -> ApiResult<JsonApiResponse> {
        let attrs = scope.deserialize_body(false).await?;
        let organization_id = match attrs.get("organization") {
            Some(linkage) => organization_linkage(linkage)?,
            None => None,
        };
        let user = self.service.create_user(NewUser {
            email: string_attr(&attrs, "email").unwrap_or_default(),
            display_name: string_attr(&attrs, "display_name").unwrap_or_default(),
            organization_id,
        })?;
        let id = user.id.to_string();
        let body = scope
            .serialize(&UserDto::from(user), SerializeOptions::single())
            .await?;
        created(scope, "users:get", &id, body)
    }

    async fn patch(&self, scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        let attrs = scope.deserialize_body(true).await?;
        check_body_id(&attrs, id)?;
        let organization_id = match attrs.get("organization") {
            Some(linkage) => Some(organization_linkage(linkage)?),
            None => None,
        };
        let user = self.service.update_user(
            int_id(id, "User")?,
            UserPatch {
                email: string_attr(&attrs, "email"),
                display_name: string_attr(&attrs, "display_name"),
                organization_id,
            },
        )?;
        let body = scope
            .serialize(&UserDto::from(user), SerializeOptions::single())
            .await?;
        Ok(scope.to_response(body, None))
    }

    async fn delete(&self, _scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        self.service.delete_user(int_id(id, "User")?)?;
        Ok(JsonApiResponse::no_content())
    }

    async fn get_related(
        &self,
        scope: &Scope<'_>,
        id: &str,
        relationship: &str,
        _related_id: Option<&str>,
    ) -> ApiResult<JsonApiResponse> {
        if relationship != "organization" {
            return Err(JsonApiError::not_found().into());
        }
        let user = self.service.get_user(int_id(id, "User")?)?;
        let org = user
            .organization_id
            .map(|org| self.service.get_organization(org))
            .transpose()?
            .map(OrganizationDto::from);
        let body = scope.serialize_related(&org, false).await?;
        Ok(scope.to_response(body, None))
    }

    fn inclusion(&self) -> Inclusion<'_> {
        Inclusion::Supported(self)
    }
}

// Teams

pub struct Teams {
    service: Arc<Service>,
    schema: Arc<Schema>,
}

impl Teams {
    pub fn new(service: Arc<Service>, schema: Arc<Schema>) -> Self {
        Self { service, schema }
    }
}

impl RequestHooks for Teams {}

#[async_trait]
impl IncludeRelations for Teams {
    /// Supports `users` and `users.organization`.
    async fn include_relations(&self, obj: &mut Value, relations: &[String]) -> ApiResult<()> {
        let with_users = relations
            .iter()
            .any(|r| r == "users" || r.starts_with("users."));
        if !with_users {
            return Ok(());
        }
        let with_orgs = relations.iter().any(|r| r == "users.organization");

        let ids: Vec<u64> = obj
            .get("user_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default();
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            let mut user = to_value(&UserDto::from(self.service.get_user(id)?))?;
            if with_orgs {
                include_organization(&self.service, &mut user)?;
            }
            users.push(user);
        }
        obj["users"] = Value::Array(users);
        Ok(())
    }
}

#[async_trait]
impl Resource for Teams {
    fn options(&self) -> ResourceOptions {
        ResourceOptions::new(TEAMS, self.schema.clone()).id_mask(IdMask::Int)
    }

    async fn get(&self, scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        let team = TeamDto::from(self.service.get_team(int_id(id, "Team")?)?);
        let body = scope.serialize(&team, SerializeOptions::single()).await?;
        Ok(scope.to_response(body, None))
    }

    async fn get_many(&self, scope: &Scope<'_>) -> ApiResult<JsonApiResponse> {
        let teams: Vec<TeamDto> = self
            .service
            .list_teams()
            .into_iter()
            .map(Into::into)
            .collect();
        let body = scope.serialize(&teams, SerializeOptions::many()).await?;
        Ok(scope.to_response(body, None))
    }

    async fn post(&self, scope: &Scope<'_>) -> ApiResult<JsonApiResponse> {
        let attrs = scope.deserialize_body(false).await?;
        let user_ids = match attrs.get("users") {
            Some(ids) => loaded_user_ids(ids)?,
            None => Vec::new(),
        };
        let team = self.service.create_team(NewTeam {
            name: string_attr(&attrs, "name").unwrap_or_default(),
            user_ids,
        })?;
        let id = team.id.to_string();
        let body = scope
            .serialize(&TeamDto::from(team), SerializeOptions::single())
            .await?;
        created(scope, "teams:get", &id, body)
    }

    async fn patch(&self, scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        let attrs = scope.deserialize_body(true).await?;
        check_body_id(&attrs, id)?;
        let user_ids = attrs.get("users").map(loaded_user_ids).transpose()?;
        let team = self.service.update_team(
            int_id(id, "Team")?,
            TeamPatch {
                name: string_attr(&attrs, "name"),
                user_ids,
            },
        )?;
        let body = scope
            .serialize(&TeamDto::from(team), SerializeOptions::single())
            .await?;
        Ok(scope.to_response(body, None))
    }

    async fn delete(&self, _scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        self.service.delete_team(int_id(id, "Team")?)?;
        Ok(JsonApiResponse::no_content())
    }

    async fn get_related(
        &self,
        scope: &Scope<'_>,
        id: &str,
        relationship: &str,
        related_id: Option<&str>,
    ) -> ApiResult<JsonApiResponse> {
        if relationship != "users" {
            return Err(JsonApiError::not_found().into());
        }
        let members = self.service.team_members(int_id(id, "Team")?)?;
        let body = match related_id {
            None => {
                let users: Vec<UserDto> = members.into_iter().map(Into::into).collect();
                scope.serialize_related(&users, true).await?
            }
            Some(related_id) => {
                let wanted = int_id(related_id, "User")?;
                let user = members
                    .into_iter()
                    .find(|u| u.id == wanted)
                    .map(UserDto::from)
                    .ok_or_else(|| JsonApiError::resource_not_found(Some("User not found.")))?;
                scope.serialize_related(&user, false).await?
            }
        };
        Ok(scope.to_response(body, None))
    }

    fn inclusion(&self) -> Inclusion<'_> {
        Inclusion::Supported(self)
    }
}

// teams/{id}/relationships/users

pub struct TeamUsers {
    service: Arc<Service>,
}

impl TeamUsers {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }

    async fn respond(
        &self,
        scope: &RelationshipScope<'_>,
        team: crate::contract::model::Team,
    ) -> ApiResult<JsonApiResponse> {
        let body = scope.serialize(&TeamDto::from(team)).await?;
        Ok(scope.to_response(body, None))
    }

    async fn requested_ids(scope: &RelationshipScope<'_>) -> ApiResult<Vec<u64>> {
        match scope.deserialize_ids().await? {
            Linkage::Null => Ok(Vec::new()),
            linkage => user_ids(linkage.ids()),
        }
    }
}

impl RequestHooks for TeamUsers {}

#[async_trait]
impl RelationshipResource for TeamUsers {
    fn options(&self) -> RelationshipOptions {
        RelationshipOptions::new(TEAMS, USERS)
    }

    async fn get(&self, scope: &RelationshipScope<'_>, parent_id: &str) -> ApiResult<JsonApiResponse> {
        let team = self.service.get_team(int_id(parent_id, "Team")?)?;
        self.respond(scope, team).await
    }

    /// Replaces the member list.
    async fn patch(&self, scope: &RelationshipScope<'_>, parent_id: &str) -> ApiResult<JsonApiResponse> {
        let ids = Self::requested_ids(scope).await?;
        let team = self
            .service
            .set_team_members(int_id(parent_id, "Team")?, ids)?;
        self.respond(scope, team).await
    }

    async fn post(&self, scope: &RelationshipScope<'_>, parent_id: &str) -> ApiResult<JsonApiResponse> {
        let ids = Self::requested_ids(scope).await?;
        let team = self
            .service
            .add_team_members(int_id(parent_id, "Team")?, &ids)?;
        self.respond(scope, team).await
    }

    async fn delete(&self, scope: &RelationshipScope<'_>, parent_id: &str) -> ApiResult<JsonApiResponse> {
        let ids = Self::requested_ids(scope).await?;
        let team = self
            .service
            .remove_team_members(int_id(parent_id, "Team")?, &ids)?;
        self.respond(scope, team).await
    }
}
