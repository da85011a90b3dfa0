//! JSON:API schemas of the accounts resource types.

use std::sync::Arc;

use jsonapi_kit::{Field, Relationship, Schema, SchemaError};
use serde_json::Value;

pub const ORGANIZATIONS: &str = "organizations";
pub const USERS: &str = "users";
pub const TEAMS: &str = "teams";

fn not_blank(value: &Value) -> Result<(), String> {
    match value.as_str() {
        Some(s) if s.trim().is_empty() => Err("Field may not be blank.".to_string()),
        _ => Ok(()),
    }
}

pub fn organization_schema() -> Result<Arc<Schema>, SchemaError> {
    Schema::new(ORGANIZATIONS)
        .field(Field::string("name").required().validator(not_blank))
        .field(Field::string("created_at").dump_only())
        .self_route("organizations:get", &[("id", "<id>")])
        .build()
        .map(Arc::new)
}

pub fn user_schema() -> Result<Arc<Schema>, SchemaError> {
    Schema::new(USERS)
        .field(Field::string("email").required().validator(|value| {
            match value.as_str() {
                Some(email) if !email.contains('@') => Err("Not a valid email address.".to_string()),
                _ => Ok(()),
            }
        }))
        .field(Field::string("display_name").required().validator(not_blank))
        .field(Field::string("created_at").dump_only())
        .field(Field::string("updated_at").dump_only())
        .relationship(
            Relationship::new("organization", ORGANIZATIONS)
                .schema(ORGANIZATIONS)
                .id_attribute("organization_id")
                .include_resource_linkage(true)
                .allow_none(true)
                .related_resource(ORGANIZATIONS)
                .related_route("users:organization", &[("id", "<id>")]),
        )
        .self_route("users:get", &[("id", "<id>")])
        .build()
        .map(Arc::new)
}

pub fn team_schema() -> Result<Arc<Schema>, SchemaError> {
    Schema::new(TEAMS)
        .field(Field::string("name").required().validator(not_blank))
        .relationship(
            Relationship::new("users", USERS)
                .many(true)
                .schema(USERS)
                .id_attribute("user_ids")
                .include_resource_linkage(true)
                .related_resource(USERS)
                .self_route("teams:relationships-users", &[("id", "<id>")])
                .related_route("teams:users", &[("id", "<id>")]),
        )
        .self_route("teams:get", &[("id", "<id>")])
        .build()
        .map(Arc::new)
}
