//! OpenAPI 3.0.3 description of the registered routes.
//!
//! Operation info is layered: library defaults, then resource-wide info, then
//! handler-specific info. Layers are combined with [`deep_merge`], so the most
//! specific layer wins.

use std::collections::BTreeMap;

use http::Method;
use serde_json::{json, Map, Value};
use utoipa::PartialSchema;

use crate::dispatch::HandlerKind;
use crate::document::{ErrorDocument, ErrorObject, ErrorSource, JSONAPI_MEDIA_TYPE};
use crate::fields::Relationship;
use crate::routes::IdMask;
use crate::schema::Schema;

const ERROR_DOCUMENT_REF: &str = "#/components/schemas/ErrorDocument";

/// Merge `b` into `a`: lists extend, objects merge recursively, anything else is replaced.
pub fn deep_merge(a: &mut Value, b: Value) {
    match b {
        Value::Array(items) => {
            if let Value::Array(existing) = a {
                existing.extend(items);
            } else {
                *a = Value::Array(items);
            }
        }
        Value::Object(members) => {
            if let Value::Object(existing) = a {
                for (key, value) in members {
                    match existing.get_mut(&key) {
                        Some(slot) => deep_merge(slot, value),
                        None => {
                            existing.insert(key, value);
                        }
                    }
                }
            } else {
                *a = Value::Object(members);
            }
        }
        other => *a = other,
    }
}

/// OpenAPI info attached to a resource: resource-wide, then per handler.
///
/// Setting `include_in_schema: false` hides an operation.
#[derive(Debug, Clone, Default)]
pub struct OpenApiInfo {
    resource: Value,
    handlers: BTreeMap<HandlerKind, Value>,
}

impl OpenApiInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Info applied to every operation of the resource.
    pub fn resource(mut self, info: Value) -> Self {
        if self.resource.is_null() {
            self.resource = info;
        } else {
            deep_merge(&mut self.resource, info);
        }
        self
    }

    /// Info applied to one handler; may be called repeatedly.
    pub fn handler(mut self, handler: HandlerKind, info: Value) -> Self {
        match self.handlers.get_mut(&handler) {
            Some(existing) => deep_merge(existing, info),
            None => {
                self.handlers.insert(handler, info);
            }
        }
        self
    }

    pub(crate) fn operation(&self, handler: HandlerKind, defaults: Value) -> Value {
        let mut op = defaults;
        if !self.resource.is_null() {
            deep_merge(&mut op, self.resource.clone());
        }
        if let Some(info) = self.handlers.get(&handler) {
            deep_merge(&mut op, info.clone());
        }
        op
    }
}

/// A registered route as seen by the document builder.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    /// Router template, e.g. `/api/users/{id}`.
    pub path: String,
    pub method: Method,
    pub tag: String,
    pub params: Vec<(String, IdMask)>,
    pub info: Value,
}

fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": { JSONAPI_MEDIA_TYPE: { "schema": { "$ref": ERROR_DOCUMENT_REF } } }
    })
}

fn document_response(description: &str, data: Value) -> Value {
    json!({
        "description": description,
        "content": {
            JSONAPI_MEDIA_TYPE: {
                "schema": { "type": "object", "properties": { "data": data } }
            }
        }
    })
}

fn request_body(data: Value) -> Value {
    json!({
        "required": true,
        "content": {
            JSONAPI_MEDIA_TYPE: {
                "schema": { "type": "object", "properties": { "data": data } }
            }
        }
    })
}

/// Library defaults for a resource handler.
pub(crate) fn resource_defaults(handler: HandlerKind, schema: &Schema) -> Value {
    let item = schema_ref(schema.name());
    let list = json!({ "type": "array", "items": item.clone() });
    let mut op = match handler {
        HandlerKind::Get => json!({
            "description": "Retrieve an item by its id. Details: https://jsonapi.org/format/#fetching-resources",
            "responses": {
                "200": document_response("Resource object", item),
                "404": error_response("Resource not found"),
            }
        }),
        HandlerKind::Patch => json!({
            "description": "Update an item by its id. Details: https://jsonapi.org/format/#crud-updating",
            "requestBody": request_body(item.clone()),
            "responses": {
                "200": document_response("Updated resource object", item),
                "400": error_response("Invalid request"),
                "404": error_response("Resource not found"),
            }
        }),
        HandlerKind::Delete => json!({
            "description": "Delete an item by its id. Details: https://jsonapi.org/format/#crud-deleting",
            "responses": {
                "204": { "description": "Deleted" },
                "404": error_response("Resource not found"),
            }
        }),
        HandlerKind::GetMany => json!({
            "description": "Retrieve a list of items. Details: https://jsonapi.org/format/#fetching-resources",
            "responses": {
                "200": document_response("Resource objects", list),
                "400": error_response("Invalid query parameters"),
            }
        }),
        HandlerKind::Post => json!({
            "description": "Create an item. Details: https://jsonapi.org/format/#crud-creating",
            "requestBody": request_body(item.clone()),
            "responses": {
                "201": document_response("Created resource object", item),
                "400": error_response("Invalid request"),
            }
        }),
        HandlerKind::GetRelated => json!({
            "description": "Retrieve a related item. Details: https://jsonapi.org/format/#fetching-resources",
            "responses": {
                "404": error_response("Resource not found"),
            }
        }),
    };
    deep_merge(
        &mut op,
        json!({ "responses": { "500": error_response("Internal server error") } }),
    );
    op
}

fn linkage_schema(relationship: &Relationship) -> Value {
    let item = json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "type": { "type": "string", "enum": [relationship.type_()] },
        }
    });
    if relationship.is_many() {
        json!({ "type": "array", "items": item })
    } else {
        item
    }
}

/// Library defaults for a relationship sub-resource handler.
pub(crate) fn relationship_defaults(handler: HandlerKind, relationship: &Relationship) -> Value {
    let linkage = linkage_schema(relationship);
    let mut op = match handler {
        HandlerKind::Get => json!({
            "description": "Retrieve a (list of) relationship(s). Details: https://jsonapi.org/format/#fetching-relationships",
        }),
        HandlerKind::Patch => json!({
            "description": "Update a relationship. Details: https://jsonapi.org/format/#crud-updating-relationships",
            "requestBody": request_body(linkage.clone()),
        }),
        HandlerKind::Post => json!({
            "description": "Create a relationship. Details: https://jsonapi.org/format/#crud-updating-relationships",
            "requestBody": request_body(linkage.clone()),
        }),
        HandlerKind::Delete => json!({
            "description": "Delete a relationship. Details: https://jsonapi.org/format/#crud-updating-relationships",
            "requestBody": request_body(linkage.clone()),
        }),
        HandlerKind::GetMany | HandlerKind::GetRelated => json!({}),
    };
    deep_merge(
        &mut op,
        json!({
            "responses": {
                "200": document_response("Relationship linkage", linkage),
                "500": error_response("Internal server error"),
            }
        }),
    );
    op
}

/// JSON Schema of a resource object described by `schema`.
pub fn resource_object_schema(schema: &Schema) -> Value {
    let mut properties = Map::new();
    properties.insert("id".to_string(), json!({ "type": "string" }));
    properties.insert(
        "type".to_string(),
        json!({ "type": "string", "enum": [schema.type_()] }),
    );

    let mut attributes = Map::new();
    let mut required_attributes = Vec::new();
    for field in schema.fields() {
        let mut prop = match field.kind().openapi_type() {
            Some(kind) => json!({ "type": kind }),
            None => json!({}),
        };
        if field.is_dump_only() {
            prop["readOnly"] = Value::Bool(true);
        }
        if field.is_load_only() {
            prop["writeOnly"] = Value::Bool(true);
        }
        if field.is_required() {
            required_attributes.push(field.name().to_string());
        }
        attributes.insert(field.name().to_string(), prop);
    }
    if !attributes.is_empty() {
        let mut block = json!({ "type": "object", "properties": attributes });
        if !required_attributes.is_empty() {
            required_attributes.sort();
            block["required"] = json!(required_attributes);
        }
        properties.insert("attributes".to_string(), block);
    }

    let mut relationships = Map::new();
    let mut required_relationships = Vec::new();
    for rel in schema.relationships() {
        let mut prop = json!({
            "type": "object",
            "properties": { "data": linkage_schema(rel) }
        });
        let mut links = Map::new();
        if rel.related_route_name().is_some() {
            links.insert("related".to_string(), json!({ "type": "string" }));
        }
        if rel.self_route_name().is_some() {
            links.insert("self".to_string(), json!({ "type": "string" }));
        }
        if !links.is_empty() {
            prop["properties"]["links"] =
                json!({ "type": "object", "readOnly": true, "properties": links });
        }
        if rel.is_required() {
            required_relationships.push(rel.name().to_string());
        }
        relationships.insert(rel.name().to_string(), prop);
    }
    if !relationships.is_empty() {
        let mut block = json!({ "type": "object", "properties": relationships });
        if !required_relationships.is_empty() {
            required_relationships.sort();
            block["required"] = json!(required_relationships);
        }
        properties.insert("relationships".to_string(), block);
    }

    let mut required = vec!["type"];
    if properties
        .get("attributes")
        .is_some_and(|a| a.get("required").is_some())
    {
        required.push("attributes");
    }
    if properties
        .get("relationships")
        .is_some_and(|r| r.get("required").is_some())
    {
        required.push("relationships");
    }
    json!({ "type": "object", "properties": properties, "required": required })
}

/// `{*id}` catch-alls become plain `{id}` parameters.
fn openapi_path(path: &str) -> String {
    path.replace("{*", "{")
}

/// Assemble the document. Operations with `include_in_schema: false` are skipped.
pub fn build_document<'a>(
    title: &str,
    version: &str,
    operations: impl IntoIterator<Item = &'a OperationSpec>,
    schemas: impl IntoIterator<Item = &'a Schema>,
) -> Value {
    let mut paths: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for op in operations {
        let mut info = op.info.clone();
        if let Some(obj) = info.as_object_mut() {
            if obj.remove("include_in_schema") == Some(Value::Bool(false)) {
                continue;
            }
        }
        let params: Vec<Value> = op
            .params
            .iter()
            .map(|(name, mask)| {
                json!({
                    "name": name,
                    "in": "path",
                    "required": true,
                    "schema": { "type": mask.openapi_type() }
                })
            })
            .collect();
        deep_merge(
            &mut info,
            json!({ "tags": [op.tag], "parameters": params }),
        );
        paths
            .entry(openapi_path(&op.path))
            .or_default()
            .insert(op.method.as_str().to_lowercase(), info);
    }

    let mut components = Map::new();
    for (name, schema) in [
        ("ErrorDocument", serde_json::to_value(ErrorDocument::schema())),
        ("ErrorObject", serde_json::to_value(ErrorObject::schema())),
        ("ErrorSource", serde_json::to_value(ErrorSource::schema())),
    ] {
        match schema {
            Ok(schema) => {
                components.insert(name.to_string(), schema);
            }
            Err(err) => tracing::warn!(schema = name, error = %err, "failed to render schema"),
        }
    }
    for schema in schemas {
        components.insert(schema.name().to_string(), resource_object_schema(schema));
    }

    json!({
        "openapi": "3.0.3",
        "info": { "title": title, "version": version },
        "paths": paths,
        "components": { "schemas": components },
    })
}
