//! Declarative resource schema: typed attributes, relationships, self links.
//!
//! `dump` turns plain JSON objects into JSON:API documents (compound documents
//! included), `validate`/`load` go the other way for request bodies.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::document::ErrorObject;
use crate::fields::Relationship;
use crate::query::IncludeTree;
use crate::registry::SchemaRegistry;
use crate::routes::{scalar_to_string, LinkBuilder};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Must specify `self_route` option when `self_route_kwargs` is specified.")]
    SelfRouteKwargsWithoutRoute,
    #[error("schema `{schema}` declares `{field}` twice")]
    DuplicateField { schema: String, field: String },
    #[error("cannot serialize {what} as a `{type_}` resource object")]
    InvalidData { type_: String, what: &'static str },
    #[error("`{type_}` object has no usable `id`")]
    MissingId { type_: String },
    #[error("relationship `{relationship}` of `{type_}` cannot be included without a schema")]
    MissingRelatedSchema { type_: String, relationship: String },
    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),
}

/// Options applying to the whole schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaOptions {
    pub type_: String,
    /// Route resolved for each resource object's `links.self`.
    pub self_route: Option<String>,
    pub self_route_kwargs: BTreeMap<String, String>,
    /// Route resolved for the top-level `links.self` of collections.
    pub self_route_many: Option<String>,
}

impl SchemaOptions {
    pub fn validate(&self) -> Result<(), SchemaError> {
        if !self.self_route_kwargs.is_empty() && self.self_route.is_none() {
            return Err(SchemaError::SelfRouteKwargsWithoutRoute);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    /// Any JSON value.
    Raw,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Float => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Raw => true,
        }
    }

    fn invalid_message(self) -> &'static str {
        match self {
            FieldKind::String => "Not a valid string.",
            FieldKind::Integer => "Not a valid integer.",
            FieldKind::Float => "Not a valid number.",
            FieldKind::Boolean => "Not a valid boolean.",
            FieldKind::Raw => "Invalid value.",
        }
    }

    pub fn openapi_type(self) -> Option<&'static str> {
        match self {
            FieldKind::String => Some("string"),
            FieldKind::Integer => Some("integer"),
            FieldKind::Float => Some("number"),
            FieldKind::Boolean => Some("boolean"),
            FieldKind::Raw => None,
        }
    }
}

pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Attribute (or the `id`) of a schema.
#[derive(Clone)]
pub struct Field {
    name: String,
    kind: FieldKind,
    required: bool,
    dump_only: bool,
    load_only: bool,
    allow_none: bool,
    validators: Vec<Validator>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("dump_only", &self.dump_only)
            .field("load_only", &self.load_only)
            .field("allow_none", &self.allow_none)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            dump_only: false,
            load_only: false,
            allow_none: false,
            validators: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn raw(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Raw)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn dump_only(mut self) -> Self {
        self.dump_only = true;
        self
    }

    pub fn load_only(mut self) -> Self {
        self.load_only = true;
        self
    }

    pub fn allow_none(mut self) -> Self {
        self.allow_none = true;
        self
    }

    /// Extra check run on present, non-null values. `Err` carries the error detail.
    pub fn validator(
        mut self,
        check: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validators.push(Arc::new(check));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_dump_only(&self) -> bool {
        self.dump_only
    }

    pub fn is_load_only(&self) -> bool {
        self.load_only
    }

    fn check(&self, value: &Value) -> Vec<String> {
        if value.is_null() {
            return if self.allow_none {
                Vec::new()
            } else {
                vec!["Field may not be null.".to_string()]
            };
        }
        if !self.kind.accepts(value) {
            return vec![self.kind.invalid_message().to_string()];
        }
        self.validators
            .iter()
            .filter_map(|check| check(value).err())
            .collect()
    }
}

/// Schema of one resource type.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    options: SchemaOptions,
    id: Field,
    fields: Vec<Field>,
    relationships: Vec<Relationship>,
}

/// Per-dump parameters.
#[derive(Debug, Clone, Copy)]
pub struct DumpContext<'a> {
    pub links: LinkBuilder<'a>,
    pub schemas: &'a SchemaRegistry,
    pub include: &'a IncludeTree,
    /// Top-level `self` link used when serializing objects as related resources.
    pub self_related_route: Option<(&'a str, &'a BTreeMap<String, String>)>,
}

#[derive(Default)]
struct Included {
    seen: HashSet<(String, String)>,
    items: Vec<Value>,
}

impl Included {
    fn push(&mut self, item: Value) {
        if self.seen.insert(resource_key(&item)) {
            self.items.push(item);
        }
    }

    /// Resources already present as primary data are not repeated in `included`.
    fn into_items(self, primary: &Value) -> Vec<Value> {
        let primary: HashSet<_> = match primary {
            Value::Array(items) => items.iter().map(resource_key).collect(),
            Value::Null => HashSet::new(),
            item => HashSet::from([resource_key(item)]),
        };
        self.items
            .into_iter()
            .filter(|item| !primary.contains(&resource_key(item)))
            .collect()
    }
}

fn resource_key(item: &Value) -> (String, String) {
    (
        item["type"].as_str().unwrap_or_default().to_string(),
        item["id"].as_str().unwrap_or_default().to_string(),
    )
}

impl Schema {
    /// Schema for `type_`; named after the type and with a dump-only string `id`.
    pub fn new(type_: impl Into<String>) -> Self {
        let type_ = type_.into();
        Self {
            name: type_.clone(),
            options: SchemaOptions {
                type_,
                ..Default::default()
            },
            id: Field::string("id").dump_only(),
            fields: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Registry name, when it must differ from the type.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn id_field(mut self, field: Field) -> Self {
        self.id = Field { name: "id".to_string(), ..field };
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn self_route(mut self, route: impl Into<String>, kwargs: &[(&str, &str)]) -> Self {
        self.options.self_route = Some(route.into());
        self.options.self_route_kwargs = kwargs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    pub fn self_route_many(mut self, route: impl Into<String>) -> Self {
        self.options.self_route_many = Some(route.into());
        self
    }

    pub fn with_options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    /// Check option constraints and field name uniqueness.
    pub fn build(self) -> Result<Self, SchemaError> {
        self.options.validate()?;
        let mut names = HashSet::new();
        let attrs = self.fields.iter().map(Field::name);
        let rels = self.relationships.iter().map(Relationship::name);
        for name in attrs.chain(rels) {
            if name == "id" || name == "type" || !names.insert(name) {
                return Err(SchemaError::DuplicateField {
                    schema: self.name.clone(),
                    field: name.to_string(),
                });
            }
        }
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_(&self) -> &str {
        &self.options.type_
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn id(&self) -> &Field {
        &self.id
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn get_relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name() == name)
    }

    /// Serialize one object (or, with `many`, an array of objects) as a document.
    pub fn dump(&self, data: &Value, many: bool, ctx: &DumpContext<'_>) -> Result<Value, SchemaError> {
        let mut included = Included::default();
        let primary = if many {
            let Value::Array(items) = data else {
                return Err(self.invalid("a non-array value"));
            };
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(self.format_item(item, ctx.include, ctx, &mut included)?);
            }
            Value::Array(out)
        } else if data.is_null() {
            Value::Null
        } else {
            self.format_item(data, ctx.include, ctx, &mut included)?
        };

        let included = included.into_items(&primary);
        let mut doc = Map::new();
        doc.insert("data".to_string(), primary);
        if !included.is_empty() {
            doc.insert("included".to_string(), Value::Array(included));
        }
        if let Some(links) = self.top_level_links(data, many, ctx) {
            doc.insert("links".to_string(), Value::Object(links));
        }
        Ok(Value::Object(doc))
    }

    fn invalid(&self, what: &'static str) -> SchemaError {
        SchemaError::InvalidData {
            type_: self.type_().to_string(),
            what,
        }
    }

    fn top_level_links(&self, data: &Value, many: bool, ctx: &DumpContext<'_>) -> Option<Map<String, Value>> {
        let self_link = match ctx.self_related_route {
            Some((route, kwargs)) => {
                let obj = (!many).then_some(data);
                ctx.links.link(Some(route), kwargs, obj)
            }
            None => None,
        };
        let self_link = self_link.or_else(|| {
            if many {
                ctx.links.link(
                    self.options.self_route_many.as_deref(),
                    &BTreeMap::new(),
                    None,
                )
            } else if data.is_null() {
                None
            } else {
                ctx.links.link(
                    self.options.self_route.as_deref(),
                    &self.options.self_route_kwargs,
                    Some(data),
                )
            }
        })?;
        let mut links = Map::new();
        links.insert("self".to_string(), Value::String(self_link));
        Some(links)
    }

    fn format_item(
        &self,
        item: &Value,
        include: &IncludeTree,
        ctx: &DumpContext<'_>,
        included: &mut Included,
    ) -> Result<Value, SchemaError> {
        let Value::Object(obj) = item else {
            return Err(self.invalid("a non-object value"));
        };
        let id = obj
            .get("id")
            .and_then(scalar_to_string)
            .ok_or_else(|| SchemaError::MissingId {
                type_: self.type_().to_string(),
            })?;

        let mut resource = Map::new();
        resource.insert("type".to_string(), Value::String(self.type_().to_string()));
        resource.insert("id".to_string(), Value::String(id));

        let attributes: Map<String, Value> = self
            .fields
            .iter()
            .filter(|f| !f.load_only)
            .filter_map(|f| obj.get(&f.name).map(|v| (f.name.clone(), v.clone())))
            .collect();
        if !attributes.is_empty() {
            resource.insert("attributes".to_string(), Value::Object(attributes));
        }

        let mut relationships = Map::new();
        for rel in &self.relationships {
            let is_included = include.contains(rel.name());
            if let Some(value) = rel.serialize(item, is_included, &ctx.links) {
                relationships.insert(rel.name().to_string(), value);
            }
            if is_included {
                self.include_related(rel, item, include, ctx, included)?;
            }
        }
        if !relationships.is_empty() {
            resource.insert("relationships".to_string(), Value::Object(relationships));
        }

        if let Some(link) = ctx.links.link(
            self.options.self_route.as_deref(),
            &self.options.self_route_kwargs,
            Some(item),
        ) {
            resource.insert("links".to_string(), json!({ "self": link }));
        }
        Ok(Value::Object(resource))
    }

    fn include_related(
        &self,
        rel: &Relationship,
        item: &Value,
        include: &IncludeTree,
        ctx: &DumpContext<'_>,
        included: &mut Included,
    ) -> Result<(), SchemaError> {
        let related: Vec<&Value> = match item.get(rel.name()) {
            Some(Value::Array(items)) => items.iter().filter(|v| v.is_object()).collect(),
            Some(value @ Value::Object(_)) => vec![value],
            _ => return Ok(()),
        };
        if related.is_empty() {
            return Ok(());
        }
        let schema_name = rel
            .schema_name()
            .ok_or_else(|| SchemaError::MissingRelatedSchema {
                type_: self.type_().to_string(),
                relationship: rel.name().to_string(),
            })?;
        let schema = ctx.schemas.get(schema_name)?;
        let nested = include.child(rel.name()).cloned().unwrap_or_default();
        for value in related {
            let resource = schema.format_item(value, &nested, ctx, included)?;
            included.push(resource);
        }
        Ok(())
    }

    /// Check a request document against the schema.
    ///
    /// Structural problems stop at the first error; field problems are collected, each
    /// pointing at the offending member. With `partial`, missing required members are
    /// accepted.
    pub fn validate(&self, body: &Value, partial: bool) -> Vec<ErrorObject> {
        match self.unwrap_data(body) {
            Ok(data) => self.validate_data(data, partial),
            Err(error) => vec![error],
        }
    }

    fn unwrap_data<'b>(&self, body: &'b Value) -> Result<&'b Map<String, Value>, ErrorObject> {
        let data = body
            .as_object()
            .and_then(|doc| doc.get("data"))
            .ok_or_else(|| ErrorObject::new("Object must include `data` key.").with_pointer("/"))?;
        let data = data.as_object().ok_or_else(|| {
            ErrorObject::new("`data` object must include `type` key.").with_pointer("/data")
        })?;
        match data.get("type") {
            None => Err(ErrorObject::new("`data` object must include `type` key.").with_pointer("/data")),
            Some(t) if t.as_str() != Some(self.type_()) => Err(ErrorObject::new(format!(
                "Invalid type. Expected \"{}\".",
                self.type_()
            ))
            .with_pointer("/data/type")),
            Some(_) => Ok(data),
        }
    }

    fn validate_data(&self, data: &Map<String, Value>, partial: bool) -> Vec<ErrorObject> {
        let mut errors = Vec::new();

        if !self.id.dump_only {
            match data.get("id") {
                Some(value) => errors.extend(
                    self.id
                        .check(value)
                        .into_iter()
                        .map(|m| ErrorObject::new(m).with_pointer("/data/id")),
                ),
                None if self.id.required && !partial => errors.push(
                    ErrorObject::new("Missing data for required field.").with_pointer("/data/id"),
                ),
                None => {}
            }
        }

        let attributes = data.get("attributes").and_then(Value::as_object);
        for field in self.fields.iter().filter(|f| !f.dump_only) {
            let pointer = format!("/data/attributes/{}", field.name);
            match attributes.and_then(|a| a.get(&field.name)) {
                Some(value) => errors.extend(
                    field
                        .check(value)
                        .into_iter()
                        .map(|m| ErrorObject::new(m).with_pointer(pointer.clone())),
                ),
                None if field.required && !partial => errors
                    .push(ErrorObject::new("Missing data for required field.").with_pointer(pointer)),
                None => {}
            }
        }

        let relationships = data.get("relationships").and_then(Value::as_object);
        for rel in &self.relationships {
            let pointer = format!("/data/relationships/{}", rel.name());
            match relationships.and_then(|r| r.get(rel.name())) {
                Some(value) => {
                    if let Err(messages) = rel.deserialize(value) {
                        errors.extend(
                            messages
                                .into_iter()
                                .map(|m| ErrorObject::new(m).with_pointer(pointer.clone())),
                        );
                    }
                }
                None if rel.is_required() && !partial => errors
                    .push(ErrorObject::new("Missing data for required field.").with_pointer(pointer)),
                None => {}
            }
        }
        errors
    }

    /// Flatten a valid request document into `{id?, <attribute>..., <relationship>...}`.
    ///
    /// Relationships load as their id(s). Dump-only and unknown members are dropped.
    pub fn load(&self, body: &Value, partial: bool) -> Result<Map<String, Value>, Vec<ErrorObject>> {
        let errors = self.validate(body, partial);
        if !errors.is_empty() {
            return Err(errors);
        }
        let data = self.unwrap_data(body).map_err(|e| vec![e])?;

        let mut out = Map::new();
        if !self.id.dump_only {
            if let Some(id) = data.get("id") {
                out.insert("id".to_string(), id.clone());
            }
        }
        if let Some(attributes) = data.get("attributes").and_then(Value::as_object) {
            for field in self.fields.iter().filter(|f| !f.dump_only) {
                if let Some(value) = attributes.get(&field.name) {
                    out.insert(field.name.clone(), value.clone());
                }
            }
        }
        if let Some(relationships) = data.get("relationships").and_then(Value::as_object) {
            for rel in &self.relationships {
                let linkage = relationships
                    .get(rel.name())
                    .and_then(|value| rel.deserialize(value).ok());
                if let Some(linkage) = linkage {
                    out.insert(rel.name().to_string(), linkage.into_value());
                }
            }
        }
        Ok(out)
    }
}
