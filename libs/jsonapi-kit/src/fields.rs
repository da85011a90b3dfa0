//! Relationship field: to-one / to-many pointer to another resource type.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::routes::{scalar_to_string, LinkBuilder};

/// Deserialized relationship linkage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Linkage {
    Null,
    One(String),
    Many(Vec<String>),
}

impl Linkage {
    pub fn into_value(self) -> Value {
        match self {
            Linkage::Null => Value::Null,
            Linkage::One(id) => Value::String(id),
            Linkage::Many(ids) => Value::Array(ids.into_iter().map(Value::String).collect()),
        }
    }

    /// Ids carried by the linkage; empty for `Null`.
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Linkage::Null => Vec::new(),
            Linkage::One(id) => vec![id.as_str()],
            Linkage::Many(ids) => ids.iter().map(String::as_str).collect(),
        }
    }
}

/// Relationship declared on a [`Schema`](crate::schema::Schema).
///
/// Links are resolved from route names; `<attr>` kwargs values are read from the object
/// being serialized. Without linkage and without resolvable links the relationship is
/// left out of the document entirely.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub(crate) name: String,
    pub(crate) type_: String,
    pub(crate) many: bool,
    pub(crate) include_resource_linkage: bool,
    pub(crate) schema: Option<String>,
    pub(crate) id_attribute: Option<String>,
    pub(crate) related_resource: Option<String>,
    pub(crate) related_route: Option<String>,
    pub(crate) related_route_kwargs: BTreeMap<String, String>,
    pub(crate) self_route: Option<String>,
    pub(crate) self_route_kwargs: BTreeMap<String, String>,
    pub(crate) allow_none: bool,
    pub(crate) required: bool,
}

fn kwargs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Relationship {
    pub fn new(name: impl Into<String>, type_: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_: type_.into(),
            many: false,
            include_resource_linkage: false,
            schema: None,
            id_attribute: None,
            related_resource: None,
            related_route: None,
            related_route_kwargs: BTreeMap::new(),
            self_route: None,
            self_route_kwargs: BTreeMap::new(),
            allow_none: true,
            required: false,
        }
    }

    pub fn many(mut self, many: bool) -> Self {
        self.many = many;
        self
    }

    /// Emit `{type, id}` linkage even when the relationship is not included.
    pub fn include_resource_linkage(mut self, include: bool) -> Self {
        self.include_resource_linkage = include;
        self
    }

    /// Registered schema used to dump related objects into `included`.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Member holding the related id(s) when the related object itself is not loaded.
    pub fn id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = Some(attribute.into());
        self
    }

    /// Registered resource serving the related objects; enables the related routes.
    pub fn related_resource(mut self, resource: impl Into<String>) -> Self {
        self.related_resource = Some(resource.into());
        self
    }

    pub fn related_route(mut self, route: impl Into<String>, route_kwargs: &[(&str, &str)]) -> Self {
        self.related_route = Some(route.into());
        self.related_route_kwargs = kwargs(route_kwargs);
        self
    }

    pub fn self_route(mut self, route: impl Into<String>, route_kwargs: &[(&str, &str)]) -> Self {
        self.self_route = Some(route.into());
        self.self_route_kwargs = kwargs(route_kwargs);
        self
    }

    pub fn allow_none(mut self, allow_none: bool) -> Self {
        self.allow_none = allow_none;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn is_many(&self) -> bool {
        self.many
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn related_resource_name(&self) -> Option<&str> {
        self.related_resource.as_deref()
    }

    pub fn related_route_name(&self) -> Option<&str> {
        self.related_route.as_deref()
    }

    pub fn self_route_name(&self) -> Option<&str> {
        self.self_route.as_deref()
    }

    /// `links` object of the relationship, if any link resolves.
    pub fn links(&self, obj: &Value, links: &LinkBuilder<'_>) -> Option<Map<String, Value>> {
        let mut out = Map::new();
        if let Some(url) = links.link(
            self.self_route.as_deref(),
            &self.self_route_kwargs,
            Some(obj),
        ) {
            out.insert("self".to_string(), Value::String(url));
        }
        if let Some(url) = links.link(
            self.related_route.as_deref(),
            &self.related_route_kwargs,
            Some(obj),
        ) {
            out.insert("related".to_string(), Value::String(url));
        }
        (!out.is_empty()).then_some(out)
    }

    /// Resource linkage for `obj`.
    ///
    /// With `included` the ids come from the loaded related object(s) under the field
    /// name; otherwise from `id_attribute` (falling back to the field name), which may
    /// hold plain ids or objects carrying an `id`.
    pub fn linkage(&self, obj: &Value, included: bool) -> Value {
        let attr = match (&self.id_attribute, included) {
            (Some(id_attr), false) => id_attr.as_str(),
            _ => self.name.as_str(),
        };
        let source = obj.get(attr);
        if self.many {
            let items = match source {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|item| self.identifier(item))
                    .collect(),
                _ => Vec::new(),
            };
            Value::Array(items)
        } else {
            source
                .and_then(|item| self.identifier(item))
                .unwrap_or(Value::Null)
        }
    }

    fn identifier(&self, item: &Value) -> Option<Value> {
        let id = match item {
            Value::Object(obj) => scalar_to_string(obj.get("id")?)?,
            other => scalar_to_string(other)?,
        };
        Some(json!({"type": self.type_, "id": id}))
    }

    /// Relationship object for `obj`; `None` when it would be empty.
    pub fn serialize(&self, obj: &Value, included: bool, links: &LinkBuilder<'_>) -> Option<Value> {
        let mut out = Map::new();
        if let Some(links) = self.links(obj, links) {
            out.insert("links".to_string(), Value::Object(links));
        }
        if self.include_resource_linkage || included {
            out.insert("data".to_string(), self.linkage(obj, included));
        }
        (!out.is_empty()).then_some(Value::Object(out))
    }

    /// Linkage document for the relationship sub-resource: always carries `data`.
    pub fn serialize_linkage(&self, obj: &Value, links: &LinkBuilder<'_>) -> Value {
        let mut out = Map::new();
        if let Some(links) = self.links(obj, links) {
            out.insert("links".to_string(), Value::Object(links));
        }
        out.insert("data".to_string(), self.linkage(obj, false));
        Value::Object(out)
    }

    /// Validate a relationship object (`{"data": ...}`) and extract its ids.
    ///
    /// A relationship object without `data` (links only) is rejected.
    pub fn deserialize(&self, value: &Value) -> Result<Linkage, Vec<String>> {
        let Some(data) = value.as_object().and_then(|obj| obj.get("data")) else {
            return Err(vec!["Must include a `data` key".to_string()]);
        };

        if data.is_null() {
            return if self.allow_none {
                Ok(Linkage::Null)
            } else {
                Err(vec!["Field may not be null.".to_string()])
            };
        }

        if self.many {
            let Value::Array(items) = data else {
                return Err(vec!["Relationship is list-like".to_string()]);
            };
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                ids.push(self.extract_id(item)?);
            }
            Ok(Linkage::Many(ids))
        } else {
            if data.is_array() {
                return Err(vec!["Relationship is not list-like".to_string()]);
            }
            Ok(Linkage::One(self.extract_id(data)?))
        }
    }

    fn extract_id(&self, item: &Value) -> Result<String, Vec<String>> {
        let mut errors = Vec::new();
        let id = item.get("id");
        if id.is_none() {
            errors.push("Must have an `id` field".to_string());
        }
        match item.get("type") {
            None => errors.push("Must have a `type` field".to_string()),
            Some(t) if t.as_str() != Some(self.type_.as_str()) => {
                errors.push("Invalid `type` specified".to_string())
            }
            Some(_) => {}
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        id.and_then(scalar_to_string)
            .ok_or_else(|| vec!["Must have an `id` field".to_string()])
    }
}
