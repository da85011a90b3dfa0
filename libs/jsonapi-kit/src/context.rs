use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Per-request scratch space, created fresh for every request.
///
/// Path parameters extracted by the route (`id`, `related_id`, `parent_id`) and the
/// relationship name of related routes are filled in before `before_request` runs;
/// hooks may stash anything else in the extras map.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    params: BTreeMap<String, String>,
    relationship: Option<String>,
    extras: Map<String, Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_relationship(mut self, relationship: Option<String>) -> Self {
        self.relationship = relationship;
        self
    }

    pub(crate) fn set_param(&mut self, name: &str, value: String) {
        self.params.insert(name.to_string(), value);
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.param("id")
    }

    pub fn related_id(&self) -> Option<&str> {
        self.param("related_id")
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.param("parent_id")
    }

    pub fn relationship(&self) -> Option<&str> {
        self.relationship.as_deref()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.extras.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }

    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }
}
