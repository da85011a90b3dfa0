//! Schemas by name and resources by mount name.
//!
//! Both tables are filled while the application is assembled and frozen afterwards.
//! Lookups of unknown keys are errors, never silent `None`s.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::pagination::Paginator;
use crate::routes::IdMask;
use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown schema `{0}`")]
    UnknownSchema(String),
    #[error("a different schema is already registered as `{0}`")]
    DuplicateSchema(String),
    #[error("unknown resource `{0}`")]
    UnknownResource(String),
    #[error("a resource is already registered as `{0}`")]
    DuplicateResource(String),
}

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering the same `Arc` twice is a no-op.
    pub fn register(&mut self, schema: Arc<Schema>) -> Result<(), RegistryError> {
        match self.schemas.get(schema.name()) {
            Some(existing) if Arc::ptr_eq(existing, &schema) => Ok(()),
            Some(_) => Err(RegistryError::DuplicateSchema(schema.name().to_string())),
            None => {
                self.schemas.insert(schema.name().to_string(), schema);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&Arc<Schema>, RegistryError> {
        self.schemas
            .get(name)
            .ok_or_else(|| RegistryError::UnknownSchema(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }
}

/// A resource as mounted on the application.
#[derive(Clone)]
pub struct ResourceBinding {
    pub(crate) name: String,
    pub(crate) type_: String,
    pub(crate) schema: Arc<Schema>,
    pub(crate) id_mask: IdMask,
    pub(crate) mount_path: String,
    pub(crate) pagination: Option<Arc<dyn Paginator>>,
    /// Relationship name -> mount name of the resource serving related objects.
    pub(crate) related: BTreeMap<String, String>,
}

impl fmt::Debug for ResourceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBinding")
            .field("name", &self.name)
            .field("type_", &self.type_)
            .field("schema", &self.schema.name())
            .field("id_mask", &self.id_mask)
            .field("mount_path", &self.mount_path)
            .field("paginated", &self.pagination.is_some())
            .field("related", &self.related)
            .finish()
    }
}

impl ResourceBinding {
    /// Mount name: `register_as` if given, the type otherwise.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn id_mask(&self) -> IdMask {
        self.id_mask
    }

    /// `{base_path}/{type}`, without trailing slash.
    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    pub fn related_resource(&self, relationship: &str) -> Option<&str> {
        self.related.get(relationship).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: HashMap<String, ResourceBinding>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, binding: ResourceBinding) -> Result<(), RegistryError> {
        if self.resources.contains_key(&binding.name) {
            return Err(RegistryError::DuplicateResource(binding.name));
        }
        self.resources.insert(binding.name.clone(), binding);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ResourceBinding, RegistryError> {
        self.resources
            .get(name)
            .ok_or_else(|| RegistryError::UnknownResource(name.to_string()))
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Result<&mut ResourceBinding, RegistryError> {
        self.resources
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownResource(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemas_fail_loudly_on_unknown_names() {
        let mut registry = SchemaRegistry::new();
        let schema = Arc::new(Schema::new("people"));
        registry.register(schema.clone()).unwrap();
        registry.register(schema).unwrap();
        assert_eq!(
            registry.register(Arc::new(Schema::new("people"))).unwrap_err(),
            RegistryError::DuplicateSchema("people".into())
        );
        assert_eq!(
            registry.get("nope").unwrap_err(),
            RegistryError::UnknownSchema("nope".into())
        );
        assert_eq!(registry.get("people").unwrap().type_(), "people");
    }

    #[test]
    fn resources_are_unique_per_mount_name() {
        let binding = ResourceBinding {
            name: "v2-people".into(),
            type_: "people".into(),
            schema: Arc::new(Schema::new("people")),
            id_mask: IdMask::Int,
            mount_path: "/v2/people".into(),
            pagination: None,
            related: BTreeMap::new(),
        };
        let mut registry = ResourceRegistry::new();
        registry.register(binding.clone()).unwrap();
        assert_eq!(
            registry.register(binding).unwrap_err(),
            RegistryError::DuplicateResource("v2-people".into())
        );
        assert_eq!(registry.get("v2-people").unwrap().mount_path(), "/v2/people");
        assert!(registry.get("people").is_err());
    }
}
