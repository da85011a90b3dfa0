//! Compound-document (`include`) and sparse-fieldset (`fields[type]`) query parameters.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::error::JsonApiError;
use crate::request::JsonApiRequest;

/// Resource type -> fields to keep.
pub type SparseFields = BTreeMap<String, Vec<String>>;

/// Relation paths requested through `include=a,b.c`; `None` when absent or empty.
pub fn parse_included_params(request: &JsonApiRequest) -> Option<BTreeSet<String>> {
    let include = request.query_param("include")?;
    let relations: BTreeSet<String> = include
        .split(',')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    (!relations.is_empty()).then_some(relations)
}

/// Collect `fields[<type>]=a,b` parameters.
///
/// An empty type name, an empty value or an empty element in the list is rejected.
pub fn parse_sparse_fields_params(request: &JsonApiRequest) -> Result<SparseFields, JsonApiError> {
    let mut sparse = SparseFields::new();
    for (name, value) in request.query_pairs() {
        let Some(inner) = name
            .strip_prefix("fields[")
            .filter(|rest| rest.ends_with(']'))
        else {
            continue;
        };
        let resource_type = inner.split(']').next().unwrap_or_default();
        if resource_type.is_empty() || value.is_empty() || value.split(',').any(str::is_empty) {
            return Err(JsonApiError::bad_request("Incorrect sparse fields request."));
        }
        sparse.insert(
            resource_type.to_string(),
            value.split(',').map(str::to_string).collect(),
        );
    }
    Ok(sparse)
}

/// Drop attributes and relationships not named in `fields`.
/// A block left empty is removed instead of being kept as `{}`.
pub fn filter_sparse_fields(item: &mut Map<String, Value>, fields: &[String]) {
    for block in ["attributes", "relationships"] {
        let Some(Value::Object(members)) = item.get_mut(block) else {
            continue;
        };
        members.retain(|name, _| fields.iter().any(|f| f == name));
        if members.is_empty() {
            item.remove(block);
        }
    }
}

/// Apply sparse fieldsets to `data` and `included` of a serialized document.
pub fn process_sparse_fields(document: &mut Value, sparse: &SparseFields) {
    if sparse.is_empty() {
        return;
    }
    let Some(doc) = document.as_object_mut() else {
        return;
    };

    match doc.get_mut("data") {
        Some(Value::Array(items)) => items.iter_mut().for_each(|item| filter_item(item, sparse)),
        Some(item @ Value::Object(_)) => filter_item(item, sparse),
        _ => return,
    }

    if let Some(Value::Array(included)) = doc.get_mut("included") {
        included
            .iter_mut()
            .for_each(|item| filter_item(item, sparse));
    }
}

fn filter_item(item: &mut Value, sparse: &SparseFields) {
    let Some(obj) = item.as_object_mut() else {
        return;
    };
    let fields = obj
        .get("type")
        .and_then(Value::as_str)
        .and_then(|t| sparse.get(t));
    if let Some(fields) = fields {
        filter_sparse_fields(obj, fields);
    }
}

/// Nested view of requested relation paths: `a.b,a.c,d` becomes `{a: {b, c}, d}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeTree {
    children: BTreeMap<String, IncludeTree>,
}

impl IncludeTree {
    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut root = Self::default();
        for path in paths {
            let mut node = &mut root;
            for segment in path.split('.').filter(|s| !s.is_empty()) {
                node = node.children.entry(segment.to_string()).or_default();
            }
        }
        root
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn contains(&self, relation: &str) -> bool {
        self.children.contains_key(relation)
    }

    pub fn child(&self, relation: &str) -> Option<&IncludeTree> {
        self.children.get(relation)
    }
}
