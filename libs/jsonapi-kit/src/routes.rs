//! Named route table used to build `self`/`related` links and pagination URLs.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Typing of an id path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdMask {
    #[default]
    Str,
    Int,
    Float,
    Uuid,
    /// Matches the remainder of the path, slashes included.
    Path,
}

impl IdMask {
    pub fn matches(self, value: &str) -> bool {
        match self {
            IdMask::Str => !value.is_empty() && !value.contains('/'),
            IdMask::Int => is_digits(value),
            IdMask::Float => match value.split_once('.') {
                Some((int, frac)) => is_digits(int) && is_digits(frac),
                None => is_digits(value),
            },
            IdMask::Uuid => is_hyphenated_lowercase_uuid(value),
            IdMask::Path => true,
        }
    }

    /// JSON Schema type used for the OpenAPI path parameter.
    pub fn openapi_type(self) -> &'static str {
        match self {
            IdMask::Int => "integer",
            IdMask::Float => "number",
            IdMask::Str | IdMask::Uuid | IdMask::Path => "string",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IdMask::Str => "str",
            IdMask::Int => "int",
            IdMask::Float => "float",
            IdMask::Uuid => "uuid",
            IdMask::Path => "path",
        }
    }

    /// Router segment capturing a parameter with this mask.
    pub(crate) fn segment(self, name: &str) -> String {
        match self {
            IdMask::Path => format!("{{*{name}}}"),
            _ => format!("{{{name}}}"),
        }
    }
}

/// Only the canonical `8-4-4-4-12` lowercase form routes; braced, simple and
/// uppercase spellings do not.
fn is_hyphenated_lowercase_uuid(value: &str) -> bool {
    value.len() == 36
        && !value.bytes().any(|b| b.is_ascii_uppercase())
        && uuid::Uuid::try_parse(value).is_ok()
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("route '{name}' not found")]
    RouteNotFound { name: String },
    #[error("route '{name}' requires parameter '{param}'")]
    MissingParam { name: String, param: String },
    #[error("route '{name}' parameter '{param}': invalid value '{value}'")]
    InvalidParam {
        name: String,
        param: String,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Param { name: String, mask: IdMask },
}

/// Path template such as `/api/users/{id}` with typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    template: String,
    parts: Vec<Part>,
}

impl RoutePattern {
    /// Parse a router template. Parameters not listed in `masks` are plain strings.
    pub fn parse(template: &str, masks: &HashMap<String, IdMask>) -> Self {
        let mut parts = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|c| open + c) else {
                break;
            };
            if open > 0 {
                parts.push(Part::Literal(rest[..open].to_string()));
            }
            let name = rest[open + 1..close].trim_start_matches('*').to_string();
            let mask = masks.get(&name).copied().unwrap_or_default();
            parts.push(Part::Param { name, mask });
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }
        Self {
            template: template.to_string(),
            parts,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// `(name, mask)` of every parameter, in path order.
    pub fn params(&self) -> impl Iterator<Item = (&str, IdMask)> {
        self.parts.iter().filter_map(|p| match p {
            Part::Param { name, mask } => Some((name.as_str(), *mask)),
            Part::Literal(_) => None,
        })
    }
}

/// Route name -> pattern. Populated once while resources register, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, RoutePattern>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the name was already taken; the first registration stays.
    pub fn register(&mut self, name: impl Into<String>, pattern: RoutePattern) -> bool {
        let name = name.into();
        if self.routes.contains_key(&name) {
            return false;
        }
        self.routes.insert(name, pattern);
        true
    }

    pub fn get(&self, name: &str) -> Option<&RoutePattern> {
        self.routes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Build the path of a named route. Extra parameters are ignored.
    pub fn url_path_for(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, UrlError> {
        let pattern = self.routes.get(name).ok_or_else(|| UrlError::RouteNotFound {
            name: name.to_string(),
        })?;

        let mut path = String::with_capacity(pattern.template.len());
        for part in &pattern.parts {
            match part {
                Part::Literal(s) => path.push_str(s),
                Part::Param { name: param, mask } => {
                    let value = params.get(param).ok_or_else(|| UrlError::MissingParam {
                        name: name.to_string(),
                        param: param.clone(),
                    })?;
                    if !mask.matches(value) {
                        return Err(UrlError::InvalidParam {
                            name: name.to_string(),
                            param: param.clone(),
                            value: value.clone(),
                        });
                    }
                    if *mask == IdMask::Path {
                        path.push_str(value);
                    } else {
                        path.push_str(&urlencoding::encode(value));
                    }
                }
            }
        }
        Ok(path)
    }
}

/// Replace `<attr>` placeholders in route kwargs with members of `obj`.
/// A placeholder naming a missing or null member is dropped.
pub fn resolve_params(
    kwargs: &BTreeMap<String, String>,
    obj: Option<&Value>,
) -> BTreeMap<String, String> {
    kwargs
        .iter()
        .filter_map(|(key, value)| {
            let resolved = match value
                .strip_prefix('<')
                .and_then(|rest| rest.strip_suffix('>'))
            {
                Some(attr) => scalar_to_string(obj?.get(attr)?)?,
                None => value.clone(),
            };
            Some((key.clone(), resolved))
        })
        .collect()
}

/// String form of a JSON scalar used as an id or path parameter.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Resolves route names into links, prefixed with the application's `url_prefix`.
#[derive(Debug, Clone, Copy)]
pub struct LinkBuilder<'a> {
    routes: &'a RouteTable,
    url_prefix: &'a str,
}

impl<'a> LinkBuilder<'a> {
    pub fn new(routes: &'a RouteTable, url_prefix: &'a str) -> Self {
        Self { routes, url_prefix }
    }

    pub fn routes(&self) -> &'a RouteTable {
        self.routes
    }

    pub fn url_prefix(&self) -> &'a str {
        self.url_prefix
    }

    /// Link for `route` with `<attr>` placeholders resolved against `obj`.
    ///
    /// No route name means no link. A route that cannot be resolved is logged and
    /// omitted as well.
    pub fn link(
        &self,
        route: Option<&str>,
        kwargs: &BTreeMap<String, String>,
        obj: Option<&Value>,
    ) -> Option<String> {
        let route = route?;
        let params = resolve_params(kwargs, obj);
        match self.routes.url_path_for(route, &params) {
            Ok(path) => Some(format!("{}{}", self.url_prefix, path)),
            Err(err) => {
                tracing::warn!(route, error = %err, "could not resolve link");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn masks_match_like_path_converters() {
        assert!(IdMask::Str.matches("abc"));
        assert!(!IdMask::Str.matches("a/b"));
        assert!(IdMask::Int.matches("42"));
        assert!(!IdMask::Int.matches("-1"));
        assert!(!IdMask::Int.matches("4.2"));
        assert!(IdMask::Float.matches("4.2"));
        assert!(IdMask::Float.matches("4"));
        assert!(!IdMask::Float.matches("4."));
        assert!(IdMask::Uuid.matches("67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(!IdMask::Uuid.matches("nope"));
        assert!(!IdMask::Uuid.matches("67E55044-10B1-426F-9247-BB680E5FE0C8"));
        assert!(!IdMask::Uuid.matches("67e5504410b1426f9247bb680e5fe0c8"));
        assert!(!IdMask::Uuid.matches("{67e55044-10b1-426f-9247-bb680e5fe0c8}"));
        assert!(IdMask::Path.matches("a/b/c"));
    }

    #[test]
    fn openapi_types_follow_masks() {
        assert_eq!(IdMask::Int.openapi_type(), "integer");
        assert_eq!(IdMask::Float.openapi_type(), "number");
        assert_eq!(IdMask::Uuid.openapi_type(), "string");
        assert_eq!(IdMask::Str.openapi_type(), "string");
    }

    #[test]
    fn url_path_for_substitutes_and_validates() {
        let mut masks = HashMap::new();
        masks.insert("id".to_string(), IdMask::Int);
        let mut table = RouteTable::new();
        assert!(table.register(
            "articles:get",
            RoutePattern::parse("/api/articles/{id}", &masks)
        ));
        assert!(table.register(
            "articles:get_many",
            RoutePattern::parse("/api/articles/", &masks)
        ));
        assert!(!table.register(
            "articles:get",
            RoutePattern::parse("/other/{id}", &masks)
        ));

        assert_eq!(
            table.url_path_for("articles:get", &params(&[("id", "7")])).unwrap(),
            "/api/articles/7"
        );
        assert_eq!(
            table.url_path_for("articles:get_many", &params(&[])).unwrap(),
            "/api/articles/"
        );
        assert!(matches!(
            table.url_path_for("articles:get", &params(&[])),
            Err(UrlError::MissingParam { .. })
        ));
        assert!(matches!(
            table.url_path_for("articles:get", &params(&[("id", "x")])),
            Err(UrlError::InvalidParam { .. })
        ));
        assert!(matches!(
            table.url_path_for("nope", &params(&[])),
            Err(UrlError::RouteNotFound { .. })
        ));
    }

    #[test]
    fn string_params_are_percent_encoded() {
        let mut table = RouteTable::new();
        table.register("a:get", RoutePattern::parse("/a/{id}", &HashMap::new()));
        assert_eq!(
            table.url_path_for("a:get", &params(&[("id", "x y")])).unwrap(),
            "/a/x%20y"
        );
        assert_eq!(
            table.url_path_for("a:get", &params(&[("id", "a/b?c=é~_.-")])).unwrap(),
            "/a/a%2Fb%3Fc%3D%C3%A9~_.-"
        );
    }

    #[test]
    fn placeholders_resolve_against_the_object() {
        let mut kwargs = BTreeMap::new();
        kwargs.insert("id".to_string(), "<user_id>".to_string());
        kwargs.insert("version".to_string(), "v1".to_string());
        let obj = serde_json::json!({"user_id": 12});
        let resolved = resolve_params(&kwargs, Some(&obj));
        assert_eq!(resolved, params(&[("id", "12"), ("version", "v1")]));

        let missing = resolve_params(&kwargs, Some(&serde_json::json!({})));
        assert_eq!(missing, params(&[("version", "v1")]));
    }

    #[test]
    fn link_builder_omits_unresolvable_links() {
        let mut table = RouteTable::new();
        table.register("users:get", RoutePattern::parse("/users/{id}", &HashMap::new()));
        let links = LinkBuilder::new(&table, "http://testserver");
        let mut kwargs = BTreeMap::new();
        kwargs.insert("id".to_string(), "<id>".to_string());
        let obj = serde_json::json!({"id": "7"});

        assert_eq!(
            links.link(Some("users:get"), &kwargs, Some(&obj)).as_deref(),
            Some("http://testserver/users/7")
        );
        assert_eq!(links.link(None, &kwargs, Some(&obj)), None);
        assert_eq!(links.link(Some("missing"), &kwargs, Some(&obj)), None);
        assert_eq!(links.link(Some("users:get"), &BTreeMap::new(), Some(&obj)), None);
    }

    #[test]
    fn catch_all_params_keep_slashes() {
        let mut masks = HashMap::new();
        masks.insert("id".to_string(), IdMask::Path);
        let pattern = RoutePattern::parse("/files/{*id}", &masks);
        assert_eq!(pattern.params().collect::<Vec<_>>(), vec![("id", IdMask::Path)]);

        let mut table = RouteTable::new();
        table.register("files:get", pattern);
        assert_eq!(
            table.url_path_for("files:get", &params(&[("id", "a/b")])).unwrap(),
            "/files/a/b"
        );
    }
}
