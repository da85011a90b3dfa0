//! Pagination strategies: page-number, offset and cursor.
//!
//! A strategy turns the page parameters of a request into a slice of the data and a
//! `links` object. Links reuse the request path, keep unrelated query parameters and
//! replace the page parameters.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::JsonApiError;
use crate::request::JsonApiRequest;

/// Sliced data plus navigation links.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    pub data: Vec<Value>,
    pub links: PaginationLinks,
}

/// `first` and `last` are always set; `next`/`prev` are `None` when there is no such page.
/// All four keys are serialized, absent ones as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaginationLinks {
    pub first: Option<String>,
    pub next: Option<String>,
    pub prev: Option<String>,
    pub last: Option<String>,
}

impl PaginationLinks {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// What a strategy sees of the request being paginated.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub request: &'a JsonApiRequest,
    /// Prepended to the request path in generated links.
    pub url_prefix: &'a str,
    /// Free-form arguments forwarded by the handler.
    pub kwargs: &'a Map<String, Value>,
}

impl PageRequest<'_> {
    fn param(&self, name: &str) -> Option<&str> {
        self.request.query_param(name)
    }

    /// Link to the current path with `page` replacing every `page[...]` parameter.
    pub fn link(&self, page: &[(&str, String)]) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in self.request.query_pairs() {
            if !name.starts_with("page[") {
                query.append_pair(name, value);
            }
        }
        for (name, value) in page {
            query.append_pair(name, value);
        }
        format!(
            "{}{}?{}",
            self.url_prefix,
            self.request.path(),
            query.finish()
        )
    }
}

pub trait Paginator: Send + Sync {
    fn paginate(&self, page: &PageRequest<'_>, data: Vec<Value>) -> Result<Pagination, JsonApiError>;
}

fn parse_page_size(
    page: &PageRequest<'_>,
    default: usize,
    max: usize,
) -> Result<usize, JsonApiError> {
    let Some(raw) = page.param("page[size]") else {
        return Ok(default.clamp(1, max.max(1)));
    };
    match raw.trim().parse::<i64>() {
        Ok(size) if size >= 1 => Ok((size as usize).min(max.max(1))),
        _ => Err(JsonApiError::pagination(format!(
            "page[size] must be a positive integer; got {raw}"
        ))),
    }
}

/// Non-numeric values are rejected, negative ones fall back to `default`.
fn parse_position(
    page: &PageRequest<'_>,
    name: &str,
    default: usize,
) -> Result<usize, JsonApiError> {
    let Some(raw) = page.param(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<i64>() {
        Ok(value) if value >= 0 => Ok(value as usize),
        Ok(_) => Ok(default),
        Err(_) => Err(JsonApiError::pagination(format!(
            "{name} must be an integer; got {raw}"
        ))),
    }
}

/// `page[number]` / `page[size]`.
#[derive(Debug, Clone)]
pub struct PageNumberPaginator {
    pub default_page_number: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PageNumberPaginator {
    fn default() -> Self {
        Self {
            default_page_number: 1,
            default_page_size: 50,
            max_page_size: 100,
        }
    }
}

impl PageNumberPaginator {
    pub fn with_page_size(mut self, default_page_size: usize) -> Self {
        self.default_page_size = default_page_size;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    fn link(page: &PageRequest<'_>, number: usize, size: usize) -> String {
        page.link(&[
            ("page[number]", number.to_string()),
            ("page[size]", size.to_string()),
        ])
    }
}

impl Paginator for PageNumberPaginator {
    fn paginate(&self, page: &PageRequest<'_>, data: Vec<Value>) -> Result<Pagination, JsonApiError> {
        let size = parse_page_size(page, self.default_page_size, self.max_page_size)?;
        let mut number = parse_position(page, "page[number]", self.default_page_number)?;
        if number == 0 {
            number = self.default_page_number.max(1);
        }

        let total = data.len();
        let last = total.div_ceil(size).max(1);
        let start = (number - 1).saturating_mul(size);
        let sliced: Vec<Value> = data.into_iter().skip(start).take(size).collect();

        let links = PaginationLinks {
            first: Some(Self::link(page, 1, size)),
            next: (number < last).then(|| Self::link(page, number + 1, size)),
            prev: (number > 1).then(|| Self::link(page, number - 1, size)),
            last: Some(Self::link(page, last, size)),
        };
        Ok(Pagination {
            data: sliced,
            links,
        })
    }
}

/// `page[offset]` / `page[size]`.
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    pub default_page_offset: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for OffsetPaginator {
    fn default() -> Self {
        Self {
            default_page_offset: 0,
            default_page_size: 50,
            max_page_size: 100,
        }
    }
}

impl OffsetPaginator {
    pub fn with_page_size(mut self, default_page_size: usize) -> Self {
        self.default_page_size = default_page_size;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    fn link(page: &PageRequest<'_>, offset: usize, size: usize) -> String {
        page.link(&[
            ("page[offset]", offset.to_string()),
            ("page[size]", size.to_string()),
        ])
    }
}

impl Paginator for OffsetPaginator {
    fn paginate(&self, page: &PageRequest<'_>, data: Vec<Value>) -> Result<Pagination, JsonApiError> {
        let size = parse_page_size(page, self.default_page_size, self.max_page_size)?;
        let offset = parse_position(page, "page[offset]", self.default_page_offset)?;

        let total = data.len();
        let last = total.div_ceil(size).saturating_sub(1) * size;
        let sliced: Vec<Value> = data.into_iter().skip(offset).take(size).collect();

        let links = PaginationLinks {
            first: Some(Self::link(page, 0, size)),
            next: (offset + size < total).then(|| Self::link(page, offset + size, size)),
            prev: (offset > 0).then(|| Self::link(page, offset.saturating_sub(size), size)),
            last: Some(Self::link(page, last, size)),
        };
        Ok(Pagination {
            data: sliced,
            links,
        })
    }
}

/// Maps items to opaque cursors. Items are expected in cursor order.
pub trait CursorSource: Send + Sync {
    fn cursor(&self, item: &Value) -> Option<String>;

    /// Index range of the page: items strictly after `after` and strictly before `before`,
    /// at most `size` of them. Unknown cursors are ignored.
    fn slice(
        &self,
        data: &[Value],
        after: Option<&str>,
        before: Option<&str>,
        size: usize,
    ) -> std::ops::Range<usize> {
        let position = |cursor: &str| {
            data.iter()
                .position(|item| self.cursor(item).as_deref() == Some(cursor))
        };
        let end = before.and_then(position).unwrap_or(data.len());
        let start = match after.and_then(position) {
            Some(idx) => idx + 1,
            None if after.is_none() && before.is_some() => end.saturating_sub(size),
            None => 0,
        };
        let start = start.min(end);
        start..end.min(start + size)
    }
}

/// Uses the `id` member of each item as its cursor.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdCursor;

impl CursorSource for IdCursor {
    fn cursor(&self, item: &Value) -> Option<String> {
        match item.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// `page[after]` / `page[before]` / `page[size]`.
#[derive(Debug, Clone)]
pub struct CursorPaginator<S = IdCursor> {
    pub source: S,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for CursorPaginator<IdCursor> {
    fn default() -> Self {
        Self::new(IdCursor)
    }
}

impl<S: CursorSource> CursorPaginator<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            default_page_size: 50,
            max_page_size: 100,
        }
    }

    pub fn with_page_size(mut self, default_page_size: usize) -> Self {
        self.default_page_size = default_page_size;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }
}

impl<S: CursorSource> Paginator for CursorPaginator<S> {
    fn paginate(&self, page: &PageRequest<'_>, data: Vec<Value>) -> Result<Pagination, JsonApiError> {
        let size = parse_page_size(page, self.default_page_size, self.max_page_size)?;
        let after = page.param("page[after]");
        let before = page.param("page[before]");
        let range = self.source.slice(&data, after, before, size);

        let size_param = ("page[size]", size.to_string());
        let first = page.link(&[size_param.clone()]);
        let cursor_link = |name: &'static str, idx: usize| {
            self.source
                .cursor(&data[idx])
                .map(|cursor| page.link(&[(name, cursor), size_param.clone()]))
        };

        let next = (range.end < data.len() && range.end > range.start)
            .then(|| cursor_link("page[after]", range.end - 1))
            .flatten();
        let prev = (range.start > 0 && range.start < data.len())
            .then(|| cursor_link("page[before]", range.start))
            .flatten();
        let last = if data.len() > size {
            cursor_link("page[after]", data.len() - size - 1)
        } else {
            None
        }
        .unwrap_or_else(|| first.clone());

        let links = PaginationLinks {
            first: Some(first),
            next,
            prev,
            last: Some(last),
        };
        let sliced = data[range].to_vec();
        Ok(Pagination {
            data: sliced,
            links,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    fn items(n: usize) -> Vec<Value> {
        (1..=n).map(|i| json!({"id": i, "name": "foo"})).collect()
    }

    fn ids(p: &Pagination) -> Vec<i64> {
        p.data.iter().filter_map(|v| v["id"].as_i64()).collect()
    }

    fn run(paginator: &dyn Paginator, uri: &str, n: usize) -> Result<Pagination, JsonApiError> {
        let request = JsonApiRequest::new(Method::GET, uri.parse().unwrap());
        let kwargs = Map::new();
        let page = PageRequest {
            request: &request,
            url_prefix: "http://testserver",
            kwargs: &kwargs,
        };
        paginator.paginate(&page, items(n))
    }

    #[test]
    fn page_number_defaults() {
        let p = run(&PageNumberPaginator::default().with_page_size(2), "/r/", 4).unwrap();
        assert_eq!(ids(&p), vec![1, 2]);
        assert_eq!(
            p.links.next.as_deref(),
            Some("http://testserver/r/?page%5Bnumber%5D=2&page%5Bsize%5D=2")
        );
        assert_eq!(p.links.prev, None);
        assert_eq!(
            p.links.last.as_deref(),
            Some("http://testserver/r/?page%5Bnumber%5D=2&page%5Bsize%5D=2")
        );
    }

    #[test]
    fn page_number_middle_page() {
        let p = run(
            &PageNumberPaginator::default(),
            "/r/?page%5Bnumber%5D=3&page%5Bsize%5D=1",
            4,
        )
        .unwrap();
        assert_eq!(ids(&p), vec![3]);
        assert_eq!(
            p.links.first.as_deref(),
            Some("http://testserver/r/?page%5Bnumber%5D=1&page%5Bsize%5D=1")
        );
        assert_eq!(
            p.links.next.as_deref(),
            Some("http://testserver/r/?page%5Bnumber%5D=4&page%5Bsize%5D=1")
        );
        assert_eq!(
            p.links.prev.as_deref(),
            Some("http://testserver/r/?page%5Bnumber%5D=2&page%5Bsize%5D=1")
        );
    }

    #[test]
    fn page_number_last_link_invariant() {
        for (n, size, expected_last) in [(0, 3, 1), (1, 3, 1), (3, 3, 1), (4, 3, 2), (10, 3, 4)] {
            let uri = format!("/r/?page%5Bsize%5D={size}");
            let p = run(&PageNumberPaginator::default(), &uri, n).unwrap();
            let last = p.links.last.unwrap();
            assert!(
                last.contains(&format!("page%5Bnumber%5D={expected_last}&")),
                "n={n} size={size}: {last}"
            );
            assert_eq!(p.links.next.is_some(), expected_last > 1);
        }
    }

    #[test]
    fn unrelated_query_params_are_kept() {
        let p = run(
            &PageNumberPaginator::default().with_page_size(1),
            "/r/?include=author&page%5Bnumber%5D=2",
            3,
        )
        .unwrap();
        assert_eq!(
            p.links.next.as_deref(),
            Some("http://testserver/r/?include=author&page%5Bnumber%5D=3&page%5Bsize%5D=1")
        );
    }

    #[test]
    fn invalid_page_size_is_rejected() {
        for raw in ["0", "-1", "abc"] {
            let err = run(
                &PageNumberPaginator::default(),
                &format!("/r/?page%5Bsize%5D={raw}"),
                3,
            )
            .unwrap_err();
            assert_eq!(err.detail(), format!("page[size] must be a positive integer; got {raw}"));
        }
    }

    #[test]
    fn page_size_is_capped_and_negative_number_falls_back() {
        let paginator = PageNumberPaginator::default().with_max_page_size(2);
        let p = run(&paginator, "/r/?page%5Bsize%5D=50&page%5Bnumber%5D=-3", 5).unwrap();
        assert_eq!(ids(&p), vec![1, 2]);
        assert!(p.links.first.unwrap().ends_with("page%5Bsize%5D=2"));
    }

    #[test]
    fn offset_links() {
        let p = run(
            &OffsetPaginator::default(),
            "/r/?page%5Boffset%5D=1&page%5Bsize%5D=2",
            5,
        )
        .unwrap();
        assert_eq!(ids(&p), vec![2, 3]);
        assert_eq!(
            p.links.prev.as_deref(),
            Some("http://testserver/r/?page%5Boffset%5D=0&page%5Bsize%5D=2")
        );
        assert_eq!(
            p.links.next.as_deref(),
            Some("http://testserver/r/?page%5Boffset%5D=3&page%5Bsize%5D=2")
        );
        assert_eq!(
            p.links.last.as_deref(),
            Some("http://testserver/r/?page%5Boffset%5D=4&page%5Bsize%5D=2")
        );
    }

    #[test]
    fn cursor_pages_follow_item_ids() {
        let paginator = CursorPaginator::default().with_page_size(2);
        let first = run(&paginator, "/r/", 5).unwrap();
        assert_eq!(ids(&first), vec![1, 2]);
        assert_eq!(
            first.links.next.as_deref(),
            Some("http://testserver/r/?page%5Bafter%5D=2&page%5Bsize%5D=2")
        );
        assert_eq!(first.links.prev, None);
        assert_eq!(
            first.links.last.as_deref(),
            Some("http://testserver/r/?page%5Bafter%5D=3&page%5Bsize%5D=2")
        );

        let second = run(&paginator, "/r/?page%5Bafter%5D=2", 5).unwrap();
        assert_eq!(ids(&second), vec![3, 4]);
        assert_eq!(
            second.links.prev.as_deref(),
            Some("http://testserver/r/?page%5Bbefore%5D=3&page%5Bsize%5D=2")
        );

        let before = run(&paginator, "/r/?page%5Bbefore%5D=3", 5).unwrap();
        assert_eq!(ids(&before), vec![1, 2]);
    }

    #[test]
    fn links_serialize_with_nulls() {
        let links = PaginationLinks {
            first: Some("f".into()),
            last: Some("l".into()),
            ..Default::default()
        };
        assert_eq!(
            links.to_value(),
            json!({"first": "f", "next": null, "prev": null, "last": "l"})
        );
    }
}
