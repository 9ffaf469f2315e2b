//! Declarative document queries.
//!
//! A [`Query`] renders to the remote service's filter/projection language with
//! bound parameters, and evaluates directly against raw local documents, so
//! both backends answer the same question.

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// Equality condition on a (possibly dotted) field path.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field path, e.g. `email` or `slug.current`.
    pub field: String,
    /// Value the field must equal.
    pub value: Value,
    /// Compare strings trimmed and lowercased.
    pub ignore_case: bool,
}

impl Filter {
    fn matches(&self, doc: &Value) -> bool {
        let actual = field(doc, &self.field);
        if !self.ignore_case {
            return actual == Some(&self.value);
        }
        match (actual.and_then(Value::as_str), self.value.as_str()) {
            (Some(actual), Some(expected)) => {
                actual.trim().to_lowercase() == expected.trim().to_lowercase()
            }
            _ => false,
        }
    }
}

/// Sort order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Field path to sort by.
    pub field: String,
    /// Sort descending when `true`.
    pub descending: bool,
}

/// A typed query over documents of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    doc_type: String,
    filters: Vec<Filter>,
    projection: Option<String>,
    order: Option<Order>,
    limit: Option<usize>,
}

impl Query {
    /// All documents of `doc_type`.
    #[must_use]
    pub fn documents(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            filters: Vec::new(),
            projection: None,
            order: None,
            limit: None,
        }
    }

    /// The single document of `doc_type` with the given `_id`.
    #[must_use]
    pub fn by_id(doc_type: impl Into<String>, id: &str) -> Self {
        Self::documents(doc_type).filter_eq("_id", id).limit(1)
    }

    /// Require `field == value`.
    #[must_use]
    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            value: value.into(),
            ignore_case: false,
        });
        self
    }

    /// Require `field` to equal `value` ignoring case and surrounding
    /// whitespace.
    #[must_use]
    pub fn filter_eq_ignore_case(mut self, field: impl Into<String>, value: &str) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            value: Value::String(value.trim().to_lowercase()),
            ignore_case: true,
        });
        self
    }

    /// Remote projection, e.g. `{..., group->}`. Ignored by local evaluation.
    #[must_use]
    pub fn project(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    /// Sort by `field`.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order = Some(Order {
            field: field.into(),
            descending,
        });
        self
    }

    /// Return at most `n` documents.
    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Document type this query targets.
    #[must_use]
    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    /// Equality filters in declaration order.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    #[must_use]
    pub const fn max_results(&self) -> Option<usize> {
        self.limit
    }

    /// Render to query text plus parameters.
    ///
    /// Values are always bound as `$type`, `$p0`, `$p1`, ... and never
    /// interpolated into the query text.
    #[must_use]
    pub fn to_remote(&self) -> (String, Map<String, Value>) {
        let mut params = Map::new();
        params.insert("type".to_owned(), Value::String(self.doc_type.clone()));

        let mut conditions = vec!["_type == $type".to_owned()];
        for (i, filter) in self.filters.iter().enumerate() {
            let name = format!("p{i}");
            if filter.ignore_case {
                conditions.push(format!("lower({}) == ${name}", filter.field));
            } else {
                conditions.push(format!("{} == ${name}", filter.field));
            }
            params.insert(name, filter.value.clone());
        }

        let mut text = format!("*[{}]", conditions.join(" && "));
        if let Some(order) = &self.order {
            let direction = if order.descending { "desc" } else { "asc" };
            text.push_str(&format!(" | order({} {direction})", order.field));
        }
        if let Some(limit) = self.limit {
            text.push_str(&format!("[0...{limit}]"));
        }
        if let Some(projection) = &self.projection {
            text.push(' ');
            text.push_str(projection);
        }

        (text, params)
    }

    /// Whether a raw document satisfies the type and every filter.
    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        doc.get("_type").and_then(Value::as_str) == Some(self.doc_type.as_str())
            && self
                .filters
                .iter()
                .all(|f| f.matches(doc))
    }

    /// Evaluate against raw documents: filter, sort, then limit.
    #[must_use]
    pub fn apply(&self, docs: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut matched: Vec<Value> = docs.into_iter().filter(|d| self.matches(d)).collect();

        if let Some(order) = &self.order {
            matched.sort_by(|a, b| {
                let ord = compare(field(a, &order.field), field(b, &order.field));
                if order.descending { ord.reverse() } else { ord }
            });
        }
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }

        matched
    }
}

/// Resolve a dotted path inside a document.
fn field<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, key| value.get(key))
}

/// Missing sorts first; mismatched kinds compare equal.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_remote_binds_parameters() {
        let query = Query::documents("account")
            .filter_eq("email", "a@ex.com")
            .filter_eq("active", true)
            .limit(1);

        let (text, params) = query.to_remote();
        assert_eq!(
            text,
            "*[_type == $type && email == $p0 && active == $p1][0...1]"
        );
        assert_eq!(params["type"], json!("account"));
        assert_eq!(params["p0"], json!("a@ex.com"));
        assert_eq!(params["p1"], json!(true));
    }

    #[test]
    fn test_case_insensitive_filter() {
        let query = Query::documents("account").filter_eq_ignore_case("email", " A@Ex.com");

        let (text, params) = query.to_remote();
        assert_eq!(text, "*[_type == $type && lower(email) == $p0]");
        assert_eq!(params["p0"], json!("a@ex.com"));

        assert!(query.matches(&json!({"_type": "account", "email": "a@ex.com"})));
        assert!(query.matches(&json!({"_type": "account", "email": " A@EX.COM "})));
        assert!(!query.matches(&json!({"_type": "account", "email": "b@ex.com"})));
        assert!(!query.matches(&json!({"_type": "account"})));

        let exact = Query::documents("account").filter_eq("email", "a@ex.com");
        assert!(!exact.matches(&json!({"_type": "account", "email": "A@Ex.com"})));
    }

    #[test]
    fn test_to_remote_order_and_projection() {
        let (text, _) = Query::documents("product")
            .order_by("title", false)
            .project("{..., group->}")
            .to_remote();
        assert_eq!(text, "*[_type == $type] | order(title asc) {..., group->}");
    }

    #[test]
    fn test_apply_filters_on_dotted_paths() {
        let docs = vec![
            json!({"_type": "product", "_id": "a", "slug": {"current": "chair"}}),
            json!({"_type": "product", "_id": "b", "slug": {"current": "table"}}),
            json!({"_type": "page", "_id": "c", "slug": {"current": "chair"}}),
        ];

        let found = Query::documents("product")
            .filter_eq("slug.current", "chair")
            .apply(docs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["_id"], "a");
    }

    #[test]
    fn test_apply_orders_and_limits() {
        let docs = vec![
            json!({"_type": "product", "title": "b"}),
            json!({"_type": "product"}),
            json!({"_type": "product", "title": "a"}),
        ];

        let titles: Vec<Value> = Query::documents("product")
            .order_by("title", true)
            .limit(2)
            .apply(docs)
            .into_iter()
            .map(|d| d["title"].clone())
            .collect();
        assert_eq!(titles, vec![json!("b"), json!("a")]);
    }
}
