//! Structured read queries.
//!
//! Queries are data, not strings: backends evaluate them directly and the
//! rendered SQL-like form only ever reaches logs. Large id lists are split
//! across several queries so that no rendered query exceeds a length limit.

use std::collections::HashSet;
use std::fmt;

use crate::model::{FieldValue, Record};

/// Default upper bound on a rendered query, in characters.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 4000;

/// Membership filter: `field IN (values)`.
#[derive(Debug, Clone, PartialEq)]
pub struct InFilter {
    pub field: String,
    pub values: Vec<String>,
}

/// Equality filter: `field = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub value: FieldValue,
}

impl Condition {
    #[must_use]
    pub fn eq(field: &str, value: impl Into<FieldValue>) -> Self {
        Self { field: field.to_string(), value: value.into() }
    }

    fn matches(&self, record: &Record) -> bool {
        match (record.get(&self.field), &self.value) {
            (Some(actual), expected) => actual == expected,
            (None, FieldValue::Null) => true,
            (None, _) => false,
        }
    }
}

/// A read against one object.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub object: String,
    /// Selected fields; empty selects every field.
    pub fields: Vec<String>,
    pub filter: Option<InFilter>,
    pub condition: Option<Condition>,
}

impl Query {
    /// Select every record (and every field) of an object.
    #[must_use]
    pub fn all(object: &str) -> Self {
        Self { object: object.to_string(), fields: Vec::new(), filter: None, condition: None }
    }

    /// Restrict to selected fields.
    #[must_use]
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.fields = distinct_fields(fields);
        self
    }

    /// Add an equality condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Whether a record satisfies the filters.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let in_ok = self.filter.as_ref().is_none_or(|f| {
            record
                .key(&f.field)
                .is_some_and(|value| f.values.iter().any(|v| *v == value))
        });
        in_ok && self.condition.as_ref().is_none_or(|c| c.matches(record))
    }

    /// Apply the field selection.
    #[must_use]
    pub fn project(&self, record: &Record) -> Record {
        record.project(&self.fields)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = if self.fields.is_empty() { "*".to_string() } else { self.fields.join(", ") };
        write!(f, "SELECT {fields} FROM {}", self.object)?;

        let mut clauses = Vec::new();
        if let Some(filter) = &self.filter {
            clauses.push(format!("{} IN ({})", filter.field, quote_list(&filter.values)));
        }
        if let Some(condition) = &self.condition {
            clauses.push(format!("{} = {}", condition.field, condition.value));
        }
        if !clauses.is_empty() {
            write!(f, " WHERE {}", clauses.join(" AND "))?;
        }
        Ok(())
    }
}

fn quote_list(values: &[String]) -> String {
    values.iter().map(|v| quoted(v)).collect::<Vec<_>>().join(",")
}

fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "\\'"))
}

fn distinct_fields(fields: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    fields
        .iter()
        .filter(|f| seen.insert(**f))
        .map(|f| (*f).to_string())
        .collect()
}

/// Build the queries needed to read every record of `object` whose
/// `key_field` is one of `values`.
///
/// Duplicate values and fields are dropped. Values are packed into as few
/// queries as possible while keeping each rendered query within
/// `max_query_length` characters; a single value longer than the budget
/// still gets its own query. No values means no queries.
#[must_use]
pub fn build_in_queries(
    fields: &[&str],
    key_field: &str,
    object: &str,
    values: &[String],
    condition: Option<Condition>,
    max_query_length: usize,
) -> Vec<Query> {
    let mut seen = HashSet::new();
    let values: Vec<&String> = values.iter().filter(|v| seen.insert(v.as_str())).collect();
    if values.is_empty() {
        return Vec::new();
    }

    let template = Query {
        object: object.to_string(),
        fields: distinct_fields(fields),
        filter: Some(InFilter { field: key_field.to_string(), values: Vec::new() }),
        condition,
    };
    let base_len = template.to_string().len();

    let mut queries = Vec::new();
    let mut chunk: Vec<String> = Vec::new();
    let mut chunk_len = base_len;

    for value in values {
        // rendered value plus the separating comma
        let cost = quoted(value).len() + 1;
        if !chunk.is_empty() && chunk_len + cost > max_query_length {
            queries.push(with_values(&template, std::mem::take(&mut chunk)));
            chunk_len = base_len;
        }
        chunk.push(value.clone());
        chunk_len += cost;
    }
    if !chunk.is_empty() {
        queries.push(with_values(&template, chunk));
    }

    queries
}

fn with_values(template: &Query, values: Vec<String>) -> Query {
    let mut query = template.clone();
    if let Some(filter) = query.filter.as_mut() {
        filter.values = values;
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("001{i:015}")).collect()
    }

    #[test]
    fn test_render() {
        let query = build_in_queries(
            &["Id", "Title", "Id"],
            "ContentDocumentId",
            "ContentVersion",
            &["a".to_string(), "b".to_string()],
            Some(Condition::eq("IsLatest", true)),
            DEFAULT_MAX_QUERY_LENGTH,
        );
        assert_eq!(query.len(), 1);
        assert_eq!(
            query[0].to_string(),
            "SELECT Id, Title FROM ContentVersion WHERE ContentDocumentId IN ('a','b') AND IsLatest = true"
        );
    }

    #[test]
    fn test_chunks_respect_length_limit() {
        let values = ids(500);
        let queries = build_in_queries(&["Id"], "LinkedEntityId", "ContentDocumentLink", &values, None, 1000);

        assert!(queries.len() > 1);
        for query in &queries {
            assert!(query.to_string().len() <= 1000, "{}", query.to_string().len());
        }
        let total: usize = queries
            .iter()
            .map(|q| q.filter.as_ref().map_or(0, |f| f.values.len()))
            .sum();
        assert_eq!(total, 500);
    }

    #[test]
    fn test_chunks_count_escaped_quotes() {
        let values: Vec<String> = (0..200).map(|i| format!("O'Brien's file {i:03}")).collect();
        let queries = build_in_queries(&["Id"], "Title", "ContentVersion", &values, None, 300);

        assert!(queries.len() > 1);
        for query in &queries {
            let rendered = query.to_string();
            assert!(rendered.len() <= 300, "{} > 300: {rendered}", rendered.len());
        }
        let total: usize = queries
            .iter()
            .map(|q| q.filter.as_ref().map_or(0, |f| f.values.len()))
            .sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn test_no_values_no_queries() {
        assert!(build_in_queries(&["Id"], "Id", "Account", &[], None, 100).is_empty());
    }

    #[test]
    fn test_duplicate_values_are_dropped() {
        let values = vec!["a".to_string(), "a".to_string(), "b".to_string()];
        let queries = build_in_queries(&["Id"], "Id", "Account", &values, None, 100);
        assert_eq!(queries[0].filter.as_ref().unwrap().values, vec!["a", "b"]);
    }

    #[test]
    fn test_matches_and_project() {
        let query = Query {
            object: "ContentVersion".into(),
            fields: vec!["Id".into()],
            filter: Some(InFilter { field: "ContentDocumentId".into(), values: vec!["D1".into()] }),
            condition: Some(Condition::eq("IsLatest", true)),
        };
        let latest = Record::new().with("Id", "V2").with("ContentDocumentId", "D1").with("IsLatest", true);
        let old = Record::new().with("Id", "V1").with("ContentDocumentId", "D1").with("IsLatest", false);
        let other = Record::new().with("Id", "V3").with("ContentDocumentId", "D2").with("IsLatest", true);

        assert!(query.matches(&latest));
        assert!(!query.matches(&old));
        assert!(!query.matches(&other));
        assert_eq!(query.project(&latest), Record::new().with("Id", "V2"));
    }
}
