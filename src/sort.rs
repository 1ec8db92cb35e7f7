//! Projection and ordering of people records.

use std::cmp::Ordering;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Sort field for the people collection. Anything the caller sends that is
/// not an exact match falls back to `Name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    Height,
    Mass,
}

impl SortKey {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("name") | None => SortKey::Name,
            Some("height") => SortKey::Height,
            Some("mass") => SortKey::Mass,
            Some(_) => SortKey::Name,
        }
    }
}

/// Sortable projection of an upstream person record. Upstream reports
/// height and mass as strings ("172", "77", "unknown") and may omit them.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PersonRecord {
    pub name: String,
    pub height: Option<String>,
    pub mass: Option<String>,
}

impl PersonRecord {
    /// Project a raw found record. Returns `None` for records that do not
    /// fit the shape (a found record always carries a name).
    pub fn from_record(record: Map<String, Value>) -> Option<Self> {
        serde_json::from_value(Value::Object(record)).ok()
    }
}

/// Stable ascending sort by the chosen key. Comparison is lexicographic
/// over the upstream's string representation; records missing the field
/// sort last.
pub fn sort_people(people: &mut [PersonRecord], key: SortKey) {
    match key {
        SortKey::Name => people.sort_by(|a, b| a.name.cmp(&b.name)),
        SortKey::Height => {
            people.sort_by(|a, b| cmp_absent_last(a.height.as_deref(), b.height.as_deref()))
        }
        SortKey::Mass => {
            people.sort_by(|a, b| cmp_absent_last(a.mass.as_deref(), b.mass.as_deref()))
        }
    }
}

fn cmp_absent_last(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Final response projection: names only.
pub fn into_names(people: Vec<PersonRecord>) -> Vec<String> {
    people.into_iter().map(|person| person.name).collect()
}
