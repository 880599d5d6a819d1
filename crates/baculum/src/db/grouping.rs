//! Per-group pagination and overview counting over flat row sets.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use super::executor::{Row, RowExt};
use crate::validation::OrderDirection;

/// Rows bucketed by a key, in order of the key's first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grouped {
    groups: Vec<(String, Vec<Row>)>,
}

impl Grouped {
    pub fn get(&self, key: &str) -> Option<&[Row]> {
        self.groups
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, rows)| rows.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Row])> {
        self.groups.iter().map(|(k, r)| (k.as_str(), r.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// All grouped rows, group after group.
    pub fn into_rows(self) -> Vec<Row> {
        self.groups.into_iter().flat_map(|(_, rows)| rows).collect()
    }

    fn bucket(&mut self, key: &str) -> &mut Vec<Row> {
        let idx = match self.groups.iter().position(|(k, _)| k == key) {
            Some(idx) => idx,
            None => {
                self.groups.push((key.to_string(), Vec::new()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[idx].1
    }
}

impl Serialize for Grouped {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (key, rows) in &self.groups {
            map.serialize_entry(key, rows)?;
        }
        map.end()
    }
}

/// `{<field>: value, "count": n}`
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewEntry {
    pub field: String,
    pub value: Value,
    pub count: u64,
}

impl Serialize for OverviewEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(&self.field, &self.value)?;
        map.serialize_entry("count", &self.count)?;
        map.end()
    }
}

/// What the overview list is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewSort {
    Count,
    Key,
}

#[derive(Debug, Clone, Default)]
pub struct GroupOptions<'a> {
    /// Rows kept per group; 0 keeps all.
    pub limit: u64,
    /// Rows skipped at the start of each group.
    pub offset: u64,
    pub overview_key: Option<&'a str>,
    pub order: Option<(OverviewSort, OrderDirection)>,
}

/// Buckets `rows` by `key`, paginating each bucket independently.
///
/// A row is counted in the overview only when it made it into its group,
/// i.e. it is past the group offset and within the group limit. Rows without
/// `key` are dropped.
pub fn group_by(key: &str, rows: Vec<Row>, opts: &GroupOptions<'_>) -> (Grouped, Vec<OverviewEntry>) {
    let mut grouped = Grouped::default();
    let mut skipped: HashMap<String, u64> = HashMap::new();
    let mut overview: Vec<OverviewEntry> = Vec::new();

    for row in rows {
        let Some(group) = row.key_string(key) else {
            continue;
        };
        let seen = skipped.entry(group.clone()).or_insert(0);
        let bucket = grouped.bucket(&group);
        if *seen < opts.offset {
            *seen += 1;
            continue;
        }
        if opts.limit > 0 && bucket.len() as u64 >= opts.limit {
            continue;
        }
        if let Some(ov_key) = opts.overview_key {
            if let Some(ov_value) = row.get(ov_key) {
                match overview.iter_mut().find(|e| &e.value == ov_value) {
                    Some(entry) => entry.count += 1,
                    None => overview.push(OverviewEntry {
                        field: ov_key.to_string(),
                        value: ov_value.clone(),
                        count: 1,
                    }),
                }
            }
        }
        bucket.push(row);
    }

    if let Some((sort, dir)) = opts.order {
        sort_overview(&mut overview, sort, dir);
    }
    (grouped, overview)
}

/// Plain bucketing without pagination or overview.
pub fn group_rows_by(key: &str, rows: Vec<Row>) -> Grouped {
    group_by(key, rows, &GroupOptions::default()).0
}

pub fn sort_overview(overview: &mut [OverviewEntry], sort: OverviewSort, dir: OrderDirection) {
    overview.sort_by(|a, b| {
        let ord = match sort {
            OverviewSort::Count => a.count.cmp(&b.count),
            OverviewSort::Key => compare_values(&a.value, &b.value),
        };
        match dir {
            OrderDirection::Asc => ord,
            OrderDirection::Desc => ord.reverse(),
        }
    });
}

/// Numeric when both sides are numbers (or numeric strings), textual otherwise.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn num(v: &Value) -> Option<f64> {
        match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }
    fn text(v: &Value) -> String {
        match v {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => match (num(a), num(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => text(a).cmp(&text(b)),
        },
    }
}
