//! Request parameter checks applied before criteria or ORDER BY text is built.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::columns::SortEntity;
use crate::error::ValidationError;

static RE_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w:.\-\s]{1,127}$").unwrap());
static RE_IDS_LIST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\d,]+$").unwrap());

/// Bacula resource name: word characters, `:`, `.`, `-` and spaces.
pub fn is_valid_name(name: &str) -> bool {
    RE_NAME.is_match(name)
}

/// Comma separated numeric ids, e.g. `1,5,9`.
pub fn is_valid_ids_list(list: &str) -> bool {
    RE_IDS_LIST.is_match(list)
}

pub fn validate_name(name: &str) -> Result<&str, ValidationError> {
    if is_valid_name(name) {
        Ok(name)
    } else {
        Err(ValidationError::InvalidName(name.to_string()))
    }
}

/// Parses `1,5,9` into ids, skipping empty items.
pub fn parse_ids_list(list: &str) -> Result<Vec<i64>, ValidationError> {
    if !is_valid_ids_list(list) {
        return Err(ValidationError::InvalidIdsList(list.to_string()));
    }
    list.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ValidationError::InvalidIdsList(list.to_string()))
        })
        .collect()
}

/// Resolves a caller-supplied sort column to its canonical spelling.
pub fn validate_sort_column(
    entity: SortEntity,
    column: &str,
) -> Result<&'static str, ValidationError> {
    entity
        .resolve(column)
        .ok_or_else(|| ValidationError::InvalidProperty {
            property: column.to_string(),
            allowed: entity.columns().join(", "),
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for OrderDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(OrderDirection::Asc),
            "desc" => Ok(OrderDirection::Desc),
            _ => Err(ValidationError::InvalidOrder(s.to_string())),
        }
    }
}
