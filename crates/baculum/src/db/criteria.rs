//! Typed query criteria and the WHERE clause builder.
//!
//! A [`Criteria`] maps registry-validated columns to ordered clause lists.
//! [`build_where`] turns it into SQL text plus named bind parameters. Values
//! are always bound; the only inlined text is the column name (checked
//! against [`super::columns`]) and the `NULL` literal of the null tests.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::columns::Column;

/// Named bind parameters keyed by placeholder, colon included (`:job_jobid_0`).
pub type Params = BTreeMap<String, SqlValue>;

/// Errors raised while assembling criteria.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CriteriaError {
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("Operator '{operator}' cannot be used with {values} for column '{column}'")]
    OperatorValueMismatch {
        column: String,
        operator: String,
        values: String,
    },

    /// `IS` and `IS NOT` only compare against NULL.
    #[error("Operator '{operator}' on column '{column}' accepts only NULL")]
    BadIsLiteral { column: String, operator: String },

    /// A value list was given without saying how to join the values.
    #[error("Column '{0}' has several values but no IN/OR/AND operator")]
    MissingJoinOperator(String),

    #[error("Malformed criteria: {0}")]
    Malformed(String),
}

/// Comparison and combination operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    In,
    Or,
    And,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::Or => "OR",
            Operator::And => "AND",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

/// A single bindable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    fn is_null_literal(&self) -> bool {
        match self {
            SqlValue::Null => true,
            SqlValue::Text(s) => s.eq_ignore_ascii_case("null"),
            _ => false,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Values {
    One(SqlValue),
    Many(Vec<SqlValue>),
    None,
}

/// One `{operator, value(s)}` entry under a column.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    operator: Operator,
    values: Values,
}

impl Clause {
    fn one(operator: Operator, value: impl Into<SqlValue>) -> Self {
        Self {
            operator,
            values: Values::One(value.into()),
        }
    }

    fn many<I, V>(operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Self {
            operator,
            values: Values::Many(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn eq(value: impl Into<SqlValue>) -> Self {
        Self::one(Operator::Eq, value)
    }

    pub fn gt(value: impl Into<SqlValue>) -> Self {
        Self::one(Operator::Gt, value)
    }

    pub fn lt(value: impl Into<SqlValue>) -> Self {
        Self::one(Operator::Lt, value)
    }

    pub fn gte(value: impl Into<SqlValue>) -> Self {
        Self::one(Operator::Gte, value)
    }

    pub fn lte(value: impl Into<SqlValue>) -> Self {
        Self::one(Operator::Lte, value)
    }

    pub fn like(value: impl Into<SqlValue>) -> Self {
        Self::one(Operator::Like, value)
    }

    /// `col IN (...)`. An empty list matches nothing.
    pub fn in_list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Self::many(Operator::In, values)
    }

    /// `col = a OR col = b ...`
    pub fn any_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Self::many(Operator::Or, values)
    }

    /// `col = a AND col = b ...`
    pub fn all_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Self::many(Operator::And, values)
    }

    pub fn is_null() -> Self {
        Self {
            operator: Operator::IsNull,
            values: Values::None,
        }
    }

    pub fn is_not_null() -> Self {
        Self {
            operator: Operator::IsNotNull,
            values: Values::None,
        }
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Bound values of the clause, in placeholder order.
    pub fn values(&self) -> Vec<&SqlValue> {
        match &self.values {
            Values::One(v) => vec![v],
            Values::Many(vs) => vs.iter().collect(),
            Values::None => Vec::new(),
        }
    }
}

/// Wire form of one clause: `{"operator": "IN", "vals": [1, 2]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawClause {
    #[serde(default)]
    pub operator: Option<String>,
    pub vals: RawValues,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawValues {
    Many(Vec<SqlValue>),
    One(SqlValue),
}

/// Ordered column → clauses mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    entries: Vec<(Column, Vec<Clause>)>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a clause, validating `column` against the registry.
    pub fn push(&mut self, column: &str, clause: Clause) -> Result<&mut Self, CriteriaError> {
        let column = Column::parse(column)?;
        Ok(self.push_column(column, clause))
    }

    /// Builder form of [`Criteria::push`].
    pub fn with(mut self, column: &str, clause: Clause) -> Result<Self, CriteriaError> {
        self.push(column, clause)?;
        Ok(self)
    }

    pub fn push_column(&mut self, column: Column, clause: Clause) -> &mut Self {
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some((_, clauses)) => clauses.push(clause),
            None => self.entries.push((column, vec![clause])),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, column: &str) -> bool {
        Column::parse(column)
            .map(|col| self.entries.iter().any(|(c, _)| *c == col))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Column, &[Clause])> {
        self.entries.iter().map(|(c, cl)| (c, cl.as_slice()))
    }

    /// Parses the nested wire form, e.g.
    /// `{"Job.JobId": [{"operator": "IN", "vals": [1, 2, 3]}]}`.
    pub fn from_raw(raw: &Value) -> Result<Self, CriteriaError> {
        let map = raw
            .as_object()
            .ok_or_else(|| CriteriaError::Malformed("criteria must be an object".to_string()))?;
        let mut criteria = Criteria::new();
        for (name, clauses) in map {
            let column = Column::parse(name)?;
            let clauses: Vec<RawClause> = serde_json::from_value(clauses.clone())
                .map_err(|e| CriteriaError::Malformed(format!("{}: {}", name, e)))?;
            for raw_clause in clauses {
                criteria.push_column(column, Clause::from_raw(name, raw_clause)?);
            }
        }
        Ok(criteria)
    }
}

impl Clause {
    fn from_raw(column: &str, raw: RawClause) -> Result<Self, CriteriaError> {
        let op = raw
            .operator
            .as_deref()
            .map(|o| o.trim().to_uppercase())
            .unwrap_or_default();
        let mismatch = |values: &str| CriteriaError::OperatorValueMismatch {
            column: column.to_string(),
            operator: op.clone(),
            values: values.to_string(),
        };
        match raw.vals {
            RawValues::Many(vals) => match op.as_str() {
                "IN" => Ok(Clause::in_list(vals)),
                "OR" => Ok(Clause::any_of(vals)),
                "AND" => Ok(Clause::all_of(vals)),
                "" if vals.len() <= 1 => Ok(Clause::any_of(vals)),
                "" => Err(CriteriaError::MissingJoinOperator(column.to_string())),
                ">" | "<" | ">=" | "<=" | "LIKE" | "IS" | "IS NOT" | "=" => {
                    Err(mismatch("a value list"))
                }
                other => Err(CriteriaError::UnknownOperator(other.to_string())),
            },
            RawValues::One(val) => match op.as_str() {
                ">" => Ok(Clause::gt(val)),
                "<" => Ok(Clause::lt(val)),
                ">=" => Ok(Clause::gte(val)),
                "<=" => Ok(Clause::lte(val)),
                "LIKE" => Ok(Clause::like(val)),
                "IS" | "IS NOT" if !val.is_null_literal() => Err(CriteriaError::BadIsLiteral {
                    column: column.to_string(),
                    operator: op.clone(),
                }),
                "IS" => Ok(Clause::is_null()),
                "IS NOT" => Ok(Clause::is_not_null()),
                "" | "=" | "IN" | "OR" | "AND" => Ok(Clause::eq(val)),
                other => Err(CriteriaError::UnknownOperator(other.to_string())),
            },
        }
    }
}

/// A rendered WHERE clause with its bind parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    conditions: Vec<String>,
    pub params: Params,
    omit_where: bool,
}

impl WhereClause {
    /// SQL text: `WHERE (a) AND (b)`, `(a) AND (b)` when the keyword is
    /// omitted, or an empty string without conditions.
    pub fn clause(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let body = format!("({})", self.conditions.join(") AND ("));
        if self.omit_where {
            body
        } else {
            format!("WHERE {}", body)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Adds a fixed condition. Only for SQL text owned by this crate.
    pub fn and(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Like [`WhereClause::and`], with parameters of its own.
    pub fn and_with_params(mut self, condition: impl Into<String>, params: Params) -> Self {
        let other = WhereClause {
            conditions: vec![condition.into()],
            params,
            omit_where: true,
        };
        self = self.merge(other);
        self
    }

    /// Combines two clauses with AND. Placeholders of `other` that clash
    /// with ours are renamed so every name stays unique.
    pub fn merge(mut self, other: WhereClause) -> WhereClause {
        let WhereClause {
            mut conditions,
            params,
            ..
        } = other;
        let mut taken: BTreeSet<String> = self.params.keys().cloned().collect();
        taken.extend(params.keys().cloned());
        for (name, value) in params {
            if self.params.contains_key(&name) {
                let renamed = unique_name(&name, &taken);
                taken.insert(renamed.clone());
                let pattern = format!(r"{}\b", regex::escape(&name));
                if let Ok(re) = Regex::new(&pattern) {
                    for cond in conditions.iter_mut() {
                        *cond = re.replace_all(cond, renamed.as_str()).into_owned();
                    }
                }
                self.params.insert(renamed, value);
            } else {
                self.params.insert(name, value);
            }
        }
        self.conditions.extend(conditions);
        self
    }
}

fn unique_name(base: &str, taken: &BTreeSet<String>) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Builds the WHERE clause and bind parameters for `criteria`.
pub fn build_where(criteria: &Criteria, omit_where: bool) -> WhereClause {
    let mut params = Params::new();
    let mut conditions = Vec::new();

    for (column, clauses) in criteria.iter() {
        let base = column.param_base();
        for (i, clause) in clauses.iter().enumerate() {
            let mut bind = |suffix: String, value: &SqlValue| -> String {
                let mut name = format!(":{}_{}", base, suffix);
                if params.contains_key(&name) {
                    let taken: BTreeSet<String> = params.keys().cloned().collect();
                    name = unique_name(&name, &taken);
                }
                params.insert(name.clone(), value.clone());
                name
            };
            let fragment = match (&clause.values, clause.operator) {
                (Values::Many(vals), Operator::In) => {
                    if vals.is_empty() {
                        "1 = 0".to_string()
                    } else {
                        let names: Vec<String> = vals
                            .iter()
                            .enumerate()
                            .map(|(j, v)| bind(format!("{}_{}", i, j), v))
                            .collect();
                        format!("{} IN ({})", column, names.join(","))
                    }
                }
                (Values::Many(vals), op) => {
                    if vals.is_empty() {
                        // Nothing to OR together matches nothing; an empty AND holds.
                        let always = if op == Operator::And { "1 = 1" } else { "1 = 0" };
                        always.to_string()
                    } else {
                        let parts: Vec<String> = vals
                            .iter()
                            .enumerate()
                            .map(|(j, v)| {
                                format!("{} = {}", column, bind(format!("{}_{}", i, j), v))
                            })
                            .collect();
                        parts.join(&format!(" {} ", op.as_sql()))
                    }
                }
                (Values::One(v), op @ (Operator::Gt
                | Operator::Lt
                | Operator::Gte
                | Operator::Lte
                | Operator::Like)) => {
                    format!("{} {} {}", column, op.as_sql(), bind(i.to_string(), v))
                }
                (Values::One(v), _) => format!("{} = {}", column, bind(i.to_string(), v)),
                (Values::None, op) => format!("{} {}", column, op.as_sql()),
            };
            conditions.push(fragment);
        }
    }

    WhereClause {
        conditions,
        params,
        omit_where,
    }
}
