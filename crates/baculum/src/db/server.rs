//! Plumbing shared by the PostgreSQL and MySQL sessions.
//!
//! Both sessions drive an async sqlx connection from the synchronous
//! [`super::QueryExecutor`] seam through a private current-thread runtime.

use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use serde_json::{Number, Value};
use tokio::runtime::Runtime;

use super::criteria::{Params, SqlValue};
use super::error::DatabaseError;

/// Timestamp text format of catalog rows on every backend.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a server backend spells positional placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2`... A repeated name reuses its number.
    Numbered,
    /// One `?` per occurrence.
    QuestionMark,
}

/// Rewrites `:name` placeholders into positional ones and returns the
/// values in binding order.
///
/// Quoted strings, quoted identifiers and `::` casts pass through untouched.
pub fn positional(
    sql: &str,
    params: &Params,
    style: PlaceholderStyle,
) -> Result<(String, Vec<SqlValue>), DatabaseError> {
    let bytes = sql.as_bytes();
    let mut text = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut numbered: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' | b'`' => {
                let end = closing_quote(bytes, i);
                text.push_str(&sql[i..end]);
                i = end;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                text.push_str("::");
                i += 2;
            }
            b':' if bytes
                .get(i + 1)
                .is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_') =>
            {
                let mut end = i + 1;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let key = &sql[i..end];
                let value = params
                    .get(key)
                    .ok_or_else(|| DatabaseError::UnboundParameter(key[1..].to_string()))?;
                match style {
                    PlaceholderStyle::Numbered => {
                        let n = match numbered.iter().position(|k| *k == key) {
                            Some(pos) => pos + 1,
                            None => {
                                numbered.push(key);
                                values.push(value.clone());
                                numbered.len()
                            }
                        };
                        text.push('$');
                        text.push_str(&n.to_string());
                    }
                    PlaceholderStyle::QuestionMark => {
                        values.push(value.clone());
                        text.push('?');
                    }
                }
                i = end;
            }
            _ => {
                let end = bytes[i + 1..]
                    .iter()
                    .position(|b| matches!(b, b'\'' | b'"' | b'`' | b':'))
                    .map_or(bytes.len(), |p| i + 1 + p);
                text.push_str(&sql[i..end]);
                i = end;
            }
        }
    }
    Ok((text, values))
}

/// Index just past the quote closing the one at `start`. A doubled quote
/// is an escaped quote.
fn closing_quote(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut j = start + 1;
    while j < bytes.len() {
        if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    bytes.len()
}

pub fn runtime() -> Result<Runtime, DatabaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DatabaseError::ConnectionProblem {
            message: format!("cannot start the catalog I/O runtime: {}", e),
        })
}

pub fn lock<T>(conn: &Mutex<T>) -> Result<MutexGuard<'_, T>, DatabaseError> {
    conn.lock().map_err(|_| DatabaseError::ConnectionProblem {
        message: "catalog session was poisoned by an earlier panic".to_string(),
    })
}

pub fn float_json(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

/// Exact decimals become integers when they have no fraction.
pub fn decimal_json(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    match text.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Value::from(f as i64),
        Ok(f) => float_json(f),
        Err(_) => Value::String(text.to_string()),
    }
}

pub fn timestamp_json(ts: NaiveDateTime) -> Value {
    Value::String(ts.format(TIMESTAMP_FORMAT).to_string())
}

/// Bacula keeps paths and file names as raw bytes on some backends.
pub fn bytes_json(bytes: Vec<u8>) -> Value {
    Value::String(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, SqlValue)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_numbered_reuses_repeated_names() {
        let p = params(&[
            (":job_name_0", SqlValue::from("alpha")),
            (":limit", SqlValue::Integer(5)),
        ]);
        let (text, values) = positional(
            "SELECT 1 WHERE a = :job_name_0 OR b = :job_name_0 LIMIT :limit",
            &p,
            PlaceholderStyle::Numbered,
        )
        .unwrap();
        assert_eq!(text, "SELECT 1 WHERE a = $1 OR b = $1 LIMIT $2");
        assert_eq!(values, vec![SqlValue::from("alpha"), SqlValue::Integer(5)]);
    }

    #[test]
    fn test_question_marks_repeat_values() {
        let p = params(&[(":n", SqlValue::Integer(1))]);
        let (text, values) =
            positional("SELECT :n, :n", &p, PlaceholderStyle::QuestionMark).unwrap();
        assert_eq!(text, "SELECT ?, ?");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_quotes_and_casts_untouched() {
        let p = params(&[(":d", SqlValue::from("2026-09-01"))]);
        let sql = "SELECT '%Y-%m-01 00:00:00', 'it''s :x', \"a:b\", x::text FROM t WHERE d > :d";
        let (text, values) = positional(sql, &p, PlaceholderStyle::Numbered).unwrap();
        assert_eq!(
            text,
            "SELECT '%Y-%m-01 00:00:00', 'it''s :x', \"a:b\", x::text FROM t WHERE d > $1"
        );
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_unbound_placeholder() {
        let err = positional("SELECT :missing", &Params::new(), PlaceholderStyle::Numbered)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UnboundParameter(ref n) if n == "missing"));
    }

    #[test]
    fn test_multibyte_text_survives() {
        let p = params(&[(":p", SqlValue::from("/tmp"))]);
        let (text, _) =
            positional("SELECT 'zażółć' || Path WHERE Path = :p", &p, PlaceholderStyle::QuestionMark)
                .unwrap();
        assert_eq!(text, "SELECT 'zażółć' || Path WHERE Path = ?");
    }

    #[test]
    fn test_decimal_json() {
        assert_eq!(decimal_json("42"), Value::from(42));
        assert_eq!(decimal_json("42.000"), Value::from(42));
        assert_eq!(decimal_json("1.5"), Value::from(1.5));
    }
}
