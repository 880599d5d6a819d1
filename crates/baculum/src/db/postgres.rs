//! PostgreSQL catalog session on top of sqlx.

use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use secrecy::ExposeSecret;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgRow};
use sqlx::query::Query;
use sqlx::types::Decimal;
use sqlx::{
    Column as _, ConnectOptions, Either, Executor, Postgres, Row as _, Statement as _, TypeInfo,
    ValueRef,
};
use tokio::runtime::Runtime;

use super::criteria::{Params, SqlValue};
use super::dialect::Dialect;
use super::error::DatabaseError;
use super::executor::{QueryExecutor, Row};
use super::server::{self, PlaceholderStyle};
use crate::config::DbConfig;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// One PostgreSQL connection serving one request.
pub struct PgSession {
    runtime: Runtime,
    conn: Mutex<PgConnection>,
}

impl PgSession {
    pub fn connect(config: &DbConfig) -> Result<Self, DatabaseError> {
        let mut options = PgConnectOptions::new().application_name("baculum");
        if let Some(host) = config.ip_addr.as_deref() {
            options = options.host(host);
        }
        if let Some(port) = config.port {
            options = options.port(port);
        }
        if let Some(name) = config.name.as_deref() {
            options = options.database(name);
        }
        if let Some(login) = config.login.as_deref() {
            options = options.username(login);
        }
        if let Some(password) = &config.password {
            options = options.password(password.expose_secret());
        }
        let runtime = server::runtime()?;
        let conn = runtime
            .block_on(options.connect())
            .map_err(|e| DatabaseError::ConnectionProblem {
                message: format!("{}: {}", config.describe(), e),
            })?;
        log::info!("Catalog connected at {}", config.describe());
        Ok(Self {
            runtime,
            conn: Mutex::new(conn),
        })
    }
}

impl QueryExecutor for PgSession {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSql
    }

    fn run(&self, sql: &str, params: &Params) -> Result<Vec<Row>, DatabaseError> {
        log::debug!("SQL: {} {:?}", sql, params);
        let mut conn = server::lock(&self.conn)?;
        self.runtime
            .block_on(fetch_rows(&mut conn, sql, params))
            .map_err(|e| e.in_statement(sql))
    }

    fn execute(&self, sql: &str, params: &Params) -> Result<usize, DatabaseError> {
        log::debug!("SQL: {} {:?}", sql, params);
        let mut conn = server::lock(&self.conn)?;
        self.runtime
            .block_on(execute_statement(&mut conn, sql, params))
            .map_err(|e| e.in_statement(sql))
    }
}

async fn fetch_rows(
    conn: &mut PgConnection,
    sql: &str,
    params: &Params,
) -> Result<Vec<Row>, DatabaseError> {
    let (text, values) = server::positional(sql, params, PlaceholderStyle::Numbered)?;
    let query = bind_query(conn, &text, &values).await?;
    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter().map(to_row).collect()
}

async fn execute_statement(
    conn: &mut PgConnection,
    sql: &str,
    params: &Params,
) -> Result<usize, DatabaseError> {
    if params.is_empty() {
        let done = sqlx::raw_sql(sql).execute(&mut *conn).await?;
        return Ok(done.rows_affected() as usize);
    }
    let (text, values) = server::positional(sql, params, PlaceholderStyle::Numbered)?;
    let query = bind_query(conn, &text, &values).await?;
    Ok(query.execute(&mut *conn).await?.rows_affected() as usize)
}

/// Binds `values` with the types the server infers for each placeholder.
///
/// Criteria values arrive untyped (a job id may come as `"5"`), and
/// PostgreSQL has no implicit cast from text to integer or timestamp.
async fn bind_query<'q>(
    conn: &mut PgConnection,
    text: &'q str,
    values: &[SqlValue],
) -> Result<PgQuery<'q>, DatabaseError> {
    let mut expected: Vec<String> = Vec::new();
    if !values.is_empty() {
        match (&mut *conn).prepare(text).await {
            Ok(statement) => {
                if let Some(Either::Left(types)) = statement.parameters() {
                    expected = types.iter().map(|t| t.name().to_string()).collect();
                }
            }
            Err(e) => log::debug!("Parameter types unavailable, binding as given: {}", e),
        }
    }
    let mut query = sqlx::query(text).persistent(false);
    for (i, value) in values.iter().enumerate() {
        query = bind_value(query, value, expected.get(i).map(String::as_str))?;
    }
    Ok(query)
}

fn bind_value<'q>(
    query: PgQuery<'q>,
    value: &SqlValue,
    expected: Option<&str>,
) -> Result<PgQuery<'q>, DatabaseError> {
    let Some(expected) = expected else {
        return Ok(match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Real(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
        });
    };
    Ok(match expected {
        "INT2" | "INT4" | "INT8" | "OID" => query.bind(integer(value, expected)?),
        "FLOAT4" | "FLOAT8" | "NUMERIC" => query.bind(real(value, expected)?),
        "BOOL" => query.bind(boolean(value, expected)?),
        "TIMESTAMP" => query.bind(timestamp(value, expected)?),
        "TIMESTAMPTZ" => query.bind(timestamp(value, expected)?.map(|t| t.and_utc())),
        "DATE" => query.bind(timestamp(value, expected)?.map(|t| t.date())),
        "BYTEA" => query.bind(text(value).map(String::into_bytes)),
        _ => query.bind(text(value)),
    })
}

fn invalid(value: &SqlValue, expected: &str) -> DatabaseError {
    DatabaseError::InvalidParameter {
        value: text(value).unwrap_or_default(),
        expected: expected.to_lowercase(),
    }
}

fn text(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Null => None,
        SqlValue::Integer(i) => Some(i.to_string()),
        SqlValue::Real(f) => Some(f.to_string()),
        SqlValue::Text(s) => Some(s.clone()),
    }
}

fn integer(value: &SqlValue, expected: &str) -> Result<Option<i64>, DatabaseError> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Integer(i) => Ok(Some(*i)),
        SqlValue::Real(f) if f.fract() == 0.0 => Ok(Some(*f as i64)),
        SqlValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(value, expected)),
        SqlValue::Real(_) => Err(invalid(value, expected)),
    }
}

fn real(value: &SqlValue, expected: &str) -> Result<Option<f64>, DatabaseError> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Integer(i) => Ok(Some(*i as f64)),
        SqlValue::Real(f) => Ok(Some(*f)),
        SqlValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(value, expected)),
    }
}

fn boolean(value: &SqlValue, expected: &str) -> Result<Option<bool>, DatabaseError> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Integer(i) => Ok(Some(*i != 0)),
        SqlValue::Real(f) => Ok(Some(*f != 0.0)),
        SqlValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "1" | "t" | "true" | "y" | "yes" => Ok(Some(true)),
            "0" | "f" | "false" | "n" | "no" => Ok(Some(false)),
            _ => Err(invalid(value, expected)),
        },
    }
}

/// Accepts catalog timestamps, ISO `T` separators, bare dates and epoch
/// seconds.
fn timestamp(value: &SqlValue, expected: &str) -> Result<Option<NaiveDateTime>, DatabaseError> {
    let parsed = match value {
        SqlValue::Null => return Ok(None),
        SqlValue::Integer(secs) => DateTime::from_timestamp(*secs, 0).map(|t| t.naive_utc()),
        SqlValue::Real(secs) => DateTime::from_timestamp(*secs as i64, 0).map(|t| t.naive_utc()),
        SqlValue::Text(s) => {
            let s = s.trim();
            ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
    };
    parsed.map(Some).ok_or_else(|| invalid(value, expected))
}

fn to_row(row: &PgRow) -> Result<Row, DatabaseError> {
    let mut record = Row::new();
    for column in row.columns() {
        let i = column.ordinal();
        let value = if row.try_get_raw(i)?.is_null() {
            Value::Null
        } else {
            decode_column(row, i, column.type_info().name())?
        };
        record.insert(column.name().to_lowercase(), value);
    }
    Ok(record)
}

fn decode_column(row: &PgRow, i: usize, type_name: &str) -> Result<Value, DatabaseError> {
    Ok(match type_name {
        "BOOL" => Value::from(row.try_get::<bool, _>(i)?),
        "INT2" => Value::from(row.try_get::<i16, _>(i)?),
        "INT4" => Value::from(row.try_get::<i32, _>(i)?),
        "INT8" => Value::from(row.try_get::<i64, _>(i)?),
        "FLOAT4" => server::float_json(row.try_get::<f32, _>(i)? as f64),
        "FLOAT8" => server::float_json(row.try_get::<f64, _>(i)?),
        "NUMERIC" => server::decimal_json(&row.try_get::<Decimal, _>(i)?.to_string()),
        "TIMESTAMP" => server::timestamp_json(row.try_get::<NaiveDateTime, _>(i)?),
        "TIMESTAMPTZ" => server::timestamp_json(row.try_get::<DateTime<Utc>, _>(i)?.naive_utc()),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(i)?.format("%Y-%m-%d").to_string()),
        "BYTEA" => server::bytes_json(row.try_get::<Vec<u8>, _>(i)?),
        _ => match row.try_get::<String, _>(i) {
            Ok(s) => Value::String(s),
            Err(e) => {
                log::debug!("Column {} of type {} left undecoded: {}", i, type_name, e);
                Value::Null
            }
        },
    })
}
