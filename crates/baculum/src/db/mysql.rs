//! MySQL/MariaDB catalog session on top of sqlx.

use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use secrecy::ExposeSecret;
use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::types::Decimal;
use sqlx::{Column as _, ConnectOptions, MySql, Row as _, TypeInfo, ValueRef};
use tokio::runtime::Runtime;

use super::criteria::{Params, SqlValue};
use super::dialect::Dialect;
use super::error::DatabaseError;
use super::executor::{QueryExecutor, Row};
use super::server::{self, PlaceholderStyle};
use crate::config::DbConfig;

/// One MySQL connection serving one request.
pub struct MySqlSession {
    runtime: Runtime,
    conn: Mutex<MySqlConnection>,
}

impl MySqlSession {
    pub fn connect(config: &DbConfig) -> Result<Self, DatabaseError> {
        let mut options = MySqlConnectOptions::new();
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

impl QueryExecutor for MySqlSession {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
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
    conn: &mut MySqlConnection,
    sql: &str,
    params: &Params,
) -> Result<Vec<Row>, DatabaseError> {
    let (text, values) = server::positional(sql, params, PlaceholderStyle::QuestionMark)?;
    let rows = bind_all(sqlx::query(&text), &values)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(to_row).collect()
}

async fn execute_statement(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &Params,
) -> Result<usize, DatabaseError> {
    if params.is_empty() {
        let done = sqlx::raw_sql(sql).execute(&mut *conn).await?;
        return Ok(done.rows_affected() as usize);
    }
    let (text, values) = server::positional(sql, params, PlaceholderStyle::QuestionMark)?;
    let done = bind_all(sqlx::query(&text), &values)
        .execute(&mut *conn)
        .await?;
    Ok(done.rows_affected() as usize)
}

/// MySQL converts between text and numbers on comparison, so values are
/// bound as they come.
fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: &[SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Real(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
        };
    }
    query
}

fn to_row(row: &MySqlRow) -> Result<Row, DatabaseError> {
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

fn decode_column(row: &MySqlRow, i: usize, type_name: &str) -> Result<Value, DatabaseError> {
    let unsigned = type_name.ends_with(" UNSIGNED");
    let base = type_name.trim_end_matches(" UNSIGNED");
    Ok(match base {
        "BOOLEAN" => Value::from(row.try_get::<bool, _>(i)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" if unsigned => {
            Value::from(row.try_get::<u64, _>(i)?)
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Value::from(row.try_get::<i64, _>(i)?)
        }
        "FLOAT" => server::float_json(row.try_get::<f32, _>(i)? as f64),
        "DOUBLE" => server::float_json(row.try_get::<f64, _>(i)?),
        "DECIMAL" => server::decimal_json(&row.try_get::<Decimal, _>(i)?.to_string()),
        "DATETIME" | "TIMESTAMP" => server::timestamp_json(row.try_get::<NaiveDateTime, _>(i)?),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(i)?.format("%Y-%m-%d").to_string()),
        "TIME" => Value::String(row.try_get::<NaiveTime, _>(i)?.format("%H:%M:%S").to_string()),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            server::bytes_json(row.try_get::<Vec<u8>, _>(i)?)
        }
        _ => match row.try_get::<String, _>(i) {
            Ok(s) => Value::String(s),
            Err(_) => match row.try_get::<Vec<u8>, _>(i) {
                Ok(bytes) => server::bytes_json(bytes),
                Err(e) => {
                    log::debug!("Column {} of type {} left undecoded: {}", i, type_name, e);
                    Value::Null
                }
            },
        },
    })
}
