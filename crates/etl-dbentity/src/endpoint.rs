//! MySQL data endpoint.
//!
//! [`MysqlEndpoint`] answers catalog queries through an `sqlx` pool. The
//! [`DataEndpoint`] contract is synchronous, so the endpoint owns a
//! single-threaded tokio runtime and blocks on each query.

use serde_json::Value;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as _, Row as _};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, trace};

use crate::discover::{DataEndpoint, Row};
use crate::error::{DbEntityError, Result};

/// A MySQL connection usable for table discovery.
pub struct MysqlEndpoint {
    runtime: Runtime,
    pool: MySqlPool,
    schema: String,
}

impl MysqlEndpoint {
    /// Connects to `url`. Without an explicit `schema`, the connection's
    /// current database becomes the default schema.
    pub fn connect(url: &str, schema: Option<String>) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let pool = runtime.block_on(MySqlPoolOptions::new().max_connections(1).connect(url))?;

        let schema = match schema {
            Some(schema) => schema,
            None => runtime
                .block_on(
                    sqlx::query_scalar::<_, Option<String>>("SELECT DATABASE()").fetch_one(&pool),
                )?
                .ok_or_else(|| {
                    DbEntityError::invalid(
                        "endpoint",
                        "schema",
                        "no schema given and the connection has no default database",
                    )
                })?,
        };

        debug!(schema = %schema, "Connected to MySQL endpoint");
        Ok(Self {
            runtime,
            pool,
            schema,
        })
    }

    /// Closes the pool.
    pub fn close(self) {
        self.runtime.block_on(self.pool.close());
    }
}

impl DataEndpoint for MysqlEndpoint {
    type Error = sqlx::Error;

    fn query(&self, sql: &str, params: &[&str]) -> std::result::Result<Vec<Row>, sqlx::Error> {
        trace!(sql = %sql, params = ?params, "Running catalog query");
        let query = params
            .iter()
            .fold(sqlx::query(sql), |query, param| query.bind(*param));
        let rows = self.runtime.block_on(query.fetch_all(&self.pool))?;
        Ok(rows.iter().map(decode_row).collect())
    }

    fn default_schema(&self) -> &str {
        &self.schema
    }
}

fn decode_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| {
            let index = column.ordinal();
            (column.name().to_string(), decode_value(row, index))
        })
        .collect()
}

/// Catalog values are text, integers or binary strings (GROUP_CONCAT and
/// some information_schema columns come back as blobs).
fn decode_value(row: &MySqlRow, index: usize) -> Value {
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.map_or(Value::Null, Value::String);
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map_or(Value::Null, Value::from);
    }
    if let Ok(value) = row.try_get::<Option<u64>, _>(index) {
        return value.map_or(Value::Null, Value::from);
    }
    if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return value.map_or(Value::Null, |bytes| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        });
    }
    Value::Null
}
