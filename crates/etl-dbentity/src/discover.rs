//! Table discovery from a live database.
//!
//! [`DataEndpoint`] is the narrow capability discovery needs: run a
//! parameterized catalog query and report the default schema. The crate
//! ships a MySQL implementation in [`crate::endpoint`]; tests use in-memory
//! fakes.

use serde_json::{Map, Value};
use tracing::debug;

use crate::column::Column;
use crate::entity::{quote_identifier, NamedEntity, TableItem};
use crate::error::{DbEntityError, Result};
use crate::foreign_key::ForeignKeyConstraint;
use crate::index::Index;
use crate::options::{ModelOptions, MYSQL_QUOTE_CHAR};
use crate::table::Table;
use crate::trigger::Trigger;

/// One result row, keyed by column alias.
pub type Row = Map<String, Value>;

/// A database connection that can answer catalog queries synchronously.
pub trait DataEndpoint {
    /// Error type for query failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs `sql`, binding `params` to its `?` placeholders in order.
    fn query(&self, sql: &str, params: &[&str]) -> std::result::Result<Vec<Row>, Self::Error>;

    /// Returns the schema used for unqualified table names.
    fn default_schema(&self) -> &str;

    /// Returns the identifier quote character.
    fn quote_char(&self) -> &str {
        MYSQL_QUOTE_CHAR
    }

    /// Quotes an identifier for this endpoint.
    fn quote_identifier(&self, identifier: &str) -> String {
        quote_identifier(self.quote_char(), identifier)
    }
}

const TABLE_SQL: &str = "SELECT engine AS engine, table_comment AS comment
FROM information_schema.tables
WHERE table_schema = ? AND table_name = ?";

const INDEX_SQL: &str = "SELECT index_name AS name,
  index_type AS type,
  (non_unique = 0) AS is_unique,
  GROUP_CONCAT(column_name ORDER BY seq_in_index ASC) AS columns
FROM information_schema.statistics
WHERE table_schema = ? AND table_name = ?
GROUP BY index_name, index_type, non_unique";

const FOREIGN_KEY_SQL: &str = "SELECT kcu.constraint_name AS name,
  GROUP_CONCAT(kcu.column_name ORDER BY kcu.ordinal_position ASC) AS columns,
  kcu.referenced_table_name AS referenced_table,
  GROUP_CONCAT(kcu.referenced_column_name ORDER BY kcu.ordinal_position ASC) AS referenced_columns,
  rc.delete_rule AS on_delete,
  rc.update_rule AS on_update
FROM information_schema.key_column_usage kcu
JOIN information_schema.referential_constraints rc
  ON rc.constraint_schema = kcu.constraint_schema
  AND rc.constraint_name = kcu.constraint_name
WHERE kcu.table_schema = ? AND kcu.table_name = ?
  AND kcu.referenced_table_name IS NOT NULL
GROUP BY kcu.constraint_name, kcu.referenced_table_name, rc.delete_rule, rc.update_rule
ORDER BY kcu.constraint_name ASC";

const TRIGGER_SQL: &str = "SELECT trigger_name AS name,
  action_timing AS time,
  event_manipulation AS event,
  event_object_schema AS `schema`,
  event_object_table AS `table`,
  definer AS definer,
  action_statement AS body
FROM information_schema.triggers
WHERE event_object_schema = ? AND event_object_table = ?";

/// Column query. `default`, `comment` and `collation` are keywords, so
/// their aliases are quoted by the endpoint.
fn column_sql<E: DataEndpoint + ?Sized>(endpoint: &E) -> String {
    format!(
        "SELECT column_name AS name,
  column_type AS type,
  is_nullable AS nullable,
  column_default AS {default},
  IF('' = extra, NULL, extra) AS extra,
  IF('' = column_comment, NULL, column_comment) AS {comment},
  character_set_name AS charset,
  collation_name AS {collation}
FROM information_schema.columns
WHERE table_schema = ? AND table_name = ?
ORDER BY ordinal_position ASC",
        default = endpoint.quote_identifier("default"),
        comment = endpoint.quote_identifier("comment"),
        collation = endpoint.quote_identifier("collation"),
    )
}

/// Splits `schema.table`, falling back to the endpoint's default schema.
fn split_name<'a, E: DataEndpoint + ?Sized>(endpoint: &'a E, table_name: &'a str) -> (&'a str, &'a str) {
    match table_name.split_once('.') {
        Some((schema, table)) => (schema, table),
        None => (endpoint.default_schema(), table_name),
    }
}

impl Table {
    /// Discovers `table_name` (optionally `schema.table`) through `endpoint`.
    /// Returns `Ok(None)` if the table does not exist.
    pub fn discover<E: DataEndpoint + ?Sized>(
        table_name: &str,
        endpoint: &E,
        options: &ModelOptions,
    ) -> Result<Option<Self>> {
        let (schema, name) = split_name(endpoint, table_name);
        let qualified = format!("{schema}.{name}");
        debug!(table = %qualified, "Discovering table");

        let run = |sql: &str| {
            endpoint
                .query(sql, &[schema, name])
                .map_err(|err| DbEntityError::Discovery {
                    table: qualified.clone(),
                    source: Box::new(err),
                })
        };
        let failed = |message: String| DbEntityError::DiscoveryFailed {
            table: qualified.clone(),
            message,
        };

        let rows = run(TABLE_SQL)?;
        let table_row = match rows.as_slice() {
            [] => {
                debug!(table = %qualified, "Table does not exist");
                return Ok(None);
            }
            [row] => row,
            rows => return Err(failed(format!("expected one catalog row, got {}", rows.len()))),
        };

        let mut table = Self::new(name).with_quote_char(options.quote_char.clone());
        table.set_schema(Some(schema.to_string()));
        table.set_engine(text_field(table_row, "engine"));
        table.set_comment(text_field(table_row, "comment"));

        let columns = run(&column_sql(endpoint))?;
        if columns.is_empty() {
            return Err(failed("no columns found".to_string()));
        }
        for row in columns {
            let column = Column::from_json(&Value::Object(row), options)
                .map_err(|err| failed(err.to_string()))?;
            table.add_column(column, false)?;
        }

        for row in run(INDEX_SQL)? {
            let index = Index::from_json(&Value::Object(row), options)
                .map_err(|err| failed(err.to_string()))?;
            table.add_index(index)?;
        }

        for row in run(FOREIGN_KEY_SQL)? {
            let constraint = ForeignKeyConstraint::from_json(&Value::Object(row), options)
                .map_err(|err| failed(err.to_string()))?;
            table.add_foreign_key_constraint(constraint)?;
        }

        for row in run(TRIGGER_SQL)? {
            let trigger = Trigger::from_json(&Value::Object(row), options)
                .map_err(|err| failed(err.to_string()))?;
            table.add_trigger(trigger)?;
        }

        debug!(
            table = %table.full_name(),
            columns = table.columns().len(),
            indexes = table.indexes().len(),
            foreign_keys = table.foreign_key_constraints().len(),
            triggers = table.triggers().len(),
            "Discovered table"
        );
        Ok(Some(table))
    }
}

/// Reads a catalog text field; empty strings are treated as absent.
fn text_field(row: &Row, key: &str) -> Option<String> {
    row.get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(ToString::to_string)
}
