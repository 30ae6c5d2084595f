#![allow(dead_code)]

use std::cell::RefCell;

use etl_dbentity::{DataEndpoint, Row};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
#[error("catalog unavailable")]
pub struct CatalogError;

/// In-memory catalog answering the discovery queries by the
/// `information_schema` view they select from.
#[derive(Default)]
pub struct CatalogEndpoint {
    pub tables: Vec<Row>,
    pub columns: Vec<Row>,
    pub indexes: Vec<Row>,
    pub foreign_keys: Vec<Row>,
    pub triggers: Vec<Row>,
    pub queries: RefCell<Vec<(String, Vec<String>)>>,
}

impl CatalogEndpoint {
    pub fn table(mut self, row: Value) -> Self {
        self.tables.push(row_of(row));
        self
    }

    pub fn column(mut self, row: Value) -> Self {
        self.columns.push(row_of(row));
        self
    }

    pub fn index(mut self, row: Value) -> Self {
        self.indexes.push(row_of(row));
        self
    }

    pub fn foreign_key(mut self, row: Value) -> Self {
        self.foreign_keys.push(row_of(row));
        self
    }

    pub fn trigger(mut self, row: Value) -> Self {
        self.triggers.push(row_of(row));
        self
    }
}

impl DataEndpoint for CatalogEndpoint {
    type Error = CatalogError;

    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>, CatalogError> {
        self.queries.borrow_mut().push((
            sql.to_string(),
            params.iter().map(ToString::to_string).collect(),
        ));
        let rows = if sql.contains("information_schema.tables") {
            &self.tables
        } else if sql.contains("information_schema.columns") {
            &self.columns
        } else if sql.contains("information_schema.statistics") {
            &self.indexes
        } else if sql.contains("information_schema.key_column_usage") {
            &self.foreign_keys
        } else if sql.contains("information_schema.triggers") {
            &self.triggers
        } else {
            return Err(CatalogError);
        };
        Ok(rows.clone())
    }

    fn default_schema(&self) -> &str {
        "modw"
    }
}

pub fn row_of(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected a JSON object row, got {other}"),
    }
}
