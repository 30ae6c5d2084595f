//! Aggregation tables.
//!
//! An aggregation table is declared once and materialized per aggregation
//! unit (day, month, quarter, ...). Its physical name is the declared name
//! used as a prefix plus the unit, and it carries the query that populates
//! it.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::column::Column;
use crate::entity::{NamedEntity, TableItem};
use crate::error::{DbEntityError, Result};
use crate::foreign_key::ForeignKeyConstraint;
use crate::index::Index;
use crate::options::ModelOptions;
use crate::query::{Query, SOURCE_QUERY_KEY};
use crate::table::{Table, TABLE_DEFINITION_KEY};
use crate::trigger::Trigger;
use crate::variables::{substitute_in_value, VariableMap};

const QUERY_KEY: &str = "query";

/// A table whose name depends on a run-time aggregation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationTable {
    table: Table,
    table_prefix: String,
    aggregation_unit: Option<String>,
    query: Option<Query>,
}

impl AggregationTable {
    /// Wraps `table`; its name becomes the table prefix.
    pub fn new(table: Table) -> Result<Self> {
        let table_prefix = table.name().to_string();
        if table_prefix.is_empty() {
            return Err(DbEntityError::invalid(
                "aggregation table",
                "name",
                "table prefix cannot be empty",
            ));
        }
        Ok(Self {
            table,
            table_prefix,
            aggregation_unit: None,
            query: None,
        })
    }

    /// Builds an aggregation table from a table definition with an
    /// optional `query` key.
    ///
    /// A `{"table_definition": ..., "source_query": ...}` document is also
    /// accepted.
    pub fn from_json(value: &Value, options: &ModelOptions) -> Result<Self> {
        let (mut table_value, source_query) = match value.get(TABLE_DEFINITION_KEY) {
            Some(inner) => (inner.clone(), value.get(SOURCE_QUERY_KEY).cloned()),
            None => (value.clone(), None),
        };
        let query_value = table_value
            .as_object_mut()
            .and_then(|map| map.remove(QUERY_KEY))
            .or(source_query);

        let mut aggregation = Self::new(Table::from_json(&table_value, options)?)?;
        if let Some(query_value) = query_value {
            aggregation.query = Some(Query::from_json(&query_value, options)?);
        }
        Ok(aggregation)
    }

    /// Reads and parses a JSON definition file.
    pub fn from_file(path: &Path, options: &ModelOptions) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&contents)?;
        Self::from_json(&value, options)
    }

    /// Returns the table prefix.
    #[must_use]
    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    /// Replaces the table prefix, recomputing the name if a unit is set.
    pub fn set_table_prefix(&mut self, prefix: impl Into<String>) -> Result<&mut Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(DbEntityError::invalid(
                "aggregation table",
                "table_prefix",
                "table prefix cannot be empty",
            ));
        }
        self.table_prefix = prefix;
        let name = match &self.aggregation_unit {
            Some(unit) => format!("{}{unit}", self.table_prefix),
            None => self.table_prefix.clone(),
        };
        self.table.set_name(name);
        Ok(self)
    }

    /// Sets the aggregation unit; the name becomes prefix + unit. Triggers
    /// attached to the table follow the new name.
    pub fn set_aggregation_unit(&mut self, unit: impl Into<String>) -> Result<&mut Self> {
        let unit = unit.into();
        if unit.is_empty() {
            return Err(DbEntityError::invalid(
                "aggregation table",
                "aggregation_unit",
                "aggregation unit cannot be empty",
            ));
        }
        self.table.set_name(format!("{}{unit}", self.table_prefix));
        debug!(table = %self.table.name(), unit = %unit, "Aggregation unit set");
        self.aggregation_unit = Some(unit);
        Ok(self)
    }

    /// Returns the aggregation unit, if set.
    #[must_use]
    pub fn aggregation_unit(&self) -> Option<&str> {
        self.aggregation_unit.as_deref()
    }

    fn require_unit(&self) -> Result<()> {
        if self.aggregation_unit.is_none() {
            return Err(DbEntityError::AggregationUnitNotSet(self.table_prefix.clone()));
        }
        Ok(())
    }

    /// Returns the physical table name. Fails until the unit is set.
    pub fn name(&self) -> Result<&str> {
        self.require_unit()?;
        Ok(self.table.name())
    }

    /// Returns the quoted, schema-qualified name. Fails until the unit is set.
    pub fn full_name(&self) -> Result<String> {
        self.require_unit()?;
        Ok(self.table.full_name())
    }

    /// Returns the materialized table. Fails until the unit is set.
    pub fn table(&self) -> Result<&Table> {
        self.require_unit()?;
        Ok(&self.table)
    }

    /// Returns the underlying definition regardless of the unit, named by
    /// the prefix until a unit is set.
    #[must_use]
    pub const fn definition(&self) -> &Table {
        &self.table
    }

    /// Sets the schema on the underlying table.
    pub fn set_schema(&mut self, schema: Option<String>) {
        self.table.set_schema(schema);
    }

    /// Returns the populating query, if any.
    #[must_use]
    pub const fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Returns the populating query for modification.
    pub fn query_mut(&mut self) -> Option<&mut Query> {
        self.query.as_mut()
    }

    /// Replaces the populating query.
    pub fn set_query(&mut self, query: Query) -> &mut Self {
        self.query = Some(query);
        self
    }

    /// Verifies the table and checks the query's records against it.
    pub fn verify(&self) -> Result<()> {
        self.table.verify()?;
        if let Some(query) = &self.query {
            query.verify(&self.table)?;
        }
        Ok(())
    }

    /// Renders CREATE statements. Fails until the unit is set.
    pub fn create_sql(&self, include_schema: bool) -> Result<Vec<String>> {
        self.table()?.create_sql(include_schema)
    }

    /// Renders ALTER statements turning this table into `desired`. Fails
    /// until the unit is set.
    pub fn alter_sql(&self, desired: &Table, include_schema: bool) -> Result<Vec<String>> {
        Ok(self.table()?.alter_sql(desired, include_schema))
    }

    /// Serializes the definition (named by the prefix) and its query.
    /// Triggers on the materialized table are written against the prefix.
    #[must_use]
    pub fn to_json_obj(&self, succinct: bool, include_schema: bool) -> Value {
        let mut value = self.table.to_json_obj(succinct, include_schema);
        if let Value::Object(map) = &mut value {
            map.insert("name".to_string(), Value::String(self.table_prefix.clone()));
            if let Some(Value::Array(triggers)) = map.get_mut("triggers") {
                for trigger in triggers {
                    if trigger.get("table").and_then(Value::as_str) == Some(self.table.name()) {
                        trigger["table"] = Value::String(self.table_prefix.clone());
                    }
                }
            }
            if let Some(query) = &self.query {
                map.insert(QUERY_KEY.to_string(), query.to_json_obj());
            }
        }
        value
    }

    /// Returns an independent copy whose columns, indexes, foreign key
    /// constraints, triggers and query have had `${NAME}` variables
    /// substituted from `variables`.
    ///
    /// Each table item is serialized, substituted and parsed again, so the
    /// copy shares nothing with `self`. Substituted columns may overwrite a
    /// column of the same resulting name.
    pub fn copy_and_apply_variables(&self, variables: &VariableMap) -> Result<Self> {
        let options = ModelOptions::new().with_quote_char(self.table.quote_char());
        let mut copy = self.clone();
        copy.table
            .delete_columns()
            .delete_indexes()
            .delete_foreign_key_constraints()
            .delete_triggers();

        for column in self.table.columns() {
            let definition = substitute_in_value(&column.to_json_obj(false), variables);
            copy.table
                .add_column(Column::from_json(&definition, &options)?, true)?;
        }
        for index in self.table.indexes() {
            let definition = substitute_in_value(&index.to_json_obj(false), variables);
            copy.table.add_index(Index::from_json(&definition, &options)?)?;
        }
        for constraint in self.table.foreign_key_constraints() {
            let definition = substitute_in_value(&constraint.to_json_obj(false), variables);
            copy.table
                .add_foreign_key_constraint(ForeignKeyConstraint::from_json(&definition, &options)?)?;
        }
        for trigger in self.table.triggers() {
            let definition = substitute_in_value(&trigger.to_json_obj(false), variables);
            copy.table
                .add_trigger(Trigger::from_json(&definition, &options)?)?;
        }
        if let Some(query) = &mut copy.query {
            query.apply_variables(variables);
        }
        copy.table.verify()?;
        Ok(copy)
    }
}
