//! Table definition and table diffing.
//!
//! A [`Table`] owns insertion-ordered columns, indexes, foreign key
//! constraints and triggers. It can
//! be built from a declarative JSON definition or discovered from a live
//! database (see [`crate::discover`]), rendered as CREATE statements, and
//! compared against a desired definition to produce the ALTER statements
//! that bring the current table in line.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::column::Column;
use crate::entity::{describe, escape_string, is_comment, Definition, NamedEntity, TableItem};
use crate::error::{DbEntityError, Result};
use crate::foreign_key::ForeignKeyConstraint;
use crate::index::Index;
use crate::options::ModelOptions;
use crate::trigger::Trigger;

const PROPERTIES: &[&str] = &[
    "name",
    "schema",
    "engine",
    "comment",
    "columns",
    "indexes",
    FOREIGN_KEYS_KEY,
    "triggers",
];

const FOREIGN_KEYS_KEY: &str = "foreign_key_constraints";

/// Key wrapping a table inside a larger definition file.
pub const TABLE_DEFINITION_KEY: &str = "table_definition";

/// A database table with its columns, indexes and triggers.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    schema: Option<String>,
    engine: Option<String>,
    comment: Option<String>,
    columns: Vec<Column>,
    indexes: Vec<Index>,
    foreign_key_constraints: Vec<ForeignKeyConstraint>,
    triggers: Vec<Trigger>,
    quote_char: String,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            engine: None,
            comment: None,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_key_constraints: Vec::new(),
            triggers: Vec::new(),
            quote_char: ModelOptions::default().quote_char,
        }
    }

    /// Sets the identifier quote character used for the table name.
    #[must_use]
    pub fn with_quote_char(mut self, quote_char: impl Into<String>) -> Self {
        self.quote_char = quote_char.into();
        self
    }

    /// Sets the storage engine.
    #[must_use]
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// Sets the table comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Builds a table from its declarative form. A top-level
    /// `table_definition` key is unwrapped first. Index column references
    /// are verified before the table is returned.
    pub fn from_json(value: &Value, options: &ModelOptions) -> Result<Self> {
        if let Some(inner) = value.get(TABLE_DEFINITION_KEY) {
            return Self::from_json(inner, options);
        }

        let definition = Definition::parse("table", value, PROPERTIES, &["name", "columns"])?;
        let mut table = Self::new(definition.required_string("name")?)
            .with_quote_char(options.quote_char.clone());
        table.schema = definition.non_empty_string("schema")?;
        table.engine = definition.non_empty_string("engine")?;
        table.comment = definition.non_empty_string("comment")?;

        if let Some(columns) = definition.get("columns") {
            for column in named_items("columns", columns)? {
                table.add_column(Column::from_json(&column, options)?, false)?;
            }
        }

        if let Some(indexes) = definition.get("indexes") {
            for index in named_items("indexes", indexes)? {
                table.add_index(Index::from_json(&index, options)?)?;
            }
        }

        if let Some(constraints) = definition.get(FOREIGN_KEYS_KEY) {
            for constraint in named_items(FOREIGN_KEYS_KEY, constraints)? {
                table.add_foreign_key_constraint(ForeignKeyConstraint::from_json(
                    &constraint,
                    options,
                )?)?;
            }
        }

        if let Some(triggers) = definition.get("triggers") {
            for trigger in named_items("triggers", triggers)? {
                let trigger = table.with_trigger_defaults(trigger);
                table.add_trigger(Trigger::from_json(&trigger, options)?)?;
            }
        }

        table.verify()?;
        Ok(table)
    }

    /// Reads and parses a JSON definition file.
    pub fn from_file(path: &Path, options: &ModelOptions) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&contents)?;
        Self::from_json(&value, options)
    }

    /// Triggers default their table to this table and their schema to this
    /// table's schema.
    fn with_trigger_defaults(&self, trigger: Value) -> Value {
        let Value::Object(mut map) = trigger else {
            return trigger;
        };
        if !map.contains_key("table") {
            map.insert("table".to_string(), Value::String(self.name.clone()));
        }
        if let (false, Some(schema)) = (map.contains_key("schema"), &self.schema) {
            map.insert("schema".to_string(), Value::String(schema.clone()));
        }
        Value::Object(map)
    }

    // ====================================================================
    // Properties
    // ====================================================================

    /// Renames the table. Triggers attached to the old name follow it.
    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        for trigger in &mut self.triggers {
            if trigger.table() == self.name {
                trigger.set_table(name.clone());
            }
        }
        self.name = name;
    }

    /// Sets the schema. Triggers without a schema of their own inherit it.
    pub fn set_schema(&mut self, schema: Option<String>) {
        self.schema = schema;
        for trigger in &mut self.triggers {
            trigger.inherit_schema(self.schema.as_deref());
        }
    }

    /// Returns the storage engine, if set.
    #[must_use]
    pub fn engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    /// Sets the storage engine.
    pub fn set_engine(&mut self, engine: Option<String>) {
        self.engine = engine;
    }

    /// Returns the table comment, if set.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Sets the table comment.
    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }

    // ====================================================================
    // Columns, indexes, triggers
    // ====================================================================

    /// Adds a column. A column with the same name is replaced only when
    /// `overwrite` is set; otherwise it is an error.
    pub fn add_column(&mut self, column: Column, overwrite: bool) -> Result<&mut Self> {
        insert_item(&mut self.columns, column, overwrite, &self.name)?;
        Ok(self)
    }

    /// Returns the column called `name`.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        find_item(&self.columns, name)
    }

    /// Returns the columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the column names in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(NamedEntity::name).collect()
    }

    /// Removes all columns.
    pub fn delete_columns(&mut self) -> &mut Self {
        self.columns.clear();
        self
    }

    /// Adds an index. Duplicate names are an error.
    pub fn add_index(&mut self, index: Index) -> Result<&mut Self> {
        insert_item(&mut self.indexes, index, false, &self.name)?;
        Ok(self)
    }

    /// Returns the index called `name`.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        find_item(&self.indexes, name)
    }

    /// Returns the indexes in order.
    #[must_use]
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Removes all indexes.
    pub fn delete_indexes(&mut self) -> &mut Self {
        self.indexes.clear();
        self
    }

    /// Adds a foreign key constraint. Duplicate names are an error.
    pub fn add_foreign_key_constraint(
        &mut self,
        constraint: ForeignKeyConstraint,
    ) -> Result<&mut Self> {
        insert_item(&mut self.foreign_key_constraints, constraint, false, &self.name)?;
        Ok(self)
    }

    /// Returns the foreign key constraint called `name`.
    #[must_use]
    pub fn foreign_key_constraint(&self, name: &str) -> Option<&ForeignKeyConstraint> {
        find_item(&self.foreign_key_constraints, name)
    }

    /// Returns the foreign key constraints in order.
    #[must_use]
    pub fn foreign_key_constraints(&self) -> &[ForeignKeyConstraint] {
        &self.foreign_key_constraints
    }

    /// Removes all foreign key constraints.
    pub fn delete_foreign_key_constraints(&mut self) -> &mut Self {
        self.foreign_key_constraints.clear();
        self
    }

    /// Adds a trigger. Duplicate names are an error. The trigger keeps its
    /// own schema; an unset schema resolves to the table's when SQL is
    /// generated.
    pub fn add_trigger(&mut self, trigger: Trigger) -> Result<&mut Self> {
        insert_item(&mut self.triggers, trigger, false, &self.name)?;
        Ok(self)
    }

    /// Returns the trigger called `name`.
    #[must_use]
    pub fn trigger(&self, name: &str) -> Option<&Trigger> {
        find_item(&self.triggers, name)
    }

    /// Returns the triggers in order.
    #[must_use]
    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// Removes all triggers.
    pub fn delete_triggers(&mut self) -> &mut Self {
        self.triggers.clear();
        self
    }

    /// Checks that every index and foreign key constraint references
    /// existing columns.
    pub fn verify(&self) -> Result<()> {
        let references = self
            .indexes
            .iter()
            .map(|index| (format!("index '{}'", index.name()), index.columns()))
            .chain(self.foreign_key_constraints.iter().map(|constraint| {
                (
                    format!("foreign key constraint '{}'", constraint.name()),
                    constraint.columns(),
                )
            }));
        for (item, columns) in references {
            let missing: Vec<String> = columns
                .iter()
                .filter(|column| self.column(column).is_none())
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(DbEntityError::UndefinedColumns {
                    context: format!("{item} on table '{}'", self.name),
                    columns: missing,
                });
            }
        }
        Ok(())
    }

    /// Trigger with its schema resolved against this table.
    fn resolved_trigger(&self, trigger: &Trigger) -> Trigger {
        let mut trigger = trigger.clone();
        trigger.inherit_schema(self.schema.as_deref());
        trigger
    }

    fn sql_name(&self, include_schema: bool) -> String {
        if include_schema {
            self.full_name()
        } else {
            self.quoted_name()
        }
    }

    // ====================================================================
    // SQL generation
    // ====================================================================

    /// Renders `CREATE TABLE IF NOT EXISTS` followed by one CREATE TRIGGER
    /// statement per trigger.
    pub fn create_sql(&self, include_schema: bool) -> Result<Vec<String>> {
        if self.columns.is_empty() {
            return Err(DbEntityError::EmptyTable(self.name.clone()));
        }

        let items: Vec<String> = self
            .columns
            .iter()
            .map(|column| column.create_sql(include_schema))
            .chain(self.indexes.iter().map(|index| index.create_sql(include_schema)))
            .chain(
                self.foreign_key_constraints
                    .iter()
                    .map(|constraint| constraint.create_sql(include_schema)),
            )
            .collect();

        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            self.sql_name(include_schema),
            items.join(",\n  ")
        );
        if let Some(engine) = &self.engine {
            sql.push_str(&format!(" ENGINE = {engine}"));
        }
        if let Some(comment) = &self.comment {
            sql.push_str(&format!(" COMMENT = '{}'", escape_string(comment)));
        }
        sql.push(';');

        let mut statements = vec![sql];
        statements.extend(
            self.triggers
                .iter()
                .map(|trigger| self.resolved_trigger(trigger).create_sql(include_schema)),
        );
        Ok(statements)
    }

    /// Computes the statements that turn this (current) table into
    /// `desired`.
    ///
    /// Column, index, engine and comment changes are folded into a single
    /// `ALTER TABLE`; trigger changes follow as separate statements. An
    /// added column whose `rename_from` hint names a dropped column becomes
    /// a `CHANGE COLUMN` instead of an ADD/DROP pair. Returns an empty list
    /// when the tables are equivalent.
    #[must_use]
    pub fn alter_sql(&self, desired: &Self, include_schema: bool) -> Vec<String> {
        let mut alterations = Vec::new();

        if let Some(engine) = &desired.engine {
            let same = self
                .engine
                .as_deref()
                .is_some_and(|current| current.eq_ignore_ascii_case(engine));
            if !same {
                alterations.push(format!("ENGINE = {engine}"));
            }
        }
        if let Some(comment) = &desired.comment {
            if self.comment.as_ref() != Some(comment) {
                alterations.push(format!("COMMENT = '{}'", escape_string(comment)));
            }
        }

        alterations.extend(self.column_alterations(desired, include_schema));
        alterations.extend(self.index_alterations(desired, include_schema));
        alterations.extend(self.foreign_key_alterations(desired, include_schema));

        let mut statements = Vec::new();
        if !alterations.is_empty() {
            statements.push(format!(
                "ALTER TABLE {}\n{};",
                self.sql_name(include_schema),
                alterations.join(",\n")
            ));
        }
        statements.extend(self.trigger_statements(desired, include_schema));

        debug!(table = %self.name, statements = statements.len(), "Computed table alterations");
        statements
    }

    fn column_alterations(&self, desired: &Self, include_schema: bool) -> Vec<String> {
        let NamePartition {
            mut dropped,
            mut added,
            common,
        } = NamePartition::of(&self.columns, &desired.columns);

        let mut renames: Vec<(&str, &Column)> = Vec::new();
        added.retain(|name| {
            let Some(column) = desired.column(name) else {
                return true;
            };
            match column.renamed_from() {
                Some(from) if dropped.contains(&from) => {
                    dropped.retain(|dropped_name| *dropped_name != from);
                    renames.push((from, column));
                    false
                }
                _ => true,
            }
        });

        let mut alterations = Vec::new();
        for column in added.iter().filter_map(|name| desired.column(name)) {
            alterations.push(format!("ADD COLUMN {}", column.create_sql(include_schema)));
        }
        for name in &dropped {
            alterations.push(format!("DROP COLUMN {}", self.quote(name)));
        }
        for name in &common {
            if let (Some(current), Some(wanted)) = (self.column(name), desired.column(name)) {
                if !wanted.compare(current).is_equal() {
                    alterations.push(format!(
                        "CHANGE COLUMN {} {}",
                        self.quote(name),
                        wanted.alter_sql(include_schema)
                    ));
                }
            }
        }
        for (from, column) in renames {
            debug!(table = %self.name, from, to = %column.name(), "Renaming column");
            alterations.push(format!(
                "CHANGE COLUMN {} {}",
                self.quote(from),
                column.alter_sql(include_schema)
            ));
        }
        alterations
    }

    fn index_alterations(&self, desired: &Self, include_schema: bool) -> Vec<String> {
        let partition = NamePartition::of(&self.indexes, &desired.indexes);
        let mut alterations = Vec::new();
        for index in partition.dropped.iter().filter_map(|name| self.index(name)) {
            alterations.push(index.drop_sql());
        }
        for index in partition.added.iter().filter_map(|name| desired.index(name)) {
            alterations.push(format!("ADD {}", index.create_sql(include_schema)));
        }
        for name in &partition.common {
            if let (Some(current), Some(wanted)) = (self.index(name), desired.index(name)) {
                if !wanted.compare(current).is_equal() {
                    alterations.push(current.drop_sql());
                    alterations.push(format!("ADD {}", wanted.create_sql(include_schema)));
                }
            }
        }
        alterations
    }

    /// Dropped constraints first, then added ones, then changed ones as a
    /// drop and re-add.
    fn foreign_key_alterations(&self, desired: &Self, include_schema: bool) -> Vec<String> {
        let partition =
            NamePartition::of(&self.foreign_key_constraints, &desired.foreign_key_constraints);
        let mut alterations = Vec::new();
        for constraint in partition
            .dropped
            .iter()
            .filter_map(|name| self.foreign_key_constraint(name))
        {
            alterations.push(constraint.drop_sql());
        }
        for constraint in partition
            .added
            .iter()
            .filter_map(|name| desired.foreign_key_constraint(name))
        {
            alterations.push(format!("ADD {}", constraint.create_sql(include_schema)));
        }
        for name in &partition.common {
            if let (Some(current), Some(wanted)) = (
                self.foreign_key_constraint(name),
                desired.foreign_key_constraint(name),
            ) {
                if !wanted.compare(current).is_equal() {
                    alterations.push(current.drop_sql());
                    alterations.push(format!("ADD {}", wanted.create_sql(include_schema)));
                }
            }
        }
        alterations
    }

    fn trigger_statements(&self, desired: &Self, include_schema: bool) -> Vec<String> {
        let partition = NamePartition::of(&self.triggers, &desired.triggers);
        let mut statements = Vec::new();
        for trigger in partition.dropped.iter().filter_map(|name| self.trigger(name)) {
            statements.push(self.resolved_trigger(trigger).drop_sql(include_schema));
        }
        for name in &partition.common {
            if let (Some(current), Some(wanted)) = (self.trigger(name), desired.trigger(name)) {
                let current = self.resolved_trigger(current);
                let wanted = desired.resolved_trigger(wanted);
                if !wanted.compare(&current).is_equal() {
                    statements.push(current.drop_sql(include_schema));
                    statements.push(wanted.create_sql(include_schema));
                }
            }
        }
        for trigger in partition.added.iter().filter_map(|name| desired.trigger(name)) {
            statements.push(desired.resolved_trigger(trigger).create_sql(include_schema));
        }
        statements
    }

    // ====================================================================
    // Serialization
    // ====================================================================

    /// Serializes the table to its declarative form. In succinct form
    /// columns and indexes are positional arrays.
    #[must_use]
    pub fn to_json_obj(&self, succinct: bool, include_schema: bool) -> Value {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        if let (true, Some(schema)) = (include_schema, &self.schema) {
            map.insert("schema".to_string(), Value::String(schema.clone()));
        }
        if let Some(engine) = &self.engine {
            map.insert("engine".to_string(), Value::String(engine.clone()));
        }
        if let Some(comment) = &self.comment {
            map.insert("comment".to_string(), Value::String(comment.clone()));
        }
        map.insert("columns".to_string(), items_to_json(&self.columns, succinct));
        if !self.indexes.is_empty() {
            map.insert("indexes".to_string(), items_to_json(&self.indexes, succinct));
        }
        if !self.foreign_key_constraints.is_empty() {
            map.insert(
                FOREIGN_KEYS_KEY.to_string(),
                items_to_json(&self.foreign_key_constraints, succinct),
            );
        }
        if !self.triggers.is_empty() {
            map.insert("triggers".to_string(), items_to_json(&self.triggers, succinct));
        }
        Value::Object(map)
    }

    /// Serializes the table to pretty-printed JSON.
    pub fn to_json(&self, succinct: bool, include_schema: bool) -> Result<String> {
        Ok(serde_json::to_string_pretty(
            &self.to_json_obj(succinct, include_schema),
        )?)
    }
}

impl NamedEntity for Table {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn quote_char(&self) -> &str {
        &self.quote_char
    }
}

/// Names of items only in the current set, only in the desired set, and in
/// both. Each list keeps the order of the set it came from.
struct NamePartition<'a> {
    dropped: Vec<&'a str>,
    added: Vec<&'a str>,
    common: Vec<&'a str>,
}

impl<'a> NamePartition<'a> {
    fn of<T: TableItem>(current: &'a [T], desired: &'a [T]) -> Self {
        let in_desired = |name: &str| desired.iter().any(|item| item.matches_name(name));
        let in_current = |name: &str| current.iter().any(|item| item.matches_name(name));

        Self {
            dropped: current
                .iter()
                .map(NamedEntity::name)
                .filter(|name| !in_desired(name))
                .collect(),
            added: desired
                .iter()
                .map(NamedEntity::name)
                .filter(|name| !in_current(name))
                .collect(),
            common: desired
                .iter()
                .map(NamedEntity::name)
                .filter(|name| in_current(name))
                .collect(),
        }
    }
}

fn find_item<'a, T: TableItem>(items: &'a [T], name: &str) -> Option<&'a T> {
    items.iter().find(|item| item.matches_name(name))
}

fn insert_item<T: TableItem>(items: &mut Vec<T>, item: T, overwrite: bool, owner: &str) -> Result<()> {
    match items.iter().position(|existing| existing.matches_name(item.name())) {
        Some(_) if !overwrite => Err(DbEntityError::Duplicate {
            kind: T::KIND,
            name: item.name().to_string(),
            owner: owner.to_string(),
        }),
        Some(position) => {
            items[position] = item;
            Ok(())
        }
        None => {
            items.push(item);
            Ok(())
        }
    }
}

fn items_to_json<T: TableItem>(items: &[T], succinct: bool) -> Value {
    Value::Array(items.iter().map(|item| item.to_json_obj(succinct)).collect())
}

/// Accepts a list of definitions or an object keyed by name. In the keyed
/// form an object definition without a name takes its key.
fn named_items(key: &str, value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => Ok(map
            .iter()
            .filter(|(name, _)| !is_comment(name))
            .map(|(name, definition)| match definition {
                Value::Object(fields) if !fields.contains_key("name") => {
                    let mut fields = fields.clone();
                    fields.insert("name".to_string(), Value::String(name.clone()));
                    Value::Object(fields)
                }
                other => other.clone(),
            })
            .collect()),
        other => Err(DbEntityError::invalid(
            "table",
            key,
            format!("expected an array or object, got {}", describe(other)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn table(value: Value) -> Table {
        Table::from_json(&value, &ModelOptions::default()).unwrap()
    }

    fn sample() -> Table {
        table(json!({
            "#": "job facts",
            "name": "jobfact",
            "schema": "modw",
            "engine": "InnoDB",
            "comment": "Per-job facts",
            "columns": [
                {"name": "id", "type": "int(11)", "nullable": false, "extra": "auto_increment"},
                {"name": "user", "type": "varchar(64)", "nullable": true, "comment": "login"},
                ["ts", "timestamp", "not null", "CURRENT_TIMESTAMP", "on update CURRENT_TIMESTAMP"]
            ],
            "indexes": [
                {"name": "PRIMARY", "columns": ["id"]},
                {"name": "idx_user", "columns": ["user"], "is_unique": false}
            ],
            "triggers": [
                {"name": "jobfact_ins", "time": "AFTER", "event": "INSERT", "body": "SET @n = 1;"}
            ]
        }))
    }

    #[test]
    fn test_create_sql() {
        let statements = sample().create_sql(true).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0],
            "CREATE TABLE IF NOT EXISTS `modw`.`jobfact` (\n  \
             `id` int(11) NOT NULL auto_increment,\n  \
             `user` varchar(64) NULL COMMENT 'login',\n  \
             `ts` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP on update CURRENT_TIMESTAMP,\n  \
             PRIMARY KEY (`id`),\n  \
             INDEX `idx_user` (`user`)\n\
             ) ENGINE = InnoDB COMMENT = 'Per-job facts';"
        );
        assert_eq!(
            statements[1],
            "CREATE TRIGGER `modw`.`jobfact_ins` AFTER INSERT ON `modw`.`jobfact` FOR EACH ROW\nBEGIN\nSET @n = 1;\nEND"
        );
    }

    #[test]
    fn test_trigger_defaults_from_table() {
        let t = sample();
        let trigger = t.trigger("jobfact_ins").unwrap();
        assert_eq!(trigger.table(), "jobfact");
        assert_eq!(trigger.schema(), Some("modw"));
    }

    #[test]
    fn test_set_schema_propagates_to_unset_triggers() {
        let mut t = Table::new("facts");
        t.add_column(Column::new("id", "int"), false).unwrap();
        t.add_trigger(Trigger::new("a", "AFTER", "INSERT", "facts", "SET @a = 1;"))
            .unwrap();
        t.add_trigger(
            Trigger::new("b", "AFTER", "INSERT", "facts", "SET @b = 1;").with_schema("other"),
        )
        .unwrap();
        t.set_schema(Some("modw".to_string()));
        assert_eq!(t.trigger("a").unwrap().schema(), Some("modw"));
        assert_eq!(t.trigger("b").unwrap().schema(), Some("other"));
    }

    #[test]
    fn test_columns_as_object() {
        let t = table(json!({
            "name": "t",
            "columns": {
                "#": "keyed by name",
                "a": {"type": "int"},
                "b": ["b", "int"]
            }
        }));
        assert_eq!(t.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicates() {
        let mut t = Table::new("t");
        t.add_column(Column::new("a", "int"), false).unwrap();
        let err = t.add_column(Column::new("a", "bigint"), false).unwrap_err();
        assert!(matches!(err, DbEntityError::Duplicate { kind: "column", .. }));
        t.add_column(Column::new("a", "bigint"), true).unwrap();
        assert_eq!(t.column("a").unwrap().column_type(), "bigint");
        assert_eq!(t.columns().len(), 1);

        t.add_index(Index::new("i", vec!["a".to_string()])).unwrap();
        assert!(t.add_index(Index::new("i", vec!["a".to_string()])).is_err());
    }

    #[test]
    fn test_verify_rejects_unknown_index_column() {
        let err = Table::from_json(
            &json!({
                "name": "t",
                "columns": [{"name": "a", "type": "int"}],
                "indexes": [{"name": "i", "columns": ["a", "b"]}]
            }),
            &ModelOptions::default(),
        )
        .unwrap_err();
        match err {
            DbEntityError::UndefinedColumns { columns, .. } => assert_eq!(columns, vec!["b"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_diff_is_empty() {
        let t = sample();
        assert!(t.alter_sql(&t, true).is_empty());
        assert!(t.alter_sql(&t, false).is_empty());
    }

    #[test]
    fn test_concrete_column_change() {
        let current = table(json!({"name": "t", "columns": [
            {"name": "id", "type": "int"}, {"name": "val", "type": "varchar(10)"}
        ]}));
        let desired = table(json!({"name": "t", "columns": [
            {"name": "id", "type": "int"}, {"name": "val", "type": "varchar(20)"}
        ]}));
        let statements = current.alter_sql(&desired, false);
        assert_eq!(statements, vec!["ALTER TABLE `t`\nCHANGE COLUMN `val` `val` varchar(20);"]);
    }

    #[test]
    fn test_rename_hint() {
        let current = table(json!({"name": "t", "columns": [
            {"name": "a", "type": "int"}, {"name": "b", "type": "int"}
        ]}));
        let desired = table(json!({"name": "t", "columns": [
            {"name": "b", "type": "int"},
            {"name": "c", "type": "int", "hints": {"rename_from": "a"}}
        ]}));
        let statements = current.alter_sql(&desired, false);
        assert_eq!(statements, vec!["ALTER TABLE `t`\nCHANGE COLUMN `a` `c` int;"]);
    }

    #[test]
    fn test_rename_hint_ignored_when_source_kept() {
        let current = table(json!({"name": "t", "columns": [{"name": "a", "type": "int"}]}));
        let desired = table(json!({"name": "t", "columns": [
            {"name": "a", "type": "int"},
            {"name": "c", "type": "int", "hints": {"rename_from": "a"}}
        ]}));
        assert_eq!(
            current.alter_sql(&desired, false),
            vec!["ALTER TABLE `t`\nADD COLUMN `c` int;"]
        );
    }

    #[test]
    fn test_full_alter_ordering() {
        let current = table(json!({
            "name": "t",
            "engine": "MyISAM",
            "columns": [
                {"name": "id", "type": "int"},
                {"name": "old", "type": "int"},
                {"name": "v", "type": "int"}
            ],
            "indexes": [
                {"name": "idx_old", "columns": ["old"]},
                {"name": "idx_v", "columns": ["v"]}
            ],
            "triggers": [
                {"name": "gone", "time": "AFTER", "event": "INSERT", "body": "SET @a = 1;"},
                {"name": "kept", "time": "AFTER", "event": "UPDATE", "body": "SET @b = 1;"}
            ]
        }));
        let desired = table(json!({
            "name": "t",
            "engine": "InnoDB",
            "comment": "facts",
            "columns": [
                {"name": "id", "type": "int"},
                {"name": "v", "type": "bigint"},
                {"name": "n", "type": "int", "nullable": false, "default": 0}
            ],
            "indexes": [
                {"name": "idx_v", "columns": ["v", "id"]},
                {"name": "idx_n", "columns": ["n"], "is_unique": true}
            ],
            "triggers": [
                {"name": "kept", "time": "AFTER", "event": "UPDATE", "body": "SET @b = 2;"},
                {"name": "new", "time": "BEFORE", "event": "DELETE", "body": "SET @c = 1;"}
            ]
        }));

        let statements = current.alter_sql(&desired, false);
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE `t`\n\
                 ENGINE = InnoDB,\n\
                 COMMENT = 'facts',\n\
                 ADD COLUMN `n` int NOT NULL DEFAULT 0,\n\
                 DROP COLUMN `old`,\n\
                 CHANGE COLUMN `v` `v` bigint,\n\
                 DROP INDEX `idx_old`,\n\
                 ADD UNIQUE INDEX `idx_n` (`n`),\n\
                 DROP INDEX `idx_v`,\n\
                 ADD INDEX `idx_v` (`v`, `id`);"
                    .to_string(),
                "DROP TRIGGER `gone`;".to_string(),
                "DROP TRIGGER `kept`;".to_string(),
                "CREATE TRIGGER `kept` AFTER UPDATE ON `t` FOR EACH ROW\nBEGIN\nSET @b = 2;\nEND"
                    .to_string(),
                "CREATE TRIGGER `new` BEFORE DELETE ON `t` FOR EACH ROW\nBEGIN\nSET @c = 1;\nEND"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_unset_engine_and_comment_not_altered() {
        let current = table(json!({"name": "t", "engine": "InnoDB", "comment": "x", "columns": [["a", "int"]]}));
        let desired = table(json!({"name": "t", "columns": [["a", "int"]]}));
        assert!(current.alter_sql(&desired, false).is_empty());

        let desired = table(json!({"name": "t", "engine": "innodb", "columns": [["a", "int"]]}));
        assert!(current.alter_sql(&desired, false).is_empty());
    }

    #[test]
    fn test_round_trip() {
        let t = sample();
        for succinct in [false, true] {
            let parsed = table(t.to_json_obj(succinct, true));
            assert_eq!(parsed.create_sql(true).unwrap(), t.create_sql(true).unwrap());
        }
    }

    #[test]
    fn test_empty_table_create_fails() {
        let err = Table::new("t").create_sql(false).unwrap_err();
        assert!(matches!(err, DbEntityError::EmptyTable(_)));
    }

    #[test]
    fn test_from_file_with_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(
            &path,
            r#"{"table_definition": {"name": "t", "columns": [["a", "int"]]}}"#,
        )
        .unwrap();
        let t = Table::from_file(&path, &ModelOptions::default()).unwrap();
        assert_eq!(t.name(), "t");
    }

    #[test]
    fn test_primary_key_spelling_is_idempotent() {
        let current = table(json!({
            "name": "t",
            "columns": [["id", "int"], ["a", "int"]],
            "indexes": [
                {"name": "PRIMARY", "columns": ["id"]},
                {"name": "index_a", "columns": ["a"]}
            ]
        }));
        let desired = table(json!({
            "name": "t",
            "columns": [["id", "int"], ["a", "int"]],
            "indexes": [
                {"name": "primary", "columns": ["id"]},
                {"name": "Index_A", "columns": ["a"]}
            ]
        }));
        assert!(current.alter_sql(&desired, false).is_empty());
        assert!(desired.index("PRIMARY").is_some());
        assert!(desired.index("index_a").is_some());
    }

    fn with_foreign_keys(constraints: Value) -> Table {
        table(json!({
            "name": "job",
            "columns": [["id", "int"], ["person_id", "int"], ["resource_id", "int"]],
            "foreign_key_constraints": constraints
        }))
    }

    #[test]
    fn test_foreign_keys_in_create_sql() {
        let t = with_foreign_keys(json!([
            {"columns": ["person_id"], "referenced_table": "person", "referenced_columns": ["id"],
             "on_delete": "cascade"}
        ]));
        assert_eq!(
            t.create_sql(false).unwrap(),
            vec![
                "CREATE TABLE IF NOT EXISTS `job` (\n  \
                 `id` int,\n  \
                 `person_id` int,\n  \
                 `resource_id` int,\n  \
                 CONSTRAINT `fk_person_id` FOREIGN KEY (`person_id`) REFERENCES `person` (`id`) ON DELETE CASCADE\n\
                 );"
                    .to_string()
            ]
        );
        let reparsed = table(t.to_json_obj(true, false));
        assert_eq!(reparsed, t);
    }

    #[test]
    fn test_foreign_key_alterations() {
        let current = with_foreign_keys(json!([
            {"name": "fk_gone", "columns": ["resource_id"], "referenced_table": "resource",
             "referenced_columns": ["id"]},
            {"name": "fk_person", "columns": ["person_id"], "referenced_table": "person",
             "referenced_columns": ["id"], "on_delete": "RESTRICT"}
        ]));
        let desired = with_foreign_keys(json!([
            {"name": "fk_person", "columns": ["person_id"], "referenced_table": "person",
             "referenced_columns": ["id"], "on_delete": "CASCADE"},
            {"name": "fk_self", "columns": ["id"], "referenced_table": "job_archive",
             "referenced_columns": ["id"]}
        ]));
        assert_eq!(
            current.alter_sql(&desired, false),
            vec![
                "ALTER TABLE `job`\n\
                 DROP FOREIGN KEY `fk_gone`,\n\
                 ADD CONSTRAINT `fk_self` FOREIGN KEY (`id`) REFERENCES `job_archive` (`id`),\n\
                 DROP FOREIGN KEY `fk_person`,\n\
                 ADD CONSTRAINT `fk_person` FOREIGN KEY (`person_id`) REFERENCES `person` (`id`) ON DELETE CASCADE;"
                    .to_string()
            ]
        );
        assert!(desired.alter_sql(&desired, false).is_empty());
    }

    #[test]
    fn test_verify_rejects_unknown_foreign_key_column() {
        let err = Table::from_json(
            &json!({
                "name": "t",
                "columns": [["a", "int"]],
                "foreign_key_constraints": [
                    {"columns": ["b"], "referenced_table": "u", "referenced_columns": ["id"]}
                ]
            }),
            &ModelOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DbEntityError::UndefinedColumns { ref context, .. } if context.starts_with("foreign key constraint 'fk_b'")
        ));
    }

    #[test]
    fn test_rename_moves_attached_triggers() {
        let mut t = sample();
        t.add_trigger(Trigger::new("elsewhere", "AFTER", "INSERT", "other", "SET @x = 1;"))
            .unwrap();
        t.set_name("jobfact_2024");
        assert_eq!(t.trigger("jobfact_ins").unwrap().table(), "jobfact_2024");
        assert_eq!(t.trigger("elsewhere").unwrap().table(), "other");
    }
}
