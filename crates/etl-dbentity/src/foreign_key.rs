//! Foreign key constraint definition.

use serde_json::{Map, Value};
use tracing::debug;

use crate::entity::{
    describe, string_list, trim_trailing_nulls, Comparison, Definition, NamedEntity, TableItem,
};
use crate::error::{DbEntityError, Result};
use crate::options::ModelOptions;

const PROPERTIES: &[&str] = &[
    "name",
    "columns",
    "referenced_table",
    "referenced_columns",
    "on_delete",
    "on_update",
];

/// Positional order of the succinct array form.
const POSITIONS: &[&str] = PROPERTIES;

/// Referential actions MySQL accepts for ON DELETE and ON UPDATE.
const ACTIONS: &[&str] = &["RESTRICT", "NO ACTION", "CASCADE", "SET NULL", "SET DEFAULT"];

/// InnoDB's action when none is declared. `NO ACTION` behaves the same.
const DEFAULT_ACTION: &str = "RESTRICT";

/// Generated names switch to a digest past this many characters.
const MAX_GENERATED_NAME_LEN: usize = 32;

/// A foreign key from table columns to the columns of a referenced table.
///
/// ```
/// use etl_dbentity::{ForeignKeyConstraint, TableItem};
///
/// let fk = ForeignKeyConstraint::new(
///     vec!["person_id".to_string()],
///     "person",
///     vec!["id".to_string()],
/// )
/// .on_delete("cascade")
/// .unwrap();
/// assert_eq!(
///     fk.create_sql(false),
///     "CONSTRAINT `fk_person_id` FOREIGN KEY (`person_id`) REFERENCES `person` (`id`) ON DELETE CASCADE"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyConstraint {
    name: String,
    columns: Vec<String>,
    referenced_table: String,
    referenced_columns: Vec<String>,
    on_delete: Option<String>,
    on_update: Option<String>,
    quote_char: String,
}

impl ForeignKeyConstraint {
    /// Creates a constraint named after its columns.
    #[must_use]
    pub fn new(
        columns: Vec<String>,
        referenced_table: impl Into<String>,
        referenced_columns: Vec<String>,
    ) -> Self {
        Self {
            name: Self::generated_name(&columns),
            columns,
            referenced_table: referenced_table.into(),
            referenced_columns,
            on_delete: None,
            on_update: None,
            quote_char: ModelOptions::default().quote_char,
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the identifier quote character.
    #[must_use]
    pub fn with_quote_char(mut self, quote_char: impl Into<String>) -> Self {
        self.quote_char = quote_char.into();
        self
    }

    /// Sets the ON DELETE action.
    pub fn on_delete(mut self, action: &str) -> Result<Self> {
        self.on_delete = Some(parse_action("on_delete", action)?);
        Ok(self)
    }

    /// Sets the ON UPDATE action.
    pub fn on_update(mut self, action: &str) -> Result<Self> {
        self.on_update = Some(parse_action("on_update", action)?);
        Ok(self)
    }

    /// Returns the constrained columns in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the referenced table, optionally `schema.table`.
    #[must_use]
    pub fn referenced_table(&self) -> &str {
        &self.referenced_table
    }

    /// Returns the referenced columns in order.
    #[must_use]
    pub fn referenced_columns(&self) -> &[String] {
        &self.referenced_columns
    }

    /// Returns the ON DELETE action, if declared.
    #[must_use]
    pub fn delete_action(&self) -> Option<&str> {
        self.on_delete.as_deref()
    }

    /// Returns the ON UPDATE action, if declared.
    #[must_use]
    pub fn update_action(&self) -> Option<&str> {
        self.on_update.as_deref()
    }

    /// Renders the clause that removes this constraint inside an ALTER TABLE.
    #[must_use]
    pub fn drop_sql(&self) -> String {
        format!("DROP FOREIGN KEY {}", self.quoted_name())
    }

    fn generated_name(columns: &[String]) -> String {
        let joined = columns.join("_");
        if joined.len() <= MAX_GENERATED_NAME_LEN {
            format!("fk_{joined}")
        } else {
            format!("fk_{:x}", md5::compute(joined.as_bytes()))
        }
    }

    /// Columns arrive either as an array or, from the information catalog,
    /// as a comma-separated list.
    fn parse_columns(key: &str, value: &Value) -> Result<Vec<String>> {
        let columns = match value {
            Value::String(list) => list
                .split(',')
                .map(str::trim)
                .filter(|column| !column.is_empty())
                .map(ToString::to_string)
                .collect(),
            Value::Array(_) => string_list("foreign key constraint", key, value)?,
            other => {
                return Err(DbEntityError::invalid(
                    "foreign key constraint",
                    key,
                    format!("expected an array, got {}", describe(other)),
                ))
            }
        };
        if columns.is_empty() {
            return Err(DbEntityError::invalid(
                "foreign key constraint",
                key,
                "at least one column is required",
            ));
        }
        Ok(columns)
    }

    /// `schema.table` references quote each part.
    fn quoted_reference(&self) -> String {
        self.referenced_table
            .split('.')
            .map(|part| self.quote(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn quoted_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|column| self.quote(column))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Upper-cases and validates a referential action.
fn parse_action(property: &str, action: &str) -> Result<String> {
    let action = action.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    if ACTIONS.contains(&action.as_str()) {
        Ok(action)
    } else {
        Err(DbEntityError::invalid(
            "foreign key constraint",
            property,
            format!("'{action}' is not one of {}", ACTIONS.join(", ")),
        ))
    }
}

fn effective_action(action: Option<&str>) -> &str {
    match action {
        None | Some("NO ACTION") => DEFAULT_ACTION,
        Some(action) => action,
    }
}

impl NamedEntity for ForeignKeyConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        None
    }

    fn quote_char(&self) -> &str {
        &self.quote_char
    }
}

impl TableItem for ForeignKeyConstraint {
    const KIND: &'static str = "foreign key constraint";

    fn from_json(value: &Value, options: &ModelOptions) -> Result<Self> {
        if let Value::Array(items) = value {
            let map: Map<String, Value> = POSITIONS
                .iter()
                .zip(items)
                .map(|(key, value)| ((*key).to_string(), value.clone()))
                .collect();
            return Self::from_json(&Value::Object(map), options);
        }

        let definition = Definition::parse(
            "foreign key constraint",
            value,
            PROPERTIES,
            &["columns", "referenced_table", "referenced_columns"],
        )?;
        let list = |key: &str| -> Result<Vec<String>> {
            definition
                .get(key)
                .map_or_else(|| Ok(Vec::new()), |value| Self::parse_columns(key, value))
        };
        let action = |key: &str| -> Result<Option<String>> {
            definition
                .non_empty_string(key)?
                .map(|action| parse_action(key, &action))
                .transpose()
        };

        let columns = list("columns")?;
        let referenced_columns = list("referenced_columns")?;
        if columns.len() != referenced_columns.len() {
            return Err(DbEntityError::invalid(
                "foreign key constraint",
                "referenced_columns",
                format!(
                    "{} columns reference {} columns",
                    columns.len(),
                    referenced_columns.len()
                ),
            ));
        }

        Ok(Self {
            name: definition
                .non_empty_string("name")?
                .unwrap_or_else(|| Self::generated_name(&columns)),
            columns,
            referenced_table: definition.required_string("referenced_table")?,
            referenced_columns,
            on_delete: action("on_delete")?,
            on_update: action("on_update")?,
            quote_char: options.quote_char.clone(),
        })
    }

    fn compare(&self, other: &Self) -> Comparison {
        let same = self.name == other.name
            && self.columns == other.columns
            && self.referenced_table == other.referenced_table
            && self.referenced_columns == other.referenced_columns
            && effective_action(self.delete_action()) == effective_action(other.delete_action())
            && effective_action(self.update_action()) == effective_action(other.update_action());
        if same {
            Comparison::Equal
        } else {
            debug!(
                constraint = %self.name,
                desired = ?self,
                current = ?other,
                "Foreign key constraints differ"
            );
            Comparison::Different
        }
    }

    fn create_sql(&self, _include_schema: bool) -> String {
        let mut sql = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quoted_name(),
            self.quoted_list(&self.columns),
            self.quoted_reference(),
            self.quoted_list(&self.referenced_columns),
        );
        if let Some(action) = &self.on_delete {
            sql.push_str(&format!(" ON DELETE {action}"));
        }
        if let Some(action) = &self.on_update {
            sql.push_str(&format!(" ON UPDATE {action}"));
        }
        sql
    }

    fn to_json_obj(&self, succinct: bool) -> Value {
        let list = |columns: &[String]| {
            Value::Array(columns.iter().cloned().map(Value::String).collect())
        };
        let on_delete = self.on_delete.clone().map_or(Value::Null, Value::String);
        let on_update = self.on_update.clone().map_or(Value::Null, Value::String);

        if succinct {
            return trim_trailing_nulls(vec![
                Value::String(self.name.clone()),
                list(&self.columns),
                Value::String(self.referenced_table.clone()),
                list(&self.referenced_columns),
                on_delete,
                on_update,
            ]);
        }

        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("columns".to_string(), list(&self.columns));
        map.insert(
            "referenced_table".to_string(),
            Value::String(self.referenced_table.clone()),
        );
        map.insert("referenced_columns".to_string(), list(&self.referenced_columns));
        if !on_delete.is_null() {
            map.insert("on_delete".to_string(), on_delete);
        }
        if !on_update.is_null() {
            map.insert("on_update".to_string(), on_update);
        }
        Value::Object(map)
    }
}
