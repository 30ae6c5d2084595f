//! Table index definition.

use serde_json::{Map, Value};
use tracing::debug;

use crate::entity::{
    describe, string_list, trim_trailing_nulls, Comparison, Definition, NamedEntity, TableItem,
};
use crate::error::{DbEntityError, Result};
use crate::options::ModelOptions;

const PROPERTIES: &[&str] = &["name", "type", "is_unique", "unique", "columns"];

/// Positional order of the succinct array form.
const POSITIONS: &[&str] = &["name", "columns", "type", "is_unique"];

/// Name MySQL reserves for the primary key.
pub const PRIMARY_KEY_NAME: &str = "PRIMARY";

/// Generated names switch to a digest past this many characters.
const MAX_GENERATED_NAME_LEN: usize = 32;

/// Any spelling of `primary` becomes [`PRIMARY_KEY_NAME`].
fn normalize_name(name: String) -> String {
    if name.eq_ignore_ascii_case(PRIMARY_KEY_NAME) {
        PRIMARY_KEY_NAME.to_string()
    } else {
        name
    }
}

/// An ordered, optionally unique index over table columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    name: String,
    index_type: Option<String>,
    unique: Option<bool>,
    columns: Vec<String>,
    quote_char: String,
}

impl Index {
    /// Creates an index over `columns`. Index names are case-insensitive.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: normalize_name(name.into()),
            index_type: None,
            unique: None,
            columns,
            quote_char: ModelOptions::default().quote_char,
        }
    }

    /// Creates the primary key over `columns`.
    #[must_use]
    pub fn primary_key(columns: Vec<String>) -> Self {
        Self::new(PRIMARY_KEY_NAME, columns)
    }

    /// Sets the identifier quote character.
    #[must_use]
    pub fn with_quote_char(mut self, quote_char: impl Into<String>) -> Self {
        self.quote_char = quote_char.into();
        self
    }

    /// Marks the index unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = Some(true);
        self
    }

    /// Sets the index type (e.g. `BTREE`). Upper-cased.
    #[must_use]
    pub fn index_type(mut self, index_type: impl Into<String>) -> Self {
        self.index_type = Some(index_type.into().to_uppercase());
        self
    }

    /// Returns the ordered column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the index type, if set.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.index_type.as_deref()
    }

    /// Returns the uniqueness flag, if known.
    #[must_use]
    pub const fn is_unique(&self) -> Option<bool> {
        self.unique
    }

    /// Returns true for the primary key.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.name.eq_ignore_ascii_case(PRIMARY_KEY_NAME)
    }

    /// Renders the clause that removes this index inside an ALTER TABLE.
    #[must_use]
    pub fn drop_sql(&self) -> String {
        if self.is_primary() {
            "DROP PRIMARY KEY".to_string()
        } else {
            format!("DROP INDEX {}", self.quoted_name())
        }
    }

    /// `index_` followed by the joined column names, or by their md5 digest
    /// when the joined names are too long.
    fn generated_name(columns: &[String]) -> String {
        let joined = columns.join("_");
        if joined.len() <= MAX_GENERATED_NAME_LEN {
            format!("index_{joined}")
        } else {
            format!("index_{:x}", md5::compute(joined.as_bytes()))
        }
    }

    /// Columns arrive either as an array or, from the information catalog,
    /// as a comma-separated list.
    fn parse_columns(value: &Value) -> Result<Vec<String>> {
        match value {
            Value::String(list) => Ok(list
                .split(',')
                .map(str::trim)
                .filter(|column| !column.is_empty())
                .map(ToString::to_string)
                .collect()),
            Value::Array(_) => string_list("index", "columns", value),
            other => Err(DbEntityError::invalid(
                "index",
                "columns",
                format!("expected an array, got {}", describe(other)),
            )),
        }
    }
}

impl NamedEntity for Index {
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

impl TableItem for Index {
    const KIND: &'static str = "index";

    fn from_json(value: &Value, options: &ModelOptions) -> Result<Self> {
        if let Value::Array(items) = value {
            let map: Map<String, Value> = POSITIONS
                .iter()
                .zip(items)
                .map(|(key, value)| ((*key).to_string(), value.clone()))
                .collect();
            return Self::from_json(&Value::Object(map), options);
        }

        let definition = Definition::parse("index", value, PROPERTIES, &["columns"])?;
        let columns = definition
            .get("columns")
            .map(Self::parse_columns)
            .transpose()?
            .unwrap_or_default();
        if columns.is_empty() {
            return Err(DbEntityError::invalid(
                definition.entity(),
                "columns",
                "at least one column is required",
            ));
        }

        let name = definition
            .non_empty_string("name")?
            .map_or_else(|| Self::generated_name(&columns), normalize_name);
        let unique = match definition.flag("is_unique")? {
            Some(unique) => Some(unique),
            None => definition.flag("unique")?,
        };

        Ok(Self {
            name,
            index_type: definition
                .non_empty_string("type")?
                .map(|index_type| index_type.to_uppercase()),
            unique,
            columns,
            quote_char: options.quote_char.clone(),
        })
    }

    fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    fn compare(&self, other: &Self) -> Comparison {
        if !self.matches_name(&other.name) || self.columns != other.columns {
            debug!(index = %self.name, desired = ?self.columns, current = ?other.columns, "Index columns differ");
            return Comparison::Different;
        }
        if let (Some(desired), Some(current)) = (&self.index_type, &other.index_type) {
            if desired != current {
                debug!(index = %self.name, desired = %desired, current = %current, "Index types differ");
                return Comparison::Different;
            }
        }
        if !self.is_primary() && !other.is_primary() {
            if let (Some(desired), Some(current)) = (self.unique, other.unique) {
                if desired != current {
                    debug!(index = %self.name, desired, current, "Index uniqueness differs");
                    return Comparison::Different;
                }
            }
        }
        Comparison::Equal
    }

    fn create_sql(&self, _include_schema: bool) -> String {
        let mut sql = if self.is_primary() {
            "PRIMARY KEY".to_string()
        } else if self.unique == Some(true) {
            format!("UNIQUE INDEX {}", self.quoted_name())
        } else {
            format!("INDEX {}", self.quoted_name())
        };
        if let Some(index_type) = &self.index_type {
            sql.push_str(" USING ");
            sql.push_str(index_type);
        }
        let columns: Vec<String> = self.columns.iter().map(|column| self.quote(column)).collect();
        sql.push_str(&format!(" ({})", columns.join(", ")));
        sql
    }

    fn to_json_obj(&self, succinct: bool) -> Value {
        let columns = Value::Array(self.columns.iter().cloned().map(Value::String).collect());
        let index_type = self.index_type.clone().map_or(Value::Null, Value::String);
        let unique = self.unique.map_or(Value::Null, Value::Bool);

        if succinct {
            return trim_trailing_nulls(vec![
                Value::String(self.name.clone()),
                columns,
                index_type,
                unique,
            ]);
        }

        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        if !index_type.is_null() {
            map.insert("type".to_string(), index_type);
        }
        if !unique.is_null() {
            map.insert("is_unique".to_string(), unique);
        }
        map.insert("columns".to_string(), columns);
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn index(value: Value) -> Index {
        Index::from_json(&value, &ModelOptions::default()).unwrap()
    }

    #[test]
    fn test_create_sql() {
        let idx = index(json!({"name": "idx_ab", "type": "btree", "is_unique": true, "columns": ["a", "b"]}));
        assert_eq!(idx.create_sql(false), "UNIQUE INDEX `idx_ab` USING BTREE (`a`, `b`)");

        let pk = index(json!({"name": "PRIMARY", "columns": ["id"]}));
        assert_eq!(pk.create_sql(false), "PRIMARY KEY (`id`)");
        assert_eq!(pk.drop_sql(), "DROP PRIMARY KEY");
        assert_eq!(idx.drop_sql(), "DROP INDEX `idx_ab`");
    }

    #[test]
    fn test_generated_name() {
        let idx = index(json!({"columns": ["a", "b"]}));
        assert_eq!(idx.name(), "index_a_b");
    }

    #[test]
    fn test_requires_columns() {
        let err = Index::from_json(&json!({"name": "i", "columns": []}), &ModelOptions::default())
            .unwrap_err();
        assert!(matches!(err, DbEntityError::InvalidValue { .. }));
    }

    #[test]
    fn test_discovered_shape_compares_equal() {
        let declared = index(json!({"name": "idx_a", "columns": ["a", "b"]}));
        let discovered = index(json!({
            "name": "idx_a", "type": "BTREE", "is_unique": 0, "columns": "a,b"
        }));
        assert_eq!(declared.compare(&discovered), Comparison::Equal);

        let reordered = index(json!({"name": "idx_a", "columns": "b,a"}));
        assert_eq!(declared.compare(&reordered), Comparison::Different);
    }

    #[test]
    fn test_unique_ignored_for_primary() {
        let declared = index(json!({"name": "PRIMARY", "is_unique": false, "columns": ["id"]}));
        let discovered = index(json!({"name": "PRIMARY", "is_unique": 1, "columns": "id"}));
        assert_eq!(declared.compare(&discovered), Comparison::Equal);

        let plain = index(json!({"name": "i", "is_unique": false, "columns": ["id"]}));
        let unique = index(json!({"name": "i", "is_unique": 1, "columns": "id"}));
        assert_eq!(plain.compare(&unique), Comparison::Different);
    }

    #[test]
    fn test_succinct_form() {
        let idx = index(json!(["idx_a", ["a"], "HASH"]));
        assert_eq!(idx.kind(), Some("HASH"));
        assert_eq!(idx.to_json_obj(true), json!(["idx_a", ["a"], "HASH"]));
        assert_eq!(index(idx.to_json_obj(false)), idx);
    }

    #[test]
    fn test_primary_name_normalized() {
        let pk = index(json!({"name": "primary", "columns": ["id"]}));
        assert_eq!(pk.name(), PRIMARY_KEY_NAME);
        assert!(pk.is_primary());
        assert_eq!(Index::new("Primary", vec!["id".to_string()]).name(), "PRIMARY");

        let declared = index(json!({"name": "Index_A", "columns": ["a"]}));
        let discovered = index(json!({"name": "index_a", "columns": "a"}));
        assert!(declared.matches_name("INDEX_A"));
        assert_eq!(declared.compare(&discovered), Comparison::Equal);
    }

    #[test]
    fn test_long_generated_name_uses_digest() {
        let columns = ["organization_id", "resource_id", "person_id"];
        let idx = index(json!({"columns": columns}));
        let expected = format!("index_{:x}", md5::compute(columns.join("_")));
        assert_eq!(idx.name(), expected);
        assert_eq!(idx.name().len(), "index_".len() + 32);
    }

    #[test]
    fn test_invalid_unique_flag_rejected() {
        let err = Index::from_json(
            &json!({"name": "i", "is_unique": "sometimes", "columns": ["a"]}),
            &ModelOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DbEntityError::InvalidValue { entity: "index", ref property, .. } if property == "is_unique"
        ));
    }
}
