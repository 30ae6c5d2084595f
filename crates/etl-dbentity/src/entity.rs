//! Shared entity contract.
//!
//! Every entity has a name, an optional schema and a dialect quote
//! character. Columns, indexes and triggers additionally implement
//! [`TableItem`], the contract a [`Table`](crate::Table) relies on to
//! parse, compare and render the items it owns.

use serde_json::Value;

use crate::error::{DbEntityError, Result};
use crate::options::ModelOptions;

/// Keys starting with this marker are documentation and are skipped when
/// parsing object definitions.
pub const COMMENT_KEY: &str = "#";

/// Returns true if a definition key is a comment.
#[must_use]
pub fn is_comment(key: &str) -> bool {
    key.starts_with(COMMENT_KEY)
}

/// Wraps an identifier in the given quote character.
#[must_use]
pub fn quote_identifier(quote_char: &str, identifier: &str) -> String {
    format!("{quote_char}{identifier}{quote_char}")
}

/// Escapes a string for use inside a single-quoted SQL literal.
///
/// Backslashes, both quote characters and NUL bytes are prefixed with a
/// backslash, which is what MySQL expects in its default SQL mode.
#[must_use]
pub fn escape_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' | '\'' | '"' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\0' => escaped.push_str("\\0"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Base capability shared by all named entities.
pub trait NamedEntity {
    /// Returns the unquoted name.
    fn name(&self) -> &str;

    /// Returns the unquoted schema, if any.
    fn schema(&self) -> Option<&str>;

    /// Returns the identifier quote character. May be empty.
    fn quote_char(&self) -> &str;

    /// Wraps an identifier with this entity's quote character.
    fn quote(&self, identifier: &str) -> String {
        quote_identifier(self.quote_char(), identifier)
    }

    /// Returns the quoted name.
    fn quoted_name(&self) -> String {
        self.quote(self.name())
    }

    /// Returns the quoted schema, if any.
    fn quoted_schema(&self) -> Option<String> {
        self.schema().map(|schema| self.quote(schema))
    }

    /// Returns `schema.name` with both parts quoted, or just the quoted
    /// name when there is no schema.
    fn full_name(&self) -> String {
        match self.quoted_schema() {
            Some(schema) => format!("{schema}.{}", self.quoted_name()),
            None => self.quoted_name(),
        }
    }
}

/// Outcome of comparing two items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// The items are equivalent; no DDL is needed.
    Equal,
    /// The items differ.
    Different,
}

impl Comparison {
    /// Returns true if the items are equivalent.
    #[must_use]
    pub fn is_equal(self) -> bool {
        self == Self::Equal
    }
}

/// Contract shared by the items a table owns: columns, indexes, foreign
/// key constraints and triggers.
pub trait TableItem: NamedEntity + Sized {
    /// Item kind used in error messages, e.g. "column".
    const KIND: &'static str;

    /// Returns true if this item is called `name`.
    fn matches_name(&self, name: &str) -> bool {
        self.name() == name
    }

    /// Builds an item from its declarative form (object or positional array).
    fn from_json(value: &Value, options: &ModelOptions) -> Result<Self>;

    /// Compares this item (the desired definition) against `other`
    /// (typically the discovered one).
    fn compare(&self, other: &Self) -> Comparison;

    /// Renders the DDL fragment that creates this item.
    fn create_sql(&self, include_schema: bool) -> String;

    /// Renders the DDL fragment used when this item is redefined.
    fn alter_sql(&self, include_schema: bool) -> String {
        self.create_sql(include_schema)
    }

    /// Serializes the item to its declarative form.
    fn to_json_obj(&self, succinct: bool) -> Value;
}

/// Interprets a boolean-ish definition value.
///
/// Accepts booleans, `1`/`0`, and (case-insensitively) the textual forms
/// `null`/`not null`, `yes`/`no`, `true`/`false`, `on`/`off`. A JSON null is
/// unknown; any other value is rejected.
pub fn parse_flag(entity: &'static str, property: &str, value: &Value) -> Result<Option<bool>> {
    let flag = match value {
        Value::Null => return Ok(None),
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(text) => match text.trim().to_lowercase().as_str() {
            "null" | "yes" | "true" | "1" | "on" => Some(true),
            "not null" | "no" | "false" | "0" | "off" | "" => Some(false),
            _ => None,
        },
        Value::Array(_) | Value::Object(_) => None,
    };
    flag.map(Some).ok_or_else(|| {
        DbEntityError::invalid(entity, property, format!("expected a boolean, got {value}"))
    })
}

/// Short description of a JSON value's shape for error messages.
pub(crate) const fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Object definition with comment keys removed and unknown keys rejected.
pub(crate) struct Definition<'a> {
    entity: &'static str,
    fields: Vec<(&'a str, &'a Value)>,
}

impl<'a> Definition<'a> {
    /// Validates `value` as an object whose keys are all in `allowed` and
    /// whose `required` keys are present and non-null.
    pub(crate) fn parse(
        entity: &'static str,
        value: &'a Value,
        allowed: &[&str],
        required: &[&str],
    ) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(DbEntityError::NotAnObject {
                entity,
                found: describe(value).to_string(),
            });
        };

        let fields: Vec<(&str, &Value)> = map
            .iter()
            .filter(|(key, _)| !is_comment(key))
            .map(|(key, value)| (key.as_str(), value))
            .collect();

        if let Some((key, _)) = fields.iter().find(|(key, _)| !allowed.contains(key)) {
            return Err(DbEntityError::UnsupportedProperty {
                entity,
                property: (*key).to_string(),
            });
        }

        let definition = Self { entity, fields };
        let missing: Vec<String> = required
            .iter()
            .filter(|key| definition.get(key).is_none())
            .map(|key| (*key).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DbEntityError::MissingProperties { entity, missing });
        }

        Ok(definition)
    }

    pub(crate) const fn entity(&self) -> &'static str {
        self.entity
    }

    /// Returns a non-null value.
    pub(crate) fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
            .filter(|value| !value.is_null())
    }

    pub(crate) fn string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(other) => Err(DbEntityError::invalid(
                self.entity,
                key,
                format!("expected a string, got {}", describe(other)),
            )),
        }
    }

    /// Like [`string`](Self::string) but an empty string is treated as absent.
    pub(crate) fn non_empty_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.string(key)?.filter(|text| !text.is_empty()))
    }

    pub(crate) fn required_string(&self, key: &str) -> Result<String> {
        self.non_empty_string(key)?
            .ok_or_else(|| DbEntityError::MissingProperties {
                entity: self.entity,
                missing: vec![key.to_string()],
            })
    }

    /// Reads a boolean-ish value; see [`parse_flag`].
    pub(crate) fn flag(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            Some(value) => parse_flag(self.entity, key, value),
            None => Ok(None),
        }
    }

    pub(crate) fn string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        self.get(key)
            .map(|value| string_list(self.entity, key, value))
            .transpose()
    }
}

/// Reads an array of strings.
pub(crate) fn string_list(entity: &'static str, key: &str, value: &Value) -> Result<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(DbEntityError::invalid(
            entity,
            key,
            format!("expected an array, got {}", describe(value)),
        ));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(text) => Ok(text.clone()),
            other => Err(DbEntityError::invalid(
                entity,
                key,
                format!("expected an array of strings, found {}", describe(other)),
            )),
        })
        .collect()
}

/// Trims trailing nulls from a positional (succinct) serialization.
pub(crate) fn trim_trailing_nulls(mut items: Vec<Value>) -> Value {
    while items.last().is_some_and(Value::is_null) {
        items.pop();
    }
    Value::Array(items)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Named {
        name: String,
        schema: Option<String>,
        quote_char: String,
    }

    impl NamedEntity for Named {
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

    #[test]
    fn test_full_name() {
        let mut entity = Named {
            name: "facts".to_string(),
            schema: None,
            quote_char: "`".to_string(),
        };
        assert_eq!(entity.full_name(), "`facts`");
        entity.schema = Some("modw".to_string());
        assert_eq!(entity.full_name(), "`modw`.`facts`");
        entity.quote_char = String::new();
        assert_eq!(entity.full_name(), "modw.facts");
    }

    #[test]
    fn test_is_comment() {
        assert!(is_comment("#"));
        assert!(is_comment("#note"));
        assert!(!is_comment("name"));
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("it's"), "it\\'s");
        assert_eq!(escape_string(r#"a "b" \c"#), r#"a \"b\" \\c"#);
    }

    #[test]
    fn test_parse_flag() {
        let flag = |value: Value| parse_flag("column", "nullable", &value).unwrap();
        assert_eq!(flag(json!(true)), Some(true));
        assert_eq!(flag(json!("NOT NULL")), Some(false));
        assert_eq!(flag(json!(" Yes ")), Some(true));
        assert_eq!(flag(json!(0)), Some(false));
        assert_eq!(flag(json!(null)), None);
    }

    #[test]
    fn test_parse_flag_rejects_other_values() {
        for value in [json!("maybe"), json!(2), json!(["yes"])] {
            let err = parse_flag("index", "is_unique", &value).unwrap_err();
            assert!(matches!(
                err,
                DbEntityError::InvalidValue { entity: "index", ref property, .. } if property == "is_unique"
            ));
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn test_definition_skips_comments_and_rejects_unknown() {
        let value = json!({"#": "documentation", "name": "a"});
        let definition = Definition::parse("column", &value, &["name"], &["name"]).unwrap();
        assert_eq!(definition.string("name").unwrap().as_deref(), Some("a"));

        let value = json!({"name": "a", "colour": "red"});
        let err = Definition::parse("column", &value, &["name"], &["name"])
            .err()
            .unwrap();
        assert!(matches!(
            err,
            DbEntityError::UnsupportedProperty { ref property, .. } if property == "colour"
        ));
    }

    #[test]
    fn test_definition_reports_all_missing() {
        let value = json!({"name": null});
        let err = Definition::parse("column", &value, &["name", "type"], &["name", "type"])
            .err()
            .unwrap();
        match err {
            DbEntityError::MissingProperties { missing, .. } => {
                assert_eq!(missing, vec!["name".to_string(), "type".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
