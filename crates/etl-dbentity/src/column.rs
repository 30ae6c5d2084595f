//! Table column definition and MySQL-aware column comparison.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::entity::{
    describe, escape_string, trim_trailing_nulls, Comparison, Definition, NamedEntity,
    TableItem,
};
use crate::error::{DbEntityError, Result};
use crate::options::ModelOptions;

const PROPERTIES: &[&str] = &[
    "name", "type", "nullable", "default", "extra", "comment", "charset", "collation", "hints",
];

/// Positional order of the succinct array form.
const POSITIONS: &[&str] = &[
    "name", "type", "nullable", "default", "extra", "comment", "charset", "collation",
];

const CURRENT_TIMESTAMP: &str = "CURRENT_TIMESTAMP";
const ON_UPDATE_CURRENT_TIMESTAMP: &str = "on update current_timestamp";
const ZERO_DATE: &str = "0000-00-00 00:00:00";

/// Synonyms MySQL accepts for the current timestamp.
static TIMESTAMP_SYNONYMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bCURRENT_TIMESTAMP\(\)|\bNOW\(\)|\bLOCALTIMESTAMP\b(\(\))?|\bLOCALTIME\b(\(\))?",
    )
    .expect("valid timestamp synonym regex")
});

/// Numeric literal, as MySQL would accept it unquoted.
static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?\s*$").expect("valid numeric regex")
});

static DEFAULT_GENERATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bDEFAULT_GENERATED\b").expect("valid default_generated regex")
});

/// Column default value as written in a definition or reported by the
/// information catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// Boolean literal.
    Bool(bool),
    /// Numeric literal.
    Number(Number),
    /// Any other text, including SQL expressions like `CURRENT_TIMESTAMP`.
    Text(String),
}

impl DefaultValue {
    fn from_json(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(flag) => Ok(Some(Self::Bool(*flag))),
            Value::Number(number) => Ok(Some(Self::Number(number.clone()))),
            Value::String(text) => Ok(Some(Self::Text(text.clone()))),
            other => Err(DbEntityError::invalid(
                "column",
                "default",
                format!("expected a scalar, got {}", describe(other)),
            )),
        }
    }

    /// Returns the declarative JSON form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Number(number) => Value::Number(number.clone()),
            Self::Text(text) => Value::String(text.clone()),
        }
    }

    /// Returns the value as text. Booleans render as `1`/`0`.
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Bool(true) => Cow::Borrowed("1"),
            Self::Bool(false) => Cow::Borrowed("0"),
            Self::Number(number) => Cow::Owned(number.to_string()),
            Self::Text(text) => Cow::Borrowed(text),
        }
    }

    /// Returns true for numbers and numeric strings.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        match self {
            Self::Bool(_) => false,
            Self::Number(_) => true,
            Self::Text(text) => NUMERIC.is_match(text),
        }
    }

    /// Text used for comparison; `NULL` means no default at all.
    fn comparable(&self) -> Option<Cow<'_, str>> {
        let text = self.as_text();
        if text.eq_ignore_ascii_case("null") {
            return None;
        }
        match unquote(&text) {
            Some(inner) => Some(Cow::Owned(inner.to_string())),
            None => Some(text),
        }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

/// Strips one pair of surrounding single quotes.
fn unquote(text: &str) -> Option<&str> {
    text.strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
}

/// Folds the current-timestamp synonyms into `CURRENT_TIMESTAMP`.
fn canonical_timestamp(text: &str) -> String {
    TIMESTAMP_SYNONYMS
        .replace_all(text, CURRENT_TIMESTAMP)
        .into_owned()
}

/// MySQL 8 reports expression defaults with a `DEFAULT_GENERATED` extra that
/// cannot be declared; it is ignored when comparing.
fn comparable_extra(extra: Option<&str>) -> Option<String> {
    extra
        .map(|extra| DEFAULT_GENERATED.replace_all(extra, "").trim().to_string())
        .filter(|extra| !extra.is_empty())
}

/// Lower-cases a column type. The value lists of `enum` and `set` types
/// keep their case.
fn normalize_type(column_type: &str) -> String {
    let lower = column_type.to_ascii_lowercase();
    match column_type.find('(') {
        Some(open) if has_value_list(&lower) => {
            format!("{}{}", &lower[..open], &column_type[open..])
        }
        _ => lower,
    }
}

fn has_value_list(column_type: &str) -> bool {
    column_type.starts_with("enum") || column_type.starts_with("set")
}

/// An `enum`/`set` type with the whitespace around its values removed.
fn compact_value_list(column_type: &str) -> String {
    let (Some(open), Some(close)) = (column_type.find('('), column_type.rfind(')')) else {
        return column_type.to_string();
    };
    if close < open {
        return column_type.to_string();
    }
    let values = column_type[open + 1..close]
        .split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{}({values}){}",
        column_type[..open].trim_end(),
        &column_type[close + 1..]
    )
}

/// Optional hints attached to a column definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnHints {
    /// Name of an existing column this column replaces.
    pub rename_from: Option<String>,
}

impl ColumnHints {
    fn from_json(value: &Value) -> Result<Self> {
        let definition = Definition::parse("column hints", value, &["rename_from"], &[])?;
        Ok(Self {
            rename_from: definition.non_empty_string("rename_from")?,
        })
    }

    fn to_json(&self) -> Option<Value> {
        let rename_from = self.rename_from.as_ref()?;
        let mut map = Map::new();
        map.insert("rename_from".to_string(), Value::String(rename_from.clone()));
        Some(Value::Object(map))
    }
}

/// A single table column.
///
/// ```
/// use etl_dbentity::{Column, TableItem};
///
/// let column = Column::new("val", "VARCHAR(20)").not_null().default("n/a");
/// assert_eq!(column.create_sql(false), "`val` varchar(20) NOT NULL DEFAULT 'n/a'");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    column_type: String,
    nullable: Option<bool>,
    default: Option<DefaultValue>,
    extra: Option<String>,
    comment: Option<String>,
    charset: Option<String>,
    collation: Option<String>,
    hints: ColumnHints,
    quote_char: String,
}

impl Column {
    /// Creates a column. The type keyword is lower-cased; enum and set
    /// values are kept as written.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: normalize_type(&column_type.into()),
            nullable: None,
            default: None,
            extra: None,
            comment: None,
            charset: None,
            collation: None,
            hints: ColumnHints::default(),
            quote_char: ModelOptions::default().quote_char,
        }
    }

    /// Sets the identifier quote character.
    #[must_use]
    pub fn with_quote_char(mut self, quote_char: impl Into<String>) -> Self {
        self.quote_char = quote_char.into();
        self
    }

    /// Marks the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    /// Marks the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = Some(true);
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<DefaultValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the extra clause, e.g. `auto_increment`.
    #[must_use]
    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into()).filter(|extra| !extra.is_empty());
        self
    }

    /// Sets the column comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into()).filter(|comment| !comment.is_empty());
        self
    }

    /// Sets the character set. Lower-cased.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into().to_lowercase()).filter(|charset| !charset.is_empty());
        self
    }

    /// Sets the collation. Lower-cased.
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation =
            Some(collation.into().to_lowercase()).filter(|collation| !collation.is_empty());
        self
    }

    /// Records that this column replaces `column`.
    #[must_use]
    pub fn rename_from(mut self, column: impl Into<String>) -> Self {
        self.hints.rename_from = Some(column.into());
        self
    }

    /// Returns the normalized column type.
    #[must_use]
    pub fn column_type(&self) -> &str {
        &self.column_type
    }

    /// Returns the nullability, if known.
    #[must_use]
    pub const fn is_nullable(&self) -> Option<bool> {
        self.nullable
    }

    /// Returns the default value, if any.
    #[must_use]
    pub const fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Returns the extra clause, if any.
    #[must_use]
    pub fn extra_clause(&self) -> Option<&str> {
        self.extra.as_deref()
    }

    /// Returns the comment, if any.
    #[must_use]
    pub fn column_comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Returns the character set, if set.
    #[must_use]
    pub fn character_set(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Returns the collation, if set.
    #[must_use]
    pub fn collation_name(&self) -> Option<&str> {
        self.collation.as_deref()
    }

    /// Returns the column's hints.
    #[must_use]
    pub const fn hints(&self) -> &ColumnHints {
        &self.hints
    }

    /// Returns the name of the column this one replaces, if hinted.
    #[must_use]
    pub fn renamed_from(&self) -> Option<&str> {
        self.hints.rename_from.as_deref()
    }

    fn is_timestamp(&self) -> bool {
        self.column_type.starts_with("timestamp")
    }

    fn is_datetime(&self) -> bool {
        self.column_type.starts_with("datetime")
    }

    fn from_positional(items: &[Value], options: &ModelOptions) -> Result<Self> {
        if items.len() > POSITIONS.len() {
            return Err(DbEntityError::invalid(
                "column",
                "definition",
                format!(
                    "positional form takes at most {} values, got {}",
                    POSITIONS.len(),
                    items.len()
                ),
            ));
        }
        let map: Map<String, Value> = POSITIONS
            .iter()
            .zip(items)
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect();
        Self::from_json(&Value::Object(map), options)
    }

    fn differ(&self, property: &str, desired: impl fmt::Debug, current: impl fmt::Debug) -> Comparison {
        debug!(
            column = %self.name,
            property,
            desired = ?desired,
            current = ?current,
            "Column values differ"
        );
        Comparison::Different
    }

    /// Timestamp defaults follow MySQL's implicit rules: a declaration
    /// without default or extra is satisfied by the implicit
    /// `DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP`, and an
    /// auto-update without default is satisfied by the zero date.
    fn timestamp_defaults_match(&self, other: &Self) -> bool {
        let src_default = self
            .default
            .as_ref()
            .and_then(DefaultValue::comparable)
            .map(|text| canonical_timestamp(&text));
        let src_extra = comparable_extra(self.extra.as_deref()).map(|e| canonical_timestamp(&e));
        let dst_default = other
            .default
            .as_ref()
            .and_then(DefaultValue::comparable)
            .map(|text| canonical_timestamp(&text));
        let dst_extra = comparable_extra(other.extra.as_deref()).map(|e| canonical_timestamp(&e));

        let dst_default = dst_default.as_deref();
        let dst_extra = dst_extra.as_deref();
        let is_now = |value: Option<&str>| {
            value.is_some_and(|value| value.eq_ignore_ascii_case(CURRENT_TIMESTAMP))
        };
        let implicit_now = is_now(dst_default) && dst_extra.is_some();

        match (src_default.as_deref(), src_extra.as_deref()) {
            (None, None) => implicit_now,
            (Some(default), Some(extra)) => {
                let auto_now = is_now(Some(default))
                    && extra.eq_ignore_ascii_case(ON_UPDATE_CURRENT_TIMESTAMP);
                if auto_now && !implicit_now {
                    return false;
                }
                dst_extra.is_some_and(|dst| dst.eq_ignore_ascii_case(extra))
                    && constant_defaults_match(default, dst_default)
            }
            (Some(default), None) => {
                dst_extra.is_none()
                    && dst_default.is_some()
                    && constant_defaults_match(default, dst_default)
            }
            (None, Some(extra)) => {
                dst_extra.is_some_and(|dst| dst.eq_ignore_ascii_case(extra))
                    && dst_default.map_or(true, |dst| dst == ZERO_DATE)
            }
        }
    }

    fn default_sql(&self, default: &DefaultValue) -> String {
        let text = default.as_text();
        match default {
            DefaultValue::Bool(true) => return "TRUE".to_string(),
            DefaultValue::Bool(false) => return "FALSE".to_string(),
            _ => {}
        }
        let raw = (self.nullable == Some(true) && text.eq_ignore_ascii_case("null"))
            || ((self.is_timestamp() || self.is_datetime())
                && canonical_timestamp(&text).eq_ignore_ascii_case(CURRENT_TIMESTAMP))
            || default.is_numeric()
            || ["b'", "x'", "X'"].iter().any(|prefix| text.starts_with(prefix))
            || (text.len() >= 2 && unquote(&text).is_some());
        if raw {
            text.into_owned()
        } else {
            format!("'{}'", escape_string(&text))
        }
    }
}

/// A constant timestamp default matches if it is textually equal, if `0`
/// stands for the zero date, or if a bare date gains a midnight time.
fn constant_defaults_match(src: &str, dst: Option<&str>) -> bool {
    let dst = dst.unwrap_or("");
    src.eq_ignore_ascii_case(dst)
        || (src == "0" && dst == ZERO_DATE)
        || (src != "0" && format!("{src} 00:00:00") == dst)
}

/// With `fold_now`, the current-timestamp synonyms compare equal.
fn defaults_match(
    desired: Option<&DefaultValue>,
    current: Option<&DefaultValue>,
    fold_now: bool,
) -> bool {
    let fold = |text: Cow<'_, str>| -> String {
        if fold_now {
            canonical_timestamp(&text)
        } else {
            text.into_owned()
        }
    };
    let desired = desired.and_then(DefaultValue::comparable).map(fold);
    let current = current.and_then(DefaultValue::comparable).map(fold);
    match (desired, current) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a == b
                || (fold_now && a.eq_ignore_ascii_case(&b))
                || (NUMERIC.is_match(&a)
                    && NUMERIC.is_match(&b)
                    && a.trim().parse::<f64>().ok() == b.trim().parse::<f64>().ok())
        }
        _ => false,
    }
}

impl NamedEntity for Column {
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

impl TableItem for Column {
    const KIND: &'static str = "column";

    fn from_json(value: &Value, options: &ModelOptions) -> Result<Self> {
        if let Value::Array(items) = value {
            return Self::from_positional(items, options);
        }
        let definition = Definition::parse("column", value, PROPERTIES, &["name", "type"])?;

        let default = match definition.get("default") {
            Some(value) => DefaultValue::from_json(value)?,
            None => None,
        };
        let hints = match definition.get("hints") {
            Some(value) => ColumnHints::from_json(value)?,
            None => ColumnHints::default(),
        };

        let lowered = |key: &str| -> Result<Option<String>> {
            Ok(definition.non_empty_string(key)?.map(|text| text.to_lowercase()))
        };

        Ok(Self {
            name: definition.required_string("name")?,
            column_type: normalize_type(&definition.required_string("type")?),
            nullable: definition.flag("nullable")?,
            default,
            extra: definition.non_empty_string("extra")?,
            comment: definition.non_empty_string("comment")?,
            charset: lowered("charset")?,
            collation: lowered("collation")?,
            hints,
            quote_char: options.quote_char.clone(),
        })
    }

    fn compare(&self, other: &Self) -> Comparison {
        if self.name != other.name {
            return self.differ("name", &self.name, &other.name);
        }
        if self == other {
            return Comparison::Equal;
        }

        if self.column_type != other.column_type {
            let both_lists = has_value_list(&self.column_type) && has_value_list(&other.column_type);
            if !both_lists
                || compact_value_list(&self.column_type) != compact_value_list(&other.column_type)
            {
                return self.differ("type", &self.column_type, &other.column_type);
            }
        }

        if let (Some(desired), Some(current)) = (&self.charset, &other.charset) {
            if desired != current {
                return self.differ("charset", desired, current);
            }
        }
        if let (Some(desired), Some(current)) = (&self.collation, &other.collation) {
            if desired != current {
                return self.differ("collation", desired, current);
            }
        }

        if self.is_timestamp() {
            if !self.timestamp_defaults_match(other) {
                return self.differ(
                    "timestamp default/extra",
                    (&self.default, &self.extra),
                    (&other.default, &other.extra),
                );
            }
        } else {
            if (self.default.is_some() || other.default.is_some())
                && !defaults_match(
                    self.default.as_ref(),
                    other.default.as_ref(),
                    self.is_datetime(),
                )
            {
                return self.differ("default", &self.default, &other.default);
            }
            let desired_extra = comparable_extra(self.extra.as_deref());
            let current_extra = comparable_extra(other.extra.as_deref());
            let extras_match = match (&desired_extra, &current_extra) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                (None, None) => true,
                _ => false,
            };
            if !extras_match {
                return self.differ("extra", &self.extra, &other.extra);
            }
        }

        if let (Some(desired), Some(current)) = (self.nullable, other.nullable) {
            if desired != current {
                return self.differ("nullable", desired, current);
            }
        }

        if (self.comment.is_some() || other.comment.is_some()) && self.comment != other.comment {
            return self.differ("comment", &self.comment, &other.comment);
        }

        Comparison::Equal
    }

    fn create_sql(&self, _include_schema: bool) -> String {
        let mut parts = vec![self.quoted_name(), self.column_type.clone()];

        if let Some(charset) = &self.charset {
            parts.push(format!("CHARACTER SET {charset}"));
        }
        if let Some(collation) = &self.collation {
            parts.push(format!("COLLATE {collation}"));
        }

        match self.nullable {
            Some(true) => parts.push("NULL".to_string()),
            Some(false) => parts.push("NOT NULL".to_string()),
            None => {}
        }

        if let Some(default) = &self.default {
            parts.push(format!("DEFAULT {}", self.default_sql(default)));
        }

        if let Some(extra) = &self.extra {
            parts.push(extra.clone());
        }

        if let Some(comment) = &self.comment {
            parts.push(format!("COMMENT '{}'", escape_string(comment)));
        }

        parts.join(" ")
    }

    fn to_json_obj(&self, succinct: bool) -> Value {
        let default = self.default.as_ref().map_or(Value::Null, DefaultValue::to_json);
        let extra = self.extra.clone().map_or(Value::Null, Value::String);
        let comment = self.comment.clone().map_or(Value::Null, Value::String);
        let charset = self.charset.clone().map_or(Value::Null, Value::String);
        let collation = self.collation.clone().map_or(Value::Null, Value::String);

        if succinct {
            let nullable = match self.nullable {
                Some(true) => Value::String("null".to_string()),
                Some(false) => Value::String("not null".to_string()),
                None => Value::Null,
            };
            return trim_trailing_nulls(vec![
                Value::String(self.name.clone()),
                Value::String(self.column_type.clone()),
                nullable,
                default,
                extra,
                comment,
                charset,
                collation,
            ]);
        }

        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("type".to_string(), Value::String(self.column_type.clone()));
        if let Some(nullable) = self.nullable {
            map.insert("nullable".to_string(), Value::Bool(nullable));
        }
        for (key, value) in [
            ("default", default),
            ("extra", extra),
            ("comment", comment),
            ("charset", charset),
            ("collation", collation),
        ] {
            if !value.is_null() {
                map.insert(key.to_string(), value);
            }
        }
        if let Some(hints) = self.hints.to_json() {
            map.insert("hints".to_string(), hints);
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn column(value: Value) -> Column {
        Column::from_json(&value, &ModelOptions::default()).unwrap()
    }

    #[test]
    fn test_parse_normalizes_values() {
        let col = column(json!({
            "#": "documentation only",
            "name": "val",
            "type": "VARCHAR(10)",
            "nullable": "NOT NULL",
            "extra": "",
            "comment": ""
        }));
        assert_eq!(col.column_type(), "varchar(10)");
        assert_eq!(col.is_nullable(), Some(false));
        assert_eq!(col.extra_clause(), None);
        assert_eq!(col.column_comment(), None);
    }

    #[test]
    fn test_parse_rejects_unknown_property() {
        let err = Column::from_json(
            &json!({"name": "a", "type": "int", "length": 4}),
            &ModelOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DbEntityError::UnsupportedProperty { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_parse_requires_name_and_type() {
        let err = Column::from_json(&json!({"name": "a"}), &ModelOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            DbEntityError::MissingProperties { ref missing, .. } if missing == &["type".to_string()]
        ));
    }

    #[test]
    fn test_parse_positional() {
        let col = column(json!(["id", "int(11)", "not null", null, "auto_increment"]));
        assert_eq!(col.is_nullable(), Some(false));
        assert_eq!(col.default_value(), None);
        assert_eq!(col.extra_clause(), Some("auto_increment"));
        assert_eq!(col.to_json_obj(true), json!(["id", "int(11)", "not null", null, "auto_increment"]));
    }

    #[test]
    fn test_enum_whitespace_insensitive() {
        let a = column(json!({"name": "e", "type": "enum('a','b')"}));
        let b = column(json!({"name": "e", "type": "enum('a', 'b')"}));
        assert_eq!(a.compare(&b), Comparison::Equal);

        let c = column(json!({"name": "e", "type": "enum('a','c')"}));
        assert_eq!(a.compare(&c), Comparison::Different);
    }

    #[test]
    fn test_timestamp_implicit_defaults() {
        let declared = column(json!({"name": "ts", "type": "timestamp"}));
        let discovered = column(json!({
            "name": "ts",
            "type": "timestamp",
            "nullable": "NO",
            "default": "CURRENT_TIMESTAMP",
            "extra": "on update CURRENT_TIMESTAMP"
        }));
        assert_eq!(declared.compare(&discovered), Comparison::Equal);

        let without_extra = column(json!({
            "name": "ts", "type": "timestamp", "default": "CURRENT_TIMESTAMP"
        }));
        assert_eq!(declared.compare(&without_extra), Comparison::Different);
    }

    #[test]
    fn test_timestamp_synonyms() {
        let declared = column(json!({
            "name": "ts",
            "type": "timestamp",
            "default": "NOW()",
            "extra": "on update LOCALTIME"
        }));
        let discovered = column(json!({
            "name": "ts",
            "type": "timestamp",
            "default": "CURRENT_TIMESTAMP",
            "extra": "DEFAULT_GENERATED on update CURRENT_TIMESTAMP"
        }));
        assert_eq!(declared.compare(&discovered), Comparison::Equal);
    }

    #[test]
    fn test_timestamp_constant_defaults() {
        let zero = column(json!({"name": "ts", "type": "timestamp", "default": "0"}));
        let discovered = column(json!({
            "name": "ts", "type": "timestamp", "default": ZERO_DATE
        }));
        assert_eq!(zero.compare(&discovered), Comparison::Equal);

        let date = column(json!({"name": "ts", "type": "timestamp", "default": "2020-01-01"}));
        let discovered = column(json!({
            "name": "ts", "type": "timestamp", "default": "2020-01-01 00:00:00"
        }));
        assert_eq!(date.compare(&discovered), Comparison::Equal);

        let with_extra = column(json!({
            "name": "ts", "type": "timestamp", "default": "2020-01-01 00:00:00", "extra": "on update CURRENT_TIMESTAMP"
        }));
        assert_eq!(date.compare(&with_extra), Comparison::Different);
    }

    #[test]
    fn test_timestamp_update_without_default() {
        let declared = column(json!({
            "name": "ts", "type": "timestamp", "extra": "on update CURRENT_TIMESTAMP"
        }));
        let zero_default = column(json!({
            "name": "ts", "type": "timestamp", "default": ZERO_DATE, "extra": "on update CURRENT_TIMESTAMP"
        }));
        assert_eq!(declared.compare(&zero_default), Comparison::Equal);

        let other_default = column(json!({
            "name": "ts", "type": "timestamp", "default": "2020-01-01 00:00:00", "extra": "on update CURRENT_TIMESTAMP"
        }));
        assert_eq!(declared.compare(&other_default), Comparison::Different);
    }

    #[test]
    fn test_absent_values_never_mismatch() {
        let declared = column(json!({"name": "n", "type": "int(11)"}));
        let discovered = column(json!({"name": "n", "type": "int(11)", "nullable": "YES"}));
        assert_eq!(declared.compare(&discovered), Comparison::Equal);

        let with_default = column(json!({"name": "n", "type": "int(11)", "default": 0}));
        let discovered_default = column(json!({"name": "n", "type": "int(11)", "default": "0"}));
        assert_eq!(with_default.compare(&discovered_default), Comparison::Equal);
        assert_eq!(with_default.compare(&discovered), Comparison::Different);
    }

    #[test]
    fn test_nullable_compared_when_known() {
        let declared = column(json!({"name": "n", "type": "int", "nullable": false}));
        let discovered = column(json!({"name": "n", "type": "int", "nullable": "YES"}));
        assert_eq!(declared.compare(&discovered), Comparison::Different);
    }

    #[test]
    fn test_comment_compared_when_either_set() {
        let declared = column(json!({"name": "n", "type": "int"}));
        let discovered = column(json!({"name": "n", "type": "int", "comment": "count"}));
        assert_eq!(declared.compare(&discovered), Comparison::Different);
    }

    #[test]
    fn test_create_sql_default_quoting() {
        let cases = [
            (json!({"name": "a", "type": "int", "default": 5}), "`a` int DEFAULT 5"),
            (json!({"name": "a", "type": "int", "default": "-1.5"}), "`a` int DEFAULT -1.5"),
            (json!({"name": "a", "type": "tinyint(1)", "default": true}), "`a` tinyint(1) DEFAULT TRUE"),
            (json!({"name": "a", "type": "bit(1)", "default": "b'0'"}), "`a` bit(1) DEFAULT b'0'"),
            (json!({"name": "a", "type": "char(3)", "default": "'abc'"}), "`a` char(3) DEFAULT 'abc'"),
            (json!({"name": "a", "type": "char(5)", "default": "it's"}), "`a` char(5) DEFAULT 'it\\'s'"),
            (
                json!({"name": "a", "type": "int", "nullable": true, "default": "NULL"}),
                "`a` int NULL DEFAULT NULL",
            ),
            (
                json!({"name": "a", "type": "timestamp", "nullable": false, "default": "CURRENT_TIMESTAMP", "extra": "on update CURRENT_TIMESTAMP"}),
                "`a` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP on update CURRENT_TIMESTAMP",
            ),
            (
                json!({"name": "a", "type": "datetime", "default": "2020-01-01 00:00:00"}),
                "`a` datetime DEFAULT '2020-01-01 00:00:00'",
            ),
        ];
        for (definition, expected) in cases {
            assert_eq!(column(definition).create_sql(false), expected);
        }
    }

    #[test]
    fn test_create_sql_comment_escaped() {
        let col = Column::new("a", "int").not_null().comment("user's count");
        assert_eq!(col.create_sql(false), "`a` int NOT NULL COMMENT 'user\\'s count'");
        assert_eq!(col.alter_sql(false), col.create_sql(false));
    }

    #[test]
    fn test_json_round_trip_keeps_hints() {
        let col = Column::new("c", "int").rename_from("a");
        let parsed = column(col.to_json_obj(false));
        assert_eq!(parsed, col);
        assert_eq!(parsed.renamed_from(), Some("a"));
    }

    #[test]
    fn test_datetime_current_time_default_unquoted() {
        for default in ["CURRENT_TIMESTAMP", "now()", "LOCALTIMESTAMP", "localtime()"] {
            let col = column(json!({
                "name": "created", "type": "datetime", "nullable": false, "default": default
            }));
            assert_eq!(
                col.create_sql(false),
                format!("`created` datetime NOT NULL DEFAULT {default}")
            );
        }

        let declared = column(json!({"name": "created", "type": "datetime", "default": "NOW()"}));
        let discovered = column(json!({
            "name": "created", "type": "datetime", "default": "CURRENT_TIMESTAMP",
            "extra": "DEFAULT_GENERATED"
        }));
        assert_eq!(declared.compare(&discovered), Comparison::Equal);
    }

    #[test]
    fn test_enum_values_keep_case() {
        let col = column(json!({"name": "flag", "type": "ENUM('Yes','No')"}));
        assert_eq!(col.column_type(), "enum('Yes','No')");
        assert_eq!(col.create_sql(false), "`flag` enum('Yes','No')");

        let lower = column(json!({"name": "flag", "type": "enum('yes', 'no')"}));
        assert_eq!(col.compare(&lower), Comparison::Different);

        let spaced = column(json!({"name": "flag", "type": "enum('Yes', 'No')"}));
        assert_eq!(col.compare(&spaced), Comparison::Equal);

        let set = column(json!({"name": "s", "type": "SET('A','b')"}));
        assert_eq!(set.column_type(), "set('A','b')");
        assert_eq!(Column::new("v", "VARCHAR(8)").column_type(), "varchar(8)");
    }

    #[test]
    fn test_invalid_nullable_rejected() {
        let err = Column::from_json(
            &json!({"name": "a", "type": "int", "nullable": "maybe"}),
            &ModelOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DbEntityError::InvalidValue { entity: "column", ref property, .. } if property == "nullable"
        ));
    }

    #[test]
    fn test_charset_and_collation() {
        let col = column(json!({
            "name": "label", "type": "varchar(40)", "nullable": false,
            "charset": "UTF8MB4", "collation": "utf8mb4_unicode_ci"
        }));
        assert_eq!(col.character_set(), Some("utf8mb4"));
        assert_eq!(
            col.create_sql(false),
            "`label` varchar(40) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci NOT NULL"
        );
        assert_eq!(column(col.to_json_obj(true)), col);
        assert_eq!(column(col.to_json_obj(false)), col);

        let unspecified = column(json!({"name": "label", "type": "varchar(40)", "nullable": false}));
        assert_eq!(unspecified.compare(&col), Comparison::Equal);

        let latin = column(json!({
            "name": "label", "type": "varchar(40)", "charset": "latin1",
            "collation": "latin1_swedish_ci"
        }));
        assert_eq!(latin.compare(&col), Comparison::Different);
    }
}
