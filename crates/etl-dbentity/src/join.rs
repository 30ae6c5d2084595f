//! One link of a query's FROM/JOIN chain.

use serde_json::{Map, Value};

use crate::entity::{Definition, NamedEntity};
use crate::error::Result;
use crate::options::ModelOptions;
use crate::variables::{substitute_variables, VariableMap};

const PROPERTIES: &[&str] = &["name", "schema", "type", "alias", "on"];

/// Join type that forces MySQL to join tables in the listed order.
pub const STRAIGHT_JOIN_TYPE: &str = "STRAIGHT";

/// A table (or parenthesized subquery) joined into a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    name: String,
    schema: Option<String>,
    join_type: Option<String>,
    alias: Option<String>,
    on: Option<String>,
    quote_char: String,
}

impl Join {
    /// Creates a join to `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            join_type: None,
            alias: None,
            on: None,
            quote_char: ModelOptions::default().quote_char,
        }
    }

    /// Builds a join from its declarative object form.
    pub fn from_json(value: &Value, options: &ModelOptions) -> Result<Self> {
        let definition = Definition::parse("join", value, PROPERTIES, &["name"])?;
        Ok(Self {
            name: definition.required_string("name")?,
            schema: definition.non_empty_string("schema")?,
            join_type: definition.non_empty_string("type")?,
            alias: definition.non_empty_string("alias")?,
            on: definition.non_empty_string("on")?,
            quote_char: options.quote_char.clone(),
        })
    }

    /// Sets the identifier quote character.
    #[must_use]
    pub fn with_quote_char(mut self, quote_char: impl Into<String>) -> Self {
        self.quote_char = quote_char.into();
        self
    }

    /// Sets the schema.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the join type, e.g. `LEFT` or `STRAIGHT`.
    #[must_use]
    pub fn join_type(mut self, join_type: impl Into<String>) -> Self {
        self.join_type = Some(join_type.into());
        self
    }

    /// Sets the alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Sets the ON condition.
    #[must_use]
    pub fn on(mut self, condition: impl Into<String>) -> Self {
        self.on = Some(condition.into());
        self
    }

    /// Returns the join type, if any.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.join_type.as_deref()
    }

    /// Returns the alias, if any.
    #[must_use]
    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Returns the ON condition, if any.
    #[must_use]
    pub fn condition(&self) -> Option<&str> {
        self.on.as_deref()
    }

    /// Returns the keyword that introduces this join after the FROM target.
    #[must_use]
    pub fn keyword(&self) -> String {
        match &self.join_type {
            None => "JOIN".to_string(),
            Some(kind) if kind.eq_ignore_ascii_case(STRAIGHT_JOIN_TYPE) => {
                "STRAIGHT_JOIN".to_string()
            }
            Some(kind) => format!("{kind} JOIN"),
        }
    }

    /// Renders `name [AS alias] [ON condition]`. Subqueries (names starting
    /// with a parenthesis) are never quoted.
    #[must_use]
    pub fn sql(&self, include_schema: bool) -> String {
        let mut parts = vec![if include_schema && self.schema.is_some() {
            self.full_name()
        } else if self.name.starts_with('(') {
            self.name.clone()
        } else {
            self.quoted_name()
        }];
        if let Some(alias) = &self.alias {
            parts.push(format!("AS {alias}"));
        }
        if let Some(on) = &self.on {
            parts.push(format!("ON {on}"));
        }
        parts.join(" ")
    }

    pub(crate) fn apply_variables(&mut self, variables: &VariableMap) {
        self.name = substitute_variables(&self.name, variables);
        for text in [&mut self.schema, &mut self.alias, &mut self.on].into_iter().flatten() {
            *text = substitute_variables(text, variables);
        }
    }

    /// Serializes the join to its declarative form.
    #[must_use]
    pub fn to_json_obj(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        let optional = [
            ("schema", &self.schema),
            ("type", &self.join_type),
            ("alias", &self.alias),
            ("on", &self.on),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                map.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        Value::Object(map)
    }
}

impl NamedEntity for Join {
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
