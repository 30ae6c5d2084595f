//! Table trigger definition.

use serde_json::{Map, Value};
use tracing::debug;

use crate::entity::{Comparison, Definition, NamedEntity, TableItem};
use crate::error::{DbEntityError, Result};
use crate::options::ModelOptions;

const PROPERTIES: &[&str] = &[
    "name", "time", "timing", "event", "schema", "table", "definer", "body",
];

/// A row-level trigger attached to a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    name: String,
    time: String,
    event: String,
    schema: Option<String>,
    table: String,
    definer: Option<String>,
    body: String,
    quote_char: String,
}

impl Trigger {
    /// Creates a trigger firing `time` (BEFORE/AFTER) `event`
    /// (INSERT/UPDATE/DELETE) on `table`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        time: impl Into<String>,
        event: impl Into<String>,
        table: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            time: time.into(),
            event: event.into(),
            schema: None,
            table: table.into(),
            definer: None,
            body: body.into(),
            quote_char: ModelOptions::default().quote_char,
        }
    }

    /// Sets the identifier quote character.
    #[must_use]
    pub fn with_quote_char(mut self, quote_char: impl Into<String>) -> Self {
        self.quote_char = quote_char.into();
        self
    }

    /// Sets the definer, e.g. `` `etl`@`localhost` ``.
    #[must_use]
    pub fn definer(mut self, definer: impl Into<String>) -> Self {
        self.definer = Some(definer.into());
        self
    }

    /// Sets the schema explicitly.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the schema only if none is set yet.
    pub fn inherit_schema(&mut self, schema: Option<&str>) {
        if self.schema.is_none() {
            self.schema = schema.map(ToString::to_string);
        }
    }

    /// Returns when the trigger fires.
    #[must_use]
    pub fn time(&self) -> &str {
        &self.time
    }

    /// Returns the triggering event.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Returns the table the trigger is attached to.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn set_table(&mut self, table: String) {
        self.table = table;
    }

    /// Returns the definer, if set.
    #[must_use]
    pub fn definer_name(&self) -> Option<&str> {
        self.definer.as_deref()
    }

    /// Returns the body as declared.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Renders the standalone statement that removes this trigger.
    #[must_use]
    pub fn drop_sql(&self, include_schema: bool) -> String {
        format!("DROP TRIGGER {};", self.sql_name(include_schema))
    }

    fn sql_name(&self, include_schema: bool) -> String {
        if include_schema {
            self.full_name()
        } else {
            self.quoted_name()
        }
    }

    /// The body as it is stored by the server. The information catalog
    /// reports bodies wrapped in BEGIN/END while definitions may omit it.
    fn stored_body(&self) -> String {
        let body = self.body.trim();
        if body.starts_with("BEGIN") {
            body.to_string()
        } else {
            format!("BEGIN\n{body}\nEND")
        }
    }

    fn differ(&self, property: &str) -> Comparison {
        debug!(trigger = %self.name, property, "Trigger values differ");
        Comparison::Different
    }
}

impl NamedEntity for Trigger {
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

impl TableItem for Trigger {
    const KIND: &'static str = "trigger";

    fn from_json(value: &Value, options: &ModelOptions) -> Result<Self> {
        let definition = Definition::parse(
            "trigger",
            value,
            PROPERTIES,
            &["name", "event", "table", "body"],
        )?;
        let time = match definition.non_empty_string("time")? {
            Some(time) => time,
            None => definition.non_empty_string("timing")?.ok_or_else(|| {
                DbEntityError::MissingProperties {
                    entity: definition.entity(),
                    missing: vec!["time".to_string()],
                }
            })?,
        };

        Ok(Self {
            name: definition.required_string("name")?,
            time,
            event: definition.required_string("event")?,
            schema: definition.non_empty_string("schema")?,
            table: definition.required_string("table")?,
            definer: definition.non_empty_string("definer")?,
            body: definition.required_string("body")?,
            quote_char: options.quote_char.clone(),
        })
    }

    fn compare(&self, other: &Self) -> Comparison {
        if self.name != other.name {
            return self.differ("name");
        }
        if !self.time.eq_ignore_ascii_case(&other.time) {
            return self.differ("time");
        }
        if !self.event.eq_ignore_ascii_case(&other.event) {
            return self.differ("event");
        }
        if self.table != other.table {
            return self.differ("table");
        }
        if self.stored_body() != other.stored_body() {
            return self.differ("body");
        }
        if let (Some(desired), Some(current)) = (&self.definer, &other.definer) {
            if desired != current {
                return self.differ("definer");
            }
        }
        if (self.schema.is_some() || other.schema.is_some()) && self.schema != other.schema {
            return self.differ("schema");
        }
        Comparison::Equal
    }

    fn create_sql(&self, include_schema: bool) -> String {
        let table = match (&self.schema, include_schema) {
            (Some(schema), true) => format!("{}.{}", self.quote(schema), self.quote(&self.table)),
            _ => self.quote(&self.table),
        };
        let mut parts = vec!["CREATE".to_string()];
        if let Some(definer) = &self.definer {
            parts.push(format!("DEFINER = {definer}"));
        }
        parts.push(format!("TRIGGER {}", self.sql_name(include_schema)));
        parts.push(self.time.clone());
        parts.push(self.event.clone());
        parts.push(format!("ON {table} FOR EACH ROW"));
        format!("{}\n{}", parts.join(" "), self.stored_body())
    }

    fn to_json_obj(&self, _succinct: bool) -> Value {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("time".to_string(), Value::String(self.time.clone()));
        map.insert("event".to_string(), Value::String(self.event.clone()));
        map.insert("table".to_string(), Value::String(self.table.clone()));
        if let Some(schema) = &self.schema {
            map.insert("schema".to_string(), Value::String(schema.clone()));
        }
        if let Some(definer) = &self.definer {
            map.insert("definer".to_string(), Value::String(definer.clone()));
        }
        map.insert("body".to_string(), Value::String(self.body.clone()));
        Value::Object(map)
    }
}
