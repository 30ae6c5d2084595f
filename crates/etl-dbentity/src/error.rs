//! Error types for entity parsing, discovery and SQL generation.

use std::path::PathBuf;

/// Errors that can occur while building, discovering or diffing entities.
#[derive(Debug, thiserror::Error)]
pub enum DbEntityError {
    /// A definition was expected to be a JSON object (or positional array).
    #[error("{entity} definition must be an object, got {found}")]
    NotAnObject {
        /// Kind of entity being parsed.
        entity: &'static str,
        /// Short description of the value that was supplied.
        found: String,
    },

    /// Required keys were absent from a definition.
    #[error("{entity} definition is missing required properties: {}", .missing.join(", "))]
    MissingProperties {
        /// Kind of entity being parsed.
        entity: &'static str,
        /// Names of the missing keys.
        missing: Vec<String>,
    },

    /// A definition contained a key the entity does not recognize.
    #[error("{entity} definition has unsupported property '{property}'")]
    UnsupportedProperty {
        /// Kind of entity being parsed.
        entity: &'static str,
        /// The offending key.
        property: String,
    },

    /// A recognized key carried a value of the wrong shape.
    #[error("{entity} property '{property}' is invalid: {message}")]
    InvalidValue {
        /// Kind of entity being parsed.
        entity: &'static str,
        /// The offending key.
        property: String,
        /// What was wrong with it.
        message: String,
    },

    /// An item with the same name was added twice without overwrite.
    #[error("{kind} '{name}' already exists in '{owner}'")]
    Duplicate {
        /// Kind of item (column, index, trigger, record).
        kind: &'static str,
        /// Name of the duplicated item.
        name: String,
        /// Name of the owning table or query.
        owner: String,
    },

    /// Columns were referenced that the table does not define.
    #[error("{context} references undefined columns: {}", .columns.join(", "))]
    UndefinedColumns {
        /// Where the reference came from, e.g. "index 'idx_a' on table 'facts'".
        context: String,
        /// The undefined column names.
        columns: Vec<String>,
    },

    /// CREATE was requested for a table without columns.
    #[error("Table '{0}' has no columns")]
    EmptyTable(String),

    /// An aggregation table was used before its aggregation unit was set.
    #[error("Aggregation unit not set for table with prefix '{0}'")]
    AggregationUnitNotSet(String),

    /// A query has no joins, so there is nothing to select from.
    #[error("Query has no joins")]
    NoJoins,

    /// A join after the first one has no ON condition.
    #[error("Join to '{0}' has no ON condition")]
    MissingJoinCondition(String),

    /// Strict variable substitution left placeholders behind.
    #[error("Unresolved variables: {}", .0.join(", "))]
    UnresolvedVariables(Vec<String>),

    /// A query macro could not be loaded.
    #[error("Macro '{name}' ({path}): {message}")]
    Macro {
        /// Macro name.
        name: String,
        /// Path of the macro file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The data endpoint failed while discovering a table.
    #[error("Error discovering table '{table}': {source}")]
    Discovery {
        /// Qualified table name.
        table: String,
        /// Underlying endpoint error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Discovery returned data that could not describe a table.
    #[error("Error discovering table '{table}': {message}")]
    DiscoveryFailed {
        /// Qualified table name.
        table: String,
        /// Error message.
        message: String,
    },

    /// Database error from the bundled MySQL endpoint.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading definition or macro files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbEntityError {
    /// Returns true for errors caused by the declarative configuration
    /// (as opposed to database or I/O failures).
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        !matches!(
            self,
            Self::Discovery { .. }
                | Self::DiscoveryFailed { .. }
                | Self::Database(_)
                | Self::Io(_)
                | Self::Serialization(_)
        )
    }

    pub(crate) fn invalid(
        entity: &'static str,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            entity,
            property: property.into(),
            message: message.into(),
        }
    }
}

/// Result type for entity operations.
pub type Result<T> = std::result::Result<T, DbEntityError>;
