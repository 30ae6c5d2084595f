//! Schema reconciliation and DDL generation for ETL warehouse tables.
//!
//! `etl-dbentity` models warehouse tables declaratively and keeps a live
//! database in line with them:
//! - Tables, columns, indexes, foreign key constraints and triggers are
//!   parsed from JSON definitions
//! - Existing tables are discovered from `information_schema` through a
//!   [`DataEndpoint`]
//! - Two tables can be diffed into a minimal set of `ALTER TABLE` and
//!   trigger statements
//! - Aggregation tables are named per aggregation unit and carry the query
//!   that populates them
//!
//! # Architecture
//!
//! - **Entities** - [`Column`], [`Index`], [`ForeignKeyConstraint`] and
//!   [`Trigger`] share the [`NamedEntity`] / [`TableItem`] contract
//!   (parse, compare, render)
//! - **Table** - owns ordered items; creates, diffs and serializes them
//! - **Discovery** - builds a [`Table`] from catalog rows
//! - **Query** - assembles the SELECT feeding an aggregation table
//!
//! # Example
//!
//! ```rust
//! use etl_dbentity::prelude::*;
//! use serde_json::json;
//!
//! let options = ModelOptions::default();
//! let current = Table::from_json(
//!     &json!({"name": "t", "columns": [["id", "int(11)", "not null"]]}),
//!     &options,
//! )
//! .unwrap();
//! let desired = Table::from_json(
//!     &json!({"name": "t", "columns": [
//!         ["id", "int(11)", "not null"],
//!         ["val", "varchar(20)", "null"]
//!     ]}),
//!     &options,
//! )
//! .unwrap();
//!
//! let statements = current.alter_sql(&desired, false);
//! assert_eq!(
//!     statements,
//!     vec!["ALTER TABLE `t`\nADD COLUMN `val` varchar(20) NULL;".to_string()]
//! );
//! ```

pub mod aggregation;
pub mod column;
pub mod discover;
pub mod endpoint;
pub mod entity;
pub mod error;
pub mod foreign_key;
pub mod index;
pub mod join;
pub mod options;
pub mod query;
pub mod table;
pub mod trigger;
pub mod variables;

pub use aggregation::AggregationTable;
pub use column::{Column, DefaultValue};
pub use discover::{DataEndpoint, Row};
pub use endpoint::MysqlEndpoint;
pub use entity::{Comparison, NamedEntity, TableItem};
pub use error::{DbEntityError, Result};
pub use foreign_key::ForeignKeyConstraint;
pub use index::Index;
pub use join::Join;
pub use options::ModelOptions;
pub use query::Query;
pub use table::Table;
pub use trigger::Trigger;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::aggregation::AggregationTable;
    pub use crate::column::{Column, ColumnHints, DefaultValue};
    pub use crate::discover::{DataEndpoint, Row};
    pub use crate::endpoint::MysqlEndpoint;
    pub use crate::entity::{Comparison, NamedEntity, TableItem};
    pub use crate::error::{DbEntityError, Result};
    pub use crate::foreign_key::ForeignKeyConstraint;
    pub use crate::index::Index;
    pub use crate::join::Join;
    pub use crate::options::ModelOptions;
    pub use crate::query::Query;
    pub use crate::table::Table;
    pub use crate::trigger::Trigger;
    pub use crate::variables::{
        substitute_variables, substitute_variables_strict, unsubstituted_variables, Macro,
        VariableMap,
    };
}
