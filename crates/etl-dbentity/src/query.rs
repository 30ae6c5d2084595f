//! SELECT query that populates a table.
//!
//! A query maps destination columns to source expressions, selects from an
//! ordered chain of joins and may carry WHERE fragments, GROUP BY/ORDER BY
//! lists, macros and an optimizer hint. Overseer restrictions are templated
//! WHERE fragments declared up front and resolved later by whatever drives
//! the ETL run.

use serde_json::{Map, Value};
use tracing::debug;

use crate::entity::{describe, is_comment, Definition, NamedEntity};
use crate::error::{DbEntityError, Result};
use crate::join::Join;
use crate::options::ModelOptions;
use crate::table::Table;
use crate::variables::{substitute_variables, Macro, VariableMap};

const PROPERTIES: &[&str] = &[
    "records",
    "joins",
    "groupby",
    "orderby",
    "where",
    "macros",
    "query_hint",
    "overseer_restrictions",
];

/// Placeholder in a restriction template that receives the resolved value.
pub const RESTRICTION_VALUE: &str = "${VALUE}";

/// Key wrapping a query inside a larger definition file.
pub const SOURCE_QUERY_KEY: &str = "source_query";

/// A parameterized SELECT statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    records: Vec<(String, String)>,
    joins: Vec<Join>,
    group_bys: Vec<String>,
    order_bys: Vec<String>,
    wheres: Vec<String>,
    macros: Vec<Macro>,
    query_hint: Option<String>,
    overseer_restrictions: Vec<(String, String)>,
    overseer_restriction_values: Vec<(String, String)>,
}

impl Query {
    /// Creates an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a query from its declarative form. A top-level `source_query`
    /// key is unwrapped first.
    pub fn from_json(value: &Value, options: &ModelOptions) -> Result<Self> {
        if let Some(inner) = value.get(SOURCE_QUERY_KEY) {
            return Self::from_json(inner, options);
        }

        let definition = Definition::parse("query", value, PROPERTIES, &["records", "joins"])?;
        let mut query = Self::new();

        let Some(Value::Object(records)) = definition.get("records") else {
            return Err(DbEntityError::invalid("query", "records", "expected an object"));
        };
        for (column, formula) in records.iter().filter(|(column, _)| !is_comment(column)) {
            let formula = match formula {
                Value::String(formula) => formula.as_str(),
                Value::Null => "",
                other => {
                    return Err(DbEntityError::invalid(
                        "query",
                        format!("records.{column}"),
                        format!("expected a string, got {}", describe(other)),
                    ))
                }
            };
            query.add_record(column, formula)?;
        }

        let Some(Value::Array(joins)) = definition.get("joins") else {
            return Err(DbEntityError::invalid("query", "joins", "expected an array"));
        };
        if joins.is_empty() {
            return Err(DbEntityError::invalid("query", "joins", "at least one join is required"));
        }
        for join in joins {
            query.add_join(Join::from_json(join, options)?);
        }

        for (key, target) in [("groupby", &mut query.group_bys), ("orderby", &mut query.order_bys)] {
            if let Some(items) = definition.string_list(key)? {
                if items.is_empty() {
                    return Err(DbEntityError::invalid("query", key, "at least one element is required"));
                }
                push_fragments(key, target, items)?;
            }
        }

        if let Some(wheres) = definition.string_list("where")? {
            push_fragments("where", &mut query.wheres, wheres)?;
        }

        if let Some(macros) = definition.get("macros") {
            let Value::Array(macros) = macros else {
                return Err(DbEntityError::invalid("query", "macros", "expected an array"));
            };
            for definition in macros {
                query.add_macro(Macro::from_json(definition, options)?);
            }
        }

        query.query_hint = definition.string("query_hint")?;

        if let Some(restrictions) = definition.get("overseer_restrictions") {
            let Value::Object(restrictions) = restrictions else {
                return Err(DbEntityError::invalid(
                    "query",
                    "overseer_restrictions",
                    "expected an object",
                ));
            };
            for (name, template) in restrictions.iter().filter(|(name, _)| !is_comment(name)) {
                let Value::String(template) = template else {
                    return Err(DbEntityError::invalid(
                        "query",
                        format!("overseer_restrictions.{name}"),
                        format!("expected a string, got {}", describe(template)),
                    ));
                };
                query.add_overseer_restriction(name, template)?;
            }
        }

        Ok(query)
    }

    // ====================================================================
    // Records
    // ====================================================================

    /// Maps destination `column` to the source expression `formula`.
    pub fn add_record(&mut self, column: &str, formula: &str) -> Result<&mut Self> {
        if formula.is_empty() {
            return Err(DbEntityError::invalid(
                "query",
                format!("records.{column}"),
                "empty formula",
            ));
        }
        if self.record(column).is_some() {
            return Err(DbEntityError::Duplicate {
                kind: "record",
                name: column.to_string(),
                owner: "query".to_string(),
            });
        }
        self.records.push((column.to_string(), formula.to_string()));
        Ok(self)
    }

    /// Returns the records in declaration order.
    #[must_use]
    pub fn records(&self) -> &[(String, String)] {
        &self.records
    }

    /// Returns the formula for `column`.
    #[must_use]
    pub fn record(&self, column: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, formula)| formula.as_str())
    }

    /// Removes and returns the formula for `column`.
    pub fn remove_record(&mut self, column: &str) -> Option<String> {
        let position = self.records.iter().position(|(name, _)| name == column)?;
        Some(self.records.remove(position).1)
    }

    /// Removes all records.
    pub fn delete_records(&mut self) -> &mut Self {
        self.records.clear();
        self
    }

    // ====================================================================
    // Joins, grouping, ordering, filters
    // ====================================================================

    /// Appends a join. The first join is the FROM target.
    pub fn add_join(&mut self, join: Join) -> &mut Self {
        self.joins.push(join);
        self
    }

    /// Returns the joins.
    #[must_use]
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Removes all joins.
    pub fn delete_joins(&mut self) -> &mut Self {
        self.joins.clear();
        self
    }

    /// Appends a GROUP BY expression.
    pub fn add_group_by(&mut self, expression: &str) -> Result<&mut Self> {
        push_fragments("groupby", &mut self.group_bys, vec![expression.to_string()])?;
        Ok(self)
    }

    /// Returns the GROUP BY expressions.
    #[must_use]
    pub fn group_bys(&self) -> &[String] {
        &self.group_bys
    }

    /// Removes all GROUP BY expressions.
    pub fn delete_group_bys(&mut self) -> &mut Self {
        self.group_bys.clear();
        self
    }

    /// Appends an ORDER BY expression.
    pub fn add_order_by(&mut self, expression: &str) -> Result<&mut Self> {
        push_fragments("orderby", &mut self.order_bys, vec![expression.to_string()])?;
        Ok(self)
    }

    /// Returns the ORDER BY expressions.
    #[must_use]
    pub fn order_bys(&self) -> &[String] {
        &self.order_bys
    }

    /// Removes all ORDER BY expressions.
    pub fn delete_order_bys(&mut self) -> &mut Self {
        self.order_bys.clear();
        self
    }

    /// Appends a WHERE fragment. Fragments are AND-ed together.
    pub fn add_where(&mut self, condition: &str) -> Result<&mut Self> {
        push_fragments("where", &mut self.wheres, vec![condition.to_string()])?;
        Ok(self)
    }

    /// Returns the WHERE fragments.
    #[must_use]
    pub fn wheres(&self) -> &[String] {
        &self.wheres
    }

    /// Removes all WHERE fragments.
    pub fn delete_wheres(&mut self) -> &mut Self {
        self.wheres.clear();
        self
    }

    /// Appends a macro applied after the SELECT is assembled.
    pub fn add_macro(&mut self, definition: Macro) -> &mut Self {
        self.macros.push(definition);
        self
    }

    /// Returns the macros.
    #[must_use]
    pub fn macros(&self) -> &[Macro] {
        &self.macros
    }

    /// Removes all macros.
    pub fn delete_macros(&mut self) -> &mut Self {
        self.macros.clear();
        self
    }

    /// Sets the optimizer hint emitted after SELECT, e.g. `SQL_NO_CACHE`.
    pub fn set_hint(&mut self, hint: Option<String>) -> &mut Self {
        self.query_hint = hint.filter(|hint| !hint.is_empty());
        self
    }

    /// Returns the optimizer hint.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.query_hint.as_deref()
    }

    // ====================================================================
    // Overseer restrictions
    // ====================================================================

    /// Declares a restriction whose template contains `${VALUE}`.
    pub fn add_overseer_restriction(&mut self, name: &str, template: &str) -> Result<&mut Self> {
        require_non_empty("overseer_restrictions", name, template)?;
        upsert(&mut self.overseer_restrictions, name, template);
        Ok(self)
    }

    /// Returns the declared restriction templates.
    #[must_use]
    pub fn overseer_restrictions(&self) -> &[(String, String)] {
        &self.overseer_restrictions
    }

    /// Records a resolved restriction fragment; it is AND-ed into WHERE.
    pub fn add_overseer_restriction_value(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        require_non_empty("overseer_restriction_values", name, value)?;
        upsert(&mut self.overseer_restriction_values, name, value);
        Ok(self)
    }

    /// Returns the resolved restriction fragments.
    #[must_use]
    pub fn overseer_restriction_values(&self) -> &[(String, String)] {
        &self.overseer_restriction_values
    }

    /// Resolves every declared restriction that has a value in `values`,
    /// returning how many were applied. Restrictions without a value are
    /// left unresolved and do not appear in the WHERE clause.
    pub fn apply_overseer_restrictions(&mut self, values: &VariableMap) -> Result<usize> {
        let resolved: Vec<(String, String)> = self
            .overseer_restrictions
            .iter()
            .filter_map(|(name, template)| {
                let Some(value) = values.get(name) else {
                    debug!(restriction = %name, "No value supplied, skipping restriction");
                    return None;
                };
                Some((name.clone(), template.replace(RESTRICTION_VALUE, value)))
            })
            .collect();
        for (name, fragment) in &resolved {
            self.add_overseer_restriction_value(name, fragment)?;
        }
        Ok(resolved.len())
    }

    /// Forgets resolved restriction values but keeps the declarations.
    pub fn clear_overseer_restriction_values(&mut self) -> &mut Self {
        self.overseer_restriction_values.clear();
        self
    }

    /// Removes restriction declarations and their resolved values.
    pub fn delete_overseer_restrictions(&mut self) -> &mut Self {
        self.overseer_restrictions.clear();
        self.overseer_restriction_values.clear();
        self
    }

    // ====================================================================
    // Verification and SQL
    // ====================================================================

    /// Checks that every record's destination column exists in `table`.
    pub fn verify(&self, table: &Table) -> Result<()> {
        let missing: Vec<String> = self
            .records
            .iter()
            .filter(|(column, _)| table.column(column).is_none())
            .map(|(column, _)| column.clone())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DbEntityError::UndefinedColumns {
                context: format!("query records for table '{}'", table.name()),
                columns: missing,
            })
        }
    }

    /// Assembles the SELECT statement, then applies macros.
    pub fn select_sql(&self, include_schema: bool) -> Result<String> {
        let (first, rest) = self.joins.split_first().ok_or(DbEntityError::NoJoins)?;

        let mut sections = vec![match &self.query_hint {
            Some(hint) => format!("SELECT {hint}"),
            None => "SELECT".to_string(),
        }];

        let columns: Vec<String> = self
            .records
            .iter()
            .map(|(column, formula)| format!("{formula} AS {column}"))
            .collect();
        sections.push(columns.join(",\n"));

        sections.push(format!("FROM {}", first.sql(include_schema)));
        for join in rest {
            if join.condition().is_none() {
                return Err(DbEntityError::MissingJoinCondition(join.name().to_string()));
            }
            sections.push(format!("{} {}", join.keyword(), join.sql(include_schema)));
        }

        let conditions: Vec<&str> = self
            .wheres
            .iter()
            .chain(self.overseer_restriction_values.iter().map(|(_, value)| value))
            .map(String::as_str)
            .collect();
        if !conditions.is_empty() {
            sections.push(format!("WHERE {}", conditions.join("\nAND ")));
        }
        if !self.group_bys.is_empty() {
            sections.push(format!("GROUP BY {}", self.group_bys.join(", ")));
        }
        if !self.order_bys.is_empty() {
            sections.push(format!("ORDER BY {}", self.order_bys.join(", ")));
        }

        let sql = sections.join("\n");
        Ok(self
            .macros
            .iter()
            .fold(sql, |sql, definition| definition.apply(&sql)))
    }

    /// Substitutes `${NAME}` variables in records, joins, fragments, the
    /// hint, restriction templates and expanded macros.
    pub fn apply_variables(&mut self, variables: &VariableMap) -> &mut Self {
        let substitute = |text: &mut String| *text = substitute_variables(text, variables);
        for (column, formula) in &mut self.records {
            substitute(column);
            substitute(formula);
        }
        for join in &mut self.joins {
            join.apply_variables(variables);
        }
        self.group_bys
            .iter_mut()
            .chain(&mut self.order_bys)
            .chain(&mut self.wheres)
            .for_each(&substitute);
        if let Some(hint) = &mut self.query_hint {
            substitute(hint);
        }
        self.overseer_restrictions
            .iter_mut()
            .chain(&mut self.overseer_restriction_values)
            .for_each(|(_, template)| substitute(template));
        for definition in &mut self.macros {
            definition.apply_variables(variables);
        }
        self
    }

    /// Serializes the query to its declarative form.
    #[must_use]
    pub fn to_json_obj(&self) -> Value {
        let mut map = Map::new();
        let records: Map<String, Value> = self
            .records
            .iter()
            .map(|(column, formula)| (column.clone(), Value::String(formula.clone())))
            .collect();
        map.insert("records".to_string(), Value::Object(records));
        map.insert(
            "joins".to_string(),
            Value::Array(self.joins.iter().map(Join::to_json_obj).collect()),
        );
        for (key, items) in [
            ("groupby", &self.group_bys),
            ("orderby", &self.order_bys),
            ("where", &self.wheres),
        ] {
            if !items.is_empty() {
                map.insert(
                    key.to_string(),
                    Value::Array(items.iter().cloned().map(Value::String).collect()),
                );
            }
        }
        if !self.macros.is_empty() {
            map.insert(
                "macros".to_string(),
                Value::Array(self.macros.iter().map(Macro::to_json_obj).collect()),
            );
        }
        if let Some(hint) = &self.query_hint {
            map.insert("query_hint".to_string(), Value::String(hint.clone()));
        }
        if !self.overseer_restrictions.is_empty() {
            let restrictions: Map<String, Value> = self
                .overseer_restrictions
                .iter()
                .map(|(name, template)| (name.clone(), Value::String(template.clone())))
                .collect();
            map.insert("overseer_restrictions".to_string(), Value::Object(restrictions));
        }
        Value::Object(map)
    }
}

fn push_fragments(key: &str, target: &mut Vec<String>, items: Vec<String>) -> Result<()> {
    for item in items {
        if item.trim().is_empty() {
            return Err(DbEntityError::invalid("query", key, "empty expression"));
        }
        target.push(item);
    }
    Ok(())
}

fn require_non_empty(key: &str, name: &str, value: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DbEntityError::invalid("query", key, "restriction name must be non-empty"));
    }
    if value.is_empty() {
        return Err(DbEntityError::invalid(
            "query",
            format!("{key}.{name}"),
            "restriction must be a non-empty string",
        ));
    }
    Ok(())
}

fn upsert(entries: &mut Vec<(String, String)>, name: &str, value: &str) {
    match entries.iter_mut().find(|(existing, _)| existing == name) {
        Some(entry) => entry.1 = value.to_string(),
        None => entries.push((name.to_string(), value.to_string())),
    }
}
