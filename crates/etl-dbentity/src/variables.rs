//! `${NAME}` variable substitution and query macros.
//!
//! Variables are plain token replacement. Macros are named SQL snippets
//! loaded from files; a macro's own `${arg}` tokens are filled from its
//! arguments and the expanded text then replaces `${name}` in the query.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::entity::{describe, is_comment, Definition};
use crate::error::{DbEntityError, Result};
use crate::options::ModelOptions;

/// Variable name to value.
pub type VariableMap = BTreeMap<String, String>;

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{[^}]+\}").expect("valid variable regex"));

/// Replaces every `${NAME}` token whose name is in `variables`. Unknown
/// tokens are left untouched.
///
/// ```
/// use etl_dbentity::variables::{substitute_variables, VariableMap};
///
/// let variables = VariableMap::from([("UNIT".to_string(), "month".to_string())]);
/// assert_eq!(substitute_variables("jobfact_by_${UNIT}", &variables), "jobfact_by_month");
/// ```
#[must_use]
pub fn substitute_variables(input: &str, variables: &VariableMap) -> String {
    variables
        .iter()
        .fold(input.to_string(), |acc, (name, value)| {
            acc.replace(&format!("${{{name}}}"), value)
        })
}

/// Returns the distinct `${...}` tokens remaining in `input`, in order of
/// first appearance.
#[must_use]
pub fn unsubstituted_variables(input: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for token in VARIABLE.find_iter(input) {
        let token = token.as_str().to_string();
        if !found.contains(&token) {
            found.push(token);
        }
    }
    found
}

/// Like [`substitute_variables`] but fails if any token is left over.
pub fn substitute_variables_strict(input: &str, variables: &VariableMap) -> Result<String> {
    let output = substitute_variables(input, variables);
    let remaining = unsubstituted_variables(&output);
    if remaining.is_empty() {
        Ok(output)
    } else {
        Err(DbEntityError::UnresolvedVariables(remaining))
    }
}

/// Substitutes variables in every string inside a JSON value, returning a
/// new value. Object keys are left alone.
#[must_use]
pub fn substitute_in_value(value: &Value, variables: &VariableMap) -> Value {
    match value {
        Value::String(text) => Value::String(substitute_variables(text, variables)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_in_value(item, variables))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), substitute_in_value(item, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// A named SQL snippet applied to an assembled query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    name: String,
    file: String,
    args: VariableMap,
    expanded: String,
}

impl Macro {
    /// Parses `{name, file, args?}` and loads the macro file, resolving it
    /// against [`ModelOptions::macro_dir`].
    pub fn from_json(value: &Value, options: &ModelOptions) -> Result<Self> {
        let definition = Definition::parse("macro", value, &["name", "file", "args"], &["name", "file"])?;
        let name = definition.required_string("name")?;
        let file = definition.required_string("file")?;
        let args = match definition.get("args") {
            Some(value) => parse_args(value)?,
            None => VariableMap::new(),
        };
        let path = options.resolve_macro_path(&file);
        let contents = std::fs::read_to_string(&path).map_err(|err| DbEntityError::Macro {
            name: name.clone(),
            path: path.clone(),
            message: err.to_string(),
        })?;
        Ok(Self::from_contents(name, file, args, &contents))
    }

    /// Builds a macro from already-loaded text. Lines starting with `--` or
    /// `#` are dropped and `${arg}` tokens are replaced.
    #[must_use]
    pub fn from_contents(
        name: impl Into<String>,
        file: impl Into<String>,
        args: VariableMap,
        contents: &str,
    ) -> Self {
        let name = name.into();
        if contents.trim().is_empty() {
            warn!(name = %name, "Macro file is empty");
        }
        let stripped: Vec<&str> = contents
            .split('\n')
            .filter(|line| !line.starts_with("--") && !line.starts_with('#'))
            .collect();
        let expanded = substitute_variables(&stripped.join("\n"), &args);
        Self {
            name,
            file: file.into(),
            args,
            expanded,
        }
    }

    /// Returns the macro name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the file the macro was loaded from, as declared.
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Returns the expanded macro text.
    #[must_use]
    pub fn expanded(&self) -> &str {
        &self.expanded
    }

    /// Replaces `${name}` in `sql` with the expanded macro.
    #[must_use]
    pub fn apply(&self, sql: &str) -> String {
        debug!(name = %self.name, "Applying macro");
        sql.replace(&format!("${{{}}}", self.name), &self.expanded)
    }

    pub(crate) fn apply_variables(&mut self, variables: &VariableMap) {
        self.expanded = substitute_variables(&self.expanded, variables);
    }

    /// Serializes the macro reference (not its contents).
    #[must_use]
    pub fn to_json_obj(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("file".to_string(), Value::String(self.file.clone()));
        if !self.args.is_empty() {
            let args: Map<String, Value> = self
                .args
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect();
            map.insert("args".to_string(), Value::Object(args));
        }
        Value::Object(map)
    }

    /// Path the macro would be loaded from under `options`.
    #[must_use]
    pub fn path(&self, options: &ModelOptions) -> PathBuf {
        options.resolve_macro_path(&self.file)
    }
}

fn parse_args(value: &Value) -> Result<VariableMap> {
    let Value::Object(map) = value else {
        return Err(DbEntityError::invalid(
            "macro",
            "args",
            format!("expected an object, got {}", describe(value)),
        ));
    };
    map.iter()
        .filter(|(key, _)| !is_comment(key))
        .map(|(key, value)| {
            let text = match value {
                Value::String(text) => text.clone(),
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                other => {
                    return Err(DbEntityError::invalid(
                        "macro",
                        format!("args.{key}"),
                        format!("expected a scalar, got {}", describe(other)),
                    ))
                }
            };
            Ok((key.clone(), text))
        })
        .collect()
}
