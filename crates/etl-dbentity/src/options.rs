//! Parse-time settings shared by every entity constructor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identifier quote character used by MySQL.
pub const MYSQL_QUOTE_CHAR: &str = "`";

/// Options threaded through `from_json` constructors.
///
/// ```
/// use etl_dbentity::ModelOptions;
///
/// let options = ModelOptions::new().with_quote_char("");
/// assert_eq!(options.quote_char, "");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelOptions {
    /// Identifier delimiter. May be empty to disable quoting.
    pub quote_char: String,
    /// Directory that relative macro file names are resolved against.
    pub macro_dir: Option<PathBuf>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            quote_char: MYSQL_QUOTE_CHAR.to_string(),
            macro_dir: None,
        }
    }
}

impl ModelOptions {
    /// Creates options with the MySQL quote character and no macro directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identifier quote character.
    #[must_use]
    pub fn with_quote_char(mut self, quote_char: impl Into<String>) -> Self {
        self.quote_char = quote_char.into();
        self
    }

    /// Sets the macro directory.
    #[must_use]
    pub fn with_macro_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.macro_dir = Some(dir.into());
        self
    }

    /// Loads options from a JSON file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Resolves a macro file name against the macro directory.
    #[must_use]
    pub fn resolve_macro_path(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        match &self.macro_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ModelOptions::default();
        assert_eq!(options.quote_char, "`");
        assert!(options.macro_dir.is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let options: ModelOptions = serde_json::from_str(r#"{"macro_dir": "/etc/etl/macros"}"#)
            .expect("valid options");
        assert_eq!(options.quote_char, "`");
        assert_eq!(
            options.resolve_macro_path("rate.sql"),
            PathBuf::from("/etc/etl/macros/rate.sql")
        );
        assert_eq!(
            options.resolve_macro_path("/abs/rate.sql"),
            PathBuf::from("/abs/rate.sql")
        );
    }

    #[test]
    fn test_deserialize_rejects_unknown_keys() {
        let result: std::result::Result<ModelOptions, _> =
            serde_json::from_str(r#"{"quote": "\""}"#);
        assert!(result.is_err());
    }
}
