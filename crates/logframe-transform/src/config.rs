//! Transform configuration.
//!
//! [`TransformConfig::from_toml_str`] and [`TransformConfig::load`] parse a
//! TOML document and validate it before returning, so a config that loads is
//! one [`TableMerger`](crate::TableMerger) and
//! [`CircularTable`](crate::CircularTable) will accept. Unknown keys are
//! rejected.
//!
//! ```toml
//! maxLines = 1000
//! bufferCapacity = 500
//!
//! [[derivedFields]]
//! matcherRegex = 'traceID=(\w+)'
//! name = "TraceID"
//! url = "http://tracing/trace/${__value.raw}"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::derived::{DerivedFieldConfig, DerivedFieldExtractor};
use crate::error::{Result, TransformError};

pub const DEFAULT_MAX_LINES: usize = 1000;
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransformConfig {
    /// Advisory line limit for query results
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    /// Row capacity of live tail buffers
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    #[serde(default)]
    pub derived_fields: Vec<DerivedFieldConfig>,
}

fn default_max_lines() -> usize {
    DEFAULT_MAX_LINES
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            buffer_capacity: default_buffer_capacity(),
            derived_fields: Vec::new(),
        }
    }
}

impl TransformConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_toml_str(&std::fs::read_to_string(path)?)?;
        debug!(
            path = %path.display(),
            derived_fields = config.derived_fields.len(),
            "loaded transform config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_lines == 0 {
            return Err(TransformError::InvalidConfig(
                "maxLines must be at least 1".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(TransformError::InvalidCapacity(self.buffer_capacity));
        }
        DerivedFieldExtractor::compile(&self.derived_fields)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransformConfig::from_toml_str("").unwrap();
        assert_eq!(config, TransformConfig::default());
        assert_eq!(config.max_lines, 1000);
        assert!(config.derived_fields.is_empty());
    }

    #[test]
    fn test_full_document() {
        let config = TransformConfig::from_toml_str(
            r#"
            maxLines = 200
            bufferCapacity = 50

            [[derivedFields]]
            matcherRegex = 'traceID=(\w+)'
            name = "TraceID"
            url = "http://tracing/trace/${__value.raw}"

            [[derivedFields]]
            matcherRegex = 'user=(\w+)'
            name = "user"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_lines, 200);
        assert_eq!(config.buffer_capacity, 50);
        assert_eq!(config.derived_fields.len(), 2);
        assert_eq!(config.derived_fields[0].matcher_regex, r"traceID=(\w+)");
        assert_eq!(config.derived_fields[1].url, None);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = TransformConfig::from_toml_str("maxLines = 1\ncolour = 'red'").unwrap_err();
        assert!(matches!(err, TransformError::ConfigParse(_)));

        let err = TransformConfig::from_toml_str(
            "[[derivedFields]]\nmatcherRegex = 'a'\nname = 'b'\ndatasourceUid = 'x'",
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::ConfigParse(_)));
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            TransformConfig::from_toml_str("maxLines = 0"),
            Err(TransformError::InvalidConfig(_))
        ));
        assert!(matches!(
            TransformConfig::from_toml_str("bufferCapacity = 0"),
            Err(TransformError::InvalidCapacity(0))
        ));
        assert!(matches!(
            TransformConfig::from_toml_str("[[derivedFields]]\nmatcherRegex = '('\nname = 'x'"),
            Err(TransformError::InvalidMatcherConfig { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = TransformConfig::load("/nonexistent/logframe.toml").unwrap_err();
        assert!(matches!(err, TransformError::Io(_)));
    }
}
