use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use logframe_types::{CORE_FIELDS, CellValue, DataLink, Field, FieldType, LINE_FIELD, Table};

use crate::error::{Result, TransformError};

/// One derived field: a pattern run against each line, and an optional link
/// template using `${__value.raw}` for the extracted value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DerivedFieldConfig {
    pub matcher_regex: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl DerivedFieldConfig {
    pub fn new(matcher_regex: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            matcher_regex: matcher_regex.into(),
            name: name.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Derived field matcher with its regex compiled
#[derive(Clone)]
pub struct CompiledMatcher {
    regex: Regex,

    name: String,

    url: Option<String>,
}

impl CompiledMatcher {
    pub fn new(config: &DerivedFieldConfig) -> Result<Self> {
        let invalid = |reason: String| TransformError::InvalidMatcherConfig {
            name: config.name.clone(),
            reason,
        };

        if config.name.is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if CORE_FIELDS.contains(&config.name.as_str()) {
            return Err(invalid("name collides with a core column".to_string()));
        }

        let regex = Regex::new(&config.matcher_regex).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            regex,
            name: config.name.clone(),
            url: config.url.clone(),
        })
    }

    /// Value extracted from a line: the first capture group if the pattern
    /// has one that took part in the match, else the whole match
    pub fn extract<'a>(&self, line: &'a str) -> Option<&'a str> {
        let caps = self.regex.captures(line)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Empty column for this matcher's values
    fn field(&self) -> Field {
        let field = Field::new(self.name.clone(), FieldType::String);
        match &self.url {
            Some(url) => field.with_link(DataLink::new("", url.clone())),
            None => field,
        }
    }
}

impl std::fmt::Debug for CompiledMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledMatcher")
            .field("pattern", &self.regex.as_str())
            .field("name", &self.name)
            .field("url", &self.url)
            .finish()
    }
}

/// Adds derived columns to tables from their `line` column
#[derive(Clone, Debug, Default)]
pub struct DerivedFieldExtractor {
    matchers: Vec<CompiledMatcher>,
}

impl DerivedFieldExtractor {
    /// Compile every matcher, failing on the first bad one
    pub fn compile(configs: &[DerivedFieldConfig]) -> Result<Self> {
        let matchers = configs
            .iter()
            .map(CompiledMatcher::new)
            .collect::<Result<Vec<_>>>()?;
        debug!(matchers = matchers.len(), "compiled derived field matchers");
        Ok(Self { matchers })
    }

    pub fn matchers(&self) -> &[CompiledMatcher] {
        &self.matchers
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Add or fill one column per matcher.
    ///
    /// Rows whose line does not match keep an absent cell. The `line` column
    /// and every other existing column are left untouched.
    pub fn apply(&self, table: &mut Table) {
        if self.matchers.is_empty() {
            return;
        }

        let Some(lines) = table.field(LINE_FIELD).map(|f| {
            f.values
                .iter()
                .map(|cell| cell.as_ref().and_then(CellValue::as_str).map(str::to_string))
                .collect::<Vec<_>>()
        }) else {
            debug!("table has no line column, skipping derived fields");
            return;
        };

        for matcher in &self.matchers {
            if table.field(&matcher.name).is_none() {
                table.add_field(matcher.field());
            }

            for (row, line) in lines.iter().enumerate() {
                let Some(value) = line.as_deref().and_then(|l| matcher.extract(l)) else {
                    continue;
                };
                table.set_value(&matcher.name, row, Some(CellValue::from(value)));
            }
        }
    }
}
