//! Shared types for logframe
//!
//! This crate contains the data structures passed between the logframe crates:
//! label-grouped log streams as they arrive from a query or tail fetch, and the
//! columnar tables they are turned into.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Millisecond ISO-8601 time column
pub const TS_FIELD: &str = "ts";
/// Raw nanosecond timestamp column
pub const TS_NS_FIELD: &str = "tsNs";
/// Log line column, carries the stream labels as metadata
pub const LINE_FIELD: &str = "line";
/// Labels not already attached to the line column
pub const LABELS_FIELD: &str = "labels";
/// Row identity column
pub const ID_FIELD: &str = "id";

/// Core columns of every stream table, in order
pub const CORE_FIELDS: [&str; 5] = [TS_FIELD, TS_NS_FIELD, LINE_FIELD, LABELS_FIELD, ID_FIELD];

/// Placeholder replaced by the extracted value in link templates
pub const VALUE_RAW_PLACEHOLDER: &str = "${__value.raw}";

// ============================================================================
// Stream Input Types
// ============================================================================

/// Label name/value pairs shared by every line of a stream.
///
/// Keys are kept sorted, so iteration and formatting are deterministic no
/// matter the order the labels were inserted in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a label, returning the previous value if the name was taken
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate labels in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Labels whose name/value pair is not present in `other`
    pub fn without(&self, other: &LabelSet) -> LabelSet {
        self.0
            .iter()
            .filter(|(k, v)| other.get(k) != Some(v.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={:?}", k, v)?;
        }
        f.write_str("}")
    }
}

/// One `[timestamp, line]` pair of a stream.
///
/// Both halves are optional so that a short or mistyped pair survives
/// decoding and can be reported per row instead of failing the whole
/// response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamEntry {
    /// Nanoseconds since the Unix epoch, as a base-10 string
    pub timestamp: Option<String>,

    /// Log line text
    pub line: Option<String>,
}

impl StreamEntry {
    pub fn new(timestamp: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            timestamp: Some(timestamp.into()),
            line: Some(line.into()),
        }
    }
}

impl Serialize for StreamEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let pair: Vec<&str> = [&self.timestamp, &self.line]
            .into_iter()
            .map_while(|part| part.as_deref())
            .collect();
        pair.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StreamEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let Value::Array(items) = value else {
            return Ok(Self::default());
        };

        let text = |index: usize| match items.get(index) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        };

        Ok(Self {
            timestamp: text(0),
            line: text(1),
        })
    }
}

/// A set of log lines sharing one label set
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStream {
    #[serde(rename = "stream", default)]
    pub labels: LabelSet,

    #[serde(default)]
    pub values: Vec<StreamEntry>,
}

impl LogStream {
    pub fn new(labels: LabelSet) -> Self {
        Self {
            labels,
            values: Vec::new(),
        }
    }

    /// Append a `[timestamp, line]` pair
    pub fn with_entry(mut self, timestamp: impl Into<String>, line: impl Into<String>) -> Self {
        self.values.push(StreamEntry::new(timestamp, line));
        self
    }
}

/// The `{ streams: [...] }` envelope of query and tail responses
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamsResponse {
    #[serde(default)]
    pub streams: Vec<LogStream>,
}

impl StreamsResponse {
    pub fn new(streams: Vec<LogStream>) -> Self {
        Self { streams }
    }

    /// Decode a response body
    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }

    /// Total number of entries across all streams
    pub fn entry_count(&self) -> usize {
        self.streams.iter().map(|s| s.values.len()).sum()
    }
}

// ============================================================================
// Table Types
// ============================================================================

/// Column type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Time,
    String,
    Other,
}

/// A single present cell
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Labels(LabelSet),
}

impl CellValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Labels(_) => None,
        }
    }

    pub fn as_labels(&self) -> Option<&LabelSet> {
        match self {
            Self::Labels(labels) => Some(labels),
            Self::Text(_) => None,
        }
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<LabelSet> for CellValue {
    fn from(labels: LabelSet) -> Self {
        Self::Labels(labels)
    }
}

/// Outbound link attached to a column
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLink {
    pub title: String,
    pub url: String,
}

impl DataLink {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }

    /// Resolve the template for one cell value
    pub fn interpolate(&self, raw: &str) -> DataLink {
        DataLink {
            title: self.title.clone(),
            url: self.url.replace(VALUE_RAW_PLACEHOLDER, raw),
        }
    }
}

/// Column-level display configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<DataLink>,
}

/// A named, typed column. A `None` value is an absent cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub config: FieldConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelSet>,

    #[serde(default)]
    pub values: Vec<Option<CellValue>>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            config: FieldConfig::default(),
            labels: None,
            values: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_link(mut self, link: DataLink) -> Self {
        self.config.links.push(link);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Present cell at `index`
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Same name, type, config and labels, without values
    pub fn empty_like(&self) -> Field {
        Field {
            name: self.name.clone(),
            field_type: self.field_type,
            config: self.config.clone(),
            labels: self.labels.clone(),
            values: Vec::new(),
        }
    }
}

/// Table-level metadata
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Line limit the result was requested with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Ordered set of columns that all hold the same number of values
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    #[serde(rename = "refId", skip_serializing_if = "Option::is_none")]
    ref_id: Option<String>,

    meta: TableMeta,

    fields: Vec<Field>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }

    pub fn ref_id(&self) -> Option<&str> {
        self.ref_id.as_deref()
    }

    pub fn set_ref_id(&mut self, ref_id: Option<String>) {
        self.ref_id = ref_id;
    }

    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut TableMeta {
        &mut self.meta
    }

    /// Add a column. Its values are padded with absent cells, or cut, to
    /// the current row count.
    pub fn add_field(&mut self, mut field: Field) {
        if !self.fields.is_empty() {
            field.values.resize(self.len(), None);
        }
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Row count
    pub fn len(&self) -> usize {
        self.fields.first().map_or(0, Field::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite one cell. Returns false if the column or row does not exist.
    pub fn set_value(&mut self, name: &str, row: usize, value: Option<CellValue>) -> bool {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) if row < field.values.len() => {
                field.values[row] = value;
                true
            }
            _ => false,
        }
    }

    /// Append a row, aligning cells to columns by name.
    ///
    /// Columns the row has no cell for get an absent cell; cells with no
    /// matching column are ignored.
    pub fn push_row(&mut self, row: &Row) {
        for field in &mut self.fields {
            field.values.push(row.get(&field.name).cloned());
        }
    }

    /// Row at `index`, with only the present cells
    pub fn row(&self, index: usize) -> Option<Row> {
        if index >= self.len() {
            return None;
        }
        let mut row = Row::new();
        for field in &self.fields {
            if let Some(value) = field.get(index) {
                row.insert(field.name.clone(), value.clone());
            }
        }
        Some(row)
    }

    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.len()).filter_map(|i| self.row(i))
    }

    /// Outbound links of one cell, resolved against its value.
    ///
    /// Empty when the column has no links or the cell is absent.
    pub fn links_at(&self, name: &str, row: usize) -> Vec<DataLink> {
        let Some(field) = self.field(name) else {
            return Vec::new();
        };
        let Some(raw) = field.get(row).and_then(CellValue::as_str) else {
            return Vec::new();
        };
        field
            .config
            .links
            .iter()
            .map(|link| link.interpolate(raw))
            .collect()
    }
}

/// One normalized row: present cells keyed by column name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, CellValue>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<CellValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Text cell by name
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(CellValue::as_str)
    }

    pub fn ts(&self) -> Option<&str> {
        self.text(TS_FIELD)
    }

    pub fn ts_ns(&self) -> Option<&str> {
        self.text(TS_NS_FIELD)
    }

    pub fn line(&self) -> Option<&str> {
        self.text(LINE_FIELD)
    }

    pub fn id(&self) -> Option<&str> {
        self.text(ID_FIELD)
    }

    pub fn labels(&self) -> Option<&LabelSet> {
        self.get(LABELS_FIELD).and_then(CellValue::as_labels)
    }
}
