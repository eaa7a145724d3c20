use tracing::{debug, warn};

use logframe_types::{LogStream, Table};

use crate::builder::{BuiltTable, StreamTableBuilder};
use crate::config::TransformConfig;
use crate::derived::{DerivedFieldConfig, DerivedFieldExtractor};
use crate::error::{Result, SkippedRows, TransformError};

/// Result of converting a whole query response
#[derive(Debug)]
pub struct MergeOutput {
    /// One table per input stream, in input order
    pub tables: Vec<Table>,

    /// Advisory: the total row count reached the configured line limit
    pub max_lines_reached: bool,

    pub skipped: SkippedRows,
}

impl MergeOutput {
    /// Row count across all tables
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(Table::len).sum()
    }
}

/// Builds one table per stream and decorates them with derived fields
#[derive(Clone, Debug)]
pub struct TableMerger {
    extractor: DerivedFieldExtractor,

    max_lines: usize,
}

impl TableMerger {
    /// Validate the line limit and compile every matcher up front
    pub fn new(max_lines: usize, derived_fields: &[DerivedFieldConfig]) -> Result<Self> {
        if max_lines == 0 {
            return Err(TransformError::InvalidConfig(
                "max_lines must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            extractor: DerivedFieldExtractor::compile(derived_fields)?,
            max_lines,
        })
    }

    pub fn from_config(config: &TransformConfig) -> Result<Self> {
        Self::new(config.max_lines, &config.derived_fields)
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    pub fn extractor(&self) -> &DerivedFieldExtractor {
        &self.extractor
    }

    /// Convert every stream. Rows are never truncated here; reaching the
    /// limit is only flagged for the caller to act on.
    pub fn merge(&self, streams: &[LogStream], target_ref: Option<&str>) -> MergeOutput {
        let mut tables = Vec::with_capacity(streams.len());
        let mut skipped = SkippedRows::default();

        for stream in streams {
            let BuiltTable {
                mut table,
                skipped: stream_skipped,
            } = StreamTableBuilder::build(stream);
            skipped.merge(stream_skipped);

            table.set_ref_id(target_ref.map(str::to_string));
            table.meta_mut().limit = Some(self.max_lines);
            self.extractor.apply(&mut table);
            tables.push(table);
        }

        let total_rows: usize = tables.iter().map(Table::len).sum();
        let max_lines_reached = total_rows >= self.max_lines;

        debug!(
            tables = tables.len(),
            rows = total_rows,
            max_lines = self.max_lines,
            max_lines_reached,
            "merged stream tables"
        );
        if !skipped.is_empty() {
            warn!(skipped = skipped.count, "rows skipped while merging streams");
        }

        MergeOutput {
            tables,
            max_lines_reached,
            skipped,
        }
    }
}

/// One-shot form of [`TableMerger`]: validate, then convert
pub fn build_tables(
    streams: &[LogStream],
    target_ref: Option<&str>,
    max_lines: usize,
    derived_fields: &[DerivedFieldConfig],
) -> Result<MergeOutput> {
    Ok(TableMerger::new(max_lines, derived_fields)?.merge(streams, target_ref))
}

#[cfg(test)]
mod tests {
    use super::*;
    use logframe_types::{FieldType, LabelSet};

    fn streams() -> Vec<LogStream> {
        vec![
            LogStream::new([("foo", "bar")].into_iter().collect())
                .with_entry("1579857562021616000", "foo: 'bar' trace=aaa"),
            LogStream::new([("bar", "foo")].into_iter().collect())
                .with_entry("1579857562031616000", "bar: 'foo'")
                .with_entry("1579857562041616000", "trace=bbb"),
        ]
    }

    #[test]
    fn test_one_table_per_stream() {
        let output = build_tables(&streams(), Some("B"), 500, &[]).unwrap();
        assert_eq!(output.tables.len(), 2);
        assert_eq!(output.total_rows(), 3);
        assert!(!output.max_lines_reached);
        assert!(output.skipped.is_empty());

        let first = &output.tables[0];
        assert_eq!(first.ref_id(), Some("B"));
        assert_eq!(first.meta().limit, Some(500));
        assert_eq!(
            first.field("line").unwrap().labels.as_ref().and_then(|l| l.get("foo")),
            Some("bar")
        );
        assert_eq!(output.tables[1].row(0).unwrap().ts(), Some("2020-01-24T09:19:22.031Z"));
    }

    #[test]
    fn test_derived_fields_on_every_table() {
        let derived = [DerivedFieldConfig::new(r"trace=(\w+)", "test").with_url("example.com")];
        let output = build_tables(&streams(), Some("B"), 500, &derived).unwrap();

        for table in &output.tables {
            let field = table.field("test").unwrap();
            assert_eq!(field.field_type, FieldType::String);
        }
        assert_eq!(output.tables[0].row(0).unwrap().text("test"), Some("aaa"));
        assert_eq!(output.tables[1].row(0).unwrap().text("test"), None);
        assert_eq!(output.tables[1].row(1).unwrap().text("test"), Some("bbb"));
    }

    #[test]
    fn test_max_lines_boundary() {
        // three rows in total
        let below = build_tables(&streams(), None, 4, &[]).unwrap();
        assert!(!below.max_lines_reached);

        let at = build_tables(&streams(), None, 3, &[]).unwrap();
        assert!(at.max_lines_reached);
        assert_eq!(at.total_rows(), 3, "rows are never truncated");

        let above = build_tables(&streams(), None, 1, &[]).unwrap();
        assert!(above.max_lines_reached);
        assert_eq!(above.total_rows(), 3);
    }

    #[test]
    fn test_bad_matcher_fails_before_processing() {
        let derived = [DerivedFieldConfig::new("(unclosed", "test")];
        let err = build_tables(&streams(), None, 10, &derived).unwrap_err();
        assert!(matches!(err, TransformError::InvalidMatcherConfig { .. }));
    }

    #[test]
    fn test_zero_max_lines_rejected() {
        assert!(matches!(
            TableMerger::new(0, &[]),
            Err(TransformError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_skipped_rows_aggregate_across_streams() {
        let bad = vec![
            LogStream::new(LabelSet::new()).with_entry("x", "a"),
            LogStream::new(LabelSet::new())
                .with_entry("1", "ok")
                .with_entry("y", "b"),
        ];
        let output = build_tables(&bad, None, 10, &[]).unwrap();
        assert_eq!(output.tables.len(), 2);
        assert!(output.tables[0].is_empty());
        assert_eq!(output.total_rows(), 1);
        assert_eq!(output.skipped.count, 2);
        assert!(matches!(
            output.skipped.first,
            Some(TransformError::InvalidTimestamp { ref value }) if value == "x"
        ));
    }

    #[test]
    fn test_empty_input() {
        let output = build_tables(&[], None, 1, &[]).unwrap();
        assert!(output.tables.is_empty());
        assert!(!output.max_lines_reached);
    }
}
