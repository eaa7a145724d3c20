use tracing::{debug, warn};

use logframe_types::{
    Field, FieldType, ID_FIELD, LABELS_FIELD, LINE_FIELD, LabelSet, LogStream, Row, StreamEntry,
    TS_FIELD, TS_NS_FIELD, Table,
};

use crate::error::{Result, SkippedRows, TransformError};
use crate::identity::RowIdentity;
use crate::time::TimeCodec;

/// A table built from one stream, plus the rows that could not be converted
#[derive(Debug)]
pub struct BuiltTable {
    pub table: Table,
    pub skipped: SkippedRows,
}

/// Converts a label-grouped stream into a table
pub struct StreamTableBuilder;

impl StreamTableBuilder {
    /// Empty table with the core columns, `line_labels` attached to `line`
    pub fn schema(line_labels: LabelSet) -> Table {
        let mut table = Table::new();
        table.add_field(Field::new(TS_FIELD, FieldType::Time).with_title("Time"));
        table.add_field(Field::new(TS_NS_FIELD, FieldType::String).with_title("Time ns"));
        table.add_field(Field::new(LINE_FIELD, FieldType::String).with_labels(line_labels));
        table.add_field(Field::new(LABELS_FIELD, FieldType::Other));
        table.add_field(Field::new(ID_FIELD, FieldType::String));
        table
    }

    /// One row per entry, in entry order. Entries that fail to convert are
    /// skipped and reported instead of aborting the stream.
    pub fn build(stream: &LogStream) -> BuiltTable {
        let mut table = Self::schema(stream.labels.clone());
        let (rows, skipped) = Self::rows(stream, &stream.labels);
        for row in &rows {
            table.push_row(row);
        }

        debug!(
            labels = %stream.labels,
            rows = rows.len(),
            skipped = skipped.count,
            "built stream table"
        );
        if let Some(first) = &skipped.first {
            warn!(skipped = skipped.count, error = %first, "skipped malformed stream entries");
        }

        BuiltTable { table, skipped }
    }

    /// Convert every entry of `stream` into a row.
    ///
    /// Labels in `pinned` are assumed to live on the `line` column already
    /// and are left out of each row's `labels` cell.
    pub fn rows(stream: &LogStream, pinned: &LabelSet) -> (Vec<Row>, SkippedRows) {
        let extra = stream.labels.without(pinned);
        let mut rows = Vec::with_capacity(stream.values.len());
        let mut skipped = SkippedRows::default();

        for (index, entry) in stream.values.iter().enumerate() {
            match Self::row(&stream.labels, &extra, index, entry) {
                Ok(row) => rows.push(row),
                Err(err) => skipped.record(err),
            }
        }

        (rows, skipped)
    }

    fn row(labels: &LabelSet, extra: &LabelSet, index: usize, entry: &StreamEntry) -> Result<Row> {
        let nanos = entry
            .timestamp
            .as_deref()
            .ok_or(TransformError::MalformedStream {
                index,
                reason: "missing timestamp",
            })?;
        let line = entry
            .line
            .as_deref()
            .ok_or(TransformError::MalformedStream {
                index,
                reason: "missing line",
            })?;

        Ok(Row::new()
            .with(TS_FIELD, TimeCodec::to_millis_iso(nanos)?)
            .with(TS_NS_FIELD, TimeCodec::passthrough_nanos(nanos))
            .with(LINE_FIELD, line)
            .with(LABELS_FIELD, extra.clone())
            .with(ID_FIELD, RowIdentity::compute_id(labels, nanos, line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logframe_types::CellValue;
    use proptest::prelude::*;

    fn foo_bar() -> LabelSet {
        [("foo", "bar")].into_iter().collect()
    }

    #[test]
    fn test_build_single_entry() {
        let stream = LogStream::new(foo_bar()).with_entry("1579857562021616000", "foo: 'bar'");
        let BuiltTable { table, skipped } = StreamTableBuilder::build(&stream);

        assert!(skipped.is_empty());
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.field_names().collect::<Vec<_>>(),
            vec!["ts", "tsNs", "line", "labels", "id"]
        );
        assert_eq!(table.field(LINE_FIELD).unwrap().labels, Some(foo_bar()));

        let row = table.row(0).unwrap();
        assert_eq!(row.ts(), Some("2020-01-24T09:19:22.021Z"));
        assert_eq!(row.ts_ns(), Some("1579857562021616000"));
        assert_eq!(row.line(), Some("foo: 'bar'"));
        assert_eq!(row.labels(), Some(&LabelSet::new()));
        assert_eq!(row.id(), Some("ee22841c5aba13c82e57c3011a2349ba"));
    }

    #[test]
    fn test_skips_bad_entries_and_reports() {
        let mut stream = LogStream::new(foo_bar())
            .with_entry("1", "first")
            .with_entry("nope", "bad ts")
            .with_entry("3", "third");
        stream.values.push(StreamEntry {
            timestamp: Some("4".to_string()),
            line: None,
        });

        let built = StreamTableBuilder::build(&stream);
        assert_eq!(built.table.len(), 2);
        assert_eq!(built.skipped.count, 2);
        assert!(matches!(
            built.skipped.first,
            Some(TransformError::InvalidTimestamp { ref value }) if value == "nope"
        ));
        let lines: Vec<_> = built.table.rows().map(|r| r.line().unwrap().to_string()).collect();
        assert_eq!(lines, vec!["first", "third"]);
    }

    #[test]
    fn test_missing_timestamp_is_malformed() {
        let mut stream = LogStream::new(LabelSet::new());
        stream.values.push(StreamEntry {
            timestamp: None,
            line: Some("x".to_string()),
        });
        let built = StreamTableBuilder::build(&stream);
        assert!(built.table.is_empty());
        assert!(matches!(
            built.skipped.first,
            Some(TransformError::MalformedStream { index: 0, reason: "missing timestamp" })
        ));
    }

    #[test]
    fn test_rows_leave_out_pinned_labels() {
        let labels: LabelSet = [("filename", "/var/log/app.log"), ("job", "app")]
            .into_iter()
            .collect();
        let pinned: LabelSet = [("job", "app")].into_iter().collect();
        let stream = LogStream::new(labels.clone()).with_entry("1", "x");

        let (rows, skipped) = StreamTableBuilder::rows(&stream, &pinned);
        assert!(skipped.is_empty());
        assert_eq!(
            rows[0].get(LABELS_FIELD),
            Some(&CellValue::from(labels.without(&pinned)))
        );
        // identity still covers every stream label
        assert_eq!(rows[0].id(), Some(RowIdentity::compute_id(&labels, "1", "x").as_str()));
    }

    #[test]
    fn test_unsorted_input_is_not_sorted() {
        let stream = LogStream::new(LabelSet::new())
            .with_entry("3000000", "c")
            .with_entry("1000000", "a")
            .with_entry("2000000", "b");
        let table = StreamTableBuilder::build(&stream).table;
        let lines: Vec<_> = table.rows().map(|r| r.line().unwrap().to_string()).collect();
        assert_eq!(lines, vec!["c", "a", "b"]);
    }

    proptest! {
        #[test]
        fn prop_order_preserved_and_idempotent(
            entries in proptest::collection::vec(("[0-9]{1,19}", ".{0,32}"), 0..40)
        ) {
            let mut stream = LogStream::new(foo_bar());
            for (ts, line) in &entries {
                stream = stream.with_entry(ts.clone(), line.clone());
            }

            let first = StreamTableBuilder::build(&stream);
            let second = StreamTableBuilder::build(&stream);
            prop_assert_eq!(&first.table, &second.table);
            prop_assert_eq!(first.table.len(), entries.len());

            for (i, (ts, line)) in entries.iter().enumerate() {
                let row = first.table.row(i).unwrap();
                prop_assert_eq!(row.ts_ns(), Some(ts.as_str()));
                prop_assert_eq!(row.line(), Some(line.as_str()));
            }
        }
    }
}
