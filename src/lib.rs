//! logframe
//!
//! Turns label-grouped log stream results into tables for display and
//! further querying, and keeps live tails in a fixed-capacity buffer.
//!
//! ```text
//! query response ──► TableMerger ──► tables (+ derived fields)
//! tail responses ──► TailSession ──► CircularTable
//! ```

pub use logframe_tail::{TailSession, TailStats};
pub use logframe_transform::{
    BufferState, BuiltTable, CircularTable, CompiledMatcher, DerivedFieldConfig,
    DerivedFieldExtractor, MergeOutput, Result, RowDeduplicator, RowIdentity,
    SharedCircularTable, SkippedRows, StreamTableBuilder, TableMerger, TimeCodec,
    TransformConfig, TransformError, build_tables, decode_response,
};
pub use logframe_types::{
    CORE_FIELDS, CellValue, DataLink, Field, FieldConfig, FieldType, ID_FIELD, LABELS_FIELD,
    LINE_FIELD, LabelSet, LogStream, Row, StreamEntry, StreamsResponse, TS_FIELD, TS_NS_FIELD,
    Table, TableMeta, VALUE_RAW_PLACEHOLDER,
};
