//! Stream transforms for logframe
//!
//! This crate turns label-grouped log streams into tables: timestamp
//! conversion, row identity, derived fields, per-stream table building,
//! whole-response merging, and the fixed-capacity buffer used for live tails.

pub mod config;

mod buffer;
mod builder;
mod decode;
mod dedup;
mod derived;
mod error;
mod identity;
mod merger;
mod time;

pub use buffer::{BufferState, CircularTable, SharedCircularTable};
pub use builder::{BuiltTable, StreamTableBuilder};
pub use config::TransformConfig;
pub use decode::decode_response;
pub use dedup::RowDeduplicator;
pub use derived::{CompiledMatcher, DerivedFieldConfig, DerivedFieldExtractor};
pub use error::{Result, SkippedRows, TransformError};
pub use identity::RowIdentity;
pub use merger::{MergeOutput, TableMerger, build_tables};
pub use time::TimeCodec;

// Re-export types used in our public API
pub use logframe_types::{
    CellValue, DataLink, Field, FieldType, LabelSet, LogStream, Row, StreamEntry,
    StreamsResponse, Table, TableMeta,
};
