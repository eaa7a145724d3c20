use thiserror::Error;

/// Errors raised while turning streams into tables
#[derive(Debug, Error)]
pub enum TransformError {
    /// Timestamp is not a non-negative base-10 nanosecond count
    #[error("invalid timestamp: {value:?}")]
    InvalidTimestamp { value: String },

    /// Entry is missing its timestamp or its line
    #[error("malformed stream entry {index}: {reason}")]
    MalformedStream { index: usize, reason: &'static str },

    /// Derived field matcher could not be compiled or is misconfigured
    #[error("invalid matcher config for {name:?}: {reason}")]
    InvalidMatcherConfig { name: String, reason: String },

    #[error("invalid buffer capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),

    #[error("index {index} out of range for {len} rows")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("response decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransformError {
    /// Whether this error only affects a single row
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            Self::InvalidTimestamp { .. } | Self::MalformedStream { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;

/// Rows dropped during a conversion, reported in aggregate
#[derive(Debug, Default)]
pub struct SkippedRows {
    /// Number of rows skipped
    pub count: usize,

    /// First failure encountered
    pub first: Option<TransformError>,
}

impl SkippedRows {
    pub fn record(&mut self, err: TransformError) {
        self.count += 1;
        if self.first.is_none() {
            self.first = Some(err);
        }
    }

    /// Fold another report into this one, keeping the earliest first error
    pub fn merge(&mut self, other: SkippedRows) {
        self.count += other.count;
        if self.first.is_none() {
            self.first = other.first;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
