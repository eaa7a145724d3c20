use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use logframe_types::{CellValue, Field, LINE_FIELD, LabelSet, Row, StreamsResponse, Table};

use crate::builder::StreamTableBuilder;
use crate::error::{Result, SkippedRows, TransformError};

/// Upper bound on rows reserved up front; larger buffers grow on demand
const PREALLOC_ROWS: usize = 1024;

/// Fill state of a circular table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferState {
    Empty,
    Filling,
    Full,
}

/// Fixed-capacity FIFO table for live tailing.
///
/// The column set is fixed at construction. Once full, every appended row
/// evicts the oldest one.
#[derive(Clone, Debug)]
pub struct CircularTable {
    /// Column schema (values unused)
    schema: Vec<Field>,

    /// One queue per schema column
    columns: Vec<VecDeque<Option<CellValue>>>,

    /// Maximum row count
    capacity: usize,

    /// Retained row count, tracked apart from the columns so a table with no
    /// columns still counts its rows
    len: usize,

    /// Rows evicted over the buffer's lifetime
    evicted: u64,
}

impl CircularTable {
    /// Create an empty buffer with the given columns
    pub fn new(capacity: usize, schema: Vec<Field>) -> Result<Self> {
        if capacity == 0 {
            return Err(TransformError::InvalidCapacity(capacity));
        }

        let mut names = HashSet::new();
        for field in &schema {
            if !names.insert(field.name.as_str()) {
                return Err(TransformError::DuplicateColumn(field.name.clone()));
            }
        }

        let schema: Vec<Field> = schema.iter().map(Field::empty_like).collect();
        let columns = schema
            .iter()
            .map(|_| VecDeque::with_capacity(capacity.min(PREALLOC_ROWS)))
            .collect();

        Ok(Self {
            schema,
            columns,
            capacity,
            len: 0,
            evicted: 0,
        })
    }

    /// Buffer with the standard stream columns, `pinned` attached to `line`
    pub fn for_tail(capacity: usize, pinned: LabelSet) -> Result<Self> {
        let schema = StreamTableBuilder::schema(pinned);
        Self::new(capacity, schema.fields().to_vec())
    }

    /// Append rows in order, evicting the oldest row for each row that
    /// arrives while full. Cells are aligned to columns by name; missing
    /// cells are stored absent and unknown names are ignored.
    pub fn append<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = Row>,
    {
        let mut appended = 0usize;
        let evicted_before = self.evicted;

        for row in rows {
            if self.len >= self.capacity {
                for column in &mut self.columns {
                    column.pop_front();
                }
                self.evicted += 1;
            } else {
                self.len += 1;
            }
            for (field, column) in self.schema.iter().zip(&mut self.columns) {
                column.push_back(row.get(&field.name).cloned());
            }
            appended += 1;
        }

        debug!(
            appended,
            evicted = self.evicted - evicted_before,
            len = self.len(),
            "appended rows to circular table"
        );
    }

    /// Convert a tail response and append it.
    ///
    /// All rows are converted before the buffer is touched, so a call either
    /// appends every convertible row or leaves the buffer as it was.
    /// Entries that fail to convert are skipped and reported.
    pub fn append_response(&mut self, response: &StreamsResponse) -> SkippedRows {
        let pinned = self.line_labels().cloned().unwrap_or_default();
        let (rows, skipped) = Self::convert_response(&pinned, response);
        self.append(rows);
        skipped
    }

    /// Rows for every entry of `response`, with `pinned` left out of each
    /// row's labels
    fn convert_response(pinned: &LabelSet, response: &StreamsResponse) -> (Vec<Row>, SkippedRows) {
        let mut rows = Vec::with_capacity(response.entry_count());
        let mut skipped = SkippedRows::default();

        for stream in &response.streams {
            let (stream_rows, stream_skipped) = StreamTableBuilder::rows(stream, pinned);
            rows.extend(stream_rows);
            skipped.merge(stream_skipped);
        }

        (rows, skipped)
    }

    /// Row at logical position `index`, 0 being the oldest retained row
    pub fn get(&self, index: usize) -> Result<Row> {
        let len = self.len();
        if index >= len {
            return Err(TransformError::IndexOutOfRange { index, len });
        }

        let mut row = Row::new();
        for (field, column) in self.schema.iter().zip(&self.columns) {
            if let Some(Some(value)) = column.get(index) {
                row.insert(field.name.clone(), value.clone());
            }
        }
        Ok(row)
    }

    /// Retained rows, oldest first
    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.len()).filter_map(|i| self.get(i).ok())
    }

    /// Current row count
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> BufferState {
        match self.len() {
            0 => BufferState::Empty,
            n if n < self.capacity => BufferState::Filling,
            _ => BufferState::Full,
        }
    }

    /// Rows evicted since construction
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn fields(&self) -> &[Field] {
        &self.schema
    }

    /// Labels pinned to the `line` column
    pub fn line_labels(&self) -> Option<&LabelSet> {
        self.schema
            .iter()
            .find(|f| f.name == LINE_FIELD)
            .and_then(|f| f.labels.as_ref())
    }

    /// Copy of the retained rows as a plain table
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        for (field, column) in self.schema.iter().zip(&self.columns) {
            let mut field = field.empty_like();
            field.values = column.iter().cloned().collect();
            table.add_field(field);
        }
        table
    }
}

/// Cloneable handle to one circular table.
///
/// Appends take the write lock, so concurrent producers are serialized;
/// readers get copies.
#[derive(Clone, Debug)]
pub struct SharedCircularTable {
    inner: Arc<RwLock<CircularTable>>,
}

impl SharedCircularTable {
    pub fn new(table: CircularTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    pub fn append<I>(&self, rows: I)
    where
        I: IntoIterator<Item = Row>,
    {
        self.inner.write().append(rows);
    }

    /// Convert outside the lock, then append under the write lock. Pinned
    /// labels are fixed at construction, so reading them first is safe.
    pub fn append_response(&self, response: &StreamsResponse) -> SkippedRows {
        let pinned = self.inner.read().line_labels().cloned().unwrap_or_default();
        let (rows, skipped) = CircularTable::convert_response(&pinned, response);
        self.inner.write().append(rows);
        skipped
    }

    pub fn get(&self, index: usize) -> Result<Row> {
        self.inner.read().get(index)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn state(&self) -> BufferState {
        self.inner.read().state()
    }

    /// Snapshot of the retained rows
    pub fn snapshot(&self) -> Table {
        self.inner.read().to_table()
    }

    /// Run `f` under the read lock
    pub fn read<R>(&self, f: impl FnOnce(&CircularTable) -> R) -> R {
        f(&self.inner.read())
    }
}

impl From<CircularTable> for SharedCircularTable {
    fn from(table: CircularTable) -> Self {
        Self::new(table)
    }
}
