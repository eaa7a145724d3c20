use std::collections::HashSet;

use logframe_types::{Row, Table};

/// Set of row ids already seen by a caller accumulating overlapping fetches
#[derive(Clone, Debug, Default)]
pub struct RowDeduplicator {
    seen: HashSet<String>,
}

impl RowDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the row's id, returning whether it was new.
    /// Rows without an id are always treated as new.
    pub fn observe(&mut self, row: &Row) -> bool {
        match row.id() {
            Some(id) => self.seen.insert(id.to_string()),
            None => true,
        }
    }

    /// Keep only rows not seen before, in order
    pub fn retain_new(&mut self, rows: Vec<Row>) -> Vec<Row> {
        rows.into_iter().filter(|row| self.observe(row)).collect()
    }

    /// Copy of `table` without the rows already seen
    pub fn filter_table(&mut self, table: &Table) -> Table {
        let mut filtered = Table::new();
        filtered.set_ref_id(table.ref_id().map(str::to_string));
        *filtered.meta_mut() = table.meta().clone();
        for field in table.fields() {
            filtered.add_field(field.empty_like());
        }
        for row in table.rows() {
            if self.observe(&row) {
                filtered.push_row(&row);
            }
        }
        filtered
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
