//! Two-dimensional record locator tables.

/// Rows of optional locators, e.g. scans × radials.
///
/// Rows may be shorter than the table width; lookups past a row's end, like
/// explicit `None` entries, mean "no record".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorTable<L> {
    rows: Vec<Vec<Option<L>>>,
    width: usize,
}

impl<L> Default for LocatorTable<L> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            width: 0,
        }
    }
}

impl<L: Copy> LocatorTable<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row. Existing rows are left untouched.
    pub fn push_row(&mut self, row: Vec<Option<L>>) {
        self.width = self.width.max(row.len());
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, col: usize) -> Option<L> {
        self.rows.get(row)?.get(col).copied().flatten()
    }

    pub fn row(&self, row: usize) -> Option<&[Option<L>]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Longest row length.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of present locators in a row.
    pub fn present_in_row(&self, row: usize) -> usize {
        self.rows
            .get(row)
            .map_or(0, |r| r.iter().filter(|l| l.is_some()).count())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
