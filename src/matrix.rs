/// Sparse (target × source) weight matrix.
///
/// Entries are kept per row, sorted by column, so lookups are a binary
/// search and row sums run in a deterministic order regardless of how the
/// builder discovered the entries. Absent entries read as zero; an entirely
/// empty row means the target element has no coverage, which is
/// distinguishable from stored zeros (none are stored — weights at or below
/// epsilon are dropped before insertion).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingMatrix {
    rows: Vec<Vec<(u32, f64)>>,
    columns: usize,
}

impl MappingMatrix {
    /// Create an empty matrix of the given dimensions.
    pub(crate) fn new(rows: usize, columns: usize) -> Self {
        Self { rows: vec![Vec::new(); rows], columns }
    }

    /// Number of rows (target elements).
    #[inline] pub fn row_count(&self) -> usize { self.rows.len() }

    /// Number of columns (source elements).
    #[inline] pub fn column_count(&self) -> usize { self.columns }

    /// Weight at `(row, column)`; zero for any absent entry, including
    /// indices outside the matrix dimensions.
    pub fn value(&self, row: usize, column: usize) -> f64 {
        let Some(entries) = self.rows.get(row) else {
            return 0.0;
        };
        match entries.binary_search_by_key(&(column as u32), |&(c, _)| c) {
            Ok(position) => entries[position].1,
            Err(_) => 0.0,
        }
    }

    /// True when the row holds at least one entry.
    pub fn has_coverage(&self, row: usize) -> bool {
        !self.rows[row].is_empty()
    }

    /// Number of stored (non-zero) entries.
    pub fn entry_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Iterate all stored entries as `(row, column, weight)`.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows.iter().enumerate().flat_map(|(row, entries)| {
            entries.iter().map(move |&(column, weight)| (row, column as usize, weight))
        })
    }

    /// Insert or overwrite the weight at `(row, column)`.
    pub(crate) fn set(&mut self, row: usize, column: usize, weight: f64) {
        let entries = &mut self.rows[row];
        match entries.binary_search_by_key(&(column as u32), |&(c, _)| c) {
            Ok(position) => entries[position].1 = weight,
            Err(position) => entries.insert(position, (column as u32, weight)),
        }
    }

    /// Sum of the row's stored entries, accumulated in column order.
    pub(crate) fn row_sum(&self, row: usize) -> f64 {
        self.rows[row].iter().map(|&(_, weight)| weight).sum()
    }

    /// Multiply every entry of the row by `factor`.
    pub(crate) fn scale_row(&mut self, row: usize, factor: f64) {
        for entry in &mut self.rows[row] {
            entry.1 *= factor;
        }
    }

    /// Stored entries of one row, sorted by column.
    pub(crate) fn row(&self, row: usize) -> &[(u32, f64)] {
        &self.rows[row]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_entries_read_as_zero() {
        let mut matrix = MappingMatrix::new(2, 3);
        matrix.set(0, 2, 0.25);
        assert_eq!(matrix.value(0, 2), 0.25);
        assert_eq!(matrix.value(0, 0), 0.0);
        assert_eq!(matrix.value(1, 2), 0.0);
        assert_eq!(matrix.row_count(), 2);
        assert_eq!(matrix.column_count(), 3);
    }

    #[test]
    fn out_of_range_indices_read_as_zero() {
        let mut matrix = MappingMatrix::new(2, 3);
        matrix.set(0, 2, 0.25);
        assert_eq!(matrix.value(0, 99), 0.0);
        assert_eq!(matrix.value(99, 0), 0.0);
    }

    #[test]
    fn row_sum_is_insertion_order_independent() {
        let mut forward = MappingMatrix::new(1, 4);
        for column in 0..4 {
            forward.set(0, column, 0.1 * (column + 1) as f64);
        }
        let mut backward = MappingMatrix::new(1, 4);
        for column in (0..4).rev() {
            backward.set(0, column, 0.1 * (column + 1) as f64);
        }
        assert_eq!(forward, backward);
        assert_eq!(forward.row_sum(0).to_bits(), backward.row_sum(0).to_bits());
    }

    #[test]
    fn coverage_distinguishes_empty_rows() {
        let mut matrix = MappingMatrix::new(2, 2);
        matrix.set(0, 0, 1.0);
        assert!(matrix.has_coverage(0));
        assert!(!matrix.has_coverage(1));
    }

    #[test]
    fn scale_row_normalizes_in_place() {
        let mut matrix = MappingMatrix::new(1, 2);
        matrix.set(0, 0, 3.0);
        matrix.set(0, 1, 1.0);
        let total = matrix.row_sum(0);
        matrix.scale_row(0, 1.0 / total);
        assert!((matrix.value(0, 0) - 0.75).abs() < 1e-12);
        assert!((matrix.row_sum(0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn entries_iterate_row_major_sorted() {
        let mut matrix = MappingMatrix::new(2, 3);
        matrix.set(1, 2, 0.5);
        matrix.set(0, 1, 0.25);
        matrix.set(1, 0, 0.5);
        let collected: Vec<_> = matrix.entries().collect();
        assert_eq!(collected, vec![(0, 1, 0.25), (1, 0, 0.5), (1, 2, 0.5)]);
        assert_eq!(matrix.entry_count(), 3);
    }
}
