use anyhow::{Result, bail};
use ndarray::{Array2, ArrayView1};

/// Time-indexed scalar values aligned with one element set's ordering.
///
/// Shape is `(time steps, elements)`; the element axis must match the
/// element count of the set the values are defined on.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSet {
    data: Array2<f64>,
}

impl ValueSet {
    /// Wrap an existing `(times × elements)` array.
    pub fn new(data: Array2<f64>) -> Self {
        Self { data }
    }

    /// Build from one row of values per time step; rows must share a length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let times = rows.len();
        let elements = rows.first().map_or(0, Vec::len);
        if let Some(position) = rows.iter().position(|row| row.len() != elements) {
            bail!(
                "value rows are ragged: time step {position} has {} elements, expected {elements}",
                rows[position].len()
            );
        }
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Self { data: Array2::from_shape_vec((times, elements), flat)? })
    }

    /// A zero-filled value set of the given shape.
    pub(crate) fn zeros(times: usize, elements: usize) -> Self {
        Self { data: Array2::zeros((times, elements)) }
    }

    /// Number of time steps.
    #[inline] pub fn time_count(&self) -> usize { self.data.nrows() }

    /// Number of elements along the spatial axis.
    #[inline] pub fn element_count(&self) -> usize { self.data.ncols() }

    /// Values of all elements at one time step.
    #[inline] pub fn values_at(&self, time: usize) -> ArrayView1<'_, f64> { self.data.row(time) }

    /// Single scalar at `(time, element)`.
    #[inline] pub fn value(&self, time: usize, element: usize) -> f64 { self.data[[time, element]] }

    #[inline] pub(crate) fn set_value(&mut self, time: usize, element: usize, value: f64) {
        self.data[[time, element]] = value;
    }

    /// Underlying `(times × elements)` array.
    #[inline] pub fn data(&self) -> &Array2<f64> { &self.data }
}
