//! Brute-force grid exploration of the similarity landscape.

use nalgebra::DVector;
use tracing::debug;
use voxreg_core::Transform;

use super::HistogramRegistration;

/// Lazy iterator over the Cartesian product of candidate parameter values.
///
/// Yields `(similarity, parameters)` for every combination, the last axis
/// varying fastest. Parameters not listed keep the values of the base
/// transform. A clone is an independent cursor at the same position, so a
/// clone taken before iterating replays the whole grid.
#[derive(Clone)]
pub struct Exploration<'a, T: Transform> {
    registration: &'a HistogramRegistration,
    transform: T,
    axes: Vec<usize>,
    values: Vec<Vec<f64>>,
    position: usize,
    total: usize,
}

impl<'a, T: Transform> Exploration<'a, T> {
    pub(super) fn new(
        registration: &'a HistogramRegistration,
        transform: T,
        grid: &[(usize, Vec<f64>)],
    ) -> Self {
        let axes: Vec<usize> = grid.iter().map(|(axis, _)| *axis).collect();
        let values: Vec<Vec<f64>> = grid.iter().map(|(_, v)| v.clone()).collect();
        let total = values.iter().map(Vec::len).product();
        Self {
            registration,
            transform,
            axes,
            values,
            position: 0,
            total,
        }
    }

    /// Number of combinations in the full grid.
    pub fn grid_size(&self) -> usize {
        self.total
    }

    /// Evaluate every remaining combination.
    pub fn unzip_all(self) -> (Vec<f64>, Vec<DVector<f64>>) {
        self.unzip()
    }

    fn parameters_at(&self, mut position: usize) -> DVector<f64> {
        let mut params = self.transform.parameters();
        for (axis, values) in self.axes.iter().zip(&self.values).rev() {
            params[*axis] = values[position % values.len()];
            position /= values.len();
        }
        params
    }
}

impl<T: Transform> Iterator for Exploration<'_, T> {
    type Item = (f64, DVector<f64>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total {
            return None;
        }
        let params = self.parameters_at(self.position);
        self.position += 1;

        let similarity = self
            .registration
            .eval(&self.transform.with_parameters(&params));
        debug!(
            "Explore {}/{}: params {:?} -> {:.6}",
            self.position,
            self.total,
            params.as_slice(),
            similarity
        );
        Some((similarity, params))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.position;
        (remaining, Some(remaining))
    }
}

impl<T: Transform> ExactSizeIterator for Exploration<'_, T> {}
