use std::borrow::Cow;

use crate::storage::{BufferView, DoubleBuffer};

use super::SeriesError;

/// A series of intensity values
pub trait IntensitySeries {
    fn num_values(&self) -> usize;

    fn intensity_values(&self) -> BufferView<'_, f64>;

    /// The stored intensity buffer of this series. Views that do not own stored values
    /// return [`SeriesError::Unsupported`].
    fn intensity_buffer(&self) -> Result<DoubleBuffer, SeriesError>;

    /// # Panics
    /// If `index` is out of bounds
    fn intensity(&self, index: usize) -> f64 {
        self.intensity_values()[index]
    }

    /// The index of the most intense value, the first one on ties. `None` when the
    /// series is empty or has no positive intensity.
    fn most_intense_index(&self) -> Option<usize> {
        let view = self.intensity_values();
        let mut best: Option<(usize, f64)> = None;
        for (i, v) in view.iter().copied().enumerate() {
            if v > best.map(|(_, b)| b).unwrap_or(0.0) {
                best = Some((i, v));
            }
        }
        best.map(|(i, _)| i)
    }

    fn is_empty(&self) -> bool {
        self.num_values() == 0
    }
}

/// A series of m/z values paired with intensities
pub trait MzSeries: IntensitySeries {
    fn mz_values(&self) -> BufferView<'_, f64>;

    fn mz_buffer(&self) -> Result<DoubleBuffer, SeriesError>;

    /// # Panics
    /// If `index` is out of bounds
    fn mz(&self, index: usize) -> f64 {
        self.mz_values()[index]
    }
}

/// A series whose values are keyed by ion mobility
pub trait MobilitySeries {
    /// # Panics
    /// If `index` is out of bounds
    fn mobility(&self, index: usize) -> f64;

    fn mobility_values(&self) -> Cow<'_, [f64]>;
}

/// A series in which every value maps to exactly one spectrum
pub trait SpectrumSeries {
    type Spectrum<'a>
    where
        Self: 'a;

    fn spectrum(&self, index: usize) -> Option<Self::Spectrum<'_>>;

    fn spectra(&self) -> impl Iterator<Item = Self::Spectrum<'_>> + '_;
}
