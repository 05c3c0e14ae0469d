use crate::spectrum::ScanLike;
use crate::storage::{store_slice, BufferView, DoubleBuffer, StorageArena};

use super::{IntensitySeries, MzSeries, SeriesError, SpectrumSeries};

/// Check that every spectrum has a retention time no earlier than its predecessor
pub(crate) fn check_ascending_rt<S: ScanLike>(spectra: &[S]) -> Result<(), SeriesError> {
    for (i, w) in spectra.windows(2).enumerate() {
        if w[1].retention_time() < w[0].retention_time() {
            return Err(SeriesError::UnsortedSpectra(i + 1));
        }
    }
    Ok(())
}

/// An LC-resolved ion trace: one (m/z, intensity) pair per spectrum, in ascending
/// retention time order.
#[derive(Debug, Clone)]
pub struct SimpleIonTimeSeries<S> {
    mz_values: DoubleBuffer,
    intensity_values: DoubleBuffer,
    spectra: Vec<S>,
}

impl<S: ScanLike + Clone> SimpleIonTimeSeries<S> {
    pub fn new(
        storage: Option<&StorageArena>,
        mz_values: &[f64],
        intensity_values: &[f64],
        spectra: Vec<S>,
    ) -> Result<Self, SeriesError> {
        Self::from_buffers(
            store_slice(storage, mz_values),
            store_slice(storage, intensity_values),
            spectra,
        )
    }

    /// Build a series over values that were already stored
    pub fn from_buffers(
        mz_values: DoubleBuffer,
        intensity_values: DoubleBuffer,
        spectra: Vec<S>,
    ) -> Result<Self, SeriesError> {
        if mz_values.len() != intensity_values.len() {
            return Err(SeriesError::length_mismatch(
                "intensity",
                mz_values.len(),
                intensity_values.len(),
            ));
        }
        if spectra.len() != mz_values.len() {
            return Err(SeriesError::length_mismatch(
                "spectrum",
                mz_values.len(),
                spectra.len(),
            ));
        }
        check_ascending_rt(&spectra)?;
        Ok(Self {
            mz_values,
            intensity_values,
            spectra,
        })
    }

    pub fn spectra_slice(&self) -> &[S] {
        &self.spectra
    }

    /// A zero-copy view of the values `start..end`
    pub fn sub_series(&self, start: usize, end: usize) -> Result<Self, SeriesError> {
        if start > end || end > self.spectra.len() {
            return Err(SeriesError::IndexOutOfRange {
                start,
                end,
                len: self.spectra.len(),
            });
        }
        Ok(Self {
            mz_values: self.mz_values.slice(start, end)?,
            intensity_values: self.intensity_values.slice(start, end)?,
            spectra: self.spectra[start..end].to_vec(),
        })
    }

    /// Create a new series over the same spectra with new values
    pub fn copy_and_replace(
        &self,
        storage: Option<&StorageArena>,
        mz_values: &[f64],
        intensity_values: &[f64],
    ) -> Result<Self, SeriesError> {
        Self::new(storage, mz_values, intensity_values, self.spectra.clone())
    }
}

impl<S> IntensitySeries for SimpleIonTimeSeries<S> {
    fn num_values(&self) -> usize {
        self.intensity_values.len()
    }

    fn intensity_values(&self) -> BufferView<'_, f64> {
        self.intensity_values.view()
    }

    fn intensity_buffer(&self) -> Result<DoubleBuffer, SeriesError> {
        Ok(self.intensity_values.clone())
    }
}

impl<S> MzSeries for SimpleIonTimeSeries<S> {
    fn mz_values(&self) -> BufferView<'_, f64> {
        self.mz_values.view()
    }

    fn mz_buffer(&self) -> Result<DoubleBuffer, SeriesError> {
        Ok(self.mz_values.clone())
    }
}

impl<S> SpectrumSeries for SimpleIonTimeSeries<S> {
    type Spectrum<'a>
        = &'a S
    where
        Self: 'a;

    fn spectrum(&self, index: usize) -> Option<Self::Spectrum<'_>> {
        self.spectra.get(index)
    }

    fn spectra(&self) -> impl Iterator<Item = Self::Spectrum<'_>> + '_ {
        self.spectra.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::{DataFile, Scan};
    use std::sync::Arc;

    fn scans(n: usize) -> Vec<Scan> {
        let file = Arc::new(DataFile::new("lc.mzML"));
        (0..n)
            .map(|i| Scan::new(file.clone(), i as u32, i as f32 * 0.1, 1, 100.0))
            .collect()
    }

    #[test_log::test]
    fn test_construction_checks() {
        let series =
            SimpleIonTimeSeries::new(None, &[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], scans(3)).unwrap();
        assert_eq!(series.num_values(), 3);
        assert_eq!(series.mz(2), 3.0);

        assert!(matches!(
            SimpleIonTimeSeries::new(None, &[1.0, 2.0], &[4.0, 5.0], scans(3)),
            Err(SeriesError::LengthMismatch { .. })
        ));

        let mut reversed = scans(3);
        reversed.reverse();
        assert!(matches!(
            SimpleIonTimeSeries::new(None, &[1.0; 3], &[1.0; 3], reversed),
            Err(SeriesError::UnsortedSpectra(1))
        ));
    }

    #[test_log::test]
    fn test_sub_series() {
        let arena = StorageArena::new();
        let series = SimpleIonTimeSeries::new(
            Some(&arena),
            &[1.0, 2.0, 3.0, 4.0],
            &[10.0, 20.0, 30.0, 40.0],
            scans(4),
        )
        .unwrap();
        let sub = series.sub_series(1, 3).unwrap();
        assert_eq!(&*sub.intensity_values(), &[20.0, 30.0]);
        assert_eq!(sub.spectrum(0).unwrap().scan_number, 1);
        assert!(series.sub_series(2, 5).is_err());

        let replaced = series
            .copy_and_replace(None, &[1.0; 4], &[0.5; 4])
            .unwrap();
        assert_eq!(replaced.intensity(3), 0.5);
        assert_eq!(series.intensity(3), 40.0);
    }
}
