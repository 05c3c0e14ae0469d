use std::borrow::Cow;
use std::sync::Arc;

use crate::spectrum::{Frame, MobilityScan};
use crate::storage::{store_slice, BufferView, DoubleBuffer, IntBuffer, StorageArena};

use super::{IntensitySeries, MobilitySeries, MzSeries, SeriesError, SpectrumSeries};

/// Where a mobilogram's values live inside a stored mobilogram collection
#[derive(Debug, Clone)]
pub(crate) struct StorageOrigin {
    pub storage_id: u64,
    pub offset: usize,
    pub mz_parent: DoubleBuffer,
    pub intensity_parent: DoubleBuffer,
}

/// A mobilogram: (m/z, intensity) pairs across the mobility scans of a single frame.
///
/// Each value is tied to a mobility scan of [`IonMobilitySeries::frame`] by its
/// frame-local scan index.
#[derive(Debug, Clone)]
pub struct IonMobilitySeries {
    frame: Arc<Frame>,
    scan_indices: IntBuffer,
    mz_values: DoubleBuffer,
    intensity_values: DoubleBuffer,
    origin: Option<StorageOrigin>,
}

fn check_scan_indices(frame: &Frame, scan_indices: &[i32]) -> Result<(), SeriesError> {
    let num_scans = frame.num_mobility_scans();
    for (i, idx) in scan_indices.iter().copied().enumerate() {
        if idx < 0 || idx as usize >= num_scans {
            return Err(SeriesError::MobilityScanOutOfRange {
                index: idx,
                num_scans,
            });
        }
        if i > 0 && scan_indices[i - 1] >= idx {
            return Err(SeriesError::UnsortedSpectra(i));
        }
    }
    Ok(())
}

impl IonMobilitySeries {
    /// Build a mobilogram from the frame-local indices of the mobility scans each value
    /// was observed in. Indices must be strictly ascending.
    pub fn new(
        storage: Option<&StorageArena>,
        frame: Arc<Frame>,
        scan_indices: &[i32],
        mz_values: &[f64],
        intensity_values: &[f64],
    ) -> Result<Self, SeriesError> {
        if mz_values.len() != intensity_values.len() {
            return Err(SeriesError::length_mismatch(
                "intensity",
                mz_values.len(),
                intensity_values.len(),
            ));
        }
        if scan_indices.len() != mz_values.len() {
            return Err(SeriesError::length_mismatch(
                "mobility scan",
                mz_values.len(),
                scan_indices.len(),
            ));
        }
        check_scan_indices(&frame, scan_indices)?;
        Ok(Self {
            frame,
            scan_indices: store_slice(storage, scan_indices),
            mz_values: store_slice(storage, mz_values),
            intensity_values: store_slice(storage, intensity_values),
            origin: None,
        })
    }

    /// Build a mobilogram from mobility scans, all of which must belong to `frame`
    pub fn from_mobility_scans(
        storage: Option<&StorageArena>,
        frame: &Arc<Frame>,
        scans: &[MobilityScan<'_>],
        mz_values: &[f64],
        intensity_values: &[f64],
    ) -> Result<Self, SeriesError> {
        let mut scan_indices = Vec::with_capacity(scans.len());
        for (i, scan) in scans.iter().enumerate() {
            if !scan.is_in(frame) {
                return Err(SeriesError::MixedFrames {
                    index: i,
                    scan_number: frame.scan.scan_number,
                });
            }
            scan_indices.push(scan.index() as i32);
        }
        Self::new(storage, frame.clone(), &scan_indices, mz_values, intensity_values)
    }

    pub(crate) fn from_stored(
        frame: Arc<Frame>,
        scan_indices: IntBuffer,
        mz_values: DoubleBuffer,
        intensity_values: DoubleBuffer,
        origin: Option<StorageOrigin>,
    ) -> Self {
        Self {
            frame,
            scan_indices,
            mz_values,
            intensity_values,
            origin,
        }
    }

    pub fn frame(&self) -> &Arc<Frame> {
        &self.frame
    }

    pub fn scan_indices(&self) -> &IntBuffer {
        &self.scan_indices
    }

    /// The frame-local index of the mobility scan of value `index`
    ///
    /// # Panics
    /// If `index` is out of bounds
    pub fn scan_index(&self, index: usize) -> usize {
        self.scan_indices.view()[index] as usize
    }

    /// The position of this mobilogram's values within the shared buffers of the
    /// collection it was read from, if any
    pub fn storage_offset(&self) -> Option<usize> {
        self.origin.as_ref().map(|o| o.offset)
    }

    pub(crate) fn origin(&self) -> Option<&StorageOrigin> {
        self.origin.as_ref()
    }

    /// Create a new mobilogram over the same mobility scans with new values
    pub fn copy_and_replace(
        &self,
        storage: Option<&StorageArena>,
        mz_values: &[f64],
        intensity_values: &[f64],
    ) -> Result<Self, SeriesError> {
        let n = self.scan_indices.len();
        if mz_values.len() != n || intensity_values.len() != n {
            return Err(SeriesError::length_mismatch(
                "value",
                n,
                mz_values.len().max(intensity_values.len()),
            ));
        }
        Ok(Self {
            frame: self.frame.clone(),
            scan_indices: self.scan_indices.clone(),
            mz_values: store_slice(storage, mz_values),
            intensity_values: store_slice(storage, intensity_values),
            origin: None,
        })
    }
}

impl IntensitySeries for IonMobilitySeries {
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

impl MzSeries for IonMobilitySeries {
    fn mz_values(&self) -> BufferView<'_, f64> {
        self.mz_values.view()
    }

    fn mz_buffer(&self) -> Result<DoubleBuffer, SeriesError> {
        Ok(self.mz_values.clone())
    }
}

impl MobilitySeries for IonMobilitySeries {
    fn mobility(&self, index: usize) -> f64 {
        self.frame.mobilities[self.scan_index(index)]
    }

    fn mobility_values(&self) -> Cow<'_, [f64]> {
        let indices = self.scan_indices.view();
        Cow::Owned(
            indices
                .iter()
                .map(|i| self.frame.mobilities[*i as usize])
                .collect(),
        )
    }
}

impl SpectrumSeries for IonMobilitySeries {
    type Spectrum<'a>
        = MobilityScan<'a>
    where
        Self: 'a;

    fn spectrum(&self, index: usize) -> Option<Self::Spectrum<'_>> {
        let scan_index = self.scan_indices.get(index)?;
        self.frame.mobility_scan(scan_index as usize)
    }

    fn spectra(&self) -> impl Iterator<Item = Self::Spectrum<'_>> + '_ {
        (0..self.scan_indices.len()).filter_map(move |i| self.spectrum(i))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::{DataFile, MobilityType, Scan};

    fn frame(scan_number: u32) -> Arc<Frame> {
        let file = Arc::new(DataFile::new("run.d"));
        Arc::new(Frame::new(
            Scan::new(file, scan_number, scan_number as f32, 1, 1e5),
            MobilityType::Tims,
            vec![1.4, 1.3, 1.2, 1.1, 1.0],
        ))
    }

    #[test_log::test]
    fn test_from_mobility_scans() {
        let frame = frame(1);
        let scans: Vec<_> = [1, 3].iter().filter_map(|i| frame.mobility_scan(*i)).collect();
        let mobilogram =
            IonMobilitySeries::from_mobility_scans(None, &frame, &scans, &[500.0, 500.1], &[10.0, 20.0])
                .unwrap();
        assert_eq!(mobilogram.num_values(), 2);
        assert_eq!(mobilogram.mobility(1), 1.1);
        assert_eq!(mobilogram.spectrum(0).unwrap().index(), 1);
        assert_eq!(&*mobilogram.mobility_values(), &[1.3, 1.1]);
        assert_eq!(mobilogram.storage_offset(), None);
    }

    #[test_log::test]
    fn test_scans_must_share_frame() {
        let a = frame(1);
        let b = frame(2);
        let scans = vec![a.mobility_scan(0).unwrap(), b.mobility_scan(1).unwrap()];
        let err = IonMobilitySeries::from_mobility_scans(None, &a, &scans, &[1.0, 2.0], &[1.0, 2.0])
            .unwrap_err();
        assert_eq!(
            err,
            SeriesError::MixedFrames {
                index: 1,
                scan_number: 1
            }
        );
    }

    #[test_log::test]
    fn test_validation() {
        let frame = frame(1);
        assert!(matches!(
            IonMobilitySeries::new(None, frame.clone(), &[0, 7], &[1.0, 2.0], &[1.0, 2.0]),
            Err(SeriesError::MobilityScanOutOfRange { index: 7, .. })
        ));
        assert!(matches!(
            IonMobilitySeries::new(None, frame.clone(), &[2, 1], &[1.0, 2.0], &[1.0, 2.0]),
            Err(SeriesError::UnsortedSpectra(1))
        ));
        assert!(matches!(
            IonMobilitySeries::new(None, frame, &[0, 1], &[1.0, 2.0], &[1.0]),
            Err(SeriesError::LengthMismatch { .. })
        ));
    }
}
