use std::borrow::{Borrow, Cow};
use std::sync::Arc;

use crate::access::BinningMobilogramDataAccess;
use crate::spectrum::{Frame, MobilityScan, ScanLike};
use crate::storage::{store_slice, store_vec, BufferView, DoubleBuffer, StorageArena};

use super::{
    IntensitySeries, IonMobilitySeries, MobilogramStorageMode, MzSeries, SeriesError,
    SpectrumSeries, StoredMobilograms, SummedIntensityMobilitySeries,
};

/// An LC-resolved ion trace of an ion mobility acquisition.
///
/// Index for index, it holds one representative (m/z, intensity) pair per frame, the
/// frame itself and that frame's mobilogram, plus one summed mobilogram for the whole
/// trace. All frames are in ascending scan order and come from the same raw data file.
///
/// Instances are never mutated; every derivation builds a new series.
#[derive(Debug, Clone)]
pub struct IonMobilogramTimeSeries {
    mz_values: DoubleBuffer,
    intensity_values: DoubleBuffer,
    frames: Arc<[Arc<Frame>]>,
    mobilograms: Arc<StoredMobilograms>,
    summed_mobilogram: SummedIntensityMobilitySeries,
}

/// Collect the frames of `mobilograms`, checking that they share one data file and are
/// in ascending scan order
fn frames_of<M: Borrow<IonMobilitySeries>>(
    mobilograms: &[M],
) -> Result<Arc<[Arc<Frame>]>, SeriesError> {
    let frames: Vec<Arc<Frame>> = mobilograms
        .iter()
        .map(|m| m.borrow().frame().clone())
        .collect();
    if let Some(first) = frames.first() {
        for (i, frame) in frames.iter().enumerate().skip(1) {
            if !frame.same_data_file(first) {
                return Err(SeriesError::MixedDataFiles {
                    index: i,
                    expected: first.data_file().to_string(),
                    found: frame.data_file().to_string(),
                });
            }
            if frame.scan_number() <= frames[i - 1].scan_number() {
                return Err(SeriesError::UnsortedSpectra(i));
            }
        }
    }
    Ok(frames.into())
}

fn check_lengths(expected: usize, mz_len: usize, intensity_len: usize) -> Result<(), SeriesError> {
    if mz_len != expected {
        return Err(SeriesError::length_mismatch("m/z", expected, mz_len));
    }
    if intensity_len != expected {
        return Err(SeriesError::length_mismatch("intensity", expected, intensity_len));
    }
    Ok(())
}

impl IonMobilogramTimeSeries {
    /// Build a series, computing its summed mobilogram with `binning`
    pub fn new<M: Borrow<IonMobilitySeries>>(
        storage: Option<&StorageArena>,
        mode: MobilogramStorageMode,
        mz_values: &[f64],
        intensity_values: &[f64],
        mobilograms: &[M],
        binning: &mut BinningMobilogramDataAccess,
    ) -> Result<Self, SeriesError> {
        check_lengths(mobilograms.len(), mz_values.len(), intensity_values.len())?;
        binning.set_mobilograms(mobilograms);
        let summed = binning.to_summed_mobilogram(storage)?;
        Self::with_summed(storage, mode, mz_values, intensity_values, mobilograms, summed)
    }

    /// Build a series with a summed mobilogram that was computed beforehand
    pub fn with_summed<M: Borrow<IonMobilitySeries>>(
        storage: Option<&StorageArena>,
        mode: MobilogramStorageMode,
        mz_values: &[f64],
        intensity_values: &[f64],
        mobilograms: &[M],
        summed_mobilogram: SummedIntensityMobilitySeries,
    ) -> Result<Self, SeriesError> {
        check_lengths(mobilograms.len(), mz_values.len(), intensity_values.len())?;
        let frames = frames_of(mobilograms)?;
        let stored = StoredMobilograms::store(storage, mode, mobilograms)?;
        Ok(Self {
            mz_values: store_slice(storage, mz_values),
            intensity_values: store_slice(storage, intensity_values),
            frames,
            mobilograms: Arc::new(stored),
            summed_mobilogram,
        })
    }

    /// Build a series whose per-frame values are derived from `mobilograms`: the summed
    /// intensity and the intensity weighted m/z of each mobilogram.
    pub fn from_mobilograms<M: Borrow<IonMobilitySeries>>(
        storage: Option<&StorageArena>,
        mode: MobilogramStorageMode,
        mobilograms: &[M],
        binning: &mut BinningMobilogramDataAccess,
    ) -> Result<Self, SeriesError> {
        let mut mz_values = Vec::with_capacity(mobilograms.len());
        let mut intensity_values = Vec::with_capacity(mobilograms.len());
        for m in mobilograms {
            let m = m.borrow();
            let mzs = m.mz_values();
            let intensities = m.intensity_values();
            let total: f64 = intensities.iter().sum();
            let mz = if total > 0.0 {
                mzs.iter().zip(intensities.iter()).map(|(mz, i)| mz * i).sum::<f64>() / total
            } else if !mzs.is_empty() {
                mzs.iter().sum::<f64>() / mzs.len() as f64
            } else {
                0.0
            };
            mz_values.push(mz);
            intensity_values.push(total);
        }
        Self::new(storage, mode, &mz_values, &intensity_values, mobilograms, binning)
    }

    pub fn frames(&self) -> &[Arc<Frame>] {
        &self.frames
    }

    pub fn mobilograms(&self) -> &StoredMobilograms {
        &self.mobilograms
    }

    /// The mobilogram of the `index`-th frame
    pub fn mobilogram(&self, index: usize) -> Option<Cow<'_, IonMobilitySeries>> {
        self.mobilograms.get(index)
    }

    pub fn summed_mobilogram(&self) -> &SummedIntensityMobilitySeries {
        &self.summed_mobilogram
    }

    /// The mobilogram recorded in `frame`, if this series covers it
    pub fn mobilogram_for_frame(&self, frame: &Frame) -> Option<Cow<'_, IonMobilitySeries>> {
        let i = self
            .frames
            .binary_search_by_key(&frame.scan_number(), |f| f.scan_number())
            .ok()?;
        if !self.frames[i].same_data_file(frame) {
            return None;
        }
        self.mobilograms.get(i)
    }

    /// The total number of values across all mobilograms
    pub fn trace_datapoints(&self) -> usize {
        self.mobilograms.iter().map(|m| m.num_values()).sum()
    }

    /// The most intense mobility scan of the most intense frame
    pub fn best_mobility_scan(&self) -> Option<MobilityScan<'_>> {
        let frame_index = self.most_intense_index()?;
        let scan_index = {
            let mobilogram = self.mobilograms.get(frame_index)?;
            let best = mobilogram.most_intense_index()?;
            mobilogram.scan_index(best)
        };
        self.frames[frame_index].mobility_scan(scan_index)
    }

    fn derive<M: Borrow<IonMobilitySeries>>(
        &self,
        storage: Option<&StorageArena>,
        mz_values: DoubleBuffer,
        intensity_values: DoubleBuffer,
        mobilograms: &[M],
        reuse_storage: bool,
        binning: &mut BinningMobilogramDataAccess,
    ) -> Result<Self, SeriesError> {
        let mode = self.mobilograms.mode();
        let stored = if reuse_storage {
            StoredMobilograms::store(storage, mode, mobilograms)?
        } else {
            StoredMobilograms::store_fresh(storage, mode, mobilograms)?
        };
        binning.set_mobilograms(mobilograms);
        let summed_mobilogram = binning.to_summed_mobilogram(storage)?;
        Ok(Self {
            mz_values,
            intensity_values,
            frames: frames_of(mobilograms)?,
            mobilograms: Arc::new(stored),
            summed_mobilogram,
        })
    }

    /// Select the frames `start..end`, re-binning their mobilograms into a new summed
    /// mobilogram. The stored mobilogram values are shared, not copied.
    pub fn sub_series(
        &self,
        storage: Option<&StorageArena>,
        start: usize,
        end: usize,
        binning: &mut BinningMobilogramDataAccess,
    ) -> Result<Self, SeriesError> {
        if start > end || end > self.frames.len() {
            return Err(SeriesError::IndexOutOfRange {
                start,
                end,
                len: self.frames.len(),
            });
        }
        let mobilograms: Vec<_> = (start..end).filter_map(|i| self.mobilograms.get(i)).collect();
        self.derive(
            storage,
            self.mz_values.slice(start, end)?,
            self.intensity_values.slice(start, end)?,
            &mobilograms,
            true,
            binning,
        )
    }

    /// Select the frames in `subset`, which must be sorted by scan number and all be
    /// part of this series, re-binning their mobilograms into a new summed mobilogram.
    pub fn sub_series_by_frames<S: ScanLike>(
        &self,
        storage: Option<&StorageArena>,
        subset: &[S],
        binning: &mut BinningMobilogramDataAccess,
    ) -> Result<Self, SeriesError> {
        let indices = self.locate_frames(subset)?;
        let contiguous = indices.windows(2).all(|w| w[1] == w[0] + 1);

        let (mz_values, intensity_values) = {
            let mzs = self.mz_values.view();
            let intensities = self.intensity_values.view();
            let mz_values: Vec<f64> = indices.iter().map(|i| mzs[*i]).collect();
            let intensity_values: Vec<f64> = indices.iter().map(|i| intensities[*i]).collect();
            (mz_values, intensity_values)
        };
        let mobilograms: Vec<_> = indices
            .iter()
            .filter_map(|i| self.mobilograms.get(*i))
            .collect();
        self.derive(
            storage,
            store_vec(storage, mz_values),
            store_vec(storage, intensity_values),
            &mobilograms,
            contiguous,
            binning,
        )
    }

    /// Find the index of each subset frame, walking this series' frames once
    fn locate_frames<S: ScanLike>(&self, subset: &[S]) -> Result<Vec<usize>, SeriesError> {
        let mut indices = Vec::with_capacity(subset.len());
        let mut cursor = 0;
        for (k, frame) in subset.iter().enumerate() {
            let target = frame.scan_number();
            while cursor < self.frames.len() && self.frames[cursor].scan_number() < target {
                cursor += 1;
            }
            if cursor < self.frames.len()
                && self.frames[cursor].scan_number() == target
                && self.frames[cursor].same_data_file(frame)
            {
                indices.push(cursor);
                cursor += 1;
                continue;
            }

            if k > 0 && subset[k - 1].scan_number() >= target {
                return Err(SeriesError::SubsetNotSorted(k));
            }
            if self
                .frames
                .windows(2)
                .any(|w| w[0].scan_number() >= w[1].scan_number())
            {
                return Err(SeriesError::OriginalNotSorted);
            }
            return Err(SeriesError::FrameNotInOriginal {
                scan_number: target,
            });
        }
        Ok(indices)
    }

    /// A new series sharing this one's frames, mobilograms and summed mobilogram with
    /// new per-frame values
    pub fn copy_and_replace(
        &self,
        storage: Option<&StorageArena>,
        mz_values: &[f64],
        intensity_values: &[f64],
    ) -> Result<Self, SeriesError> {
        self.copy_and_replace_all(
            storage,
            mz_values,
            intensity_values,
            self.summed_mobilogram.clone(),
        )
    }

    /// A new series sharing this one's values, frames and mobilograms with a new summed
    /// mobilogram
    pub fn copy_and_replace_summed(&self, summed_mobilogram: SummedIntensityMobilitySeries) -> Self {
        Self {
            mz_values: self.mz_values.clone(),
            intensity_values: self.intensity_values.clone(),
            frames: self.frames.clone(),
            mobilograms: self.mobilograms.clone(),
            summed_mobilogram,
        }
    }

    /// A new series sharing this one's frames and mobilograms with new per-frame values and
    /// a new summed mobilogram
    pub fn copy_and_replace_all(
        &self,
        storage: Option<&StorageArena>,
        mz_values: &[f64],
        intensity_values: &[f64],
        summed_mobilogram: SummedIntensityMobilitySeries,
    ) -> Result<Self, SeriesError> {
        check_lengths(self.frames.len(), mz_values.len(), intensity_values.len())?;
        Ok(Self {
            mz_values: store_slice(storage, mz_values),
            intensity_values: store_slice(storage, intensity_values),
            frames: self.frames.clone(),
            mobilograms: self.mobilograms.clone(),
            summed_mobilogram,
        })
    }
}

impl IntensitySeries for IonMobilogramTimeSeries {
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

impl MzSeries for IonMobilogramTimeSeries {
    fn mz_values(&self) -> BufferView<'_, f64> {
        self.mz_values.view()
    }

    fn mz_buffer(&self) -> Result<DoubleBuffer, SeriesError> {
        Ok(self.mz_values.clone())
    }
}

impl SpectrumSeries for IonMobilogramTimeSeries {
    type Spectrum<'a>
        = &'a Arc<Frame>
    where
        Self: 'a;

    fn spectrum(&self, index: usize) -> Option<Self::Spectrum<'_>> {
        self.frames.get(index)
    }

    fn spectra(&self) -> impl Iterator<Item = Self::Spectrum<'_>> + '_ {
        self.frames.iter()
    }
}
