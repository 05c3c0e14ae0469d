use std::borrow::{Borrow, Cow};
use std::sync::Arc;

use crate::config::SeriesConfig;
use crate::series::{
    IntensitySeries, IonMobilitySeries, MobilitySeries, SeriesError, SummedIntensityMobilitySeries,
};
use crate::spectrum::{DataFile, Frame, ImsRawData, MobilityType};
use crate::storage::{BufferView, DoubleBuffer, StorageArena};

/// The most frames sampled to discover the mobility grid
pub const MAX_SAMPLED_FRAMES: usize = 10;

/// Frames with at least this fraction of the largest TIC are eligible for sampling
pub const SAMPLED_TIC_FRACTION: f64 = 0.8;

/// Subtracted from the measured resolution so a bin edge never lands exactly on a data point
const RESOLUTION_EPSILON: f64 = 1e-9;

/// Rebins mobilograms of one acquisition onto a single fixed mobility grid.
///
/// The grid is discovered once from the most intense frames of the acquisition: the bin
/// width is the requested width, widened to the native mobility resolution when the data is
/// coarser than requested. Every `set_*` call accumulates into a scratch intensity array
/// that is reused between calls, so one instance should be used sequentially by a single
/// caller. [`BinningMobilogramDataAccess::to_summed_mobilogram`] snapshots the result.
///
/// Values outside of the grid are not placed in any bin.
#[derive(Debug, Clone)]
pub struct BinningMobilogramDataAccess {
    data_file: Arc<DataFile>,
    mobility_type: MobilityType,
    requested_width: f64,
    bin_width: f64,
    mobilities: Vec<f64>,
    lower_edges: Vec<f64>,
    upper_edges: Vec<f64>,
    intensities: Vec<f64>,
}

/// Select up to [`MAX_SAMPLED_FRAMES`] of the most intense frames with mobility scans
fn sample_frames(raw: &ImsRawData) -> Vec<&Arc<Frame>> {
    let threshold = raw.max_tic() * SAMPLED_TIC_FRACTION;
    let mut sampled: Vec<_> = raw
        .iter()
        .filter(|f| f.tic() >= threshold && f.num_mobility_scans() > 0)
        .collect();
    sampled.sort_by(|a, b| b.tic().total_cmp(&a.tic()));
    sampled.truncate(MAX_SAMPLED_FRAMES);
    sampled
}

impl BinningMobilogramDataAccess {
    pub fn new(raw: &ImsRawData, binning_width: f64) -> Result<Self, SeriesError> {
        if !binning_width.is_finite() || binning_width <= 0.0 {
            return Err(SeriesError::InvalidBinWidth(binning_width));
        }
        let sampled = sample_frames(raw);
        if sampled.is_empty() {
            return Err(SeriesError::EmptyDataFile);
        }

        let resolution = sampled
            .iter()
            .filter_map(|f| f.smallest_mobility_delta())
            .min_by(|a, b| a.total_cmp(b));
        let bin_width = match resolution {
            Some(delta) => binning_width.max(delta - RESOLUTION_EPSILON),
            None => binning_width,
        };
        let resolution = resolution.unwrap_or(bin_width);

        let mut values: Vec<f64> = sampled
            .iter()
            .flat_map(|f| f.mobilities.iter().copied())
            .filter(|v| v.is_finite())
            .collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let mut candidates: Vec<f64> = Vec::with_capacity(values.len());
        for v in values {
            match candidates.last() {
                Some(last) if v - last <= resolution / 2.0 => {}
                _ => candidates.push(v),
            }
        }

        let mut mobilities = Vec::new();
        let mut lower_edges = Vec::new();
        let mut upper_edges: Vec<f64> = Vec::new();
        for candidate in candidates {
            let previous_upper = upper_edges.last().copied();
            if previous_upper.is_some_and(|upper| candidate < upper) {
                continue;
            }
            let lower = match previous_upper {
                Some(upper) => (candidate - resolution / 2.0).max(upper),
                None => candidate - resolution / 2.0,
            };
            mobilities.push(candidate + bin_width / 2.0);
            lower_edges.push(lower);
            upper_edges.push(candidate + bin_width);
        }

        log::debug!(
            "Built {} mobility bins of width {bin_width} {} (requested {binning_width}) from {} frames of {}",
            mobilities.len(),
            raw.mobility_type.unit(),
            sampled.len(),
            raw.data_file,
        );

        let intensities = vec![0.0; mobilities.len()];
        Ok(Self {
            data_file: raw.data_file.clone(),
            mobility_type: raw.mobility_type,
            requested_width: binning_width,
            bin_width,
            mobilities,
            lower_edges,
            upper_edges,
            intensities,
        })
    }

    /// Use the binning width configured for the acquisition's mobility type
    pub fn from_config(raw: &ImsRawData, config: &SeriesConfig) -> Result<Self, SeriesError> {
        let width = config
            .binning
            .for_mobility_type(raw.mobility_type)
            .ok_or(SeriesError::Unsupported(
                "mobility binning of an acquisition without a mobility axis",
            ))?;
        Self::new(raw, width)
    }

    pub fn data_file(&self) -> &Arc<DataFile> {
        &self.data_file
    }

    pub fn mobility_type(&self) -> MobilityType {
        self.mobility_type
    }

    /// The effective bin width, never finer than the native mobility resolution
    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn requested_width(&self) -> f64 {
        self.requested_width
    }

    /// The bin centers, strictly ascending
    pub fn mobilities(&self) -> &[f64] {
        &self.mobilities
    }

    /// The current content of the scratch intensity array, one value per bin
    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn clear_intensities(&mut self) {
        self.intensities.fill(0.0);
    }

    /// Walk the raw values and the bins in lock step, returning the number of raw values
    /// that were not placed in any bin
    fn merge(&mut self, mobilities: &[f64], intensities: &[f64], descending: bool) -> usize {
        let n = mobilities.len().min(intensities.len());
        let at = |k: usize| if descending { n - 1 - k } else { k };
        let mut k = 0;
        let mut placed = 0;
        for bin in 0..self.mobilities.len() {
            if k >= n {
                break;
            }
            while k < n && mobilities[at(k)] < self.lower_edges[bin] {
                k += 1;
            }
            while k < n && mobilities[at(k)] < self.upper_edges[bin] {
                self.intensities[bin] += intensities[at(k)];
                placed += 1;
                k += 1;
            }
        }
        let dropped = n - placed;
        if dropped > 0 {
            log::trace!("{dropped} of {n} mobility values fell outside of the bins");
        }
        dropped
    }

    /// Add one raw mobilogram onto the bins without clearing them first. The order of the
    /// values is ascending when `mobilities[0] <= mobilities[1]` and descending otherwise.
    pub fn set_mobilogram_values(&mut self, mobilities: &[f64], intensities: &[f64]) {
        let descending = mobilities.len() > 1 && mobilities[0] > mobilities[1];
        self.merge(mobilities, intensities, descending);
    }

    /// Clear the bins and sum all `mobilograms` into them. The value order is taken from
    /// the mobility type of the first mobilogram's frame.
    pub fn set_mobilograms<M: Borrow<IonMobilitySeries>>(&mut self, mobilograms: &[M]) {
        self.clear_intensities();
        let descending = mobilograms
            .first()
            .is_some_and(|m| m.borrow().frame().mobility_type.is_descending());
        let mut dropped = 0;
        for m in mobilograms {
            let m = m.borrow();
            let mobilities = m.mobility_values();
            let intensities = m.intensity_values();
            dropped += self.merge(&mobilities, &intensities, descending);
        }
        if dropped > 0 {
            log::trace!(
                "{dropped} values of {} mobilograms were not binned",
                mobilograms.len()
            );
        }
    }

    /// Clear the bins and rebin an already summed, ascending mobilogram into them
    pub fn set_summed_mobilogram(&mut self, summed: &SummedIntensityMobilitySeries) {
        self.clear_intensities();
        let mobilities = summed.mobility_values();
        let intensities = summed.intensity_values();
        self.merge(&mobilities, &intensities, false);
    }

    /// Copy the current bins into a new summed mobilogram, keeping the non-zero region
    /// plus one zero bin on either side. All-zero bins produce an empty mobilogram.
    pub fn to_summed_mobilogram(
        &self,
        storage: Option<&StorageArena>,
    ) -> Result<SummedIntensityMobilitySeries, SeriesError> {
        let first = self.intensities.iter().position(|v| *v > 0.0);
        let last = self.intensities.iter().rposition(|v| *v > 0.0);
        let (Some(first), Some(last)) = (first, last) else {
            return Ok(SummedIntensityMobilitySeries::empty());
        };
        let start = first.saturating_sub(1);
        let end = (last + 2).min(self.intensities.len());
        SummedIntensityMobilitySeries::from_vecs(
            storage,
            self.mobilities[start..end].to_vec(),
            self.intensities[start..end].to_vec(),
        )
    }
}

impl IntensitySeries for BinningMobilogramDataAccess {
    fn num_values(&self) -> usize {
        self.intensities.len()
    }

    fn intensity_values(&self) -> BufferView<'_, f64> {
        BufferView::Borrowed(&self.intensities)
    }

    fn intensity_buffer(&self) -> Result<DoubleBuffer, SeriesError> {
        Err(SeriesError::Unsupported(
            "the binning scratch array is not a stored buffer",
        ))
    }
}

impl MobilitySeries for BinningMobilogramDataAccess {
    fn mobility(&self, index: usize) -> f64 {
        self.mobilities[index]
    }

    fn mobility_values(&self) -> Cow<'_, [f64]> {
        Cow::Borrowed(&self.mobilities)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_data::*;

    #[test_log::test]
    fn test_width_limited_by_resolution() {
        let raw = make_raw_data(MobilityType::DriftTube, 5, 0.02, 30);
        let access = BinningMobilogramDataAccess::new(&raw, 0.01).unwrap();
        assert!((access.bin_width() - 0.02).abs() < 1e-6, "{}", access.bin_width());
        assert_eq!(access.requested_width(), 0.01);
        assert_eq!(access.mobilities().len(), 30);

        let coarse = BinningMobilogramDataAccess::new(&raw, 0.05).unwrap();
        assert_eq!(coarse.bin_width(), 0.05);
        assert_eq!(coarse.mobilities().len(), 10);
    }

    #[test_log::test]
    fn test_bins_ascending() {
        for mobility_type in [MobilityType::Tims, MobilityType::DriftTube, MobilityType::TravelingWave] {
            let raw = make_raw_data(mobility_type, 12, 0.003, 50);
            let access = BinningMobilogramDataAccess::new(&raw, 0.007).unwrap();
            assert!(access.mobilities().windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test_log::test]
    fn test_invalid_width() {
        let raw = make_raw_data(MobilityType::Tims, 3, 0.01, 10);
        assert_eq!(
            BinningMobilogramDataAccess::new(&raw, 0.0).unwrap_err(),
            SeriesError::InvalidBinWidth(0.0)
        );
        let empty = ImsRawData::new(raw.data_file.clone(), MobilityType::Tims, Vec::new());
        assert_eq!(
            BinningMobilogramDataAccess::new(&empty, 0.01).unwrap_err(),
            SeriesError::EmptyDataFile
        );
    }

    #[test_log::test]
    fn test_order_invariance() {
        let raw = make_raw_data(MobilityType::DriftTube, 4, 0.01, 40);
        let mut access = BinningMobilogramDataAccess::new(&raw, 0.025).unwrap();

        let mobilities: Vec<f64> = (5..25).map(|i| 0.6 + 0.01 * i as f64).collect();
        let intensities: Vec<f64> = (0..20).map(|i| (i * 7 % 11) as f64 + 1.0).collect();
        access.set_mobilogram_values(&mobilities, &intensities);
        let ascending = access.intensities().to_vec();

        access.clear_intensities();
        let rev_mobilities: Vec<f64> = mobilities.iter().rev().copied().collect();
        let rev_intensities: Vec<f64> = intensities.iter().rev().copied().collect();
        access.set_mobilogram_values(&rev_mobilities, &rev_intensities);
        let descending = access.intensities().to_vec();

        for (a, b) in ascending.iter().zip(descending.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        let total: f64 = intensities.iter().sum();
        assert!((ascending.iter().sum::<f64>() - total).abs() < 1e-9);
    }

    #[test_log::test]
    fn test_set_mobilograms_tims() {
        let raw = make_raw_data(MobilityType::Tims, 6, 0.01, 20);
        let mut access = BinningMobilogramDataAccess::new(&raw, 0.005).unwrap();
        assert_eq!(access.mobilities().len(), 20);
        let mobilograms = make_mobilograms(raw.frames(), 2, 6);
        access.set_mobilograms(&mobilograms);

        let total: f64 = mobilograms
            .iter()
            .map(|m| m.intensity_values().iter().sum::<f64>())
            .sum();
        assert!((access.intensities().iter().sum::<f64>() - total).abs() < 1e-6);

        // Running it twice gives the same sum, the bins are cleared first
        access.set_mobilograms(&mobilograms);
        assert!((access.intensities().iter().sum::<f64>() - total).abs() < 1e-6);

        let summed = access.to_summed_mobilogram(None).unwrap();
        assert_eq!(summed.num_values(), 8);
        assert_eq!(summed.intensity(0), 0.0);
        assert_eq!(summed.intensity(7), 0.0);
        assert!(summed.mobility_values().windows(2).all(|w| w[0] < w[1]));

        access.set_summed_mobilogram(&summed);
        assert!((access.intensities().iter().sum::<f64>() - total).abs() < 1e-6);
    }

    #[test_log::test]
    fn test_empty_and_unsupported() {
        let raw = make_raw_data(MobilityType::TravelingWave, 3, 0.05, 10);
        let mut access = BinningMobilogramDataAccess::new(&raw, 0.05).unwrap();
        let none: Vec<IonMobilitySeries> = Vec::new();
        access.set_mobilograms(&none);
        assert!(access.to_summed_mobilogram(None).unwrap().is_empty());
        assert!(matches!(
            access.intensity_buffer(),
            Err(SeriesError::Unsupported(_))
        ));
        assert_eq!(access.num_values(), access.mobilities().len());
    }

    #[test_log::test]
    fn test_values_outside_grid_are_dropped() {
        let raw = make_raw_data(MobilityType::DriftTube, 3, 0.1, 5);
        let mut access = BinningMobilogramDataAccess::new(&raw, 0.1).unwrap();
        access.set_mobilogram_values(&[0.1, 0.7, 5.0], &[1.0, 2.0, 4.0]);
        assert_eq!(access.intensities().iter().sum::<f64>(), 2.0);
    }
}
