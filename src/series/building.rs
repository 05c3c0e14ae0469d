use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::spectrum::ScanLike;
use crate::storage::{store_vec, StorageArena};

use super::{SeriesError, SimpleIonTimeSeries};

/// How repeated intensities at the same scan slot are combined
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntensityMode {
    /// Keep the largest intensity, rejecting any that does not exceed it
    #[default]
    Highest,
    Sum,
    Mean,
}

/// How repeated m/z values at the same scan slot are combined
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MzMode {
    /// Take the m/z of the contribution that most recently raised the intensity
    #[default]
    HighestIntensity,
    Mean,
}

impl Display for IntensityMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Highest => "highest",
            Self::Sum => "sum",
            Self::Mean => "mean",
        })
    }
}

impl FromStr for IntensityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "highest" | "max" => Ok(Self::Highest),
            "sum" => Ok(Self::Sum),
            "mean" => Ok(Self::Mean),
            _ => Err(format!("Unknown intensity mode {s:?}")),
        }
    }
}

impl Display for MzMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HighestIntensity => "highest_intensity",
            Self::Mean => "mean",
        })
    }
}

impl FromStr for MzMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "highest_intensity" | "highest" => Ok(Self::HighestIntensity),
            "mean" => Ok(Self::Mean),
            _ => Err(format!("Unknown m/z mode {s:?}")),
        }
    }
}

/// Accumulates one chromatographic trace over a fixed number of scan slots before it is
/// exported as a [`SimpleIonTimeSeries`].
///
/// Slots are allocated up front for every scan the trace may span, not per detection.
/// Every accepted contribution increments the slot's count, which drives both running
/// means.
#[derive(Debug, Clone)]
pub struct BuildingIonSeries {
    mzs: Vec<f64>,
    intensities: Vec<f64>,
    counts: Vec<u32>,
    intensity_mode: IntensityMode,
    mz_mode: MzMode,
}

impl BuildingIonSeries {
    pub fn new(num_slots: usize, intensity_mode: IntensityMode, mz_mode: MzMode) -> Self {
        Self {
            mzs: vec![0.0; num_slots],
            intensities: vec![0.0; num_slots],
            counts: vec![0; num_slots],
            intensity_mode,
            mz_mode,
        }
    }

    pub fn num_slots(&self) -> usize {
        self.intensities.len()
    }

    pub fn intensity_mode(&self) -> IntensityMode {
        self.intensity_mode
    }

    pub fn mz_mode(&self) -> MzMode {
        self.mz_mode
    }

    pub fn mz(&self, slot: usize) -> f64 {
        self.mzs[slot]
    }

    pub fn intensity(&self, slot: usize) -> f64 {
        self.intensities[slot]
    }

    pub fn count(&self, slot: usize) -> u32 {
        self.counts[slot]
    }

    /// Add a contribution to `slot`, returning whether it was incorporated.
    ///
    /// Under [`IntensityMode::Highest`] a contribution that does not exceed the current
    /// intensity is rejected and the m/z slot is left untouched.
    ///
    /// # Panics
    /// If `slot` is out of bounds
    pub fn add_value(&mut self, slot: usize, mz: f64, intensity: f64) -> bool {
        let count = self.counts[slot] as f64;
        match self.intensity_mode {
            IntensityMode::Highest => {
                if intensity <= self.intensities[slot] {
                    return false;
                }
                self.intensities[slot] = intensity;
            }
            IntensityMode::Sum => {
                self.intensities[slot] += intensity;
            }
            IntensityMode::Mean => {
                self.intensities[slot] = (self.intensities[slot] * count + intensity) / (count + 1.0);
            }
        }
        match self.mz_mode {
            MzMode::HighestIntensity => {
                self.mzs[slot] = mz;
            }
            MzMode::Mean => {
                self.mzs[slot] = (self.mzs[slot] * count + mz) / (count + 1.0);
            }
        }
        self.counts[slot] += 1;
        true
    }

    fn check_scans<S>(&self, scans: &[S]) -> Result<(), SeriesError> {
        if scans.len() != self.num_slots() {
            return Err(SeriesError::length_mismatch(
                "scan",
                self.num_slots(),
                scans.len(),
            ));
        }
        Ok(())
    }

    /// Export one value per slot, zeros included
    pub fn to_full_series<S: ScanLike + Clone>(
        &self,
        storage: Option<&StorageArena>,
        scans: &[S],
    ) -> Result<SimpleIonTimeSeries<S>, SeriesError> {
        self.check_scans(scans)?;
        SimpleIonTimeSeries::new(storage, &self.mzs, &self.intensities, scans.to_vec())
    }

    /// The slots the trimmed export emits: every non-zero slot plus a single zero
    /// slot on either side of each run of data, never emitting a slot twice.
    pub fn trimmed_slots(&self) -> Vec<usize> {
        let n = self.intensities.len();
        let mut slots = Vec::new();
        let mut last_emitted: Option<usize> = None;
        for i in 0..n {
            if self.intensities[i] <= 0.0 {
                continue;
            }
            if i > 0 && self.intensities[i - 1] <= 0.0 && last_emitted != Some(i - 1) {
                slots.push(i - 1);
            }
            if last_emitted != Some(i) {
                slots.push(i);
            }
            last_emitted = Some(i);
            if i + 1 < n && self.intensities[i + 1] <= 0.0 {
                slots.push(i + 1);
                last_emitted = Some(i + 1);
            }
        }
        slots
    }

    /// Export the non-zero slots bracketed by single flanking zeros
    pub fn to_trimmed_series<S: ScanLike + Clone>(
        &self,
        storage: Option<&StorageArena>,
        scans: &[S],
    ) -> Result<SimpleIonTimeSeries<S>, SeriesError> {
        self.check_scans(scans)?;
        let slots = self.trimmed_slots();
        let mut mzs = Vec::with_capacity(slots.len());
        let mut intensities = Vec::with_capacity(slots.len());
        let mut spectra = Vec::with_capacity(slots.len());
        for slot in slots {
            mzs.push(self.mzs[slot]);
            intensities.push(self.intensities[slot]);
            spectra.push(scans[slot].clone());
        }
        log::trace!(
            "Trimmed a trace of {} slots to {} values",
            self.num_slots(),
            spectra.len()
        );
        SimpleIonTimeSeries::from_buffers(
            store_vec(storage, mzs),
            store_vec(storage, intensities),
            spectra,
        )
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::series::{IntensitySeries, SpectrumSeries};
    use crate::spectrum::{DataFile, Scan};

    fn scans(n: usize) -> Vec<Scan> {
        let file = Arc::new(DataFile::new("lc.mzML"));
        (0..n)
            .map(|i| Scan::new(file.clone(), i as u32 + 1, i as f32 * 0.05, 1, 1e4))
            .collect()
    }

    #[test_log::test]
    fn test_highest_rejects_lower() {
        let mut series = BuildingIonSeries::new(3, IntensityMode::Highest, MzMode::HighestIntensity);
        assert!(series.add_value(1, 500.0, 100.0));
        for _ in 0..5 {
            assert!(!series.add_value(1, 501.0, 50.0));
            assert!(!series.add_value(1, 502.0, 100.0));
        }
        assert_eq!(series.intensity(1), 100.0);
        assert_eq!(series.mz(1), 500.0);
        assert!(series.add_value(1, 503.0, 150.0));
        assert_eq!(series.mz(1), 503.0);
    }

    #[test_log::test]
    fn test_sum_and_mean() {
        let values = [3.0, 1.5, 7.25, 0.5, 12.0];
        let expected_sum: f64 = values.iter().sum();
        let expected_mean = expected_sum / values.len() as f64;

        for order in [values.to_vec(), values.iter().rev().copied().collect()] {
            let mut sum = BuildingIonSeries::new(1, IntensityMode::Sum, MzMode::Mean);
            let mut mean = BuildingIonSeries::new(1, IntensityMode::Mean, MzMode::Mean);
            for (i, v) in order.iter().enumerate() {
                assert!(sum.add_value(0, 100.0 + i as f64, *v));
                assert!(mean.add_value(0, 100.0 + i as f64, *v));
            }
            assert!((sum.intensity(0) - expected_sum).abs() < 1e-9);
            assert!((mean.intensity(0) - expected_mean).abs() < 1e-9);
            assert!((mean.mz(0) - 102.0).abs() < 1e-9);
            assert_eq!(sum.count(0), 5);
        }
    }

    #[test_log::test]
    fn test_trimmed_bracketing() {
        let intensities = [0.0, 0.0, 5.0, 6.0, 0.0, 0.0, 0.0, 7.0, 0.0, 0.0];
        let mut series = BuildingIonSeries::new(intensities.len(), IntensityMode::Highest, MzMode::HighestIntensity);
        for (i, v) in intensities.iter().enumerate() {
            if *v > 0.0 {
                series.add_value(i, 300.0, *v);
            }
        }
        assert_eq!(series.trimmed_slots(), vec![1, 2, 3, 4, 6, 7, 8]);

        let trimmed = series.to_trimmed_series(None, &scans(intensities.len())).unwrap();
        assert_eq!(
            &*trimmed.intensity_values(),
            &[0.0, 5.0, 6.0, 0.0, 0.0, 7.0, 0.0]
        );
        assert_eq!(trimmed.spectrum(0).unwrap().scan_number, 2);
    }

    #[test_log::test]
    fn test_trimmed_boundaries_and_single_gaps() {
        let intensities = [4.0, 0.0, 5.0, 0.0, 0.0, 6.0];
        let mut series = BuildingIonSeries::new(intensities.len(), IntensityMode::Sum, MzMode::Mean);
        for (i, v) in intensities.iter().enumerate() {
            if *v > 0.0 {
                series.add_value(i, 300.0, *v);
            }
        }
        assert_eq!(series.trimmed_slots(), vec![0, 1, 2, 3, 4, 5]);

        let empty = BuildingIonSeries::new(4, IntensityMode::Sum, MzMode::Mean);
        assert!(empty.trimmed_slots().is_empty());
    }

    #[test_log::test]
    fn test_full_export() {
        let mut series = BuildingIonSeries::new(4, IntensityMode::Highest, MzMode::HighestIntensity);
        series.add_value(2, 250.0, 9.0);
        let full = series.to_full_series(None, &scans(4)).unwrap();
        assert_eq!(&*full.intensity_values(), &[0.0, 0.0, 9.0, 0.0]);
        assert!(series.to_full_series(None, &scans(3)).is_err());
    }
}
