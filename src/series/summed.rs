use std::borrow::Cow;

use crate::storage::{store_slice, store_vec, BufferView, DoubleBuffer, StorageArena};

use super::{IntensitySeries, MobilitySeries, SeriesError};

/// One mobility-binned intensity profile for a whole ion trace, sorted by strictly
/// ascending mobility.
#[derive(Debug, Clone, Default)]
pub struct SummedIntensityMobilitySeries {
    mobility_values: DoubleBuffer,
    intensity_values: DoubleBuffer,
}

fn check_ascending(mobilities: &[f64]) -> Result<(), SeriesError> {
    for (i, w) in mobilities.windows(2).enumerate() {
        if w[0] >= w[1] {
            return Err(SeriesError::UnsortedMobilities(i + 1));
        }
    }
    Ok(())
}

/// Interpolate the x at which the line through `(x1, y1)` and `(x2, y2)` reaches `y`
fn interpolate_x(x1: f64, y1: f64, x2: f64, y2: f64, y: f64) -> f64 {
    if y2 == y1 {
        return (x1 + x2) / 2.0;
    }
    x1 + (y - y1) * (x2 - x1) / (y2 - y1)
}

impl SummedIntensityMobilitySeries {
    pub fn new(
        storage: Option<&StorageArena>,
        mobility_values: &[f64],
        intensity_values: &[f64],
    ) -> Result<Self, SeriesError> {
        if mobility_values.len() != intensity_values.len() {
            return Err(SeriesError::length_mismatch(
                "intensity",
                mobility_values.len(),
                intensity_values.len(),
            ));
        }
        check_ascending(mobility_values)?;
        Ok(Self {
            mobility_values: store_slice(storage, mobility_values),
            intensity_values: store_slice(storage, intensity_values),
        })
    }

    /// Build a series from freshly computed vectors, moving them into storage
    pub fn from_vecs(
        storage: Option<&StorageArena>,
        mobility_values: Vec<f64>,
        intensity_values: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        if mobility_values.len() != intensity_values.len() {
            return Err(SeriesError::length_mismatch(
                "intensity",
                mobility_values.len(),
                intensity_values.len(),
            ));
        }
        check_ascending(&mobility_values)?;
        Ok(Self {
            mobility_values: store_vec(storage, mobility_values),
            intensity_values: store_vec(storage, intensity_values),
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn mobility_buffer(&self) -> &DoubleBuffer {
        &self.mobility_values
    }

    /// The mobility range spanned at half of the maximum intensity, interpolated
    /// between neighboring points. `None` when there is no positive intensity.
    pub fn mobility_fwhm(&self) -> Option<(f64, f64)> {
        let apex = self.most_intense_index()?;
        let mobilities = self.mobility_values.view();
        let intensities = self.intensity_values.view();
        let n = intensities.len();
        let half = intensities[apex] / 2.0;

        let mut before = 0;
        for i in 0..apex {
            if intensities[i] > half {
                before = i.saturating_sub(1);
                break;
            }
        }
        let mut after = n - 1;
        for i in apex..n {
            if intensities[i] < half {
                after = i;
                break;
            }
        }

        let next = (before + 1).min(n - 1);
        let start = interpolate_x(
            mobilities[before],
            intensities[before],
            mobilities[next],
            intensities[next],
            half,
        );
        let prev = after.saturating_sub(1);
        let end = interpolate_x(
            mobilities[prev],
            intensities[prev],
            mobilities[after],
            intensities[after],
            half,
        );
        Some((start.min(end), start.max(end)))
    }

    /// Scale the intensities by `factor`, or so that the most intense value becomes
    /// 1.0 when no factor is given. An all-zero series is returned unchanged.
    pub fn normalize(&self, storage: Option<&StorageArena>, factor: Option<f64>) -> Self {
        let intensities = self.intensity_values.view();
        let scaled: Vec<f64> = match factor {
            Some(factor) => intensities.iter().map(|v| v * factor).collect(),
            None => {
                let max = intensities.iter().copied().fold(0.0, f64::max);
                if max <= 0.0 {
                    return self.clone();
                }
                intensities.iter().map(|v| v / max).collect()
            }
        };
        Self {
            mobility_values: self.mobility_values.clone(),
            intensity_values: store_vec(storage, scaled),
        }
    }
}

impl IntensitySeries for SummedIntensityMobilitySeries {
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

impl MobilitySeries for SummedIntensityMobilitySeries {
    fn mobility(&self, index: usize) -> f64 {
        self.mobility_values.view()[index]
    }

    fn mobility_values(&self) -> Cow<'_, [f64]> {
        self.mobility_values.view().into()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn test_ascending_required() {
        assert!(SummedIntensityMobilitySeries::new(None, &[0.8, 0.9, 1.0], &[1.0, 2.0, 1.0]).is_ok());
        assert_eq!(
            SummedIntensityMobilitySeries::new(None, &[0.8, 0.8], &[1.0, 2.0]).unwrap_err(),
            SeriesError::UnsortedMobilities(1)
        );
        assert!(SummedIntensityMobilitySeries::new(None, &[0.8], &[1.0, 2.0]).is_err());
    }

    #[test_log::test]
    fn test_fwhm() {
        let series = SummedIntensityMobilitySeries::new(
            None,
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            &[0.0, 50.0, 100.0, 50.0, 0.0],
        )
        .unwrap();
        let (start, end) = series.mobility_fwhm().unwrap();
        assert!((start - 2.0).abs() < 1e-9, "{start}");
        assert!((end - 4.0).abs() < 1e-9, "{end}");

        let flat = SummedIntensityMobilitySeries::new(None, &[1.0, 2.0], &[0.0, 0.0]).unwrap();
        assert!(flat.mobility_fwhm().is_none());
    }

    #[test_log::test]
    fn test_normalize() {
        let arena = StorageArena::new();
        let series =
            SummedIntensityMobilitySeries::new(Some(&arena), &[1.0, 2.0, 3.0], &[2.0, 8.0, 4.0]).unwrap();
        let normed = series.normalize(Some(&arena), None);
        assert_eq!(&*normed.intensity_values(), &[0.25, 1.0, 0.5]);
        let scaled = series.normalize(None, Some(0.5));
        assert_eq!(&*scaled.intensity_values(), &[1.0, 4.0, 2.0]);
        assert_eq!(series.intensity(1), 8.0);
    }
}
