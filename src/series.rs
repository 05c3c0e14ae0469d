//! Ion series: LC traces, mobilograms, summed mobilograms and the composite ion
//! mobilogram time series, plus the collections that store them compactly.
mod building;
mod errors;
mod ion_mobilogram;
mod mobility_series;
mod mobilograms;
mod summed;
mod time_series;
mod traits;

pub use building::{BuildingIonSeries, IntensityMode, MzMode};
pub use errors::SeriesError;
pub use ion_mobilogram::IonMobilogramTimeSeries;
pub use mobility_series::IonMobilitySeries;
pub use mobilograms::{MobilogramStorageMode, StoredMobilograms};
pub use summed::SummedIntensityMobilitySeries;
pub use time_series::SimpleIonTimeSeries;
pub use traits::{IntensitySeries, MobilitySeries, MzSeries, SpectrumSeries};
