//! Storage and mobility binning for LC and ion mobility resolved ion series.
//!
//! Series values live in [`storage::ValueBuffer`]s which are either copied into a shared
//! append-only [`StorageArena`] or alias caller owned arrays. Per-frame mobilograms of an
//! [`IonMobilogramTimeSeries`] are packed into one contiguous pair of buffers, and
//! [`BinningMobilogramDataAccess`] resamples them onto a common mobility grid.
pub mod access;
pub mod config;
pub mod io;
pub mod series;
pub mod spectrum;
pub mod storage;

#[cfg(test)]
mod test_data;

pub use crate::access::BinningMobilogramDataAccess;
pub use crate::config::SeriesConfig;
pub use crate::series::{
    BuildingIonSeries, IntensitySeries, IonMobilitySeries, IonMobilogramTimeSeries,
    MobilitySeries, MobilogramStorageMode, MzSeries, SeriesError, SimpleIonTimeSeries,
    SpectrumSeries, StoredMobilograms, SummedIntensityMobilitySeries,
};
pub use crate::spectrum::{DataFile, Frame, ImsRawData, MobilityScan, MobilityType, Scan, ScanLike};
pub use crate::storage::{StorageArena, StorageError};

#[cfg(feature = "xml")]
pub use crate::io::{IonMobilogramSeriesReader, IonMobilogramSeriesWriter};
