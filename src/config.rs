//! Process-wide defaults for series storage and mobility binning, overridable through
//! environment variables.
use std::env;
use std::str::FromStr;

use crate::series::MobilogramStorageMode;
use crate::spectrum::MobilityType;
use crate::storage::{StorageArena, DEFAULT_CHUNK_SIZE};

pub const MOBILOGRAM_STORAGE_VAR: &str = "MZSERIES_MOBILOGRAM_STORAGE";
pub const ARENA_CHUNK_SIZE_VAR: &str = "MZSERIES_ARENA_CHUNK_SIZE";
pub const TIMS_BINNING_WIDTH_VAR: &str = "MZSERIES_TIMS_BINNING_WIDTH";
pub const DTIMS_BINNING_WIDTH_VAR: &str = "MZSERIES_DTIMS_BINNING_WIDTH";
pub const TWIMS_BINNING_WIDTH_VAR: &str = "MZSERIES_TWIMS_BINNING_WIDTH";

/// Read and parse an environment variable, falling back to `default` when it is unset or
/// cannot be parsed
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                log::warn!("Ignoring invalid value {value:?} for {name}");
                default
            }
        },
        Err(_) => default,
    }
}

/// The requested mobility binning width per mobility technology, in that technology's
/// mobility unit
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinningWidths {
    pub tims: f64,
    pub drift_tube: f64,
    pub traveling_wave: f64,
}

impl Default for BinningWidths {
    fn default() -> Self {
        Self {
            tims: 0.0008,
            drift_tube: 0.05,
            traveling_wave: 0.05,
        }
    }
}

impl BinningWidths {
    /// The binning width for `mobility_type`, `None` if it has no binnable mobility axis
    pub fn for_mobility_type(&self, mobility_type: MobilityType) -> Option<f64> {
        match mobility_type {
            MobilityType::Tims => Some(self.tims),
            MobilityType::DriftTube => Some(self.drift_tube),
            MobilityType::TravelingWave => Some(self.traveling_wave),
            MobilityType::None | MobilityType::Faims | MobilityType::Mixed | MobilityType::Other => {
                None
            }
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tims: env_or(TIMS_BINNING_WIDTH_VAR, defaults.tims),
            drift_tube: env_or(DTIMS_BINNING_WIDTH_VAR, defaults.drift_tube),
            traveling_wave: env_or(TWIMS_BINNING_WIDTH_VAR, defaults.traveling_wave),
        }
    }
}

/// Settings for building and storing ion series
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesConfig {
    /// Which representation stored mobilograms use
    pub mobilogram_storage: MobilogramStorageMode,
    pub binning: BinningWidths,
    /// The chunk size of arenas created with [`SeriesConfig::create_arena`]
    pub arena_chunk_size: usize,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            mobilogram_storage: MobilogramStorageMode::default(),
            binning: BinningWidths::default(),
            arena_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SeriesConfig {
    /// Read the configuration from `MZSERIES_*` environment variables, using the default
    /// for anything unset or invalid
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mobilogram_storage: env_or(MOBILOGRAM_STORAGE_VAR, defaults.mobilogram_storage),
            binning: BinningWidths::from_env(),
            arena_chunk_size: env_or(ARENA_CHUNK_SIZE_VAR, defaults.arena_chunk_size),
        }
    }

    pub fn create_arena(&self) -> StorageArena {
        StorageArena::with_chunk_size(self.arena_chunk_size)
    }
}
