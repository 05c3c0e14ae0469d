use std::io;

use thiserror::Error;

use crate::storage::StorageError;

/// The precondition violations and unsupported operations that building or deriving
/// ion series may produce.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SeriesError {
    #[error("The {name} array has {actual} values but {expected} were expected")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Spectra are not in ascending order at index {0}")]
    UnsortedSpectra(usize),
    #[error("Mobility values are not in ascending order at index {0}")]
    UnsortedMobilities(usize),
    #[error("Mobility scan {index} does not belong to frame {scan_number}")]
    MixedFrames { index: usize, scan_number: u32 },
    #[error("Mobilogram {index} originates from {found}, not {expected}")]
    MixedDataFiles {
        index: usize,
        expected: String,
        found: String,
    },
    #[error(
        "Mobilogram {index} is not contiguous with its predecessor in storage: expected offset {expected_offset}, found {actual_offset}"
    )]
    NonContiguousStorage {
        index: usize,
        expected_offset: usize,
        actual_offset: usize,
    },
    #[error("The frame subset is not sorted by scan number at subset index {0}")]
    SubsetNotSorted(usize),
    #[error("The frames of the original series are not sorted by scan number")]
    OriginalNotSorted,
    #[error("Frame {scan_number} is in the subset but not in the original series")]
    FrameNotInOriginal { scan_number: u32 },
    #[error("Mobility scan index {index} is out of range for a frame with {num_scans} mobility scans")]
    MobilityScanOutOfRange { index: i32, num_scans: usize },
    #[error("Index range {start}..{end} is out of range for a series of {len} values")]
    IndexOutOfRange { start: usize, end: usize, len: usize },
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
    #[error("Invalid binning width {0}")]
    InvalidBinWidth(f64),
    #[error("The acquisition contains no frames with mobility values")]
    EmptyDataFile,
    #[error("A storage error occurred: {0}")]
    Storage(#[from] StorageError),
}

impl SeriesError {
    pub(crate) fn length_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            name,
            expected,
            actual,
        }
    }
}

impl From<SeriesError> for io::Error {
    fn from(value: SeriesError) -> Self {
        match value {
            SeriesError::Unsupported(_) => io::Error::new(io::ErrorKind::Unsupported, value),
            _ => io::Error::new(io::ErrorKind::InvalidInput, value),
        }
    }
}
