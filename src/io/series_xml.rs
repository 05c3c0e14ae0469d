//! Reading and writing [`IonMobilogramTimeSeries`](crate::series::IonMobilogramTimeSeries)
//! as an XML fragment.
//!
//! A series is written as:
//!
//! ```xml
//! <ionmobilogramtimeseries>
//!   <scanindices>0 1 2</scanindices>
//!   <mzvalues>500.0004 500.0014 500.0024</mzvalues>
//!   <intensityvalues>150 300 450</intensityvalues>
//!   <summedmobilogram numvalues="3">
//!     <mobilityvalues>0.61 0.62 0.63</mobilityvalues>
//!     <intensityvalues>0 900 0</intensityvalues>
//!   </summedmobilogram>
//!   <mobilogram frameindex="0">
//!     <scanindices>4 5</scanindices>
//!     <mzvalues>500.0004 500.0005</mzvalues>
//!     <intensityvalues>10 20</intensityvalues>
//!   </mobilogram>
//! </ionmobilogramtimeseries>
//! ```
//!
//! Scan indices of the series and the `frameindex` attribute refer to positions in the
//! full frame list of the owning [`ImsRawData`](crate::spectrum::ImsRawData). Scan indices
//! inside a `mobilogram` are mobility scan indices local to that frame. Numeric lists may
//! be separated by whitespace or commas.
use std::io;

use thiserror::Error;

use crate::series::SeriesError;

mod reader;
mod writer;

pub use reader::IonMobilogramSeriesReader;
pub use writer::IonMobilogramSeriesWriter;

pub const SERIES_ELEMENT: &str = "ionmobilogramtimeseries";
pub const SCAN_INDICES_ELEMENT: &str = "scanindices";
pub const MZ_VALUES_ELEMENT: &str = "mzvalues";
pub const INTENSITY_VALUES_ELEMENT: &str = "intensityvalues";
pub const MOBILITY_VALUES_ELEMENT: &str = "mobilityvalues";
pub const SUMMED_MOBILOGRAM_ELEMENT: &str = "summedmobilogram";
pub const MOBILOGRAM_ELEMENT: &str = "mobilogram";
pub const NUM_VALUES_ATTRIBUTE: &str = "numvalues";
pub const FRAME_INDEX_ATTRIBUTE: &str = "frameindex";

/// The element the series parser (or writer) is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeriesXmlState {
    #[default]
    Start,
    Series,
    ScanIndices,
    MzValues,
    IntensityValues,
    SummedMobilogram,
    SummedMobilityValues,
    SummedIntensityValues,
    Mobilogram,
    MobilogramScanIndices,
    MobilogramMzValues,
    MobilogramIntensityValues,
    SeriesDone,
    ParserError,
}

/// All the ways reading or writing a series XML fragment can go wrong
#[derive(Debug, Error)]
pub enum SeriesXmlError {
    #[error("An XML error {1} was encountered in {0:?}")]
    XMLError(SeriesXmlState, #[source] quick_xml::Error),
    #[error("Malformed numeric value {1:?} in {0:?}")]
    MalformedNumber(SeriesXmlState, String),
    #[error("{element} declares {expected} values but {actual} were read")]
    CountMismatch {
        element: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("The {0} attribute is missing or invalid in {1:?}")]
    MissingAttribute(&'static str, SeriesXmlState),
    #[error("An incomplete element {0} was encountered in {1:?}")]
    IncompleteElement(String, SeriesXmlState),
    #[error("Frame index {0} is not in the data file")]
    FrameIndexOutOfRange(i64),
    #[error("Mobilogram {index} belongs to frame {found} but the series lists frame {expected} there")]
    MobilogramFrameMismatch {
        index: usize,
        expected: u32,
        found: u32,
    },
    #[error("Frame {0} is not part of the data file being written against")]
    UnknownFrame(u32),
    #[error("Failed to build the series: {0}")]
    Series(#[from] SeriesError),
    #[error("An IO error {1} was encountered in {0:?}")]
    IOError(SeriesXmlState, #[source] io::Error),
}

impl From<SeriesXmlError> for io::Error {
    fn from(value: SeriesXmlError) -> Self {
        match value {
            SeriesXmlError::IOError(_, e) => e,
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}
