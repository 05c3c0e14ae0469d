//! Reading and writing ion series.
#[cfg(feature = "xml")]
pub mod series_xml;

#[cfg(feature = "xml")]
pub use crate::io::series_xml::{
    IonMobilogramSeriesReader, IonMobilogramSeriesWriter, SeriesXmlError, SeriesXmlState,
};
