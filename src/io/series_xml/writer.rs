use std::fmt::Display;
use std::io;
use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::series::{IntensitySeries, IonMobilogramTimeSeries, MobilitySeries, MzSeries};
use crate::spectrum::{Frame, ImsRawData, ScanLike};

use super::*;

pub type WriterResult = Result<(), SeriesXmlError>;

fn join_values<T: Display>(values: &[T]) -> String {
    let mut text = String::with_capacity(values.len() * 8);
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        text.push_str(&v.to_string());
    }
    text
}

/// Writes [`IonMobilogramTimeSeries`] as XML fragments that
/// [`IonMobilogramSeriesReader`](super::IonMobilogramSeriesReader) reads back. Frames are
/// referenced by their position in an [`ImsRawData`].
///
/// Floating point values are written with their shortest exact representation, so
/// a written series reads back with identical values.
pub struct IonMobilogramSeriesWriter<W: io::Write> {
    handle: Writer<W>,
    state: SeriesXmlState,
}

impl<W: io::Write> IonMobilogramSeriesWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            handle: Writer::new_with_indent(sink, b' ', 2),
            state: SeriesXmlState::Start,
        }
    }

    fn write_event(&mut self, event: Event) -> WriterResult {
        let state = self.state;
        self.handle
            .write_event(event)
            .map_err(|e| SeriesXmlError::XMLError(state, e))
    }

    fn write_values<T: Display>(&mut self, name: &str, values: &[T]) -> WriterResult {
        if values.is_empty() {
            return self.write_event(Event::Empty(BytesStart::new(name)));
        }
        self.write_event(Event::Start(BytesStart::new(name)))?;
        let text = join_values(values);
        self.write_event(Event::Text(BytesText::new(&text)))?;
        self.write_event(Event::End(BytesEnd::new(name)))
    }

    fn frame_index(raw: &ImsRawData, frame: &Frame) -> Result<usize, SeriesXmlError> {
        raw.index_of(frame)
            .ok_or(SeriesXmlError::UnknownFrame(frame.scan_number()))
    }

    fn write_summed(&mut self, series: &IonMobilogramTimeSeries) -> WriterResult {
        let summed = series.summed_mobilogram();
        let mut elt = BytesStart::new(SUMMED_MOBILOGRAM_ELEMENT);
        let count = summed.num_values().to_string();
        elt.push_attribute((NUM_VALUES_ATTRIBUTE, count.as_str()));
        self.state = SeriesXmlState::SummedMobilogram;
        self.write_event(Event::Start(elt))?;
        self.state = SeriesXmlState::SummedMobilityValues;
        self.write_values(MOBILITY_VALUES_ELEMENT, &*summed.mobility_values())?;
        self.state = SeriesXmlState::SummedIntensityValues;
        self.write_values(INTENSITY_VALUES_ELEMENT, &*summed.intensity_values())?;
        self.state = SeriesXmlState::SummedMobilogram;
        self.write_event(Event::End(BytesEnd::new(SUMMED_MOBILOGRAM_ELEMENT)))
    }

    fn write_mobilograms(&mut self, series: &IonMobilogramTimeSeries, raw: &ImsRawData) -> WriterResult {
        for mobilogram in series.mobilograms().iter() {
            let index = Self::frame_index(raw, mobilogram.frame())?.to_string();
            let mut elt = BytesStart::new(MOBILOGRAM_ELEMENT);
            elt.push_attribute((FRAME_INDEX_ATTRIBUTE, index.as_str()));
            self.state = SeriesXmlState::Mobilogram;
            self.write_event(Event::Start(elt))?;
            self.state = SeriesXmlState::MobilogramScanIndices;
            self.write_values(SCAN_INDICES_ELEMENT, &*mobilogram.scan_indices().view())?;
            self.state = SeriesXmlState::MobilogramMzValues;
            self.write_values(MZ_VALUES_ELEMENT, &*mobilogram.mz_values())?;
            self.state = SeriesXmlState::MobilogramIntensityValues;
            self.write_values(INTENSITY_VALUES_ELEMENT, &*mobilogram.intensity_values())?;
            self.state = SeriesXmlState::Mobilogram;
            self.write_event(Event::End(BytesEnd::new(MOBILOGRAM_ELEMENT)))?;
        }
        Ok(())
    }

    /// Write one series element. Every frame of `series` must be a frame of `raw`.
    pub fn write_series(&mut self, series: &IonMobilogramTimeSeries, raw: &ImsRawData) -> WriterResult {
        let scan_indices = series
            .frames()
            .iter()
            .map(|f| Self::frame_index(raw, f))
            .collect::<Result<Vec<_>, _>>()?;

        self.state = SeriesXmlState::Series;
        self.write_event(Event::Start(BytesStart::new(SERIES_ELEMENT)))?;
        self.state = SeriesXmlState::ScanIndices;
        self.write_values(SCAN_INDICES_ELEMENT, &scan_indices)?;
        self.state = SeriesXmlState::MzValues;
        self.write_values(MZ_VALUES_ELEMENT, &*series.mz_values())?;
        self.state = SeriesXmlState::IntensityValues;
        self.write_values(INTENSITY_VALUES_ELEMENT, &*series.intensity_values())?;
        self.write_summed(series)?;
        self.write_mobilograms(series, raw)?;
        self.state = SeriesXmlState::Series;
        self.write_event(Event::End(BytesEnd::new(SERIES_ELEMENT)))?;
        self.state = SeriesXmlState::SeriesDone;
        log::trace!("Wrote a series of {} frames", scan_indices.len());
        Ok(())
    }

    pub fn flush(&mut self) -> WriterResult {
        self.handle
            .get_mut()
            .flush()
            .map_err(|e| SeriesXmlError::IOError(self.state, e))
    }

    pub fn into_inner(self) -> W {
        self.handle.into_inner()
    }
}
