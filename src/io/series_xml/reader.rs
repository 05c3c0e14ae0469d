use std::io;
use std::str::FromStr;
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::series::{
    IonMobilitySeries, IonMobilogramTimeSeries, MobilogramStorageMode, SummedIntensityMobilitySeries,
};
use crate::spectrum::{Frame, ImsRawData, ScanLike};
use crate::storage::StorageArena;

use super::*;

/// Parse a whitespace or comma delimited list of numbers, appending to `dest`
fn parse_values<T: FromStr>(
    text: &str,
    state: SeriesXmlState,
    dest: &mut Vec<T>,
) -> Result<(), SeriesXmlError> {
    for token in text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        let value = token
            .parse()
            .map_err(|_| SeriesXmlError::MalformedNumber(state, token.to_string()))?;
        dest.push(value);
    }
    Ok(())
}

fn parse_attribute<T: FromStr>(
    event: &BytesStart,
    name: &'static str,
    state: SeriesXmlState,
) -> Result<T, SeriesXmlError> {
    for attr in event.attributes() {
        let attr = attr.map_err(|e| SeriesXmlError::XMLError(state, e.into()))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| SeriesXmlError::XMLError(state, e))?;
            return value
                .trim()
                .parse()
                .map_err(|_| SeriesXmlError::MissingAttribute(name, state));
        }
    }
    Err(SeriesXmlError::MissingAttribute(name, state))
}

fn check_count(element: &'static str, expected: usize, actual: usize) -> Result<(), SeriesXmlError> {
    if expected != actual {
        Err(SeriesXmlError::CountMismatch {
            element,
            expected,
            actual,
        })
    } else {
        Ok(())
    }
}

fn resolve_frame(raw: &ImsRawData, index: i64) -> Result<&Arc<Frame>, SeriesXmlError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| raw.frame(i))
        .ok_or(SeriesXmlError::FrameIndexOutOfRange(index))
}

#[derive(Debug, Default)]
struct MobilogramBuilder {
    frame_index: i64,
    scan_indices: Vec<i32>,
    mz_values: Vec<f64>,
    intensity_values: Vec<f64>,
}

impl MobilogramBuilder {
    fn build(self, raw: &ImsRawData) -> Result<IonMobilitySeries, SeriesXmlError> {
        let frame = resolve_frame(raw, self.frame_index)?;
        check_count(MZ_VALUES_ELEMENT, self.scan_indices.len(), self.mz_values.len())?;
        check_count(
            INTENSITY_VALUES_ELEMENT,
            self.scan_indices.len(),
            self.intensity_values.len(),
        )?;
        let mobilogram = IonMobilitySeries::new(
            None,
            frame.clone(),
            &self.scan_indices,
            &self.mz_values,
            &self.intensity_values,
        )?;
        Ok(mobilogram)
    }
}

#[derive(Debug, Default)]
struct SummedBuilder {
    num_values: usize,
    mobility_values: Vec<f64>,
    intensity_values: Vec<f64>,
}

impl SummedBuilder {
    fn build(
        self,
        storage: Option<&StorageArena>,
    ) -> Result<SummedIntensityMobilitySeries, SeriesXmlError> {
        check_count(
            MOBILITY_VALUES_ELEMENT,
            self.num_values,
            self.mobility_values.len(),
        )?;
        check_count(
            INTENSITY_VALUES_ELEMENT,
            self.num_values,
            self.intensity_values.len(),
        )?;
        Ok(SummedIntensityMobilitySeries::from_vecs(
            storage,
            self.mobility_values,
            self.intensity_values,
        )?)
    }
}

/// The values collected for one series element while it is being parsed
#[derive(Debug, Default)]
struct SeriesBuilder {
    scan_indices: Vec<i64>,
    mz_values: Vec<f64>,
    intensity_values: Vec<f64>,
    summed: Option<SummedBuilder>,
    summed_mobilogram: Option<SummedIntensityMobilitySeries>,
    current: Option<MobilogramBuilder>,
    mobilograms: Vec<IonMobilitySeries>,
}

impl SeriesBuilder {
    fn build(
        self,
        raw: &ImsRawData,
        storage: Option<&StorageArena>,
        mode: MobilogramStorageMode,
    ) -> Result<IonMobilogramTimeSeries, SeriesXmlError> {
        let n = self.scan_indices.len();
        check_count(MZ_VALUES_ELEMENT, n, self.mz_values.len())?;
        check_count(INTENSITY_VALUES_ELEMENT, n, self.intensity_values.len())?;
        check_count(MOBILOGRAM_ELEMENT, n, self.mobilograms.len())?;
        for (i, (index, mobilogram)) in self
            .scan_indices
            .iter()
            .zip(self.mobilograms.iter())
            .enumerate()
        {
            let frame = resolve_frame(raw, *index)?;
            if !Arc::ptr_eq(frame, mobilogram.frame()) {
                return Err(SeriesXmlError::MobilogramFrameMismatch {
                    index: i,
                    expected: frame.scan_number(),
                    found: mobilogram.frame().scan_number(),
                });
            }
        }
        let summed = self.summed_mobilogram.ok_or_else(|| {
            SeriesXmlError::IncompleteElement(
                SUMMED_MOBILOGRAM_ELEMENT.to_string(),
                SeriesXmlState::Series,
            )
        })?;
        let series = IonMobilogramTimeSeries::with_summed(
            storage,
            mode,
            &self.mz_values,
            &self.intensity_values,
            &self.mobilograms,
            summed,
        )?;
        Ok(series)
    }
}

/// Reads [`IonMobilogramTimeSeries`] elements one at a time from an XML stream, resolving
/// frame references against an [`ImsRawData`].
///
/// Elements outside of a series element are skipped, so series may be embedded in a
/// larger document.
pub struct IonMobilogramSeriesReader<R: io::BufRead> {
    handle: Reader<R>,
    buffer: Vec<u8>,
    state: SeriesXmlState,
}

impl<R: io::BufRead> IonMobilogramSeriesReader<R> {
    pub fn new(source: R) -> Self {
        let mut handle = Reader::from_reader(source);
        handle.trim_text(true);
        Self {
            handle,
            buffer: Vec::new(),
            state: SeriesXmlState::Start,
        }
    }

    pub fn state(&self) -> SeriesXmlState {
        self.state
    }

    pub fn into_inner(self) -> R {
        self.handle.into_inner()
    }

    fn handle_start(
        &mut self,
        event: &BytesStart,
        builder: &mut SeriesBuilder,
    ) -> Result<SeriesXmlState, SeriesXmlError> {
        let name = event.name();
        let name = String::from_utf8_lossy(name.as_ref());
        let state = self.state;
        let next = match (state, name.as_ref()) {
            (SeriesXmlState::Start, SERIES_ELEMENT) => {
                *builder = SeriesBuilder::default();
                SeriesXmlState::Series
            }
            (SeriesXmlState::Series, SCAN_INDICES_ELEMENT) => SeriesXmlState::ScanIndices,
            (SeriesXmlState::Series, MZ_VALUES_ELEMENT) => SeriesXmlState::MzValues,
            (SeriesXmlState::Series, INTENSITY_VALUES_ELEMENT) => SeriesXmlState::IntensityValues,
            (SeriesXmlState::Series, SUMMED_MOBILOGRAM_ELEMENT) => {
                let num_values = parse_attribute(event, NUM_VALUES_ATTRIBUTE, state)?;
                builder.summed = Some(SummedBuilder {
                    num_values,
                    ..Default::default()
                });
                SeriesXmlState::SummedMobilogram
            }
            (SeriesXmlState::Series, MOBILOGRAM_ELEMENT) => {
                let frame_index = parse_attribute(event, FRAME_INDEX_ATTRIBUTE, state)?;
                builder.current = Some(MobilogramBuilder {
                    frame_index,
                    ..Default::default()
                });
                SeriesXmlState::Mobilogram
            }
            (SeriesXmlState::SummedMobilogram, MOBILITY_VALUES_ELEMENT) => {
                SeriesXmlState::SummedMobilityValues
            }
            (SeriesXmlState::SummedMobilogram, INTENSITY_VALUES_ELEMENT) => {
                SeriesXmlState::SummedIntensityValues
            }
            (SeriesXmlState::Mobilogram, SCAN_INDICES_ELEMENT) => {
                SeriesXmlState::MobilogramScanIndices
            }
            (SeriesXmlState::Mobilogram, MZ_VALUES_ELEMENT) => SeriesXmlState::MobilogramMzValues,
            (SeriesXmlState::Mobilogram, INTENSITY_VALUES_ELEMENT) => {
                SeriesXmlState::MobilogramIntensityValues
            }
            (state, name) => {
                log::trace!("Skipping element {name} in {state:?}");
                state
            }
        };
        Ok(next)
    }

    fn handle_end(
        &mut self,
        name: &str,
        builder: &mut SeriesBuilder,
        raw: &ImsRawData,
        storage: Option<&StorageArena>,
    ) -> Result<SeriesXmlState, SeriesXmlError> {
        let state = self.state;
        let next = match (state, name) {
            (SeriesXmlState::ScanIndices, SCAN_INDICES_ELEMENT)
            | (SeriesXmlState::MzValues, MZ_VALUES_ELEMENT)
            | (SeriesXmlState::IntensityValues, INTENSITY_VALUES_ELEMENT) => SeriesXmlState::Series,
            (SeriesXmlState::SummedMobilityValues, MOBILITY_VALUES_ELEMENT)
            | (SeriesXmlState::SummedIntensityValues, INTENSITY_VALUES_ELEMENT) => {
                SeriesXmlState::SummedMobilogram
            }
            (SeriesXmlState::MobilogramScanIndices, SCAN_INDICES_ELEMENT)
            | (SeriesXmlState::MobilogramMzValues, MZ_VALUES_ELEMENT)
            | (SeriesXmlState::MobilogramIntensityValues, INTENSITY_VALUES_ELEMENT) => {
                SeriesXmlState::Mobilogram
            }
            (SeriesXmlState::SummedMobilogram, SUMMED_MOBILOGRAM_ELEMENT) => {
                if let Some(summed) = builder.summed.take() {
                    builder.summed_mobilogram = Some(summed.build(storage)?);
                }
                SeriesXmlState::Series
            }
            (SeriesXmlState::Mobilogram, MOBILOGRAM_ELEMENT) => {
                if let Some(current) = builder.current.take() {
                    builder.mobilograms.push(current.build(raw)?);
                }
                SeriesXmlState::Series
            }
            (SeriesXmlState::Series, SERIES_ELEMENT) => SeriesXmlState::SeriesDone,
            (state, _) => state,
        };
        Ok(next)
    }

    fn handle_text(&mut self, text: &str, builder: &mut SeriesBuilder) -> Result<(), SeriesXmlError> {
        let state = self.state;
        match state {
            SeriesXmlState::ScanIndices => parse_values(text, state, &mut builder.scan_indices),
            SeriesXmlState::MzValues => parse_values(text, state, &mut builder.mz_values),
            SeriesXmlState::IntensityValues => {
                parse_values(text, state, &mut builder.intensity_values)
            }
            SeriesXmlState::SummedMobilityValues | SeriesXmlState::SummedIntensityValues => {
                match builder.summed.as_mut() {
                    Some(summed) if state == SeriesXmlState::SummedMobilityValues => {
                        parse_values(text, state, &mut summed.mobility_values)
                    }
                    Some(summed) => parse_values(text, state, &mut summed.intensity_values),
                    None => Ok(()),
                }
            }
            SeriesXmlState::MobilogramScanIndices
            | SeriesXmlState::MobilogramMzValues
            | SeriesXmlState::MobilogramIntensityValues => match builder.current.as_mut() {
                Some(current) => match state {
                    SeriesXmlState::MobilogramScanIndices => {
                        parse_values(text, state, &mut current.scan_indices)
                    }
                    SeriesXmlState::MobilogramMzValues => {
                        parse_values(text, state, &mut current.mz_values)
                    }
                    _ => parse_values(text, state, &mut current.intensity_values),
                },
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Read the next series element, returning `None` when the stream ends before
    /// another one starts.
    ///
    /// Mobilograms are packed with `mode`. Any malformed number, declared count that
    /// does not match the values read, or unresolvable frame index aborts the read.
    pub fn read_next(
        &mut self,
        raw: &ImsRawData,
        storage: Option<&StorageArena>,
        mode: MobilogramStorageMode,
    ) -> Result<Option<IonMobilogramTimeSeries>, SeriesXmlError> {
        let mut builder = SeriesBuilder::default();
        self.state = SeriesXmlState::Start;
        loop {
            let event = self.handle.read_event_into(&mut self.buffer);
            let outcome = match event {
                Ok(Event::Start(ref e)) => {
                    let e = e.clone().into_owned();
                    self.handle_start(&e, &mut builder)
                }
                Ok(Event::Empty(ref e)) => {
                    let e = e.clone().into_owned();
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    match self.handle_start(&e, &mut builder) {
                        Ok(state) if state != self.state => {
                            self.state = state;
                            self.handle_end(&name, &mut builder, raw, storage)
                        }
                        other => other,
                    }
                }
                Ok(Event::End(ref e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    self.handle_end(&name, &mut builder, raw, storage)
                }
                Ok(Event::Text(ref e)) => match e.unescape() {
                    Ok(text) => {
                        let text = text.into_owned();
                        self.handle_text(&text, &mut builder).map(|_| self.state)
                    }
                    Err(err) => Err(SeriesXmlError::XMLError(self.state, err)),
                },
                Ok(Event::Eof) => {
                    self.buffer.clear();
                    return match self.state {
                        SeriesXmlState::Start => Ok(None),
                        state => {
                            self.state = SeriesXmlState::ParserError;
                            Err(SeriesXmlError::IncompleteElement(
                                SERIES_ELEMENT.to_string(),
                                state,
                            ))
                        }
                    };
                }
                Ok(_) => Ok(self.state),
                Err(err) => Err(SeriesXmlError::XMLError(self.state, err)),
            };
            self.buffer.clear();
            match outcome {
                Ok(SeriesXmlState::SeriesDone) => {
                    self.state = SeriesXmlState::SeriesDone;
                    return builder.build(raw, storage, mode).map(Some);
                }
                Ok(state) => self.state = state,
                Err(err) => {
                    self.state = SeriesXmlState::ParserError;
                    return Err(err);
                }
            }
        }
    }

    /// Read every remaining series element
    pub fn read_all(
        &mut self,
        raw: &ImsRawData,
        storage: Option<&StorageArena>,
        mode: MobilogramStorageMode,
    ) -> Result<Vec<IonMobilogramTimeSeries>, SeriesXmlError> {
        let mut series = Vec::new();
        while let Some(s) = self.read_next(raw, storage, mode)? {
            series.push(s);
        }
        Ok(series)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::series::{IntensitySeries, MzSeries};
    use crate::spectrum::MobilityType;
    use crate::test_data::make_raw_data;

    fn read_one(text: &str, raw: &ImsRawData) -> Result<Option<IonMobilogramTimeSeries>, SeriesXmlError> {
        let mut reader = IonMobilogramSeriesReader::new(text.as_bytes());
        reader.read_next(raw, None, MobilogramStorageMode::Speed)
    }

    const SERIES: &str = r#"
<project>
  <ionmobilogramtimeseries>
    <scanindices>0, 2</scanindices>
    <mzvalues>500.1 500.2</mzvalues>
    <intensityvalues>30
      70</intensityvalues>
    <summedmobilogram numvalues="3">
      <mobilityvalues>0.6 0.61 0.62</mobilityvalues>
      <intensityvalues>0 100 0</intensityvalues>
    </summedmobilogram>
    <mobilogram frameindex="0">
      <scanindices>3 4</scanindices>
      <mzvalues>500.1 500.1</mzvalues>
      <intensityvalues>10 20</intensityvalues>
    </mobilogram>
    <mobilogram frameindex="2">
      <scanindices>3</scanindices>
      <mzvalues>500.2</mzvalues>
      <intensityvalues>70</intensityvalues>
    </mobilogram>
  </ionmobilogramtimeseries>
</project>
"#;

    #[test_log::test]
    fn test_read_series() {
        let raw = make_raw_data(MobilityType::DriftTube, 4, 0.01, 10);
        let mut reader = IonMobilogramSeriesReader::new(SERIES.as_bytes());
        let series = reader
            .read_next(&raw, None, MobilogramStorageMode::MemoryEfficiency)
            .unwrap()
            .unwrap();
        assert_eq!(series.num_values(), 2);
        assert_eq!(&*series.mz_values(), &[500.1, 500.2]);
        assert_eq!(&*series.intensity_values(), &[30.0, 70.0]);
        assert_eq!(series.frames()[1].scan_number(), 3);
        assert_eq!(series.summed_mobilogram().num_values(), 3);
        let first = series.mobilogram(0).unwrap();
        assert_eq!(&*first.scan_indices().view(), &[3, 4]);
        assert_eq!(series.trace_datapoints(), 3);

        assert!(reader
            .read_next(&raw, None, MobilogramStorageMode::Speed)
            .unwrap()
            .is_none());
    }

    #[test_log::test]
    fn test_count_mismatch() {
        let raw = make_raw_data(MobilityType::DriftTube, 4, 0.01, 10);
        let text = SERIES.replace(r#"numvalues="3""#, r#"numvalues="4""#);
        let err = read_one(&text, &raw).unwrap_err();
        assert!(matches!(
            err,
            SeriesXmlError::CountMismatch {
                element: MOBILITY_VALUES_ELEMENT,
                expected: 4,
                actual: 3
            }
        ));

        let text = SERIES.replace("<mzvalues>500.1 500.2</mzvalues>", "<mzvalues>500.1</mzvalues>");
        let err = read_one(&text, &raw).unwrap_err();
        assert!(matches!(
            err,
            SeriesXmlError::CountMismatch {
                element: MZ_VALUES_ELEMENT,
                ..
            }
        ));
    }

    #[test_log::test]
    fn test_malformed_number() {
        let raw = make_raw_data(MobilityType::DriftTube, 4, 0.01, 10);
        let text = SERIES.replace("0 100 0", "0 1x0 0");
        match read_one(&text, &raw).unwrap_err() {
            SeriesXmlError::MalformedNumber(state, token) => {
                assert_eq!(state, SeriesXmlState::SummedIntensityValues);
                assert_eq!(token, "1x0");
            }
            err => panic!("unexpected error {err}"),
        }
    }

    #[test_log::test]
    fn test_bad_frame_references() {
        let raw = make_raw_data(MobilityType::DriftTube, 4, 0.01, 10);
        let text = SERIES.replace(r#"frameindex="2""#, r#"frameindex="9""#);
        assert!(matches!(
            read_one(&text, &raw).unwrap_err(),
            SeriesXmlError::FrameIndexOutOfRange(9)
        ));

        let text = SERIES.replace(r#"frameindex="2""#, r#"frameindex="1""#);
        assert!(matches!(
            read_one(&text, &raw).unwrap_err(),
            SeriesXmlError::MobilogramFrameMismatch {
                index: 1,
                expected: 3,
                found: 2
            }
        ));

        let text = SERIES.replace(r#" frameindex="2""#, "");
        assert!(matches!(
            read_one(&text, &raw).unwrap_err(),
            SeriesXmlError::MissingAttribute(FRAME_INDEX_ATTRIBUTE, SeriesXmlState::Series)
        ));
    }

    #[test_log::test]
    fn test_incomplete_and_empty() {
        let raw = make_raw_data(MobilityType::DriftTube, 4, 0.01, 10);
        let truncated = &SERIES[..SERIES.find("<mobilogram ").unwrap()];
        assert!(matches!(
            read_one(truncated, &raw).unwrap_err(),
            SeriesXmlError::IncompleteElement(_, SeriesXmlState::Series)
        ));

        let empty = r#"<ionmobilogramtimeseries>
            <scanindices/><mzvalues/><intensityvalues/>
            <summedmobilogram numvalues="0"/>
        </ionmobilogramtimeseries>"#;
        let series = read_one(empty, &raw).unwrap().unwrap();
        assert!(series.is_empty());
        assert_eq!(series.summed_mobilogram().num_values(), 0);

        assert!(read_one("<project/>", &raw).unwrap().is_none());
    }
}
