use std::sync::Arc;

use super::frame::{Frame, MobilityType};
use super::scan::{DataFile, ScanLike};

/// An ion mobility acquisition: the ordered frames of one raw data file
#[derive(Debug, Clone)]
pub struct ImsRawData {
    pub data_file: Arc<DataFile>,
    pub mobility_type: MobilityType,
    frames: Vec<Arc<Frame>>,
}

impl ImsRawData {
    /// Build an acquisition, putting `frames` in scan number order
    pub fn new(data_file: Arc<DataFile>, mobility_type: MobilityType, mut frames: Vec<Arc<Frame>>) -> Self {
        frames.sort_by_key(|f| f.scan_number());
        Self {
            data_file,
            mobility_type,
            frames,
        }
    }

    pub fn frames(&self) -> &[Arc<Frame>] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Arc<Frame>> {
        self.frames.get(index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The largest total ion current of any frame, `0.0` when there are no frames
    pub fn max_tic(&self) -> f64 {
        self.frames.iter().map(|f| f.tic()).fold(0.0, f64::max)
    }

    /// Locate `frame` in this acquisition by its scan number
    pub fn index_of(&self, frame: &Frame) -> Option<usize> {
        let i = self
            .frames
            .binary_search_by_key(&frame.scan_number(), |f| f.scan_number())
            .ok()?;
        frame.same_data_file(&self.frames[i]).then_some(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Frame>> {
        self.frames.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::Scan;

    #[test_log::test]
    fn test_index_of() {
        let file = Arc::new(DataFile::new("run.d"));
        let frames: Vec<_> = [7u32, 3, 5]
            .into_iter()
            .map(|n| {
                Arc::new(Frame::new(
                    Scan::new(file.clone(), n, n as f32 * 0.1, 1, n as f64 * 10.0),
                    MobilityType::DriftTube,
                    vec![1.0, 2.0],
                ))
            })
            .collect();
        let raw = ImsRawData::new(file.clone(), MobilityType::DriftTube, frames);
        assert_eq!(raw.frame(0).unwrap().scan_number(), 3);
        assert_eq!(raw.max_tic(), 70.0);

        let probe = Frame::new(Scan::new(file, 5, 0.5, 1, 0.0), MobilityType::DriftTube, vec![]);
        assert_eq!(raw.index_of(&probe), Some(1));

        let other = Frame::new(
            Scan::new(Arc::new(DataFile::new("other.d")), 5, 0.5, 1, 0.0),
            MobilityType::DriftTube,
            vec![],
        );
        assert_eq!(raw.index_of(&other), None);
    }
}
