//! Synthetic acquisitions shared by unit tests
use std::sync::Arc;

use crate::series::IonMobilitySeries;
use crate::spectrum::{DataFile, Frame, ImsRawData, MobilityType, Scan};

/// `n` evenly spaced mobility values starting at `start`, listed in the order a frame of
/// `mobility_type` reports them
pub(crate) fn mobility_axis(mobility_type: MobilityType, start: f64, step: f64, n: usize) -> Vec<f64> {
    let mut values: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
    if mobility_type.is_descending() {
        values.reverse();
    }
    values
}

/// Frames numbered from 1 with retention time increasing by 0.1 minutes. The TIC peaks at
/// the middle frame.
pub(crate) fn make_frames(
    data_file: &Arc<DataFile>,
    mobility_type: MobilityType,
    n: usize,
    mobilities: &[f64],
) -> Vec<Arc<Frame>> {
    let middle = n as f64 / 2.0;
    (0..n)
        .map(|i| {
            let tic = 1e6 / (1.0 + (i as f64 - middle).abs());
            Arc::new(Frame::new(
                Scan::new(data_file.clone(), i as u32 + 1, i as f32 * 0.1, 1, tic),
                mobility_type,
                mobilities.to_vec(),
            ))
        })
        .collect()
}

pub(crate) fn make_raw_data(mobility_type: MobilityType, n_frames: usize, step: f64, n_scans: usize) -> ImsRawData {
    let data_file = Arc::new(DataFile::new(format!("{mobility_type}.d")));
    let axis = mobility_axis(mobility_type, 0.6, step, n_scans);
    let frames = make_frames(&data_file, mobility_type, n_frames, &axis);
    ImsRawData::new(data_file, mobility_type, frames)
}

/// A heap-backed mobilogram with m/z `base_mz` and intensity `scale * (k + 1)` at the
/// k-th listed scan
pub(crate) fn make_mobilogram(frame: &Arc<Frame>, scan_indices: &[i32], base_mz: f64, scale: f64) -> IonMobilitySeries {
    let mzs: Vec<f64> = scan_indices.iter().map(|i| base_mz + *i as f64 * 1e-4).collect();
    let intensities: Vec<f64> = (0..scan_indices.len()).map(|k| scale * (k + 1) as f64).collect();
    IonMobilitySeries::new(None, frame.clone(), scan_indices, &mzs, &intensities)
        .expect("synthetic mobilogram must be valid")
}

/// One mobilogram of `len` consecutive mobility scans per frame
pub(crate) fn make_mobilograms(frames: &[Arc<Frame>], first_scan: i32, len: usize) -> Vec<IonMobilitySeries> {
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            let indices: Vec<i32> = (first_scan..first_scan + len as i32).collect();
            make_mobilogram(frame, &indices, 500.0 + i as f64 * 0.001, 10.0 * (i + 1) as f64)
        })
        .collect()
}
