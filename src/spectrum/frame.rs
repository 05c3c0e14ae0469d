use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use super::scan::{DataFile, Scan, ScanLike};

/// The ion mobility separation technology a frame was acquired with
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MobilityType {
    #[default]
    None,
    DriftTube,
    TravelingWave,
    Tims,
    Faims,
    Mixed,
    Other,
}

impl MobilityType {
    /// The unit mobility values of this technology are reported in
    pub const fn unit(&self) -> &'static str {
        match self {
            Self::DriftTube | Self::TravelingWave => "ms",
            Self::Tims => "Vs/cm2",
            Self::Faims => "V",
            Self::None | Self::Mixed | Self::Other => "",
        }
    }

    /// Whether the mobility scans of a frame are ordered by decreasing mobility.
    ///
    /// Trapped ion mobility elutes ions with the highest mobility first.
    pub const fn is_descending(&self) -> bool {
        matches!(self, Self::Tims)
    }

    /// Whether frames of this type carry a mobility axis that can be binned
    pub const fn has_mobility_axis(&self) -> bool {
        matches!(self, Self::DriftTube | Self::TravelingWave | Self::Tims)
    }
}

impl Display for MobilityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::DriftTube => "dtims",
            Self::TravelingWave => "twims",
            Self::Tims => "tims",
            Self::Faims => "faims",
            Self::Mixed => "mixed",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

impl FromStr for MobilityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "dtims" | "drift_tube" | "drifttube" => Ok(Self::DriftTube),
            "twims" | "traveling_wave" | "travelingwave" => Ok(Self::TravelingWave),
            "tims" => Ok(Self::Tims),
            "faims" => Ok(Self::Faims),
            "mixed" => Ok(Self::Mixed),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown mobility type {s:?}")),
        }
    }
}

/// An ion mobility resolved acquisition event, made up of one mobility scan per
/// entry in [`Frame::mobilities`].
#[derive(Debug, Clone)]
pub struct Frame {
    pub scan: Scan,
    pub mobility_type: MobilityType,
    /// The mobility of each mobility scan, in acquisition order
    pub mobilities: Vec<f64>,
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.scan == other.scan
    }
}

impl Frame {
    pub fn new(scan: Scan, mobility_type: MobilityType, mobilities: Vec<f64>) -> Self {
        Self {
            scan,
            mobility_type,
            mobilities,
        }
    }

    pub fn num_mobility_scans(&self) -> usize {
        self.mobilities.len()
    }

    pub fn tic(&self) -> f64 {
        self.scan.tic
    }

    /// Get the mobility scan at the frame-local `index`
    pub fn mobility_scan(&self, index: usize) -> Option<MobilityScan<'_>> {
        (index < self.mobilities.len()).then_some(MobilityScan { frame: self, index })
    }

    pub fn mobility_scans(&self) -> impl Iterator<Item = MobilityScan<'_>> + '_ {
        (0..self.mobilities.len()).map(move |index| MobilityScan { frame: self, index })
    }

    /// The smallest non-zero gap between adjacent mobility values of this frame
    pub fn smallest_mobility_delta(&self) -> Option<f64> {
        self.mobilities
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .filter(|d| *d > 0.0)
            .min_by(|a, b| a.total_cmp(b))
    }
}

impl ScanLike for Frame {
    fn scan_number(&self) -> u32 {
        self.scan.scan_number
    }

    fn retention_time(&self) -> f32 {
        self.scan.retention_time
    }

    fn ms_level(&self) -> u8 {
        self.scan.ms_level
    }

    fn data_file(&self) -> &Arc<DataFile> {
        &self.scan.data_file
    }
}

/// One scan within a [`Frame`] at a specific mobility
#[derive(Debug, Clone, Copy)]
pub struct MobilityScan<'a> {
    frame: &'a Frame,
    index: usize,
}

impl PartialEq for MobilityScan<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.frame == other.frame
    }
}

impl<'a> MobilityScan<'a> {
    pub fn frame(&self) -> &'a Frame {
        self.frame
    }

    /// The index of this scan within its frame
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mobility(&self) -> f64 {
        self.frame.mobilities[self.index]
    }

    /// Whether this scan belongs to `frame`
    pub fn is_in(&self, frame: &Frame) -> bool {
        std::ptr::eq(self.frame, frame) || self.frame == frame
    }
}

impl ScanLike for MobilityScan<'_> {
    fn scan_number(&self) -> u32 {
        self.frame.scan_number()
    }

    fn retention_time(&self) -> f32 {
        self.frame.retention_time()
    }

    fn ms_level(&self) -> u8 {
        self.frame.ms_level()
    }

    fn data_file(&self) -> &Arc<DataFile> {
        self.frame.data_file()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn test_mobility_scans() {
        let file = Arc::new(DataFile::new("run.d"));
        let frame = Frame::new(
            Scan::new(file, 4, 1.5, 1, 1e5),
            MobilityType::Tims,
            vec![1.3, 1.2, 1.1],
        );
        assert_eq!(frame.num_mobility_scans(), 3);
        let scan = frame.mobility_scan(1).unwrap();
        assert_eq!(scan.mobility(), 1.2);
        assert_eq!(scan.scan_number(), 4);
        assert!(scan.is_in(&frame));
        assert!(frame.mobility_scan(3).is_none());
        assert_eq!(frame.mobility_scans().count(), 3);
        assert!((frame.smallest_mobility_delta().unwrap() - 0.1).abs() < 1e-9);
    }

    #[test_log::test]
    fn test_mobility_type() {
        assert!(MobilityType::Tims.is_descending());
        assert!(!MobilityType::DriftTube.is_descending());
        assert_eq!("TIMS".parse::<MobilityType>().unwrap(), MobilityType::Tims);
        assert_eq!(
            MobilityType::TravelingWave.to_string().parse::<MobilityType>().unwrap(),
            MobilityType::TravelingWave
        );
        assert!("ims".parse::<MobilityType>().is_err());
        assert_eq!(MobilityType::Tims.unit(), "Vs/cm2");
    }
}
