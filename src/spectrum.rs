//! The read-only acquisition model ion series are keyed by.
mod frame;
mod raw_data;
mod scan;

pub use frame::{Frame, MobilityScan, MobilityType};
pub use raw_data::ImsRawData;
pub use scan::{DataFile, Scan, ScanLike};
