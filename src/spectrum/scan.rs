use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// The raw acquisition a scan was read from. Two scans come from the same acquisition
/// when their data files compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataFile {
    pub name: String,
}

impl DataFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Display for DataFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Common read-only behavior of acquisition events that ion series are keyed by
pub trait ScanLike {
    /// The file-local scan number, monotonic with retention time
    fn scan_number(&self) -> u32;

    /// The retention time in minutes
    fn retention_time(&self) -> f32;

    fn ms_level(&self) -> u8;

    fn data_file(&self) -> &Arc<DataFile>;

    /// Whether both events were acquired in the same raw file
    fn same_data_file<S: ScanLike + ?Sized>(&self, other: &S) -> bool {
        let (a, b) = (self.data_file(), other.data_file());
        Arc::ptr_eq(a, b) || a == b
    }
}

/// A single acquisition event of an LC-MS run
#[derive(Debug, Clone)]
pub struct Scan {
    pub scan_number: u32,
    pub retention_time: f32,
    pub ms_level: u8,
    /// The total ion current of the scan
    pub tic: f64,
    pub data_file: Arc<DataFile>,
}

impl Scan {
    pub fn new(
        data_file: Arc<DataFile>,
        scan_number: u32,
        retention_time: f32,
        ms_level: u8,
        tic: f64,
    ) -> Self {
        Self {
            scan_number,
            retention_time,
            ms_level,
            tic,
            data_file,
        }
    }
}

impl PartialEq for Scan {
    fn eq(&self, other: &Self) -> bool {
        self.scan_number == other.scan_number && self.same_data_file(other)
    }
}

impl ScanLike for Scan {
    fn scan_number(&self) -> u32 {
        self.scan_number
    }

    fn retention_time(&self) -> f32 {
        self.retention_time
    }

    fn ms_level(&self) -> u8 {
        self.ms_level
    }

    fn data_file(&self) -> &Arc<DataFile> {
        &self.data_file
    }
}

impl<T: ScanLike + ?Sized> ScanLike for Arc<T> {
    fn scan_number(&self) -> u32 {
        (**self).scan_number()
    }

    fn retention_time(&self) -> f32 {
        (**self).retention_time()
    }

    fn ms_level(&self) -> u8 {
        (**self).ms_level()
    }

    fn data_file(&self) -> &Arc<DataFile> {
        (**self).data_file()
    }
}
