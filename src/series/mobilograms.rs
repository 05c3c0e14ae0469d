use std::borrow::{Borrow, Cow};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::spectrum::Frame;
use crate::storage::{
    pack_many, store_vec, BufferView, DoubleBuffer, IntBuffer, StorageArena,
};

use super::mobility_series::StorageOrigin;
use super::{IntensitySeries, IonMobilitySeries, MzSeries, SeriesError};

static NEXT_STORAGE_ID: AtomicU64 = AtomicU64::new(1);

fn next_storage_id() -> u64 {
    NEXT_STORAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// The number of `i32` fields in one compact mobilogram record:
/// number of values, storage offset and the start of its scan indices.
const RECORD_STRIDE: usize = 3;

/// Selects the representation of stored mobilograms
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MobilogramStorageMode {
    /// Keep one mobilogram object per frame for constant time access
    #[default]
    Speed,
    /// Keep flat records and rebuild mobilograms on access
    MemoryEfficiency,
}

impl Display for MobilogramStorageMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Speed => "speed",
            Self::MemoryEfficiency => "memory",
        })
    }
}

impl FromStr for MobilogramStorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "speed" => Ok(Self::Speed),
            "memory" | "memory_efficiency" | "memory-efficiency" => Ok(Self::MemoryEfficiency),
            _ => Err(format!("Unknown mobilogram storage mode {s:?}")),
        }
    }
}

/// The mobilograms of one ion trace, one per frame, with their values packed into a
/// shared m/z buffer and a shared intensity buffer.
///
/// Both representations hand out mobilograms that remember where in the shared buffers
/// they came from, which lets [`StoredMobilograms::store`] reuse a contiguous run of them
/// without copying any values.
#[derive(Debug, Clone)]
pub enum StoredMobilograms {
    /// Holds the mobilogram views directly
    Direct {
        id: u64,
        mobilograms: Vec<IonMobilitySeries>,
        mz_values: DoubleBuffer,
        intensity_values: DoubleBuffer,
    },
    /// Holds one fixed-stride record per frame and a flat array of mobility scan indices,
    /// rebuilding mobilogram views on access
    Compact {
        id: u64,
        frames: Arc<[Arc<Frame>]>,
        records: IntBuffer,
        scan_indices: IntBuffer,
        mz_values: DoubleBuffer,
        intensity_values: DoubleBuffer,
    },
}

impl Default for StoredMobilograms {
    fn default() -> Self {
        Self::Direct {
            id: 0,
            mobilograms: Vec::new(),
            mz_values: DoubleBuffer::empty(),
            intensity_values: DoubleBuffer::empty(),
        }
    }
}

/// Find the run of the shared parent buffers that `mobilograms` occupy, if they were all
/// read from the same stored collection. A gap between neighbors is an error.
fn contiguous_run<M: Borrow<IonMobilitySeries>>(
    mobilograms: &[M],
) -> Result<Option<(usize, usize)>, SeriesError> {
    let Some(first) = mobilograms.first().and_then(|m| m.borrow().origin()) else {
        return Ok(None);
    };
    let same_origin = mobilograms.iter().all(|m| {
        m.borrow()
            .origin()
            .is_some_and(|o| o.storage_id == first.storage_id)
    });
    if !same_origin {
        return Ok(None);
    }

    let start = first.offset;
    let mut end = start;
    for (i, m) in mobilograms.iter().enumerate() {
        let m = m.borrow();
        let offset = m.storage_offset().unwrap_or_default();
        if offset != end {
            return Err(SeriesError::NonContiguousStorage {
                index: i,
                expected_offset: end,
                actual_offset: offset,
            });
        }
        end = offset + m.num_values();
    }
    Ok(Some((start, end)))
}

fn as_i32(value: usize) -> Result<i32, SeriesError> {
    i32::try_from(value)
        .map_err(|_| crate::storage::StorageError::OffsetOverflow(value).into())
}

impl StoredMobilograms {
    /// Store `mobilograms`, reusing the shared buffers they already live in when they form
    /// one contiguous run of a single stored collection, and packing them afresh otherwise.
    ///
    /// Mobilograms from the same collection that leave a gap are rejected with
    /// [`SeriesError::NonContiguousStorage`].
    pub fn store<M: Borrow<IonMobilitySeries>>(
        storage: Option<&StorageArena>,
        mode: MobilogramStorageMode,
        mobilograms: &[M],
    ) -> Result<Self, SeriesError> {
        match contiguous_run(mobilograms)? {
            Some((start, end)) => {
                let Some(origin) = mobilograms[0].borrow().origin() else {
                    return Self::store_fresh(storage, mode, mobilograms);
                };
                log::trace!(
                    "Reusing {} contiguous stored values of {} mobilograms",
                    end - start,
                    mobilograms.len()
                );
                let mz_values = origin.mz_parent.slice(start, end)?;
                let intensity_values = origin.intensity_parent.slice(start, end)?;
                let offsets: Vec<usize> = mobilograms
                    .iter()
                    .map(|m| m.borrow().storage_offset().unwrap_or(start) - start)
                    .collect();
                Self::assemble(storage, mode, mobilograms, mz_values, intensity_values, &offsets)
            }
            None => Self::store_fresh(storage, mode, mobilograms),
        }
    }

    /// Store `mobilograms` by packing copies of all of their values
    pub fn store_fresh<M: Borrow<IonMobilitySeries>>(
        storage: Option<&StorageArena>,
        mode: MobilogramStorageMode,
        mobilograms: &[M],
    ) -> Result<Self, SeriesError> {
        let mut offsets = vec![0i32; mobilograms.len()];
        let (mz_values, intensity_values) = {
            let views: Vec<(BufferView<'_, f64>, BufferView<'_, f64>)> = mobilograms
                .iter()
                .map(|m| (m.borrow().mz_values(), m.borrow().intensity_values()))
                .collect();
            pack_many(storage, &views, &mut offsets)?
        };
        let offsets: Vec<usize> = offsets.into_iter().map(|o| o as usize).collect();
        Self::assemble(storage, mode, mobilograms, mz_values, intensity_values, &offsets)
    }

    fn assemble<M: Borrow<IonMobilitySeries>>(
        storage: Option<&StorageArena>,
        mode: MobilogramStorageMode,
        mobilograms: &[M],
        mz_values: DoubleBuffer,
        intensity_values: DoubleBuffer,
        offsets: &[usize],
    ) -> Result<Self, SeriesError> {
        let id = next_storage_id();
        match mode {
            MobilogramStorageMode::Speed => {
                let mut views = Vec::with_capacity(mobilograms.len());
                for (m, offset) in mobilograms.iter().zip(offsets.iter().copied()) {
                    let m = m.borrow();
                    let end = offset + m.num_values();
                    views.push(IonMobilitySeries::from_stored(
                        m.frame().clone(),
                        m.scan_indices().clone(),
                        mz_values.slice(offset, end)?,
                        intensity_values.slice(offset, end)?,
                        Some(StorageOrigin {
                            storage_id: id,
                            offset,
                            mz_parent: mz_values.clone(),
                            intensity_parent: intensity_values.clone(),
                        }),
                    ));
                }
                Ok(Self::Direct {
                    id,
                    mobilograms: views,
                    mz_values,
                    intensity_values,
                })
            }
            MobilogramStorageMode::MemoryEfficiency => {
                let mut records = Vec::with_capacity(mobilograms.len() * RECORD_STRIDE);
                let mut scan_indices = Vec::with_capacity(mz_values.len());
                for (m, offset) in mobilograms.iter().zip(offsets.iter().copied()) {
                    let m = m.borrow();
                    records.push(as_i32(m.num_values())?);
                    records.push(as_i32(offset)?);
                    records.push(as_i32(scan_indices.len())?);
                    scan_indices.extend_from_slice(&m.scan_indices().view());
                }
                let frames: Arc<[Arc<Frame>]> =
                    mobilograms.iter().map(|m| m.borrow().frame().clone()).collect();
                Ok(Self::Compact {
                    id,
                    frames,
                    records: store_vec(storage, records),
                    scan_indices: store_vec(storage, scan_indices),
                    mz_values,
                    intensity_values,
                })
            }
        }
    }

    pub fn mode(&self) -> MobilogramStorageMode {
        match self {
            Self::Direct { .. } => MobilogramStorageMode::Speed,
            Self::Compact { .. } => MobilogramStorageMode::MemoryEfficiency,
        }
    }

    /// The identity shared by every mobilogram view read from this collection
    pub fn storage_id(&self) -> u64 {
        match self {
            Self::Direct { id, .. } | Self::Compact { id, .. } => *id,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Direct { mobilograms, .. } => mobilograms.len(),
            Self::Compact { records, .. } => records.len() / RECORD_STRIDE,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The shared buffer holding the m/z values of every mobilogram
    pub fn mz_buffer(&self) -> &DoubleBuffer {
        match self {
            Self::Direct { mz_values, .. } | Self::Compact { mz_values, .. } => mz_values,
        }
    }

    /// The shared buffer holding the intensity values of every mobilogram
    pub fn intensity_buffer(&self) -> &DoubleBuffer {
        match self {
            Self::Direct {
                intensity_values, ..
            }
            | Self::Compact {
                intensity_values, ..
            } => intensity_values,
        }
    }

    /// Get the mobilogram of the `index`-th frame
    pub fn get(&self, index: usize) -> Option<Cow<'_, IonMobilitySeries>> {
        match self {
            Self::Direct { mobilograms, .. } => mobilograms.get(index).map(Cow::Borrowed),
            Self::Compact {
                id,
                frames,
                records,
                scan_indices,
                mz_values,
                intensity_values,
            } => {
                let frame = frames.get(index)?;
                let (num_values, offset, scan_start) = {
                    let records = records.view();
                    let record = records.get(index * RECORD_STRIDE..(index + 1) * RECORD_STRIDE)?;
                    (record[0] as usize, record[1] as usize, record[2] as usize)
                };
                let end = offset + num_values;
                let view = IonMobilitySeries::from_stored(
                    frame.clone(),
                    scan_indices.slice(scan_start, scan_start + num_values).ok()?,
                    mz_values.slice(offset, end).ok()?,
                    intensity_values.slice(offset, end).ok()?,
                    Some(StorageOrigin {
                        storage_id: *id,
                        offset,
                        mz_parent: mz_values.clone(),
                        intensity_parent: intensity_values.clone(),
                    }),
                );
                Some(Cow::Owned(view))
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Cow<'_, IonMobilitySeries>> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Every stored mobilogram, in frame order
    pub fn all(&self) -> Vec<Cow<'_, IonMobilitySeries>> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::series::{MobilitySeries, SpectrumSeries};
    use crate::spectrum::{DataFile, MobilityType};
    use crate::test_data::*;

    fn sample(n_frames: usize) -> Vec<IonMobilitySeries> {
        let file = Arc::new(DataFile::new("run.d"));
        let axis = mobility_axis(MobilityType::DriftTube, 10.0, 0.5, 20);
        let frames = make_frames(&file, MobilityType::DriftTube, n_frames, &axis);
        make_mobilograms(&frames, 3, 5)
    }

    #[test_log::test]
    fn test_storage_mode_parse() {
        assert_eq!(
            "memory".parse::<MobilogramStorageMode>().unwrap(),
            MobilogramStorageMode::MemoryEfficiency
        );
        assert_eq!(
            MobilogramStorageMode::Speed.to_string().parse::<MobilogramStorageMode>().unwrap(),
            MobilogramStorageMode::Speed
        );
        assert!("fast".parse::<MobilogramStorageMode>().is_err());
    }

    #[test_log::test]
    fn test_compact_matches_direct() {
        let arena = StorageArena::new();
        let mobilograms = sample(3);
        let direct =
            StoredMobilograms::store(Some(&arena), MobilogramStorageMode::Speed, &mobilograms).unwrap();
        let compact = StoredMobilograms::store(
            Some(&arena),
            MobilogramStorageMode::MemoryEfficiency,
            &mobilograms,
        )
        .unwrap();

        assert_eq!(compact.len(), 3);
        assert_eq!(compact.mode(), MobilogramStorageMode::MemoryEfficiency);
        assert!(direct.mz_buffer().content_equals(compact.mz_buffer()));
        assert!(direct
            .intensity_buffer()
            .content_equals(compact.intensity_buffer()));

        let a = direct.get(1).unwrap();
        let b = compact.get(1).unwrap();
        assert_eq!(a.storage_offset(), Some(5));
        assert_eq!(b.storage_offset(), Some(5));
        assert_eq!(
            &*b.intensity_values(),
            &*compact.intensity_buffer().slice(5, 10).unwrap().view()
        );
        assert!(a.mz_buffer().unwrap().content_equals(&b.mz_buffer().unwrap()));
        assert!(a
            .intensity_buffer()
            .unwrap()
            .content_equals(&b.intensity_buffer().unwrap()));
        assert!(a.scan_indices().content_equals(b.scan_indices()));
        assert_eq!(a.mobility_values(), b.mobility_values());
        assert_eq!(b.spectrum(0).unwrap().index(), 3);
        assert!(compact.get(3).is_none());
    }

    #[test_log::test]
    fn test_contiguous_reuse() {
        let arena = StorageArena::new();
        let mobilograms = sample(4);
        for mode in [MobilogramStorageMode::Speed, MobilogramStorageMode::MemoryEfficiency] {
            let stored = StoredMobilograms::store(Some(&arena), mode, &mobilograms).unwrap();
            let before = arena.bytes_stored();

            let subset: Vec<_> = (1..3).filter_map(|i| stored.get(i)).collect();
            let reused = StoredMobilograms::store(Some(&arena), mode, &subset).unwrap();
            let fresh = StoredMobilograms::store_fresh(None, mode, &mobilograms[1..3]).unwrap();

            assert!(reused.mz_buffer().shares_storage_with(stored.mz_buffer()));
            assert!(reused.mz_buffer().content_equals(fresh.mz_buffer()));
            assert!(reused
                .intensity_buffer()
                .content_equals(fresh.intensity_buffer()));
            assert_eq!(reused.get(1).unwrap().storage_offset(), Some(5));
            if mode == MobilogramStorageMode::Speed {
                assert_eq!(arena.bytes_stored(), before);
            }
        }
    }

    #[test_log::test]
    fn test_gap_is_an_error() {
        let mobilograms = sample(3);
        let stored =
            StoredMobilograms::store(None, MobilogramStorageMode::MemoryEfficiency, &mobilograms)
                .unwrap();
        let gapped = vec![stored.get(0).unwrap(), stored.get(2).unwrap()];
        let err = StoredMobilograms::store(None, MobilogramStorageMode::Speed, &gapped).unwrap_err();
        assert_eq!(
            err,
            SeriesError::NonContiguousStorage {
                index: 1,
                expected_offset: 5,
                actual_offset: 10
            }
        );

        let fresh =
            StoredMobilograms::store_fresh(None, MobilogramStorageMode::Speed, &gapped).unwrap();
        assert_eq!(fresh.mz_buffer().len(), 10);
    }

    #[test_log::test]
    fn test_mixed_collections_pack_fresh() {
        let mobilograms = sample(2);
        let a = StoredMobilograms::store(None, MobilogramStorageMode::Speed, &mobilograms[..1]).unwrap();
        let b = StoredMobilograms::store(None, MobilogramStorageMode::Speed, &mobilograms[1..]).unwrap();
        let mixed = vec![a.get(0).unwrap(), b.get(0).unwrap()];
        let stored = StoredMobilograms::store(None, MobilogramStorageMode::Speed, &mixed).unwrap();
        assert_eq!(stored.len(), 2);
        assert_ne!(stored.storage_id(), a.storage_id());
        assert_eq!(stored.get(1).unwrap().storage_offset(), Some(5));
    }

    #[test_log::test]
    fn test_empty() {
        let none: Vec<IonMobilitySeries> = Vec::new();
        for mode in [MobilogramStorageMode::Speed, MobilogramStorageMode::MemoryEfficiency] {
            let stored = StoredMobilograms::store(None, mode, &none).unwrap();
            assert!(stored.is_empty());
            assert!(stored.get(0).is_none());
            assert!(stored.mz_buffer().is_empty());
        }
    }
}
