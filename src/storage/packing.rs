use super::arena::StorageArena;
use super::buffer::{store_vec, DoubleBuffer};
use super::StorageError;

/// Fill `offsets` with the start position of each series in the concatenation of all
/// series, returning the total number of values and the length of the longest series.
///
/// `offsets[0] == 0` and `offsets[i] == offsets[i - 1] + lengths[i - 1]`.
pub fn generate_offsets<I>(lengths: I, offsets: &mut [i32]) -> Result<(usize, usize), StorageError>
where
    I: IntoIterator<Item = usize>,
{
    let mut total = 0usize;
    let mut max_len = 0usize;
    let mut n = 0usize;
    for (i, len) in lengths.into_iter().enumerate() {
        if i >= offsets.len() {
            return Err(StorageError::LengthMismatch {
                expected: offsets.len(),
                actual: i + 1,
            });
        }
        offsets[i] = i32::try_from(total).map_err(|_| StorageError::OffsetOverflow(total))?;
        total += len;
        max_len = max_len.max(len);
        n = i + 1;
    }
    if n != offsets.len() {
        return Err(StorageError::LengthMismatch {
            expected: offsets.len(),
            actual: n,
        });
    }
    Ok((total, max_len))
}

/// Concatenate many `(m/z, intensity)` array pairs into one m/z buffer and one intensity
/// buffer, writing the start offset of every series into `offsets`.
///
/// `offsets` must already be sized to the number of series. Each column is written in a
/// single pass over all series.
pub fn pack_many<M, I>(
    storage: Option<&StorageArena>,
    series: &[(M, I)],
    offsets: &mut [i32],
) -> Result<(DoubleBuffer, DoubleBuffer), StorageError>
where
    M: AsRef<[f64]>,
    I: AsRef<[f64]>,
{
    for (mzs, intensities) in series.iter() {
        let (mzs, intensities) = (mzs.as_ref(), intensities.as_ref());
        if mzs.len() != intensities.len() {
            return Err(StorageError::LengthMismatch {
                expected: mzs.len(),
                actual: intensities.len(),
            });
        }
    }

    let (total, _) = generate_offsets(series.iter().map(|(mzs, _)| mzs.as_ref().len()), offsets)?;

    let mut mz_values = Vec::with_capacity(total);
    for (mzs, _) in series.iter() {
        mz_values.extend_from_slice(mzs.as_ref());
    }
    let mut intensity_values = Vec::with_capacity(total);
    for (_, intensities) in series.iter() {
        intensity_values.extend_from_slice(intensities.as_ref());
    }

    log::trace!(
        "Packed {} series into {total} values (arena: {})",
        series.len(),
        storage.is_some()
    );
    Ok((store_vec(storage, mz_values), store_vec(storage, intensity_values)))
}
