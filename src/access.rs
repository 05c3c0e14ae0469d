//! Reusable accessors that walk many series with shared scratch space.
mod binning;

pub use binning::{BinningMobilogramDataAccess, MAX_SAMPLED_FRAMES, SAMPLED_TIC_FRACTION};
