//! Per-detector alignment of SFTs before assembly.
//!
//! SFTs on disk hold their bins in centered order, lowest frequency first.
//! The assembly wants native transform order, so each SFT is split into its
//! negative and DC + positive halves and the halves are swapped. This is only
//! a reindexing: no per-bin phase is applied, so it does not move the data
//! into another reference frame.

use log::debug;

use crate::error::LftError;
use crate::reorder::centered_to_native;
use crate::sft::{Sft, SftVector};

/// Copy of `sft` with its bins in native order.
pub fn align_sft(sft: &Sft) -> Result<Sft, LftError> {
    let mut data = sft.data.clone();
    centered_to_native(&mut data).map_err(|_| {
        LftError::InvalidArgument(format!(
            "SFT '{}' at {} has no frequency bins",
            sft.name, sft.epoch
        ))
    })?;
    Ok(sft.with_data(data))
}

/// Align every SFT of one detector. The input is left untouched.
pub fn align_sft_vector(sfts: &SftVector) -> Result<SftVector, LftError> {
    if sfts.is_empty() {
        return Err(LftError::InvalidArgument("empty SFT input".into()));
    }
    let aligned = sfts
        .iter()
        .map(align_sft)
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        "Reindexed {} SFTs of {} to native bin order",
        aligned.len(),
        sfts.sfts[0].detector()
    );
    Ok(SftVector::new(aligned))
}
