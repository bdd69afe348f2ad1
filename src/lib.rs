//! Build one long Fourier transform (LFT) out of a set of short Fourier
//! transforms (SFTs) that may have gaps between them.
//!
//! Each SFT is inverse-transformed back to the time domain, the short time
//! series are spliced into one zero-initialised buffer spanning all of the
//! data, and that buffer is forward-transformed. See [`lft::sft_vector_to_lft`].

pub mod args;
pub mod config;
pub mod demod;
pub mod error;
pub mod lft;
pub mod loader;
pub mod plot;
pub mod reorder;
pub mod sft;
pub mod sftio;
pub mod utils;
