//! Turn a set of SFTs into one long Fourier transform (LFT) over the total
//! observation time.
//!
//! Each SFT is inverse-transformed back into a short time series, the short
//! series are spliced into one zero-initialised long time series at the
//! sample nearest their epoch, and the long series is forward-transformed and
//! put into centered frequency order. Gaps between SFTs stay zero. Nothing
//! smooths the joins between SFTs; the resulting discontinuities are part of
//! the method.

use std::fmt;

use log::{debug, trace};
use num_complex::Complex;
use rayon::prelude::*;

use crate::error::LftError;
use crate::reorder::native_to_centered;
use crate::sft::{Lft, Sft, SftSpan, SftVector};
use crate::utils::{try_zeroed_buffer, FftHelper};

/// Suffix appended to the first SFT's name to label the output.
pub const LFT_NAME_SUFFIX: &str = ":long Fourier transform";

/// Knobs for one assembly. Passed by value to [`sft_vector_to_lft`]; there
/// is no global state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssemblyConfig {
    /// Worker threads for the per-SFT inverse transforms. 0 or 1 runs them
    /// on the calling thread.
    pub threads: usize,

    /// Refuse to allocate a long time series with more samples than this.
    pub max_time_samples: Option<usize>,

    /// Log each SFT's position in the long time series at trace level.
    pub verbose_segments: bool,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            max_time_samples: None,
            verbose_segments: false,
        }
    }
}

/// Where an [`LftAssembly`] is. Each stage is entered at most once, in this
/// order; any failure moves to `Failed` and stays there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblyStage {
    Initialized,
    SegmentsInverseTransformed,
    Assembled,
    Synthesized,
    Done,
    Failed,
}

impl fmt::Display for AssemblyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssemblyStage::Initialized => "initialized",
            AssemblyStage::SegmentsInverseTransformed => "SFTs inverse-transformed",
            AssemblyStage::Assembled => "long time series assembled",
            AssemblyStage::Synthesized => "long transform synthesized",
            AssemblyStage::Done => "done",
            AssemblyStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Inverse-transform one SFT (native bin order) into a time series of the
/// same length, scaled by `1/numBins`.
pub fn inverse_transform_sft(
    sft: &Sft,
    helper: &mut FftHelper,
) -> Result<Vec<Complex<f64>>, LftError> {
    if sft.data.is_empty() {
        return Err(LftError::InvalidArgument(format!(
            "SFT '{}' at {} has no frequency bins",
            sft.name, sft.epoch
        )));
    }
    let mut short_ts = sft.data.clone();
    helper.process(&mut short_ts)?;
    Ok(short_ts)
}

/// Copy `short_ts` into `long_ts` starting at `bin0`, overwriting what was
/// there.
pub fn splice_into(
    long_ts: &mut [Complex<f64>],
    bin0: usize,
    short_ts: &[Complex<f64>],
) -> Result<(), LftError> {
    let end = match bin0.checked_add(short_ts.len()) {
        Some(end) if end <= long_ts.len() => end,
        _ => {
            return Err(LftError::InvalidArgument(format!(
                "{} samples starting at {bin0} lie outside the long time series of {} samples",
                short_ts.len(),
                long_ts.len()
            )))
        }
    };
    long_ts[bin0..end].copy_from_slice(short_ts);
    Ok(())
}

/// One SFT → LFT assembly, driven through its stages one call at a time.
/// Most callers want [`sft_vector_to_lft`], which runs all of them.
pub struct LftAssembly<'a> {
    sfts: &'a SftVector,
    config: AssemblyConfig,
    span: SftSpan,
    stage: AssemblyStage,
    short_series: Vec<Vec<Complex<f64>>>,
    long_ts: Vec<Complex<f64>>,
    spectrum: Vec<Complex<f64>>,
}

impl<'a> LftAssembly<'a> {
    /// Validate the SFTs and derive the time grid. Nothing is allocated if
    /// the input is invalid.
    pub fn new(sfts: &'a SftVector, config: AssemblyConfig) -> Result<Self, LftError> {
        let span = sfts.span()?;
        if span.num_time_samples == 0 {
            return Err(LftError::InvalidArgument(
                "SFTs span less than one time sample".into(),
            ));
        }
        if let Some(limit) = config.max_time_samples {
            if span.num_time_samples > limit {
                return Err(LftError::ResourceExhaustion(format!(
                    "long time series needs {} samples, more than the limit of {limit}",
                    span.num_time_samples
                )));
            }
        }
        debug!(
            "LFT grid: {} SFTs of {} bins, Tsft = {} s, deltaT = {:e} s, Tspan = {} s ({} samples, {} s of data)",
            span.num_sfts,
            span.num_bins,
            span.tsft,
            span.delta_t,
            span.tspan,
            span.num_time_samples,
            span.tdata()
        );
        Ok(Self {
            sfts,
            config,
            span,
            stage: AssemblyStage::Initialized,
            short_series: Vec::new(),
            long_ts: Vec::new(),
            spectrum: Vec::new(),
        })
    }

    pub fn stage(&self) -> AssemblyStage {
        self.stage
    }

    pub fn span(&self) -> &SftSpan {
        &self.span
    }

    /// The long time series, once assembled.
    pub fn long_time_series(&self) -> Option<&[Complex<f64>]> {
        match self.stage {
            AssemblyStage::Assembled => Some(&self.long_ts),
            _ => None,
        }
    }

    fn expect_stage(&self, expected: AssemblyStage) -> Result<(), LftError> {
        if self.stage != expected {
            return Err(LftError::InvalidArgument(format!(
                "assembly is {}, expected it to be {expected}",
                self.stage
            )));
        }
        Ok(())
    }

    fn advance<T>(
        &mut self,
        next: AssemblyStage,
        result: Result<T, LftError>,
    ) -> Result<T, LftError> {
        match result {
            Ok(value) => {
                debug!("LFT assembly: {next}");
                self.stage = next;
                Ok(value)
            }
            Err(e) => {
                debug!("LFT assembly failed while {}: {e}", self.stage);
                self.stage = AssemblyStage::Failed;
                self.short_series = Vec::new();
                self.long_ts = Vec::new();
                self.spectrum = Vec::new();
                Err(e)
            }
        }
    }

    /// Inverse-transform every SFT into its own short time series.
    pub fn inverse_transform_segments(&mut self) -> Result<(), LftError> {
        self.expect_stage(AssemblyStage::Initialized)?;
        let result = self.compute_short_series();
        let short_series = self.advance(AssemblyStage::SegmentsInverseTransformed, result)?;
        self.short_series = short_series;
        Ok(())
    }

    fn compute_short_series(&self) -> Result<Vec<Vec<Complex<f64>>>, LftError> {
        let helper = FftHelper::inverse(self.span.num_bins)?;
        let sfts = &self.sfts.sfts;
        if self.config.threads <= 1 {
            let mut helper = helper;
            return sfts
                .iter()
                .map(|sft| inverse_transform_sft(sft, &mut helper))
                .collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| {
                LftError::ResourceExhaustion(format!(
                    "failed to start {} worker threads: {e}",
                    self.config.threads
                ))
            })?;
        pool.install(|| {
            sfts.par_iter()
                .map_init(|| helper.clone(), |h, sft| inverse_transform_sft(sft, h))
                .collect()
        })
    }

    /// Splice every short time series into a fresh zero-filled long time
    /// series. Later SFTs overwrite earlier ones where they overlap.
    pub fn assemble(&mut self) -> Result<(), LftError> {
        self.expect_stage(AssemblyStage::SegmentsInverseTransformed)?;
        let result = self.splice_all();
        let long_ts = self.advance(AssemblyStage::Assembled, result)?;
        self.long_ts = long_ts;
        self.short_series = Vec::new();
        Ok(())
    }

    fn splice_all(&self) -> Result<Vec<Complex<f64>>, LftError> {
        let mut long_ts = try_zeroed_buffer(self.span.num_time_samples, "the long time series")?;
        for (n, (sft, short_ts)) in self.sfts.iter().zip(&self.short_series).enumerate() {
            let bin0 = self.span.bin_offset(sft.epoch)?;
            if self.config.verbose_segments {
                trace!(
                    "SFT {n} at {} -> samples {bin0}..{}",
                    sft.epoch,
                    bin0 + short_ts.len()
                );
            }
            splice_into(&mut long_ts, bin0, short_ts)?;
        }
        Ok(long_ts)
    }

    /// Forward-transform the long time series and reorder the result into
    /// centered frequency order.
    pub fn synthesize(&mut self) -> Result<(), LftError> {
        self.expect_stage(AssemblyStage::Assembled)?;
        let long_ts = std::mem::take(&mut self.long_ts);
        let result = Self::forward_centered(long_ts);
        let spectrum = self.advance(AssemblyStage::Synthesized, result)?;
        self.spectrum = spectrum;
        Ok(())
    }

    fn forward_centered(mut buffer: Vec<Complex<f64>>) -> Result<Vec<Complex<f64>>, LftError> {
        let mut helper = FftHelper::forward(buffer.len())?;
        helper.process(&mut buffer)?;
        native_to_centered(&mut buffer)?;
        Ok(buffer)
    }

    /// Wrap the synthesized spectrum with its metadata.
    pub fn finish(mut self) -> Result<Lft, LftError> {
        self.expect_stage(AssemblyStage::Synthesized)?;
        // Non-empty was checked in `new`.
        let sfts = self.sfts;
        let first = &sfts.sfts[0];
        let mut lft = first.with_data(std::mem::take(&mut self.spectrum));
        lft.name = format!("{}{LFT_NAME_SUFFIX}", first.name);
        lft.delta_f = 1.0 / self.span.tspan_corrected();
        self.stage = AssemblyStage::Done;
        debug!("LFT assembly: {}", self.stage);
        Ok(lft)
    }

    /// Run every remaining stage.
    pub fn run(mut self) -> Result<Lft, LftError> {
        self.inverse_transform_segments()?;
        self.assemble()?;
        self.synthesize()?;
        self.finish()
    }
}

/// Turn the SFTs of one detector into one long Fourier transform over their
/// total time span.
///
/// The SFTs must be in native bin order, ascending in epoch, and share
/// `deltaF`, bin count, `f0` and units. The result has `numTimeSamples`
/// bins in centered order, the first SFT's epoch, `f0` and units, and
/// `deltaF = 1 / (numTimeSamples * deltaT)`.
pub fn sft_vector_to_lft(sfts: &SftVector, config: AssemblyConfig) -> Result<Lft, LftError> {
    LftAssembly::new(sfts, config)?.run()
}
