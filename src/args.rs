use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::ConfigFile;
use crate::error::DynError;
use crate::lft::AssemblyConfig;
use crate::loader::{FrequencyBand, SftConstraints};

#[derive(Parser, Debug, Clone, Default)]
#[command(
    author,
    version,
    about = "Calculate the Fourier transform over the total timespan of a set of SFTs",
    long_about = None,
    arg_required_else_help = true,
    after_help = "Examples:\n  sft2lft -D 'sfts/H1-*.sft' -o H1.lft\n  sft2lft -D 'sfts/*.sft' --fmin 100 --fmax 101 --min-start-time 815000000 -o lft/band.lft --plot band.png\n  sft2lft --config run.cfg --cpu 4 -v\n"
)]
pub struct Args {
    /// File pattern specifying input SFT files
    #[arg(short = 'D', long = "input-sfts", visible_alias = "inputSFTs")]
    pub input_sfts: Option<String>,

    /// Output 'Long Fourier Transform' (LFT) file. Nothing is written when omitted.
    #[arg(short = 'o', long = "output-lft", visible_alias = "outputLFT")]
    pub output_lft: Option<PathBuf>,

    /// Earliest SFT timestamp (GPS seconds) to include [default: 0]
    #[arg(long, allow_hyphen_values = true)]
    pub min_start_time: Option<i64>,

    /// SFTs must start before this GPS second [default: 2147483647]
    #[arg(long, allow_hyphen_values = true)]
    pub max_end_time: Option<i64>,

    /// Lowest frequency to extract from SFTs [default: lowest in input SFTs]
    #[arg(short = 'f', long)]
    pub fmin: Option<f64>,

    /// Highest frequency to extract from SFTs [default: highest in input SFTs]
    #[arg(short = 'F', long)]
    pub fmax: Option<f64>,

    /// key = value file with defaults for any of these options
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Worker threads for inverse-transforming the SFTs [default: 1]
    #[arg(long)]
    pub cpu: Option<usize>,

    /// Refuse to build a long time series with more samples than this
    #[arg(long)]
    pub max_time_samples: Option<usize>,

    /// Write a PNG of the LFT power spectrum
    #[arg(long)]
    pub plot: Option<PathBuf>,

    /// More log output; repeat for more (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbosity: u8,

    /// Log where every SFT lands in the long time series (needs -vv)
    #[arg(long)]
    pub verbose_segments: bool,
}

/// Everything a run needs, after merging the command line over the
/// configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub input_sfts: String,
    pub output_lft: Option<PathBuf>,
    pub constraints: SftConstraints,
    pub band: FrequencyBand,
    pub assembly: AssemblyConfig,
    pub plot: Option<PathBuf>,
}

pub fn resolve_settings(args: &Args, cfg: &ConfigFile) -> Result<RunSettings, DynError> {
    let input_sfts = args
        .input_sfts
        .clone()
        .or_else(|| cfg.input_sfts.clone())
        .ok_or("Specify the input SFTs with --input-sfts (or input_sfts in --config)")?;

    let defaults = SftConstraints::default();
    let constraints = SftConstraints {
        min_start_time: args
            .min_start_time
            .or(cfg.min_start_time)
            .unwrap_or(defaults.min_start_time),
        max_end_time: args
            .max_end_time
            .or(cfg.max_end_time)
            .unwrap_or(defaults.max_end_time),
    };
    if constraints.min_start_time >= constraints.max_end_time {
        return Err(format!(
            "--min-start-time ({}) must be before --max-end-time ({})",
            constraints.min_start_time, constraints.max_end_time
        )
        .into());
    }

    let band = FrequencyBand {
        fmin: args.fmin.or(cfg.fmin),
        fmax: args.fmax.or(cfg.fmax),
    };
    if let (Some(fmin), Some(fmax)) = (band.fmin, band.fmax) {
        if fmin > fmax {
            return Err(format!("--fmin ({fmin}) must not exceed --fmax ({fmax})").into());
        }
    }

    let cpu = args.cpu.or(cfg.cpu).unwrap_or(1);
    if cpu == 0 {
        return Err("--cpu must be at least 1".into());
    }
    let available_cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if cpu > available_cores {
        return Err(format!(
            "--cpu value ({cpu}) exceeds the number of available cores ({available_cores})"
        )
        .into());
    }

    let max_time_samples = args.max_time_samples.or(cfg.max_time_samples);
    if max_time_samples == Some(0) {
        return Err("--max-time-samples must be at least 1".into());
    }

    Ok(RunSettings {
        input_sfts,
        output_lft: args.output_lft.clone().or_else(|| cfg.output_lft.clone()),
        constraints,
        band,
        assembly: AssemblyConfig {
            threads: cpu,
            max_time_samples,
            verbose_segments: args.verbose_segments,
        },
        plot: args.plot.clone().or_else(|| cfg.plot.clone()),
    })
}
