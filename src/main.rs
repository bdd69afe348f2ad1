use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser};
use log::{debug, info};

use sft2lft::args::{resolve_settings, Args, RunSettings};
use sft2lft::config::{parse_config_file, ConfigFile};
use sft2lft::demod::align_sft_vector;
use sft2lft::error::DynError;
use sft2lft::lft::sft_vector_to_lft;
use sft2lft::loader::load_input_sfts;
use sft2lft::plot::plot_lft_power;
use sft2lft::sft::Lft;
use sft2lft::sftio::write_sft_file;

fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.try_init()
}

/// `base` itself for a single detector, otherwise `<stem>_<detector>.<ext>`
/// next to it.
fn per_detector_path(base: &Path, detector: &str, num_det: usize) -> PathBuf {
    if num_det <= 1 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{detector}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{detector}"),
    };
    base.with_file_name(name)
}

fn ensure_parent_dir(path: &Path) -> Result<(), DynError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn run(settings: &RunSettings, command_line: &str) -> Result<(), DynError> {
    info!("Loading SFTs matching '{}'", settings.input_sfts);
    let input = load_input_sfts(
        &settings.input_sfts,
        settings.constraints,
        settings.band,
        command_line,
    )?;
    info!(
        "Loaded {} detector(s): {} bins from {:.6} Hz, spanning {:.1} s",
        input.num_det(),
        input.num_bins,
        input.fmin,
        input.tspan()
    );

    // Every LFT is built before anything is written.
    let mut lfts: Vec<Lft> = Vec::with_capacity(input.num_det());
    for sfts in &input.detectors {
        let detector = sfts.sfts[0].detector().to_string();
        let start = Instant::now();
        let aligned = align_sft_vector(sfts)?;
        let lft = sft_vector_to_lft(&aligned, settings.assembly)?;
        info!(
            "{detector}: {} SFTs -> LFT with {} bins at {:e} Hz resolution ({:.3} s)",
            sfts.len(),
            lft.num_bins(),
            lft.delta_f,
            start.elapsed().as_secs_f64()
        );
        lfts.push(lft);
    }

    let num_det = lfts.len();
    if let Some(plot) = &settings.plot {
        for lft in &lfts {
            let path = per_detector_path(plot, lft.detector(), num_det);
            ensure_parent_dir(&path)?;
            plot_lft_power(lft, &path)?;
            info!("Plotted power spectrum to {}", path.display());
        }
    }

    match &settings.output_lft {
        Some(output) => {
            for lft in &lfts {
                let path = per_detector_path(output, lft.detector(), num_det);
                ensure_parent_dir(&path)?;
                let written = write_sft_file(&path, lft, &input.data_summary)?;
                info!("Wrote LFT to {}", written.display());
            }
        }
        None => info!("No --output-lft given; nothing written"),
    }
    Ok(())
}

fn main() -> Result<(), DynError> {
    if std::env::args_os().len() == 1 {
        Args::command().print_help()?;
        println!();
        return Ok(());
    }

    let args = Args::parse();
    setup_logging(args.verbosity)?;
    debug!("{args:?}");

    let cfg = match &args.config {
        Some(path) => parse_config_file(path)?,
        None => ConfigFile::default(),
    };
    let settings = resolve_settings(&args, &cfg)?;
    let command_line = std::env::args().collect::<Vec<_>>().join(" ");

    run(&settings, &command_line)
}
