//! Find, filter and load the input SFTs.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use glob::glob;
use hifitime::Epoch;
use log::debug;

use crate::error::LoadError;
use crate::sft::{GpsTime, Sft, SftVector};
use crate::sftio::read_sft_file;

/// Tolerance, in bins, when deciding whether a band edge falls on a bin.
const BAND_EDGE_TOLERANCE_BINS: f64 = 1e-6;

/// Only SFTs with `min_start_time <= epoch < max_end_time` (GPS seconds)
/// are loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SftConstraints {
    pub min_start_time: i64,
    pub max_end_time: i64,
}

impl Default for SftConstraints {
    fn default() -> Self {
        Self {
            min_start_time: 0,
            max_end_time: i64::from(i32::MAX),
        }
    }
}

impl SftConstraints {
    fn admits(&self, epoch: GpsTime) -> bool {
        epoch >= GpsTime::new(self.min_start_time, 0) && epoch < GpsTime::new(self.max_end_time, 0)
    }
}

/// Frequency band to keep from each SFT. `None` keeps that end of the SFT.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrequencyBand {
    pub fmin: Option<f64>,
    pub fmax: Option<f64>,
}

impl FrequencyBand {
    pub fn is_full(&self) -> bool {
        self.fmin.is_none() && self.fmax.is_none()
    }
}

/// The loaded SFTs, one vector per detector, and what they span.
#[derive(Clone, Debug)]
pub struct InputSftData {
    pub detectors: Vec<SftVector>,
    /// Human-readable description of the data, stored as the output comment.
    pub data_summary: String,
    pub tsft: f64,
    pub start_time: GpsTime,
    /// Epoch of the last SFT plus `tsft`.
    pub end_time: GpsTime,
    /// Lowest frequency in the loaded SFTs.
    pub fmin: f64,
    pub num_bins: usize,
}

impl InputSftData {
    pub fn num_det(&self) -> usize {
        self.detectors.len()
    }

    pub fn tspan(&self) -> f64 {
        self.end_time.seconds_since(self.start_time)
    }
}

/// Given a glob pattern, get all of the matches from the filesystem.
pub fn get_all_matches_from_glob(pattern: &str) -> Result<Vec<PathBuf>, LoadError> {
    let mut entries = vec![];
    for entry in glob(pattern)? {
        entries.push(entry?);
    }
    Ok(entries)
}

/// Keep the bins of `sft` whose frequency lies in `band`.
pub fn extract_band(sft: &Sft, band: FrequencyBand) -> Result<Sft, LoadError> {
    if band.is_full() {
        return Ok(sft.clone());
    }
    let n = sft.num_bins();
    let f1 = sft.f0 + n as f64 * sft.delta_f;
    let fmin = band.fmin.unwrap_or(sft.f0);
    let fmax = band.fmax.unwrap_or(f1);
    if fmin > fmax {
        return Err(LoadError::InvertedBand { fmin, fmax });
    }
    let empty = || LoadError::EmptyBand {
        fmin,
        fmax,
        f0: sft.f0,
        f1,
    };
    if n == 0 {
        return Err(empty());
    }

    let first = ((fmin - sft.f0) / sft.delta_f - BAND_EDGE_TOLERANCE_BINS)
        .ceil()
        .max(0.0);
    let last = ((fmax - sft.f0) / sft.delta_f + BAND_EDGE_TOLERANCE_BINS)
        .floor()
        .min(n as f64 - 1.0);
    if last < first {
        return Err(empty());
    }
    let (first, last) = (first as usize, last as usize);

    let mut extracted = sft.with_data(sft.data[first..=last].to_vec());
    extracted.f0 = sft.f0 + first as f64 * sft.delta_f;
    Ok(extracted)
}

/// Load every SFT matching `pattern` within `constraints`, cut to `band`,
/// sorted by epoch and grouped by detector in first-seen order.
pub fn load_input_sfts(
    pattern: &str,
    constraints: SftConstraints,
    band: FrequencyBand,
    command_line: &str,
) -> Result<InputSftData, LoadError> {
    debug!("Finding all SFTs to load ...");
    let paths = get_all_matches_from_glob(pattern)?;
    if paths.is_empty() {
        return Err(LoadError::NoMatches(pattern.to_string()));
    }

    let mut catalog = Vec::new();
    for path in &paths {
        for block in read_sft_file(path)? {
            if constraints.admits(block.sft.epoch) {
                catalog.push(block.sft);
            }
        }
    }
    debug!(
        "done. (found {} SFTs in {} files)",
        catalog.len(),
        paths.len()
    );
    if catalog.is_empty() {
        return Err(LoadError::NothingInTimeRange {
            min_start: constraints.min_start_time,
            max_end: constraints.max_end_time,
        });
    }
    catalog.sort_by_key(|sft| sft.epoch);

    // Catalog is non-empty and sorted.
    let tsft = catalog[0].tsft();
    let start_time = catalog[0].epoch;
    let end_time = catalog[catalog.len() - 1].epoch.add_seconds(tsft);

    let mut detectors: Vec<SftVector> = Vec::new();
    for sft in catalog {
        let sft = extract_band(&sft, band)?;
        match detectors
            .iter_mut()
            .find(|v| v.sfts[0].detector() == sft.detector())
        {
            Some(v) => v.sfts.push(sft),
            None => detectors.push(SftVector::new(vec![sft])),
        }
    }

    let first = &detectors[0].sfts[0];
    let fmin = first.f0;
    let num_bins = first.num_bins();

    let mut data = InputSftData {
        detectors,
        data_summary: String::new(),
        tsft,
        start_time,
        end_time,
        fmin,
        num_bins,
    };
    data.data_summary = build_data_summary(&data, command_line, now_utc());
    debug!("{}", data.data_summary);
    Ok(data)
}

fn now_utc() -> Epoch {
    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Epoch::from_unix_seconds(unix)
}

fn format_utc(epoch: Epoch) -> String {
    let (y, m, d, h, min, s, _) = epoch.to_gregorian_utc();
    format!("{y:04}-{m:02}-{d:02} {h:02}:{min:02}:{s:02}")
}

/// Describe the loaded data: when, which detectors, when they start and how
/// long they span.
pub fn build_data_summary(data: &InputSftData, command_line: &str, now: Epoch) -> String {
    let loaded = data
        .detectors
        .iter()
        .map(|v| format!("{}:{}", v.sfts[0].detector(), v.len()))
        .collect::<Vec<_>>()
        .join(", ");
    let start = data.start_time.as_seconds();
    let tspan = data.tspan();
    format!(
        "\nCommandline: {command_line}\n\
         %% Date: {} UTC\n\
         %% Loaded SFTs: [ {loaded} ]\n\
         %% Start GPS time tStart = {start:12.3}    ({} UTC)\n\
         %% Total time spanned    = {tspan:12.3} s  ({:.1} hours)\n",
        format_utc(now),
        format_utc(Epoch::from_gpst_seconds(start)),
        tspan / 3600.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sft::tests::make_sft;
    use crate::sftio::{write_sft_block, write_sft_file};
    use approx::assert_abs_diff_eq;
    use std::fs::File;

    fn write_detector_sfts(dir: &std::path::Path, detector: &str, epochs: &[i64]) {
        let path = dir.join(format!("{detector}.sft"));
        let mut file = File::create(path).unwrap();
        for &epoch in epochs {
            let mut sft = make_sft(epoch, 16, 4.0);
            sft.name = detector.to_string();
            write_sft_block(&mut file, &sft, "").unwrap();
        }
    }

    #[test]
    fn band_extraction_keeps_bins_inside() {
        // f0 = 100 Hz, deltaF = 0.25 Hz, 16 bins up to 103.75 Hz.
        let sft = make_sft(0, 16, 4.0);
        let cut = extract_band(
            &sft,
            FrequencyBand {
                fmin: Some(100.5),
                fmax: Some(101.1),
            },
        )
        .unwrap();
        assert_eq!(cut.num_bins(), 3);
        assert_abs_diff_eq!(cut.f0, 100.5);
        assert_eq!(cut.data, sft.data[2..5].to_vec());

        let lower_only = extract_band(
            &sft,
            FrequencyBand {
                fmin: Some(103.0),
                fmax: None,
            },
        )
        .unwrap();
        assert_eq!(lower_only.num_bins(), 4);

        let full = extract_band(&sft, FrequencyBand::default()).unwrap();
        assert_eq!(full, sft);
    }

    #[test]
    fn band_outside_sft_is_an_error() {
        let sft = make_sft(0, 16, 4.0);
        assert!(matches!(
            extract_band(
                &sft,
                FrequencyBand {
                    fmin: Some(200.0),
                    fmax: Some(210.0)
                }
            ),
            Err(LoadError::EmptyBand { .. })
        ));
        assert!(matches!(
            extract_band(
                &sft,
                FrequencyBand {
                    fmin: Some(102.0),
                    fmax: Some(101.0)
                }
            ),
            Err(LoadError::InvertedBand { .. })
        ));
    }

    #[test]
    fn load_filters_sorts_and_groups() {
        let dir = tempfile::tempdir().unwrap();
        write_detector_sfts(dir.path(), "H1", &[1008, 1000, 1004, 2000]);
        write_detector_sfts(dir.path(), "L1", &[1002]);

        let pattern = format!("{}/*.sft", dir.path().display());
        let data = load_input_sfts(
            &pattern,
            SftConstraints {
                min_start_time: 1000,
                max_end_time: 2000,
            },
            FrequencyBand::default(),
            "sft2lft -D test",
        )
        .unwrap();

        assert_eq!(data.num_det(), 2);
        let h1: Vec<i64> = data.detectors[0].iter().map(|s| s.epoch.sec).collect();
        assert_eq!(h1, vec![1000, 1004, 1008]);
        assert_eq!(data.detectors[1].sfts[0].detector(), "L1");
        assert_eq!(data.start_time, GpsTime::new(1000, 0));
        assert_eq!(data.end_time, GpsTime::new(1012, 0));
        assert_abs_diff_eq!(data.tspan(), 12.0);
        assert_eq!(data.num_bins, 16);
        assert!(data.data_summary.contains("Commandline: sft2lft -D test"));
        assert!(data.data_summary.contains("[ H1:3, L1:1 ]"));
    }

    #[test]
    fn no_matches_and_empty_time_range_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.sft", dir.path().display());
        assert!(matches!(
            load_input_sfts(
                &pattern,
                SftConstraints::default(),
                FrequencyBand::default(),
                ""
            ),
            Err(LoadError::NoMatches(_))
        ));

        write_sft_file(&dir.path().join("a.sft"), &make_sft(500, 4, 1.0), "").unwrap();
        assert!(matches!(
            load_input_sfts(
                &pattern,
                SftConstraints {
                    min_start_time: 600,
                    max_end_time: 700
                },
                FrequencyBand::default(),
                ""
            ),
            Err(LoadError::NothingInTimeRange { .. })
        ));
    }

    #[test]
    fn summary_reports_start_and_span() {
        let data = InputSftData {
            detectors: vec![SftVector::new(vec![make_sft(0, 4, 1.0)])],
            data_summary: String::new(),
            tsft: 1800.0,
            start_time: GpsTime::new(0, 0),
            end_time: GpsTime::new(7200, 0),
            fmin: 100.0,
            num_bins: 4,
        };
        let summary = build_data_summary(&data, "cmd", Epoch::from_gpst_seconds(0.0));
        // GPS time zero is 1980-01-06 00:00:00 UTC.
        assert!(summary.contains("(1980-01-06 00:00:00 UTC)"), "{summary}");
        assert!(summary.contains("(2.0 hours)"), "{summary}");
        assert!(summary.contains("[ H1:1 ]"));
    }
}
