//! `key = value` configuration files.
//!
//! ```text
//! # comments run to the end of the line
//! input_sfts  = "data/H1-*.sft"
//! output-lft  = H1.lft
//! fmin = 100.0
//! ```
//!
//! Keys are case-insensitive and `_`/`-` inside them are ignored.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::warn;

use crate::error::ConfigError;

const KNOWN_KEYS: [&str; 9] = [
    "inputsfts",
    "outputlft",
    "minstarttime",
    "maxendtime",
    "fmin",
    "fmax",
    "cpu",
    "maxtimesamples",
    "plot",
];

/// Settings read from a configuration file. Every field is optional; the
/// command line overrides whatever is set here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub input_sfts: Option<String>,
    pub output_lft: Option<PathBuf>,
    pub min_start_time: Option<i64>,
    pub max_end_time: Option<i64>,
    pub fmin: Option<f64>,
    pub fmax: Option<f64>,
    pub cpu: Option<usize>,
    pub max_time_samples: Option<usize>,
    pub plot: Option<PathBuf>,
}

fn normalise_key(key: &str) -> String {
    key.trim()
        .to_ascii_lowercase()
        .replace(['_', '-'], "")
}

/// Key → (value, line number).
type Params = HashMap<String, (String, usize)>;

fn parse_optional<T: FromStr>(
    params: &Params,
    key: &str,
    path: &Path,
) -> Result<Option<T>, ConfigError> {
    match params.get(key) {
        Some((value, line)) => value.parse::<T>().map(Some).map_err(|_| ConfigError::BadValue {
            path: path.to_path_buf(),
            line: *line,
            key: key.to_string(),
            value: value.clone(),
        }),
        None => Ok(None),
    }
}

fn parse_lines<R: BufRead>(reader: R) -> Result<Params, ConfigError> {
    let mut params = HashMap::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if let Some(index) = line.find('=') {
            let (key, value) = line.split_at(index);
            let value = value
                .trim_start_matches('=')
                .trim()
                .trim_matches('"')
                .trim_matches('\'')
                .to_string();
            params.insert(normalise_key(key), (value, idx + 1));
        } else {
            warn!("Ignoring config line {} without '=': {line}", idx + 1);
        }
    }
    Ok(params)
}

fn from_params(params: &Params, path: &Path) -> Result<ConfigFile, ConfigError> {
    for key in params.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            warn!("{}: ignoring unknown key '{key}'", path.display());
        }
    }
    Ok(ConfigFile {
        input_sfts: params.get("inputsfts").map(|(v, _)| v.clone()),
        output_lft: params.get("outputlft").map(|(v, _)| PathBuf::from(v)),
        min_start_time: parse_optional(params, "minstarttime", path)?,
        max_end_time: parse_optional(params, "maxendtime", path)?,
        fmin: parse_optional(params, "fmin", path)?,
        fmax: parse_optional(params, "fmax", path)?,
        cpu: parse_optional(params, "cpu", path)?,
        max_time_samples: parse_optional(params, "maxtimesamples", path)?,
        plot: params.get("plot").map(|(v, _)| PathBuf::from(v)),
    })
}

pub fn parse_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let reader = BufReader::new(File::open(path)?);
    let params = parse_lines(reader)?;
    from_params(&params, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_str(text: &str) -> Result<ConfigFile, ConfigError> {
        let params = parse_lines(Cursor::new(text))?;
        from_params(&params, Path::new("test.cfg"))
    }

    #[test]
    fn keys_are_normalised_and_values_unquoted() {
        let cfg = parse_str(
            "# LFT run\n\
             Input_SFTs = \"data/H1-*.sft\"  # all of H1\n\
             output-lft='out/H1.lft'\n\
             MIN_START_TIME = 815000000\n\
             fmin = 100.5\n\
             cpu = 4\n",
        )
        .unwrap();
        assert_eq!(cfg.input_sfts.as_deref(), Some("data/H1-*.sft"));
        assert_eq!(cfg.output_lft, Some(PathBuf::from("out/H1.lft")));
        assert_eq!(cfg.min_start_time, Some(815_000_000));
        assert_eq!(cfg.fmin, Some(100.5));
        assert_eq!(cfg.cpu, Some(4));
        assert_eq!(cfg.fmax, None);
        assert_eq!(cfg.plot, None);
    }

    #[test]
    fn unparsable_value_reports_its_line() {
        let err = parse_str("fmin = 1\nfmax = lots\n").unwrap_err();
        match err {
            ConfigError::BadValue { line, key, value, .. } => {
                assert_eq!(line, 2);
                assert_eq!(key, "fmax");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unknown_keys_and_junk_lines_are_skipped() {
        let cfg = parse_str("colour = blue\njust some words\nplot = lft.png\n").unwrap();
        assert_eq!(cfg.plot, Some(PathBuf::from("lft.png")));
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.cfg");
        std::fs::write(&path, "maxtimesamples = 1000000\n").unwrap();
        let cfg = parse_config_file(&path).unwrap();
        assert_eq!(cfg.max_time_samples, Some(1_000_000));
        assert!(parse_config_file(&dir.path().join("missing.cfg")).is_err());
    }
}
