//! Short (and long) Fourier transforms and the metadata derived from a set
//! of them.

use std::fmt;

use num_complex::Complex;

use crate::error::LftError;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A GPS instant split into whole seconds and nanoseconds, as stored in SFT
/// headers. `nsec` is always in `0..1e9`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpsTime {
    pub sec: i64,
    pub nsec: u32,
}

impl GpsTime {
    pub fn new(sec: i64, nsec: u32) -> Self {
        let carry = i64::from(nsec) / NANOS_PER_SEC;
        Self {
            sec: sec + carry,
            nsec: (i64::from(nsec) % NANOS_PER_SEC) as u32,
        }
    }

    pub fn as_seconds(&self) -> f64 {
        self.sec as f64 + f64::from(self.nsec) * 1e-9
    }

    /// `self - earlier` in seconds, computed without losing nanosecond
    /// precision to the size of absolute GPS times.
    pub fn seconds_since(&self, earlier: GpsTime) -> f64 {
        let nsec = i64::from(self.nsec) - i64::from(earlier.nsec);
        (self.sec - earlier.sec) as f64 + nsec as f64 * 1e-9
    }

    pub fn add_seconds(&self, seconds: f64) -> Self {
        let whole = seconds.floor();
        let frac_nsec = ((seconds - whole) * 1e9).round() as i64;
        let total_nsec = i64::from(self.nsec) + frac_nsec;
        Self {
            sec: self.sec + whole as i64 + total_nsec.div_euclid(NANOS_PER_SEC),
            nsec: total_nsec.rem_euclid(NANOS_PER_SEC) as u32,
        }
    }
}

impl fmt::Display for GpsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// One frequency-domain transform: an SFT read from disk, or the long
/// transform assembled from many of them. Bin `k` of `data` is at frequency
/// `f0 + k * delta_f`.
#[derive(Clone, Debug, PartialEq)]
pub struct Sft {
    /// Label; for SFTs read from disk this is the two-character detector
    /// prefix, e.g. `H1`.
    pub name: String,
    pub epoch: GpsTime,
    pub f0: f64,
    pub delta_f: f64,
    /// Physical unit tag, carried through unchanged.
    pub sample_units: String,
    pub data: Vec<Complex<f64>>,
}

/// The long Fourier transform has the same shape as an SFT.
pub type Lft = Sft;

impl Sft {
    pub fn num_bins(&self) -> usize {
        self.data.len()
    }

    /// Duration `1/deltaF` of the time series this transform covers.
    pub fn tsft(&self) -> f64 {
        1.0 / self.delta_f
    }

    /// Copy of the metadata with a different data buffer.
    pub fn with_data(&self, data: Vec<Complex<f64>>) -> Sft {
        Sft {
            name: self.name.clone(),
            epoch: self.epoch,
            f0: self.f0,
            delta_f: self.delta_f,
            sample_units: self.sample_units.clone(),
            data,
        }
    }

    /// Detector prefix: the leading two characters of the name.
    pub fn detector(&self) -> &str {
        match self.name.char_indices().nth(2) {
            Some((idx, _)) => &self.name[..idx],
            None => &self.name,
        }
    }
}

/// An ordered set of SFTs from one detector, ascending in epoch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SftVector {
    pub sfts: Vec<Sft>,
}

impl SftVector {
    pub fn new(sfts: Vec<Sft>) -> Self {
        Self { sfts }
    }

    pub fn len(&self) -> usize {
        self.sfts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sfts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sft> {
        self.sfts.iter()
    }

    /// Check that the set is non-empty and that every SFT shares the first
    /// one's `deltaF`, bin count, `f0` and units, then derive the time grid
    /// of the long transform.
    pub fn span(&self) -> Result<SftSpan, LftError> {
        let first = self
            .sfts
            .first()
            .ok_or_else(|| LftError::InvalidArgument("empty SFT input".into()))?;
        let num_bins = first.num_bins();
        if num_bins == 0 {
            return Err(LftError::InvalidArgument(format!(
                "SFT '{}' at {} has no frequency bins",
                first.name, first.epoch
            )));
        }
        if !(first.delta_f.is_finite() && first.delta_f > 0.0) {
            return Err(LftError::InvalidArgument(format!(
                "SFT '{}' has non-positive frequency resolution {}",
                first.name, first.delta_f
            )));
        }
        for (n, sft) in self.sfts.iter().enumerate().skip(1) {
            if sft.num_bins() != num_bins {
                return Err(LftError::InvalidArgument(format!(
                    "SFT {n} has {} bins, expected {num_bins}",
                    sft.num_bins()
                )));
            }
            if sft.delta_f != first.delta_f {
                return Err(LftError::InvalidArgument(format!(
                    "SFT {n} has deltaF = {} Hz, expected {} Hz",
                    sft.delta_f, first.delta_f
                )));
            }
            if sft.f0 != first.f0 {
                return Err(LftError::InvalidArgument(format!(
                    "SFT {n} has f0 = {} Hz, expected {} Hz",
                    sft.f0, first.f0
                )));
            }
            if sft.sample_units != first.sample_units {
                return Err(LftError::InvalidArgument(format!(
                    "SFT {n} has units '{}', expected '{}'",
                    sft.sample_units, first.sample_units
                )));
            }
        }

        let last = &self.sfts[self.sfts.len() - 1];
        let tsft = first.tsft();
        let delta_t = 1.0 / (num_bins as f64 * first.delta_f);
        let start_time = first.epoch;
        let end_time = last.epoch.add_seconds(tsft);
        let tspan = end_time.seconds_since(start_time);
        if !(tspan > 0.0) {
            return Err(LftError::InvalidArgument(format!(
                "SFTs span a non-positive time {tspan} s (start {start_time}, end {end_time}); are they ordered?"
            )));
        }
        let num_time_samples = (tspan / delta_t).round() as usize;

        Ok(SftSpan {
            num_sfts: self.sfts.len(),
            num_bins,
            delta_f: first.delta_f,
            tsft,
            delta_t,
            start_time,
            end_time,
            tspan,
            num_time_samples,
        })
    }
}

impl<'a> IntoIterator for &'a SftVector {
    type Item = &'a Sft;
    type IntoIter = std::slice::Iter<'a, Sft>;

    fn into_iter(self) -> Self::IntoIter {
        self.sfts.iter()
    }
}

/// Quantities shared by all SFTs in a set, and the time grid of the long
/// time series spanning them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SftSpan {
    pub num_sfts: usize,
    pub num_bins: usize,
    pub delta_f: f64,
    pub tsft: f64,
    /// Sample spacing of each SFT's (and the long) time series.
    pub delta_t: f64,
    pub start_time: GpsTime,
    /// Epoch of the last SFT plus `tsft`.
    pub end_time: GpsTime,
    /// `end_time - start_time`, before rounding to whole samples.
    pub tspan: f64,
    /// `round(tspan / delta_t)`.
    pub num_time_samples: usize,
}

impl SftSpan {
    /// The span actually covered by `num_time_samples` samples.
    pub fn tspan_corrected(&self) -> f64 {
        self.num_time_samples as f64 * self.delta_t
    }

    /// Total duration of data, ignoring gaps.
    pub fn tdata(&self) -> f64 {
        self.num_sfts as f64 * self.tsft
    }

    /// Index into the long time series at which an SFT starting at `epoch`
    /// begins, rounded to the nearest sample.
    pub fn bin_offset(&self, epoch: GpsTime) -> Result<usize, LftError> {
        let offset = epoch.seconds_since(self.start_time) / self.delta_t;
        let bin0 = offset.round();
        if bin0 < 0.0 {
            return Err(LftError::InvalidArgument(format!(
                "SFT at {epoch} starts before the first SFT at {}",
                self.start_time
            )));
        }
        // Checked in f64 so a far-off epoch cannot overflow the index.
        if bin0 + self.num_bins as f64 > self.num_time_samples as f64 {
            return Err(LftError::InvalidArgument(format!(
                "SFT at {epoch} starts at sample {bin0} and runs beyond the long time series of {} samples",
                self.num_time_samples
            )));
        }
        Ok(bin0 as usize)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// `num_bins` bins at 1/`tsft` Hz resolution, starting at `epoch_sec`.
    pub(crate) fn make_sft(epoch_sec: i64, num_bins: usize, tsft: f64) -> Sft {
        Sft {
            name: "H1".to_string(),
            epoch: GpsTime::new(epoch_sec, 0),
            f0: 100.0,
            delta_f: 1.0 / tsft,
            sample_units: "counts".to_string(),
            data: (0..num_bins)
                .map(|k| Complex::new(k as f64 + 1.0, -(k as f64)))
                .collect(),
        }
    }

    #[test]
    fn gps_arithmetic_keeps_nanoseconds() {
        let t = GpsTime::new(1_000_000_000, 250_000_000);
        assert_eq!(t.add_seconds(1.75), GpsTime::new(1_000_000_002, 0));
        assert_eq!(t.add_seconds(-0.5), GpsTime::new(999_999_999, 750_000_000));
        assert_abs_diff_eq!(
            GpsTime::new(1_000_000_010, 0).seconds_since(t),
            9.75,
            epsilon = 1e-12
        );
        assert_eq!(GpsTime::new(3, 1_500_000_000), GpsTime::new(4, 500_000_000));
        assert_eq!(t.to_string(), "1000000000.250000000");
    }

    #[test]
    fn span_of_gapped_set() {
        // Three 4 s SFTs of 8 bins with a 4 s gap before the last one.
        let sfts = SftVector::new(vec![
            make_sft(100, 8, 4.0),
            make_sft(104, 8, 4.0),
            make_sft(112, 8, 4.0),
        ]);
        let span = sfts.span().unwrap();
        assert_eq!(span.num_bins, 8);
        assert_abs_diff_eq!(span.delta_t, 0.5);
        assert_abs_diff_eq!(span.tspan, 16.0);
        assert_eq!(span.num_time_samples, 32);
        assert_abs_diff_eq!(span.tdata(), 12.0);
        assert_eq!(span.end_time, GpsTime::new(116, 0));
        assert_eq!(span.bin_offset(GpsTime::new(112, 0)).unwrap(), 24);
        assert!(span.bin_offset(GpsTime::new(113, 0)).is_err());
        assert!(span.bin_offset(GpsTime::new(99, 0)).is_err());
    }

    #[test]
    fn fractional_offsets_round_to_nearest_sample() {
        // deltaT = 0.5 s; 6.3 s is 12.6 samples in.
        let mut second = make_sft(0, 8, 4.0);
        second.epoch = GpsTime::new(6, 300_000_000);
        let span = SftVector::new(vec![make_sft(0, 8, 4.0), second])
            .span()
            .unwrap();
        assert_eq!(span.num_time_samples, 21);
        assert_eq!(span.bin_offset(GpsTime::new(6, 300_000_000)).unwrap(), 13);
        assert_eq!(span.bin_offset(GpsTime::new(6, 200_000_000)).unwrap(), 12);
    }

    #[test]
    fn far_off_epoch_is_invalid_not_overflowing() {
        let span = SftVector::new(vec![make_sft(0, 8, 0.008), make_sft(1, 8, 0.008)])
            .span()
            .unwrap();
        for epoch in [GpsTime::new(9_000_000_000_000_000_000, 0), GpsTime::new(i64::MAX, 0)] {
            assert!(matches!(
                span.bin_offset(epoch),
                Err(LftError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn empty_set_is_invalid() {
        assert!(matches!(
            SftVector::default().span(),
            Err(LftError::InvalidArgument(_))
        ));
    }

    #[test]
    fn zero_bin_sft_is_invalid() {
        let sfts = SftVector::new(vec![make_sft(0, 0, 4.0)]);
        assert!(matches!(sfts.span(), Err(LftError::InvalidArgument(_))));
    }

    #[test]
    fn mismatched_metadata_is_invalid() {
        let mut other_res = make_sft(4, 8, 4.0);
        other_res.delta_f = 0.5;
        let mut other_f0 = make_sft(4, 8, 4.0);
        other_f0.f0 = 101.0;
        let mut other_units = make_sft(4, 8, 4.0);
        other_units.sample_units = "strain".into();
        for second in [make_sft(4, 6, 4.0), other_res, other_f0, other_units] {
            let sfts = SftVector::new(vec![make_sft(0, 8, 4.0), second]);
            assert!(matches!(sfts.span(), Err(LftError::InvalidArgument(_))));
        }
    }

    #[test]
    fn unordered_set_spanning_backwards_is_invalid() {
        let sfts = SftVector::new(vec![make_sft(100, 8, 4.0), make_sft(50, 8, 4.0)]);
        assert!(matches!(sfts.span(), Err(LftError::InvalidArgument(_))));
    }

    #[test]
    fn detector_prefix() {
        let mut sft = make_sft(0, 1, 1.0);
        assert_eq!(sft.detector(), "H1");
        sft.name = "L1:long Fourier transform".into();
        assert_eq!(sft.detector(), "L1");
        sft.name = "V".into();
        assert_eq!(sft.detector(), "V");
    }
}
