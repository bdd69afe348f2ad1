//! Reading and writing SFT files (version 2 layout).
//!
//! A file holds one or more blocks, each a 48-byte header, an optional
//! NUL-padded comment and `nsamples` single-precision complex bins:
//!
//! ```text
//!  0 f64  version (2.0)        24 i32  first_frequency_index
//!  8 i32  gps_sec              28 i32  nsamples
//! 12 i32  gps_nsec             32 u64  crc64
//! 16 f64  tbase (1/deltaF)     40 [u8; 2] detector, [u8; 2] padding
//!                              44 i32  comment_length
//! ```
//!
//! Blocks are written little-endian. Big-endian files are recognised from
//! the version field and swapped on reading.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use num_complex::Complex;

use crate::error::SftIoError;
use crate::sft::{GpsTime, Sft};

pub const SFT_VERSION: f64 = 2.0;
pub const HEADER_SIZE: usize = 48;
/// Units given to SFTs read from disk, which carry none of their own.
pub const DEFAULT_SAMPLE_UNITS: &str = "counts";

const VERSION_OFFSET: usize = 0;
const GPS_SEC_OFFSET: usize = 8;
const GPS_NSEC_OFFSET: usize = 12;
const TBASE_OFFSET: usize = 16;
const FIRST_INDEX_OFFSET: usize = 24;
const NSAMPLES_OFFSET: usize = 28;
const CRC64_OFFSET: usize = 32;
const DETECTOR_OFFSET: usize = 40;
const COMMENT_LENGTH_OFFSET: usize = 44;
const BYTES_PER_BIN: usize = 8;

const CRC64_POLY: u64 = 0xD800_0000_0000_0000;

const fn build_crc64_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut part = i as u64;
        let mut j = 0;
        while j < 8 {
            part = if part & 1 == 1 {
                (part >> 1) ^ CRC64_POLY
            } else {
                part >> 1
            };
            j += 1;
        }
        table[i] = part;
        i += 1;
    }
    table
}

static CRC64_TABLE: [u64; 256] = build_crc64_table();

fn crc64(data: &[u8], mut crc: u64) -> u64 {
    for &byte in data {
        crc = CRC64_TABLE[((crc ^ byte as u64) & 0xff) as usize] ^ (crc >> 8);
    }
    crc
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn detect(raw: &[u8]) -> Option<Self> {
        let bytes: [u8; 8] = raw.get(..8)?.try_into().ok()?;
        if f64::from_le_bytes(bytes) == SFT_VERSION {
            Some(ByteOrder::Little)
        } else if f64::from_be_bytes(bytes) == SFT_VERSION {
            Some(ByteOrder::Big)
        } else {
            None
        }
    }

    fn read_4(raw: &[u8], offset: usize) -> [u8; 4] {
        let mut out = [0u8; 4];
        out.copy_from_slice(&raw[offset..offset + 4]);
        out
    }

    fn read_8(raw: &[u8], offset: usize) -> [u8; 8] {
        let mut out = [0u8; 8];
        out.copy_from_slice(&raw[offset..offset + 8]);
        out
    }

    fn i32_at(self, raw: &[u8], offset: usize) -> i32 {
        let b = Self::read_4(raw, offset);
        match self {
            ByteOrder::Little => i32::from_le_bytes(b),
            ByteOrder::Big => i32::from_be_bytes(b),
        }
    }

    fn f32_at(self, raw: &[u8], offset: usize) -> f32 {
        let b = Self::read_4(raw, offset);
        match self {
            ByteOrder::Little => f32::from_le_bytes(b),
            ByteOrder::Big => f32::from_be_bytes(b),
        }
    }

    fn f64_at(self, raw: &[u8], offset: usize) -> f64 {
        let b = Self::read_8(raw, offset);
        match self {
            ByteOrder::Little => f64::from_le_bytes(b),
            ByteOrder::Big => f64::from_be_bytes(b),
        }
    }

    fn u64_at(self, raw: &[u8], offset: usize) -> u64 {
        let b = Self::read_8(raw, offset);
        match self {
            ByteOrder::Little => u64::from_le_bytes(b),
            ByteOrder::Big => u64::from_be_bytes(b),
        }
    }

    fn put_i32(self, buf: &mut [u8], offset: usize, value: i32) {
        let b = match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        };
        buf[offset..offset + 4].copy_from_slice(&b);
    }

    fn put_f32(self, buf: &mut [u8], offset: usize, value: f32) {
        let b = match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        };
        buf[offset..offset + 4].copy_from_slice(&b);
    }

    fn put_f64(self, buf: &mut [u8], offset: usize, value: f64) {
        let b = match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        };
        buf[offset..offset + 8].copy_from_slice(&b);
    }

    fn put_u64(self, buf: &mut [u8], offset: usize, value: u64) {
        let b = match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        };
        buf[offset..offset + 8].copy_from_slice(&b);
    }
}

/// One block of an SFT file.
#[derive(Clone, Debug, PartialEq)]
pub struct SftBlock {
    pub sft: Sft,
    pub comment: String,
}

fn bad_header(path: &Path, reason: String) -> SftIoError {
    SftIoError::BadHeader {
        path: path.to_path_buf(),
        reason,
    }
}

/// Decode every block in `raw`. `path` is only used in error messages.
pub fn decode_sft_blocks(raw: &[u8], path: &Path) -> Result<Vec<SftBlock>, SftIoError> {
    let mut blocks = Vec::new();
    let mut offset = 0usize;
    while offset < raw.len() {
        let (block, len) = decode_one_block(&raw[offset..], path, offset)?;
        blocks.push(block);
        offset += len;
    }
    Ok(blocks)
}

fn decode_one_block(
    raw: &[u8],
    path: &Path,
    file_offset: usize,
) -> Result<(SftBlock, usize), SftIoError> {
    let truncated = || SftIoError::Truncated {
        path: path.to_path_buf(),
        offset: file_offset as u64,
    };
    if raw.len() < HEADER_SIZE {
        return Err(truncated());
    }
    let order = ByteOrder::detect(raw).ok_or_else(|| SftIoError::BadVersion {
        path: path.to_path_buf(),
        version: f64::from_le_bytes(ByteOrder::read_8(raw, VERSION_OFFSET)),
    })?;

    let gps_sec = order.i32_at(raw, GPS_SEC_OFFSET);
    let gps_nsec = order.i32_at(raw, GPS_NSEC_OFFSET);
    let tbase = order.f64_at(raw, TBASE_OFFSET);
    let first_frequency_index = order.i32_at(raw, FIRST_INDEX_OFFSET);
    let nsamples = order.i32_at(raw, NSAMPLES_OFFSET);
    let stored_crc = order.u64_at(raw, CRC64_OFFSET);
    let comment_length = order.i32_at(raw, COMMENT_LENGTH_OFFSET);

    if !(0..1_000_000_000).contains(&gps_nsec) {
        return Err(bad_header(path, format!("gps_nsec {gps_nsec} out of range")));
    }
    if !(tbase.is_finite() && tbase > 0.0) {
        return Err(bad_header(path, format!("tbase {tbase} is not positive")));
    }
    if nsamples < 0 || comment_length < 0 {
        return Err(bad_header(
            path,
            format!("negative sizes (nsamples {nsamples}, comment_length {comment_length})"),
        ));
    }
    let nsamples = nsamples as usize;
    let comment_length = comment_length as usize;
    let data_offset = HEADER_SIZE + comment_length;
    let block_len = data_offset + nsamples * BYTES_PER_BIN;
    if raw.len() < block_len {
        return Err(truncated());
    }

    let detector = String::from_utf8_lossy(&raw[DETECTOR_OFFSET..DETECTOR_OFFSET + 2])
        .trim_end_matches('\0')
        .to_string();
    let comment = String::from_utf8_lossy(&raw[HEADER_SIZE..data_offset])
        .trim_end_matches('\0')
        .to_string();

    if order == ByteOrder::Little {
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&raw[..HEADER_SIZE]);
        header[CRC64_OFFSET..CRC64_OFFSET + 8].fill(0);
        let crc = crc64(&raw[HEADER_SIZE..block_len], crc64(&header, !0));
        if crc != stored_crc {
            warn!(
                "{}: checksum mismatch in SFT block at byte {file_offset} (stored {stored_crc:#018x}, computed {crc:#018x})",
                path.display()
            );
        }
    } else {
        debug!(
            "{}: big-endian SFT block at byte {file_offset}; checksum not verified",
            path.display()
        );
    }

    let data = raw[data_offset..block_len]
        .chunks_exact(BYTES_PER_BIN)
        .map(|bin| {
            Complex::new(
                f64::from(order.f32_at(bin, 0)),
                f64::from(order.f32_at(bin, 4)),
            )
        })
        .collect();

    let sft = Sft {
        name: detector,
        epoch: GpsTime::new(i64::from(gps_sec), gps_nsec as u32),
        f0: f64::from(first_frequency_index) / tbase,
        delta_f: 1.0 / tbase,
        sample_units: DEFAULT_SAMPLE_UNITS.to_string(),
        data,
    };
    Ok((SftBlock { sft, comment }, block_len))
}

/// Read every SFT block from one file.
pub fn read_sft_file(path: &Path) -> Result<Vec<SftBlock>, SftIoError> {
    let mut raw = Vec::new();
    File::open(path)?.read_to_end(&mut raw)?;
    let blocks = decode_sft_blocks(&raw, path)?;
    debug!("{}: read {} SFT block(s)", path.display(), blocks.len());
    Ok(blocks)
}

fn encode_sft_block(sft: &Sft, comment: &str, order: ByteOrder) -> Result<Vec<u8>, SftIoError> {
    if !(sft.delta_f.is_finite() && sft.delta_f > 0.0) {
        return Err(SftIoError::Unwritable(format!(
            "deltaF {} is not positive",
            sft.delta_f
        )));
    }
    let tbase = 1.0 / sft.delta_f;
    let index_f = sft.f0 * tbase;
    let first_frequency_index = index_f.round();
    if (index_f - first_frequency_index).abs() > 1e-6 {
        warn!(
            "f0 = {} Hz is not a whole number of bins at deltaF = {} Hz; storing bin {}",
            sft.f0, sft.delta_f, first_frequency_index
        );
    }
    if !(f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&first_frequency_index) {
        return Err(SftIoError::Unwritable(format!(
            "first frequency index {first_frequency_index} does not fit the header"
        )));
    }
    let gps_sec = i32::try_from(sft.epoch.sec)
        .map_err(|_| SftIoError::Unwritable(format!("GPS second {} out of range", sft.epoch.sec)))?;
    let nsamples = i32::try_from(sft.data.len()).map_err(|_| {
        SftIoError::Unwritable(format!("{} bins do not fit the header", sft.data.len()))
    })?;

    let comment_length = if comment.is_empty() {
        0
    } else {
        (comment.len() + 1 + 7) / 8 * 8
    };
    let comment_length_i32 = i32::try_from(comment_length)
        .map_err(|_| SftIoError::Unwritable("comment too long".into()))?;

    let detector = sft.detector().as_bytes();
    if detector.len() != 2 {
        return Err(SftIoError::Unwritable(format!(
            "name '{}' does not start with a two-character detector prefix",
            sft.name
        )));
    }

    let mut out = vec![0u8; HEADER_SIZE + comment_length + sft.data.len() * BYTES_PER_BIN];
    order.put_f64(&mut out, VERSION_OFFSET, SFT_VERSION);
    order.put_i32(&mut out, GPS_SEC_OFFSET, gps_sec);
    order.put_i32(&mut out, GPS_NSEC_OFFSET, sft.epoch.nsec as i32);
    order.put_f64(&mut out, TBASE_OFFSET, tbase);
    order.put_i32(&mut out, FIRST_INDEX_OFFSET, first_frequency_index as i32);
    order.put_i32(&mut out, NSAMPLES_OFFSET, nsamples);
    out[DETECTOR_OFFSET..DETECTOR_OFFSET + 2].copy_from_slice(detector);
    order.put_i32(&mut out, COMMENT_LENGTH_OFFSET, comment_length_i32);
    out[HEADER_SIZE..HEADER_SIZE + comment.len()].copy_from_slice(comment.as_bytes());

    let data_offset = HEADER_SIZE + comment_length;
    for (k, z) in sft.data.iter().enumerate() {
        let at = data_offset + k * BYTES_PER_BIN;
        order.put_f32(&mut out, at, z.re as f32);
        order.put_f32(&mut out, at + 4, z.im as f32);
    }

    let crc = crc64(&out, !0);
    order.put_u64(&mut out, CRC64_OFFSET, crc);
    Ok(out)
}

/// Append one SFT block to `writer`.
pub fn write_sft_block<W: Write>(
    writer: &mut W,
    sft: &Sft,
    comment: &str,
) -> Result<(), SftIoError> {
    let block = encode_sft_block(sft, comment, ByteOrder::Little)?;
    writer.write_all(&block)?;
    Ok(())
}

/// Write `sft` as a single-block SFT file, with `comment` in its header.
pub fn write_sft_file(path: &Path, sft: &Sft, comment: &str) -> Result<PathBuf, SftIoError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_sft_block(&mut writer, sft, comment)?;
    writer.flush()?;
    debug!("Wrote {} bins to {}", sft.data.len(), path.display());
    Ok(path.to_path_buf())
}
