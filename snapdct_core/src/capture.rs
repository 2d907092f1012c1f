//! Conversion of 32-bit capture files into the raw 8-bit sample layout.
//!
//! A capture starts with a fixed metadata header followed by interleaved
//! little-endian `i32` I/Q pairs. Conversion runs two passes over the
//! payload: the first finds the peak absolute component, the second scales
//! every component by `127 / peak`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::Context;
use tracing::{debug, info};

use crate::sample::read_full;

/// Size of the capture metadata header.
///   sample_rate:u32 + centre_freq_hz:u64 + timestamp:u64 + sample_size:u32
///   + filler:u32 + crc:u32 = 4 + 8 + 8 + 4 + 4 + 4 = 32
pub const CAPTURE_HEADER_SIZE: usize = 32;

/// Bytes of one `i32` I/Q pair.
const PAIR_BYTES: usize = 8;

/// Pairs processed per read.
const CHUNK_PAIRS: usize = 8192;

/// Capture metadata. Only logged; conversion does not depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHeader {
    pub sample_rate: u32,
    pub centre_freq_hz: u64,
    pub timestamp: u64,
    pub sample_size: u32,
    pub filler: u32,
    pub crc: u32,
}

impl CaptureHeader {
    pub fn from_bytes(buf: &[u8; CAPTURE_HEADER_SIZE]) -> Self {
        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let u64_at = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(b)
        };
        Self {
            sample_rate: u32_at(0),
            centre_freq_hz: u64_at(4),
            timestamp: u64_at(12),
            sample_size: u32_at(20),
            filler: u32_at(24),
            crc: u32_at(28),
        }
    }

    pub fn to_bytes(&self) -> [u8; CAPTURE_HEADER_SIZE] {
        let mut buf = [0u8; CAPTURE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.sample_rate.to_le_bytes());
        buf[4..12].copy_from_slice(&self.centre_freq_hz.to_le_bytes());
        buf[12..20].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[20..24].copy_from_slice(&self.sample_size.to_le_bytes());
        buf[24..28].copy_from_slice(&self.filler.to_le_bytes());
        buf[28..32].copy_from_slice(&self.crc.to_le_bytes());
        buf
    }

    pub fn read_from<R: Read>(src: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; CAPTURE_HEADER_SIZE];
        src.read_exact(&mut buf)?;
        Ok(Self::from_bytes(&buf))
    }
}

/// Outcome of one conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvertSummary {
    pub header: CaptureHeader,
    /// Complete I/Q pairs converted.
    pub samples: u64,
    /// Largest absolute component found in the first pass.
    pub peak: u32,
}

/// Walk every complete `i32` pair of `src`, calling `f` with each chunk of
/// whole pairs. A trailing partial pair is ignored.
fn for_each_chunk<R: Read>(src: &mut R, mut f: impl FnMut(&[u8]) -> io::Result<()>) -> io::Result<u64> {
    let mut buf = vec![0u8; CHUNK_PAIRS * PAIR_BYTES];
    let mut pairs = 0u64;
    loop {
        let filled = read_full(src, &mut buf)?;
        let whole = filled - filled % PAIR_BYTES;
        if whole > 0 {
            f(&buf[..whole])?;
            pairs += (whole / PAIR_BYTES) as u64;
        }
        if filled < buf.len() {
            if filled != whole {
                debug!(bytes = filled - whole, "ignoring trailing partial capture sample");
            }
            return Ok(pairs);
        }
    }
}

#[inline]
fn components(chunk: &[u8]) -> impl Iterator<Item = i32> + '_ {
    chunk
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Scale one component into signed 8-bit. Truncates toward zero, so only the
/// peak itself maps to ±127.
#[inline]
fn scale_component(value: i32, peak: u32) -> i8 {
    if peak == 0 {
        return 0;
    }
    (value as f64 * 127.0 / peak as f64) as i8
}

/// Convert a capture on `src` (positioned at its start) into raw 8-bit
/// samples on `dst`.
pub fn convert<R: Read + Seek, W: Write>(mut src: R, mut dst: W) -> anyhow::Result<ConvertSummary> {
    let header = CaptureHeader::read_from(&mut src).context("reading capture header")?;
    info!(
        sample_rate = header.sample_rate,
        centre_freq_hz = header.centre_freq_hz,
        timestamp = header.timestamp,
        sample_size = header.sample_size,
        "capture header"
    );
    debug!(filler = header.filler, crc = header.crc, "capture header trailer");

    // pass 1: peak absolute component
    let mut peak = 0u32;
    let samples = for_each_chunk(&mut src, |chunk| {
        for v in components(chunk) {
            peak = peak.max(v.unsigned_abs());
        }
        Ok(())
    })
    .context("scanning capture for peak")?;
    info!(peak, samples, "max sample found");

    // pass 2: rescale
    src.seek(SeekFrom::Start(CAPTURE_HEADER_SIZE as u64))
        .context("rewinding capture")?;
    let mut out = Vec::with_capacity(CHUNK_PAIRS * 2);
    for_each_chunk(&mut src, |chunk| {
        out.clear();
        out.extend(components(chunk).map(|v| scale_component(v, peak) as u8));
        dst.write_all(&out)
    })
    .context("writing converted samples")?;
    dst.flush()?;

    Ok(ConvertSummary {
        header,
        samples,
        peak,
    })
}

/// Convert the capture file at `input` into a raw sample file at `output`.
pub fn convert_file(input: &Path, output: &Path) -> anyhow::Result<ConvertSummary> {
    let src = File::open(input).with_context(|| format!("cannot read: {:?}", input))?;
    let dst = File::create(output).with_context(|| format!("cannot write to: {:?}", output))?;
    convert(BufReader::new(src), BufWriter::new(dst))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn capture(pairs: &[(i32, i32)], trailing: &[u8]) -> Vec<u8> {
        let header = CaptureHeader {
            sample_rate: 2_048_000,
            centre_freq_hz: 1_090_000_000,
            timestamp: 1_700_000_000_000,
            sample_size: 32,
            filler: 0,
            crc: 0xDEAD_BEEF,
        };
        let mut bytes = header.to_bytes().to_vec();
        for (i, q) in pairs {
            bytes.extend_from_slice(&i.to_le_bytes());
            bytes.extend_from_slice(&q.to_le_bytes());
        }
        bytes.extend_from_slice(trailing);
        bytes
    }

    #[test]
    fn header_fields_are_little_endian() {
        let bytes = capture(&[], &[]);
        assert_eq!(bytes.len(), CAPTURE_HEADER_SIZE);
        let header = CaptureHeader::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(header.sample_rate, 2_048_000);
        assert_eq!(header.centre_freq_hz, 1_090_000_000);
        assert_eq!(header.crc, 0xDEAD_BEEF);
    }

    #[test]
    fn peak_normalises_to_127() {
        let bytes = capture(&[(1000, -1000), (500, 7), (-999, 0)], &[1, 2, 3]);
        let mut out = Vec::new();
        let summary = convert(Cursor::new(bytes), &mut out).unwrap();

        assert_eq!(summary.samples, 3);
        assert_eq!(summary.peak, 1000);
        let out: Vec<i8> = out.into_iter().map(|b| b as i8).collect();
        // 500 * 0.127 = 63.5 and -999 * 0.127 = -126.873 both truncate toward zero
        assert_eq!(out, vec![127, -127, 63, 0, -126, 0]);
    }

    #[test]
    fn silent_capture_stays_silent() {
        let bytes = capture(&[(0, 0), (0, 0)], &[]);
        let mut out = Vec::new();
        let summary = convert(Cursor::new(bytes), &mut out).unwrap();
        assert_eq!(summary.peak, 0);
        assert_eq!(out, vec![0; 4]);
    }

    #[test]
    fn extreme_negative_does_not_overflow() {
        let bytes = capture(&[(i32::MIN, i32::MAX)], &[]);
        let mut out = Vec::new();
        let summary = convert(Cursor::new(bytes), &mut out).unwrap();
        assert_eq!(summary.peak, 1u32 << 31);
        assert_eq!(out[0] as i8, -127);
        assert_eq!(out[1] as i8, 126);
    }

    #[test]
    fn short_header_is_an_error() {
        let err = convert(Cursor::new(vec![0u8; 10]), Vec::new()).unwrap_err();
        assert!(err.to_string().contains("capture header"));
    }
}
