//! Block-by-block encode and decode drivers.
//!
//! Encode: raw samples → forward DCT → quantize/trim → [`CompressionStream`]
//! → container. Decode runs the mirror path. Both are generic over the
//! reader, the writer and the entropy coder so they can run against files,
//! in-memory buffers or a test coder alike.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use num_complex::Complex;
use tracing::{debug, info, trace, warn};

use crate::coder::{EntropyDecoder, EntropyEncoder};
use crate::compress::CompressionStream;
use crate::decompress::DecompressionStream;
use crate::format::{header_error, ContainerHeader, HeaderError, CONTAINER_SUFFIX, HEADER_SIZE};
use crate::progress::{Direction, Progress, Snapshot};
use crate::quant::{dequantize, quantize, read_interleaved, write_interleaved, Saturation};
use crate::sample::{bytes_to_complex, complex_to_bytes, read_full};
use crate::transform::Dct;

// ── Parameters ─────────────────────────────────────────────────────────────

/// Validated encoder configuration. Holds exactly what goes into the header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeParams {
    header: ContainerHeader,
}

impl EncodeParams {
    pub fn new(block_size: u32, quantization_factor: f32, bins_to_keep: u32) -> Result<Self, HeaderError> {
        Ok(Self {
            header: ContainerHeader::new(block_size, quantization_factor, bins_to_keep)?,
        })
    }

    /// Build parameters the way the command line expresses them:
    /// `factor = quantization_percent / 100` and
    /// `bins_to_keep = ceil(block_size · cutoff_percent / 100)`.
    pub fn from_percentages(
        block_size: u32,
        quantization_percent: f32,
        cutoff_percent: f32,
    ) -> Result<Self, HeaderError> {
        let factor = quantization_percent / 100.0;
        // f64 so that e.g. 30% of 10 is exactly 3 rather than 3.0000001
        let bins = (block_size as f64 * cutoff_percent as f64 / 100.0).ceil();
        let bins = if bins.is_finite() && bins > 0.0 {
            bins.min(u32::MAX as f64) as u32
        } else {
            0
        };
        Self::new(block_size, factor, bins)
    }

    pub fn header(&self) -> ContainerHeader {
        self.header
    }

    pub fn block_size(&self) -> u32 {
        self.header.block_size
    }

    pub fn quantization_factor(&self) -> f32 {
        self.header.quantization_factor
    }

    pub fn bins_to_keep(&self) -> u32 {
        self.header.bins_to_keep
    }
}

/// `<input>.rqdct`, next to the input file.
pub fn container_path(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(".");
    name.push(CONTAINER_SUFFIX);
    PathBuf::from(name)
}

// ── Summaries ──────────────────────────────────────────────────────────────

/// What an encode run did.
#[derive(Debug, Clone, Default)]
pub struct EncodeSummary {
    /// Full blocks transformed and written.
    pub blocks: u64,
    /// Raw sample bytes consumed (full blocks only).
    pub bytes_in: u64,
    /// Bytes of an incomplete trailing block that were dropped.
    pub dropped_bytes: u64,
    /// Container bytes written, header included.
    pub bytes_out: u64,
    /// Entropy-coder ratio, compressed over quantized payload.
    pub entropy_ratio: f64,
    /// Quantized components that had to be clamped.
    pub saturated: u64,
    /// Largest factor that would have avoided every clamp seen.
    pub suggested_factor: Option<f32>,
}

impl EncodeSummary {
    /// Container size over raw input size.
    pub fn ratio(&self) -> f64 {
        if self.bytes_in == 0 {
            return 0.0;
        }
        self.bytes_out as f64 / self.bytes_in as f64
    }

    fn record_saturation(&mut self, block: u64, saturated: &[Saturation]) {
        for s in saturated {
            self.saturated += 1;
            trace!(block, bin = s.bin, lane = ?s.lane, magnitude = s.magnitude, "quantized value clamped");
            if self.suggested_factor.map_or(true, |f| s.suggested_factor < f) {
                warn!(
                    block,
                    bin = s.bin,
                    "overflow detected, set quantization to: {:.3} %",
                    s.suggested_factor * 100.0
                );
                self.suggested_factor = Some(s.suggested_factor);
            }
        }
    }
}

/// What a decode run did.
#[derive(Debug, Clone)]
pub struct DecodeSummary {
    pub header: ContainerHeader,
    /// Blocks reconstructed.
    pub blocks: u64,
    /// Container bytes consumed, header included.
    pub bytes_in: u64,
    /// Raw sample bytes written.
    pub bytes_out: u64,
    /// Entropy-coder ratio, compressed over quantized payload.
    pub entropy_ratio: f64,
}

// ── Encode ─────────────────────────────────────────────────────────────────

/// Encode every full block of `input` into a container on `output`.
///
/// `total_hint` is the input size when known; it only feeds the ETA in the
/// progress log.
pub fn encode<R: Read, W: Write, E: EntropyEncoder>(
    mut input: R,
    mut output: W,
    params: &EncodeParams,
    coder: E,
    total_hint: Option<u64>,
) -> anyhow::Result<EncodeSummary> {
    let header = params.header();
    let block_size = header.block_size as usize;
    let factor = header.quantization_factor;

    let dct = Dct::new(block_size).context("building transform")?;
    header.write_to(&mut output).context("writing container header")?;
    info!(
        block_size = header.block_size,
        quantization_factor = factor,
        bins_to_keep = header.bins_to_keep,
        coder = coder.name(),
        "encoding"
    );

    let mut compressor = CompressionStream::new(coder);
    let mut progress = Progress::new(Direction::Encoding, total_hint);

    let mut raw = vec![0u8; header.sample_bytes_per_block()];
    let mut samples = vec![Complex::new(0.0f32, 0.0); block_size];
    let mut coeffs = vec![Complex::new(0.0f32, 0.0); block_size];
    let mut quantized = vec![Complex::new(0i8, 0); header.bins_to_keep as usize];
    let mut payload = Vec::with_capacity(header.payload_bytes_per_block());

    let mut summary = EncodeSummary {
        bytes_out: HEADER_SIZE as u64,
        ..EncodeSummary::default()
    };

    loop {
        let filled = read_full(&mut input, &mut raw).context("reading raw samples")?;
        if filled < raw.len() {
            if filled > 0 {
                debug!(bytes = filled, "dropping incomplete trailing block");
            }
            summary.dropped_bytes = filled as u64;
            break;
        }

        bytes_to_complex(&raw, &mut samples);
        dct.forward(&samples, &mut coeffs);
        let saturated = quantize(&coeffs, factor, &mut quantized);
        if !saturated.is_empty() {
            summary.record_saturation(summary.blocks, &saturated);
        }

        payload.clear();
        write_interleaved(&quantized, &mut payload);
        compressor.add_bytes(&payload).context("compressing block")?;
        summary.bytes_out += compressor
            .write_and_drain(&mut output)
            .context("writing compressed payload")? as u64;

        summary.blocks += 1;
        summary.bytes_in += raw.len() as u64;
        progress.tick(Snapshot {
            processed: summary.bytes_in,
            produced: summary.bytes_out,
            trimming_ratio: header.trimming_ratio(),
            entropy_ratio: compressor.ratio(),
        });
    }

    loop {
        let done = compressor.finish().context("finishing compressed stream")?;
        summary.bytes_out += compressor
            .write_and_drain(&mut output)
            .context("writing compressed payload")? as u64;
        if done {
            break;
        }
    }
    output.flush().context("flushing container")?;

    summary.entropy_ratio = compressor.ratio();
    if summary.saturated > 0 {
        warn!(
            clamped = summary.saturated,
            "quantized values were clamped to ±127; re-encode with quantization {:.3} % or lower",
            summary.suggested_factor.unwrap_or(factor) * 100.0
        );
    }
    info!(
        blocks = summary.blocks,
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        elapsed_ms = progress.elapsed().as_millis() as u64,
        "encode finished"
    );
    Ok(summary)
}

/// Encode the file at `input` into a container at `output`.
pub fn encode_file<E: EntropyEncoder>(
    input: &Path,
    output: &Path,
    params: &EncodeParams,
    coder: E,
) -> anyhow::Result<EncodeSummary> {
    let src = File::open(input).with_context(|| format!("cannot read: {:?}", input))?;
    let total = src.metadata().ok().map(|m| m.len());
    let dst = File::create(output).with_context(|| format!("cannot write: {:?}", output))?;
    encode(BufReader::new(src), BufWriter::new(dst), params, coder, total)
}

// ── Decode ─────────────────────────────────────────────────────────────────

/// Read and validate the container header, surfacing validation failures as
/// a [`HeaderError`] inside the returned `anyhow::Error`.
pub fn read_header<R: Read>(input: &mut R) -> anyhow::Result<ContainerHeader> {
    let header = ContainerHeader::read_from(input).map_err(|e| match header_error(&e) {
        Some(invalid) => anyhow::Error::new(invalid.clone()),
        None => anyhow::Error::new(e).context("reading container header"),
    })?;
    info!(
        block_size = header.block_size,
        quantization_factor = header.quantization_factor,
        bins_to_keep = header.bins_to_keep,
        "read header successfully"
    );
    Ok(header)
}

/// Decode a container from `input` into raw samples on `output`.
pub fn decode<R: Read, W: Write, D: EntropyDecoder>(
    mut input: R,
    output: W,
    coder: D,
    total_hint: Option<u64>,
) -> anyhow::Result<DecodeSummary> {
    let header = read_header(&mut input)?;
    decode_payload(input, output, header, coder, total_hint)
}

/// Decode the payload that follows an already validated `header`.
fn decode_payload<R: Read, W: Write, D: EntropyDecoder>(
    input: R,
    mut output: W,
    header: ContainerHeader,
    coder: D,
    total_hint: Option<u64>,
) -> anyhow::Result<DecodeSummary> {
    let block_size = header.block_size as usize;
    let factor = header.quantization_factor;

    let dct = Dct::new(block_size).context("building transform")?;
    let mut stream = DecompressionStream::new(coder, input);
    let mut progress = Progress::new(Direction::Decoding, total_hint);

    let mut payload = vec![0u8; header.payload_bytes_per_block()];
    let mut quantized = vec![Complex::new(0i8, 0); header.bins_to_keep as usize];
    let mut coeffs = vec![Complex::new(0.0f32, 0.0); block_size];
    let mut samples = vec![Complex::new(0.0f32, 0.0); block_size];
    let mut raw = vec![0u8; header.sample_bytes_per_block()];

    let mut summary = DecodeSummary {
        header,
        blocks: 0,
        bytes_in: HEADER_SIZE as u64,
        bytes_out: 0,
        entropy_ratio: 0.0,
    };

    while stream.consume(&mut payload).context("decompressing payload")? {
        read_interleaved(&payload, &mut quantized);
        dequantize(&quantized, factor, &mut coeffs);
        dct.inverse(&coeffs, &mut samples);
        complex_to_bytes(&samples, &mut raw);
        output.write_all(&raw).context("writing decoded samples")?;

        summary.blocks += 1;
        summary.bytes_out += raw.len() as u64;
        progress.tick(Snapshot {
            processed: HEADER_SIZE as u64 + stream.input_byte_count(),
            produced: summary.bytes_out,
            trimming_ratio: header.trimming_ratio(),
            entropy_ratio: stream.ratio(),
        });
    }
    output.flush().context("flushing decoded samples")?;

    summary.bytes_in = HEADER_SIZE as u64 + stream.input_byte_count();
    summary.entropy_ratio = stream.ratio();
    info!(
        blocks = summary.blocks,
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        elapsed_ms = progress.elapsed().as_millis() as u64,
        "decode finished"
    );
    Ok(summary)
}

/// Decode the container at `input` into a raw sample file at `output`.
///
/// The header is validated before `output` is created, so a rejected
/// container leaves nothing behind.
pub fn decode_file<D: EntropyDecoder>(input: &Path, output: &Path, coder: D) -> anyhow::Result<DecodeSummary> {
    let src = File::open(input).with_context(|| format!("cannot read: {:?}", input))?;
    let total = src.metadata().ok().map(|m| m.len());
    let mut src = BufReader::new(src);
    let header = read_header(&mut src)?;

    let dst = File::create(output).with_context(|| format!("cannot write: {:?}", output))?;
    decode_payload(src, BufWriter::new(dst), header, coder, total)
}
