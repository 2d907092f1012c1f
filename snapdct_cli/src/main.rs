use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use snapdct_codecs::{ZstdDecoder, ZstdEncoder, DEFAULT_ZSTD_LEVEL};
use snapdct_core::capture::convert_file;
use snapdct_core::compare::{compare, ViewEvent, ViewState, DEFAULT_SEGMENT_SAMPLES};
use snapdct_core::pipeline::{container_path, read_header};
use snapdct_core::progress::human_bytes;
use snapdct_core::sample::{parse_samples, SAMPLE_BYTES};
use snapdct_core::{decode_file, encode_file, EncodeParams, HEADER_SIZE};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "snapdct",
    about = "Lossy archival of complex 8-bit radio recordings: DCT, quantize, trim, zstd",
    version
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a raw interleaved i8 I/Q recording into <input>.rqdct
    Encode {
        /// Raw sample file
        input: PathBuf,
        /// Samples per transform block
        block_size: u32,
        /// Quantization factor in percent (100 = coefficients stored as-is)
        quantization_percent: f32,
        /// Percentage of low-frequency bins kept per block
        cutoff_freq_percent: f32,
        /// Container path (default: <input>.rqdct)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Zstd compression level (1–22)
        #[arg(long, default_value_t = DEFAULT_ZSTD_LEVEL)]
        level: i32,
    },
    /// Decode a container back to raw i8 I/Q samples
    Decode {
        /// Container file
        input: PathBuf,
        /// Destination raw sample file
        output: PathBuf,
    },
    /// Print the container header without decoding the payload
    Inspect {
        /// Container file
        file: PathBuf,
    },
    /// Convert a 32-bit capture file to raw i8 I/Q, normalised to its peak
    Convert {
        /// Capture file (metadata header followed by i32 I/Q pairs)
        capture: PathBuf,
        /// Destination raw sample file
        output: PathBuf,
    },
    /// Compare two raw sample files, e.g. an original and its reconstruction
    Compare {
        /// Reference recording
        a: PathBuf,
        /// Recording under test
        b: PathBuf,
        /// Samples per navigation segment
        #[arg(long, default_value_t = DEFAULT_SEGMENT_SAMPLES)]
        segment_samples: u64,
        /// Navigation keys applied in order: '>'/'n' next, '<'/'p' previous, 's' swap
        #[arg(long, default_value = "")]
        keys: String,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn throughput(bytes: u64, secs: f64) -> String {
    human_bytes((bytes as f64 / secs.max(1e-9)) as u64)
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_encode(
    input: PathBuf,
    block_size: u32,
    quantization_percent: f32,
    cutoff_percent: f32,
    output: Option<PathBuf>,
    level: i32,
) -> anyhow::Result<()> {
    let params = EncodeParams::from_percentages(block_size, quantization_percent, cutoff_percent)
        .context("invalid encoder parameters")?;
    let output = output.unwrap_or_else(|| container_path(&input));
    let coder = ZstdEncoder::new(level).context("configuring zstd")?;

    let t0 = Instant::now();
    let summary = encode_file(&input, &output, &params, coder)?;
    let elapsed = t0.elapsed().as_secs_f64();

    eprintln!("  output      : {:?}", output);
    eprintln!("  block size  : {} samples", params.block_size());
    eprintln!("  bins kept   : {}", params.bins_to_keep());
    eprintln!("  quantization: {:.3}", params.quantization_factor());
    eprintln!("  blocks      : {}", summary.blocks);
    eprintln!("  raw size    : {}", human_bytes(summary.bytes_in));
    eprintln!("  compressed  : {}", human_bytes(summary.bytes_out));
    eprintln!("  ratio       : {:.2}%", summary.ratio() * 100.0);
    eprintln!(
        "  trimming    : {:.2}%  entropy: {:.2}%",
        params.header().trimming_ratio() * 100.0,
        summary.entropy_ratio * 100.0
    );
    if summary.dropped_bytes > 0 {
        eprintln!("  dropped     : {} (incomplete trailing block)", human_bytes(summary.dropped_bytes));
    }
    if let Some(factor) = summary.suggested_factor {
        eprintln!(
            "  saturated   : {} values, try quantization {:.3}%",
            summary.saturated,
            factor * 100.0
        );
    }
    eprintln!("  throughput  : {}/s", throughput(summary.bytes_in, elapsed));
    eprintln!("  elapsed     : {:.3}s", elapsed);
    Ok(())
}

fn run_decode(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let coder = ZstdDecoder::new().context("configuring zstd")?;
    let t0 = Instant::now();
    let summary = decode_file(&input, &output, coder)?;
    let elapsed = t0.elapsed().as_secs_f64();

    eprintln!("  block size  : {} samples", summary.header.block_size);
    eprintln!("  bins kept   : {}", summary.header.bins_to_keep);
    eprintln!("  blocks      : {}", summary.blocks);
    eprintln!("  compressed  : {}", human_bytes(summary.bytes_in));
    eprintln!("  raw size    : {}", human_bytes(summary.bytes_out));
    eprintln!("  throughput  : {}/s", throughput(summary.bytes_out, elapsed));
    eprintln!("  elapsed     : {:.3}s", elapsed);
    Ok(())
}

fn run_inspect(file: PathBuf) -> anyhow::Result<()> {
    let mut src = File::open(&file).with_context(|| format!("cannot read: {:?}", file))?;
    let header = read_header(&mut src)?;
    let file_size = src.metadata()?.len();
    let payload = file_size.saturating_sub(HEADER_SIZE as u64);

    println!("=== rqdct file: {:?} ===", file);
    println!();
    println!("  block size     : {} samples", header.block_size);
    println!("  quantization   : {} ({:.3}%)", header.quantization_factor, header.quantization_factor * 100.0);
    println!("  bins kept      : {}", header.bins_to_keep);
    println!("  trimming ratio : {:.2}%", header.trimming_ratio() * 100.0);
    println!("  block payload  : {} before entropy coding", human_bytes(header.payload_bytes_per_block() as u64));
    println!("  block raw size : {}", human_bytes(header.sample_bytes_per_block() as u64));
    println!("  payload        : {}", human_bytes(payload));
    println!("  file on disk   : {}", human_bytes(file_size));
    Ok(())
}

fn run_convert(capture: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let t0 = Instant::now();
    let summary = convert_file(&capture, &output)?;
    eprintln!("  sample rate : {} Hz", summary.header.sample_rate);
    eprintln!("  centre freq : {} Hz", summary.header.centre_freq_hz);
    eprintln!("  timestamp   : {}", summary.header.timestamp);
    eprintln!("  samples     : {}", summary.samples);
    eprintln!("  peak        : {}", summary.peak);
    eprintln!("  raw size    : {}", human_bytes(summary.samples * SAMPLE_BYTES as u64));
    eprintln!("  elapsed     : {:.3}s", t0.elapsed().as_secs_f64());
    Ok(())
}

fn run_compare(a: PathBuf, b: PathBuf, segment_samples: u64, keys: &str) -> anyhow::Result<()> {
    let first = parse_samples(&fs::read(&a).with_context(|| format!("cannot read: {:?}", a))?);
    let second = parse_samples(&fs::read(&b).with_context(|| format!("cannot read: {:?}", b))?);
    if first.len() != second.len() {
        tracing::warn!(
            a = first.len(),
            b = second.len(),
            "recordings differ in length, comparing the common prefix"
        );
    }

    let mut view = ViewState::default();
    for key in keys.chars() {
        match ViewEvent::from_key(key) {
            Some(event) => view = view.apply(event),
            None => anyhow::bail!("unknown navigation key '{}'. Valid keys: > n < p s", key),
        }
    }
    let (reference, test) = view.order(first.as_slice(), second.as_slice());

    let overall = compare(reference, test);
    println!("=== {:?} vs {:?} ===", a, b);
    println!();
    println!("  samples        : {}", overall.samples);
    println!("  max abs error  : {}", overall.max_abs_error);
    println!("  rmse           : {:.4}", overall.rmse);
    println!("  snr            : {:.2} dB", overall.snr_db);
    println!("  phase error    : {:.4} rad", overall.mean_phase_error_rad);

    if !keys.is_empty() {
        let start = (view.segment.saturating_mul(segment_samples)).min(overall.samples) as usize;
        let end = (start as u64 + segment_samples).min(overall.samples) as usize;
        let segment = compare(&reference[start..end], &test[start..end]);
        println!();
        println!(
            "  segment {} (byte offset {}{})",
            view.segment,
            view.byte_offset(segment_samples),
            if view.swapped { ", order swapped" } else { "" }
        );
        println!("    samples      : {}", segment.samples);
        println!("    max abs error: {}", segment.max_abs_error);
        println!("    rmse         : {:.4}", segment.rmse);
        println!("    snr          : {:.2} dB", segment.snr_db);
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };
    init_logging(cli.verbose);

    match cli.command {
        Commands::Encode {
            input,
            block_size,
            quantization_percent,
            cutoff_freq_percent,
            output,
            level,
        } => run_encode(input, block_size, quantization_percent, cutoff_freq_percent, output, level),
        Commands::Decode { input, output } => run_decode(input, output),
        Commands::Inspect { file } => run_inspect(file),
        Commands::Convert { capture, output } => run_convert(capture, output),
        Commands::Compare {
            a,
            b,
            segment_samples,
            keys,
        } => run_compare(a, b, segment_samples, &keys),
    }
}
