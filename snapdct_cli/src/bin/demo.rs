//! snapdct demo
//!
//! Synthesises a deterministic narrowband IQ recording (a few tones over a
//! low noise floor), encodes it at a sweep of cutoff percentages and reports
//! what each setting costs in size and what it keeps in fidelity.

use std::f32::consts::TAU;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use num_complex::Complex;

use snapdct_codecs::{ZstdDecoder, ZstdEncoder, DEFAULT_ZSTD_LEVEL};
use snapdct_core::compare::compare;
use snapdct_core::progress::human_bytes;
use snapdct_core::sample::{parse_samples, samples_to_bytes, Sample};
use snapdct_core::{decode_file, encode_file, EncodeParams};

// ── constants ──────────────────────────────────────────────────────────────

const SAMPLES: usize = 1 << 20;
const BLOCK_SIZE: u32 = 1024;
const QUANTIZATION_PERCENT: f32 = 10.0;
const CUTOFFS: &[f32] = &[100.0, 50.0, 25.0, 12.5, 6.25];

/// (amplitude, cycles per sample). All tones sit in the lowest ~5% of the band.
const TONES: &[(f32, f32)] = &[(45.0, 0.0021), (25.0, -0.0107), (12.0, 0.0240)];
const NOISE_AMPLITUDE: f32 = 2.0;

// ── data generator ──────────────────────────────────────────────────────────

/// Same seed, same recording, so runs are comparable.
fn synthesize(len: usize, seed: u64) -> Vec<Sample> {
    let mut rng = seed;
    let mut noise = move || {
        rng = rng
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((rng >> 40) as f32 / (1u64 << 24) as f32 - 0.5) * 2.0 * NOISE_AMPLITUDE
    };

    (0..len)
        .map(|n| {
            let mut acc = Complex::new(0.0f32, 0.0);
            for &(amp, freq) in TONES {
                acc += Complex::from_polar(amp, TAU * freq * n as f32);
            }
            acc += Complex::new(noise(), noise());
            Sample::new(
                acc.re.round().clamp(-127.0, 127.0) as i8,
                acc.im.round().clamp(-127.0, 127.0) as i8,
            )
        })
        .collect()
}

// ── timing ──────────────────────────────────────────────────────────────────

fn fmt_duration(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms < 1000.0 {
        format!("{ms:.1} ms")
    } else {
        format!("{:.2} s", d.as_secs_f64())
    }
}

fn section(title: &str) {
    println!();
    println!("── {title} {}", "─".repeat(70usize.saturating_sub(title.len())));
    println!();
}

// ── sweep ───────────────────────────────────────────────────────────────────

struct Row {
    cutoff: f32,
    container: u64,
    encode: Duration,
    decode: Duration,
    rmse: f64,
    snr_db: f64,
    saturated: u64,
}

fn run_setting(dir: &Path, raw_path: &Path, original: &[Sample], cutoff: f32) -> Result<Row> {
    let params = EncodeParams::from_percentages(BLOCK_SIZE, QUANTIZATION_PERCENT, cutoff)?;
    let container = dir.join(format!("tones.{cutoff}.rqdct"));
    let decoded = dir.join(format!("tones.{cutoff}.decoded"));

    let t0 = Instant::now();
    let enc = encode_file(raw_path, &container, &params, ZstdEncoder::new(DEFAULT_ZSTD_LEVEL)?)?;
    let encode = t0.elapsed();

    let t0 = Instant::now();
    decode_file(&container, &decoded, ZstdDecoder::new()?)?;
    let decode = t0.elapsed();

    let report = compare(original, &parse_samples(&fs::read(&decoded)?));
    Ok(Row {
        cutoff,
        container: enc.bytes_out,
        encode,
        decode,
        rmse: report.rmse,
        snr_db: report.snr_db,
        saturated: enc.saturated,
    })
}

fn run() -> Result<()> {
    let out_dir = std::env::temp_dir().join("snapdct_demo");
    fs::create_dir_all(&out_dir)?;
    let raw_path = out_dir.join("tones.8t");

    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║        snapdct · DCT + quantize + zstd for IQ recordings         ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");

    section("0 · SIGNAL");
    let original = synthesize(SAMPLES, 7);
    let raw = samples_to_bytes(&original);
    fs::write(&raw_path, &raw)?;
    println!("  samples        : {}", SAMPLES);
    println!("  raw size       : {}", human_bytes(raw.len() as u64));
    println!("  tones          : {}", TONES.len());
    println!("  block size     : {} samples", BLOCK_SIZE);
    println!("  quantization   : {:.1}%", QUANTIZATION_PERCENT);

    section("1 · CUTOFF SWEEP");
    println!(
        "  {:>7}  {:>12}  {:>8}  {:>9}  {:>9}  {:>8}  {:>9}",
        "cutoff", "container", "ratio", "encode", "decode", "rmse", "snr"
    );
    println!("  {}", "─".repeat(76));

    let mut rows = Vec::with_capacity(CUTOFFS.len());
    for &cutoff in CUTOFFS {
        let row = run_setting(&out_dir, &raw_path, &original, cutoff)?;
        println!(
            "  {:>6}%  {:>12}  {:>7.2}%  {:>9}  {:>9}  {:>8.3}  {:>6.2} dB",
            row.cutoff,
            human_bytes(row.container),
            row.container as f64 / raw.len() as f64 * 100.0,
            fmt_duration(row.encode),
            fmt_duration(row.decode),
            row.rmse,
            row.snr_db
        );
        rows.push(row);
    }

    let clamped: u64 = rows.iter().map(|r| r.saturated).sum();
    if clamped > 0 {
        println!();
        println!("  note: {clamped} coefficients were clamped to ±127 across the sweep");
    }

    section("2 · TAKEAWAY");
    if let (Some(full), Some(tight)) = (rows.first(), rows.last()) {
        println!(
            "  keeping {}% of bins costs {:.2} dB of SNR and saves {:.1}x over keeping all of them",
            tight.cutoff,
            full.snr_db - tight.snr_db,
            full.container as f64 / tight.container.max(1) as f64
        );
    }
    println!("  scratch files  : {:?}", out_dir);
    println!();
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .with_writer(std::io::stderr)
        .init();
    if let Err(e) = run() {
        eprintln!("demo failed: {e:#}");
        std::process::exit(1);
    }
}
