use std::time::{Duration, Instant};

use tracing::info;

/// Minimum spacing between two progress lines.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

const MB: f64 = 1_000_000.0;

/// Which direction a [`Progress`] tracker is reporting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encoding,
    Decoding,
}

/// Counters sampled at one report.
#[derive(Debug, Clone, Copy, Default)]
pub struct Snapshot {
    /// Bytes of the known-size side consumed so far (raw input when encoding,
    /// compressed input when decoding).
    pub processed: u64,
    /// Bytes written on the other side.
    pub produced: u64,
    /// `bins_to_keep / block_size`.
    pub trimming_ratio: f64,
    /// Entropy-coder ratio, compressed over uncompressed.
    pub entropy_ratio: f64,
}

impl Snapshot {
    /// Overall size ratio from trimming and entropy coding together.
    pub fn overall_ratio(&self) -> f64 {
        self.trimming_ratio * self.entropy_ratio
    }
}

/// Rate in bytes per second and remaining seconds, given `processed` out of
/// an optional `total` after `elapsed`.
pub fn rate_and_eta(processed: u64, total: Option<u64>, elapsed: Duration) -> (f64, Option<f64>) {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return (0.0, None);
    }
    let rate = processed as f64 / secs;
    let eta = match total {
        Some(total) if rate > 0.0 => Some(total.saturating_sub(processed) as f64 / rate),
        _ => None,
    };
    (rate, eta)
}

/// Throttled throughput reporter. Purely observational: it never influences
/// the pipeline, it only logs.
pub struct Progress {
    direction: Direction,
    total: Option<u64>,
    start: Instant,
    last_report: Instant,
}

impl Progress {
    pub fn new(direction: Direction, total: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            direction,
            total,
            start: now,
            last_report: now,
        }
    }

    /// Log a progress line if at least [`REPORT_INTERVAL`] passed since the
    /// last one. Returns whether a line was emitted.
    pub fn tick(&mut self, snapshot: Snapshot) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_report) < REPORT_INTERVAL {
            return false;
        }
        self.last_report = now;
        self.report(snapshot, now.duration_since(self.start));
        true
    }

    fn report(&self, s: Snapshot, elapsed: Duration) {
        let (rate, eta) = rate_and_eta(s.processed, self.total, elapsed);
        let total_mb = self.total.map(|t| t as f64 / MB).unwrap_or(f64::NAN);
        let eta = eta.map(|e| format!("{e:.0} s")).unwrap_or_else(|| "unknown".into());
        let produced = match self.direction {
            Direction::Encoding => "compressed size",
            Direction::Decoding => "decompressed size",
        };
        info!(
            "{:?}: {:.1} / {:.1} MB processed, {}: {:.1} MB, ratio: {:.2}% ({:.2}% trimming, {:.2}% entropy), rate = {:.2} MB/s, eta: {}",
            self.direction,
            s.processed as f64 / MB,
            total_mb,
            produced,
            s.produced as f64 / MB,
            s.overall_ratio() * 100.0,
            s.trimming_ratio * 100.0,
            s.entropy_ratio * 100.0,
            rate / MB,
            eta,
        );
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Format a byte count with binary units, e.g. `1.50 MB`.
pub fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_and_eta_from_known_total() {
        let (rate, eta) = rate_and_eta(2_000_000, Some(10_000_000), Duration::from_secs(2));
        assert_eq!(rate, 1_000_000.0);
        assert_eq!(eta, Some(8.0));
    }

    #[test]
    fn unknown_total_has_no_eta() {
        let (rate, eta) = rate_and_eta(500, None, Duration::from_millis(500));
        assert_eq!(rate, 1000.0);
        assert_eq!(eta, None);
        assert_eq!(rate_and_eta(10, Some(20), Duration::ZERO), (0.0, None));
    }

    #[test]
    fn first_tick_is_throttled() {
        let mut progress = Progress::new(Direction::Encoding, Some(100));
        assert!(!progress.tick(Snapshot::default()));
    }

    #[test]
    fn overall_ratio_multiplies() {
        let s = Snapshot {
            trimming_ratio: 0.25,
            entropy_ratio: 0.5,
            ..Snapshot::default()
        };
        assert_eq!(s.overall_ratio(), 0.125);
    }

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1536), "1.50 KB");
        assert_eq!(human_bytes(3 * 1024 * 1024), "3.00 MB");
    }
}
