//! Numeric comparison of two raw sample recordings, typically an original
//! capture and its decoded reconstruction.

use std::f64::consts::PI;

use crate::sample::{Sample, SAMPLE_BYTES};

/// Samples per navigation segment when nothing else is configured.
pub const DEFAULT_SEGMENT_SAMPLES: u64 = 32 * 1024;

/// Error metrics of `test` against `reference` over their common prefix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonReport {
    /// Samples compared.
    pub samples: u64,
    /// Largest per-component difference.
    pub max_abs_error: u32,
    /// Root mean square of the complex error magnitude.
    pub rmse: f64,
    /// Reference power over error power in dB. `+inf` for identical inputs.
    pub snr_db: f64,
    /// Mean absolute phase difference in radians over samples where both
    /// sides are non-zero.
    pub mean_phase_error_rad: f64,
}

pub fn compare(reference: &[Sample], test: &[Sample]) -> ComparisonReport {
    let mut max_abs_error = 0u32;
    let mut signal = 0f64;
    let mut noise = 0f64;
    let mut phase_sum = 0f64;
    let mut phase_count = 0u64;

    for (r, t) in reference.iter().zip(test) {
        let dre = t.re as i32 - r.re as i32;
        let dim = t.im as i32 - r.im as i32;
        max_abs_error = max_abs_error.max(dre.unsigned_abs()).max(dim.unsigned_abs());

        let (rre, rim) = (r.re as f64, r.im as f64);
        let (tre, tim) = (t.re as f64, t.im as f64);
        signal += rre * rre + rim * rim;
        noise += (dre * dre + dim * dim) as f64;

        if (r.re, r.im) != (0, 0) && (t.re, t.im) != (0, 0) {
            phase_sum += wrap_phase(tim.atan2(tre) - rim.atan2(rre)).abs();
            phase_count += 1;
        }
    }

    let samples = reference.len().min(test.len()) as u64;
    let rmse = if samples == 0 {
        0.0
    } else {
        (noise / samples as f64).sqrt()
    };
    let snr_db = if noise == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (signal / noise).log10()
    };
    let mean_phase_error_rad = if phase_count == 0 {
        0.0
    } else {
        phase_sum / phase_count as f64
    };

    ComparisonReport {
        samples,
        max_abs_error,
        rmse,
        snr_db,
        mean_phase_error_rad,
    }
}

/// Wrap an angle into `[-π, π]`.
fn wrap_phase(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

// ── Navigation state ───────────────────────────────────────────────────────

/// Input events understood by the segment navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    NextSegment,
    PreviousSegment,
    /// Swap which recording is treated as the reference.
    SwapOrder,
}

impl ViewEvent {
    /// Map a key character: `>`/`n` next, `<`/`p` previous, `s` swap.
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            '>' | 'n' => Some(Self::NextSegment),
            '<' | 'p' => Some(Self::PreviousSegment),
            's' => Some(Self::SwapOrder),
            _ => None,
        }
    }
}

/// Which segment of the two recordings is being looked at and in which order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewState {
    pub segment: u64,
    /// `true` when the second recording is the reference.
    pub swapped: bool,
}

impl ViewState {
    /// Pure transition: the state after `event`.
    pub fn apply(self, event: ViewEvent) -> Self {
        match event {
            ViewEvent::NextSegment => Self {
                segment: self.segment.saturating_add(1),
                ..self
            },
            ViewEvent::PreviousSegment => Self {
                segment: self.segment.saturating_sub(1),
                ..self
            },
            ViewEvent::SwapOrder => Self {
                swapped: !self.swapped,
                ..self
            },
        }
    }

    /// Byte offset of the current segment in a raw sample file.
    pub fn byte_offset(&self, segment_samples: u64) -> u64 {
        self.segment * segment_samples * SAMPLE_BYTES as u64
    }

    /// Order a pair of recordings as `(reference, test)`.
    pub fn order<'a, T: ?Sized>(&self, first: &'a T, second: &'a T) -> (&'a T, &'a T) {
        if self.swapped {
            (second, first)
        } else {
            (first, second)
        }
    }
}
