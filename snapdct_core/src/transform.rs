//! Orthonormal DCT-II / DCT-III over blocks of complex samples.
//!
//! Real and imaginary lanes are independent real signals, so every complex
//! coefficient is the pair of real DCTs of the two lanes. Both directions read
//! the same cosine table; the inverse walks it transposed.

use std::f32::consts::FRAC_1_SQRT_2;
use std::f64::consts::PI;

use num_complex::Complex;
use thiserror::Error;

/// The cosine table for a block size could not be allocated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("cosine table for block size {0} does not fit in memory")]
    TableTooLarge(usize),
}

/// `cos(π/N · (b + ½) · a)` for the table, evaluated in `f64` with the phase
/// reduced modulo a full turn before narrowing to `f32`.
///
/// `(2b + 1) · a` is an exact integer, so reducing it modulo `4N` keeps the
/// argument small even for N = 1024 where the naive `f32` product loses digits.
#[inline]
fn dct_cosine(n: usize, a: usize, b: usize) -> f32 {
    let phase = ((2 * b + 1) * a) % (4 * n);
    (PI * phase as f64 / (2 * n) as f64).cos() as f32
}

/// Orthonormal scale `sqrt(2/N)`.
#[inline]
fn dct_scale(n: usize) -> f32 {
    (2.0 / n as f32).sqrt()
}

// ── Cosine table ───────────────────────────────────────────────────────────

/// Precomputed `N × N` cosine table.
///
/// Flat row-major storage: `table[a * N + b] = cos(π/N · (b + ½) · a)`, where
/// `a` is the frequency index and `b` the sample index.
#[derive(Debug, Clone)]
pub struct CosineTable {
    size: usize,
    table: Vec<f32>,
}

impl CosineTable {
    pub fn new(size: usize) -> Result<Self, TransformError> {
        let len = size
            .checked_mul(size)
            .ok_or(TransformError::TableTooLarge(size))?;
        let mut table = Vec::new();
        table
            .try_reserve_exact(len)
            .map_err(|_| TransformError::TableTooLarge(size))?;
        for a in 0..size {
            for b in 0..size {
                table.push(dct_cosine(size, a, b));
            }
        }
        Ok(Self { size, table })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Row `a` of the table: the basis vector of frequency `a`.
    #[inline]
    pub fn row(&self, a: usize) -> &[f32] {
        &self.table[a * self.size..(a + 1) * self.size]
    }

    #[inline]
    pub fn get(&self, a: usize, b: usize) -> f32 {
        self.table[a * self.size + b]
    }
}

// ── Table-driven transform ─────────────────────────────────────────────────

/// Block DCT engine owning one [`CosineTable`].
///
/// The table costs `N²` cosine evaluations once; every block after that is
/// multiply-accumulate only.
#[derive(Debug, Clone)]
pub struct Dct {
    table: CosineTable,
    scale: f32,
}

impl Dct {
    /// Build an engine for blocks of `block_size` samples (`block_size ≥ 1`).
    pub fn new(block_size: usize) -> Result<Self, TransformError> {
        Ok(Self {
            table: CosineTable::new(block_size)?,
            scale: dct_scale(block_size),
        })
    }

    /// Rebuild the table for a new block size. No-op if the size is unchanged.
    /// On failure the engine keeps its current table.
    pub fn resize(&mut self, block_size: usize) -> Result<(), TransformError> {
        if block_size != self.table.size() {
            *self = Self::new(block_size)?;
        }
        Ok(())
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.table.size()
    }

    pub fn table(&self) -> &CosineTable {
        &self.table
    }

    /// Forward DCT-II. `input` and `output` must both hold `block_size` values.
    pub fn forward(&self, input: &[Complex<f32>], output: &mut [Complex<f32>]) {
        let n = self.block_size();
        debug_assert_eq!(input.len(), n);
        debug_assert_eq!(output.len(), n);

        for (a, out) in output.iter_mut().enumerate() {
            let mut sum = Complex::new(0.0f32, 0.0f32);
            for (x, &c) in input.iter().zip(self.table.row(a)) {
                sum += *x * c;
            }
            *out = sum * self.scale;
        }
        if let Some(dc) = output.first_mut() {
            *dc *= FRAC_1_SQRT_2;
        }
    }

    /// Inverse transform (DCT-III), the exact inverse of [`forward`](Self::forward).
    pub fn inverse(&self, input: &[Complex<f32>], output: &mut [Complex<f32>]) {
        let n = self.block_size();
        debug_assert_eq!(input.len(), n);
        debug_assert_eq!(output.len(), n);

        for (a, out) in output.iter_mut().enumerate() {
            let mut sum = input[0] * FRAC_1_SQRT_2;
            for (b, x) in input.iter().enumerate().skip(1) {
                sum += *x * self.table.get(b, a);
            }
            *out = sum * self.scale;
        }
    }
}

// ── Direct (reference) transform ───────────────────────────────────────────

/// `cos(π/N · (b + ½) · a)` straight from the definition, in `f32`.
#[inline]
fn naive_cosine(n: usize, a: usize, b: usize) -> f32 {
    (std::f32::consts::PI / n as f32 * (b as f32 + 0.5) * a as f32).cos()
}

/// Forward DCT recomputing every cosine from the textbook `f32` formula.
/// O(N²) transcendental calls; the reference the table-driven engine is
/// checked against.
pub fn forward_direct(input: &[Complex<f32>], output: &mut [Complex<f32>]) {
    let n = input.len();
    let scale = dct_scale(n);
    for (a, out) in output.iter_mut().enumerate().take(n) {
        let mut sum = Complex::new(0.0f32, 0.0f32);
        for (b, x) in input.iter().enumerate() {
            sum += *x * naive_cosine(n, a, b);
        }
        *out = sum * scale;
    }
    if n > 0 {
        output[0] *= FRAC_1_SQRT_2;
    }
}

/// Inverse DCT recomputing every cosine.
pub fn inverse_direct(input: &[Complex<f32>], output: &mut [Complex<f32>]) {
    let n = input.len();
    if n == 0 {
        return;
    }
    let scale = dct_scale(n);
    for (a, out) in output.iter_mut().enumerate().take(n) {
        let mut sum = input[0] * FRAC_1_SQRT_2;
        for (b, x) in input.iter().enumerate().skip(1) {
            sum += *x * naive_cosine(n, b, a);
        }
        *out = sum * scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<Complex<f32>> {
        (0..n)
            .map(|i| {
                let t = i as f32;
                Complex::new((t * 0.37).sin() * 100.0, (t * 0.11).cos() * -60.0 + 3.0)
            })
            .collect()
    }

    fn max_diff(a: &[Complex<f32>], b: &[Complex<f32>]) -> f32 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (*x - *y).norm())
            .fold(0.0, f32::max)
    }

    #[test]
    fn table_matches_direct_for_all_sizes() {
        for &n in &[2usize, 8, 64, 1024] {
            let dct = Dct::new(n).unwrap();
            let input = ramp(n);

            let mut table_out = vec![Complex::default(); n];
            let mut direct_out = vec![Complex::default(); n];
            dct.forward(&input, &mut table_out);
            forward_direct(&input, &mut direct_out);
            // the reference rounds its phase in f32, so allow a few ulps per term
            let tolerance = 1e-3 * (n as f32).sqrt() * 100.0;
            assert!(
                max_diff(&table_out, &direct_out) <= tolerance,
                "forward mismatch for N={n}"
            );

            let mut table_back = vec![Complex::default(); n];
            let mut direct_back = vec![Complex::default(); n];
            dct.inverse(&table_out, &mut table_back);
            inverse_direct(&direct_out, &mut direct_back);
            assert!(
                max_diff(&table_back, &direct_back) <= tolerance,
                "inverse mismatch for N={n}"
            );
        }
    }

    #[test]
    fn inverse_undoes_forward() {
        for &n in &[1usize, 2, 8, 64] {
            let dct = Dct::new(n).unwrap();
            let input = ramp(n);
            let mut coeffs = vec![Complex::default(); n];
            let mut back = vec![Complex::default(); n];
            dct.forward(&input, &mut coeffs);
            dct.inverse(&coeffs, &mut back);
            assert!(max_diff(&input, &back) < 1e-2, "round trip drift for N={n}");
        }
    }

    #[test]
    fn constant_block_concentrates_in_dc() {
        let dct = Dct::new(8).unwrap();
        let input = vec![Complex::new(20.0f32, -5.0); 8];
        let mut coeffs = vec![Complex::default(); 8];
        dct.forward(&input, &mut coeffs);

        // orthonormal DC = sum / sqrt(N)
        assert!((coeffs[0].re - 160.0 / 8f32.sqrt()).abs() < 1e-3);
        assert!((coeffs[0].im + 40.0 / 8f32.sqrt()).abs() < 1e-3);
        for c in &coeffs[1..] {
            assert!(c.norm() < 1e-3);
        }
    }

    #[test]
    fn zero_block_stays_zero() {
        let dct = Dct::new(8).unwrap();
        let input = vec![Complex::new(0.0f32, 0.0); 8];
        let mut coeffs = vec![Complex::new(1.0f32, 1.0); 8];
        dct.forward(&input, &mut coeffs);
        assert!(coeffs.iter().all(|c| c.re == 0.0 && c.im == 0.0));
    }

    #[test]
    fn resize_rebuilds_only_on_change() {
        let mut dct = Dct::new(8).unwrap();
        assert_eq!(dct.table().size(), 8);
        dct.resize(8).unwrap();
        assert_eq!(dct.block_size(), 8);
        dct.resize(16).unwrap();
        assert_eq!(dct.block_size(), 16);
        assert_eq!(dct.table().row(3).len(), 16);
        assert!((dct.table().get(0, 5) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn oversized_table_is_an_error_not_a_panic() {
        let huge = usize::MAX / 2;
        assert_eq!(Dct::new(huge).unwrap_err(), TransformError::TableTooLarge(huge));

        let mut dct = Dct::new(8).unwrap();
        assert!(dct.resize(huge).is_err());
        assert_eq!(dct.block_size(), 8);
    }

    #[test]
    fn naive_cosine_agrees_with_table() {
        // f32 phase rounding dominates near the largest arguments
        let n = 1024;
        let table = CosineTable::new(n).unwrap();
        let worst = (0..n)
            .flat_map(|a| (0..n).map(move |b| (a, b)))
            .map(|(a, b)| (table.get(a, b) - naive_cosine(n, a, b)).abs())
            .fold(0.0f32, f32::max);
        assert!(worst < 2e-3, "worst cosine deviation {worst}");
    }
}
