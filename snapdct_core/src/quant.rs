//! Per-bin scaling to signed 8-bit with high-frequency trimming.

use num_complex::Complex;

/// Largest magnitude a quantized component may take.
pub const QUANT_LIMIT: f32 = 127.0;

/// Which half of a complex coefficient saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Real,
    Imag,
}

/// One component whose scaled value did not fit in `[-127, 127]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Saturation {
    pub bin: usize,
    pub lane: Lane,
    /// `|coefficient · factor|` before clamping.
    pub magnitude: f32,
    /// Largest factor that would have kept this component in range.
    pub suggested_factor: f32,
}

/// Scale, round and clamp one component. Returns the stored value and, when
/// the scaled magnitude exceeds the limit, the magnitude for the diagnostic.
#[inline]
fn quantize_component(value: f32, factor: f32) -> (i8, Option<f32>) {
    let scaled = value * factor;
    let overflow = (scaled.abs() > QUANT_LIMIT).then(|| scaled.abs());
    let stored = scaled.round().clamp(-QUANT_LIMIT, QUANT_LIMIT) as i8;
    (stored, overflow)
}

/// Quantize the first `out.len()` bins of `coeffs` with a single `factor`.
///
/// Components outside the signed 8-bit range are clamped to ±127 and reported;
/// the caller decides how loudly to complain.
pub fn quantize(coeffs: &[Complex<f32>], factor: f32, out: &mut [Complex<i8>]) -> Vec<Saturation> {
    debug_assert!(out.len() <= coeffs.len());
    let mut saturated = Vec::new();

    for (bin, (c, q)) in coeffs.iter().zip(out.iter_mut()).enumerate() {
        let (re, re_overflow) = quantize_component(c.re, factor);
        let (im, im_overflow) = quantize_component(c.im, factor);
        *q = Complex::new(re, im);

        for (lane, magnitude) in [(Lane::Real, re_overflow), (Lane::Imag, im_overflow)] {
            if let Some(magnitude) = magnitude {
                saturated.push(Saturation {
                    bin,
                    lane,
                    magnitude,
                    suggested_factor: factor * QUANT_LIMIT / magnitude,
                });
            }
        }
    }

    saturated
}

/// Undo the scaling for the kept bins and zero every trimmed bin.
pub fn dequantize(quantized: &[Complex<i8>], factor: f32, out: &mut [Complex<f32>]) {
    debug_assert!(quantized.len() <= out.len());
    let (kept, trimmed) = out.split_at_mut(quantized.len());
    for (q, c) in quantized.iter().zip(kept) {
        *c = Complex::new(q.re as f32 / factor, q.im as f32 / factor);
    }
    trimmed.fill(Complex::new(0.0, 0.0));
}

/// Append the quantized bins as interleaved `re, im` signed bytes.
pub fn write_interleaved(quantized: &[Complex<i8>], dst: &mut Vec<u8>) {
    dst.reserve(quantized.len() * 2);
    for q in quantized {
        dst.push(q.re as u8);
        dst.push(q.im as u8);
    }
}

/// Parse interleaved `re, im` signed bytes into `out`. `src` must hold
/// exactly `2 * out.len()` bytes.
pub fn read_interleaved(src: &[u8], out: &mut [Complex<i8>]) {
    debug_assert_eq!(src.len(), out.len() * 2);
    for (pair, q) in src.chunks_exact(2).zip(out.iter_mut()) {
        *q = Complex::new(pair[0] as i8, pair[1] as i8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_nearest_and_trims() {
        let coeffs = [
            Complex::new(10.4f32, -10.6),
            Complex::new(2.5, -2.5),
            Complex::new(99.0, 99.0),
        ];
        let mut out = [Complex::new(0i8, 0); 2];
        let saturated = quantize(&coeffs, 1.0, &mut out);
        assert!(saturated.is_empty());
        assert_eq!(out[0], Complex::new(10, -11));
        // half rounds away from zero
        assert_eq!(out[1], Complex::new(3, -3));
    }

    #[test]
    fn saturation_clamps_and_suggests_factor() {
        let coeffs = [Complex::new(300.0f32, -20.0), Complex::new(1.0, -508.0)];
        let mut out = [Complex::new(0i8, 0); 2];
        let saturated = quantize(&coeffs, 0.5, &mut out);

        assert_eq!(out[0], Complex::new(127, -10));
        assert_eq!(out[1], Complex::new(1, -127));
        assert_eq!(saturated.len(), 2);

        assert_eq!(saturated[0].bin, 0);
        assert_eq!(saturated[0].lane, Lane::Real);
        assert!((saturated[0].magnitude - 150.0).abs() < 1e-4);
        // 0.5 * 127 / 150
        assert!((saturated[0].suggested_factor - 0.423_333).abs() < 1e-4);

        assert_eq!(saturated[1].bin, 1);
        assert_eq!(saturated[1].lane, Lane::Imag);
        assert!((saturated[1].suggested_factor - 0.25).abs() < 1e-4);
    }

    #[test]
    fn exactly_127_is_not_saturation() {
        let mut out = [Complex::new(0i8, 0); 1];
        let saturated = quantize(&[Complex::new(127.0f32, -127.0)], 1.0, &mut out);
        assert!(saturated.is_empty());
        assert_eq!(out[0], Complex::new(127, -127));
    }

    #[test]
    fn dequantize_zero_fills_trimmed_bins() {
        let q = [Complex::new(8i8, -4), Complex::new(2, 0)];
        let mut out = vec![Complex::new(9.0f32, 9.0); 5];
        dequantize(&q, 0.5, &mut out);
        assert_eq!(out[0], Complex::new(16.0, -8.0));
        assert_eq!(out[1], Complex::new(4.0, 0.0));
        assert!(out[2..].iter().all(|c| *c == Complex::new(0.0, 0.0)));
    }

    #[test]
    fn interleaved_layout_is_re_then_im() {
        let q = [Complex::new(-1i8, 2), Complex::new(127, -127)];
        let mut bytes = Vec::new();
        write_interleaved(&q, &mut bytes);
        assert_eq!(bytes, vec![0xFF, 0x02, 0x7F, 0x81]);

        let mut back = [Complex::new(0i8, 0); 2];
        read_interleaved(&bytes, &mut back);
        assert_eq!(back, q);
    }
}
