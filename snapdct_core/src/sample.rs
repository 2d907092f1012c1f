//! Raw sample layout: interleaved signed 8-bit `I, Q` pairs with no header.

use std::io::{self, Read};

use num_complex::Complex;

/// One complex sample as stored on disk.
pub type Sample = Complex<i8>;

/// Bytes per sample on disk.
pub const SAMPLE_BYTES: usize = 2;

/// Read until `buf` is full or the source is exhausted.
///
/// Returns the number of bytes placed in `buf`; anything short of `buf.len()`
/// means end of input was reached.
pub fn read_full<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Widen raw interleaved bytes to complex floats for the transform.
pub fn bytes_to_complex(src: &[u8], out: &mut [Complex<f32>]) {
    debug_assert_eq!(src.len(), out.len() * SAMPLE_BYTES);
    for (pair, c) in src.chunks_exact(SAMPLE_BYTES).zip(out.iter_mut()) {
        *c = Complex::new(pair[0] as i8 as f32, pair[1] as i8 as f32);
    }
}

/// Round reconstructed values to the nearest integer and narrow to signed
/// 8-bit, saturating at the type bounds.
pub fn complex_to_bytes(src: &[Complex<f32>], out: &mut [u8]) {
    debug_assert_eq!(out.len(), src.len() * SAMPLE_BYTES);
    for (c, pair) in src.iter().zip(out.chunks_exact_mut(SAMPLE_BYTES)) {
        pair[0] = narrow(c.re) as u8;
        pair[1] = narrow(c.im) as u8;
    }
}

#[inline]
fn narrow(value: f32) -> i8 {
    value.round().clamp(i8::MIN as f32, i8::MAX as f32) as i8
}

/// Decode raw bytes into samples. A trailing odd byte is ignored.
pub fn parse_samples(src: &[u8]) -> Vec<Sample> {
    src.chunks_exact(SAMPLE_BYTES)
        .map(|pair| Complex::new(pair[0] as i8, pair[1] as i8))
        .collect()
}

/// Encode samples as interleaved raw bytes.
pub fn samples_to_bytes(samples: &[Sample]) -> Vec<u8> {
    samples.iter().flat_map(|s| [s.re as u8, s.im as u8]).collect()
}
