use std::io::{self, Read};

use tracing::{debug, trace};

use crate::coder::{EntropyDecoder, StreamError};

/// Default size of the compressed input and decoded lookahead buffers.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Pull-based decompressor serving exact-size reads from a compressed source.
///
/// Decoded bytes live in `output[read_pos..write_pos]`; compressed bytes the
/// coder has not consumed yet live in `input[in_start..in_end]`. Both buffers
/// are compacted before they are refilled, so a read never depends on where
/// the coder's internal chunk boundaries fall.
pub struct DecompressionStream<D, R> {
    coder: D,
    source: R,
    input: Vec<u8>,
    in_start: usize,
    in_end: usize,
    output: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
    total_in: u64,
    total_out: u64,
    source_exhausted: bool,
}

impl<D: EntropyDecoder, R: Read> DecompressionStream<D, R> {
    pub fn new(coder: D, source: R) -> Self {
        Self::with_capacity(coder, source, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(coder: D, source: R, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            coder,
            source,
            input: vec![0u8; capacity],
            in_start: 0,
            in_end: 0,
            output: vec![0u8; capacity],
            read_pos: 0,
            write_pos: 0,
            total_in: 0,
            total_out: 0,
            source_exhausted: false,
        }
    }

    /// Fill `dst` completely and return `true`, or return `false` once the
    /// stream has ended. Never delivers a partial read; decoded bytes short
    /// of a full `dst` at end of stream are discarded.
    pub fn consume(&mut self, dst: &mut [u8]) -> Result<bool, StreamError> {
        if dst.len() > self.output.len() {
            self.compact_output();
            self.output.resize(dst.len(), 0);
        }

        while self.available() < dst.len() {
            self.compact_output();

            if self.in_start == self.in_end && !self.refill()? {
                if !self.coder.at_frame_boundary() {
                    // the coder may still hold output it had no room for
                    let step = self.coder.decode(&[], &mut self.output[self.write_pos..])?;
                    if step.produced == 0 {
                        return Err(StreamError::Truncated(self.total_in));
                    }
                    self.write_pos += step.produced;
                    self.total_out += step.produced as u64;
                    continue;
                }
                if self.available() > 0 {
                    debug!(
                        leftover = self.available(),
                        wanted = dst.len(),
                        "discarding incomplete trailing read"
                    );
                }
                return Ok(false);
            }

            let step = self.coder.decode(
                &self.input[self.in_start..self.in_end],
                &mut self.output[self.write_pos..],
            )?;
            if step.consumed == 0 && step.produced == 0 {
                return Err(StreamError::Misuse(format!(
                    "{} made no progress with {} input bytes buffered",
                    self.coder.name(),
                    self.in_end - self.in_start
                )));
            }
            self.in_start += step.consumed;
            self.write_pos += step.produced;
            self.total_in += step.consumed as u64;
            self.total_out += step.produced as u64;
            trace!(
                consumed = step.consumed,
                produced = step.produced,
                available = self.available(),
                "decode round"
            );
        }

        let end = self.read_pos + dst.len();
        dst.copy_from_slice(&self.output[self.read_pos..end]);
        self.read_pos = end;
        Ok(true)
    }

    /// Move unread decoded bytes to the front of the lookahead buffer.
    fn compact_output(&mut self) {
        if self.read_pos > 0 {
            self.output.copy_within(self.read_pos..self.write_pos, 0);
            self.write_pos -= self.read_pos;
            self.read_pos = 0;
        }
    }

    /// Compact the compressed input and top it up with one bounded read.
    /// Returns `false` once the source is exhausted.
    fn refill(&mut self) -> Result<bool, StreamError> {
        if self.source_exhausted {
            return Ok(false);
        }
        self.input.copy_within(self.in_start..self.in_end, 0);
        self.in_end -= self.in_start;
        self.in_start = 0;

        let n = loop {
            match self.source.read(&mut self.input[self.in_end..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            debug!(total_in = self.total_in, "compressed source exhausted");
            self.source_exhausted = true;
            return Ok(false);
        }
        self.in_end += n;
        Ok(true)
    }

    /// Decoded bytes buffered and not yet consumed.
    #[inline]
    pub fn available(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Compressed bytes consumed by the coder so far.
    pub fn input_byte_count(&self) -> u64 {
        self.total_in
    }

    /// Decoded bytes produced by the coder so far.
    pub fn output_byte_count(&self) -> u64 {
        self.total_out
    }

    /// Entropy-coding ratio `compressed / decoded`; zero before any output.
    pub fn ratio(&self) -> f64 {
        if self.total_out == 0 {
            return 0.0;
        }
        self.total_in as f64 / self.total_out as f64
    }

    pub fn coder(&self) -> &D {
        &self.coder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::Step;

    /// Copies at most `per_round` bytes per call. `boundary` decides whether
    /// running dry counts as a clean end.
    struct SlowCopy {
        per_round: usize,
        boundary: bool,
    }

    impl EntropyDecoder for SlowCopy {
        fn name(&self) -> &'static str {
            "slow-copy"
        }

        fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, StreamError> {
            let n = input.len().min(output.len()).min(self.per_round);
            output[..n].copy_from_slice(&input[..n]);
            Ok(Step {
                consumed: n,
                produced: n,
            })
        }

        fn at_frame_boundary(&self) -> bool {
            self.boundary
        }
    }

    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    fn stream(data: Vec<u8>, chunk: usize, per_round: usize, capacity: usize) -> DecompressionStream<SlowCopy, Trickle> {
        DecompressionStream::with_capacity(
            SlowCopy {
                per_round,
                boundary: true,
            },
            Trickle { data, pos: 0, chunk },
            capacity,
        )
    }

    #[test]
    fn exact_reads_across_chunk_boundaries() {
        let data: Vec<u8> = (0..=255).collect();
        let mut s = stream(data.clone(), 7, 3, 16);
        let mut out = Vec::new();
        let mut buf = [0u8; 10];
        while s.consume(&mut buf).unwrap() {
            out.extend_from_slice(&buf);
        }
        // 256 = 25 * 10 + 6, the last 6 bytes are not a full read
        assert_eq!(out.len(), 250);
        assert_eq!(out.as_slice(), &data[..250]);
        assert_eq!(s.input_byte_count(), 256);
        assert_eq!(s.output_byte_count(), 256);
    }

    #[test]
    fn end_of_stream_is_not_partial() {
        let mut s = stream(vec![1; 10], 100, 100, 64);
        let mut buf = [0u8; 4];
        assert!(s.consume(&mut buf).unwrap());
        assert!(s.consume(&mut buf).unwrap());
        assert!(!s.consume(&mut buf).unwrap());
        // stays ended
        assert!(!s.consume(&mut buf).unwrap());
    }

    #[test]
    fn reads_larger_than_buffer_grow_it() {
        let data: Vec<u8> = (0..100).collect();
        let mut s = stream(data.clone(), 9, 5, 8);
        let mut buf = vec![0u8; 50];
        assert!(s.consume(&mut buf).unwrap());
        assert_eq!(buf.as_slice(), &data[..50]);
        assert!(s.consume(&mut buf).unwrap());
        assert_eq!(buf.as_slice(), &data[50..]);
        assert!(!s.consume(&mut buf).unwrap());
    }

    #[test]
    fn running_dry_mid_frame_is_truncation() {
        let mut s = DecompressionStream::with_capacity(
            SlowCopy {
                per_round: 4,
                boundary: false,
            },
            Trickle {
                data: vec![0; 6],
                pos: 0,
                chunk: 6,
            },
            16,
        );
        let mut buf = [0u8; 4];
        assert!(s.consume(&mut buf).unwrap());
        assert!(matches!(s.consume(&mut buf), Err(StreamError::Truncated(6))));
    }

    #[test]
    fn source_errors_surface_as_io() {
        let mut s = DecompressionStream::new(
            SlowCopy {
                per_round: 1,
                boundary: true,
            },
            Broken,
        );
        let mut buf = [0u8; 1];
        assert!(matches!(s.consume(&mut buf), Err(StreamError::Io(_))));
    }

    #[test]
    fn zero_length_read_always_succeeds() {
        let mut s = stream(Vec::new(), 1, 1, 4);
        assert!(s.consume(&mut []).unwrap());
        assert_eq!(s.ratio(), 0.0);
    }
}
