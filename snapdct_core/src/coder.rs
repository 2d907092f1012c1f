use std::io;

use thiserror::Error;

/// Fatal conditions raised by an entropy coder or the stream around it.
///
/// A full output buffer is not an error here. The streams drain or grow their
/// buffers instead.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("entropy coder ran out of memory")]
    OutOfMemory,
    #[error("invalid entropy coder configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported integrity check: {0}")]
    UnsupportedCheck(String),
    #[error("entropy coder misuse: {0}")]
    Misuse(String),
    #[error("compressed data is corrupt: {0}")]
    Corrupt(String),
    #[error("compressed stream ended in the middle of a frame after {0} bytes")]
    Truncated(u64),
    #[error("i/o error on compressed stream")]
    Io(#[from] io::Error),
}

/// Bytes moved by one coder round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Step {
    /// Bytes taken from the front of the input slice.
    pub consumed: usize,
    /// Bytes written to the front of the output slice.
    pub produced: usize,
}

/// Compression half of the entropy coder seam.
///
/// Implementations process only what they are handed: no internal blocking,
/// no I/O. [`CompressionStream`](crate::CompressionStream) owns the buffers and
/// decides when to call each round.
pub trait EntropyEncoder {
    /// Human-readable coder name for logs and CLI display.
    fn name(&self) -> &'static str;

    /// One compression round. `output` is never empty.
    fn encode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, StreamError>;

    /// One finishing round: consume what is left of `input`, then emit the
    /// stream trailer. Returns `true` in the second field once the trailer
    /// has been written completely.
    fn finish(&mut self, input: &[u8], output: &mut [u8]) -> Result<(Step, bool), StreamError>;
}

/// Decompression half of the entropy coder seam.
pub trait EntropyDecoder {
    fn name(&self) -> &'static str;

    /// One decode round. `output` is never empty.
    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, StreamError>;

    /// Whether the coder sits between frames, i.e. running out of input here
    /// is a clean end of stream rather than truncation.
    fn at_frame_boundary(&self) -> bool;
}
