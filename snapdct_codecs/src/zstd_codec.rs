use std::io;

use snapdct_core::{EntropyDecoder, EntropyEncoder, Step, StreamError};
use tracing::debug;
use zstd::stream::raw::{CParameter, Decoder, Encoder, InBuffer, Operation, OutBuffer};

/// Compression level used when none is configured (1 = fast / larger,
/// 22 = slow / smallest).
pub const DEFAULT_ZSTD_LEVEL: i32 = 19;

/// Map a zstd error onto the stream error taxonomy. zstd only reports its
/// error names as text, so this goes by message.
fn classify(err: io::Error, decoding: bool) -> StreamError {
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("memory") {
        StreamError::OutOfMemory
    } else if lower.contains("parameter") || lower.contains("out of bound") {
        StreamError::InvalidConfig(msg)
    } else if lower.contains("checksum") && !decoding {
        StreamError::UnsupportedCheck(msg)
    } else if lower.contains("stage") {
        StreamError::Misuse(msg)
    } else if decoding {
        StreamError::Corrupt(msg)
    } else {
        StreamError::Misuse(msg)
    }
}

// ── Encoder ────────────────────────────────────────────────────────────────

/// Streaming Zstandard encoder producing a single frame with a content
/// checksum, so corruption is caught on decode.
pub struct ZstdEncoder {
    raw: Encoder<'static>,
    level: i32,
}

impl ZstdEncoder {
    pub fn new(level: i32) -> Result<Self, StreamError> {
        let mut raw = Encoder::new(level).map_err(|e| classify(e, false))?;
        raw.set_parameter(CParameter::ChecksumFlag(true))
            .map_err(|e| classify(e, false))?;
        debug!(level, "zstd encoder ready");
        Ok(Self { raw, level })
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

impl EntropyEncoder for ZstdEncoder {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn encode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, StreamError> {
        let mut src = InBuffer::around(input);
        let mut dst = OutBuffer::around(output);
        self.raw
            .run(&mut src, &mut dst)
            .map_err(|e| classify(e, false))?;
        Ok(Step {
            consumed: src.pos(),
            produced: dst.pos(),
        })
    }

    fn finish(&mut self, input: &[u8], output: &mut [u8]) -> Result<(Step, bool), StreamError> {
        if !input.is_empty() {
            // the frame epilogue ignores input, so hand it over first
            return Ok((self.encode(input, output)?, false));
        }
        let mut dst = OutBuffer::around(output);
        let remaining = self
            .raw
            .finish(&mut dst, true)
            .map_err(|e| classify(e, false))?;
        Ok((
            Step {
                consumed: 0,
                produced: dst.pos(),
            },
            remaining == 0,
        ))
    }
}

// ── Decoder ────────────────────────────────────────────────────────────────

/// Streaming Zstandard decoder. Concatenated frames decode back to back.
pub struct ZstdDecoder {
    raw: Decoder<'static>,
    /// Whether the last round ended exactly on a completed frame.
    boundary: bool,
}

impl ZstdDecoder {
    pub fn new() -> Result<Self, StreamError> {
        let raw = Decoder::new().map_err(|e| classify(e, true))?;
        Ok(Self { raw, boundary: true })
    }
}

impl EntropyDecoder for ZstdDecoder {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, StreamError> {
        let mut src = InBuffer::around(input);
        let mut dst = OutBuffer::around(output);
        let hint = self
            .raw
            .run(&mut src, &mut dst)
            .map_err(|e| classify(e, true))?;
        let step = Step {
            consumed: src.pos(),
            produced: dst.pos(),
        };
        if step.consumed > 0 || step.produced > 0 {
            self.boundary = hint == 0;
        }
        Ok(step)
    }

    fn at_frame_boundary(&self) -> bool {
        self.boundary
    }
}
