use snapdct_core::{EntropyDecoder, EntropyEncoder, Step, StreamError};

/// No-op encoder: copies the quantized payload verbatim.
///
/// Useful for checking the transform and container path independently of
/// any entropy coder, and for tests that need a predictable byte count.
#[derive(Debug, Default)]
pub struct PassThroughEncoder;

/// Counterpart of [`PassThroughEncoder`]. Every byte boundary is a clean end.
#[derive(Debug, Default)]
pub struct PassThroughDecoder;

fn copy(input: &[u8], output: &mut [u8]) -> Step {
    let n = input.len().min(output.len());
    output[..n].copy_from_slice(&input[..n]);
    Step {
        consumed: n,
        produced: n,
    }
}

impl EntropyEncoder for PassThroughEncoder {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn encode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, StreamError> {
        Ok(copy(input, output))
    }

    fn finish(&mut self, input: &[u8], output: &mut [u8]) -> Result<(Step, bool), StreamError> {
        let step = copy(input, output);
        Ok((step, step.consumed == input.len()))
    }
}

impl EntropyDecoder for PassThroughDecoder {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, StreamError> {
        Ok(copy(input, output))
    }

    fn at_frame_boundary(&self) -> bool {
        true
    }
}
