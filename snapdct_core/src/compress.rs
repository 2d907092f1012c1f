use std::io::{self, Write};

use tracing::{debug, trace};

use crate::coder::{EntropyEncoder, Step, StreamError};

/// Default size of both the accumulation and the output buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 512 * 1024;

/// Lifecycle of a [`CompressionStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressState {
    /// Nothing added yet.
    Idle,
    /// Bytes are being gathered and submitted in batches.
    Accumulating,
    /// `finish()` has started; no more input is accepted.
    Flushing,
    /// The coder has emitted its trailer.
    Finished,
}

/// Incremental compressor that batches small writes before handing them to
/// the entropy coder.
///
/// # Write contract
/// Call [`add_bytes`](Self::add_bytes) any number of times, draining the
/// ready output with [`write_and_drain`](Self::write_and_drain) whenever
/// convenient. At end of input call [`finish`](Self::finish) repeatedly,
/// draining after every call, until it returns `true`.
pub struct CompressionStream<E> {
    coder: E,
    capacity: usize,
    /// Raw bytes not yet consumed by the coder.
    pending: Vec<u8>,
    /// Compressed bytes live in `output[..output_used]`.
    output: Vec<u8>,
    output_used: usize,
    state: CompressState,
    total_in: u64,
    total_out: u64,
}

impl<E: EntropyEncoder> CompressionStream<E> {
    pub fn new(coder: E) -> Self {
        Self::with_capacity(coder, DEFAULT_BUFFER_SIZE)
    }

    /// Use `capacity` bytes for the accumulation and output buffers.
    pub fn with_capacity(coder: E, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            coder,
            capacity,
            pending: Vec::with_capacity(capacity),
            output: vec![0u8; capacity],
            output_used: 0,
            state: CompressState::Idle,
            total_in: 0,
            total_out: 0,
        }
    }

    /// Queue `data` for compression.
    ///
    /// Bytes are gathered until the accumulation buffer would overflow, then
    /// the batch goes to the coder in one round and whatever the coder left
    /// unconsumed moves to the front of the buffer.
    pub fn add_bytes(&mut self, mut data: &[u8]) -> Result<(), StreamError> {
        if matches!(self.state, CompressState::Flushing | CompressState::Finished) {
            return Err(StreamError::Misuse("add_bytes called after finish".into()));
        }
        if data.is_empty() {
            return Ok(());
        }
        self.state = CompressState::Accumulating;

        loop {
            if self.pending.len() + data.len() < self.capacity {
                self.pending.extend_from_slice(data);
                return Ok(());
            }

            if self.pending.is_empty() {
                // bigger than the whole buffer, stream it straight through
                while !data.is_empty() {
                    let step = self.encode_round(data)?;
                    data = &data[step.consumed..];
                }
                return Ok(());
            }

            let batch = std::mem::take(&mut self.pending);
            let result = self.encode_round(&batch);
            self.pending = batch;
            let step = result?;
            self.pending.drain(..step.consumed);
            trace!(
                consumed = step.consumed,
                produced = step.produced,
                remaining = self.pending.len(),
                "submitted batch"
            );
        }
    }

    /// Run one coder round over `input`, growing the output buffer when it is
    /// full or the coder asks for more room.
    fn encode_round(&mut self, input: &[u8]) -> Result<Step, StreamError> {
        for _ in 0..2 {
            if self.output_used == self.output.len() {
                self.grow_output();
            }
            let step = self.coder.encode(input, &mut self.output[self.output_used..])?;
            if step.consumed > 0 || step.produced > 0 {
                self.account(step);
                return Ok(step);
            }
            self.grow_output();
        }
        Err(StreamError::Misuse(format!(
            "{} made no progress on {} input bytes",
            self.coder.name(),
            input.len()
        )))
    }

    fn grow_output(&mut self) {
        let grown = self.output.len() * 2;
        debug!(from = self.output.len(), to = grown, "growing compressor output buffer");
        self.output.resize(grown, 0);
    }

    fn account(&mut self, step: Step) {
        self.output_used += step.produced;
        self.total_in += step.consumed as u64;
        self.total_out += step.produced as u64;
    }

    /// Write every ready compressed byte to `sink` and reset the output cursor.
    ///
    /// Returns the number of bytes written.
    pub fn write_and_drain<W: Write>(&mut self, sink: &mut W) -> io::Result<usize> {
        let ready = self.output_used;
        if ready > 0 {
            sink.write_all(&self.output[..ready])?;
            self.output_used = 0;
        }
        Ok(ready)
    }

    /// One finishing round. Call repeatedly, draining in between, until it
    /// returns `true`. Further calls after that return `true` and emit nothing.
    pub fn finish(&mut self) -> Result<bool, StreamError> {
        match self.state {
            CompressState::Finished => return Ok(true),
            CompressState::Idle | CompressState::Accumulating => {
                debug!(pending = self.pending.len(), "finishing compression stream");
                self.state = CompressState::Flushing;
            }
            CompressState::Flushing => {}
        }

        if self.output_used == self.output.len() {
            // caller has to drain before the coder can make progress
            return Ok(false);
        }

        let batch = std::mem::take(&mut self.pending);
        let result = self.coder.finish(&batch, &mut self.output[self.output_used..]);
        self.pending = batch;
        let (step, done) = result?;
        self.pending.drain(..step.consumed);
        self.account(step);

        if done && self.pending.is_empty() {
            debug!(
                total_in = self.total_in,
                total_out = self.total_out,
                "compression stream finished"
            );
            self.state = CompressState::Finished;
        }
        Ok(self.state == CompressState::Finished)
    }

    /// Running compression ratio `total_out / total_in`; zero before the coder
    /// has consumed anything.
    pub fn ratio(&self) -> f64 {
        if self.total_in == 0 {
            return 0.0;
        }
        self.total_out as f64 / self.total_in as f64
    }

    /// Raw bytes consumed by the coder so far.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Compressed bytes produced by the coder so far.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Compressed bytes waiting for the next drain.
    pub fn pending_output(&self) -> usize {
        self.output_used
    }

    pub fn state(&self) -> CompressState {
        self.state
    }

    pub fn coder(&self) -> &E {
        &self.coder
    }
}
