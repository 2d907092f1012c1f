pub mod capture;
pub mod coder;
pub mod compare;
pub mod compress;
pub mod decompress;
pub mod format;
pub mod pipeline;
pub mod progress;
pub mod quant;
pub mod sample;
pub mod transform;

pub use coder::{EntropyDecoder, EntropyEncoder, Step, StreamError};
pub use compress::{CompressState, CompressionStream};
pub use decompress::DecompressionStream;
pub use format::{ContainerHeader, HeaderError, CONTAINER_SUFFIX, HEADER_SIZE, MAGIC, MAX_BLOCK_SIZE};
pub use pipeline::{decode, decode_file, encode, encode_file, DecodeSummary, EncodeParams, EncodeSummary};
pub use transform::{Dct, TransformError};
