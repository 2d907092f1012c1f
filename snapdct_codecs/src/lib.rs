mod passthrough;
mod zstd_codec;

pub use passthrough::{PassThroughDecoder, PassThroughEncoder};
pub use zstd_codec::{ZstdDecoder, ZstdEncoder, DEFAULT_ZSTD_LEVEL};
