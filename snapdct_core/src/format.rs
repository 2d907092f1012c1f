use std::io::{self, Read, Write};

use thiserror::Error;
use tracing::warn;

use crate::sample::read_full;

/// Magic bytes opening every rqdct container.
pub const MAGIC: [u8; 4] = [0xB0, 0xBD, 0xC7, 0x01];

/// Fixed size of the container header in bytes.
///   magic[4] + block_size:u32 + quantization_factor:f32 + bins_to_keep:u32
///   = 4 + 4 + 4 + 4 = 16
pub const HEADER_SIZE: usize = 16;

/// Largest accepted block size. The transform keeps an `N × N` `f32` cosine
/// table, 256 MiB at this size.
pub const MAX_BLOCK_SIZE: u32 = 8192;

/// File name suffix appended to the input path by `encode`.
pub const CONTAINER_SUFFIX: &str = "rqdct";

/// Header validation failures. All of them are fatal for decode.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HeaderError {
    #[error("invalid file header: magic bytes {0:02x?} do not match")]
    InvalidMagic([u8; 4]),
    #[error("invalid file header: expected 16 bytes, found {0}")]
    Truncated(usize),
    #[error("block size of zero is invalid")]
    ZeroBlockSize,
    #[error("block size {0} exceeds the maximum of 8192")]
    BlockTooLarge(u32),
    #[error("quantization factor {0} is invalid, it must be finite and above zero")]
    InvalidFactor(f32),
    #[error("invalid bins_to_keep = {bins_to_keep}, block_size = {block_size}")]
    InvalidBins { bins_to_keep: u32, block_size: u32 },
}

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 16-byte container header.
///
/// The header is never compressed, so `xxd file.rqdct | head -1` is enough to
/// see how a recording was encoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerHeader {
    /// Samples per transform block.
    pub block_size: u32,
    /// Multiplier applied to every coefficient before rounding.
    pub quantization_factor: f32,
    /// Low-frequency bins stored per block; the rest are implicitly zero.
    pub bins_to_keep: u32,
}

impl ContainerHeader {
    /// Build a header, enforcing the same invariants as [`from_bytes`](Self::from_bytes).
    pub fn new(block_size: u32, quantization_factor: f32, bins_to_keep: u32) -> Result<Self, HeaderError> {
        let header = Self {
            block_size,
            quantization_factor,
            bins_to_keep,
        };
        header.validate()?;
        Ok(header)
    }

    /// Check the field invariants. A factor above 1 is accepted with a warning
    /// because it amplifies coefficients and leaves no headroom for saturation.
    pub fn validate(&self) -> Result<(), HeaderError> {
        if self.block_size == 0 {
            return Err(HeaderError::ZeroBlockSize);
        }
        if self.block_size > MAX_BLOCK_SIZE {
            return Err(HeaderError::BlockTooLarge(self.block_size));
        }
        if !self.quantization_factor.is_finite() || self.quantization_factor <= 0.0 {
            return Err(HeaderError::InvalidFactor(self.quantization_factor));
        }
        if self.quantization_factor > 1.0 {
            warn!(
                factor = self.quantization_factor,
                "quantization factor above 1 amplifies coefficients and is likely to saturate"
            );
        }
        if self.bins_to_keep == 0 || self.bins_to_keep > self.block_size {
            return Err(HeaderError::InvalidBins {
                bins_to_keep: self.bins_to_keep,
                block_size: self.block_size,
            });
        }
        Ok(())
    }

    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.block_size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.quantization_factor.to_le_bytes());
        buf[12..16].copy_from_slice(&self.bins_to_keep.to_le_bytes());
        buf
    }

    /// Deserialize from `HEADER_SIZE` bytes, checking the magic and every field.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, HeaderError> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagic(magic));
        }
        let field = |at: usize| [buf[at], buf[at + 1], buf[at + 2], buf[at + 3]];
        let header = Self {
            block_size: u32::from_le_bytes(field(4)),
            quantization_factor: f32::from_le_bytes(field(8)),
            bins_to_keep: u32::from_le_bytes(field(12)),
        };
        header.validate()?;
        Ok(header)
    }

    /// Read and validate a header from the front of `src`.
    ///
    /// A short read surfaces as [`HeaderError::Truncated`] wrapped in the
    /// returned `io::Error`, so callers can downcast it.
    pub fn read_from<R: Read>(src: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        let filled = read_full(src, &mut buf)?;
        if filled < HEADER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                HeaderError::Truncated(filled),
            ));
        }
        Self::from_bytes(&buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn write_to<W: Write>(&self, dst: &mut W) -> io::Result<()> {
        dst.write_all(&self.to_bytes())
    }

    /// Fraction of the transform output that survives trimming.
    pub fn trimming_ratio(&self) -> f64 {
        self.bins_to_keep as f64 / self.block_size as f64
    }

    /// Uncompressed payload bytes produced by one block: an `i8` pair per kept bin.
    #[inline]
    pub fn payload_bytes_per_block(&self) -> usize {
        2 * self.bins_to_keep as usize
    }

    /// Raw sample bytes represented by one block.
    #[inline]
    pub fn sample_bytes_per_block(&self) -> usize {
        2 * self.block_size as usize
    }
}

/// Recover a [`HeaderError`] from an error produced by [`ContainerHeader::read_from`].
pub fn header_error(err: &io::Error) -> Option<&HeaderError> {
    err.get_ref().and_then(|inner| inner.downcast_ref::<HeaderError>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(block_size: u32, factor: f32, bins: u32) -> [u8; HEADER_SIZE] {
        ContainerHeader {
            block_size,
            quantization_factor: factor,
            bins_to_keep: bins,
        }
        .to_bytes()
    }

    #[test]
    fn header_layout_is_little_endian() {
        let bytes = raw(1024, 0.5, 256);
        assert_eq!(&bytes[0..4], &MAGIC);
        assert_eq!(&bytes[4..8], &[0x00, 0x04, 0x00, 0x00]);
        assert_eq!(&bytes[8..12], &0.5f32.to_le_bytes());
        assert_eq!(&bytes[12..16], &[0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn header_round_trip() {
        let header = ContainerHeader::new(64, 0.25, 16).unwrap();
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        let back = ContainerHeader::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = raw(8, 1.0, 8);
        bytes[0] = 0xB1;
        assert!(matches!(
            ContainerHeader::from_bytes(&bytes),
            Err(HeaderError::InvalidMagic(_))
        ));
    }

    #[test]
    fn rejects_invalid_fields() {
        assert_eq!(
            ContainerHeader::from_bytes(&raw(0, 1.0, 1)),
            Err(HeaderError::ZeroBlockSize)
        );
        assert_eq!(
            ContainerHeader::from_bytes(&raw(8, 0.0, 8)),
            Err(HeaderError::InvalidFactor(0.0))
        );
        assert!(matches!(
            ContainerHeader::from_bytes(&raw(8, f32::NAN, 8)),
            Err(HeaderError::InvalidFactor(_))
        ));
        assert_eq!(
            ContainerHeader::from_bytes(&raw(8, 1.0, 9)),
            Err(HeaderError::InvalidBins {
                bins_to_keep: 9,
                block_size: 8
            })
        );
        assert_eq!(
            ContainerHeader::from_bytes(&raw(8, 1.0, 0)),
            Err(HeaderError::InvalidBins {
                bins_to_keep: 0,
                block_size: 8
            })
        );
    }

    #[test]
    fn rejects_oversized_blocks() {
        assert!(ContainerHeader::new(MAX_BLOCK_SIZE, 0.5, 1).is_ok());
        assert_eq!(
            ContainerHeader::from_bytes(&raw(MAX_BLOCK_SIZE + 1, 0.5, 1)),
            Err(HeaderError::BlockTooLarge(MAX_BLOCK_SIZE + 1))
        );
        assert_eq!(
            ContainerHeader::from_bytes(&raw(1 << 31, 0.5, 1)),
            Err(HeaderError::BlockTooLarge(1 << 31))
        );
    }

    #[test]
    fn factor_above_one_is_only_a_warning() {
        let header = ContainerHeader::from_bytes(&raw(8, 4.0, 8)).unwrap();
        assert_eq!(header.quantization_factor, 4.0);
    }

    #[test]
    fn short_input_is_truncated_header() {
        let err = ContainerHeader::read_from(&mut &MAGIC[..]).unwrap_err();
        assert_eq!(header_error(&err), Some(&HeaderError::Truncated(4)));
    }

    #[test]
    fn trimming_ratio_and_block_sizes() {
        let header = ContainerHeader::new(16, 0.5, 4).unwrap();
        assert_eq!(header.trimming_ratio(), 0.25);
        assert_eq!(header.payload_bytes_per_block(), 8);
        assert_eq!(header.sample_bytes_per_block(), 32);
    }
}
