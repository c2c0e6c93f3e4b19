// Licensed under the Apache-2.0 license

use thiserror::Error;

pub type PimageResult<T> = Result<T, PimageError>;

/// Errors raised by the header codec and the image assembler.
///
/// Header fields that fail validation are not errors; they are recorded in
/// [`crate::ValidationReport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PimageError {
    #[error(
        "{0} is not a valid alignment, only {valid:?} KiB supported",
        valid = crate::VALID_ALIGNMENTS_KIB
    )]
    InvalidAlignment(u32),
    #[error(
        "Unsupported header version {0}, only version {ver} is supported",
        ver = crate::HEADER_VERSION
    )]
    UnsupportedVersion(u8),
    #[error("Payload of {payload_len} bytes does not fit in a {block_len} byte block")]
    Oversize { payload_len: usize, block_len: usize },
    #[error("CRC word of a {payload_len} byte payload would overwrite the header")]
    CrcOverlapsHeader { payload_len: usize },
    #[error("Expected {expected} payloads, got {actual}")]
    PayloadCount { expected: usize, actual: usize },
    #[error("Buffer of {actual} bytes is too small, at least {required} bytes are needed")]
    BufferTooSmall { required: usize, actual: usize },
    #[error("Buffer of {len} bytes is neither one nor four {block_len} byte blocks")]
    Bounds { len: usize, block_len: usize },
}
