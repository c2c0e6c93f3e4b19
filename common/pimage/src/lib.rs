// Licensed under the Apache-2.0 license

//! Preloader image header codec.
//!
//! A stamped image block carries a 12 byte header at offset 0x40 followed,
//! at the end of the declared length, by a CRC over everything before it.
//! Images are zero padded to an alignment block, and a bundle holds four
//! such blocks back to back.

mod assembler;
mod checksum;
mod config;
mod error;
mod header;

pub use assembler::{
    build_bundle, build_image, split_image_blocks, split_image_blocks_forced, BUNDLE_IMAGE_COUNT,
};
pub use checksum::{crc_checksum, simple_checksum};
pub use config::{Alignment, PimageConfig, VALID_ALIGNMENTS_KIB};
pub use error::{PimageError, PimageResult};
pub use header::{
    crc_overlaps_header, decode_header, encode_header, length_words, CrcCheck, FieldCheck,
    PimageHeader, ValidationReport, CRC_SIZE, HEADER_END, HEADER_OFFSET, HEADER_SIZE,
    HEADER_VERSION, MAX_LENGTH_WORDS, MIN_LENGTH_WORDS, VALIDATION_WORD,
};
