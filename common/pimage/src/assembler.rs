// Licensed under the Apache-2.0 license

use crate::config::PimageConfig;
use crate::error::{PimageError, PimageResult};
use crate::header::{crc_overlaps_header, encode_header, length_words};

/// Number of redundant copies in a bundled image.
pub const BUNDLE_IMAGE_COUNT: usize = 4;

fn check_fits(payload_len: usize, block_len: usize) -> PimageResult<()> {
    let words = length_words(payload_len);
    if words > u16::MAX as usize || words * 4 > block_len {
        return Err(PimageError::Oversize {
            payload_len,
            block_len,
        });
    }
    if crc_overlaps_header(words) {
        return Err(PimageError::CrcOverlapsHeader { payload_len });
    }
    Ok(())
}

fn stamp_block(block: &mut [u8], payload: &[u8]) -> PimageResult<()> {
    block[..payload.len()].copy_from_slice(payload);
    encode_header(block, payload.len())
}

/// Pads `payload` to one alignment block and stamps its header.
pub fn build_image(payload: &[u8], config: &PimageConfig) -> PimageResult<Vec<u8>> {
    config.validate()?;
    let block_len = config.block_len();
    check_fits(payload.len(), block_len)?;

    let mut image = vec![0u8; block_len];
    stamp_block(&mut image, payload)?;
    Ok(image)
}

/// Builds a four block image. Payload `i` is placed at `i * block_len` and
/// gets a header of its own, so every block decodes on its own.
pub fn build_bundle<P: AsRef<[u8]>>(
    payloads: &[P],
    config: &PimageConfig,
) -> PimageResult<Vec<u8>> {
    config.validate()?;
    if payloads.len() != BUNDLE_IMAGE_COUNT {
        return Err(PimageError::PayloadCount {
            expected: BUNDLE_IMAGE_COUNT,
            actual: payloads.len(),
        });
    }
    let block_len = config.block_len();
    for payload in payloads {
        check_fits(payload.as_ref().len(), block_len)?;
    }

    let mut image = vec![0u8; BUNDLE_IMAGE_COUNT * block_len];
    for (block, payload) in image.chunks_exact_mut(block_len).zip(payloads) {
        stamp_block(block, payload.as_ref())?;
    }
    Ok(image)
}

/// Splits a stamped file into its image blocks: one block when the file is
/// exactly one alignment unit, four when it is exactly four.
pub fn split_image_blocks<'a>(
    image: &'a [u8],
    config: &PimageConfig,
) -> PimageResult<Vec<&'a [u8]>> {
    let block_len = config.block_len();
    if image.len() == block_len {
        Ok(vec![image])
    } else if image.len() == BUNDLE_IMAGE_COUNT * block_len {
        Ok(image.chunks_exact(block_len).collect())
    } else {
        Err(PimageError::Bounds {
            len: image.len(),
            block_len,
        })
    }
}

/// Like [`split_image_blocks`], but a file of any other size is treated as a
/// single unpadded image instead of being rejected.
pub fn split_image_blocks_forced<'a>(
    image: &'a [u8],
    config: &PimageConfig,
) -> PimageResult<Vec<&'a [u8]>> {
    match split_image_blocks(image, config) {
        Err(PimageError::Bounds { .. }) => Ok(vec![image]),
        result => result,
    }
}
