// Licensed under the Apache-2.0 license

//! Checksums stamped into the image header.

use crc::{Crc, CRC_32_BZIP2};

/// MSB-first CRC-32, polynomial 0x04c1_1db7, seeded and finalized with all
/// ones. These are the BZIP2 parameters.
const PIMAGE_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_BZIP2);

/// 16-bit wrapping sum of every byte in `data`.
pub fn simple_checksum(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |acc, &byte| acc.wrapping_add(byte as u16))
}

/// Non-reflected CRC-32 over `data`, seeded and finalized with all ones.
pub fn crc_checksum(data: &[u8]) -> u32 {
    PIMAGE_CRC.checksum(data)
}
