// Licensed under the Apache-2.0 license

use crate::error::{PimageError, PimageResult};
use crate::HEADER_VERSION;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Block sizes, in KiB, an image may be padded to.
pub const VALID_ALIGNMENTS_KIB: [u32; 7] = [64, 128, 256, 512, 1024, 2048, 4096];

/// Size of one image block. Override the default when the NAND flash has a
/// larger erase block.
#[repr(u32)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum Alignment {
    #[default]
    Kib64 = 64,
    Kib128 = 128,
    Kib256 = 256,
    Kib512 = 512,
    Kib1024 = 1024,
    Kib2048 = 2048,
    Kib4096 = 4096,
}

impl Alignment {
    pub fn from_kib(kib: u32) -> PimageResult<Self> {
        Self::try_from_primitive(kib).map_err(|_| PimageError::InvalidAlignment(kib))
    }

    pub fn kib(self) -> u32 {
        self.into()
    }

    pub fn bytes(self) -> usize {
        self.kib() as usize * 1024
    }
}

/// Settings shared by every assemble and split call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PimageConfig {
    pub alignment: Alignment,
    pub version: u8,
}

impl PimageConfig {
    pub fn new(alignment_kib: u32, version: u8) -> PimageResult<Self> {
        let config = Self {
            alignment: Alignment::from_kib(alignment_kib)?,
            version,
        };
        config.validate()?;
        Ok(config)
    }

    /// Only header version 0 can be produced.
    pub fn validate(&self) -> PimageResult<()> {
        if self.version != HEADER_VERSION {
            return Err(PimageError::UnsupportedVersion(self.version));
        }
        Ok(())
    }

    pub fn block_len(&self) -> usize {
        self.alignment.bytes()
    }
}
