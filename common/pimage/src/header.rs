// Licensed under the Apache-2.0 license

use core::fmt;
use core::mem::offset_of;

use serde::Serialize;
use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::checksum::{crc_checksum, simple_checksum};
use crate::error::{PimageError, PimageResult};

pub const VALIDATION_WORD: u32 = u32::from_le_bytes(*b"AS01");
pub const HEADER_VERSION: u8 = 0;

/// Byte offset of the header inside every image block.
pub const HEADER_OFFSET: usize = 0x40;
pub const HEADER_SIZE: usize = core::mem::size_of::<PimageHeader>();
/// Smallest buffer that holds every fixed header field.
pub const HEADER_END: usize = HEADER_OFFSET + HEADER_SIZE;

pub const CRC_SIZE: usize = core::mem::size_of::<u32>();
pub const MIN_LENGTH_WORDS: u16 = 21;
pub const MAX_LENGTH_WORDS: u16 = 16384;

/// Fixed part of the header. The CRC word lives at the end of the declared
/// length rather than in this record.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PimageHeader {
    pub validation_word: U32<LittleEndian>,
    pub version: u8,
    pub flags: u8,
    /// Image length in 32-bit words, CRC word included.
    pub length: U16<LittleEndian>,
    pub spare: U16<LittleEndian>,
    pub simple_checksum: U16<LittleEndian>,
}

impl PimageHeader {
    fn new(length_words: u16) -> Self {
        let mut header = PimageHeader {
            validation_word: VALIDATION_WORD.into(),
            version: HEADER_VERSION,
            flags: 0,
            length: length_words.into(),
            spare: U16::new(0),
            simple_checksum: U16::new(0),
        };
        header.simple_checksum = header.compute_simple_checksum().into();
        header
    }

    fn compute_simple_checksum(&self) -> u16 {
        simple_checksum(&self.as_bytes()[..offset_of!(PimageHeader, simple_checksum)])
    }

    pub fn length_bytes(&self) -> usize {
        self.length.get() as usize * 4
    }
}

/// Number of words the length field declares for a payload of `payload_len`
/// bytes: the payload rounded up to whole words plus the trailing CRC word.
pub fn length_words(payload_len: usize) -> usize {
    payload_len.div_ceil(4) + 1
}

/// True when the CRC word declared by `words` would land inside the fixed
/// header fields. Payloads of 61 to 72 bytes hit this.
pub fn crc_overlaps_header(words: usize) -> bool {
    let crc_end = words * 4;
    crc_end > HEADER_OFFSET && crc_end - CRC_SIZE < HEADER_END
}

/// Stamps a version 0 header for a `payload_len` byte payload into `buf`.
///
/// The payload must already sit at the start of `buf`. The CRC over
/// everything before the end of the declared length is written at
/// `length * 4 - 4`, which must not fall inside the header.
pub fn encode_header(buf: &mut [u8], payload_len: usize) -> PimageResult<()> {
    let words = length_words(payload_len);
    let length = u16::try_from(words).map_err(|_| PimageError::Oversize {
        payload_len,
        block_len: buf.len(),
    })?;
    let crc_end = words * 4;
    let required = crc_end.max(HEADER_END);
    if buf.len() < required {
        return Err(PimageError::BufferTooSmall {
            required,
            actual: buf.len(),
        });
    }
    if crc_overlaps_header(words) {
        return Err(PimageError::CrcOverlapsHeader { payload_len });
    }

    let header = PimageHeader::new(length);
    buf[HEADER_OFFSET..HEADER_END].copy_from_slice(header.as_bytes());

    let crc_offset = crc_end - CRC_SIZE;
    let crc = crc_checksum(&buf[..crc_offset]);
    buf[crc_offset..crc_end].copy_from_slice(&crc.to_le_bytes());
    Ok(())
}

/// A header field value and whether it passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldCheck<T> {
    pub value: T,
    pub valid: bool,
}

impl<T> FieldCheck<T> {
    fn new(value: T, valid: bool) -> Self {
        Self { value, valid }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CrcCheck {
    Valid { value: u32 },
    Invalid { value: u32 },
    /// The declared length is zero or runs past the end of the buffer.
    NotEvaluated,
}

impl CrcCheck {
    pub fn value(&self) -> Option<u32> {
        match *self {
            CrcCheck::Valid { value } | CrcCheck::Invalid { value } => Some(value),
            CrcCheck::NotEvaluated => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, CrcCheck::Valid { .. })
    }
}

/// Everything found while decoding one image block. Invalid fields are
/// recorded here; none of them abort the decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub validation_word: FieldCheck<u32>,
    pub version: FieldCheck<u8>,
    pub flags: u8,
    pub length: FieldCheck<u16>,
    pub spare: u16,
    pub simple_checksum: FieldCheck<u16>,
    pub crc_checksum: CrcCheck,
}

impl ValidationReport {
    pub fn length_bytes(&self) -> usize {
        self.length.value as usize * 4
    }

    /// True only when every field checks out and the CRC could be verified.
    pub fn is_valid(&self) -> bool {
        self.validation_word.valid
            && self.version.valid
            && self.length.valid
            && self.simple_checksum.valid
            && self.crc_checksum.is_valid()
    }
}

fn invalid_marker(valid: bool) -> &'static str {
    if valid {
        ""
    } else {
        " (invalid)"
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            " Validation word: 0x{:08x}{}",
            self.validation_word.value,
            invalid_marker(self.validation_word.valid)
        )?;
        writeln!(
            f,
            " Version: {}{}",
            self.version.value,
            invalid_marker(self.version.valid)
        )?;
        writeln!(f, " Flags: 0x{:02x}", self.flags)?;
        writeln!(
            f,
            " Length: {} words ({} bytes){}",
            self.length.value,
            self.length_bytes(),
            invalid_marker(self.length.valid)
        )?;
        writeln!(f, " Spare: 0x{:04x}", self.spare)?;
        writeln!(
            f,
            " Simple Checksum: 0x{:04x}{}",
            self.simple_checksum.value,
            invalid_marker(self.simple_checksum.valid)
        )?;
        match self.crc_checksum {
            CrcCheck::Valid { value } => writeln!(f, " CRC Checksum: 0x{:08x}", value),
            CrcCheck::Invalid { value } => {
                writeln!(f, " CRC Checksum: 0x{:08x} (invalid)", value)
            }
            CrcCheck::NotEvaluated => writeln!(f, " CRC Checksum: not present"),
        }
    }
}

/// Reads the header of one image block and validates every field.
pub fn decode_header(buf: &[u8]) -> PimageResult<ValidationReport> {
    let header = buf
        .get(HEADER_OFFSET..HEADER_END)
        .and_then(|bytes| PimageHeader::read_from_bytes(bytes).ok())
        .ok_or(PimageError::BufferTooSmall {
            required: HEADER_END,
            actual: buf.len(),
        })?;

    let length = header.length.get();
    let length_valid = (MIN_LENGTH_WORDS..=MAX_LENGTH_WORDS).contains(&length);

    let crc_end = header.length_bytes();
    let crc_check = if crc_end != 0 && crc_end <= buf.len() {
        let crc_offset = crc_end - CRC_SIZE;
        let mut stored = [0u8; CRC_SIZE];
        stored.copy_from_slice(&buf[crc_offset..crc_end]);
        let value = u32::from_le_bytes(stored);
        if value == crc_checksum(&buf[..crc_offset]) {
            CrcCheck::Valid { value }
        } else {
            CrcCheck::Invalid { value }
        }
    } else {
        CrcCheck::NotEvaluated
    };

    Ok(ValidationReport {
        validation_word: FieldCheck::new(
            header.validation_word.get(),
            header.validation_word.get() == VALIDATION_WORD,
        ),
        version: FieldCheck::new(header.version, header.version == HEADER_VERSION),
        flags: header.flags,
        length: FieldCheck::new(length, length_valid),
        spare: header.spare.get(),
        simple_checksum: FieldCheck::new(
            header.simple_checksum.get(),
            header.simple_checksum.get() == header.compute_simple_checksum(),
        ),
        crc_checksum: crc_check,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK_LEN: usize = 64 * 1024;

    fn encoded_block(payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; BLOCK_LEN];
        buf[..payload.len()].copy_from_slice(payload);
        encode_header(&mut buf, payload.len()).unwrap();
        buf
    }

    fn sample_payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(HEADER_SIZE, 12);
        assert_eq!(HEADER_END, 76);
        assert_eq!(offset_of!(PimageHeader, version), 0x04);
        assert_eq!(offset_of!(PimageHeader, flags), 0x05);
        assert_eq!(offset_of!(PimageHeader, length), 0x06);
        assert_eq!(offset_of!(PimageHeader, spare), 0x08);
        assert_eq!(offset_of!(PimageHeader, simple_checksum), 0x0a);
        assert_eq!(VALIDATION_WORD, 0x3130_5341);
    }

    #[test]
    fn test_length_words_rounds_up_and_reserves_crc() {
        assert_eq!(length_words(0), 1);
        assert_eq!(length_words(1), 2);
        assert_eq!(length_words(4), 2);
        assert_eq!(length_words(5), 3);
        assert_eq!(length_words(100), 26);
    }

    #[test]
    fn test_encode_writes_fixed_fields() {
        let buf = encoded_block(&sample_payload(100));
        assert_eq!(&buf[64..68], b"AS01");
        assert_eq!(buf[68], 0);
        assert_eq!(buf[69], 0);
        assert_eq!(u16::from_le_bytes([buf[70], buf[71]]), 26);
        assert_eq!(&buf[72..74], &[0, 0]);
        assert_eq!(
            u16::from_le_bytes([buf[74], buf[75]]),
            simple_checksum(&buf[64..74])
        );
        let crc = u32::from_le_bytes([buf[100], buf[101], buf[102], buf[103]]);
        assert_eq!(crc, crc_checksum(&buf[..100]));
        assert!(buf[104..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_round_trip_reports_valid_fields() {
        for len in [80, 100, 101, 1234, 4095] {
            let buf = encoded_block(&sample_payload(len));
            let report = decode_header(&buf).unwrap();
            assert!(report.validation_word.valid);
            assert!(report.version.valid);
            assert!(report.simple_checksum.valid);
            assert!(report.crc_checksum.is_valid());
            assert_eq!(report.length.value as usize, len.div_ceil(4) + 1);
            assert!(report.is_valid(), "payload length {len}");
        }
    }

    #[test]
    fn test_small_payloads_round_trip_or_are_rejected() {
        for len in 0..200 {
            let payload = sample_payload(len);
            let mut buf = vec![0u8; BLOCK_LEN];
            buf[..len].copy_from_slice(&payload);
            let result = encode_header(&mut buf, len);

            if (61..=72).contains(&len) {
                assert_eq!(
                    result,
                    Err(PimageError::CrcOverlapsHeader { payload_len: len })
                );
                continue;
            }
            result.unwrap();
            let report = decode_header(&buf).unwrap();
            assert!(report.validation_word.valid, "payload length {len}");
            assert!(report.version.valid, "payload length {len}");
            assert!(report.simple_checksum.valid, "payload length {len}");
            assert!(report.crc_checksum.is_valid(), "payload length {len}");
            assert_eq!(report.length.value as usize, len.div_ceil(4) + 1);
        }
    }

    #[test]
    fn test_crc_overlap_range() {
        assert!(!crc_overlaps_header(length_words(60)));
        assert!(crc_overlaps_header(length_words(61)));
        assert!(crc_overlaps_header(length_words(72)));
        assert!(!crc_overlaps_header(length_words(73)));
    }

    #[test]
    fn test_decode_does_not_mutate_input() {
        let buf = encoded_block(&sample_payload(500));
        let copy = buf.clone();
        decode_header(&buf).unwrap();
        assert_eq!(buf, copy);
    }

    #[test]
    fn test_length_boundaries_are_producible() {
        // 80 bytes -> 20 payload words + 1 CRC word.
        let report = decode_header(&encoded_block(&sample_payload(80))).unwrap();
        assert_eq!(report.length.value, MIN_LENGTH_WORDS);
        assert!(report.length.valid);

        // 16383 payload words + 1 CRC word fill a 64 KiB block exactly.
        let payload = sample_payload(16383 * 4);
        let buf = encoded_block(&payload);
        let report = decode_header(&buf).unwrap();
        assert_eq!(report.length.value, MAX_LENGTH_WORDS);
        assert!(report.length.valid);
        assert!(report.crc_checksum.is_valid());
    }

    // The range check was historically written as `length < 21 && length > 16384`,
    // which can never be true and so accepted every length. Lengths outside the
    // range are now reported as invalid.
    #[test]
    fn test_length_outside_range_is_invalid() {
        let report = decode_header(&encoded_block(&sample_payload(76))).unwrap();
        assert_eq!(report.length.value, 20);
        assert!(!report.length.valid);
        assert!(!report.is_valid());

        let mut buf = vec![0u8; 128 * 1024];
        buf[..16384 * 4].copy_from_slice(&sample_payload(16384 * 4));
        encode_header(&mut buf, 16384 * 4).unwrap();
        let report = decode_header(&buf).unwrap();
        assert_eq!(report.length.value, 16385);
        assert!(!report.length.valid);
        assert!(report.crc_checksum.is_valid());
    }

    #[test]
    fn test_corrupted_spare_flips_simple_checksum_only() {
        let mut buf = encoded_block(&sample_payload(100));
        buf[0x48] ^= 0x01;
        let report = decode_header(&buf).unwrap();
        assert!(report.validation_word.valid);
        assert!(report.version.valid);
        assert!(report.length.valid);
        assert!(!report.simple_checksum.valid);
        assert_eq!(report.spare, 0x0001);
    }

    #[test]
    fn test_every_invalid_field_is_reported() {
        let mut buf = encoded_block(&sample_payload(100));
        buf[64] = 0;
        buf[68] = 3;
        buf[10] ^= 0xff;
        let report = decode_header(&buf).unwrap();
        assert!(!report.validation_word.valid);
        assert!(!report.version.valid);
        assert!(!report.simple_checksum.valid);
        assert!(matches!(report.crc_checksum, CrcCheck::Invalid { .. }));
        assert!(report.length.valid);
    }

    #[test]
    fn test_crc_not_evaluated_when_length_exceeds_buffer() {
        let mut buf = encoded_block(&sample_payload(100));
        buf[70..72].copy_from_slice(&0xffffu16.to_le_bytes());
        let report = decode_header(&buf).unwrap();
        assert_eq!(report.crc_checksum, CrcCheck::NotEvaluated);
        assert_eq!(report.crc_checksum.value(), None);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_crc_not_evaluated_for_zero_length() {
        let buf = vec![0u8; HEADER_END];
        let report = decode_header(&buf).unwrap();
        assert_eq!(report.length.value, 0);
        assert_eq!(report.crc_checksum, CrcCheck::NotEvaluated);
        assert!(!report.validation_word.valid);
        // All-zero header bytes sum to zero, which matches the stored zero.
        assert!(report.simple_checksum.valid);
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        assert_eq!(
            decode_header(&[0u8; 75]),
            Err(PimageError::BufferTooSmall {
                required: 76,
                actual: 75
            })
        );
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let mut buf = vec![0u8; 100];
        assert_eq!(
            encode_header(&mut buf, 100),
            Err(PimageError::BufferTooSmall {
                required: 104,
                actual: 100
            })
        );
        let mut buf = vec![0u8; 70];
        assert!(matches!(
            encode_header(&mut buf, 0),
            Err(PimageError::BufferTooSmall { required: 76, .. })
        ));
    }

    #[test]
    fn test_encode_rejects_length_field_overflow() {
        let mut buf = vec![0u8; 512 * 1024];
        assert!(matches!(
            encode_header(&mut buf, 65535 * 4),
            Err(PimageError::Oversize { .. })
        ));
    }

    #[test]
    fn test_report_display() {
        let buf = encoded_block(&sample_payload(100));
        let report = decode_header(&buf).unwrap();
        let text = report.to_string();
        assert!(text.contains(" Validation word: 0x31305341\n"));
        assert!(text.contains(" Version: 0\n"));
        assert!(text.contains(" Flags: 0x00\n"));
        assert!(text.contains(" Length: 26 words (104 bytes)\n"));
        assert!(text.contains(" Spare: 0x0000\n"));
        assert!(!text.contains("(invalid)"));

        let mut buf = buf;
        buf[64] = 0;
        let text = decode_header(&buf).unwrap().to_string();
        assert!(text.contains(" Validation word: 0x31305300 (invalid)\n"));
    }

    #[test]
    fn test_report_display_crc_states() {
        let mut buf = encoded_block(&sample_payload(100));
        buf[20] ^= 0x01;
        let text = decode_header(&buf).unwrap().to_string();
        let stored = u32::from_le_bytes([buf[100], buf[101], buf[102], buf[103]]);
        assert!(text.ends_with(&format!(" CRC Checksum: 0x{:08x} (invalid)\n", stored)));

        buf[70..72].copy_from_slice(&0xffffu16.to_le_bytes());
        let text = decode_header(&buf).unwrap().to_string();
        assert!(text.ends_with(" CRC Checksum: not present\n"));
    }

    #[test]
    fn test_report_serializes_crc_status() {
        let report = decode_header(&encoded_block(&sample_payload(100))).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["crc_checksum"]["status"], "valid");
        assert_eq!(json["length"]["value"], 26);
        assert_eq!(json["validation_word"]["valid"], true);
    }
}
