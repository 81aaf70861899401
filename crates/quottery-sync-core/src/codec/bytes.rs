//! Offset-addressed little-endian accessors. Callers check the buffer length
//! once against the record size, after which every read here is in bounds.

use crate::error::DecodeError;

use super::layout::{KEY_SIZE, TEXT_SIZE};

pub(super) fn ensure_len(
    record: &'static str,
    buf: &[u8],
    expected: usize,
) -> Result<(), DecodeError> {
    if buf.len() < expected {
        return Err(DecodeError::Truncated {
            record,
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

pub(super) fn array<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}

pub(super) fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(array(buf, offset))
}

pub(super) fn u64_at(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(array(buf, offset))
}

pub(super) fn i8_at(buf: &[u8], offset: usize) -> i8 {
    i8::from_le_bytes([buf[offset]])
}

pub(super) fn key_at(buf: &[u8], offset: usize) -> [u8; KEY_SIZE] {
    array(buf, offset)
}

/// Text up to the first NUL of a 32-byte block.
pub(super) fn text_at(buf: &[u8], offset: usize) -> String {
    let block = &buf[offset..offset + TEXT_SIZE];
    let end = block.iter().position(|&b| b == 0).unwrap_or(TEXT_SIZE);
    String::from_utf8_lossy(&block[..end]).into_owned()
}

pub(super) fn is_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

pub(super) fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub(super) fn put_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

pub(super) fn put_i8(buf: &mut [u8], offset: usize, value: i8) {
    buf[offset] = value.to_le_bytes()[0];
}

pub(super) fn put_bytes(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Writes `text` NUL-padded into a 32-byte block, truncating anything
/// longer than the block.
pub(super) fn put_text(buf: &mut [u8], offset: usize, text: &str) {
    let raw = text.as_bytes();
    let len = raw.len().min(TEXT_SIZE);
    buf[offset..offset + TEXT_SIZE].fill(0);
    buf[offset..offset + len].copy_from_slice(&raw[..len]);
}

/// Fixed-point ×100 to a decimal percentage.
pub(super) fn from_centi(value: u64) -> f64 {
    value as f64 / 100.0
}

pub(super) fn to_centi(value: f64) -> u64 {
    (value * 100.0).round().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_stops_at_first_nul() {
        let mut block = [0u8; 32];
        block[..3].copy_from_slice(b"Yes");
        block[4] = b'x';
        assert_eq!(text_at(&block, 0), "Yes");
    }

    #[test]
    fn text_fills_whole_block_without_nul() {
        let block = [b'a'; 32];
        assert_eq!(text_at(&block, 0).len(), 32);
    }

    #[test]
    fn ensure_len_reports_sizes() {
        let err = ensure_len("bet info", &[0u8; 10], 696).expect_err("must reject");
        assert_eq!(
            err,
            DecodeError::Truncated {
                record: "bet info",
                expected: 696,
                actual: 10
            }
        );
    }

    #[test]
    fn centi_conversion_keeps_two_decimals() {
        assert_eq!(from_centi(1234), 12.34);
        assert_eq!(to_centi(12.34), 1234);
        assert_eq!(to_centi(0.5), 50);
    }
}
