//! On-air packet size and airtime estimates.
//!
//! The radio logs every configuration field that contributes to the frame:
//!
//! ```text
//! | preamble | sync word | length | MAC header | payload | CRC |
//! ```
//!
//! Preamble is logged in nibbles and the sync word in bits, everything else in
//! bytes except the CRC, whose width follows from the polynomial.

use crate::analyzer::LogRecord;

use super::ExportError;

/// Size and airtime of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketEstimate {
    pub size_bytes: u32,
    /// `None` when the record carries no bitrate.
    pub airtime_us: Option<u64>,
}

/// Width in bytes of the CRC produced by a polynomial given in hex.
///
/// `0x8005` → 2, `0x07` → 1, `0x04C11DB7` → 4, `0` → no CRC.
pub fn crc_bytes(crc_poly: &str) -> Result<u32, ExportError> {
    let trimmed = crc_poly.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let poly = u64::from_str_radix(hex, 16).map_err(|_| ExportError::InvalidCrcPoly(crc_poly.to_string()))?;
    let bits = u64::BITS - poly.leading_zeros();
    Ok(bits.div_ceil(8))
}

/// Estimate the frame size of a logged packet.
///
/// # Formula
///
/// ```text
/// size = ceil((preamble_nibbles * 4 + sync_bits) / 8)
///        + length_field_bytes + mac_hdr_len + payload_len + crc_bytes
/// airtime_us = size * 8 * 1e6 / bitrate
/// ```
pub fn estimate_packet(record: &LogRecord, length_field_bytes: u32) -> Result<PacketEstimate, ExportError> {
    let header_bits = record.preamble_nibbles as u64 * 4 + record.sync_bits as u64;
    let size = header_bits.div_ceil(8)
        + length_field_bytes as u64
        + record.mac_hdr_len as u64
        + record.payload_len as u64
        + crc_bytes(&record.crc_poly)? as u64;
    let size_bytes = u32::try_from(size).unwrap_or(u32::MAX);

    let airtime_us = if record.bitrate == 0 {
        None
    } else {
        Some(size * 8 * 1_000_000 / record.bitrate as u64)
    };

    Ok(PacketEstimate { size_bytes, airtime_us })
}
