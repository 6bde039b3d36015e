//! Parse individual log lines into structured `LogRecord` data.
//!
//! Radio nodes print one tagged line per transmitted or received packet:
//!
//! ```text
//! csv-log: <descriptor>, <packet_nr>, <payload_len>, <rssi>, <rssi_offset>, <lqi>,
//!          <tx_power>, <channel>, <channel_center_freq_0>, <channel_spacing>,
//!          <channel_center_freq_curr>, <bitrate>, <symbol_rate>, <rx_filt_bw>,
//!          <preamble_nibbles>, <preamble_word>, <crc_poly>, <crc_init>, <sync_word>,
//!          <sync_word_thr>, <dual_sync_en>, <sync_bits>, <freq_dev>, <mac_hdr_len>,
//!          <rx_link_addr>, <tx_link_addr>
//! ```
//!
//! Anything in front of the tag is ignored, except for the capture time that the
//! stdin timestamper prepends (`<iso time> | <elapsed> | <line>`).

use chrono::NaiveDateTime;

use super::types::{FIELD_COUNT, LogRecord, ParseError, ParseOutcome};

/// Tag printed by the ranger firmware in front of every record.
pub const DEFAULT_TAG: &str = "csv-log: ";

const FIELD_SEPARATOR: &str = ", ";
const TIMESTAMPER_SEPARATOR: &str = " | ";
const TIMESTAMPER_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parse a log line.
///
/// # Parameters
///
/// * `line` - A single log line, with or without its line terminator
/// * `tag` - Literal marker preceding the record fields
///
/// # Returns
///
/// `ParseOutcome::Skipped` when the tag is absent, `ParseOutcome::Malformed` when
/// the fields after the tag do not form a record, `ParseOutcome::Matched` otherwise.
///
/// # Example
///
/// ```text
/// 2019-12-11T10:20:30.123456 | 0:00:01.500000 | [INFO: RANGER] csv-log: 2gfsk_50kbps, 12, 28, -87, 99, 45, 14, 26, 863125, 200, 868325, 50000, 50000, 104166, 8, 0x55, 0x8005, 0xFFFF, 0x930B51DE, 8, 0, 32, 25000, 0, 0012.4b00.09df.4dee, 0012.4b00.09df.4f01
/// ```
pub fn parse_log_line(line: &str, tag: &str) -> ParseOutcome {
    let line = line.trim_end();

    let Some(tag_pos) = line.find(tag) else {
        return ParseOutcome::Skipped;
    };

    let captured_at = parse_timestamp(&line[..tag_pos]);
    let payload = &line[tag_pos + tag.len()..];

    match parse_fields(payload, captured_at) {
        Ok(record) => ParseOutcome::Matched(Box::new(record)),
        Err(e) => ParseOutcome::Malformed(e),
    }
}

/// Extract the timestamper capture time from the text in front of the tag.
fn parse_timestamp(prefix: &str) -> Option<NaiveDateTime> {
    // The timestamper writes at least "<time> | <elapsed> | "
    if !prefix.contains(TIMESTAMPER_SEPARATOR) {
        return None;
    }
    let first = prefix.split(TIMESTAMPER_SEPARATOR).next()?.trim();
    NaiveDateTime::parse_from_str(first, TIMESTAMPER_FORMAT).ok()
}

/// Split the payload and convert every field.
fn parse_fields(payload: &str, captured_at: Option<NaiveDateTime>) -> Result<LogRecord, ParseError> {
    let pieces: Vec<&str> = payload.split(FIELD_SEPARATOR).collect();
    if pieces.len() < FIELD_COUNT {
        return Err(ParseError::FieldCount { found: pieces.len() });
    }

    // Only the descriptor may contain the separator, so surplus pieces belong to it.
    let surplus = pieces.len() - FIELD_COUNT;
    let descriptor = pieces[..=surplus].join(FIELD_SEPARATOR);
    let mut fields = FieldCursor::new(&pieces[surplus + 1..]);

    if descriptor.is_empty() {
        return Err(ParseError::EmptyField { field: "descriptor" });
    }

    Ok(LogRecord {
        captured_at,
        descriptor,
        packet_nr: fields.unsigned("packet_nr")?,
        payload_len: fields.unsigned("payload_len")?,
        rssi: fields.signed("rssi")?,
        rssi_offset: fields.signed("rssi_offset")?,
        lqi: fields.unsigned("lqi")?,
        tx_power: fields.unsigned("tx_power")?,
        channel: fields.unsigned("channel")?,
        channel_center_freq_0: fields.unsigned("channel_center_freq_0")?,
        channel_spacing: fields.unsigned("channel_spacing")?,
        channel_center_freq_curr: fields.unsigned("channel_center_freq_curr")?,
        bitrate: fields.unsigned("bitrate")?,
        symbol_rate: fields.unsigned("symbol_rate")?,
        rx_filt_bw: fields.unsigned("rx_filt_bw")?,
        preamble_nibbles: fields.unsigned("preamble_nibbles")?,
        preamble_word: fields.text("preamble_word")?,
        crc_poly: fields.text("crc_poly")?,
        crc_init: fields.text("crc_init")?,
        sync_word: fields.text("sync_word")?,
        sync_word_thr: fields.unsigned("sync_word_thr")?,
        dual_sync_en: fields.unsigned("dual_sync_en")?,
        sync_bits: fields.unsigned("sync_bits")?,
        freq_dev: fields.unsigned("freq_dev")?,
        mac_hdr_len: fields.unsigned("mac_hdr_len")?,
        rx_link_addr: fields.text("rx_link_addr")?,
        tx_link_addr: fields.text("tx_link_addr")?,
    })
}

/// Sequential reader over the already split record fields.
struct FieldCursor<'a> {
    fields: std::slice::Iter<'a, &'a str>,
}

impl<'a> FieldCursor<'a> {
    fn new(fields: &'a [&'a str]) -> Self {
        Self { fields: fields.iter() }
    }

    fn next_raw(&mut self) -> &'a str {
        // The caller guarantees FIELD_COUNT - 1 pieces remain
        self.fields.next().copied().unwrap_or("")
    }

    fn text(&mut self, field: &'static str) -> Result<String, ParseError> {
        let raw = self.next_raw();
        if raw.is_empty() {
            return Err(ParseError::EmptyField { field });
        }
        Ok(raw.to_string())
    }

    /// Plain decimal digits only; `u32::from_str` alone would also accept a leading `+`.
    fn unsigned(&mut self, field: &'static str) -> Result<u32, ParseError> {
        let raw = self.next_raw();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(field, raw));
        }
        raw.parse().map_err(|_| invalid(field, raw))
    }

    /// Optional sign followed by decimal digits.
    fn signed(&mut self, field: &'static str) -> Result<i32, ParseError> {
        let raw = self.next_raw();
        let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(field, raw));
        }
        raw.parse().map_err(|_| invalid(field, raw))
    }
}

fn invalid(field: &'static str, raw: &str) -> ParseError {
    ParseError::InvalidNumber {
        field,
        value: raw.to_string(),
    }
}
