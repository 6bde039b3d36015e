//! Type definitions specific to the analyzer module.

use chrono::NaiveDateTime;
use serde::Serialize;

/// Number of comma-separated fields following the log tag.
pub const FIELD_COUNT: usize = 26;

/// One fully parsed `csv-log:` line.
///
/// Radio nodes print the same record for every transmitted and every received
/// packet. A transmitter logs itself as both receiver and sender, which is how
/// the two kinds of record are told apart (see [`LogRecord::is_transmission`]).
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Capture time added by the stdin timestamper, when present.
    pub captured_at: Option<NaiveDateTime>,
    pub descriptor: String,
    pub packet_nr: u32,
    pub payload_len: u32,
    pub rssi: i32,
    pub rssi_offset: i32,
    pub lqi: u32,
    pub tx_power: u32,
    pub channel: u32,
    pub channel_center_freq_0: u32,
    pub channel_spacing: u32,
    pub channel_center_freq_curr: u32,
    pub bitrate: u32,
    pub symbol_rate: u32,
    pub rx_filt_bw: u32,
    pub preamble_nibbles: u32,
    pub preamble_word: String,
    pub crc_poly: String,
    pub crc_init: String,
    pub sync_word: String,
    pub sync_word_thr: u32,
    pub dual_sync_en: u32,
    pub sync_bits: u32,
    pub freq_dev: u32,
    pub mac_hdr_len: u32,
    pub rx_link_addr: String,
    pub tx_link_addr: String,
}

impl LogRecord {
    /// A transmitter logs its own packets with identical rx/tx addresses.
    pub fn is_transmission(&self) -> bool {
        self.rx_link_addr == self.tx_link_addr
    }

    /// Numeric value of a field that can be averaged.
    pub fn stat_value(&self, field: StatField) -> f64 {
        match field {
            StatField::Rssi => self.rssi as f64,
            StatField::RssiOffset => self.rssi_offset as f64,
            StatField::Lqi => self.lqi as f64,
            StatField::PayloadLen => self.payload_len as f64,
            StatField::TxPower => self.tx_power as f64,
        }
    }
}

/// Record fields supported by `LinkStats::average_statistic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatField {
    Rssi,
    RssiOffset,
    Lqi,
    PayloadLen,
    TxPower,
}

impl std::fmt::Display for StatField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatField::Rssi => write!(f, "rssi"),
            StatField::RssiOffset => write!(f, "rssi_offset"),
            StatField::Lqi => write!(f, "lqi"),
            StatField::PayloadLen => write!(f, "payload_len"),
            StatField::TxPower => write!(f, "tx_power"),
        }
    }
}

/// Result of feeding one line to the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The line carried the tag and all fields converted.
    Matched(Box<LogRecord>),
    /// The tag is absent; the line is unrelated console output.
    Skipped,
    /// The tag is present but the fields do not form a record.
    Malformed(ParseError),
}

/// Reason a tagged line could not be turned into a [`LogRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer than [`FIELD_COUNT`] fields after the tag.
    FieldCount { found: usize },
    /// A text field is empty.
    EmptyField { field: &'static str },
    /// A numeric field did not convert.
    InvalidNumber { field: &'static str, value: String },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::FieldCount { found } => {
                write!(f, "expected {} fields after the tag, found {}", FIELD_COUNT, found)
            }
            ParseError::EmptyField { field } => write!(f, "field '{}' is empty", field),
            ParseError::InvalidNumber { field, value } => {
                write!(f, "field '{}' is not a valid number: '{}'", field, value)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Per-file parse counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseCounters {
    pub matched: u64,
    pub skipped: u64,
    pub malformed: u64,
}

impl ParseCounters {
    pub fn lines(&self) -> u64 {
        self.matched + self.skipped + self.malformed
    }
}
