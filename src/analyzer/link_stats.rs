//! Per-link packet bookkeeping.
//!
//! A `LinkStats` holds everything one receiver knows about one sender: the
//! packets it received and the packets the sender claims to have transmitted
//! (the base), both grouped by RF descriptor.

use std::collections::HashSet;

use super::types::{LogRecord, StatField};

/// Error type for statistics and insertion failures.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsError {
    /// A received record with this descriptor and packet number already exists.
    DuplicatePacket { descriptor: String, packet_nr: u32 },
    /// A base record with this descriptor and packet number already exists.
    DuplicateBase { descriptor: String, packet_nr: u32 },
    NoReceived { descriptor: String },
    NoTransmitted { descriptor: String },
    InvalidSampleCount,
    NotEnoughSamples { requested: usize, available: usize },
    /// The base sequence does not increase over the sampled range.
    DegenerateSequence { descriptor: String, first: u32, last: u32 },
}

impl std::fmt::Display for StatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsError::DuplicatePacket { descriptor, packet_nr } => write!(
                f,
                "A message with RF descriptor {} and packet nr. {} has already been added",
                descriptor, packet_nr
            ),
            StatsError::DuplicateBase { descriptor, packet_nr } => write!(
                f,
                "A message with RF descriptor {} and packet nr. {} has already been added to base",
                descriptor, packet_nr
            ),
            StatsError::NoReceived { descriptor } => {
                write!(f, "There are no received messages with descriptor {}", descriptor)
            }
            StatsError::NoTransmitted { descriptor } => {
                write!(f, "There were no sent messages with descriptor {}", descriptor)
            }
            StatsError::InvalidSampleCount => write!(f, "Cannot process zero messages"),
            StatsError::NotEnoughSamples { requested, available } => write!(
                f,
                "There are not enough messages to process: requested {}, available {}",
                requested, available
            ),
            StatsError::DegenerateSequence { descriptor, first, last } => write!(
                f,
                "Packet numbers for descriptor {} do not increase (first {}, last {})",
                descriptor, first, last
            ),
        }
    }
}

impl std::error::Error for StatsError {}

/// Records of one descriptor, in insertion order, unique by packet number.
#[derive(Debug, Default)]
struct PacketList {
    records: Vec<LogRecord>,
    packet_nrs: HashSet<u32>,
}

impl PacketList {
    /// Returns `false` and leaves the list untouched for a repeated packet number.
    fn insert(&mut self, record: LogRecord) -> bool {
        if !self.packet_nrs.insert(record.packet_nr) {
            return false;
        }
        self.records.push(record);
        true
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Received and transmitted packets of one (receiver, sender) link.
#[derive(Debug, Default)]
pub struct LinkStats {
    // Vec keeps descriptors in first-seen order; a link rarely sees more than a handful.
    received: Vec<(String, PacketList)>,
    base: Vec<(String, PacketList)>,
}

fn find<'a>(lists: &'a [(String, PacketList)], descriptor: &str) -> Option<&'a PacketList> {
    lists.iter().find(|(d, _)| d == descriptor).map(|(_, list)| list)
}

fn find_or_insert<'a>(lists: &'a mut Vec<(String, PacketList)>, descriptor: &str) -> &'a mut PacketList {
    let index = match lists.iter().position(|(d, _)| d == descriptor) {
        Some(index) => index,
        None => {
            lists.push((descriptor.to_string(), PacketList::default()));
            lists.len() - 1
        }
    };
    &mut lists[index].1
}

impl LinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a packet the receiver logged.
    pub fn add_received(&mut self, record: LogRecord) -> Result<(), StatsError> {
        let descriptor = record.descriptor.clone();
        let packet_nr = record.packet_nr;
        if find_or_insert(&mut self.received, &descriptor).insert(record) {
            Ok(())
        } else {
            Err(StatsError::DuplicatePacket { descriptor, packet_nr })
        }
    }

    /// Add a packet the sender logged as transmitted.
    pub fn add_base(&mut self, record: LogRecord) -> Result<(), StatsError> {
        let descriptor = record.descriptor.clone();
        let packet_nr = record.packet_nr;
        if find_or_insert(&mut self.base, &descriptor).insert(record) {
            Ok(())
        } else {
            Err(StatsError::DuplicateBase { descriptor, packet_nr })
        }
    }

    /// Descriptors the sender transmitted with, in first-seen order.
    pub fn descriptors(&self) -> Vec<&str> {
        self.base.iter().map(|(d, _)| d.as_str()).collect()
    }

    /// Descriptors that were received but never appear in the base.
    pub fn unmatched_descriptors(&self) -> Vec<&str> {
        self.received
            .iter()
            .filter(|(d, _)| find(&self.base, d).is_none())
            .map(|(d, _)| d.as_str())
            .collect()
    }

    pub fn received_count(&self, descriptor: &str) -> usize {
        find(&self.received, descriptor).map_or(0, PacketList::len)
    }

    pub fn transmitted_count(&self, descriptor: &str) -> usize {
        find(&self.base, descriptor).map_or(0, PacketList::len)
    }

    /// Received records of a descriptor in insertion order.
    pub fn received_records(&self, descriptor: &str) -> &[LogRecord] {
        find(&self.received, descriptor).map(|list| list.records.as_slice()).unwrap_or(&[])
    }

    /// Mean of `field` over the first `amount` received records.
    pub fn average_statistic(&self, descriptor: &str, field: StatField, amount: usize) -> Result<f64, StatsError> {
        let list = find(&self.received, descriptor).ok_or_else(|| StatsError::NoReceived {
            descriptor: descriptor.to_string(),
        })?;

        if amount == 0 {
            return Err(StatsError::InvalidSampleCount);
        }
        if amount > list.len() {
            return Err(StatsError::NotEnoughSamples {
                requested: amount,
                available: list.len(),
            });
        }

        let sum: f64 = list.records[..amount].iter().map(|r| r.stat_value(field)).sum();
        Ok(sum / amount as f64)
    }

    pub fn average_statistic_all(&self, descriptor: &str, field: StatField) -> Result<f64, StatsError> {
        let amount = self.received_count(descriptor);
        self.average_statistic(descriptor, field, amount)
    }

    /// Fraction of the first `amount` base packets that never arrived.
    ///
    /// The denominator is the packet number span `last - first + 1` of the sampled
    /// base records, so gaps in the transmit log or a wrapped counter skew the
    /// result. A span that is not positive is reported as `DegenerateSequence`.
    pub fn loss_ratio(&self, descriptor: &str, amount: usize) -> Result<f64, StatsError> {
        let base = find(&self.base, descriptor).ok_or_else(|| StatsError::NoTransmitted {
            descriptor: descriptor.to_string(),
        })?;

        if amount == 0 {
            return Err(StatsError::InvalidSampleCount);
        }
        if amount > base.len() {
            return Err(StatsError::NotEnoughSamples {
                requested: amount,
                available: base.len(),
            });
        }

        let Some(received) = find(&self.received, descriptor) else {
            return Ok(1.0);
        };

        let sampled = &base.records[..amount];
        let lost = sampled
            .iter()
            .filter(|r| !received.packet_nrs.contains(&r.packet_nr))
            .count();

        let first = sampled[0].packet_nr;
        let last = sampled[amount - 1].packet_nr;
        let total = last as i64 - first as i64 + 1;
        if total <= 0 {
            return Err(StatsError::DegenerateSequence {
                descriptor: descriptor.to_string(),
                first,
                last,
            });
        }

        Ok(lost as f64 / total as f64)
    }

    pub fn loss_ratio_all(&self, descriptor: &str) -> Result<f64, StatsError> {
        let amount = self.transmitted_count(descriptor);
        self.loss_ratio(descriptor, amount)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal record for bookkeeping tests.
    pub(crate) fn record(descriptor: &str, packet_nr: u32, rssi: i32, rx: &str, tx: &str) -> LogRecord {
        LogRecord {
            captured_at: None,
            descriptor: descriptor.to_string(),
            packet_nr,
            payload_len: 28,
            rssi,
            rssi_offset: 99,
            lqi: 40,
            tx_power: 14,
            channel: 26,
            channel_center_freq_0: 863125,
            channel_spacing: 200,
            channel_center_freq_curr: 868325,
            bitrate: 50000,
            symbol_rate: 50000,
            rx_filt_bw: 104166,
            preamble_nibbles: 8,
            preamble_word: "0x55".to_string(),
            crc_poly: "0x8005".to_string(),
            crc_init: "0xFFFF".to_string(),
            sync_word: "0x930B51DE".to_string(),
            sync_word_thr: 8,
            dual_sync_en: 0,
            sync_bits: 32,
            freq_dev: 25000,
            mac_hdr_len: 0,
            rx_link_addr: rx.to_string(),
            tx_link_addr: tx.to_string(),
        }
    }

    fn base_and_received(base: &[u32], received: &[u32]) -> LinkStats {
        let mut stats = LinkStats::new();
        for &nr in base {
            stats.add_base(record("A", nr, 0, "tx", "tx")).unwrap();
        }
        for &nr in received {
            stats.add_received(record("A", nr, -80, "rx", "tx")).unwrap();
        }
        stats
    }

    #[test]
    fn test_duplicate_received_is_rejected() {
        let mut stats = LinkStats::new();
        stats.add_received(record("A", 7, -80, "rx", "tx")).unwrap();

        let err = stats.add_received(record("A", 7, -60, "rx", "tx")).unwrap_err();
        assert_eq!(
            err,
            StatsError::DuplicatePacket {
                descriptor: "A".to_string(),
                packet_nr: 7
            }
        );
        assert_eq!(stats.received_count("A"), 1);
        assert_eq!(stats.received_records("A")[0].rssi, -80);

        // Same packet number under another descriptor is a different packet
        stats.add_received(record("B", 7, -60, "rx", "tx")).unwrap();
        assert_eq!(stats.received_count("B"), 1);
    }

    #[test]
    fn test_duplicate_base_is_rejected() {
        let mut stats = LinkStats::new();
        stats.add_base(record("A", 1, 0, "tx", "tx")).unwrap();
        assert!(matches!(
            stats.add_base(record("A", 1, 0, "tx", "tx")),
            Err(StatsError::DuplicateBase { packet_nr: 1, .. })
        ));
        assert_eq!(stats.transmitted_count("A"), 1);
    }

    #[test]
    fn test_average_statistic() {
        let mut stats = LinkStats::new();
        stats.add_received(record("A", 1, -80, "rx", "tx")).unwrap();
        stats.add_received(record("A", 2, -90, "rx", "tx")).unwrap();
        stats.add_received(record("A", 3, -100, "rx", "tx")).unwrap();

        assert_eq!(stats.average_statistic("A", StatField::Rssi, 1).unwrap(), -80.0);
        assert_eq!(stats.average_statistic("A", StatField::Rssi, 2).unwrap(), -85.0);
        assert_eq!(stats.average_statistic_all("A", StatField::Rssi).unwrap(), -90.0);
        assert_eq!(stats.average_statistic_all("A", StatField::Lqi).unwrap(), 40.0);
    }

    #[test]
    fn test_average_statistic_rejects_bad_amounts() {
        let stats = base_and_received(&[], &[1, 2]);

        assert_eq!(
            stats.average_statistic("A", StatField::Rssi, 0),
            Err(StatsError::InvalidSampleCount)
        );
        assert_eq!(
            stats.average_statistic("A", StatField::Rssi, 3),
            Err(StatsError::NotEnoughSamples {
                requested: 3,
                available: 2
            })
        );
        assert!(matches!(
            stats.average_statistic("B", StatField::Rssi, 1),
            Err(StatsError::NoReceived { .. })
        ));
    }

    #[test]
    fn test_loss_ratio_one_missing_packet() {
        let stats = base_and_received(&[1, 2, 3, 4, 5], &[1, 2, 4, 5]);
        let loss = stats.loss_ratio_all("A").unwrap();
        assert!((loss - 0.20).abs() < 1e-12);
    }

    #[test]
    fn test_loss_ratio_counts_missing_first_packet() {
        let stats = base_and_received(&[1, 2, 3, 4, 5], &[2, 3, 4, 5]);
        assert!((stats.loss_ratio_all("A").unwrap() - 0.20).abs() < 1e-12);
    }

    #[test]
    fn test_loss_ratio_nothing_lost() {
        let stats = base_and_received(&[10, 11, 12], &[10, 11, 12]);
        assert_eq!(stats.loss_ratio_all("A").unwrap(), 0.0);
    }

    #[test]
    fn test_loss_ratio_nothing_received() {
        let stats = base_and_received(&[1, 2, 3], &[]);
        assert_eq!(stats.loss_ratio_all("A").unwrap(), 1.0);
        assert_eq!(stats.received_count("A"), 0);
    }

    #[test]
    fn test_loss_ratio_partial_amount() {
        let stats = base_and_received(&[1, 2, 3, 4], &[1, 4]);
        // first three base packets: 2 and 3 lost over a span of 3
        let loss = stats.loss_ratio("A", 3).unwrap();
        assert!((loss - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_loss_ratio_span_uses_packet_numbers() {
        // Packet 3 is missing from the transmit log as well, so it is not counted
        // as lost but still widens the span.
        let stats = base_and_received(&[1, 2, 4, 5], &[1, 2, 4]);
        assert!((stats.loss_ratio_all("A").unwrap() - 0.20).abs() < 1e-12);
    }

    #[test]
    fn test_loss_ratio_wrapped_sequence_is_degenerate() {
        let stats = base_and_received(&[5, 6, 1], &[5]);
        assert!(matches!(
            stats.loss_ratio_all("A"),
            Err(StatsError::DegenerateSequence { first: 5, last: 1, .. })
        ));
    }

    #[test]
    fn test_loss_ratio_rejects_bad_amounts() {
        let stats = base_and_received(&[1, 2], &[1]);
        assert_eq!(stats.loss_ratio("A", 0), Err(StatsError::InvalidSampleCount));
        assert!(matches!(stats.loss_ratio("A", 3), Err(StatsError::NotEnoughSamples { .. })));
        assert!(matches!(stats.loss_ratio("B", 1), Err(StatsError::NoTransmitted { .. })));
    }

    #[test]
    fn test_descriptor_order_and_unmatched() {
        let mut stats = LinkStats::new();
        stats.add_base(record("B", 1, 0, "tx", "tx")).unwrap();
        stats.add_base(record("A", 1, 0, "tx", "tx")).unwrap();
        stats.add_received(record("C", 1, -70, "rx", "tx")).unwrap();

        assert_eq!(stats.descriptors(), vec!["B", "A"]);
        assert_eq!(stats.unmatched_descriptors(), vec!["C"]);
    }
}
