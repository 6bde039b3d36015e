//! Routing of parsed records to per-receiver, per-sender link statistics.

use std::collections::BTreeMap;

use super::link_stats::{LinkStats, StatsError};
use super::types::LogRecord;

/// Everything one node received, keyed by sender address.
#[derive(Debug)]
pub struct ReceiverNode {
    node_addr: String,
    transmissions: BTreeMap<String, LinkStats>,
}

impl ReceiverNode {
    pub fn new(node_addr: impl Into<String>) -> Self {
        Self {
            node_addr: node_addr.into(),
            transmissions: BTreeMap::new(),
        }
    }

    pub fn node_addr(&self) -> &str {
        &self.node_addr
    }

    /// Links of this node, ordered by sender address.
    pub fn transmissions(&self) -> &BTreeMap<String, LinkStats> {
        &self.transmissions
    }

    /// Offer a record to this node.
    ///
    /// Another node's transmission becomes part of the base for that sender; a
    /// reception addressed to this node is stored as received. Everything else
    /// (including this node's own transmissions) is ignored.
    ///
    /// # Returns
    ///
    /// `Ok(true)` when the record was stored, `Ok(false)` when it does not concern
    /// this node, `Err` for a repeated packet number.
    pub fn add_transmission(&mut self, record: LogRecord) -> Result<bool, StatsError> {
        let is_transmission = record.is_transmission();
        let for_this_node = record.rx_link_addr == self.node_addr;

        if is_transmission && !for_this_node {
            self.link_mut(&record.tx_link_addr).add_base(record)?;
            Ok(true)
        } else if !is_transmission && for_this_node {
            self.link_mut(&record.tx_link_addr).add_received(record)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn link_mut(&mut self, sender: &str) -> &mut LinkStats {
        self.transmissions.entry(sender.to_string()).or_default()
    }
}

/// Run-scoped state: all receiver nodes seen so far, ordered by address.
#[derive(Debug, Default)]
pub struct Correlator {
    nodes: BTreeMap<String, ReceiverNode>,
    duplicates: u64,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a record from the receive log.
    pub fn ingest_received(&mut self, record: LogRecord) {
        let addr = record.rx_link_addr.clone();
        let node = self.node_mut(&addr);
        if let Err(e) = node.add_transmission(record) {
            log::warn!("{}", e);
            self.duplicates += 1;
        }
    }

    /// Route a record from the transmit log to every known node.
    ///
    /// The transmitting node itself is registered too, so that it can be matched
    /// against other transmitters' base sequences.
    pub fn ingest_transmitted(&mut self, record: LogRecord) {
        self.node_mut(&record.rx_link_addr);

        for node in self.nodes.values_mut() {
            if let Err(e) = node.add_transmission(record.clone()) {
                log::warn!("{} (receiver {})", e, node.node_addr());
                self.duplicates += 1;
            }
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ReceiverNode> {
        self.nodes.values()
    }

    pub fn node(&self, addr: &str) -> Option<&ReceiverNode> {
        self.nodes.get(addr)
    }

    /// Number of records rejected as duplicates so far.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    fn node_mut(&mut self, addr: &str) -> &mut ReceiverNode {
        self.nodes
            .entry(addr.to_string())
            .or_insert_with(|| ReceiverNode::new(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::link_stats::tests::record;

    #[test]
    fn test_receiver_node_routing() {
        let mut node = ReceiverNode::new("rx");

        // another node's transmission goes to base
        assert!(node.add_transmission(record("A", 1, 0, "tx", "tx")).unwrap());
        // reception for this node
        assert!(node.add_transmission(record("A", 1, -80, "rx", "tx")).unwrap());
        // reception for another node
        assert!(!node.add_transmission(record("A", 2, -80, "other", "tx")).unwrap());
        // own transmission
        assert!(!node.add_transmission(record("A", 3, 0, "rx", "rx")).unwrap());

        let link = &node.transmissions()["tx"];
        assert_eq!(link.transmitted_count("A"), 1);
        assert_eq!(link.received_count("A"), 1);
        assert_eq!(node.transmissions().len(), 1);
    }

    #[test]
    fn test_correlator_end_to_end_loss() {
        let mut correlator = Correlator::new();
        for nr in [1, 2, 4, 5] {
            correlator.ingest_received(record("A", nr, -80, "rx", "tx"));
        }
        for nr in 1..=5 {
            correlator.ingest_transmitted(record("A", nr, 0, "tx", "tx"));
        }

        let link = &correlator.node("rx").unwrap().transmissions()["tx"];
        assert_eq!(link.received_count("A"), 4);
        assert_eq!(link.transmitted_count("A"), 5);
        assert!((link.loss_ratio_all("A").unwrap() - 0.2).abs() < 1e-12);

        // The transmitter is registered as a node but has no links of its own
        let tx_node = correlator.node("tx").unwrap();
        assert!(tx_node.transmissions().is_empty());
        assert_eq!(correlator.duplicates(), 0);
    }

    #[test]
    fn test_correlator_counts_duplicates_and_continues() {
        let mut correlator = Correlator::new();
        correlator.ingest_received(record("A", 1, -80, "rx1", "tx"));
        correlator.ingest_received(record("A", 1, -81, "rx1", "tx"));
        correlator.ingest_received(record("A", 1, -70, "rx2", "tx"));

        correlator.ingest_transmitted(record("A", 1, 0, "tx", "tx"));
        correlator.ingest_transmitted(record("A", 1, 0, "tx", "tx"));

        // one duplicate reception, plus the repeated transmission for both receivers
        assert_eq!(correlator.duplicates(), 3);
        assert_eq!(correlator.node("rx1").unwrap().transmissions()["tx"].received_count("A"), 1);
        assert_eq!(correlator.node("rx2").unwrap().transmissions()["tx"].transmitted_count("A"), 1);
    }

    #[test]
    fn test_transmitters_see_each_other() {
        let mut correlator = Correlator::new();
        correlator.ingest_transmitted(record("A", 1, 0, "n1", "n1"));
        correlator.ingest_transmitted(record("A", 1, 0, "n2", "n2"));

        // n1 was known when n2 transmitted; n2 did not exist yet when n1 transmitted
        let n1 = correlator.node("n1").unwrap();
        assert_eq!(n1.transmissions()["n2"].transmitted_count("A"), 1);
        assert!(correlator.node("n2").unwrap().transmissions().is_empty());
    }
}
