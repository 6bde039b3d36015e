//! Analysis run: read both logs, correlate, summarize and report.
//!
//! The receive log is ingested completely before the transmit log, so every
//! receiver is known by the time transmissions are distributed as base records.

use anyhow::Context;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::config::ParserConfig;

use super::log_loader::{LoadError, LogLoader};
use super::receiver::Correlator;
use super::types::{ParseCounters, StatField};

/// Statistics of one descriptor on one (receiver, sender) link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSummary {
    pub receiver: String,
    pub sender: String,
    pub descriptor: String,
    pub transmitted: usize,
    pub received: usize,
    /// Mean RSSI over all received packets, `None` when nothing arrived.
    pub average_rssi: Option<f64>,
    /// `None` when the transmitted sequence does not allow a ratio.
    pub loss_ratio: Option<f64>,
}

/// Everything produced by one run.
#[derive(Debug)]
pub struct Analysis {
    pub correlator: Correlator,
    pub rx_counters: ParseCounters,
    pub tx_counters: ParseCounters,
    pub links: Vec<LinkSummary>,
}

/// Correlate two already opened logs.
pub fn correlate<R1: BufRead, R2: BufRead>(
    rx_loader: &mut LogLoader<R1>,
    tx_loader: &mut LogLoader<R2>,
) -> Result<Analysis, LoadError> {
    let mut correlator = Correlator::new();

    while let Some(record) = rx_loader.next_record()? {
        correlator.ingest_received(record);
    }
    while let Some(record) = tx_loader.next_record()? {
        correlator.ingest_transmitted(record);
    }

    for (name, counters) in [(rx_loader.source(), rx_loader.counters()), (tx_loader.source(), tx_loader.counters())] {
        log::info!(
            "{}: {} lines, {} records, {} skipped, {} malformed",
            name,
            counters.lines(),
            counters.matched,
            counters.skipped,
            counters.malformed
        );
    }
    if correlator.duplicates() > 0 {
        log::warn!("{} duplicate records were ignored", correlator.duplicates());
    }

    let links = summarize(&correlator);

    Ok(Analysis {
        rx_counters: rx_loader.counters(),
        tx_counters: tx_loader.counters(),
        correlator,
        links,
    })
}

/// Open both log files and correlate them.
pub fn analyze_files(rx_log: &Path, tx_log: &Path, options: &ParserConfig) -> anyhow::Result<Analysis> {
    let mut rx_loader = LogLoader::open(rx_log, options)
        .with_context(|| format!("Failed to open receive log {}", rx_log.display()))?;
    let mut tx_loader = LogLoader::open(tx_log, options)
        .with_context(|| format!("Failed to open transmit log {}", tx_log.display()))?;

    correlate(&mut rx_loader, &mut tx_loader).context("Failed to analyze logs")
}

/// Build one summary per receiver, sender and transmitted descriptor.
///
/// Order: receiver address, sender address, then descriptors as first transmitted.
pub fn summarize(correlator: &Correlator) -> Vec<LinkSummary> {
    let mut links = Vec::new();

    for node in correlator.nodes() {
        for (sender, stats) in node.transmissions() {
            for descriptor in stats.unmatched_descriptors() {
                log::warn!(
                    "{} received packets from {} with descriptor {} that were never logged as transmitted",
                    node.node_addr(),
                    sender,
                    descriptor
                );
            }

            for descriptor in stats.descriptors() {
                let received = stats.received_count(descriptor);

                let average_rssi = if received > 0 {
                    stats
                        .average_statistic_all(descriptor, StatField::Rssi)
                        .inspect_err(|e| log::warn!("{}", e))
                        .ok()
                } else {
                    None
                };
                let loss_ratio = stats
                    .loss_ratio_all(descriptor)
                    .inspect_err(|e| log::warn!("{} -> {}: {}", sender, node.node_addr(), e))
                    .ok();

                links.push(LinkSummary {
                    receiver: node.node_addr().to_string(),
                    sender: sender.clone(),
                    descriptor: descriptor.to_string(),
                    transmitted: stats.transmitted_count(descriptor),
                    received,
                    average_rssi,
                    loss_ratio,
                });
            }
        }
    }

    links
}

/// Print the per-link console report.
pub fn write_report<W: Write>(out: &mut W, title: &str, links: &[LinkSummary]) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Results for {}", title)?;
    writeln!(out, "{}", "-".repeat(80))?;

    for link in links {
        if link.received == 0 {
            writeln!(
                out,
                "No messages received by {} from {} with descriptor {}",
                link.receiver, link.sender, link.descriptor
            )?;
            writeln!(out)?;
            continue;
        }

        writeln!(
            out,
            "Amount of received messages by {} from {} with descriptor {}: {}",
            link.receiver, link.sender, link.descriptor, link.received
        )?;
        match link.average_rssi {
            Some(rssi) => writeln!(out, "Average RSSI: {:.2}", rssi)?,
            None => writeln!(out, "Average RSSI: unavailable")?,
        }
        match link.loss_ratio {
            Some(loss) => writeln!(out, "Packet loss rate: {:.2} %", loss * 100.0)?,
            None => writeln!(out, "Packet loss rate: unavailable")?,
        }
        writeln!(out)?;
    }

    Ok(())
}
