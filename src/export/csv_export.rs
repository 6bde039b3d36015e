//! CSV export of received packets joined with site metadata.
//!
//! One row per received packet of every link summary that received anything.
//! Column names match what the plotting scripts expect (`MCS`,
//! `Distance_from_tx`, `Is_line_of_sight`, `Received_power`, `Packet_loss`).

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::analyzer::{Analysis, LinkSummary, LogRecord};
use crate::common::geometry::distance;
use crate::common::site::{LineOfSight, NodeInfo};
use crate::config::ExportConfig;

use super::ExportError;
use super::packet_size::estimate_packet;
use super::resolver::MetadataResolver;

/// Fixed CSV header.
pub const CSV_HEADER: [&str; 41] = [
    "Rx_link_addr",
    "Tx_link_addr",
    "Rx_node_id",
    "Tx_node_id",
    "MCS",
    "Packet_nr",
    "Timestamp",
    "Payload_len",
    "Packet_size",
    "Airtime_us",
    "Received_power",
    "Rssi_offset",
    "Lqi",
    "Tx_power",
    "Channel",
    "Channel_center_freq_0",
    "Channel_spacing",
    "Channel_center_freq_curr",
    "Bitrate",
    "Symbol_rate",
    "Rx_filt_bw",
    "Preamble_nibbles",
    "Preamble_word",
    "Crc_poly",
    "Crc_init",
    "Sync_word",
    "Sync_word_thr",
    "Dual_sync_en",
    "Sync_bits",
    "Freq_dev",
    "Mac_hdr_len",
    "Rx_height",
    "Tx_height",
    "Rx_antenna",
    "Tx_antenna",
    "Rx_temperature",
    "Tx_temperature",
    "Distance_from_tx",
    "Is_line_of_sight",
    "Average_received_power",
    "Packet_loss",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Metadata shared by every row of one link.
struct LinkJoin {
    rx: NodeInfo,
    tx: NodeInfo,
    distance: f64,
    line_of_sight: LineOfSight,
}

fn join_link(resolver: &mut dyn MetadataResolver, link: &LinkSummary) -> Result<LinkJoin, ExportError> {
    let rx = resolver.node_info(&link.receiver)?;
    let tx = resolver.node_info(&link.sender)?;
    let line_of_sight = resolver.line_of_sight(&rx.id, &tx.id)?;
    let distance = distance(&rx.position, &tx.position);
    Ok(LinkJoin {
        rx,
        tx,
        distance,
        line_of_sight,
    })
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn build_row(
    record: &LogRecord,
    link: &LinkSummary,
    join: Option<&LinkJoin>,
    export: &ExportConfig,
) -> Result<Vec<String>, ExportError> {
    let estimate = estimate_packet(record, export.length_field_bytes)?;

    let mut row = vec![
        record.rx_link_addr.clone(),
        record.tx_link_addr.clone(),
        opt(join.map(|j| &j.rx.id)),
        opt(join.map(|j| &j.tx.id)),
        record.descriptor.clone(),
        record.packet_nr.to_string(),
        opt(record.captured_at.map(|t| t.format(TIMESTAMP_FORMAT))),
        record.payload_len.to_string(),
        estimate.size_bytes.to_string(),
        opt(estimate.airtime_us),
        record.rssi.to_string(),
        record.rssi_offset.to_string(),
        record.lqi.to_string(),
        record.tx_power.to_string(),
        record.channel.to_string(),
        record.channel_center_freq_0.to_string(),
        record.channel_spacing.to_string(),
        record.channel_center_freq_curr.to_string(),
        record.bitrate.to_string(),
        record.symbol_rate.to_string(),
        record.rx_filt_bw.to_string(),
        record.preamble_nibbles.to_string(),
        record.preamble_word.clone(),
        record.crc_poly.clone(),
        record.crc_init.clone(),
        record.sync_word.clone(),
        record.sync_word_thr.to_string(),
        record.dual_sync_en.to_string(),
        record.sync_bits.to_string(),
        record.freq_dev.to_string(),
        record.mac_hdr_len.to_string(),
    ];
    row.extend([
        opt(join.map(|j| j.rx.height)),
        opt(join.map(|j| j.tx.height)),
        opt(join.map(|j| &j.rx.antenna)),
        opt(join.map(|j| &j.tx.antenna)),
        opt(join.map(|j| j.rx.temperature)),
        opt(join.map(|j| j.tx.temperature)),
        opt(join.map(|j| j.distance)),
        opt(join.map(|j| j.line_of_sight)),
        opt(link.average_rssi),
        opt(link.loss_ratio.map(|loss| loss * 100.0)),
    ]);

    Ok(row)
}

/// Build every CSV row.
///
/// With a resolver, rows are joined with node metadata and any missing entry is
/// an error. Without one, the metadata columns stay empty.
pub fn build_rows(
    analysis: &Analysis,
    mut resolver: Option<&mut dyn MetadataResolver>,
    export: &ExportConfig,
) -> Result<Vec<Vec<String>>, ExportError> {
    let mut rows = Vec::new();

    for link in analysis.links.iter().filter(|l| l.received > 0) {
        let Some(stats) = analysis
            .correlator
            .node(&link.receiver)
            .and_then(|node| node.transmissions().get(&link.sender))
        else {
            continue;
        };

        let join = match resolver.as_deref_mut() {
            Some(resolver) => Some(join_link(resolver, link)?),
            None => None,
        };

        for record in stats.received_records(&link.descriptor) {
            rows.push(build_row(record, link, join.as_ref(), export)?);
        }
    }

    Ok(rows)
}

/// Write header and rows to any writer.
pub fn write_csv<W: Write>(writer: W, rows: &[Vec<String>]) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Build the rows and write them to `path`.
///
/// # Returns
///
/// The number of data rows written.
pub fn export_csv(
    path: &Path,
    analysis: &Analysis,
    resolver: Option<&mut dyn MetadataResolver>,
    export: &ExportConfig,
) -> Result<usize, ExportError> {
    // Resolve everything before touching the output file
    let rows = build_rows(analysis, resolver, export)?;
    if rows.is_empty() {
        log::warn!("No received packets to export, {} will only contain the header", path.display());
    }

    let file = File::create(path)?;
    write_csv(file, &rows)?;
    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}
