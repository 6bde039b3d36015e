//! JSON summary of one analysis run.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::analyzer::types::ParseCounters;
use crate::analyzer::{Analysis, LinkSummary};

use super::ExportError;

#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub rx_log: String,
    pub tx_log: String,
    pub rx_counters: ParseCounters,
    pub tx_counters: ParseCounters,
    pub duplicates: u64,
    pub links: &'a [LinkSummary],
}

impl<'a> RunSummary<'a> {
    pub fn new(rx_log: &Path, tx_log: &Path, analysis: &'a Analysis) -> Self {
        Self {
            rx_log: rx_log.display().to_string(),
            tx_log: tx_log.display().to_string(),
            rx_counters: analysis.rx_counters,
            tx_counters: analysis.tx_counters,
            duplicates: analysis.correlator.duplicates(),
            links: &analysis.links,
        }
    }
}

/// Pretty-printed JSON to any writer.
pub fn write_summary<W: Write>(mut writer: W, summary: &RunSummary<'_>) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn export_summary(path: &Path, rx_log: &Path, tx_log: &Path, analysis: &Analysis) -> Result<(), ExportError> {
    let summary = RunSummary::new(rx_log, tx_log, analysis);
    let file = File::create(path)?;
    write_summary(BufWriter::new(file), &summary)?;
    log::info!("Wrote summary of {} links to {}", summary.links.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::link_stats::tests::record;
    use crate::analyzer::receiver::Correlator;
    use crate::analyzer::task::summarize;

    fn analysis() -> Analysis {
        let mut correlator = Correlator::new();
        correlator.ingest_received(record("A", 1, -80, "aa", "bb"));
        correlator.ingest_received(record("A", 3, -90, "aa", "bb"));
        for nr in 1..=4 {
            correlator.ingest_transmitted(record("A", nr, 0, "bb", "bb"));
        }
        correlator.ingest_transmitted(record("A", 4, 0, "bb", "bb"));
        let links = summarize(&correlator);
        Analysis {
            correlator,
            rx_counters: ParseCounters {
                matched: 2,
                skipped: 3,
                malformed: 0,
            },
            tx_counters: ParseCounters {
                matched: 5,
                skipped: 0,
                malformed: 1,
            },
            links,
        }
    }

    #[test]
    fn summary_contains_counters_and_links() {
        let analysis = analysis();
        let summary = RunSummary::new(Path::new("rx.log"), Path::new("tx.log"), &analysis);
        let mut out = Vec::new();
        write_summary(&mut out, &summary).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["rx_log"], "rx.log");
        assert_eq!(json["rx_counters"]["skipped"], 3);
        assert_eq!(json["tx_counters"]["malformed"], 1);
        assert_eq!(json["duplicates"], 1);

        let links = json["links"].as_array().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0]["receiver"], "aa");
        assert_eq!(links[0]["sender"], "bb");
        assert_eq!(links[0]["transmitted"], 4);
        assert_eq!(links[0]["received"], 2);
        assert_eq!(links[0]["average_rssi"], -85.0);
        assert_eq!(links[0]["loss_ratio"], 0.5);
    }

    #[test]
    fn export_summary_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        export_summary(&path, Path::new("rx.log"), Path::new("tx.log"), &analysis()).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["tx_log"], "tx.log");
    }
}
