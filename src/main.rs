use anyhow::Context;
use clap::Parser;
use env_logger::Builder;
use log::{LevelFilter, info, warn};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::analyzer::analyze_files;
use crate::analyzer::task::write_report;
use crate::common::site::{LineOfSightTable, NodeTable, load_line_of_sight_table, load_node_table};
use crate::config::AnalyzerConfig;
use crate::export::{MetadataResolver, PromptResolver, StrictResolver, export_csv, export_summary};

mod analyzer;
mod common;
mod config;
mod export;

/// Analyze ranger range-test logs: per-link RSSI and packet loss, joined CSV export.
#[derive(Parser, Debug)]
#[command(name = "ranger-analyzer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log of the receiving node
    #[arg(value_name = "RXLOG")]
    rx_log: PathBuf,

    /// Log of the transmitting node
    #[arg(value_name = "TXLOG")]
    tx_log: PathBuf,

    /// Write one row per received packet to this CSV file
    #[arg(short, long, value_name = "PATH")]
    csvfile: Option<PathBuf>,

    /// Node-info table, enables the metadata join
    #[arg(short, long, value_name = "PATH")]
    nodes: Option<PathBuf>,

    /// Line-of-sight table
    #[arg(short, long, value_name = "PATH")]
    los: Option<PathBuf>,

    /// Write a JSON summary of every link to this file
    #[arg(short, long, value_name = "PATH")]
    summary: Option<PathBuf>,

    /// TOML configuration (default: ranger.toml next to RXLOG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Ask for node metadata missing from the tables
    #[arg(short, long)]
    interactive: bool,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn crate_log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn load_tables(nodes: Option<&Path>, los: Option<&Path>) -> anyhow::Result<(NodeTable, LineOfSightTable)> {
    let node_table = match nodes {
        Some(path) => load_node_table(path).with_context(|| format!("Failed to load node table {}", path.display()))?,
        None => NodeTable::new(),
    };
    let los_table = match los {
        Some(path) => load_line_of_sight_table(path)
            .with_context(|| format!("Failed to load line-of-sight table {}", path.display()))?,
        None => LineOfSightTable::new(),
    };
    info!("Loaded {} node-info and {} los-info entries", node_table.len(), los_table.len());
    Ok((node_table, los_table))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("ranger_analyzer"), crate_log_level(cli.verbose))
        .parse_default_env()
        .init();

    let config = AnalyzerConfig::resolve(cli.config.as_deref(), &cli.rx_log).map_err(anyhow::Error::msg)?;

    let analysis = analyze_files(&cli.rx_log, &cli.tx_log, &config.parser)?;

    let mut stdout = io::stdout().lock();
    write_report(&mut stdout, &cli.rx_log.display().to_string(), &analysis.links)
        .context("Failed to write report")?;
    stdout.flush()?;
    drop(stdout);

    if let Some(csv_path) = &cli.csvfile {
        let join = cli.nodes.is_some() || cli.interactive;
        if !join && cli.los.is_some() {
            warn!("--los has no effect without --nodes or --interactive");
        }

        let exported = if join {
            let (nodes, los) = load_tables(cli.nodes.as_deref(), cli.los.as_deref())?;
            let mut resolver: Box<dyn MetadataResolver> = if cli.interactive {
                Box::new(PromptResolver::new(nodes, los, io::stdin().lock(), io::stdout()))
            } else {
                Box::new(StrictResolver::new(nodes, los))
            };
            export_csv(csv_path, &analysis, Some(resolver.as_mut()), &config.export)
        } else {
            export_csv(csv_path, &analysis, None, &config.export)
        };
        exported.with_context(|| format!("Failed to export CSV {}", csv_path.display()))?;
    }

    if let Some(summary_path) = &cli.summary {
        export_summary(summary_path, &cli.rx_log, &cli.tx_log, &analysis)
            .with_context(|| format!("Failed to write summary {}", summary_path.display()))?;
    }

    Ok(())
}
