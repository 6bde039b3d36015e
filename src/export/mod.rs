//! Export of analysis results.
//!
//! - `csv_export`: one joined CSV row per received packet
//! - `summary`: JSON summary of every link
//! - `resolver`: where node metadata comes from during the join
//! - `packet_size`: frame size and airtime estimates

pub mod csv_export;
pub mod packet_size;
pub mod resolver;
pub mod summary;

pub use csv_export::{CSV_HEADER, export_csv};
pub use resolver::{MetadataResolver, PromptResolver, StrictResolver};
pub use summary::export_summary;

/// Error type for export failures.
#[derive(Debug)]
pub enum ExportError {
    MissingNodeInfo { link_addr: String },
    MissingLineOfSight { id_a: String, id_b: String },
    InvalidCrcPoly(String),
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::MissingNodeInfo { link_addr } => {
                write!(f, "No node-info entry for link address {}", link_addr)
            }
            ExportError::MissingLineOfSight { id_a, id_b } => {
                write!(f, "No los-info entry for nodes {} and {}", id_a, id_b)
            }
            ExportError::InvalidCrcPoly(poly) => write!(f, "CRC polynomial is not hexadecimal: '{}'", poly),
            ExportError::Io(e) => write!(f, "I/O error: {}", e),
            ExportError::Csv(e) => write!(f, "CSV error: {}", e),
            ExportError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(e) => Some(e),
            ExportError::Csv(e) => Some(e),
            ExportError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Csv(e)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::Json(e)
    }
}
