//! Site metadata: node placement and line-of-sight tables.
//!
//! Both tables are plain text files in the same tagged style as the radio logs:
//!
//! ```text
//! node-info: 0012.4b00.09df.4dee, N1, 1500, dipole, 21.5, 0, 0, 1500
//! los-info: N1, N2, yes
//! ```
//!
//! Untagged lines (comments, blank lines) are ignored.

use anyhow::Context;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const NODE_INFO_TAG: &str = "node-info: ";
pub const LOS_INFO_TAG: &str = "los-info: ";

const FIELD_SEPARATOR: &str = ", ";
const NODE_INFO_FIELDS: usize = 8;
const LOS_INFO_FIELDS: usize = 3;

/// Error type for site table loading failures.
#[derive(Debug)]
pub enum SiteLoadError {
    FileReadError(String),
    ParseError { line: usize, message: String },
    ValidationError(String),
}

impl std::fmt::Display for SiteLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            SiteLoadError::ParseError { line, message } => write!(f, "Line {}: {}", line, message),
            SiteLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for SiteLoadError {}

/// Simple 3D point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Placement and environment of one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfo {
    pub id: String,
    pub height: f64,
    pub antenna: String,
    pub temperature: f64,
    pub position: Position,
}

/// Whether an unobstructed path exists between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineOfSight {
    Yes,
    No,
}

impl LineOfSight {
    /// Accepts yes/no, true/false, 1/0 and los/nlos, in any case.
    pub fn parse(flag: &str) -> Option<Self> {
        match flag.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" | "los" => Some(LineOfSight::Yes),
            "no" | "n" | "false" | "0" | "nlos" => Some(LineOfSight::No),
            _ => None,
        }
    }
}

impl std::fmt::Display for LineOfSight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineOfSight::Yes => write!(f, "yes"),
            LineOfSight::No => write!(f, "no"),
        }
    }
}

/// Node metadata keyed by link address.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    nodes: HashMap<String, NodeInfo>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, link_addr: &str) -> Option<&NodeInfo> {
        self.nodes.get(link_addr)
    }

    /// Insert an entry; an address may only be described once.
    pub fn insert(&mut self, link_addr: impl Into<String>, info: NodeInfo) -> Result<(), SiteLoadError> {
        let link_addr = link_addr.into();
        if self.nodes.contains_key(&link_addr) {
            return Err(SiteLoadError::ValidationError(format!(
                "Duplicate node-info for link address {}",
                link_addr
            )));
        }
        self.nodes.insert(link_addr, info);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parse `node-info:` lines.
    pub fn parse(content: &str) -> Result<Self, SiteLoadError> {
        let mut table = Self::new();
        for (line_no, fields) in tagged_lines(content, NODE_INFO_TAG, NODE_INFO_FIELDS)? {
            let number = |index: usize, name: &str| -> Result<f64, SiteLoadError> {
                fields[index].trim().parse::<f64>().map_err(|_| SiteLoadError::ParseError {
                    line: line_no,
                    message: format!("{} is not a number: '{}'", name, fields[index]),
                })
            };

            let info = NodeInfo {
                id: fields[1].trim().to_string(),
                height: number(2, "height")?,
                antenna: fields[3].trim().to_string(),
                temperature: number(4, "temperature")?,
                position: Position {
                    x: number(5, "x")?,
                    y: number(6, "y")?,
                    z: number(7, "z")?,
                },
            };
            table.insert(fields[0].trim(), info)?;
        }

        // Node ids must be unique as well, line-of-sight entries refer to them
        let mut ids: HashMap<&str, &str> = HashMap::new();
        for (addr, info) in &table.nodes {
            if let Some(other) = ids.insert(info.id.as_str(), addr.as_str()) {
                return Err(SiteLoadError::ValidationError(format!(
                    "Node id {} is used by both {} and {}",
                    info.id, other, addr
                )));
            }
        }

        Ok(table)
    }
}

/// Line-of-sight flags keyed by unordered node id pair.
#[derive(Debug, Clone, Default)]
pub struct LineOfSightTable {
    pairs: HashMap<(String, String), LineOfSight>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl LineOfSightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symmetric lookup.
    pub fn get(&self, id_a: &str, id_b: &str) -> Option<LineOfSight> {
        self.pairs.get(&pair_key(id_a, id_b)).copied()
    }

    pub fn insert(&mut self, id_a: &str, id_b: &str, flag: LineOfSight) -> Result<(), SiteLoadError> {
        let key = pair_key(id_a, id_b);
        if self.pairs.contains_key(&key) {
            return Err(SiteLoadError::ValidationError(format!(
                "Duplicate los-info for nodes {} and {}",
                key.0, key.1
            )));
        }
        self.pairs.insert(key, flag);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Parse `los-info:` lines.
    pub fn parse(content: &str) -> Result<Self, SiteLoadError> {
        let mut table = Self::new();
        for (line_no, fields) in tagged_lines(content, LOS_INFO_TAG, LOS_INFO_FIELDS)? {
            let flag = LineOfSight::parse(fields[2]).ok_or_else(|| SiteLoadError::ParseError {
                line: line_no,
                message: format!("unknown line-of-sight flag '{}'", fields[2]),
            })?;
            table.insert(fields[0].trim(), fields[1].trim(), flag)?;
        }
        Ok(table)
    }
}

/// Collect the fields of every tagged line, with 1-based line numbers.
fn tagged_lines<'a>(content: &'a str, tag: &str, field_count: usize) -> Result<Vec<(usize, Vec<&'a str>)>, SiteLoadError> {
    let mut result = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim_end();
        let Some(pos) = line.find(tag) else {
            continue;
        };
        let fields: Vec<&str> = line[pos + tag.len()..].split(FIELD_SEPARATOR).collect();
        if fields.len() != field_count {
            return Err(SiteLoadError::ParseError {
                line: index + 1,
                message: format!("expected {} fields, found {}", field_count, fields.len()),
            });
        }
        result.push((index + 1, fields));
    }
    Ok(result)
}

fn read(path: &Path) -> Result<String, SiteLoadError> {
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
        .map_err(|e| SiteLoadError::FileReadError(format!("{:#}", e)))
}

/// Load a node-info table from a file.
pub fn load_node_table(path: &Path) -> Result<NodeTable, SiteLoadError> {
    NodeTable::parse(&read(path)?)
}

/// Load a line-of-sight table from a file.
pub fn load_line_of_sight_table(path: &Path) -> Result<LineOfSightTable, SiteLoadError> {
    LineOfSightTable::parse(&read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODES: &str = "\
# field test 2019-12-11
node-info: 0012.4b00.09df.4dee, N1, 1500, dipole, 21.5, 0, 0, 1500

node-info: 0012.4b00.09df.4f01, N2, 1200, whip, 19, 3000, 4000, 1200
";

    #[test]
    fn test_parse_node_table() {
        let table = NodeTable::parse(NODES).unwrap();
        assert_eq!(table.len(), 2);

        let n2 = table.get("0012.4b00.09df.4f01").unwrap();
        assert_eq!(n2.id, "N2");
        assert_eq!(n2.height, 1200.0);
        assert_eq!(n2.antenna, "whip");
        assert_eq!(n2.temperature, 19.0);
        assert_eq!(n2.position, Position { x: 3000.0, y: 4000.0, z: 1200.0 });
        assert!(table.get("0012.4b00.09df.0000").is_none());
    }

    #[test]
    fn test_node_table_rejects_bad_number() {
        let err = NodeTable::parse("node-info: aa, N1, high, dipole, 20, 0, 0, 0").unwrap_err();
        match err {
            SiteLoadError::ParseError { line, message } => {
                assert_eq!(line, 1);
                assert!(message.contains("height"));
            }
            other => panic!("Expected ParseError, got {}", other),
        }
    }

    #[test]
    fn test_node_table_rejects_wrong_field_count() {
        let err = NodeTable::parse("\nnode-info: aa, N1, 1, dipole").unwrap_err();
        assert!(matches!(err, SiteLoadError::ParseError { line: 2, .. }));
    }

    #[test]
    fn test_node_table_rejects_duplicates() {
        let dup_addr = "node-info: aa, N1, 1, d, 1, 0, 0, 0\nnode-info: aa, N2, 1, d, 1, 0, 0, 0";
        assert!(matches!(NodeTable::parse(dup_addr), Err(SiteLoadError::ValidationError(_))));

        let dup_id = "node-info: aa, N1, 1, d, 1, 0, 0, 0\nnode-info: bb, N1, 1, d, 1, 0, 0, 0";
        assert!(matches!(NodeTable::parse(dup_id), Err(SiteLoadError::ValidationError(_))));
    }

    #[test]
    fn test_line_of_sight_is_symmetric() {
        let table = LineOfSightTable::parse("los-info: N1, N2, yes\nlos-info: N3, N1, NLOS\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("N1", "N2"), Some(LineOfSight::Yes));
        assert_eq!(table.get("N2", "N1"), Some(LineOfSight::Yes));
        assert_eq!(table.get("N1", "N3"), Some(LineOfSight::No));
        assert_eq!(table.get("N2", "N3"), None);
    }

    #[test]
    fn test_line_of_sight_rejects_reversed_duplicate() {
        let err = LineOfSightTable::parse("los-info: N1, N2, yes\nlos-info: N2, N1, no").unwrap_err();
        assert!(matches!(err, SiteLoadError::ValidationError(_)));
    }

    #[test]
    fn test_line_of_sight_flags() {
        assert_eq!(LineOfSight::parse("TRUE"), Some(LineOfSight::Yes));
        assert_eq!(LineOfSight::parse("0"), Some(LineOfSight::No));
        assert_eq!(LineOfSight::parse("maybe"), None);
        assert_eq!(LineOfSight::Yes.to_string(), "yes");
        assert!(LineOfSightTable::parse("los-info: N1, N2, maybe").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.txt");
        fs::write(&path, NODES).unwrap();

        assert_eq!(load_node_table(&path).unwrap().len(), 2);
        assert!(matches!(
            load_line_of_sight_table(&dir.path().join("missing.txt")),
            Err(SiteLoadError::FileReadError(_))
        ));
    }
}
