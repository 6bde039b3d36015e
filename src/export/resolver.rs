//! Node metadata lookup for the CSV join.
//!
//! `StrictResolver` answers from the loaded tables and fails on a miss.
//! `PromptResolver` wraps the same tables and asks the operator for whatever is
//! missing, remembering the answers for the rest of the run.

use std::io::{BufRead, Write};

use crate::common::site::{LineOfSight, LineOfSightTable, NodeInfo, NodeTable, Position};

use super::ExportError;

/// Source of node metadata during export.
pub trait MetadataResolver {
    fn node_info(&mut self, link_addr: &str) -> Result<NodeInfo, ExportError>;
    fn line_of_sight(&mut self, id_a: &str, id_b: &str) -> Result<LineOfSight, ExportError>;
}

/// Table lookup only.
#[derive(Debug, Default)]
pub struct StrictResolver {
    nodes: NodeTable,
    los: LineOfSightTable,
}

impl StrictResolver {
    pub fn new(nodes: NodeTable, los: LineOfSightTable) -> Self {
        Self { nodes, los }
    }
}

impl MetadataResolver for StrictResolver {
    fn node_info(&mut self, link_addr: &str) -> Result<NodeInfo, ExportError> {
        self.nodes.get(link_addr).cloned().ok_or_else(|| ExportError::MissingNodeInfo {
            link_addr: link_addr.to_string(),
        })
    }

    fn line_of_sight(&mut self, id_a: &str, id_b: &str) -> Result<LineOfSight, ExportError> {
        self.los.get(id_a, id_b).ok_or_else(|| ExportError::MissingLineOfSight {
            id_a: id_a.to_string(),
            id_b: id_b.to_string(),
        })
    }
}

/// Table lookup with an operator prompt as fallback.
pub struct PromptResolver<R: BufRead, W: Write> {
    nodes: NodeTable,
    los: LineOfSightTable,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptResolver<R, W> {
    pub fn new(nodes: NodeTable, los: LineOfSightTable, input: R, output: W) -> Self {
        Self { nodes, los, input, output }
    }

    /// Print `prompt` and read one trimmed line; `None` at end of input.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>, ExportError> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Ok(None);
        }
        Ok(Some(answer.trim().to_string()))
    }

    /// Ask until the answer converts or input ends.
    fn ask_parsed<T>(&mut self, prompt: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Option<T>, ExportError> {
        loop {
            let Some(answer) = self.ask(prompt)? else {
                return Ok(None);
            };
            match parse(&answer) {
                Some(value) => return Ok(Some(value)),
                None => writeln!(self.output, "Invalid value '{}', try again.", answer)?,
            }
        }
    }

    fn prompt_node_info(&mut self, link_addr: &str) -> Result<Option<NodeInfo>, ExportError> {
        writeln!(self.output, "No node-info for link address {}.", link_addr)?;

        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        let number = |s: &str| s.parse::<f64>().ok();
        let position = |s: &str| {
            let coords: Vec<f64> = s.split_whitespace().map(|c| c.parse().ok()).collect::<Option<_>>()?;
            match coords.as_slice() {
                [x, y, z] => Some(Position { x: *x, y: *y, z: *z }),
                _ => None,
            }
        };

        let Some(id) = self.ask_parsed("Node id: ", non_empty)? else {
            return Ok(None);
        };
        let Some(height) = self.ask_parsed("Height: ", number)? else {
            return Ok(None);
        };
        let Some(antenna) = self.ask_parsed("Antenna type: ", non_empty)? else {
            return Ok(None);
        };
        let Some(temperature) = self.ask_parsed("Temperature: ", number)? else {
            return Ok(None);
        };
        let Some(position) = self.ask_parsed("Position (x y z): ", position)? else {
            return Ok(None);
        };

        Ok(Some(NodeInfo {
            id,
            height,
            antenna,
            temperature,
            position,
        }))
    }
}

impl<R: BufRead, W: Write> MetadataResolver for PromptResolver<R, W> {
    fn node_info(&mut self, link_addr: &str) -> Result<NodeInfo, ExportError> {
        if let Some(info) = self.nodes.get(link_addr) {
            return Ok(info.clone());
        }

        let missing = || ExportError::MissingNodeInfo {
            link_addr: link_addr.to_string(),
        };
        let info = self.prompt_node_info(link_addr)?.ok_or_else(missing)?;
        // The address was just looked up and not found
        let _ = self.nodes.insert(link_addr, info.clone());
        Ok(info)
    }

    fn line_of_sight(&mut self, id_a: &str, id_b: &str) -> Result<LineOfSight, ExportError> {
        if let Some(flag) = self.los.get(id_a, id_b) {
            return Ok(flag);
        }

        let prompt = format!("Is there line of sight between {} and {}? [yes/no]: ", id_a, id_b);
        let flag = self
            .ask_parsed(&prompt, LineOfSight::parse)?
            .ok_or_else(|| ExportError::MissingLineOfSight {
                id_a: id_a.to_string(),
                id_b: id_b.to_string(),
            })?;
        // The pair was just looked up and not found
        let _ = self.los.insert(id_a, id_b, flag);
        Ok(flag)
    }
}
