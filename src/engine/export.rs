//! JSON interchange for dissection trees.
//!
//! Each node is `{"Field", "Value", "Size", "Children"}`; empty `Field`,
//! `Value` and `Children` are left out on write and default on read.

use std::io::Write;

use serde::{Deserialize, Serialize};

use super::error::ExportError;
use super::tree::{NodeIndex, PacketTree};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportNode {
    #[serde(rename = "Field", default, skip_serializing_if = "String::is_empty")]
    pub field: String,

    #[serde(rename = "Value", default, skip_serializing_if = "String::is_empty")]
    pub value: String,

    #[serde(rename = "Size")]
    pub size: usize,

    #[serde(rename = "Children", default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExportNode>,
}

impl ExportNode {
    /// Exports a whole packet, starting at its root.
    pub fn from_tree(tree: &PacketTree) -> Self {
        Self::from_node(tree, tree.root())
    }

    pub fn from_node(tree: &PacketTree, index: NodeIndex) -> Self {
        let node = tree.node(index);
        Self {
            field: node.field.clone(),
            value: node.value.clone(),
            size: node.size,
            children: node
                .children
                .iter()
                .map(|child| Self::from_node(tree, *child))
                .collect(),
        }
    }
}

pub fn to_json(nodes: &[ExportNode], pretty: bool) -> Result<String, ExportError> {
    let json = if pretty {
        serde_json::to_string_pretty(nodes)?
    } else {
        serde_json::to_string(nodes)?
    };
    Ok(json)
}

pub fn from_json(json: &str) -> Result<Vec<ExportNode>, ExportError> {
    Ok(serde_json::from_str(json)?)
}

pub fn write_json<W: Write>(
    mut writer: W,
    nodes: &[ExportNode],
    pretty: bool,
) -> Result<(), ExportError> {
    if pretty {
        serde_json::to_writer_pretty(&mut writer, nodes)?;
    } else {
        serde_json::to_writer(&mut writer, nodes)?;
    }
    writeln!(writer)?;
    Ok(())
}
