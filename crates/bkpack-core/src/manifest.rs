//! Layout manifest
//!
//! The JSON document the partition stage writes and every later stage
//! reads back. It is the only hand-off between stages: each consumer
//! loads its own copy and never writes it.

use std::path::Path;
use std::string::String;
use std::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::output::{read_json, to_pretty_json};
use crate::partition::Partition;
use crate::{Error, Result};

/// Serialized partition layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutManifest {
    /// Whether executable partitions are CRC encoded
    pub crc_enable: bool,
    /// Partitions in table order
    pub section: Vec<Partition>,
}

impl LayoutManifest {
    /// Load a manifest written by the partition stage
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("load layout manifest from {}", path.display());
        read_json("partitions json", path)
    }

    /// Parse a manifest from a string
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| Error::Json {
            path: "<memory>".into(),
            source,
        })
    }

    /// Pretty JSON rendering
    pub fn to_json_string(&self) -> Result<String> {
        to_pretty_json(self)
    }

    /// Find a partition by name
    pub fn find(&self, name: &str) -> Option<&Partition> {
        self.section.iter().find(|p| p.name == name)
    }
}
