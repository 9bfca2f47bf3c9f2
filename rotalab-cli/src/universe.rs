//! Universe configuration — group-organized symbol lists.
//!
//! The universe is a TOML file mapping group tags (sectors) to their
//! member symbols. The engine itself only sees the per-snapshot group
//! tag; this file is how the CLI decides which symbols to feed and how
//! to tag them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Group → symbols mapping for the screened universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Universe {
    pub groups: BTreeMap<String, Vec<String>>,
}

impl Universe {
    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Every (symbol, group) pair in stable order.
    pub fn members(&self) -> Vec<(String, String)> {
        self.groups
            .iter()
            .flat_map(|(group, symbols)| {
                symbols.iter().map(move |s| (s.clone(), group.clone()))
            })
            .collect()
    }

    /// Group tag for a symbol, if it belongs to the universe.
    pub fn group_of(&self, symbol: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, symbols)| symbols.iter().any(|s| s == symbol))
            .map(|(group, _)| group.as_str())
    }

    pub fn symbol_count(&self) -> usize {
        self.groups.values().map(|v| v.len()).sum()
    }

    /// A compact demo universe across four sectors.
    pub fn default_demo() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(
            "Technology".into(),
            ["AAPL", "MSFT", "NVDA", "AVGO", "CRM", "ORCL"]
                .map(String::from)
                .to_vec(),
        );
        groups.insert(
            "Healthcare".into(),
            ["JNJ", "UNH", "LLY", "ABBV", "MRK"].map(String::from).to_vec(),
        );
        groups.insert(
            "Finance".into(),
            ["JPM", "GS", "BLK", "AXP", "V"].map(String::from).to_vec(),
        );
        groups.insert(
            "Energy".into(),
            ["XOM", "CVX", "COP", "SLB"].map(String::from).to_vec(),
        );
        Self { groups }
    }
}
