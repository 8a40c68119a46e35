use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

/// Price per 1k tokens for one `provider/model` pair, read from the static pricing table.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PriceEntry {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

/// Read-only, safe for concurrent access (§5). Unknown models yield zero cost plus a warning
/// rather than a hard failure, per the preserved behavior in spec §9 open question (a).
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    entries: HashMap<String, PriceEntry>,
}

fn key(provider: &str, model: &str) -> String {
    format!("{provider}/{model}")
}

impl PricingTable {
    pub fn from_entries(entries: HashMap<String, PriceEntry>) -> Self {
        Self { entries }
    }

    /// Loads the pricing table from a JSON file of `{"provider/model": {"prompt_per_1k": ..,
    /// "completion_per_1k": ..}}`. A missing file yields an empty (all-zero-cost) table.
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => Self::from_entries(entries),
                Err(err) => {
                    warn!(path, error = %err, "failed to parse pricing table, using empty table");
                    Self::default()
                }
            },
            Err(_) => {
                warn!(path, "pricing table not found, using empty table");
                Self::default()
            }
        }
    }

    pub fn price_per_1k_prompt(&self, provider: &str, model: &str) -> f64 {
        match self.entries.get(&key(provider, model)) {
            Some(entry) => entry.prompt_per_1k,
            None => {
                warn!(provider, model, "no pricing entry, assuming zero cost");
                0.0
            }
        }
    }

    pub fn price_per_1k_completion(&self, provider: &str, model: &str) -> f64 {
        match self.entries.get(&key(provider, model)) {
            Some(entry) => entry.completion_per_1k,
            None => {
                warn!(provider, model, "no pricing entry, assuming zero cost");
                0.0
            }
        }
    }

    /// Computes cost to six decimal places, per spec §4.E numeric semantics.
    pub fn cost_usd(
        &self,
        provider: &str,
        model: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> f64 {
        let prompt_cost =
            f64::from(prompt_tokens) / 1000.0 * self.price_per_1k_prompt(provider, model);
        let completion_cost = f64::from(completion_tokens) / 1000.0
            * self.price_per_1k_completion(provider, model);
        let total = prompt_cost + completion_cost;
        (total * 1_000_000.0).round() / 1_000_000.0
    }
}
