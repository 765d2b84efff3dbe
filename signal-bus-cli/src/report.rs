//! Raise reporting
//!
//! Collects every observed signal raise during a scenario run and prints a
//! per-signal summary at the end.

use signal_bus::Value;
use std::collections::BTreeMap;

/// One observed raise
#[derive(Debug, Clone)]
pub struct RaiseRecord {
    /// Signal name
    pub signal: String,
    /// Full argument list (payload first, declarative extras after)
    pub args: Vec<Value>,
}

/// Accumulates raise records over a scenario run
#[derive(Debug, Default)]
pub struct Report {
    raises: Vec<RaiseRecord>,
}

impl Report {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one raise
    pub fn record(&mut self, signal: impl Into<String>, args: Vec<Value>) {
        self.raises.push(RaiseRecord {
            signal: signal.into(),
            args,
        });
    }

    /// Total number of recorded raises
    pub fn total(&self) -> usize {
        self.raises.len()
    }

    /// Raise counts per signal name, sorted by name
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for raise in &self.raises {
            *counts.entry(raise.signal.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// All recorded raises in observation order
    pub fn raises(&self) -> &[RaiseRecord] {
        &self.raises
    }

    /// Print the summary to stdout
    pub fn print_summary(&self) {
        println!("\n═══════════════════════════════════════════════");
        println!("  Raise Summary");
        println!("═══════════════════════════════════════════════");
        if self.raises.is_empty() {
            println!("  (no signals raised)");
            return;
        }
        for (signal, count) in self.counts() {
            println!("  {:<24} {:>5}", signal, count);
        }
        println!("───────────────────────────────────────────────");
        println!("  {:<24} {:>5}", "total", self.total());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counts_and_order() {
        let mut report = Report::new();
        report.record("save", vec![json!(null)]);
        report.record("cancel", vec![json!(null)]);
        report.record("save", vec![json!(1)]);

        assert_eq!(report.total(), 3);
        let counts = report.counts();
        assert_eq!(counts.get("save"), Some(&2));
        assert_eq!(counts.get("cancel"), Some(&1));

        // Observation order preserved
        assert_eq!(report.raises()[0].signal, "save");
        assert_eq!(report.raises()[1].signal, "cancel");
        assert_eq!(report.raises()[2].args, vec![json!(1)]);
    }
}
