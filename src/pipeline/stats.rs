// Run statistics reported alongside the optimized tree. PassStats accumulates, per registered
// pass, how often it ran or was skipped, how many validated modifications it produced, its
// summed WCET and size impact, and its named counters merged over all runs.
// OptimizationMetadata adds the sweep count, the convergence flag and the final per-function
// bounds keyed by name. Both implement Display as an indented plain-text report.

//! Pipeline statistics.

use crate::passes::PassResult;
use crate::wcet::WcetBound;
use std::collections::BTreeMap;
use std::fmt;

/// Accumulated statistics of one pass over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    pub name: String,

    /// Executions of `transform`.
    pub runs: usize,

    /// Times the pass was not applicable.
    pub skipped: usize,

    /// Validated runs that changed the tree.
    pub modifications: usize,

    pub wcet_impact: i64,
    pub size_impact: i64,
    pub counters: BTreeMap<String, u64>,
}

impl PassStats {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }

    pub(crate) fn record(&mut self, result: &PassResult) {
        self.modifications += 1;
        self.wcet_impact += result.wcet_impact;
        self.size_impact += result.size_impact;
        for (counter, n) in &result.counters {
            *self.counters.entry((*counter).to_string()).or_insert(0) += n;
        }
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} run(s), {} skipped, {} modification(s), WCET {:+} cycles, size {:+} nodes",
            self.name, self.runs, self.skipped, self.modifications, self.wcet_impact, self.size_impact
        )?;
        for (counter, n) in &self.counters {
            write!(f, "\n      {}: {}", counter, n)?;
        }
        Ok(())
    }
}

/// Summary of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizationMetadata {
    /// Sweeps over the pass catalog, including the final unchanged one.
    pub sweeps: usize,

    /// Validated modifications over all passes.
    pub modifications: usize,

    /// Whether the last sweep changed nothing.
    pub converged: bool,

    /// One entry per registered pass, in registry order.
    pub pass_stats: Vec<PassStats>,

    /// Final bound of every analyzed function, by name.
    pub wcet_bounds: BTreeMap<String, WcetBound>,
}

impl OptimizationMetadata {
    pub fn pass(&self, name: &str) -> Option<&PassStats> {
        self.pass_stats.iter().find(|s| s.name == name)
    }

    pub fn bound(&self, function: &str) -> Option<WcetBound> {
        self.wcet_bounds.get(function).copied()
    }
}

impl fmt::Display for OptimizationMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Statistics:")?;
        writeln!(f, "  Sweeps: {}", self.sweeps)?;
        writeln!(f, "  Modifications: {}", self.modifications)?;
        writeln!(f, "  Converged: {}", if self.converged { "yes" } else { "no" })?;

        if !self.pass_stats.is_empty() {
            writeln!(f, "  Passes:")?;
            for stats in &self.pass_stats {
                writeln!(f, "    {}", stats)?;
            }
        }

        if !self.wcet_bounds.is_empty() {
            writeln!(f, "  WCET bounds:")?;
            let mut sorted: Vec<_> = self.wcet_bounds.iter().collect();
            sorted.sort_by_key(|(_, bound)| std::cmp::Reverse(**bound));
            for (function, bound) in sorted {
                writeln!(f, "    {}: {}", function, bound)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_merges_counters() {
        let mut stats = PassStats::new("dead-code-elimination");
        let mut result = PassResult::unchanged();
        result.count("functions_removed", 2);
        result.size_impact = -7;
        stats.record(&result);
        stats.record(&result);

        assert_eq!(stats.modifications, 2);
        assert_eq!(stats.size_impact, -14);
        assert_eq!(stats.counter("functions_removed"), 4);
    }

    #[test]
    fn test_report_lists_bounds_largest_first() {
        let mut meta = OptimizationMetadata { sweeps: 2, converged: true, ..Default::default() };
        meta.wcet_bounds.insert("leaf".into(), WcetBound(3));
        meta.wcet_bounds.insert("main".into(), WcetBound(40));

        let report = meta.to_string();
        assert!(report.contains("  Converged: yes"));
        let main_at = report.find("main: 40 cycles").unwrap();
        let leaf_at = report.find("leaf: 3 cycles").unwrap();
        assert!(main_at < leaf_at);
    }
}
