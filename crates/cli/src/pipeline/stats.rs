//! Batch statistics.

use std::time::Duration;

use backends::SkippedBackend;
use dispatcher::EngineSnapshot;
use observability::BatchMetricsAggregator;

/// Statistics from a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    /// Items loaded from the input file
    pub items: usize,

    /// Active backends, in column order
    pub backends: Vec<String>,

    /// Backends excluded at startup
    pub skipped: Vec<SkippedBackend>,

    /// items × backends
    pub units: usize,

    /// Sinks written successfully
    pub sinks_written: usize,

    /// Wall-clock duration of the dispatch phase
    pub duration: Duration,

    /// Engine counters at completion
    pub engine: EngineSnapshot,

    /// Per-backend outcome statistics
    pub outcomes: BatchMetricsAggregator,

    /// No backend was queried
    pub dry_run: bool,
}

impl BatchStats {
    /// Units resolved per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.units as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Batch Statistics ===\n");
        println!("Overview");
        println!("   ├─ Items: {}", self.items);
        println!("   ├─ Backends: {} ({})", self.backends.len(), self.backends.join(", "));
        println!("   ├─ Units: {}", self.units);
        if self.dry_run {
            println!("   └─ Dry run: no backend was queried");
        } else {
            println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
            println!("   ├─ Throughput: {:.2} units/s", self.throughput());
            println!("   ├─ Peak in-flight: {}", self.engine.peak_in_flight);
            println!("   └─ Sinks written: {}", self.sinks_written);
        }

        if !self.skipped.is_empty() {
            println!("\nSkipped backends");
            for (i, skipped) in self.skipped.iter().enumerate() {
                let prefix = if i + 1 == self.skipped.len() { "└─" } else { "├─" };
                println!("   {} {}: {}", prefix, skipped.name, skipped.reason);
            }
        }

        if !self.dry_run {
            println!("\n{}", self.outcomes.summary());
        }
    }
}
