//! Run statistics.

use std::time::Duration;

use dispatcher::{DispatchReport, MetricsSnapshot};
use readiness::ReadinessReport;

/// Statistics from a completed run
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Gate result (None when skipped)
    pub readiness: Option<ReadinessReport>,

    /// Dispatcher result
    pub report: DispatchReport,

    /// Per-sink counters
    pub sink_metrics: Vec<(String, MetricsSnapshot)>,

    /// Source lines that were not valid events
    pub decode_errors: u64,

    /// Total duration of the run
    pub duration: Duration,
}

impl RunStats {
    /// Events per second over the whole run
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.report.events_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let report = &self.report;

        println!("\n=== Run Summary ===\n");
        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        if let Some(readiness) = &self.readiness {
            println!(
                "   ├─ Readiness: {} endpoint(s) in {:.2}s, {} probe(s)",
                readiness.endpoints.len(),
                readiness.elapsed.as_secs_f64(),
                readiness.total_attempts()
            );
        }
        println!("   ├─ Events received: {}", report.events_received);
        println!(
            "   ├─ Source errors: {} ({} undecodable)",
            report.source_errors, self.decode_errors
        );
        println!("   ├─ Throughput: {:.2} events/s", self.throughput());
        println!("   └─ Shutdown: {}", if report.cancelled { "signal" } else { "source closed" });

        println!("\nDeliveries");
        println!("   ├─ Delivered: {}", report.delivered);
        println!("   ├─ Retried: {}", report.retried);
        println!("   ├─ Failed: {}", report.failed);
        println!("   ├─ Dead letters: {}", report.dead_letter_total);
        println!("   └─ Abandoned: {}", report.abandoned.len());

        if !self.sink_metrics.is_empty() {
            println!("\nSinks (attempts / delivered / retried / failed)");
            let last = self.sink_metrics.len() - 1;
            for (i, (name, m)) in self.sink_metrics.iter().enumerate() {
                let prefix = if i == last { "└─" } else { "├─" };
                println!(
                    "   {} {}: {} / {} / {} / {}",
                    prefix, name, m.attempts, m.delivered, m.retried, m.failed
                );
            }
        }

        println!("\n{}", report.summary);
    }
}
