//! Hub run statistics.

use std::net::SocketAddr;
use std::time::Duration;

use dispatcher::AcceptorStats;
use ingestion::MetricsSnapshot;

/// Statistics from a hub run
#[derive(Debug, Clone, Default)]
pub struct HubStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Address the acceptor was bound to
    pub local_addr: Option<SocketAddr>,

    /// Session counters
    pub acceptor: AcceptorStats,

    /// Per-source read counters, in wire order
    pub sources: Vec<MetricsSnapshot>,
}

impl HubStats {
    /// Successful reads across all sources
    pub fn total_reads(&self) -> u64 {
        self.sources.iter().map(|m| m.reads_ok).sum()
    }

    /// Failure rate across all sources as percentage
    pub fn failure_rate(&self) -> f64 {
        let failures: u64 = self.sources.iter().map(|m| m.read_failures).sum();
        let total = self.total_reads() + failures;
        if total > 0 {
            (failures as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Hub Statistics                          ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        if let Some(addr) = self.local_addr {
            println!("   ├─ Listened on: {}", addr);
        }
        println!("   ├─ Sessions accepted: {}", self.acceptor.accepted);
        println!("   ├─ Sessions refused: {}", self.acceptor.refused);
        println!("   ├─ Accept errors: {}", self.acceptor.accept_errors);
        println!("   └─ Sessions abandoned at shutdown: {}", self.acceptor.abandoned);

        println!("\n📡 Sources (failure rate {:.2}%)", self.failure_rate());
        for (i, m) in self.sources.iter().enumerate() {
            let prefix = if i == self.sources.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {}: {} reads, {} failures, last seq {}",
                prefix,
                m.source.wire_key(),
                m.reads_ok,
                m.read_failures,
                m.last_sequence
            );
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SourceId;

    fn snapshot(source: SourceId, reads_ok: u64, read_failures: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            source,
            reads_ok,
            read_failures,
            consecutive_failures: 0,
            last_sequence: reads_ok,
        }
    }

    #[test]
    fn test_failure_rate() {
        let stats = HubStats {
            sources: vec![
                snapshot(SourceId::SpuChA, 30, 10),
                snapshot(SourceId::SpuChB, 40, 0),
                snapshot(SourceId::Plc, 20, 0),
            ],
            ..Default::default()
        };
        assert_eq!(stats.total_reads(), 90);
        assert!((stats.failure_rate() - 10.0).abs() < 1e-9);
        assert_eq!(HubStats::default().failure_rate(), 0.0);
    }
}
