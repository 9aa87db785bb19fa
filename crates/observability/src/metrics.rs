//! 通知服务指标
//!
//! Prometheus 指标记录函数 + 运行期内存聚合。
//!
//! | metric                                   | type      | labels             |
//! |------------------------------------------|-----------|--------------------|
//! | `notifier_events_received_total`         | counter   | `source`           |
//! | `notifier_source_errors_total`           | counter   | `source`           |
//! | `notifier_deliveries_total`              | counter   | `sink`, `status`   |
//! | `notifier_delivery_latency_ms`           | histogram | `sink`             |
//! | `notifier_dead_letters_total`            | counter   | `sink`             |
//! | `notifier_duplicate_deliveries_total`    | counter   | `sink`             |
//! | `notifier_readiness_probes_total`        | counter   | `endpoint`, `result` |
//! | `notifier_retry_queue_depth`             | gauge     |                    |
//! | `notifier_in_flight`                     | gauge     |                    |

use std::collections::HashMap;

use contracts::{DeliveryOutcome, DeliveryStatus};
use metrics::{counter, gauge, histogram};

/// 记录事件接收
pub fn record_event_received(source: &str) {
    counter!(
        "notifier_events_received_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// 记录事件源错误
pub fn record_source_error(source: &str) {
    counter!(
        "notifier_source_errors_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// 记录一次投递结果 (每次尝试调用一次)
pub fn record_delivery(sink: &str, status: DeliveryStatus, latency_ms: f64) {
    counter!(
        "notifier_deliveries_total",
        "sink" => sink.to_string(),
        "status" => status.as_str()
    )
    .increment(1);

    histogram!(
        "notifier_delivery_latency_ms",
        "sink" => sink.to_string()
    )
    .record(latency_ms);
}

/// 记录死信
pub fn record_dead_letter(sink: &str) {
    counter!(
        "notifier_dead_letters_total",
        "sink" => sink.to_string()
    )
    .increment(1);
}

/// 记录被拒绝的重复成功投递
pub fn record_duplicate_delivery(sink: &str) {
    counter!(
        "notifier_duplicate_deliveries_total",
        "sink" => sink.to_string()
    )
    .increment(1);
}

/// 记录就绪探测
pub fn record_readiness_probe(endpoint: &str, ready: bool) {
    let result = if ready { "ready" } else { "unreachable" };
    counter!(
        "notifier_readiness_probes_total",
        "endpoint" => endpoint.to_string(),
        "result" => result
    )
    .increment(1);
}

/// 记录重试队列深度
pub fn record_retry_queue_depth(depth: usize) {
    gauge!("notifier_retry_queue_depth").set(depth as f64);
}

/// 记录正在处理的任务数
pub fn record_in_flight(in_flight: usize) {
    gauge!("notifier_in_flight").set(in_flight as f64);
}

/// 投递统计聚合器
///
/// 在内存中聚合一次运行的投递结果，用于退出时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DeliveryStatsAggregator {
    /// 投递尝试总数
    pub total_attempts: u64,

    pub delivered: u64,
    pub retried: u64,
    pub failed: u64,

    /// 成功前所需的尝试次数
    pub attempts_to_deliver: RunningStats,

    /// 单次尝试耗时 (毫秒)
    pub latency_ms: RunningStats,

    /// 各 sink 的 (成功, 失败) 计数
    pub per_sink: HashMap<String, (u64, u64)>,
}

impl DeliveryStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, outcome: &DeliveryOutcome, latency_ms: f64) {
        self.total_attempts += 1;
        self.latency_ms.push(latency_ms);

        let entry = self.per_sink.entry(outcome.sink_id.clone()).or_default();
        match outcome.status {
            DeliveryStatus::Delivered => {
                self.delivered += 1;
                entry.0 += 1;
                self.attempts_to_deliver.push(f64::from(outcome.attempts));
            }
            DeliveryStatus::Retrying => self.retried += 1,
            DeliveryStatus::Failed => {
                self.failed += 1;
                entry.1 += 1;
            }
        }
    }

    /// 生成摘要
    pub fn summary(&self) -> DeliverySummary {
        let terminal = self.delivered + self.failed;
        DeliverySummary {
            total_attempts: self.total_attempts,
            delivered: self.delivered,
            retried: self.retried,
            failed: self.failed,
            success_rate: if terminal > 0 {
                self.delivered as f64 / terminal as f64 * 100.0
            } else {
                0.0
            },
            attempts_to_deliver: StatsSummary::from(&self.attempts_to_deliver),
            latency_ms: StatsSummary::from(&self.latency_ms),
            per_sink: self.per_sink.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 投递摘要
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub total_attempts: u64,
    pub delivered: u64,
    pub retried: u64,
    pub failed: u64,
    /// delivered / (delivered + failed), 百分比
    pub success_rate: f64,
    pub attempts_to_deliver: StatsSummary,
    pub latency_ms: StatsSummary,
    pub per_sink: HashMap<String, (u64, u64)>,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Attempts: {}", self.total_attempts)?;
        writeln!(
            f,
            "Delivered: {}  Failed: {}  Retried: {} ({:.2}% success)",
            self.delivered, self.failed, self.retried, self.success_rate
        )?;
        writeln!(f, "Attempts to deliver: {}", self.attempts_to_deliver)?;
        writeln!(f, "Attempt latency (ms): {}", self.latency_ms)?;

        if !self.per_sink.is_empty() {
            writeln!(f, "Per sink (delivered/failed):")?;
            let mut sinks: Vec<_> = self.per_sink.iter().collect();
            sinks.sort_by(|a, b| a.0.cmp(b.0));
            for (sink, (ok, failed)) in sinks {
                writeln!(f, "  {sink}: {ok}/{failed}")?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// 在线统计 (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::EventId;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut agg = DeliveryStatsAggregator::new();
        let id = EventId::new("evt-1");

        agg.update(&DeliveryOutcome::delivered(id.clone(), "a", 1), 2.0);
        agg.update(&DeliveryOutcome::retrying(id.clone(), "b", 1, "boom"), 3.0);
        agg.update(&DeliveryOutcome::retrying(id.clone(), "b", 2, "boom"), 3.0);
        agg.update(&DeliveryOutcome::delivered(id.clone(), "b", 3), 4.0);
        agg.update(&DeliveryOutcome::failed(id, "c", 2, "boom"), 1.0);

        assert_eq!(agg.total_attempts, 5);
        assert_eq!(agg.delivered, 2);
        assert_eq!(agg.retried, 2);
        assert_eq!(agg.failed, 1);
        assert_eq!(agg.per_sink.get("b"), Some(&(1, 0)));
        assert_eq!(agg.per_sink.get("c"), Some(&(0, 1)));
        assert!((agg.attempts_to_deliver.mean() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut agg = DeliveryStatsAggregator::new();
        let id = EventId::new("evt-1");
        agg.update(&DeliveryOutcome::delivered(id.clone(), "a", 1), 2.0);
        agg.update(&DeliveryOutcome::failed(id, "b", 3, "boom"), 2.0);

        let output = agg.summary().to_string();
        assert!(output.contains("Delivered: 1  Failed: 1"), "got: {output}");
        assert!(output.contains("50.00% success"));
        assert!(output.contains("a: 1/0"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = DeliveryStatsAggregator::new().summary();
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.latency_ms.to_string(), "N/A");
    }
}
