//! 性能指标
//!
//! 原子计数器记录一次或多次翻译过程的吞吐与延迟，同时把增量写入
//! `metrics` 门面，由调用方安装的 recorder（Prometheus、OpenTelemetry 等）导出。
//! 没有安装 recorder 时，门面调用是空操作。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;

/// 线程安全的性能指标
#[derive(Debug, Default)]
pub struct PerformanceMetrics {
    /// 派发的批次数量
    batches_dispatched: AtomicUsize,
    /// 整批失败的次数
    batches_failed: AtomicUsize,
    nodes_succeeded: AtomicUsize,
    nodes_failed: AtomicUsize,
    nodes_skipped: AtomicUsize,
    /// 发送给翻译回调的字符数
    chars_sent: AtomicUsize,
    /// 回调返回的字符数
    chars_received: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    /// 去重后无需派发的节点
    duplicates_collapsed: AtomicUsize,
    retry_rounds: AtomicUsize,
    /// 翻译回调总耗时（微秒）
    dispatch_time_us: AtomicU64,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次批次派发
    pub fn record_batch(&self, chars_sent: usize, chars_received: usize, elapsed: Duration, ok: bool) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.chars_sent.fetch_add(chars_sent, Ordering::Relaxed);
        self.chars_received.fetch_add(chars_received, Ordering::Relaxed);
        self.dispatch_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);

        metrics::counter!("doc_translator.batches.dispatched").increment(1);
        metrics::counter!("doc_translator.chars.sent").increment(chars_sent as u64);
        metrics::histogram!("doc_translator.batch.latency_seconds").record(elapsed.as_secs_f64());

        if !ok {
            self.batches_failed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("doc_translator.batches.failed").increment(1);
        }
    }

    pub fn record_node_results(&self, succeeded: usize, failed: usize) {
        self.nodes_succeeded.fetch_add(succeeded, Ordering::Relaxed);
        self.nodes_failed.fetch_add(failed, Ordering::Relaxed);
        metrics::counter!("doc_translator.nodes.succeeded").increment(succeeded as u64);
        metrics::counter!("doc_translator.nodes.failed").increment(failed as u64);
    }

    pub fn record_skipped(&self, count: usize) {
        self.nodes_skipped.fetch_add(count, Ordering::Relaxed);
        metrics::counter!("doc_translator.nodes.skipped").increment(count as u64);
    }

    pub fn record_cache(&self, hits: usize, misses: usize) {
        self.cache_hits.fetch_add(hits, Ordering::Relaxed);
        self.cache_misses.fetch_add(misses, Ordering::Relaxed);
        metrics::counter!("doc_translator.cache.hits").increment(hits as u64);
        metrics::counter!("doc_translator.cache.misses").increment(misses as u64);
    }

    pub fn record_duplicates(&self, count: usize) {
        self.duplicates_collapsed.fetch_add(count, Ordering::Relaxed);
        metrics::counter!("doc_translator.nodes.deduplicated").increment(count as u64);
    }

    pub fn record_retry_round(&self) {
        self.retry_rounds.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("doc_translator.retry.rounds").increment(1);
    }

    /// 获取统计数据快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        let batches = self.batches_dispatched.load(Ordering::Relaxed);
        let dispatch_time = Duration::from_micros(self.dispatch_time_us.load(Ordering::Relaxed));
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;

        MetricsSnapshot {
            batches_dispatched: batches,
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            nodes_succeeded: self.nodes_succeeded.load(Ordering::Relaxed),
            nodes_failed: self.nodes_failed.load(Ordering::Relaxed),
            nodes_skipped: self.nodes_skipped.load(Ordering::Relaxed),
            chars_sent: self.chars_sent.load(Ordering::Relaxed),
            chars_received: self.chars_received.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                cache_hits as f64 / lookups as f64
            },
            duplicates_collapsed: self.duplicates_collapsed.load(Ordering::Relaxed),
            retry_rounds: self.retry_rounds.load(Ordering::Relaxed),
            total_dispatch_ms: dispatch_time.as_millis() as u64,
            avg_batch_ms: if batches == 0 {
                0.0
            } else {
                dispatch_time.as_secs_f64() * 1000.0 / batches as f64
            },
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.batches_dispatched,
            &self.batches_failed,
            &self.nodes_succeeded,
            &self.nodes_failed,
            &self.nodes_skipped,
            &self.chars_sent,
            &self.chars_received,
            &self.cache_hits,
            &self.cache_misses,
            &self.duplicates_collapsed,
            &self.retry_rounds,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.dispatch_time_us.store(0, Ordering::Relaxed);
    }
}

/// 指标的不可变快照，可直接序列化输出
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub batches_dispatched: usize,
    pub batches_failed: usize,
    pub nodes_succeeded: usize,
    pub nodes_failed: usize,
    pub nodes_skipped: usize,
    pub chars_sent: usize,
    pub chars_received: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_hit_rate: f64,
    pub duplicates_collapsed: usize,
    pub retry_rounds: usize,
    pub total_dispatch_ms: u64,
    pub avg_batch_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_aggregates() {
        let metrics = PerformanceMetrics::new();
        metrics.record_batch(100, 120, Duration::from_millis(10), true);
        metrics.record_batch(50, 0, Duration::from_millis(30), false);
        metrics.record_node_results(3, 2);
        metrics.record_cache(1, 3);
        metrics.record_retry_round();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches_dispatched, 2);
        assert_eq!(snapshot.batches_failed, 1);
        assert_eq!(snapshot.chars_sent, 150);
        assert_eq!(snapshot.chars_received, 120);
        assert_eq!(snapshot.nodes_succeeded, 3);
        assert_eq!(snapshot.nodes_failed, 2);
        assert_eq!(snapshot.cache_hit_rate, 0.25);
        assert_eq!(snapshot.retry_rounds, 1);
        assert_eq!(snapshot.total_dispatch_ms, 40);
        assert!((snapshot.avg_batch_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_and_serialize() {
        let metrics = PerformanceMetrics::new();
        metrics.record_skipped(4);
        metrics.record_duplicates(2);
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.nodes_skipped, 0);
        assert_eq!(snapshot.duplicates_collapsed, 0);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["batches_dispatched"], 0);
        assert_eq!(json["cache_hit_rate"], 0.0);
    }
}
