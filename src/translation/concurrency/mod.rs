//! 并发与性能层
//!
//! 可选的加速组件：有界工作池与性能指标。

pub mod metrics;
pub mod pool;

pub use self::metrics::{MetricsSnapshot, PerformanceMetrics};
pub use pool::{JobResult, PoolConfig, TranslationJob, WorkerPool};
