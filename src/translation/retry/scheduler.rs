//! 重试调度器
//!
//! 为每个失败节点维护一条 [`RetryRecord`]，按所选策略决定何时可以再次尝试，
//! 并把可重试节点扩展为带上下文的窗口后重新分组。
//!
//! 一轮重试的完整流程由编排器驱动：
//!
//! ```text
//! prepare_retry_groups ──▶ 派发 ──▶ mark_retry_completed ──▶ reset_processed_nodes
//! ```
//!
//! “已处理” 集合只在一轮内有效，防止同一节点在同一轮中被重试两次；
//! 轮次边界完全由编排器控制，与时间无关。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::batch::{Batch, Batcher};
use crate::translation::pipeline::context::{ContextWindowBuilder, TranslationContext};
use crate::translation::pipeline::node::{NodeId, NodeStatus};
use crate::translation::pipeline::store::NodeStore;
use crate::translation::retry::classifier::{
    ClassifiedError, ErrorClassifier, ErrorStats, ErrorType,
};

/// 重试延迟策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// 不等待
    Immediate,
    /// 指数退避：base × 2^(attempts−1)
    #[default]
    Backoff,
    /// 根据最近一次错误类型调整：网络 ×3、限流 ×5、超时 ×2
    Adaptive,
    /// 根据节点成功率调整：> 0.5 时减半，否则加倍
    Contextual,
}

impl FromStr for RetryStrategy {
    type Err = TranslationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "immediate" => Ok(RetryStrategy::Immediate),
            "backoff" | "exponential" => Ok(RetryStrategy::Backoff),
            "adaptive" => Ok(RetryStrategy::Adaptive),
            "contextual" => Ok(RetryStrategy::Contextual),
            other => Err(TranslationError::ConfigError(format!(
                "未知的重试策略: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetryStrategy::Immediate => "immediate",
            RetryStrategy::Backoff => "backoff",
            RetryStrategy::Adaptive => "adaptive",
            RetryStrategy::Contextual => "contextual",
        };
        f.write_str(name)
    }
}

/// 重试配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 每个节点的最大尝试次数（含首次派发）
    pub max_retries: u32,
    pub strategy: RetryStrategy,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// 上下文窗口半径 K
    pub context_distance: usize,
    pub context_snippet_chars: usize,
    /// 重试批次的字符上限
    pub max_batch_size: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_MAX_RETRIES,
            strategy: RetryStrategy::default(),
            base_delay: Duration::from_millis(constants::DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(constants::DEFAULT_RETRY_MAX_DELAY_MS),
            context_distance: constants::DEFAULT_CONTEXT_DISTANCE,
            context_snippet_chars: constants::DEFAULT_CONTEXT_SNIPPET_CHARS,
            max_batch_size: constants::DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

/// 单个节点的重试记录
#[derive(Debug, Clone)]
pub struct RetryRecord {
    pub node_path: String,
    pub original_text: String,
    pub attempts: u32,
    pub last_attempt: Instant,
    /// 按时间顺序排列的分类错误
    pub errors: Vec<ClassifiedError>,
    pub success_rate: f64,
    /// 最近一次使用的上下文
    pub context: Option<TranslationContext>,
}

impl RetryRecord {
    pub fn last_error(&self) -> Option<&ClassifiedError> {
        self.errors.last()
    }
}

/// 一轮内已处理的节点集合
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    ids: HashSet<NodeId>,
}

impl ProcessedSet {
    /// 插入节点，已存在时返回 `false`
    pub fn insert(&mut self, id: NodeId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// 一个重试批次
///
/// `batch` 含有上下文邻居，只有 `targets` 中的节点会采用本次结果。
#[derive(Debug, Clone)]
pub struct RetryGroup {
    pub batch: Batch,
    pub targets: HashSet<NodeId>,
}

/// 重试结果
#[derive(Debug, Clone)]
pub enum RetryOutcome {
    Succeeded(String),
    Failed(TranslationError),
}

/// 重试调度器
pub struct RetryScheduler {
    store: Arc<NodeStore>,
    config: RetryConfig,
    classifier: ErrorClassifier,
    window: ContextWindowBuilder,
    batcher: Batcher,
    records: Mutex<HashMap<NodeId, RetryRecord>>,
    processed: Mutex<ProcessedSet>,
    error_stats: Mutex<ErrorStats>,
}

impl RetryScheduler {
    pub fn new(store: Arc<NodeStore>, config: RetryConfig) -> Self {
        let window = ContextWindowBuilder::new(config.context_distance)
            .with_snippet_chars(config.context_snippet_chars);
        let batcher = Batcher::new(config.max_batch_size);

        Self {
            store,
            config,
            classifier: ErrorClassifier::new(),
            window,
            batcher,
            records: Mutex::new(HashMap::new()),
            processed: Mutex::new(ProcessedSet::default()),
            error_stats: Mutex::new(ErrorStats::default()),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// 构建节点的重试上下文
    pub fn context_for(&self, id: NodeId) -> Option<TranslationContext> {
        self.window.build_context(&self.store, id)
    }

    /// 记录一次失败：分类错误、追加历史、增加尝试次数、保存上下文
    pub fn record_failure(
        &self,
        id: NodeId,
        error: &TranslationError,
        context: Option<TranslationContext>,
    ) -> ClassifiedError {
        let classified = self.classifier.classify(error);
        self.error_stats.lock().record(&classified);

        let node = self.store.get(id);
        let mut records = self.records.lock();
        let record = records.entry(id).or_insert_with(|| RetryRecord {
            node_path: node.as_ref().map(|n| n.path.clone()).unwrap_or_default(),
            original_text: node
                .as_ref()
                .map(|n| n.original_text.clone())
                .unwrap_or_default(),
            attempts: 0,
            last_attempt: Instant::now(),
            errors: Vec::new(),
            success_rate: 0.0,
            context: None,
        });

        record.attempts += 1;
        record.last_attempt = Instant::now();
        record.errors.push(classified.clone());
        if context.is_some() {
            record.context = context;
        }

        tracing::debug!(
            "节点 {} 第 {} 次失败: {} ({:?}, 可恢复: {})",
            id,
            record.attempts,
            classified.error_type,
            classified.severity,
            classified.recoverable
        );

        classified
    }

    /// 节点当前是否允许重试
    pub fn should_retry(&self, id: NodeId) -> bool {
        let records = self.records.lock();
        match records.get(&id) {
            Some(record) => {
                self.is_eligible(record) && record.last_attempt.elapsed() >= self.retry_delay(record)
            }
            None => false,
        }
    }

    /// 不考虑等待时间的资格判断
    fn is_eligible(&self, record: &RetryRecord) -> bool {
        if record.attempts >= self.config.max_retries {
            return false;
        }
        record.last_error().map_or(true, |error| error.recoverable)
    }

    /// 按策略计算下一次重试前需要等待的时间
    pub fn retry_delay(&self, record: &RetryRecord) -> Duration {
        let base = self.config.base_delay;

        let delay = match self.config.strategy {
            RetryStrategy::Immediate => Duration::ZERO,
            RetryStrategy::Backoff => {
                let exponent = record.attempts.saturating_sub(1).min(16);
                base.saturating_mul(1u32 << exponent)
            }
            RetryStrategy::Adaptive => {
                let factor = match record.last_error().map(|e| e.error_type) {
                    Some(ErrorType::Network) => 3,
                    Some(ErrorType::RateLimit) => 5,
                    Some(ErrorType::Timeout) => 2,
                    _ => 1,
                };
                base.saturating_mul(factor)
            }
            RetryStrategy::Contextual => {
                if record.success_rate > 0.5 {
                    base / 2
                } else {
                    base.saturating_mul(2)
                }
            }
        };

        delay.min(self.config.max_delay)
    }

    /// 收集可重试节点并分组
    ///
    /// 只挑选状态为 `Failed`、满足 [`should_retry`](Self::should_retry)
    /// 且本轮尚未处理过的节点；被选中的节点进入 `Retrying` 状态。
    /// 返回空列表表示重试循环可以结束。
    pub fn prepare_retry_groups(&self) -> TranslationResult<Vec<RetryGroup>> {
        let failed = self.store.get_by_status(NodeStatus::Failed);

        let mut targets = Vec::new();
        {
            let mut processed = self.processed.lock();
            for node in &failed {
                if processed.contains(node.id) || !self.should_retry(node.id) {
                    continue;
                }
                processed.insert(node.id);
                targets.push(node.id);
            }
        }

        if targets.is_empty() {
            return Ok(Vec::new());
        }

        for id in &targets {
            let context = self.context_for(*id);
            if let Some(record) = self.records.lock().get_mut(id) {
                record.context = context;
            }
            self.store.update(*id, |node| node.mark_retrying())?;
        }

        let window = self.window.expand(&self.store, &targets);
        let target_set: HashSet<NodeId> = targets.iter().copied().collect();

        let groups: Vec<RetryGroup> = self
            .batcher
            .group(window)
            .into_iter()
            .filter_map(|batch| {
                let batch_targets: HashSet<NodeId> = batch
                    .nodes
                    .iter()
                    .map(|node| node.id)
                    .filter(|id| target_set.contains(id))
                    .collect();
                // 只含上下文邻居的批次没有派发价值
                if batch_targets.is_empty() {
                    None
                } else {
                    Some(RetryGroup {
                        batch,
                        targets: batch_targets,
                    })
                }
            })
            .collect();

        tracing::info!(
            "准备重试: {} 个节点，扩展为 {} 个批次（上下文半径 {}）",
            targets.len(),
            groups.len(),
            self.config.context_distance
        );

        Ok(groups)
    }

    /// 清空本轮的已处理集合，由编排器在两轮之间调用
    pub fn reset_processed_nodes(&self) {
        self.processed.lock().clear();
    }

    /// 记录一次重试的结果
    ///
    /// 成功时写入译文并删除重试记录；失败时更新状态与错误，记录保留到下一轮。
    pub fn mark_retry_completed(&self, id: NodeId, outcome: RetryOutcome) -> TranslationResult<()> {
        match outcome {
            RetryOutcome::Succeeded(translated) => {
                if let Some(mut record) = self.records.lock().remove(&id) {
                    record.success_rate = 1.0 / f64::from(record.attempts + 1);
                    tracing::debug!(
                        "节点 {} 重试成功，共尝试 {} 次，成功率 {:.2}",
                        id,
                        record.attempts + 1,
                        record.success_rate
                    );
                }
                self.store.update(id, |node| node.mark_success(translated))
            }
            RetryOutcome::Failed(error) => {
                self.store
                    .update(id, |node| node.mark_failed(error.to_string()))?;
                self.record_failure(id, &error, None);
                Ok(())
            }
        }
    }

    /// 在所有可重试节点中，距离最早一次可重试还需等待的时间
    ///
    /// 没有任何节点会因为等待而变得可重试时返回 `None`。
    pub fn next_retry_delay(&self) -> Option<Duration> {
        let failed: HashSet<NodeId> = self
            .store
            .get_by_status(NodeStatus::Failed)
            .into_iter()
            .map(|node| node.id)
            .collect();
        let processed = self.processed.lock();
        let records = self.records.lock();

        records
            .iter()
            .filter(|(id, record)| {
                failed.contains(id) && !processed.contains(**id) && self.is_eligible(record)
            })
            .map(|(_, record)| {
                self.retry_delay(record)
                    .saturating_sub(record.last_attempt.elapsed())
            })
            .min()
    }

    pub fn record(&self, id: NodeId) -> Option<RetryRecord> {
        self.records.lock().get(&id).cloned()
    }

    pub fn pending_records(&self) -> usize {
        self.records.lock().len()
    }

    pub fn processed_count(&self) -> usize {
        self.processed.lock().len()
    }

    pub fn error_stats(&self) -> ErrorStats {
        self.error_stats.lock().clone()
    }
}
