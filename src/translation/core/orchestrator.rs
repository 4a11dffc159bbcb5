//! 翻译编排器
//!
//! 驱动一次完整的翻译过程：
//!
//! 1. 把所有 `Pending` 节点分批；
//! 2. 逐批编码、调用翻译回调、解码并更新节点存储，整批失败时批内节点全部标记为 `Failed`；
//! 3. 最多执行 `max_retry_rounds` 轮重试，每轮 `prepare → 派发 → mark_retry_completed → reset`，
//!    某一轮没有可重试的节点时提前结束；
//! 4. 把节点状态变化通知给进度观察者。
//!
//! 批次失败不会让整个过程失败，只有取消会中止并向调用方返回 [`TranslationError::Cancelled`]。
//! 取消时正在进行的批次不会被标记，其节点保持原状态。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::translation::concurrency::metrics::PerformanceMetrics;
use crate::translation::concurrency::pool::{TranslationJob, WorkerPool};
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::core::progress::ProgressObserver;
use crate::translation::core::translator::Translator;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::batch::{Batch, Batcher};
use crate::translation::pipeline::codec::MarkedTextCodec;
use crate::translation::pipeline::node::{NodeId, NodeStatus};
use crate::translation::pipeline::store::NodeStore;
use crate::translation::retry::scheduler::{
    RetryConfig, RetryGroup, RetryOutcome, RetryScheduler,
};

/// 编排器配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 文档标识，用于进度通知
    pub doc_id: String,
    pub file_name: String,
    pub max_batch_size: usize,
    pub max_retry_rounds: usize,
    /// 重试延迟未到时最多等待多久
    pub max_retry_wait: Duration,
    pub retry: RetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            doc_id: "document".to_string(),
            file_name: String::new(),
            max_batch_size: constants::DEFAULT_MAX_BATCH_SIZE,
            max_retry_rounds: constants::DEFAULT_MAX_RETRY_ROUNDS,
            max_retry_wait: Duration::from_millis(constants::DEFAULT_MAX_RETRY_WAIT_MS),
            retry: RetryConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_translation_config(config: &TranslationConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            max_retry_rounds: config.max_retry_rounds,
            max_retry_wait: config.max_retry_wait(),
            retry: config.retry_config(),
            ..Self::default()
        }
    }

    pub fn with_document(mut self, doc_id: impl Into<String>, file_name: impl Into<String>) -> Self {
        self.doc_id = doc_id.into();
        self.file_name = file_name.into();
        self
    }
}

/// 一次翻译过程的结果统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranslationSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pending: usize,
    pub batches_dispatched: usize,
    pub retry_rounds: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

impl TranslationSummary {
    /// 所有节点都处于成功或跳过状态
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.pending == 0
    }

    /// 需要翻译的节点中成功的比例
    pub fn success_rate(&self) -> f64 {
        let attempted = self.total - self.skipped;
        if attempted == 0 {
            1.0
        } else {
            self.succeeded as f64 / attempted as f64
        }
    }
}

/// 翻译编排器
pub struct Orchestrator {
    store: Arc<NodeStore>,
    translator: Arc<dyn Translator>,
    scheduler: RetryScheduler,
    batcher: Batcher,
    codec: MarkedTextCodec,
    config: OrchestratorConfig,
    observer: Option<Arc<dyn ProgressObserver>>,
    pool: Option<Arc<WorkerPool>>,
    metrics: Option<Arc<PerformanceMetrics>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<NodeStore>,
        translator: Arc<dyn Translator>,
        config: OrchestratorConfig,
    ) -> Self {
        let scheduler = RetryScheduler::new(Arc::clone(&store), config.retry.clone());
        Self {
            batcher: Batcher::new(config.max_batch_size),
            codec: MarkedTextCodec::new(),
            store,
            translator,
            scheduler,
            config,
            observer: None,
            pool: None,
            metrics: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// 通过工作池并行派发批次
    pub fn with_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PerformanceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &Arc<NodeStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &RetryScheduler {
        &self.scheduler
    }

    /// 执行一次完整的翻译过程
    pub async fn run(&self, cancel: &CancellationToken) -> TranslationResult<TranslationSummary> {
        let started = Instant::now();
        let doc_id = self.config.doc_id.as_str();

        if let Some(observer) = &self.observer {
            observer.start_document(doc_id, &self.config.file_name, self.store.len());
        }

        let pending = self.store.get_by_status(NodeStatus::Pending);
        let batches = self.batcher.group(pending);
        tracing::info!(
            "[{}] 开始派发: {} 个批次（上限 {} 字符）",
            doc_id,
            batches.len(),
            self.batcher.max_batch_size()
        );

        let refs: Vec<&Batch> = batches.iter().collect();
        let mut dispatched = self
            .dispatch(&refs, cancel, |index, result, elapsed| {
                self.apply_batch_result(&batches[index], result, elapsed)
            })
            .await?;

        let retry_rounds = self.run_retry_rounds(cancel, &mut dispatched).await?;

        let counts = self.store.status_counts();
        let summary = TranslationSummary {
            total: counts.total(),
            succeeded: counts.success,
            failed: counts.failed + counts.retrying,
            skipped: counts.skipped,
            pending: counts.pending,
            batches_dispatched: dispatched,
            retry_rounds,
            elapsed: started.elapsed(),
        };

        if summary.failed > 0 {
            tracing::warn!(
                "[{}] 翻译完成，{} 个节点最终失败（成功 {}，跳过 {}）",
                doc_id,
                summary.failed,
                summary.succeeded,
                summary.skipped
            );
        } else {
            tracing::info!(
                "[{}] 翻译完成: 成功 {}，跳过 {}，{} 轮重试，耗时 {:?}",
                doc_id,
                summary.succeeded,
                summary.skipped,
                retry_rounds,
                summary.elapsed
            );
        }

        if let Some(observer) = &self.observer {
            observer.complete_document(doc_id);
        }

        Ok(summary)
    }

    /// 重试循环，返回实际执行的轮数
    async fn run_retry_rounds(
        &self,
        cancel: &CancellationToken,
        dispatched: &mut usize,
    ) -> TranslationResult<usize> {
        let mut rounds = 0;

        while rounds < self.config.max_retry_rounds {
            if cancel.is_cancelled() {
                return Err(TranslationError::Cancelled);
            }

            let mut groups = match self.scheduler.prepare_retry_groups() {
                Ok(groups) => groups,
                Err(e) => {
                    tracing::warn!("准备重试失败，结束重试: {}", e);
                    break;
                }
            };

            if groups.is_empty() {
                match self.scheduler.next_retry_delay() {
                    Some(delay) if delay <= self.config.max_retry_wait => {
                        if !delay.is_zero() {
                            tracing::debug!("等待 {:?} 后重试", delay);
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                        groups = match self.scheduler.prepare_retry_groups() {
                            Ok(groups) => groups,
                            Err(e) => {
                                tracing::warn!("准备重试失败，结束重试: {}", e);
                                break;
                            }
                        };
                    }
                    Some(delay) => {
                        tracing::info!("最早的重试需等待 {:?}，超过上限，结束重试", delay);
                    }
                    None => {}
                }

                if groups.is_empty() {
                    break;
                }
            }

            rounds += 1;
            if let Some(metrics) = &self.metrics {
                metrics.record_retry_round();
            }
            tracing::info!(
                "第 {} 轮重试: {} 个批次，{} 个目标节点",
                rounds,
                groups.len(),
                groups.iter().map(|g| g.targets.len()).sum::<usize>()
            );

            if let Some(observer) = &self.observer {
                let step_name = format!("retry round {}", rounds);
                for id in groups.iter().flat_map(|group| group.targets.iter()) {
                    observer.update_step(&self.config.doc_id, *id, rounds as u32, &step_name);
                }
            }

            let refs: Vec<&Batch> = groups.iter().map(|group| &group.batch).collect();
            *dispatched += self
                .dispatch(&refs, cancel, |index, result, elapsed| {
                    self.apply_retry_result(&groups[index], result, elapsed)
                })
                .await?;

            self.scheduler.reset_processed_nodes();
        }

        Ok(rounds)
    }

    /// 派发一组批次，每收到一个结果调用一次 `apply`，返回派发的批次数
    async fn dispatch<F>(
        &self,
        batches: &[&Batch],
        cancel: &CancellationToken,
        mut apply: F,
    ) -> TranslationResult<usize>
    where
        F: FnMut(usize, TranslationResult<String>, Duration) -> TranslationResult<()>,
    {
        if batches.is_empty() {
            return Ok(0);
        }

        if let Some(pool) = &self.pool {
            return self.dispatch_parallel(pool, batches, cancel, apply).await;
        }

        for (index, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!("翻译已取消，剩余 {} 个批次未派发", batches.len() - index);
                return Err(TranslationError::Cancelled);
            }

            let payload = self.codec.encode(&batch.nodes);
            tracing::debug!(
                "派发批次 {}: {} 个节点，{} 字符",
                batch.index,
                batch.len(),
                batch.size
            );

            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
                result = self.translator.translate(cancel, &payload) => result,
            };

            if matches!(&result, Err(e) if e.is_cancelled()) {
                return Err(TranslationError::Cancelled);
            }

            apply(index, result, started.elapsed())?;
        }

        Ok(batches.len())
    }

    async fn dispatch_parallel<F>(
        &self,
        pool: &WorkerPool,
        batches: &[&Batch],
        cancel: &CancellationToken,
        mut apply: F,
    ) -> TranslationResult<usize>
    where
        F: FnMut(usize, TranslationResult<String>, Duration) -> TranslationResult<()>,
    {
        if cancel.is_cancelled() {
            return Err(TranslationError::Cancelled);
        }

        let jobs = batches
            .iter()
            .enumerate()
            .map(|(index, batch)| TranslationJob {
                id: index,
                nodes: batch.ids(),
                payload: self.codec.encode(&batch.nodes),
                translator: Arc::clone(&self.translator),
            })
            .collect();

        tracing::debug!("通过工作池并行派发 {} 个批次", batches.len());

        // 取消令牌随运行传给工作者，取消后本次运行的任务不会再回写结果
        let results = pool.process_all(jobs, cancel).await?;

        for job in results {
            if matches!(&job.result, Err(e) if e.is_cancelled()) {
                return Err(TranslationError::Cancelled);
            }
            apply(job.id, job.result, job.elapsed)?;
        }

        Ok(batches.len())
    }

    /// 应用首次派发的结果
    fn apply_batch_result(
        &self,
        batch: &Batch,
        result: TranslationResult<String>,
        elapsed: Duration,
    ) -> TranslationResult<()> {
        match result {
            Ok(reply) => {
                let decoded = self.codec.decode(&reply, &batch.nodes);
                self.record_batch(batch, Some(&reply), elapsed);

                for (id, text) in decoded.translated {
                    self.store.update(id, |node| node.mark_success(text))?;
                    self.notify(batch, id, NodeStatus::Success, None);
                }

                for id in &decoded.missing {
                    let error = TranslationError::TranslationNotFound(*id);
                    let message = error.to_string();
                    self.store.update(*id, |node| node.mark_failed(message.clone()))?;
                    let context = self.scheduler.context_for(*id);
                    self.scheduler.record_failure(*id, &error, context);
                    self.notify(batch, *id, NodeStatus::Failed, Some(&message));
                }

                if let Some(metrics) = &self.metrics {
                    metrics.record_node_results(batch.len() - decoded.missing.len(), decoded.missing.len());
                }
                if !decoded.missing.is_empty() {
                    tracing::warn!(
                        "批次 {} 的回复中缺少 {} 个节点: {:?}",
                        batch.index,
                        decoded.missing.len(),
                        decoded.missing
                    );
                }
            }
            Err(error) => {
                tracing::warn!("批次 {} 翻译失败（{} 个节点）: {}", batch.index, batch.len(), error);
                self.record_batch(batch, None, elapsed);

                let message = error.to_string();
                for node in &batch.nodes {
                    self.store
                        .update(node.id, |n| n.mark_failed(message.clone()))?;
                    self.scheduler.record_failure(node.id, &error, None);
                    self.notify(batch, node.id, NodeStatus::Failed, Some(&message));
                }

                if let Some(metrics) = &self.metrics {
                    metrics.record_node_results(0, batch.len());
                }
            }
        }

        Ok(())
    }

    /// 应用重试批次的结果，只处理目标节点，上下文邻居保持不变
    fn apply_retry_result(
        &self,
        group: &RetryGroup,
        result: TranslationResult<String>,
        elapsed: Duration,
    ) -> TranslationResult<()> {
        let batch = &group.batch;
        let targets = batch
            .nodes
            .iter()
            .filter(|node| group.targets.contains(&node.id))
            .map(|node| node.id);

        let (mut succeeded, mut failed) = (0, 0);

        match result {
            Ok(reply) => {
                self.record_batch(batch, Some(&reply), elapsed);
                let decoded = self.codec.decode(&reply, &batch.nodes);

                for id in targets {
                    match decoded.translation_for(id) {
                        Some(text) => {
                            self.scheduler
                                .mark_retry_completed(id, RetryOutcome::Succeeded(text.to_string()))?;
                            self.notify(batch, id, NodeStatus::Success, None);
                            succeeded += 1;
                        }
                        None => {
                            let error = TranslationError::TranslationNotFound(id);
                            let message = error.to_string();
                            self.scheduler
                                .mark_retry_completed(id, RetryOutcome::Failed(error))?;
                            self.notify(batch, id, NodeStatus::Failed, Some(&message));
                            failed += 1;
                        }
                    }
                }
            }
            Err(error) => {
                tracing::warn!("重试批次 {} 失败: {}", batch.index, error);
                self.record_batch(batch, None, elapsed);

                let message = error.to_string();
                for id in targets {
                    self.scheduler
                        .mark_retry_completed(id, RetryOutcome::Failed(error.clone()))?;
                    self.notify(batch, id, NodeStatus::Failed, Some(&message));
                    failed += 1;
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_node_results(succeeded, failed);
        }
        Ok(())
    }

    fn record_batch(&self, batch: &Batch, reply: Option<&str>, elapsed: Duration) {
        if let Some(metrics) = &self.metrics {
            let received = reply.map_or(0, |r| r.chars().count());
            metrics.record_batch(batch.size, received, elapsed, reply.is_some());
        }
    }

    fn notify(&self, batch: &Batch, id: NodeId, status: NodeStatus, error: Option<&str>) {
        if let Some(observer) = &self.observer {
            let char_count = batch
                .nodes
                .iter()
                .find(|node| node.id == id)
                .map_or(0, |node| node.char_count());
            observer.update_node(&self.config.doc_id, id, status, char_count, error);
        }
    }
}
