//! 翻译服务
//!
//! 在一次编排过程外围组合可选的加速层，是翻译系统的主要入口点：
//!
//! 1. **预过滤**: 空白、过短、纯标点、纯数字的节点直接标记为 `Skipped`
//! 2. **缓存**: 命中缓存的节点直接标记为 `Success`
//! 3. **去重**: 原文相同的节点只派发优先级最高的一个，其余暂时标记为 `Skipped`，
//!    编排结束后复用代表节点的结果
//! 4. **编排**: 顺序派发或通过工作池并行派发，包含重试轮次
//! 5. **回写**: 新翻译成功的节点写入缓存，并记录性能指标
//!
//! ## 使用示例
//!
//! ```no_run
//! use std::sync::Arc;
//! use doc_translator::translation::{TranslationConfig, TranslationService};
//! use doc_translator::translation::core::translator_fn;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> doc_translator::translation::TranslationResult<()> {
//! let translator = translator_fn(|text: String| async move { Ok(text) });
//! let service = TranslationService::new(TranslationConfig::default(), Arc::new(translator))?;
//!
//! let output = service
//!     .translate_text("Hello world.\n\nSecond paragraph.", &CancellationToken::new())
//!     .await?;
//! println!("{} ({} 个节点成功)", output.text, output.summary.succeeded);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::adapters::text::PlainTextAdapter;
use crate::adapters::DocumentAdapter;
use crate::translation::concurrency::metrics::PerformanceMetrics;
use crate::translation::concurrency::pool::{PoolConfig, WorkerPool};
use crate::translation::config::{ConfigManager, TranslationConfig};
use crate::translation::core::orchestrator::{Orchestrator, OrchestratorConfig, TranslationSummary};
use crate::translation::core::progress::ProgressObserver;
use crate::translation::core::translator::Translator;
use crate::translation::error::TranslationResult;
use crate::translation::pipeline::codec::restore_padding;
use crate::translation::pipeline::filters::{Deduplicator, TextFilter};
use crate::translation::pipeline::node::{NodeId, NodeStatus};
use crate::translation::pipeline::store::NodeStore;
use crate::translation::storage::cache::{CacheConfig, TranslationCache};

/// 适配器端到端翻译的结果
#[derive(Debug, Clone, Serialize)]
pub struct TranslationOutput {
    /// 回写译文后的文档
    pub text: String,
    pub summary: TranslationSummary,
}

/// 统一的翻译服务
///
/// 服务本身可以在多个文档之间复用：缓存、性能指标和工作池在各次调用之间共享，
/// 每个文档使用各自的 [`NodeStore`]。
pub struct TranslationService {
    config: TranslationConfig,
    translator: Arc<dyn Translator>,
    filter: TextFilter,
    cache: Option<Arc<TranslationCache>>,
    metrics: Arc<PerformanceMetrics>,
    observer: Option<Arc<dyn ProgressObserver>>,
    // 首次并行派发时在运行时内创建
    pool: parking_lot::Mutex<Option<Arc<WorkerPool>>>,
    shutdown: CancellationToken,
}

impl TranslationService {
    /// 根据配置创建翻译服务，配置无效时返回错误
    pub fn new(config: TranslationConfig, translator: Arc<dyn Translator>) -> TranslationResult<Self> {
        config.validate()?;

        let cache = config.cache_enabled.then(|| {
            Arc::new(TranslationCache::from_config(CacheConfig {
                capacity: config.cache_capacity,
                ttl: config.cache_ttl(),
                source_lang: config.source_lang.clone(),
                target_lang: config.target_lang.clone(),
            }))
        });

        tracing::debug!(
            "创建翻译服务: {} → {}，批次上限 {}，缓存 {}，并行 {}",
            config.source_lang,
            config.target_lang,
            config.max_batch_size,
            config.cache_enabled,
            config.parallel_enabled
        );

        Ok(Self {
            filter: TextFilter::with_min_length(config.min_text_length),
            config,
            translator,
            cache,
            metrics: Arc::new(PerformanceMetrics::new()),
            observer: None,
            pool: parking_lot::Mutex::new(None),
            shutdown: CancellationToken::new(),
        })
    }

    /// 使用配置管理器中的配置创建服务
    pub fn from_manager(manager: &ConfigManager, translator: Arc<dyn Translator>) -> TranslationResult<Self> {
        Self::new(manager.get_config().clone(), translator)
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// 替换为外部共享的缓存
    pub fn with_cache(mut self, cache: Arc<TranslationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<TranslationCache>> {
        self.cache.as_ref()
    }

    pub fn metrics(&self) -> &Arc<PerformanceMetrics> {
        &self.metrics
    }

    /// 翻译节点存储中所有待处理的节点
    pub async fn translate_store(
        &self,
        store: Arc<NodeStore>,
        cancel: &CancellationToken,
    ) -> TranslationResult<TranslationSummary> {
        self.translate_document("document", "", store, cancel).await
    }

    /// 翻译一个文档的节点存储
    ///
    /// 批次失败只会体现为节点的 `Failed` 状态；只有取消会返回错误。
    /// 取消时被去重暂存的节点恢复为 `Pending`。
    pub async fn translate_document(
        &self,
        doc_id: &str,
        file_name: &str,
        store: Arc<NodeStore>,
        cancel: &CancellationToken,
    ) -> TranslationResult<TranslationSummary> {
        self.prefilter(&store)?;
        let cache_hits = self.apply_cache(&store)?;
        let followers = self.deduplicate(&store)?;

        let mut orchestrator = Orchestrator::new(
            Arc::clone(&store),
            Arc::clone(&self.translator),
            OrchestratorConfig::from_translation_config(&self.config).with_document(doc_id, file_name),
        )
        .with_metrics(Arc::clone(&self.metrics));

        if let Some(observer) = &self.observer {
            orchestrator = orchestrator.with_observer(Arc::clone(observer));
        }
        if self.config.parallel_enabled {
            orchestrator = orchestrator.with_pool(self.pool());
        }

        let summary = match orchestrator.run(cancel).await {
            Ok(summary) => summary,
            Err(e) => {
                for id in followers.keys() {
                    store.update(*id, |node| node.status = NodeStatus::Pending)?;
                }
                return Err(e);
            }
        };

        self.resolve_followers(&store, &followers)?;
        self.write_back(&store, &cache_hits);

        let counts = store.status_counts();
        Ok(TranslationSummary {
            total: counts.total(),
            succeeded: counts.success,
            failed: counts.failed + counts.retrying,
            skipped: counts.skipped,
            pending: counts.pending,
            ..summary
        })
    }

    /// 按段落翻译纯文本
    pub async fn translate_text(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> TranslationResult<TranslationOutput> {
        let store = Arc::new(NodeStore::new());
        let adapter = PlainTextAdapter::load(text, &store);
        self.translate_adapted("text", &adapter, store, cancel).await
    }

    /// 翻译 HTML 文档中的文本节点与可翻译属性
    ///
    /// DOM 不是 `Send` 的，返回的 future 只能在当前线程上等待。
    #[cfg(feature = "html")]
    pub async fn translate_html(
        &self,
        html: &str,
        cancel: &CancellationToken,
    ) -> TranslationResult<TranslationOutput> {
        let store = Arc::new(NodeStore::new());
        let adapter = crate::adapters::html::HtmlAdapter::load(html, &store)?;
        self.translate_adapted("html", &adapter, store, cancel).await
    }

    /// 翻译已由适配器填充的节点存储，并由同一个适配器回写结果
    pub async fn translate_adapted<A: DocumentAdapter>(
        &self,
        doc_id: &str,
        adapter: &A,
        store: Arc<NodeStore>,
        cancel: &CancellationToken,
    ) -> TranslationResult<TranslationOutput> {
        let summary = self
            .translate_document(doc_id, adapter.name(), Arc::clone(&store), cancel)
            .await?;
        let text = adapter.render(&store)?;
        Ok(TranslationOutput { text, summary })
    }

    /// 关闭工作池，返回被丢弃的结果数量
    pub async fn shutdown(&self) -> usize {
        self.shutdown.cancel();
        let pool = self.pool.lock().take();
        match pool {
            Some(pool) => pool.shutdown().await,
            None => 0,
        }
    }

    fn pool(&self) -> Arc<WorkerPool> {
        let mut guard = self.pool.lock();
        let pool = guard.get_or_insert_with(|| {
            Arc::new(WorkerPool::new(
                PoolConfig {
                    workers: self.config.worker_count,
                    queue_backlog: self.config.queue_backlog,
                },
                &self.shutdown,
            ))
        });
        Arc::clone(pool)
    }

    fn prefilter(&self, store: &NodeStore) -> TranslationResult<()> {
        if !self.config.prefilter_enabled {
            return Ok(());
        }

        let (_, skipped) = self.filter.partition(store.get_by_status(NodeStatus::Pending));
        for id in &skipped {
            store.update(*id, |node| node.mark_skipped())?;
        }

        if !skipped.is_empty() {
            tracing::debug!("预过滤跳过 {} 个节点", skipped.len());
            self.metrics.record_skipped(skipped.len());
        }
        Ok(())
    }

    /// 返回命中缓存的节点
    fn apply_cache(&self, store: &NodeStore) -> TranslationResult<HashSet<NodeId>> {
        let mut hits = HashSet::new();
        let Some(cache) = &self.cache else {
            return Ok(hits);
        };

        let pending = store.get_by_status(NodeStatus::Pending);
        let misses = pending.len();
        for node in pending {
            if let Some(translated) = cache.get(&node.original_text) {
                store.update(node.id, |n| n.mark_success(translated))?;
                hits.insert(node.id);
            }
        }

        self.metrics.record_cache(hits.len(), misses - hits.len());
        if !hits.is_empty() {
            tracing::debug!("缓存命中 {} 个节点", hits.len());
        }
        Ok(hits)
    }

    /// 返回重复节点到代表节点的映射
    fn deduplicate(&self, store: &NodeStore) -> TranslationResult<HashMap<NodeId, NodeId>> {
        if !self.config.dedup_enabled {
            return Ok(HashMap::new());
        }

        let plan = Deduplicator.plan(store.get_by_status(NodeStatus::Pending));
        for id in plan.followers.keys() {
            store.update(*id, |node| node.mark_skipped())?;
        }

        if plan.duplicate_count() > 0 {
            self.metrics.record_duplicates(plan.duplicate_count());
        }
        Ok(plan.followers)
    }

    fn resolve_followers(
        &self,
        store: &NodeStore,
        followers: &HashMap<NodeId, NodeId>,
    ) -> TranslationResult<()> {
        for (&follower, &representative) in followers {
            let Some(rep) = store.get(representative) else {
                continue;
            };

            match rep.status {
                NodeStatus::Success => {
                    store.update(follower, |node| {
                        let text = restore_padding(&node.original_text, rep.translated_text.trim());
                        node.mark_success(text);
                    })?;
                }
                _ => {
                    let error = rep
                        .last_error
                        .clone()
                        .unwrap_or_else(|| format!("duplicate of node {} was not translated", representative));
                    store.update(follower, |node| node.mark_failed(error))?;
                }
            }
        }
        Ok(())
    }

    fn write_back(&self, store: &NodeStore, cache_hits: &HashSet<NodeId>) {
        let Some(cache) = &self.cache else {
            return;
        };

        let fresh: Vec<(String, String)> = store
            .get_by_status(NodeStatus::Success)
            .into_iter()
            .filter(|node| !cache_hits.contains(&node.id))
            .map(|node| (node.original_text, node.translated_text))
            .collect();

        if !fresh.is_empty() {
            tracing::debug!("写入缓存 {} 条译文", fresh.len());
            cache.insert_batch(fresh);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::translator::translator_fn;
    use crate::translation::pipeline::node::Node;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn upper_service(calls: Arc<AtomicUsize>, config: TranslationConfig) -> TranslationService {
        let translator = translator_fn(move |text: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(text
                    .lines()
                    .map(|line| {
                        if line.starts_with("@@") {
                            line.to_string()
                        } else {
                            line.to_uppercase()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        });
        TranslationService::new(config, Arc::new(translator)).unwrap()
    }

    fn store_with(texts: &[&str]) -> Arc<NodeStore> {
        let store = NodeStore::new();
        for text in texts {
            let id = store.next_id();
            store.add(Node::new(id, "b", *text));
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_prefilter_and_dedup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = upper_service(Arc::clone(&calls), TranslationConfig::default());
        let store = store_with(&["hello there", "42", "  hello there", "..."]);

        let summary = service
            .translate_store(Arc::clone(&store), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(store.get(1).unwrap().translated_text, "HELLO THERE");
        assert_eq!(store.get(3).unwrap().translated_text, "  HELLO THERE");
        assert_eq!(store.get(2).unwrap().status, NodeStatus::Skipped);
        assert_eq!(service.metrics().snapshot().duplicates_collapsed, 1);
    }

    #[tokio::test]
    async fn test_cache_hits_skip_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = upper_service(Arc::clone(&calls), TranslationConfig::default());
        let cancel = CancellationToken::new();

        service
            .translate_store(store_with(&["first paragraph"]), &cancel)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let store = store_with(&["first paragraph"]);
        let summary = service.translate_store(Arc::clone(&store), &cancel).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.batches_dispatched, 0);
        assert_eq!(store.get(1).unwrap().translated_text, "FIRST PARAGRAPH");
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = TranslationConfig {
            max_batch_size: 0,
            ..TranslationConfig::default()
        };
        let result = TranslationService::new(config, Arc::new(translator_fn(|t: String| async move { Ok(t) })));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_translate_text_end_to_end() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = upper_service(calls, TranslationConfig::default());

        let output = service
            .translate_text("first one.\n\nsecond one.\n", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.text, "FIRST ONE.\n\nSECOND ONE.\n");
        assert!(output.summary.is_complete());
    }
}
