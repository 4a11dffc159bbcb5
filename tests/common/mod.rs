// 集成测试公共模块
//
// 提供脚本化的翻译回调、节点存储构建器和记录型进度观察者

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use doc_translator::translation::config::TranslationConfig;
use doc_translator::translation::core::progress::ProgressObserver;
use doc_translator::translation::core::translator::Translator;
use doc_translator::translation::error::{TranslationError, TranslationResult};
use doc_translator::translation::pipeline::codec::MarkedTextCodec;
use doc_translator::translation::pipeline::node::{Node, NodeId, NodeStatus};
use doc_translator::translation::pipeline::store::NodeStore;
use doc_translator::translation::retry::RetryStrategy;

/// 一次翻译调用的脚本动作
#[derive(Debug, Clone)]
pub enum Step {
    /// 非标记行加上前缀
    Prefix(&'static str),
    /// 加前缀并从回复中删掉指定节点
    Drop(&'static str, Vec<NodeId>),
    /// 整批失败
    Fail(TranslationError),
    /// 取消令牌后正常返回
    CancelThenPrefix(CancellationToken, &'static str),
    /// 一直等到被取消
    Hang,
}

/// 按脚本逐次响应的翻译回调，脚本用完后重复最后一步
pub struct ScriptedTranslator {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    payloads: Mutex<Vec<String>>,
}

impl ScriptedTranslator {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            payloads: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.payloads.lock().len()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().clone()
    }

    fn next_step(&self) -> Step {
        let mut last = self.last.lock();
        match self.steps.lock().pop_front() {
            Some(step) => {
                *last = Some(step.clone());
                step
            }
            None => last.clone().unwrap_or(Step::Prefix("")),
        }
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    async fn translate(&self, cancel: &CancellationToken, text: &str) -> TranslationResult<String> {
        self.payloads.lock().push(text.to_string());

        match self.next_step() {
            Step::Prefix(prefix) => Ok(prefix_lines(text, prefix)),
            Step::Drop(prefix, ids) => Ok(drop_nodes(&prefix_lines(text, prefix), &ids)),
            Step::Fail(error) => Err(error),
            Step::CancelThenPrefix(token, prefix) => {
                token.cancel();
                Ok(prefix_lines(text, prefix))
            }
            Step::Hang => {
                cancel.cancelled().await;
                Err(TranslationError::Cancelled)
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// 给所有非标记行加前缀
pub fn prefix_lines(payload: &str, prefix: &str) -> String {
    payload
        .lines()
        .map(|line| {
            if line.starts_with("@@") || line.is_empty() {
                line.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 从回复中删除指定节点的整个标记块
pub fn drop_nodes(reply: &str, ids: &[NodeId]) -> String {
    let mut out = Vec::new();
    let mut skipping: Option<String> = None;

    for line in reply.lines() {
        if let Some(end) = &skipping {
            if line == end {
                skipping = None;
            }
            continue;
        }
        if let Some(id) = ids
            .iter()
            .find(|id| line == MarkedTextCodec::start_marker(**id))
        {
            skipping = Some(MarkedTextCodec::end_marker(*id));
            continue;
        }
        out.push(line);
    }
    out.join("\n")
}

/// 回复里出现的节点标识，按出现顺序
pub fn payload_ids(payload: &str) -> Vec<NodeId> {
    payload
        .lines()
        .filter_map(|line| line.strip_prefix("@@NODE_START_"))
        .filter_map(|rest| rest.strip_suffix("@@"))
        .filter_map(|id| id.parse().ok())
        .collect()
}

/// 用给定原文构建节点存储，标识从 1 开始
pub fn store_with(texts: &[&str]) -> Arc<NodeStore> {
    let store = NodeStore::new();
    for (i, text) in texts.iter().enumerate() {
        let id = store.next_id();
        store.add(Node::new(id, format!("block-{}", i), *text).with_path(format!("doc/p[{}]", i + 1)));
    }
    Arc::new(store)
}

/// 生成 `n` 个可翻译段落
pub fn paragraphs(n: usize) -> Vec<String> {
    (1..=n)
        .map(|i| format!("Paragraph number {} of the test document.", i))
        .collect()
}

/// 立即重试、不启用缓存的配置
pub fn immediate_config() -> TranslationConfig {
    TranslationConfig {
        retry_strategy: RetryStrategy::Immediate,
        cache_enabled: false,
        ..TranslationConfig::default()
    }
}

pub fn status_of(store: &NodeStore, id: NodeId) -> NodeStatus {
    store.get(id).map(|node| node.status).unwrap_or(NodeStatus::Pending)
}

/// 记录所有通知的进度观察者
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl ProgressObserver for RecordingObserver {
    fn start_document(&self, doc_id: &str, _file_name: &str, total_nodes: usize) {
        self.events.lock().push(format!("start:{}:{}", doc_id, total_nodes));
    }

    fn update_node(
        &self,
        _doc_id: &str,
        node_id: NodeId,
        status: NodeStatus,
        _char_count: usize,
        _error: Option<&str>,
    ) {
        self.events
            .lock()
            .push(format!("node:{}:{}", node_id, status.as_str()));
    }

    fn complete_document(&self, doc_id: &str) {
        self.events.lock().push(format!("complete:{}", doc_id));
    }

    fn update_step(&self, _doc_id: &str, node_id: NodeId, step: u32, _step_name: &str) {
        self.events.lock().push(format!("step:{}:{}", node_id, step));
    }
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
