//! 进度观察者
//!
//! 编排器在文档开始、节点状态变化、每轮重试开始和文档完成时发出通知。所有通知都是尽力而为的，
//! 翻译结果的正确性不依赖观察者是否存在。

use crate::translation::pipeline::node::{NodeId, NodeStatus};

/// 进度观察者接口
pub trait ProgressObserver: Send + Sync {
    fn start_document(&self, doc_id: &str, file_name: &str, total_nodes: usize);

    fn update_node(
        &self,
        doc_id: &str,
        node_id: NodeId,
        status: NodeStatus,
        char_count: usize,
        error: Option<&str>,
    );

    fn complete_document(&self, doc_id: &str);

    /// 细粒度步骤通知（目前是重试轮次），默认忽略
    fn update_step(&self, _doc_id: &str, _node_id: NodeId, _step: u32, _step_name: &str) {}
}

/// 通过 tracing 输出进度的观察者
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressObserver;

impl ProgressObserver for TracingProgressObserver {
    fn start_document(&self, doc_id: &str, file_name: &str, total_nodes: usize) {
        tracing::info!("开始翻译文档 {} ({})，共 {} 个节点", doc_id, file_name, total_nodes);
    }

    fn update_node(
        &self,
        doc_id: &str,
        node_id: NodeId,
        status: NodeStatus,
        char_count: usize,
        error: Option<&str>,
    ) {
        match error {
            Some(error) => tracing::warn!(
                "[{}] 节点 {} → {} ({} 字符): {}",
                doc_id,
                node_id,
                status.as_str(),
                char_count,
                error
            ),
            None => tracing::debug!(
                "[{}] 节点 {} → {} ({} 字符)",
                doc_id,
                node_id,
                status.as_str(),
                char_count
            ),
        }
    }

    fn complete_document(&self, doc_id: &str) {
        tracing::info!("文档 {} 翻译流程结束", doc_id);
    }

    fn update_step(&self, doc_id: &str, node_id: NodeId, step: u32, step_name: &str) {
        tracing::trace!("[{}] 节点 {} 步骤 {}: {}", doc_id, node_id, step, step_name);
    }
}
