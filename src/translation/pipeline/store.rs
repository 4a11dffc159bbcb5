//! 节点存储
//!
//! `NodeStore` 独占一次文档翻译过程中的全部节点，同时维护 `id → Node` 映射
//! 和插入顺序列表，保证遍历顺序与文档顺序一致。
//!
//! 所有修改都经过 [`NodeStore::update`]：在写锁内执行更新函数，
//! 并发读取者永远不会看到写了一半的节点。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::node::{Node, NodeId, NodeStatus};

#[derive(Debug, Default)]
struct StoreInner {
    nodes: HashMap<NodeId, Node>,
    order: Vec<NodeId>,
    positions: HashMap<NodeId, usize>,
}

/// 线程安全的有序节点集合
#[derive(Debug)]
pub struct NodeStore {
    inner: RwLock<StoreInner>,
    next_id: AtomicU64,
}

/// 各状态的节点数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub retrying: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.retrying + self.success + self.failed + self.skipped
    }
}

impl NodeStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 分配下一个节点标识
    ///
    /// 计数器属于当前存储实例，多个文档并发处理时互不干扰。
    pub fn next_id(&self) -> NodeId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// 添加节点，标识已存在时不做任何修改并返回 `false`
    pub fn add(&self, node: Node) -> bool {
        let mut inner = self.inner.write();
        if inner.nodes.contains_key(&node.id) {
            return false;
        }

        // 手动指定的标识也要推进计数器，避免 next_id 与之冲突
        self.next_id.fetch_max(node.id.saturating_add(1), Ordering::Relaxed);

        let id = node.id;
        let position = inner.order.len();
        inner.order.push(id);
        inner.positions.insert(id, position);
        inner.nodes.insert(id, node);
        true
    }

    pub fn get(&self, id: NodeId) -> Option<Node> {
        self.inner.read().nodes.get(&id).cloned()
    }

    /// 按文档顺序返回全部节点的快照
    pub fn get_all(&self) -> Vec<Node> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.nodes.get(id).cloned())
            .collect()
    }

    /// 按文档顺序返回指定状态节点的快照
    pub fn get_by_status(&self, status: NodeStatus) -> Vec<Node> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.nodes.get(id))
            .filter(|node| node.status == status)
            .cloned()
            .collect()
    }

    /// 在写锁内原子地修改节点
    pub fn update<F>(&self, id: NodeId, updater: F) -> TranslationResult<()>
    where
        F: FnOnce(&mut Node),
    {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get_mut(&id)
            .ok_or(TranslationError::NodeNotFound(id))?;
        updater(node);
        debug_assert!(node.is_consistent(), "节点 {} 有译文但状态不是 Success", id);
        Ok(())
    }

    /// 节点在文档顺序中的位置
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.inner.read().positions.get(&id).copied()
    }

    /// 按文档顺序返回全部标识
    pub fn ids(&self) -> Vec<NodeId> {
        self.inner.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status_counts(&self) -> StatusCounts {
        let inner = self.inner.read();
        let mut counts = StatusCounts::default();
        for node in inner.nodes.values() {
            match node.status {
                NodeStatus::Pending => counts.pending += 1,
                NodeStatus::Retrying => counts.retrying += 1,
                NodeStatus::Success => counts.success += 1,
                NodeStatus::Failed => counts.failed += 1,
                NodeStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}
