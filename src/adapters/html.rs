//! HTML 适配器
//!
//! 遍历 DOM，为每个非空白文本节点和每个可翻译属性（`constants::TRANSLATABLE_ATTRS`）
//! 创建一个节点。`constants::SKIP_ELEMENTS` 中的元素不进入其子树，但其自身的可翻译属性
//! 仍会收集（例如 `<img alt>`）。
//!
//! 节点路径形如 `html/body/ul/li[2]`，同名兄弟元素多于一个时带 1 起始的序号；
//! 属性节点的路径在元素路径后追加 `/@<属性名>`。

use std::collections::HashMap;
use std::io::Cursor;

use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::{StrTendril, TendrilSink};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

use crate::adapters::DocumentAdapter;
use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::node::{Node, NodeId, NodeMetadata, NodeStatus};
use crate::translation::pipeline::store::NodeStore;

/// HTML 适配器
///
/// 持有解析后的 DOM 和每个节点对应的 DOM 句柄（槽位）。DOM 使用 `Rc`，适配器不是 `Send` 的。
pub struct HtmlAdapter {
    dom: RcDom,
    slots: Vec<Handle>,
    nodes: Vec<NodeId>,
}

impl HtmlAdapter {
    /// 解析 HTML 并把可翻译内容写入存储
    pub fn load(html: &str, store: &NodeStore) -> TranslationResult<Self> {
        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut Cursor::new(html.as_bytes()))
            .map_err(|e| TranslationError::ParseError(format!("HTML 解析失败: {}", e)))?;

        let mut adapter = Self {
            dom,
            slots: Vec::new(),
            nodes: Vec::new(),
        };
        let document = adapter.dom.document.clone();
        adapter.walk(&document, "", store);

        tracing::debug!(
            "HTML 收集到 {} 个可翻译节点（{} 个 DOM 槽位）",
            adapter.nodes.len(),
            adapter.slots.len()
        );
        Ok(adapter)
    }

    fn walk(&mut self, node: &Handle, path: &str, store: &NodeStore) {
        let children: Vec<Handle> = node.children.borrow().iter().cloned().collect();

        let mut totals: HashMap<String, usize> = HashMap::new();
        for child in &children {
            if let NodeData::Element { name, .. } = &child.data {
                *totals.entry(name.local.to_ascii_lowercase().to_string()).or_default() += 1;
            }
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        for child in &children {
            match &child.data {
                NodeData::Text { contents } => {
                    let text = contents.borrow().to_string();
                    if !text.trim().is_empty() {
                        self.push_text(child, path, &text, store);
                    }
                }
                NodeData::Element { name, .. } => {
                    let tag = name.local.to_ascii_lowercase().to_string();
                    let index = seen.entry(tag.clone()).or_default();
                    *index += 1;

                    let segment = if totals.get(&tag).copied().unwrap_or(0) > 1 {
                        format!("{}[{}]", tag, index)
                    } else {
                        tag.clone()
                    };
                    let child_path = if path.is_empty() {
                        segment
                    } else {
                        format!("{}/{}", path, segment)
                    };

                    self.push_attributes(child, &child_path, store);

                    if !constants::SKIP_ELEMENTS.contains(&tag.as_str()) {
                        self.walk(child, &child_path, store);
                    }
                }
                _ => self.walk(child, path, store),
            }
        }
    }

    fn push_text(&mut self, handle: &Handle, path: &str, text: &str, store: &NodeStore) {
        let leading = &text[..text.len() - text.trim_start().len()];
        let trailing = &text[text.trim_end().len()..];

        let slot = self.slots.len();
        self.slots.push(handle.clone());

        let id = store.next_id();
        let node = Node::new(id, path, text.trim())
            .with_path(path)
            .with_metadata(NodeMetadata::DomText {
                slot,
                leading: leading.to_string(),
                trailing: trailing.to_string(),
            });
        store.add(node);
        self.nodes.push(id);
    }

    fn push_attributes(&mut self, handle: &Handle, path: &str, store: &NodeStore) {
        let NodeData::Element { attrs, .. } = &handle.data else {
            return;
        };

        let found: Vec<(String, String)> = attrs
            .borrow()
            .iter()
            .filter(|attr| constants::TRANSLATABLE_ATTRS.contains(&&*attr.name.local))
            .filter(|attr| !attr.value.trim().is_empty())
            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
            .collect();

        if found.is_empty() {
            return;
        }

        let slot = self.slots.len();
        self.slots.push(handle.clone());

        for (attribute, value) in found {
            let id = store.next_id();
            let node = Node::new(id, path, value)
                .with_path(format!("{}/@{}", path, attribute))
                .with_metadata(NodeMetadata::DomAttribute { slot, attribute });
            store.add(node);
            self.nodes.push(id);
        }
    }

    fn slot(&self, slot: usize) -> TranslationResult<&Handle> {
        self.slots
            .get(slot)
            .ok_or_else(|| TranslationError::InternalError(format!("DOM 槽位 {} 不存在", slot)))
    }
}

impl DocumentAdapter for HtmlAdapter {
    fn name(&self) -> &str {
        "html"
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// 回写成功节点的译文并序列化整个文档
    fn render(&self, store: &NodeStore) -> TranslationResult<String> {
        for id in &self.nodes {
            let node = store.get(*id).ok_or(TranslationError::NodeNotFound(*id))?;
            if node.status != NodeStatus::Success {
                continue;
            }

            match &node.metadata {
                NodeMetadata::DomText {
                    slot,
                    leading,
                    trailing,
                } => {
                    if let NodeData::Text { contents } = &self.slot(*slot)?.data {
                        let text = format!("{}{}{}", leading, node.translated_text, trailing);
                        *contents.borrow_mut() = StrTendril::from_slice(&text);
                    }
                }
                NodeMetadata::DomAttribute { slot, attribute } => {
                    if let NodeData::Element { attrs, .. } = &self.slot(*slot)?.data {
                        for attr in attrs.borrow_mut().iter_mut() {
                            if &*attr.name.local == attribute.as_str() {
                                attr.value = StrTendril::from_slice(&node.translated_text);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let mut buf: Vec<u8> = Vec::new();
        let document: SerializableHandle = self.dom.document.clone().into();
        serialize(&mut buf, &document, SerializeOpts::default())
            .map_err(|e| TranslationError::SerializationError(format!("HTML 序列化失败: {}", e)))?;

        String::from_utf8(buf).map_err(|e| TranslationError::SerializationError(e.to_string()))
    }
}
