//! 纯文本适配器
//!
//! 以空行为界把文本拆成段落，每个段落一个节点。段落首尾的空白保存在节点元数据中，
//! 空行原样保留，因此没有翻译成功的文档渲染后与输入逐字节相同。

use crate::adapters::DocumentAdapter;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::node::{Node, NodeId, NodeMetadata, NodeStatus};
use crate::translation::pipeline::store::NodeStore;

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Literal(String),
    Paragraph(NodeId),
}

/// 纯文本适配器
#[derive(Debug, Clone)]
pub struct PlainTextAdapter {
    pieces: Vec<Piece>,
    node_count: usize,
}

impl PlainTextAdapter {
    /// 拆分段落并写入存储
    pub fn load(text: &str, store: &NodeStore) -> Self {
        let mut adapter = Self {
            pieces: Vec::new(),
            node_count: 0,
        };
        let mut paragraph = String::new();

        for line in text.split_inclusive('\n') {
            if line.trim().is_empty() {
                adapter.flush(&mut paragraph, store);
                adapter.push_literal(line);
            } else {
                paragraph.push_str(line);
            }
        }
        adapter.flush(&mut paragraph, store);

        tracing::debug!("纯文本拆分为 {} 个段落", adapter.node_count);
        adapter
    }

    fn flush(&mut self, paragraph: &mut String, store: &NodeStore) {
        if paragraph.is_empty() {
            return;
        }

        let raw = std::mem::take(paragraph);
        let body = raw.trim();
        let leading = &raw[..raw.len() - raw.trim_start().len()];
        let trailing = &raw[raw.trim_end().len()..];

        let id = store.next_id();
        self.node_count += 1;
        let node = Node::new(id, format!("p{}", self.node_count), body)
            .with_path(format!("text/p[{}]", self.node_count))
            .with_metadata(NodeMetadata::TextBlock {
                leading: leading.to_string(),
                trailing: trailing.to_string(),
            });
        store.add(node);
        self.pieces.push(Piece::Paragraph(id));
    }

    fn push_literal(&mut self, text: &str) {
        match self.pieces.last_mut() {
            Some(Piece::Literal(literal)) => literal.push_str(text),
            _ => self.pieces.push(Piece::Literal(text.to_string())),
        }
    }
}

impl DocumentAdapter for PlainTextAdapter {
    fn name(&self) -> &str {
        "text"
    }

    fn node_count(&self) -> usize {
        self.node_count
    }

    fn render(&self, store: &NodeStore) -> TranslationResult<String> {
        let mut out = String::new();

        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Paragraph(id) => {
                    let node = store.get(*id).ok_or(TranslationError::NodeNotFound(*id))?;
                    let body = if node.status == NodeStatus::Success {
                        &node.translated_text
                    } else {
                        &node.original_text
                    };
                    match &node.metadata {
                        NodeMetadata::TextBlock { leading, trailing } => {
                            out.push_str(leading);
                            out.push_str(body);
                            out.push_str(trailing);
                        }
                        _ => out.push_str(body),
                    }
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_paragraphs() {
        let store = NodeStore::new();
        let adapter = PlainTextAdapter::load("  Title line\n\n\nFirst para\nstill first.\n\nLast", &store);

        assert_eq!(adapter.node_count(), 3);
        let nodes = store.get_all();
        assert_eq!(nodes[0].original_text, "Title line");
        assert_eq!(nodes[1].original_text, "First para\nstill first.");
        assert_eq!(nodes[2].original_text, "Last");
        assert_eq!(nodes[2].path, "text/p[3]");
        assert_eq!(
            nodes[0].metadata,
            NodeMetadata::TextBlock {
                leading: "  ".to_string(),
                trailing: "\n".to_string()
            }
        );
    }

    #[test]
    fn test_render_untranslated_is_identical() {
        let input = "\nAlpha\n\n  \nBeta gamma\n";
        let store = NodeStore::new();
        let adapter = PlainTextAdapter::load(input, &store);
        assert_eq!(adapter.render(&store).unwrap(), input);
    }

    #[test]
    fn test_render_mixes_translated_and_failed() {
        let store = NodeStore::new();
        let adapter = PlainTextAdapter::load("one\n\ntwo\n", &store);
        store.update(1, |node| node.mark_success("uno")).unwrap();
        store.update(2, |node| node.mark_failed("boom")).unwrap();

        assert_eq!(adapter.render(&store).unwrap(), "uno\n\ntwo\n");
    }

    #[test]
    fn test_empty_input() {
        let store = NodeStore::new();
        let adapter = PlainTextAdapter::load("", &store);
        assert_eq!(adapter.node_count(), 0);
        assert_eq!(adapter.render(&store).unwrap(), "");
    }
}
