//! 翻译回调
//!
//! 核心流程对翻译后端一无所知，只依赖这一个单方法接口：输入文本，返回译文或错误。
//! HTTP 服务、本地模型、测试替身都以同样的方式接入。

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::translation::error::TranslationResult;

/// 翻译回调接口
///
/// 实现必须原样保留 `@@NODE_START_<id>@@` / `@@NODE_END_<id>@@` 标记行。
#[async_trait]
pub trait Translator: Send + Sync {
    /// 翻译一段文本；`cancel` 被触发后实现应尽快返回
    async fn translate(&self, cancel: &CancellationToken, text: &str) -> TranslationResult<String>;

    /// 用于日志的名称
    fn name(&self) -> &str {
        "translator"
    }
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for Arc<T> {
    async fn translate(&self, cancel: &CancellationToken, text: &str) -> TranslationResult<String> {
        (**self).translate(cancel, text).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// 把异步闭包包装为 [`Translator`]
pub struct FnTranslator<F> {
    func: F,
}

impl<F, Fut> FnTranslator<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = TranslationResult<String>> + Send,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> Translator for FnTranslator<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = TranslationResult<String>> + Send,
{
    async fn translate(&self, _cancel: &CancellationToken, text: &str) -> TranslationResult<String> {
        (self.func)(text.to_string()).await
    }

    fn name(&self) -> &str {
        "fn"
    }
}

/// 创建基于闭包的翻译回调
///
/// ```
/// use doc_translator::translation::core::translator_fn;
///
/// let upper = translator_fn(|text: String| async move { Ok(text.to_uppercase()) });
/// # let _ = upper;
/// ```
pub fn translator_fn<F, Fut>(func: F) -> FnTranslator<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = TranslationResult<String>> + Send,
{
    FnTranslator::new(func)
}

/// 原样返回输入的回调，用于联调与测试
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

#[async_trait]
impl Translator for IdentityTranslator {
    async fn translate(&self, _cancel: &CancellationToken, text: &str) -> TranslationResult<String> {
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "identity"
    }
}
