//! # 错误分类
//!
//! 把原始错误映射到分类表中的一项，附带严重程度与是否可恢复。
//! 分类结果只由重试调度器使用，用来决定能否重试以及等待多久。
//!
//! ## 分类方式
//!
//! 先对小写化的错误文本做关键字匹配，按规则表顺序取第一个命中项；
//! 没有命中时根据错误变体推断；仍无法判断的归为 `generic_error`（中等、可恢复）。
//!
//! | 类型 | 严重程度 | 可恢复 | 关键字示例 |
//! |---|---|---|---|
//! | `auth_error` | high | 否 | unauthorized, forbidden, 401, 403 |
//! | `quota_error` | high | 否 | quota, insufficient balance |
//! | `rate_limit` | medium | 是 | rate limit, too many requests, 429 |
//! | `timeout` | medium | 是 | timeout, timed out, deadline exceeded |
//! | `network_error` | high | 是 | connection refused, connection reset, dns |
//! | `server_error` | high | 是 | 500, 502, 503, internal server error |
//! | `parsing_error` | medium | 是 | parse error, malformed, not found in result |

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use serde::Serialize;

use crate::translation::error::TranslationError;

/// 错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorType {
    #[serde(rename = "network_error")]
    Network,
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "rate_limit")]
    RateLimit,
    #[serde(rename = "auth_error")]
    Auth,
    #[serde(rename = "quota_error")]
    Quota,
    #[serde(rename = "parsing_error")]
    Parsing,
    #[serde(rename = "server_error")]
    Server,
    #[serde(rename = "generic_error")]
    Generic,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Network => "network_error",
            ErrorType::Timeout => "timeout",
            ErrorType::RateLimit => "rate_limit",
            ErrorType::Auth => "auth_error",
            ErrorType::Quota => "quota_error",
            ErrorType::Parsing => "parsing_error",
            ErrorType::Server => "server_error",
            ErrorType::Generic => "generic_error",
        }
    }

    /// 该类型的默认严重程度与可恢复性
    pub fn profile(&self) -> (ErrorSeverity, bool) {
        match self {
            ErrorType::Network => (ErrorSeverity::High, true),
            ErrorType::Timeout => (ErrorSeverity::Medium, true),
            ErrorType::RateLimit => (ErrorSeverity::Medium, true),
            ErrorType::Auth => (ErrorSeverity::High, false),
            ErrorType::Quota => (ErrorSeverity::High, false),
            ErrorType::Parsing => (ErrorSeverity::Medium, true),
            ErrorType::Server => (ErrorSeverity::High, true),
            ErrorType::Generic => (ErrorSeverity::Medium, true),
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
}

/// 分类后的错误
#[derive(Debug, Clone)]
pub struct ClassifiedError {
    pub error_type: ErrorType,
    pub severity: ErrorSeverity,
    pub recoverable: bool,
    pub message: String,
    pub occurred_at: Instant,
}

/// 关键字规则
#[derive(Debug, Clone)]
struct ClassificationRule {
    error_type: ErrorType,
    keywords: &'static [&'static str],
}

/// 错误分类器
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<ClassificationRule>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        // 顺序即优先级：认证/配额必须先于通用的状态码与网络关键字
        let rules = vec![
            ClassificationRule {
                error_type: ErrorType::Auth,
                keywords: &[
                    "unauthorized",
                    "forbidden",
                    "401",
                    "403",
                    "invalid api key",
                    "authentication",
                    "认证失败",
                ],
            },
            ClassificationRule {
                error_type: ErrorType::Quota,
                keywords: &[
                    "quota",
                    "insufficient balance",
                    "billing",
                    "402",
                    "额度",
                ],
            },
            ClassificationRule {
                error_type: ErrorType::RateLimit,
                keywords: &["rate limit", "ratelimit", "too many requests", "429", "速率"],
            },
            ClassificationRule {
                error_type: ErrorType::Timeout,
                keywords: &["timeout", "timed out", "deadline exceeded", "超时"],
            },
            ClassificationRule {
                error_type: ErrorType::Network,
                keywords: &[
                    "connection refused",
                    "connection reset",
                    "connection closed",
                    "broken pipe",
                    "network",
                    "dns",
                    "unreachable",
                    "网络",
                ],
            },
            ClassificationRule {
                error_type: ErrorType::Server,
                keywords: &[
                    "internal server error",
                    "bad gateway",
                    "service unavailable",
                    "gateway timeout",
                    "500",
                    "502",
                    "503",
                    "504",
                ],
            },
            ClassificationRule {
                error_type: ErrorType::Parsing,
                keywords: &[
                    "parse error",
                    "malformed",
                    "invalid json",
                    "unexpected token",
                    "not found in result",
                    "解析",
                ],
            },
        ];

        Self { rules }
    }

    /// 分类一个翻译错误
    pub fn classify(&self, error: &TranslationError) -> ClassifiedError {
        let message = error.to_string();
        let error_type = match error {
            // 结构化变体的文本里含有节点标识，不能参与关键字匹配
            TranslationError::TranslationNotFound(_) => ErrorType::Parsing,
            TranslationError::NodeNotFound(_) | TranslationError::Cancelled => ErrorType::Generic,
            _ => self
                .match_keywords(&message)
                .unwrap_or_else(|| Self::type_of_variant(error)),
        };
        Self::build(error_type, message)
    }

    /// 仅根据错误文本分类
    pub fn classify_message(&self, message: &str) -> ClassifiedError {
        let error_type = self.match_keywords(message).unwrap_or(ErrorType::Generic);
        Self::build(error_type, message.to_string())
    }

    fn match_keywords(&self, message: &str) -> Option<ErrorType> {
        let lower = message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|keyword| contains_keyword(&lower, keyword))
            })
            .map(|rule| rule.error_type)
    }

    fn type_of_variant(error: &TranslationError) -> ErrorType {
        match error {
            TranslationError::NetworkError(_) => ErrorType::Network,
            TranslationError::TimeoutError(_) => ErrorType::Timeout,
            TranslationError::RateLimited(_) => ErrorType::RateLimit,
            TranslationError::ParseError(_)
            | TranslationError::SerializationError(_)
            | TranslationError::TranslationNotFound(_) => ErrorType::Parsing,
            _ => ErrorType::Generic,
        }
    }

    fn build(error_type: ErrorType, message: String) -> ClassifiedError {
        let (severity, recoverable) = error_type.profile();
        ClassifiedError {
            error_type,
            severity,
            recoverable,
            message,
            occurred_at: Instant::now(),
        }
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// 状态码类关键字必须是独立的数字，避免 `5000` 命中 `500`
fn contains_keyword(text: &str, keyword: &str) -> bool {
    if !keyword.bytes().all(|b| b.is_ascii_digit()) {
        return text.contains(keyword);
    }

    let bytes = text.as_bytes();
    text.match_indices(keyword).any(|(start, _)| {
        let end = start + keyword.len();
        let before_ok = start == 0 || !bytes[start - 1].is_ascii_digit();
        let after_ok = end == bytes.len() || !bytes[end].is_ascii_digit();
        before_ok && after_ok
    })
}

/// 错误统计信息
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_type: HashMap<ErrorType, usize>,
    pub by_severity: HashMap<ErrorSeverity, usize>,
    pub recoverable_errors: usize,
}

impl ErrorStats {
    /// 记录错误
    pub fn record(&mut self, error: &ClassifiedError) {
        self.total_errors += 1;
        *self.by_type.entry(error.error_type).or_insert(0) += 1;
        *self.by_severity.entry(error.severity).or_insert(0) += 1;
        if error.recoverable {
            self.recoverable_errors += 1;
        }
    }

    pub fn count(&self, error_type: ErrorType) -> usize {
        self.by_type.get(&error_type).copied().unwrap_or(0)
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(message: &str) -> ClassifiedError {
        ErrorClassifier::new().classify_message(message)
    }

    #[test]
    fn test_keyword_classification() {
        let cases = [
            ("dial tcp: connection refused", ErrorType::Network, ErrorSeverity::High, true),
            ("HTTP 401 Unauthorized", ErrorType::Auth, ErrorSeverity::High, false),
            ("status 403", ErrorType::Auth, ErrorSeverity::High, false),
            ("Rate limit exceeded", ErrorType::RateLimit, ErrorSeverity::Medium, true),
            ("HTTP 429", ErrorType::RateLimit, ErrorSeverity::Medium, true),
            ("request timed out", ErrorType::Timeout, ErrorSeverity::Medium, true),
            ("monthly quota exhausted", ErrorType::Quota, ErrorSeverity::High, false),
            ("Parse error at line 3", ErrorType::Parsing, ErrorSeverity::Medium, true),
            ("malformed response", ErrorType::Parsing, ErrorSeverity::Medium, true),
            ("502 Bad Gateway", ErrorType::Server, ErrorSeverity::High, true),
            ("something odd happened", ErrorType::Generic, ErrorSeverity::Medium, true),
        ];

        for (message, error_type, severity, recoverable) in cases {
            let classified = classify(message);
            assert_eq!(classified.error_type, error_type, "{}", message);
            assert_eq!(classified.severity, severity, "{}", message);
            assert_eq!(classified.recoverable, recoverable, "{}", message);
        }
    }

    #[test]
    fn test_variant_fallback() {
        let classifier = ErrorClassifier::new();

        let error = TranslationError::NetworkError("peer went away".to_string());
        assert_eq!(classifier.classify(&error).error_type, ErrorType::Network);

        let error = TranslationError::TranslationNotFound(3);
        assert_eq!(classifier.classify(&error).error_type, ErrorType::Parsing);

        let error = TranslationError::TimeoutError("slow".to_string());
        assert_eq!(classifier.classify(&error).error_type, ErrorType::Timeout);
    }

    #[test]
    fn test_keywords_win_over_variant() {
        let error = TranslationError::TranslationServiceError("401 unauthorized".to_string());
        let classified = ErrorClassifier::new().classify(&error);
        assert_eq!(classified.error_type, ErrorType::Auth);
        assert!(!classified.recoverable);
    }

    #[test]
    fn test_status_codes_match_whole_numbers_only() {
        assert_eq!(classify("sent 5000 characters").error_type, ErrorType::Generic);
        assert_eq!(classify("HTTP/1.1 500").error_type, ErrorType::Server);

        let error = TranslationError::TranslationNotFound(4010);
        assert_eq!(
            ErrorClassifier::new().classify(&error).error_type,
            ErrorType::Parsing
        );
    }

    #[test]
    fn test_error_stats() {
        let mut stats = ErrorStats::default();
        stats.record(&classify("unauthorized"));
        stats.record(&classify("connection refused"));
        stats.record(&classify("connection refused"));

        assert_eq!(stats.total_errors, 3);
        assert_eq!(stats.count(ErrorType::Network), 2);
        assert_eq!(stats.recoverable_errors, 2);
        assert_eq!(stats.by_severity.get(&ErrorSeverity::High), Some(&3));

        stats.reset();
        assert_eq!(stats.total_errors, 0);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(ErrorType::Network.to_string(), "network_error");
        assert_eq!(ErrorType::Generic.as_str(), "generic_error");
    }
}
