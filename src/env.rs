//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。所有变量使用 `DOC_TRANSLATOR_` 前缀，
//! 解析失败时返回带变量名的 [`EnvError`]，由调用方决定是否回退到配置文件的值。

use std::env;
use std::fmt;
use std::time::Duration;

use crate::translation::retry::RetryStrategy as Strategy;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 只在变量被显式设置时返回值
    fn get_explicit() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "DOC_TRANSLATOR_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                level @ ("trace" | "debug" | "info" | "warn" | "error") => Ok(level.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何非空值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "DOC_TRANSLATOR_TARGET_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Target language for translation";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("zh".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            let lang = value.trim().to_lowercase();
            if lang.len() < 2 || !lang.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Language code must look like 'zh' or 'zh-tw'".to_string(),
                });
            }
            Ok(lang)
        }
    }

    /// 源语言
    pub struct SourceLang;
    impl EnvVar<String> for SourceLang {
        const NAME: &'static str = "DOC_TRANSLATOR_SOURCE_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Source language for translation ('auto' for detection)";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("auto".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            let lang = value.trim().to_lowercase();
            if lang == "auto" || lang.len() == 2 {
                Ok(lang)
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Language code must be 'auto' or 2 characters (ISO 639-1)"
                        .to_string(),
                })
            }
        }
    }

    /// 批次大小
    pub struct BatchSize;
    impl EnvVar<usize> for BatchSize {
        const NAME: &'static str = "DOC_TRANSLATOR_BATCH_SIZE";
        const DEFAULT: Option<usize> = Some(2000);
        const DESCRIPTION: &'static str = "Maximum characters per translation batch";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 100_000)
        }
    }

    /// 每个节点的最大尝试次数
    pub struct MaxRetries;
    impl EnvVar<u32> for MaxRetries {
        const NAME: &'static str = "DOC_TRANSLATOR_MAX_RETRIES";
        const DEFAULT: Option<u32> = Some(3);
        const DESCRIPTION: &'static str = "Maximum attempts per node, including the first dispatch";

        fn parse(value: &str) -> EnvResult<u32> {
            parse_positive_usize(value, Self::NAME, 1, 20).map(|n| n as u32)
        }
    }

    /// 重试延迟策略
    pub struct RetryStrategy;
    impl EnvVar<Strategy> for RetryStrategy {
        const NAME: &'static str = "DOC_TRANSLATOR_RETRY_STRATEGY";
        const DEFAULT: Option<Strategy> = Some(Strategy::Backoff);
        const DESCRIPTION: &'static str = "Retry delay strategy: immediate, backoff, adaptive, contextual";

        fn parse(value: &str) -> EnvResult<Strategy> {
            value.parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: format!(
                    "Invalid strategy '{}'. Use: immediate, backoff, adaptive, contextual",
                    value
                ),
            })
        }
    }

    /// 重试轮数上限
    pub struct MaxRetryRounds;
    impl EnvVar<usize> for MaxRetryRounds {
        const NAME: &'static str = "DOC_TRANSLATOR_MAX_RETRY_ROUNDS";
        const DEFAULT: Option<usize> = Some(3);
        const DESCRIPTION: &'static str = "Maximum number of retry rounds per pass";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 0, 10)
        }
    }

    /// 上下文窗口半径
    pub struct ContextDistance;
    impl EnvVar<usize> for ContextDistance {
        const NAME: &'static str = "DOC_TRANSLATOR_CONTEXT_DISTANCE";
        const DEFAULT: Option<usize> = Some(2);
        const DESCRIPTION: &'static str = "Neighbouring nodes sent on each side of a retried node";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 0, 20)
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存启用状态
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "DOC_TRANSLATOR_CACHE_ENABLED";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Enable the translation cache";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 缓存容量
    pub struct Capacity;
    impl EnvVar<usize> for Capacity {
        const NAME: &'static str = "DOC_TRANSLATOR_CACHE_CAPACITY";
        const DEFAULT: Option<usize> = Some(1000);
        const DESCRIPTION: &'static str = "Cache capacity (number of entries)";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 1_000_000)
        }
    }

    /// 缓存TTL
    pub struct Ttl;
    impl EnvVar<Duration> for Ttl {
        const NAME: &'static str = "DOC_TRANSLATOR_CACHE_TTL";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(3600));
        const DESCRIPTION: &'static str = "Cache TTL in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds: u64 = value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number of seconds".to_string(),
            })?;

            if seconds == 0 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "TTL must be greater than 0".to_string(),
                });
            }

            if seconds > 86400 * 7 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "TTL too long (maximum 7 days)".to_string(),
                });
            }

            Ok(Duration::from_secs(seconds))
        }
    }
}

/// 性能相关环境变量
pub mod performance {
    use super::*;

    /// 工作池并发数
    pub struct WorkerCount;
    impl EnvVar<usize> for WorkerCount {
        const NAME: &'static str = "DOC_TRANSLATOR_WORKERS";
        const DEFAULT: Option<usize> = Some(4);
        const DESCRIPTION: &'static str = "Number of worker tasks used for parallel dispatch";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 256)
        }
    }

    /// 并行派发启用状态
    pub struct ParallelEnabled;
    impl EnvVar<bool> for ParallelEnabled {
        const NAME: &'static str = "DOC_TRANSLATOR_PARALLEL";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Dispatch batches through the worker pool";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}
