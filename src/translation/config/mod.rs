//! 翻译配置管理模块
//!
//! 提供统一的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 批次处理相关（按字符计数）
    pub const DEFAULT_MAX_BATCH_SIZE: usize = 2000;

    // 文本过滤相关
    pub const MIN_TEXT_LENGTH: usize = 2;
    pub const PARALLEL_FILTER_THRESHOLD: usize = 512;

    // 重试相关
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_MAX_RETRY_ROUNDS: usize = 3;
    pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
    pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;
    pub const DEFAULT_MAX_RETRY_WAIT_MS: u64 = 10_000;

    // 上下文窗口
    pub const DEFAULT_CONTEXT_DISTANCE: usize = 2;
    pub const DEFAULT_CONTEXT_SNIPPET_CHARS: usize = 80;

    // 工作池
    pub const DEFAULT_WORKER_COUNT: usize = 4;
    pub const DEFAULT_QUEUE_BACKLOG: usize = 64;

    // 缓存设置
    pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600); // 1小时

    // 默认语言
    pub const DEFAULT_SOURCE_LANG: &str = "auto";
    pub const DEFAULT_TARGET_LANG: &str = "zh";

    // 可翻译属性
    pub const TRANSLATABLE_ATTRS: &[&str] = &[
        "title", "alt", "placeholder", "aria-label", "aria-description",
    ];

    // 跳过的元素
    pub const SKIP_ELEMENTS: &[&str] = &[
        "script", "style", "code", "pre", "noscript", "meta", "link", "head",
        "svg", "math", "canvas", "video", "audio", "embed", "object", "iframe",
        "map", "area", "base", "br", "hr", "img", "input", "source", "track", "wbr",
        "template", "textarea",
    ];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "doc-translator.toml",
        ".doc-translator.toml",
        "doc-translator.json",
        "~/.config/doc-translator/config.toml",
        "/etc/doc-translator/config.toml",
    ];
}

/// 当前目录或搜索路径中是否存在配置文件
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}
