//! 日志模块
//!
//! 基于 `tracing-subscriber` 提供统一的日志配置和初始化入口。
//! 库内部只使用 `tracing` 宏，是否输出以及输出到哪里由宿主决定。

use crate::error::{AnalyzerError, Result};
use tracing_subscriber::EnvFilter;

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// 是否启用日志
    pub enabled: bool,
    /// 日志级别
    pub level: LogLevel,
    /// 是否显示时间戳
    pub show_timestamp: bool,
    /// 是否显示模块路径
    pub show_module: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用彩色输出
    pub use_colors: bool,
    /// 额外的过滤指令，例如 `xmpp_starttls=trace`
    pub directives: Option<String>,
    /// 输出目标
    pub target: LogTarget,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// 错误
    Error,
    /// 警告
    Warn,
    /// 信息
    Info,
    /// 调试
    Debug,
    /// 跟踪
    Trace,
}

impl LogLevel {
    /// 对应的过滤指令
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter())
    }
}

/// 日志输出目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// 标准输出
    Stdout,
    /// 标准错误
    Stderr,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::Info,
            show_timestamp: true,
            show_module: true,
            show_line_number: false,
            use_colors: true,
            directives: None,
            target: LogTarget::Stdout,
        }
    }
}

impl LoggerConfig {
    /// 检查是否启用了指定级别的日志
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.enabled && level <= self.level
    }

    /// 构造过滤器：先取级别，再追加额外指令
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let mut spec = self.level.as_filter().to_string();
        if let Some(directives) = self.directives.as_deref().filter(|d| !d.trim().is_empty()) {
            spec.push(',');
            spec.push_str(directives);
        }
        EnvFilter::try_new(&spec)
            .map_err(|e| AnalyzerError::logger_error(format!("invalid filter '{}': {}", spec, e)))
    }
}

/// 安装全局日志订阅者
///
/// 禁用的配置直接返回。已有全局订阅者（包括此前调用本函数安装的）时不做任何事，
/// 所以可以安全地重复调用。
pub fn init_logger(config: LoggerConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.show_module)
        .with_line_number(config.show_line_number)
        .with_ansi(config.use_colors);

    let installed = match (config.target, config.show_timestamp) {
        (LogTarget::Stdout, true) => builder.with_writer(std::io::stdout).try_init(),
        (LogTarget::Stdout, false) => builder.without_time().with_writer(std::io::stdout).try_init(),
        (LogTarget::Stderr, true) => builder.with_writer(std::io::stderr).try_init(),
        (LogTarget::Stderr, false) => builder.without_time().with_writer(std::io::stderr).try_init(),
    };

    if installed.is_err() {
        tracing::debug!("global subscriber already installed, keeping it");
    }
    Ok(())
}

/// 构建器模式的日志配置
#[derive(Debug, Default)]
pub struct LoggerConfigBuilder {
    config: LoggerConfig,
}

impl LoggerConfigBuilder {
    /// 创建新的配置构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置是否启用日志
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 设置日志级别
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// 设置是否显示时间戳
    pub fn show_timestamp(mut self, show: bool) -> Self {
        self.config.show_timestamp = show;
        self
    }

    /// 设置是否显示模块路径
    pub fn show_module(mut self, show: bool) -> Self {
        self.config.show_module = show;
        self
    }

    /// 设置是否显示行号
    pub fn show_line_number(mut self, show: bool) -> Self {
        self.config.show_line_number = show;
        self
    }

    /// 设置是否使用彩色输出
    pub fn use_colors(mut self, use_colors: bool) -> Self {
        self.config.use_colors = use_colors;
        self
    }

    /// 追加过滤指令
    pub fn directives<S: Into<String>>(mut self, directives: S) -> Self {
        self.config.directives = Some(directives.into());
        self
    }

    /// 设置输出目标
    pub fn target(mut self, target: LogTarget) -> Self {
        self.config.target = target;
        self
    }

    /// 构建配置
    pub fn build(self) -> LoggerConfig {
        self.config
    }

    /// 构建并初始化日志器
    pub fn init(self) -> Result<()> {
        init_logger(self.config)
    }
}

/// 创建禁用日志的配置
pub fn disabled_config() -> LoggerConfig {
    LoggerConfig {
        enabled: false,
        ..Default::default()
    }
}

/// 创建开发环境的日志配置
pub fn dev_config() -> LoggerConfig {
    LoggerConfigBuilder::new()
        .level(LogLevel::Debug)
        .show_timestamp(true)
        .show_module(true)
        .show_line_number(true)
        .use_colors(true)
        .target(LogTarget::Stderr)
        .build()
}

/// 创建生产环境的日志配置
pub fn prod_config() -> LoggerConfig {
    LoggerConfigBuilder::new()
        .level(LogLevel::Info)
        .show_timestamp(true)
        .show_module(false)
        .show_line_number(false)
        .use_colors(false)
        .target(LogTarget::Stdout)
        .build()
}
