//! 错误处理模块
//!
//! 字节处理路径本身从不返回错误：不完整输入、无关标记、缓冲区溢出和协议顺序违规
//! 都在状态机内部消化，只以 `AnalysisAbandoned` 里程碑的形式对外可见。
//! 这里的错误类型只用于配置、注册和日志初始化等装配阶段的操作。

use thiserror::Error;

/// 装配阶段操作的结果类型
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// 分析器错误类型
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// 配置错误
    #[error("Configuration error: {message}")]
    ConfigError {
        /// 错误消息
        message: String,
    },

    /// 组件重复注册
    #[error("Analyzer component already registered: {name}")]
    DuplicateComponent {
        /// 组件名称
        name: String,
    },

    /// 未知组件
    #[error("Unknown analyzer component: {name}")]
    UnknownComponent {
        /// 组件名称
        name: String,
    },

    /// 日志初始化失败
    #[error("Logger initialization failed: {message}")]
    LoggerError {
        /// 错误消息
        message: String,
    },
}

impl AnalyzerError {
    /// 创建配置错误
    pub fn config_error<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// 创建重复注册错误
    pub fn duplicate_component<S: Into<String>>(name: S) -> Self {
        Self::DuplicateComponent { name: name.into() }
    }

    /// 创建未知组件错误
    pub fn unknown_component<S: Into<String>>(name: S) -> Self {
        Self::UnknownComponent { name: name.into() }
    }

    /// 创建日志错误
    pub fn logger_error<S: Into<String>>(message: S) -> Self {
        Self::LoggerError {
            message: message.into(),
        }
    }

    /// 检查是否为配置相关错误
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }

    /// 检查是否为注册表相关错误
    pub fn is_registry_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateComponent { .. } | Self::UnknownComponent { .. }
        )
    }

    /// 获取错误代码
    pub fn error_code(&self) -> u32 {
        match self {
            Self::ConfigError { .. } => 1008,
            Self::DuplicateComponent { .. } => 1020,
            Self::UnknownComponent { .. } => 1021,
            Self::LoggerError { .. } => 1030,
        }
    }
}

/// 从serde_json::Error转换
impl From<serde_json::Error> for AnalyzerError {
    fn from(err: serde_json::Error) -> Self {
        Self::config_error(format!("JSON error: {}", err))
    }
}
