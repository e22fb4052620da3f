//! 分析器构造器模块
//!
//! 提供流畅的链式API来配置分析器，并生成可在连接之间共享的工厂。

use crate::core::protocol::ConnectionId;
use crate::error::Result;
use crate::stream::analyzer::{AnalyzerConfig, XmppAnalyzer};
use crate::stream::{MilestoneSink, TracingSink};
use crate::upgrade::{NoopHandoff, TlsHandoff};
use std::sync::Arc;

/// 分析器构造器
///
/// # 示例
///
/// ```rust
/// use std::sync::Arc;
/// use xmpp_starttls::AnalyzerBuilder;
/// use xmpp_starttls::stream::RecordingSink;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sink = Arc::new(RecordingSink::new());
/// let factory = AnalyzerBuilder::new()
///     .with_max_prefix_window(4096)
///     .with_sink(sink)
///     .build()?;
/// let analyzer = factory.instantiate_random();
/// # let _ = analyzer;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AnalyzerBuilder {
    config: AnalyzerConfig,
    sink: Option<Arc<dyn MilestoneSink>>,
    handoff: Option<Arc<dyn TlsHandoff>>,
}

impl Default for AnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzerBuilder {
    /// 创建新的构造器
    pub fn new() -> Self {
        Self {
            config: AnalyzerConfig::default(),
            sink: None,
            handoff: None,
        }
    }

    /// 使用完整配置
    pub fn with_config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置前缀窗口
    pub fn with_max_prefix_window(mut self, max_prefix_window: usize) -> Self {
        self.config.buffer.max_prefix_window = max_prefix_window;
        self
    }

    /// 设置里程碑接收端，默认输出到 `tracing`
    pub fn with_sink(mut self, sink: Arc<dyn MilestoneSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 设置TLS交接目标，默认不做任何事
    pub fn with_tls_handoff(mut self, handoff: Arc<dyn TlsHandoff>) -> Self {
        self.handoff = Some(handoff);
        self
    }

    /// 校验配置并构建工厂
    pub fn build(self) -> Result<AnalyzerFactory> {
        self.config.validate()?;
        Ok(AnalyzerFactory {
            config: self.config,
            sink: self
                .sink
                .unwrap_or_else(|| Arc::new(TracingSink) as Arc<dyn MilestoneSink>),
            handoff: self
                .handoff
                .unwrap_or_else(|| Arc::new(NoopHandoff) as Arc<dyn TlsHandoff>),
        })
    }
}

/// 分析器工厂
///
/// 克隆开销很小，可以交给宿主框架在任意线程上为新连接创建分析器。
#[derive(Debug, Clone)]
pub struct AnalyzerFactory {
    config: AnalyzerConfig,
    sink: Arc<dyn MilestoneSink>,
    handoff: Arc<dyn TlsHandoff>,
}

impl AnalyzerFactory {
    /// 为指定连接创建分析器
    pub fn instantiate(&self, connection_id: ConnectionId) -> XmppAnalyzer {
        XmppAnalyzer::new(
            connection_id,
            self.config.clone(),
            Arc::clone(&self.sink),
            Arc::clone(&self.handoff),
        )
    }

    /// 使用随机连接标识创建分析器
    pub fn instantiate_random(&self) -> XmppAnalyzer {
        self.instantiate(ConnectionId::new())
    }

    /// 获取配置
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }
}
