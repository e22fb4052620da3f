//! # xmpp_starttls: XMPP StartTLS边界探测
//!
//! 被动观察一条TCP连接两个方向上的明文XMPP流，识别StartTLS协商，
//! 并精确给出服务器方向上TLS开始的字节偏移，以便交给通用TLS分析器。
//!
//! ## 特性
//!
//! - **增量扫描**: 任意分块方式得到相同的里程碑和偏移
//! - **有界内存**: 每个方向只分析固定大小的前缀窗口
//! - **精确交接**: `<proceed/>` 之后的第一个字节就是TLS记录的开始
//! - **显式注册**: 没有全局状态，组件由宿主框架注册
//!
//! ## 快速开始
//!
//! ```rust
//! use std::sync::Arc;
//! use xmpp_starttls::{AnalyzerBuilder, Direction, NegotiationPhase};
//! use xmpp_starttls::stream::RecordingSink;
//! use xmpp_starttls::upgrade::RecordingHandoff;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sink = Arc::new(RecordingSink::new());
//! let handoff = Arc::new(RecordingHandoff::new());
//! let factory = AnalyzerBuilder::new()
//!     .with_sink(sink.clone())
//!     .with_tls_handoff(handoff.clone())
//!     .build()?;
//!
//! let mut analyzer = factory.instantiate_random();
//! analyzer.on_connection_start();
//! analyzer.on_chunk(Direction::ClientToServer, b"<stream:stream to='example.com'>");
//! analyzer.on_chunk(Direction::ServerToClient, b"<stream:stream from='example.com'>");
//! analyzer.on_chunk(
//!     Direction::ClientToServer,
//!     b"<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>",
//! );
//! analyzer.on_chunk(
//!     Direction::ServerToClient,
//!     b"<proceed xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>",
//! );
//! analyzer.on_connection_end();
//!
//! assert_eq!(analyzer.phase(), NegotiationPhase::TlsConfirmed);
//! assert_eq!(sink.len(), 2);
//! assert_eq!(handoff.calls().len(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// 核心模块
pub mod core;
pub mod error;

// 工具模块
pub mod utils;

// 功能模块
pub mod stream;
pub mod upgrade;

// 装配
pub mod builder;
pub mod plugin;

// 重新导出核心类型
pub use crate::core::protocol::{
    AbandonReason, ConnectionId, Direction, MilestoneEvent, MilestoneKind, NegotiationPhase,
};

pub use crate::builder::{AnalyzerBuilder, AnalyzerFactory};
pub use crate::error::{AnalyzerError, Result};
pub use crate::plugin::{AnalyzerComponent, AnalyzerRegistry, PluginConfiguration};
pub use crate::stream::{
    AnalyzerConfig, JsonLinesSink, MilestoneSink, RecordingSink, TracingSink, XmppAnalyzer,
};
pub use crate::upgrade::{NoopHandoff, RecordingHandoff, TlsHandoff};

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 库描述
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
