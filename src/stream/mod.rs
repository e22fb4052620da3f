//! 流处理模块
//!
//! 提供分块重组、逐连接分析器，以及里程碑事件的输出接口。

use crate::core::protocol::MilestoneEvent;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

pub mod analyzer;
pub mod buffer;

// 重导出主要类型
pub use crate::core::protocol::Direction;
pub use analyzer::{AnalyzerConfig, AnalyzerStats, XmppAnalyzer};
pub use buffer::{BufferConfig, ChunkReassembler, FeedOutcome};

/// 里程碑事件接收端
///
/// 由宿主框架提供，多个连接的分析器可以共享同一个接收端。
pub trait MilestoneSink: Send + Sync + std::fmt::Debug {
    /// 记录一个里程碑
    fn record(&self, event: &MilestoneEvent);
}

/// 通过 `tracing` 输出里程碑
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MilestoneSink for TracingSink {
    fn record(&self, event: &MilestoneEvent) {
        info!(
            connection = %event.connection_id,
            direction = %event.direction,
            offset = event.offset,
            kind = %event.kind,
            "xmpp milestone"
        );
    }
}

/// 每个里程碑写一行JSON
#[derive(Debug)]
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// 创建新的JSON行输出
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// 取回底层写入器
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send + std::fmt::Debug> MilestoneSink for JsonLinesSink<W> {
    fn record(&self, event: &MilestoneEvent) {
        // 其他线程写到一半崩溃不影响后续记录
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let written = serde_json::to_writer(&mut *writer, event)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"));
        if let Err(e) = written {
            warn!(connection = %event.connection_id, error = %e, "failed to write milestone");
        }
    }
}

/// 在内存中收集里程碑
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MilestoneEvent>>,
}

impl RecordingSink {
    /// 创建新的收集器
    pub fn new() -> Self {
        Self::default()
    }

    /// 已收集的事件
    pub fn events(&self) -> Vec<MilestoneEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// 已收集的事件数量
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MilestoneSink for RecordingSink {
    fn record(&self, event: &MilestoneEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
