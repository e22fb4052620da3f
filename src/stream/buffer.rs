//! 分块重组模块
//!
//! 按方向缓存尚未被扫描器完全解释的字节。每个方向只分析前
//! `max_prefix_window` 个字节，超出窗口的数据不会进入缓冲区，
//! 因此无论对端发送什么，内存占用都有上界。

use crate::core::protocol::Direction;
use crate::error::{AnalyzerError, Result};
use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};

/// 默认前缀窗口（字节）
pub const DEFAULT_MAX_PREFIX_WINDOW: usize = 8 * 1024;

/// 前缀窗口允许的上限（字节）
pub const MAX_PREFIX_WINDOW_LIMIT: usize = 1024 * 1024;

/// 缓冲区配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// 每个方向分析的最大前缀长度
    pub max_prefix_window: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_prefix_window: DEFAULT_MAX_PREFIX_WINDOW,
        }
    }
}

impl BufferConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.max_prefix_window == 0 {
            return Err(AnalyzerError::config_error(
                "max_prefix_window must be greater than zero",
            ));
        }
        if self.max_prefix_window > MAX_PREFIX_WINDOW_LIMIT {
            return Err(AnalyzerError::config_error(format!(
                "max_prefix_window {} exceeds limit {}",
                self.max_prefix_window, MAX_PREFIX_WINDOW_LIMIT
            )));
        }
        Ok(())
    }
}

/// 追加数据的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// 全部接收
    Accepted,
    /// 只接收了窗口内的部分
    Overflow {
        /// 被丢弃的字节数
        dropped: usize,
    },
}

impl FeedOutcome {
    /// 是否发生溢出
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::Overflow { .. })
    }
}

/// 缓冲区统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// 总接收字节数
    pub total_bytes_received: usize,
    /// 进入缓冲区的字节数
    pub accepted_bytes: usize,
    /// 被扫描器消费的字节数
    pub consumed_bytes: usize,
    /// 超出窗口或被主动丢弃的字节数
    pub dropped_bytes: usize,
    /// 最大缓冲字节数
    pub max_buffered_bytes: usize,
}

/// 单方向缓冲区
#[derive(Debug, Default)]
struct DirectionBuffer {
    data: BytesMut,
    /// 已离开缓冲区（或从未进入）的字节数，即下一个待分析字节的流内偏移
    position: u64,
    /// 已进入窗口的字节总数
    window_used: usize,
    overflowed: bool,
    stats: BufferStats,
}

/// 分块重组器
#[derive(Debug)]
pub struct ChunkReassembler {
    config: BufferConfig,
    buffers: [DirectionBuffer; 2],
}

impl ChunkReassembler {
    /// 创建新的重组器
    pub fn new(config: BufferConfig) -> Self {
        Self {
            config,
            buffers: [DirectionBuffer::default(), DirectionBuffer::default()],
        }
    }

    /// 追加数据
    ///
    /// 只接收窗口剩余容量内的字节；其余字节丢弃并返回 [`FeedOutcome::Overflow`]。
    pub fn feed(&mut self, direction: Direction, data: &[u8]) -> FeedOutcome {
        let window = self.config.max_prefix_window;
        let buf = &mut self.buffers[direction.index()];
        buf.stats.total_bytes_received += data.len();

        let room = window.saturating_sub(buf.window_used);
        let take = room.min(data.len());
        buf.data.extend_from_slice(&data[..take]);
        buf.window_used += take;
        buf.stats.accepted_bytes += take;
        buf.stats.max_buffered_bytes = buf.stats.max_buffered_bytes.max(buf.data.len());

        let dropped = data.len() - take;
        if dropped > 0 {
            buf.overflowed = true;
            buf.stats.dropped_bytes += dropped;
            return FeedOutcome::Overflow { dropped };
        }
        FeedOutcome::Accepted
    }

    /// 当前方向所有未消费的字节
    pub fn view(&self, direction: Direction) -> &[u8] {
        &self.buffers[direction.index()].data
    }

    /// 扫描器确认解释完毕后丢弃前 `n` 个字节
    pub fn consume(&mut self, direction: Direction, n: usize) {
        let buf = &mut self.buffers[direction.index()];
        let n = n.min(buf.data.len());
        buf.data.advance(n);
        buf.position += n as u64;
        buf.stats.consumed_bytes += n;
    }

    /// 丢弃该方向全部缓冲数据，偏移照常前进
    pub fn discard(&mut self, direction: Direction) {
        let buf = &mut self.buffers[direction.index()];
        let n = buf.data.len();
        buf.data.clear();
        buf.position += n as u64;
        buf.stats.dropped_bytes += n;
    }

    /// 记录不再分析的字节，只推进偏移
    pub fn skip(&mut self, direction: Direction, n: usize) {
        let buf = &mut self.buffers[direction.index()];
        buf.position += n as u64;
        buf.stats.total_bytes_received += n;
    }

    /// 下一个未消费字节在该方向流内的偏移
    pub fn offset(&self, direction: Direction) -> u64 {
        self.buffers[direction.index()].position
    }

    /// 当前缓冲字节数
    pub fn buffered(&self, direction: Direction) -> usize {
        self.buffers[direction.index()].data.len()
    }

    /// 该方向是否已有数据落在窗口之外
    pub fn overflowed(&self, direction: Direction) -> bool {
        self.buffers[direction.index()].overflowed
    }

    /// 获取统计信息
    pub fn stats(&self, direction: Direction) -> &BufferStats {
        &self.buffers[direction.index()].stats
    }

    /// 获取配置
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// 释放两个方向的缓冲内存，可重复调用
    pub fn release(&mut self) {
        for buf in &mut self.buffers {
            buf.data = BytesMut::new();
        }
    }
}

impl Default for ChunkReassembler {
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}
