//! TLS交接模块
//!
//! StartTLS确认后，宿主框架通过 [`TlsHandoff`] 把连接剩余部分交给通用TLS分析器。

use crate::core::protocol::ConnectionId;
use std::sync::{Mutex, PoisonError};

pub mod tls;

pub use tls::{looks_like_tls, TlsRecordHeader, TlsRecordType};

/// TLS交接接口
///
/// 每个连接至多调用一次，且只在进入 `TlsConfirmed` 时调用。
pub trait TlsHandoff: Send + Sync + std::fmt::Debug {
    /// 从服务器方向的 `starting_offset` 处开始按TLS解析
    fn handoff_to_tls(&self, connection_id: ConnectionId, starting_offset: u64);
}

/// 不做任何事的交接实现
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandoff;

impl TlsHandoff for NoopHandoff {
    fn handoff_to_tls(&self, _connection_id: ConnectionId, _starting_offset: u64) {}
}

/// 记录所有交接调用
#[derive(Debug, Default)]
pub struct RecordingHandoff {
    calls: Mutex<Vec<(ConnectionId, u64)>>,
}

impl RecordingHandoff {
    /// 创建新的记录器
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录的调用
    pub fn calls(&self) -> Vec<(ConnectionId, u64)> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// 指定连接的交接偏移
    pub fn offset_for(&self, connection_id: ConnectionId) -> Option<u64> {
        self.calls()
            .into_iter()
            .find(|(id, _)| *id == connection_id)
            .map(|(_, offset)| offset)
    }
}

impl TlsHandoff for RecordingHandoff {
    fn handoff_to_tls(&self, connection_id: ConnectionId, starting_offset: u64) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((connection_id, starting_offset));
    }
}
