//! 协议定义模块
//!
//! 定义XMPP StartTLS分析所用的连接标识、方向、协商阶段和里程碑事件。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// XMPP流命名空间
pub const NS_STREAMS: &str = "http://etherx.jabber.org/streams";

/// StartTLS命名空间
pub const NS_TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

/// 连接标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// 生成随机连接标识
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// 获取底层UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConnectionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 流方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// 客户端到服务器（连接发起方）
    ClientToServer,
    /// 服务器到客户端（连接响应方）
    ServerToClient,
}

impl Direction {
    /// 是否为发起方方向
    pub fn is_client(&self) -> bool {
        matches!(self, Self::ClientToServer)
    }

    /// 反方向
    pub fn opposite(&self) -> Self {
        match self {
            Self::ClientToServer => Self::ServerToClient,
            Self::ServerToClient => Self::ClientToServer,
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::ClientToServer => 0,
            Self::ServerToClient => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToServer => write!(f, "client->server"),
            Self::ServerToClient => write!(f, "server->client"),
        }
    }
}

/// 协商阶段
///
/// 单调前进；`TlsConfirmed`、`TlsDeclined`、`Abandoned` 为终止状态，一旦进入不再改变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NegotiationPhase {
    /// 等待流头
    AwaitingStreamHeader,
    /// 流已建立
    StreamEstablished,
    /// 客户端已请求StartTLS
    StartTlsRequested,
    /// 服务器已确认
    TlsConfirmed,
    /// 服务器已拒绝
    TlsDeclined,
    /// 放弃分析
    Abandoned,
}

impl NegotiationPhase {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TlsConfirmed | Self::TlsDeclined | Self::Abandoned)
    }
}

impl fmt::Display for NegotiationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingStreamHeader => "awaiting-stream-header",
            Self::StreamEstablished => "stream-established",
            Self::StartTlsRequested => "starttls-requested",
            Self::TlsConfirmed => "tls-confirmed",
            Self::TlsDeclined => "tls-declined",
            Self::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// 放弃分析的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbandonReason {
    /// 前缀窗口内无法得出结论
    Overflow,
    /// 首个有效内容不是XMPP流头
    NotXmpp,
    /// 无法成为合法标签的标记
    Malformed,
    /// 元素出现在错误的方向上
    DirectionViolation,
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Overflow => "overflow",
            Self::NotXmpp => "not-xmpp",
            Self::Malformed => "malformed",
            Self::DirectionViolation => "direction-violation",
        };
        f.write_str(name)
    }
}

/// 里程碑类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MilestoneKind {
    /// 客户端发出 `<starttls/>`
    StartTlsSeen,
    /// 服务器回复 `<proceed/>`
    TlsConfirmed,
    /// 服务器回复 `<failure/>`
    TlsDeclined,
    /// 放弃分析
    AnalysisAbandoned(AbandonReason),
}

impl MilestoneKind {
    /// 是否为终止里程碑
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::StartTlsSeen)
    }

    /// 该里程碑对应的协商阶段
    pub fn phase(&self) -> NegotiationPhase {
        match self {
            Self::StartTlsSeen => NegotiationPhase::StartTlsRequested,
            Self::TlsConfirmed => NegotiationPhase::TlsConfirmed,
            Self::TlsDeclined => NegotiationPhase::TlsDeclined,
            Self::AnalysisAbandoned(_) => NegotiationPhase::Abandoned,
        }
    }
}

impl fmt::Display for MilestoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartTlsSeen => write!(f, "starttls-seen"),
            Self::TlsConfirmed => write!(f, "tls-confirmed"),
            Self::TlsDeclined => write!(f, "tls-declined"),
            Self::AnalysisAbandoned(reason) => write!(f, "analysis-abandoned({})", reason),
        }
    }
}

/// 里程碑事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneEvent {
    /// 连接标识
    pub connection_id: ConnectionId,
    /// 产生事件的方向
    pub direction: Direction,
    /// 该方向上的字节偏移（事件对应元素之后的第一个字节）
    pub offset: u64,
    /// 事件类型
    pub kind: MilestoneKind,
    /// 观测时间
    pub observed_at: DateTime<Utc>,
}

impl MilestoneEvent {
    /// 创建新的里程碑事件
    pub fn new(
        connection_id: ConnectionId,
        direction: Direction,
        offset: u64,
        kind: MilestoneKind,
    ) -> Self {
        Self {
            connection_id,
            direction,
            offset,
            kind,
            observed_at: Utc::now(),
        }
    }
}
