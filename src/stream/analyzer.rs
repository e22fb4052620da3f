//! 连接分析器模块
//!
//! [`XmppAnalyzer`] 是宿主框架按连接实例化的唯一对外单元：接收原始数据块，
//! 驱动重组器、扫描器和状态机，把里程碑转发给接收端，并在StartTLS确认时
//! 触发TLS交接。

use crate::core::machine::{StartTlsMachine, Verdict};
use crate::core::protocol::{
    ConnectionId, Direction, MilestoneEvent, MilestoneKind, NegotiationPhase,
};
use crate::core::scanner::{Scanner, Token};
use crate::error::Result;
use crate::stream::buffer::{BufferConfig, ChunkReassembler};
use crate::stream::MilestoneSink;
use crate::upgrade::{looks_like_tls, TlsHandoff};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// 分析器配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// 缓冲区配置
    #[serde(flatten)]
    pub buffer: BufferConfig,
}

impl AnalyzerConfig {
    /// 使用指定的前缀窗口创建配置
    pub fn with_max_prefix_window(max_prefix_window: usize) -> Self {
        Self {
            buffer: BufferConfig { max_prefix_window },
        }
    }

    /// 从JSON字符串加载并校验配置
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        self.buffer.validate()
    }

    /// 前缀窗口大小
    pub fn max_prefix_window(&self) -> usize {
        self.buffer.max_prefix_window
    }
}

/// 分析器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzerStats {
    /// 收到的数据块数
    pub chunks_received: usize,
    /// 扫描出的词法单元数
    pub tokens_scanned: usize,
    /// 跳过的无关标记数
    pub elements_skipped: usize,
    /// 服务器应答被挂起的次数
    pub deferrals: usize,
    /// 扫描器累计检查过的字节数
    pub bytes_examined: u64,
    /// 发出的里程碑数
    pub milestones_emitted: usize,
}

/// XMPP StartTLS分析器
#[derive(Debug)]
pub struct XmppAnalyzer {
    connection_id: ConnectionId,
    reassembler: ChunkReassembler,
    machine: StartTlsMachine,
    scanners: [Scanner; 2],
    sink: Arc<dyn MilestoneSink>,
    handoff: Arc<dyn TlsHandoff>,
    /// 各方向是否停在一个挂起的应答上
    deferred: [bool; 2],
    started: bool,
    closed: bool,
    tls_confirmed: bool,
    stats: AnalyzerStats,
}

impl XmppAnalyzer {
    /// 创建新的分析器
    pub fn new(
        connection_id: ConnectionId,
        config: AnalyzerConfig,
        sink: Arc<dyn MilestoneSink>,
        handoff: Arc<dyn TlsHandoff>,
    ) -> Self {
        Self {
            connection_id,
            reassembler: ChunkReassembler::new(config.buffer),
            machine: StartTlsMachine::new(),
            scanners: [Scanner::new(), Scanner::new()],
            sink,
            handoff,
            deferred: [false; 2],
            started: false,
            closed: false,
            tls_confirmed: false,
            stats: AnalyzerStats::default(),
        }
    }

    /// 连接开始
    pub fn on_connection_start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        debug!(
            connection = %self.connection_id,
            window = self.reassembler.config().max_prefix_window,
            "xmpp analyzer started"
        );
    }

    /// 收到一个方向上的数据块
    pub fn on_chunk(&mut self, direction: Direction, data: &[u8]) {
        if self.closed {
            trace!(connection = %self.connection_id, %direction, len = data.len(), "chunk after connection end ignored");
            return;
        }
        self.stats.chunks_received += 1;

        if !self.machine.wants_bytes(direction) {
            self.reassembler.skip(direction, data.len());
            return;
        }

        let outcome = self.reassembler.feed(direction, data);
        if outcome.is_overflow() {
            debug!(
                connection = %self.connection_id,
                %direction,
                buffered = self.reassembler.buffered(direction),
                "prefix window exhausted"
            );
        }
        // 挂起的方向等对端请求到达后再继续
        if self.deferred[direction.index()] {
            return;
        }
        self.drive(direction);
    }

    /// 连接结束，释放缓冲区；可在任意状态下重复调用
    pub fn on_connection_end(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.reassembler.release();
        self.deferred = [false; 2];
        debug!(
            connection = %self.connection_id,
            phase = %self.machine.phase(),
            client_bytes = self.reassembler.offset(Direction::ClientToServer),
            server_bytes = self.reassembler.offset(Direction::ServerToClient),
            "xmpp analyzer finished"
        );
    }

    /// 扫描该方向的缓冲数据，直到需要更多数据、被挂起或进入终止状态
    fn drive(&mut self, direction: Direction) {
        loop {
            if !self.machine.wants_bytes(direction) {
                self.reassembler.discard(direction);
                return;
            }

            let scanner = &mut self.scanners[direction.index()];
            let (token, consumed) = scanner.scan(self.reassembler.view(direction));
            self.stats.bytes_examined = self.scanners.iter().map(Scanner::bytes_examined).sum();
            if token == Token::Incomplete {
                break;
            }
            self.stats.tokens_scanned += 1;
            trace!(connection = %self.connection_id, %direction, ?token, consumed, "token");

            match self.machine.on_token(direction, token) {
                Verdict::Continue => {
                    if !token.is_significant() {
                        self.stats.elements_skipped += 1;
                    }
                    self.reassembler.consume(direction, consumed);
                }
                Verdict::Defer => {
                    if std::mem::replace(&mut self.deferred[direction.index()], true) {
                        return;
                    }
                    self.stats.deferrals += 1;
                    debug!(
                        connection = %self.connection_id,
                        %direction,
                        ?token,
                        "response arrived before request, holding"
                    );
                    return;
                }
                Verdict::Milestone(kind) => {
                    // 放弃时偏移停在出错单元之前，与分段方式无关
                    if !matches!(kind, MilestoneKind::AnalysisAbandoned(_)) {
                        self.reassembler.consume(direction, consumed);
                    }
                    self.emit(direction, kind);
                    if kind == MilestoneKind::StartTlsSeen {
                        self.resume(direction.opposite());
                    }
                }
            }
        }

        if self.reassembler.overflowed(direction) && self.machine.wants_bytes(direction) {
            if let Verdict::Milestone(kind) = self.machine.on_overflow() {
                self.emit(direction, kind);
            }
        }
    }

    /// 重新驱动被挂起的方向
    fn resume(&mut self, direction: Direction) {
        if std::mem::take(&mut self.deferred[direction.index()]) {
            self.drive(direction);
        }
    }

    fn emit(&mut self, direction: Direction, kind: MilestoneKind) {
        let offset = self.reassembler.offset(direction);
        let event = MilestoneEvent::new(self.connection_id, direction, offset, kind);
        debug!(
            connection = %self.connection_id,
            %direction,
            offset,
            %kind,
            "milestone"
        );
        self.sink.record(&event);
        self.stats.milestones_emitted += 1;

        if kind == MilestoneKind::TlsConfirmed {
            self.tls_confirmed = true;
            let trailing = self.reassembler.view(direction);
            if !trailing.is_empty() {
                debug!(
                    connection = %self.connection_id,
                    tls_record = looks_like_tls(trailing),
                    "bytes following proceed"
                );
            }
            self.handoff.handoff_to_tls(self.connection_id, offset);
        }

        if kind.is_terminal() {
            self.reassembler.discard(Direction::ClientToServer);
            self.reassembler.discard(Direction::ServerToClient);
            self.deferred = [false; 2];
        }
    }

    /// 连接标识
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// 当前协商阶段
    pub fn phase(&self) -> NegotiationPhase {
        self.machine.phase()
    }

    /// 该方向已越过的字节数
    pub fn offset(&self, direction: Direction) -> u64 {
        self.reassembler.offset(direction)
    }

    /// 该方向当前缓冲的字节数
    pub fn buffered(&self, direction: Direction) -> usize {
        self.reassembler.buffered(direction)
    }

    /// 服务器是否通告了StartTLS
    pub fn starttls_offered(&self) -> bool {
        self.machine.starttls_offered()
    }

    /// StartTLS是否已确认
    pub fn is_tls_confirmed(&self) -> bool {
        self.tls_confirmed
    }

    /// 是否已收到连接结束
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 获取统计信息
    pub fn stats(&self) -> &AnalyzerStats {
        &self.stats
    }
}
