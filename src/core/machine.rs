//! StartTLS状态机模块
//!
//! 解释扫描器产出的词法单元，维护连接的协商阶段，并决定何时发出里程碑。
//! 状态机本身不做I/O，也不持有缓冲区；偏移量由调用方负责。

use crate::core::protocol::{AbandonReason, Direction, MilestoneKind, NegotiationPhase};
use crate::core::scanner::Token;

/// 状态机对一个词法单元的裁决
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 消费该单元，继续扫描
    Continue,
    /// 暂不消费该单元，停止扫描此方向，等对端推进后再试
    Defer,
    /// 消费该单元并发出里程碑
    Milestone(MilestoneKind),
}

/// 单方向的协商状态
#[derive(Debug, Clone, Copy, Default)]
struct DirectionState {
    /// 该方向是否已发送流头
    stream_open: bool,
    /// 是否处于 `<stream:features>` 内部（仅服务器方向有意义）
    in_features: bool,
}

/// StartTLS协商状态机
#[derive(Debug, Clone)]
pub struct StartTlsMachine {
    phase: NegotiationPhase,
    directions: [DirectionState; 2],
    starttls_offered: bool,
}

impl Default for StartTlsMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StartTlsMachine {
    /// 创建新的状态机
    pub fn new() -> Self {
        Self {
            phase: NegotiationPhase::AwaitingStreamHeader,
            directions: [DirectionState::default(); 2],
            starttls_offered: false,
        }
    }

    /// 当前协商阶段
    pub fn phase(&self) -> NegotiationPhase {
        self.phase
    }

    /// 服务器是否在features中通告了StartTLS
    pub fn starttls_offered(&self) -> bool {
        self.starttls_offered
    }

    /// 该方向的字节是否仍需要扫描
    ///
    /// 终止后两个方向都不再关心；客户端发出 `<starttls/>` 之后，
    /// 它接下来的字节是TLS ClientHello，也不再扫描。
    pub fn wants_bytes(&self, direction: Direction) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        !(direction.is_client() && self.phase == NegotiationPhase::StartTlsRequested)
    }

    /// 处理一个词法单元
    pub fn on_token(&mut self, direction: Direction, token: Token) -> Verdict {
        if self.phase.is_terminal() {
            return Verdict::Continue;
        }

        match token {
            Token::Incomplete => return Verdict::Continue,
            Token::Malformed => return self.abandon(AbandonReason::Malformed),
            _ => {}
        }

        let state = &mut self.directions[direction.index()];
        if !state.stream_open {
            return match token {
                Token::StreamOpen => {
                    state.stream_open = true;
                    if self.phase == NegotiationPhase::AwaitingStreamHeader {
                        self.phase = NegotiationPhase::StreamEstablished;
                    }
                    Verdict::Continue
                }
                Token::Prolog | Token::Text { blank: true } => Verdict::Continue,
                _ => self.abandon(AbandonReason::NotXmpp),
            };
        }

        match direction {
            Direction::ClientToServer => match token {
                Token::StartTlsRequest if self.phase == NegotiationPhase::StreamEstablished => {
                    self.phase = NegotiationPhase::StartTlsRequested;
                    Verdict::Milestone(MilestoneKind::StartTlsSeen)
                }
                Token::ProceedResponse | Token::FailureResponse => {
                    self.abandon(AbandonReason::DirectionViolation)
                }
                _ => Verdict::Continue,
            },
            Direction::ServerToClient => match token {
                Token::FeaturesOpen => {
                    state.in_features = true;
                    Verdict::Continue
                }
                Token::FeaturesClose => {
                    state.in_features = false;
                    Verdict::Continue
                }
                Token::StartTlsRequest if state.in_features => {
                    self.starttls_offered = true;
                    Verdict::Continue
                }
                Token::StartTlsRequest => self.abandon(AbandonReason::DirectionViolation),
                Token::ProceedResponse => self.resolve(MilestoneKind::TlsConfirmed),
                Token::FailureResponse => self.resolve(MilestoneKind::TlsDeclined),
                _ => Verdict::Continue,
            },
        }
    }

    /// 前缀窗口耗尽仍无结论
    pub fn on_overflow(&mut self) -> Verdict {
        if self.phase.is_terminal() {
            return Verdict::Continue;
        }
        self.abandon(AbandonReason::Overflow)
    }

    /// 服务器应答；客户端请求尚未到达时先挂起
    fn resolve(&mut self, kind: MilestoneKind) -> Verdict {
        if self.phase != NegotiationPhase::StartTlsRequested {
            return Verdict::Defer;
        }
        self.phase = kind.phase();
        Verdict::Milestone(kind)
    }

    fn abandon(&mut self, reason: AbandonReason) -> Verdict {
        self.phase = NegotiationPhase::Abandoned;
        Verdict::Milestone(MilestoneKind::AnalysisAbandoned(reason))
    }
}
