//! 核心模块
//!
//! 包含协议定义、词法扫描器和StartTLS状态机。

pub mod machine;
pub mod protocol;
pub mod scanner;

pub use machine::{StartTlsMachine, Verdict};
pub use protocol::{
    AbandonReason, ConnectionId, Direction, MilestoneEvent, MilestoneKind, NegotiationPhase,
};
pub use scanner::{scan, Scanner, Token};
