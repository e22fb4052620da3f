//! 测试用的XMPP会话片段

#![allow(dead_code)]

use std::sync::Arc;
use xmpp_starttls::stream::RecordingSink;
use xmpp_starttls::upgrade::RecordingHandoff;
use xmpp_starttls::{
    AnalyzerConfig, ConnectionId, Direction, MilestoneKind, XmppAnalyzer,
};

pub const CLIENT_STREAM: &[u8] = b"<?xml version='1.0'?>\
<stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams' \
to='example.com' version='1.0'>";

pub const SERVER_STREAM: &[u8] = b"<?xml version='1.0'?>\
<stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams' \
id='c2s-4f1a' from='example.com' version='1.0'>";

pub const SERVER_FEATURES: &[u8] = b"<stream:features>\
<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'><required/></starttls>\
<mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><mechanism>PLAIN</mechanism></mechanisms>\
</stream:features>";

pub const STARTTLS: &[u8] = b"<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>";
pub const PROCEED: &[u8] = b"<proceed xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>";
pub const FAILURE: &[u8] = b"<failure xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>";

/// TLS ClientHello 记录的开头
pub const CLIENT_HELLO: &[u8] = &[0x16, 0x03, 0x01, 0x00, 0x06, 0x01, 0x00, 0x00, 0x02, 0x03, 0x03];

/// TLS ServerHello 记录的开头
pub const SERVER_HELLO: &[u8] = &[0x16, 0x03, 0x03, 0x00, 0x06, 0x02, 0x00, 0x00, 0x02, 0x03, 0x03];

pub fn concat(parts: &[&[u8]]) -> Vec<u8> {
    parts.iter().flat_map(|p| p.iter().copied()).collect()
}

/// 完整的客户端字节流：流头、StartTLS请求、ClientHello
pub fn client_transcript() -> Vec<u8> {
    concat(&[CLIENT_STREAM, b"\n", STARTTLS, CLIENT_HELLO])
}

/// 完整的服务器字节流：流头、features、proceed、ServerHello
pub fn server_transcript() -> Vec<u8> {
    concat(&[SERVER_STREAM, SERVER_FEATURES, PROCEED, SERVER_HELLO])
}

/// 客户端StartTlsSeen的期望偏移
pub fn expected_starttls_offset() -> u64 {
    (CLIENT_STREAM.len() + 1 + STARTTLS.len()) as u64
}

/// 服务器TlsConfirmed的期望偏移
pub fn expected_handoff_offset() -> u64 {
    (SERVER_STREAM.len() + SERVER_FEATURES.len() + PROCEED.len()) as u64
}

pub struct Harness {
    pub analyzer: XmppAnalyzer,
    pub sink: Arc<RecordingSink>,
    pub handoff: Arc<RecordingHandoff>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AnalyzerConfig::default())
    }

    pub fn with_window(window: usize) -> Self {
        Self::with_config(AnalyzerConfig::with_max_prefix_window(window))
    }

    pub fn with_config(config: AnalyzerConfig) -> Self {
        let sink = Arc::new(RecordingSink::new());
        let handoff = Arc::new(RecordingHandoff::new());
        let mut analyzer = XmppAnalyzer::new(ConnectionId::new(), config, sink.clone(), handoff.clone());
        analyzer.on_connection_start();
        Self {
            analyzer,
            sink,
            handoff,
        }
    }

    pub fn client(&mut self, data: &[u8]) -> &mut Self {
        self.analyzer.on_chunk(Direction::ClientToServer, data);
        self
    }

    pub fn server(&mut self, data: &[u8]) -> &mut Self {
        self.analyzer.on_chunk(Direction::ServerToClient, data);
        self
    }

    /// 已发出的里程碑 (类型, 方向, 偏移)
    pub fn milestones(&self) -> Vec<(MilestoneKind, Direction, u64)> {
        self.sink
            .events()
            .into_iter()
            .map(|e| (e.kind, e.direction, e.offset))
            .collect()
    }

    pub fn kinds(&self) -> Vec<MilestoneKind> {
        self.sink.events().into_iter().map(|e| e.kind).collect()
    }
}
