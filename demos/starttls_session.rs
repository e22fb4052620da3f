//! StartTLS会话回放示例
//!
//! 把一段抓包得到的XMPP会话按小块交给分析器，观察里程碑和TLS交接偏移。

use std::sync::Arc;
use xmpp_starttls::plugin::{self, COMPONENT_NAME};
use xmpp_starttls::upgrade::looks_like_tls;
use xmpp_starttls::utils::logger::{init_logger, dev_config};
use xmpp_starttls::{
    AnalyzerBuilder, AnalyzerRegistry, ConnectionId, Direction, JsonLinesSink, RecordingHandoff,
};

const CLIENT: &[&[u8]] = &[
    b"<?xml version='1.0'?><stream:stream xmlns='jabber:client' ",
    b"xmlns:stream='http://etherx.jabber.org/streams' to='example.com' version='1.0'>",
    b"<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>",
    &[0x16, 0x03, 0x01, 0x00, 0x06, 0x01, 0x00, 0x00, 0x02, 0x03, 0x03],
];

const SERVER: &[&[u8]] = &[
    b"<?xml version='1.0'?><stream:stream xmlns='jabber:client' xmlns:stream=",
    b"'http://etherx.jabber.org/streams' id='c2s-4f1a' from='example.com' version='1.0'>",
    b"<stream:features><starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'><required/></starttls>",
    b"</stream:features>",
    b"<proceed xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>",
    &[0x16, 0x03, 0x03, 0x00, 0x06, 0x02, 0x00, 0x00, 0x02, 0x03, 0x03],
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger(dev_config())?;

    let handoff = Arc::new(RecordingHandoff::new());
    let factory = AnalyzerBuilder::new()
        .with_sink(Arc::new(JsonLinesSink::new(std::io::stdout())))
        .with_tls_handoff(handoff.clone())
        .build()?;

    let mut registry = AnalyzerRegistry::new();
    let configuration = plugin::configure(&mut registry, factory)?;
    println!("registered {} ({})", configuration.name, configuration.description);

    let id = ConnectionId::new();
    let mut analyzer = registry.instantiate(COMPONENT_NAME, id)?;
    analyzer.on_connection_start();

    // 两个方向交替投递
    for i in 0..CLIENT.len().max(SERVER.len()) {
        if let Some(chunk) = CLIENT.get(i) {
            analyzer.on_chunk(Direction::ClientToServer, chunk);
        }
        if let Some(chunk) = SERVER.get(i) {
            analyzer.on_chunk(Direction::ServerToClient, chunk);
        }
    }
    analyzer.on_connection_end();

    println!("phase: {}", analyzer.phase());
    if let Some(offset) = handoff.offset_for(id) {
        let server: Vec<u8> = SERVER.concat();
        let tls = server
            .get(offset as usize..)
            .map(looks_like_tls)
            .unwrap_or(false);
        println!("tls starts at server offset {} (record header: {})", offset, tls);
    }
    println!("stats: {:?}", analyzer.stats());

    Ok(())
}
