//! 连接分析器集成测试

mod common;

use common::*;
use xmpp_starttls::upgrade::looks_like_tls;
use xmpp_starttls::{AbandonReason, Direction, MilestoneKind, NegotiationPhase};

const C: Direction = Direction::ClientToServer;
const S: Direction = Direction::ServerToClient;

#[test]
fn test_starttls_confirmed() {
    let mut h = Harness::new();
    h.client(&client_transcript()).server(&server_transcript());

    assert_eq!(
        h.milestones(),
        vec![
            (MilestoneKind::StartTlsSeen, C, expected_starttls_offset()),
            (MilestoneKind::TlsConfirmed, S, expected_handoff_offset()),
        ]
    );
    assert_eq!(h.analyzer.phase(), NegotiationPhase::TlsConfirmed);
    assert!(h.analyzer.is_tls_confirmed());
    assert!(h.analyzer.starttls_offered());
}

#[test]
fn test_handoff_offset_points_at_tls_record() {
    let mut h = Harness::new();
    h.client(&client_transcript()).server(&server_transcript());

    let calls = h.handoff.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], (h.analyzer.connection_id(), expected_handoff_offset()));

    let server = server_transcript();
    let offset = h.handoff.offset_for(h.analyzer.connection_id()).unwrap() as usize;
    assert!(looks_like_tls(&server[offset..]));
    assert!(!looks_like_tls(&server[offset - 1..]));
}

#[test]
fn test_one_byte_delivery() {
    let mut h = Harness::new();
    for b in client_transcript() {
        h.client(&[b]);
    }
    for b in server_transcript() {
        h.server(&[b]);
    }

    assert_eq!(
        h.milestones(),
        vec![
            (MilestoneKind::StartTlsSeen, C, expected_starttls_offset()),
            (MilestoneKind::TlsConfirmed, S, expected_handoff_offset()),
        ]
    );
    assert_eq!(h.handoff.calls().len(), 1);
}

#[test]
fn test_failure_path_has_no_handoff() {
    let mut h = Harness::new();
    h.client(&client_transcript());
    h.server(&concat(&[SERVER_STREAM, SERVER_FEATURES, FAILURE, b"</stream:stream>"]));

    let declined_at = (SERVER_STREAM.len() + SERVER_FEATURES.len() + FAILURE.len()) as u64;
    assert_eq!(
        h.milestones(),
        vec![
            (MilestoneKind::StartTlsSeen, C, expected_starttls_offset()),
            (MilestoneKind::TlsDeclined, S, declined_at),
        ]
    );
    assert_eq!(h.analyzer.phase(), NegotiationPhase::TlsDeclined);
    assert!(h.handoff.calls().is_empty());
}

#[test]
fn test_plain_session_without_starttls() {
    let mut h = Harness::new();
    h.client(CLIENT_STREAM);
    h.server(SERVER_STREAM);
    h.server(b"<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/></stream:features>");
    h.client(b"<auth xmlns='urn:ietf:params:xml:ns:xmpp-sasl' mechanism='PLAIN'>AGp1bGlldAByMG0zMG0wbXkw</auth>");
    h.analyzer.on_connection_end();

    assert!(h.sink.is_empty());
    assert_eq!(h.analyzer.phase(), NegotiationPhase::StreamEstablished);
    assert!(!h.analyzer.starttls_offered());
}

#[test]
fn test_overflow_abandons_once() {
    let window = 64;
    let mut h = Harness::with_window(window);

    let mut filler = b"<stream:stream ".to_vec();
    filler.resize(window, b'a');
    h.client(&filler);
    assert!(h.sink.is_empty());
    assert!(h.analyzer.buffered(C) <= window);

    h.client(b"a");
    assert_eq!(
        h.milestones(),
        vec![(MilestoneKind::AnalysisAbandoned(AbandonReason::Overflow), C, 0)]
    );
    assert_eq!(h.analyzer.phase(), NegotiationPhase::Abandoned);
    assert!(h.analyzer.buffered(C) <= window);

    // 放弃之后不再处理任何数据
    h.client(b"'>").client(STARTTLS);
    h.server(&server_transcript());
    assert_eq!(h.sink.len(), 1);
    assert!(h.handoff.calls().is_empty());
}

#[test]
fn test_window_resolved_inside_prefix() {
    let client = client_transcript();
    let window = expected_starttls_offset() as usize;
    let mut h = Harness::with_window(window);

    h.client(&client);
    assert_eq!(h.kinds(), vec![MilestoneKind::StartTlsSeen]);
    assert_eq!(h.analyzer.phase(), NegotiationPhase::StartTlsRequested);
}

#[test]
fn test_proceed_with_tls_bytes_beyond_window() {
    let window = expected_handoff_offset() as usize + 2;
    let mut h = Harness::with_window(window);

    h.client(&client_transcript()).server(&server_transcript());
    assert_eq!(h.analyzer.phase(), NegotiationPhase::TlsConfirmed);
    assert_eq!(h.handoff.calls()[0].1, expected_handoff_offset());
}

#[test]
fn test_connection_end_is_idempotent() {
    let mut h = Harness::new();
    h.client(CLIENT_STREAM);
    h.analyzer.on_connection_end();
    h.analyzer.on_connection_end();
    assert!(h.analyzer.is_closed());
    assert_eq!(h.analyzer.buffered(C), 0);

    h.client(STARTTLS);
    h.analyzer.on_connection_end();
    assert!(h.sink.is_empty());
    assert_eq!(h.analyzer.phase(), NegotiationPhase::StreamEstablished);
}

#[test]
fn test_end_after_terminal() {
    let mut h = Harness::new();
    h.client(&client_transcript()).server(&server_transcript());
    h.analyzer.on_connection_end();
    h.analyzer.on_connection_end();
    assert_eq!(h.sink.len(), 2);
    assert_eq!(h.handoff.calls().len(), 1);
}

#[test]
fn test_client_proceed_is_direction_violation() {
    let mut h = Harness::new();
    h.client(CLIENT_STREAM).client(PROCEED);

    assert_eq!(
        h.milestones(),
        vec![(
            MilestoneKind::AnalysisAbandoned(AbandonReason::DirectionViolation),
            C,
            CLIENT_STREAM.len() as u64
        )]
    );
}

#[test]
fn test_server_starttls_outside_features_is_violation() {
    let mut h = Harness::new();
    h.client(CLIENT_STREAM);
    h.server(SERVER_STREAM).server(STARTTLS);

    assert_eq!(
        h.kinds(),
        vec![MilestoneKind::AnalysisAbandoned(AbandonReason::DirectionViolation)]
    );
}

#[test]
fn test_advertisement_is_not_a_request() {
    let mut h = Harness::new();
    h.client(CLIENT_STREAM);
    h.server(SERVER_STREAM).server(SERVER_FEATURES);

    assert!(h.sink.is_empty());
    assert!(h.analyzer.starttls_offered());
    assert_eq!(h.analyzer.phase(), NegotiationPhase::StreamEstablished);
}

#[test]
fn test_early_proceed_is_deferred() {
    let mut h = Harness::new();
    h.server(&server_transcript());
    assert!(h.sink.is_empty());
    assert_eq!(h.analyzer.stats().deferrals, 1);

    h.client(&client_transcript());
    assert_eq!(
        h.milestones(),
        vec![
            (MilestoneKind::StartTlsSeen, C, expected_starttls_offset()),
            (MilestoneKind::TlsConfirmed, S, expected_handoff_offset()),
        ]
    );
    assert_eq!(h.handoff.calls().len(), 1);
}

#[test]
fn test_sasl_failure_is_ignored() {
    let mut h = Harness::new();
    h.client(&client_transcript());
    h.server(SERVER_STREAM).server(SERVER_FEATURES);
    h.server(b"<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><not-authorized/></failure>");
    assert_eq!(h.kinds(), vec![MilestoneKind::StartTlsSeen]);

    h.server(PROCEED);
    assert_eq!(
        h.kinds(),
        vec![MilestoneKind::StartTlsSeen, MilestoneKind::TlsConfirmed]
    );
}

#[test]
fn test_hidden_starttls_is_skipped() {
    let mut h = Harness::new();
    h.client(CLIENT_STREAM);
    h.client(b"<!-- <starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/> -->");
    h.client(b"<message><body><![CDATA[<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>]]></body></message>");

    assert!(h.sink.is_empty());
    assert_eq!(h.analyzer.phase(), NegotiationPhase::StreamEstablished);
}

#[test]
fn test_non_xmpp_traffic() {
    let mut h = Harness::new();
    h.client(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");

    assert_eq!(
        h.milestones(),
        vec![(MilestoneKind::AnalysisAbandoned(AbandonReason::NotXmpp), C, 0)]
    );
}

#[test]
fn test_malformed_markup() {
    let mut h = Harness::new();
    h.client(CLIENT_STREAM).client(b"<<starttls/>");

    assert_eq!(
        h.milestones(),
        vec![(
            MilestoneKind::AnalysisAbandoned(AbandonReason::Malformed),
            C,
            CLIENT_STREAM.len() as u64
        )]
    );
}

#[test]
fn test_offsets_keep_advancing_after_terminal() {
    let mut h = Harness::new();
    let client = client_transcript();
    let server = server_transcript();
    h.client(&client).server(&server);

    assert_eq!(h.analyzer.offset(C), client.len() as u64);
    assert_eq!(h.analyzer.offset(S), server.len() as u64);

    h.server(SERVER_HELLO).client(CLIENT_HELLO);
    assert_eq!(h.analyzer.offset(S), (server.len() + SERVER_HELLO.len()) as u64);
    assert_eq!(h.analyzer.offset(C), (client.len() + CLIENT_HELLO.len()) as u64);
    assert_eq!(h.analyzer.buffered(S), 0);
}

#[test]
fn test_stats() {
    let mut h = Harness::new();
    h.client(&client_transcript()).server(&server_transcript());

    let stats = h.analyzer.stats();
    assert_eq!(stats.chunks_received, 2);
    assert_eq!(stats.milestones_emitted, 2);
    assert_eq!(stats.deferrals, 0);
    assert!(stats.tokens_scanned > stats.elements_skipped);
    assert!(stats.elements_skipped > 0);
}

#[test]
fn test_default_namespace_features_advertisement() {
    let features = b"<features xmlns='http://etherx.jabber.org/streams'>\
<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/></features>";
    let mut h = Harness::new();
    h.client(CLIENT_STREAM);
    h.server(SERVER_STREAM).server(features);

    assert!(h.sink.is_empty());
    assert!(h.analyzer.starttls_offered());

    h.client(STARTTLS).server(PROCEED);
    assert_eq!(
        h.kinds(),
        vec![MilestoneKind::StartTlsSeen, MilestoneKind::TlsConfirmed]
    );
    assert_eq!(
        h.handoff.calls()[0].1,
        (SERVER_STREAM.len() + features.len() + PROCEED.len()) as u64
    );
}

#[test]
fn test_tls_prefix_declared_on_stream_header() {
    let client_stream = b"<stream:stream xmlns='jabber:client' \
xmlns:stream='http://etherx.jabber.org/streams' \
xmlns:tls='urn:ietf:params:xml:ns:xmpp-tls' to='example.com' version='1.0'>";
    let starttls = b"<tls:starttls/>";
    let mut h = Harness::new();
    h.client(client_stream).client(starttls);

    assert_eq!(
        h.milestones(),
        vec![(
            MilestoneKind::StartTlsSeen,
            C,
            (client_stream.len() + starttls.len()) as u64
        )]
    );
}

#[test]
fn test_trickled_unterminated_tag_stays_linear() {
    let window = 1024 * 1024;
    let chunks = 100_000;
    let mut h = Harness::with_window(window);
    h.client(CLIENT_STREAM).client(b"<a b='");
    for _ in 0..chunks {
        h.client(b">");
    }

    assert!(h.sink.is_empty());
    assert_eq!(h.analyzer.buffered(C), chunks + 6);
    assert!(h.analyzer.stats().bytes_examined < 4 * (CLIENT_STREAM.len() + chunks) as u64);

    h.client(b"'/>").client(STARTTLS);
    assert_eq!(h.kinds(), vec![MilestoneKind::StartTlsSeen]);
}

#[test]
fn test_deferral_counted_once_per_held_response() {
    let mut h = Harness::new();
    h.server(SERVER_STREAM).server(SERVER_FEATURES).server(PROCEED);
    for byte in SERVER_HELLO {
        h.server(std::slice::from_ref(byte));
    }
    assert!(h.sink.is_empty());
    assert_eq!(h.analyzer.stats().deferrals, 1);

    h.client(&client_transcript());
    assert_eq!(
        h.kinds(),
        vec![MilestoneKind::StartTlsSeen, MilestoneKind::TlsConfirmed]
    );
    assert_eq!(h.handoff.calls()[0].1, expected_handoff_offset());
    assert_eq!(h.analyzer.stats().deferrals, 1);
}
