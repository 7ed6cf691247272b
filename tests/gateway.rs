//! Gateway behaviour against real upstreams.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use reload::http::{Gateway, ProxyGateway};

mod common;
use common::{call_log, MockBuilder, MockSupervisor, HELLO};

async fn start_gateway(
    builder: Arc<MockBuilder>,
    supervisor: Arc<MockSupervisor>,
    upstream: std::net::SocketAddr,
) -> ProxyGateway {
    let mut gateway = ProxyGateway::new(builder, supervisor);
    gateway
        .run(&common::gateway_config(upstream))
        .await
        .expect("gateway starts");
    gateway
}

#[tokio::test]
async fn proxies_plain_requests() {
    let (upstream, hits) = common::start_hello_upstream().await;
    let supervisor = Arc::new(MockSupervisor::new(call_log()));
    let gateway = start_gateway(
        Arc::new(MockBuilder::new(call_log())),
        supervisor.clone(),
        upstream,
    )
    .await;
    let addr = gateway.local_addr().unwrap();

    let res = reqwest::get(format!("http://{}/", addr)).await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), HELLO);
    assert!(supervisor.did_run());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn serves_error_page_without_contacting_upstream() {
    let (upstream, hits) = common::start_hello_upstream().await;
    let supervisor = Arc::new(MockSupervisor::new(call_log()));
    let gateway = start_gateway(
        Arc::new(MockBuilder::failed("line1\nline2")),
        supervisor.clone(),
        upstream,
    )
    .await;
    let addr = gateway.local_addr().unwrap();

    let res = reqwest::get(format!("http://{}/anything", addr)).await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["content-type"],
        "text/html; charset=utf-8"
    );
    let body = res.text().await.unwrap();
    assert!(body.contains("line1<br>line2"), "body: {body}");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(!supervisor.did_run());
}

#[tokio::test]
async fn error_page_escapes_markup() {
    let (upstream, _) = common::start_hello_upstream().await;
    let gateway = start_gateway(
        Arc::new(MockBuilder::failed("<script>alert('x')</script>")),
        Arc::new(MockSupervisor::new(call_log())),
        upstream,
    )
    .await;
    let addr = gateway.local_addr().unwrap();

    let body = reqwest::get(format!("http://{}/", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(!body.contains("<script>"));
    assert!(body.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
}

#[tokio::test]
async fn upgrade_header_is_tunnelled_to_the_same_body() {
    let (upstream, hits) = common::start_hello_upstream().await;
    let supervisor = Arc::new(MockSupervisor::new(call_log()));
    let gateway = start_gateway(
        Arc::new(MockBuilder::new(call_log())),
        supervisor.clone(),
        upstream,
    )
    .await;
    let addr = gateway.local_addr().unwrap();

    let res = reqwest::Client::new()
        .get(format!("http://{}/", addr))
        .header("Upgrade", "websocket")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), HELLO);
    assert!(supervisor.did_run());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn relays_websocket_frames_both_ways() {
    let upstream = common::start_echo_upstream().await;
    let gateway = start_gateway(
        Arc::new(MockBuilder::new(call_log())),
        Arc::new(MockSupervisor::new(call_log())),
        upstream,
    )
    .await;
    let addr = gateway.local_addr().unwrap();

    let (mut socket, response) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("websocket handshake through the gateway");
    assert_eq!(response.status(), 101);
    assert_eq!(gateway.tunnels().active_count(), 1);

    for text in ["ping", "pong", "done"] {
        socket.send(Message::text(text)).await.unwrap();
        let echoed = socket.next().await.unwrap().unwrap();
        assert_eq!(echoed.to_text().unwrap(), text);
    }

    socket.close(None).await.unwrap();
    drop(socket);

    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while gateway.tunnels().active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(drained.is_ok(), "tunnel was not torn down");
}

#[tokio::test]
async fn streams_server_sent_events() {
    let upstream = common::start_event_upstream().await;
    let gateway = start_gateway(
        Arc::new(MockBuilder::new(call_log())),
        Arc::new(MockSupervisor::new(call_log())),
        upstream,
    )
    .await;
    let addr = gateway.local_addr().unwrap();

    let res = reqwest::Client::new()
        .get(format!("http://{}/events", addr))
        .header("Accept", "text/event-stream")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "text/event-stream");
    let body = res.text().await.unwrap();
    assert!(body.contains("data: one"));
    assert!(body.contains("data: three"));
}

#[tokio::test]
async fn unreachable_upstream_reports_errors() {
    // Bind then drop to get a port nothing listens on.
    let closed = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let gateway = start_gateway(
        Arc::new(MockBuilder::new(call_log())),
        Arc::new(MockSupervisor::new(call_log())),
        closed,
    )
    .await;
    let addr = gateway.local_addr().unwrap();
    let client = reqwest::Client::new();

    let res = client.get(format!("http://{}/", addr)).send().await.unwrap();
    assert_eq!(res.status(), 502);

    let res = client
        .get(format!("http://{}/", addr))
        .header("Accept", "text/event-stream")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(res.text().await.unwrap(), "Error contacting backend server.");
}

#[tokio::test]
async fn close_releases_the_listener() {
    let (upstream, _) = common::start_hello_upstream().await;
    let mut gateway = start_gateway(
        Arc::new(MockBuilder::new(call_log())),
        Arc::new(MockSupervisor::new(call_log())),
        upstream,
    )
    .await;
    let addr = gateway.local_addr().unwrap();

    gateway.close().await;
    assert!(gateway.local_addr().is_none());

    let rebound = std::net::TcpListener::bind(addr);
    assert!(rebound.is_ok(), "listener still held after close");
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = common::gateway_config(taken.local_addr().unwrap());
    config.port = taken.local_addr().unwrap().port();

    let mut gateway = ProxyGateway::new(
        Arc::new(MockBuilder::new(call_log())),
        Arc::new(MockSupervisor::new(call_log())),
    );
    let err = gateway.run(&config).await.unwrap_err();
    assert!(err.to_string().contains("failed to bind"), "{err}");
}
