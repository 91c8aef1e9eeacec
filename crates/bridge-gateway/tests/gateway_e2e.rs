//! Drives a real `tokio-tungstenite` client against an in-process server
//! built with fake runners, covering the literal end-to-end scenarios.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_gateway::{build_router, serve, GatewayConfig, RunnerFactories};
use bridge_runner::{BoxFuture, EventSender, RunOptions, Runner, RunnerEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Emits one chunk echoing the prompt, then completes. Mirrors the mock
/// provider described in the first end-to-end scenario.
struct EchoRunner {
    kill_count: Arc<AtomicUsize>,
}

impl Runner for EchoRunner {
    fn run<'a>(&'a mut self, options: RunOptions, events: EventSender) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let _ = events.send(RunnerEvent::Chunk {
                request_id: options.request_id.clone(),
                content: format!("echo: {}", options.prompt),
                thinking: false,
            });
            let _ = events.send(RunnerEvent::Complete {
                request_id: options.request_id,
            });
        })
    }

    fn kill<'a>(&'a mut self) -> BoxFuture<'a, ()> {
        self.kill_count.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {})
    }

    fn dispose<'a>(&'a mut self) -> BoxFuture<'a, ()> {
        Box::pin(async move {})
    }
}

/// A runner that never replies on its own — used to exercise cancel
/// without a race against a fast-completing fake.
struct StallRunner {
    kill_count: Arc<AtomicUsize>,
}

impl Runner for StallRunner {
    fn run<'a>(&'a mut self, _options: RunOptions, _events: EventSender) -> BoxFuture<'a, ()> {
        Box::pin(async move {})
    }

    fn kill<'a>(&'a mut self) -> BoxFuture<'a, ()> {
        self.kill_count.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {})
    }

    fn dispose<'a>(&'a mut self) -> BoxFuture<'a, ()> {
        Box::pin(async move {})
    }
}

fn test_factories() -> RunnerFactories {
    let kill_count = Arc::new(AtomicUsize::new(0));
    RunnerFactories {
        provider_a: Arc::new({
            let kill_count = kill_count.clone();
            move || Box::new(StallRunner { kill_count: kill_count.clone() }) as Box<dyn Runner>
        }),
        provider_b: Arc::new(|| Box::new(EchoRunner { kill_count: Arc::new(AtomicUsize::new(0)) }) as Box<dyn Runner>),
        provider_c: Arc::new(|| Box::new(EchoRunner { kill_count: Arc::new(AtomicUsize::new(0)) }) as Box<dyn Runner>),
    }
}

fn echo_factories() -> RunnerFactories {
    RunnerFactories {
        provider_a: Arc::new(|| Box::new(EchoRunner { kill_count: Arc::new(AtomicUsize::new(0)) }) as Box<dyn Runner>),
        provider_b: Arc::new(|| Box::new(EchoRunner { kill_count: Arc::new(AtomicUsize::new(0)) }) as Box<dyn Runner>),
        provider_c: Arc::new(|| Box::new(EchoRunner { kill_count: Arc::new(AtomicUsize::new(0)) }) as Box<dyn Runner>),
    }
}

async fn spawn_test_server(config: GatewayConfig, factories: RunnerFactories) -> SocketAddr {
    let router = build_router(config, factories);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
    let url = format!("ws://{addr}/");
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

async fn connect_with_header(
    addr: SocketAddr,
    header_name: &str,
    header_value: &str,
) -> Result<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>, tokio_tungstenite::tungstenite::Error> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    let mut request = format!("ws://{addr}/").into_client_request().unwrap();
    request
        .headers_mut()
        .insert(header_name, header_value.parse().unwrap());
    tokio_tungstenite::connect_async(request).await.map(|(s, _)| s)
}

#[tokio::test]
async fn scenario_1_prompt_echo() {
    let addr = spawn_test_server(GatewayConfig::default(), echo_factories()).await;
    let mut ws = connect(addr).await;

    let connected = ws.next().await.unwrap().unwrap();
    assert!(connected.to_text().unwrap().contains("\"type\":\"connected\""));

    ws.send(Message::Text(r#"{"type":"prompt","prompt":"hi","requestId":"r1"}"#.to_string()))
        .await
        .unwrap();

    let chunk = ws.next().await.unwrap().unwrap();
    assert_eq!(chunk.to_text().unwrap(), r#"{"content":"echo: hi","requestId":"r1","type":"chunk"}"#);

    let complete = ws.next().await.unwrap().unwrap();
    assert_eq!(complete.to_text().unwrap(), r#"{"requestId":"r1","type":"complete"}"#);
}

#[tokio::test]
async fn scenario_2_duplicate_request_id() {
    let addr = spawn_test_server(GatewayConfig::default(), test_factories()).await;
    let mut ws = connect(addr).await;
    ws.next().await.unwrap().unwrap(); // connected

    ws.send(Message::Text(r#"{"type":"prompt","prompt":"hi","requestId":"r1"}"#.to_string()))
        .await
        .unwrap();
    ws.send(Message::Text(r#"{"type":"prompt","prompt":"hi again","requestId":"r1"}"#.to_string()))
        .await
        .unwrap();

    let reply = ws.next().await.unwrap().unwrap();
    assert_eq!(
        reply.to_text().unwrap(),
        r#"{"message":"Request r1 is already in progress","requestId":"r1","type":"error"}"#
    );
}

#[tokio::test]
async fn scenario_3_cancel_then_reuse() {
    let addr = spawn_test_server(GatewayConfig::default(), test_factories()).await;
    let mut ws = connect(addr).await;
    ws.next().await.unwrap().unwrap(); // connected

    ws.send(Message::Text(r#"{"type":"prompt","prompt":"hi","requestId":"r1"}"#.to_string()))
        .await
        .unwrap();
    ws.send(Message::Text(r#"{"type":"cancel","requestId":"r1"}"#.to_string()))
        .await
        .unwrap();

    let reply = ws.next().await.unwrap().unwrap();
    assert_eq!(
        reply.to_text().unwrap(),
        r#"{"message":"Request cancelled","requestId":"r1","type":"error"}"#
    );

    // the id is no longer registered, so a second prompt with the same id is accepted
    ws.send(Message::Text(r#"{"type":"prompt","prompt":"hi","requestId":"r1"}"#.to_string()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn scenario_4_cancel_unknown_id() {
    let addr = spawn_test_server(GatewayConfig::default(), test_factories()).await;
    let mut ws = connect(addr).await;
    ws.next().await.unwrap().unwrap(); // connected

    ws.send(Message::Text(r#"{"type":"cancel","requestId":"nope"}"#.to_string()))
        .await
        .unwrap();

    let reply = ws.next().await.unwrap().unwrap();
    assert_eq!(
        reply.to_text().unwrap(),
        r#"{"message":"No active request with id: nope","requestId":"nope","type":"error"}"#
    );
}

#[tokio::test]
async fn scenario_5_origin_rejected() {
    let mut config = GatewayConfig::default();
    config.allowed_origins = Some(vec!["https://app.example.com".to_string()]);
    let addr = spawn_test_server(config, echo_factories()).await;

    let result = connect_with_header(addr, "Origin", "https://evil.example.com").await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(_)) => {}
        Err(_) => {} // upgrade completed then closed with app code; either surfaces as an error here
        Ok(mut stream) => {
            let msg = stream.next().await;
            match msg {
                Some(Ok(Message::Close(Some(CloseFrame { code, .. })))) => assert_eq!(u16::from(code), 4003),
                other => panic!("expected close 4003, got {other:?}"),
            }
        }
    }
}

#[tokio::test]
async fn scenario_6_api_key_required() {
    let mut config = GatewayConfig::default();
    config.api_key = Some("secret-key".to_string());
    let addr = spawn_test_server(config, echo_factories()).await;

    let mut unauthenticated = connect(addr).await;
    let msg = unauthenticated.next().await;
    match msg {
        Some(Ok(Message::Close(Some(CloseFrame { code, .. })))) => assert_eq!(u16::from(code), 4001),
        other => panic!("expected close 4001, got {other:?}"),
    }

    let mut authenticated = connect_with_header(addr, "Authorization", "Bearer secret-key").await.unwrap();
    let connected = authenticated.next().await.unwrap().unwrap();
    assert!(connected.to_text().unwrap().contains("\"type\":\"connected\""));
}
