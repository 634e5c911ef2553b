//! End-to-end: real sockets, the relay hub, and two engine clients.

use blobber_core::{EngineConfig, LockstepClient};
use blobber_env::{PlayerId, TokioContext};
use blobber_relay::{serve, ConnectionSettings, Hub, HubConfig};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_relay() -> SocketAddr {
    let config = HubConfig::new(Duration::from_millis(10), 100_000, 30);
    let (hub, handle) = Hub::new(config, TokioContext::shared());
    tokio::spawn(hub.run());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, handle, ConnectionSettings::default()));
    addr
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

async fn join(addr: SocketAddr, id: &str) -> Socket {
    let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    let hello = format!(r#"{{"type":"clientId","playerId":"{}"}}"#, id);
    ws.send(Message::Text(hello)).await.unwrap();
    ws
}

/// Feeds frames into `client` until it has applied `tick`.
async fn pump_until(ws: &mut Socket, client: &mut LockstepClient, tick: u64) {
    while client.world().current_tick != Some(tick) {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                client.handle_text(&text).unwrap();
            }
            Some(Ok(_)) => {}
            other => panic!("relay connection ended: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_health_and_unknown_paths() {
    let addr = start_relay().await;
    let health = http_get(addr, "/health").await;
    assert!(health.starts_with("HTTP/1.1 200 OK"));
    assert!(health.ends_with("OK"));

    let missing = http_get(addr, "/nope").await;
    assert!(missing.starts_with("HTTP/1.1 404"));
}

#[tokio::test]
async fn test_late_joiner_converges() {
    let run = async {
        let addr = start_relay().await;

        let mut alice_ws = join(addr, "alice").await;
        let mut alice = LockstepClient::new(EngineConfig::default());
        pump_until(&mut alice_ws, &mut alice, 5).await;

        let input = r#"{"type":"input","input":{"playerId":"alice","movement":{"right":true},"placeBomb":true}}"#;
        alice_ws.send(Message::Text(input.to_string())).await.unwrap();
        pump_until(&mut alice_ws, &mut alice, 20).await;

        let mut bob_ws = join(addr, "bob").await;
        let mut bob = LockstepClient::new(EngineConfig::default());

        pump_until(&mut alice_ws, &mut alice, 60).await;
        pump_until(&mut bob_ws, &mut bob, 60).await;

        assert_eq!(alice.player_id().map(|p| p.as_str()), Some("alice"));
        assert_eq!(bob.player_id().map(|p| p.as_str()), Some("bob"));
        assert!(alice.world().players.contains_key(&PlayerId::new("alice")));
        assert_eq!(alice.world(), bob.world());
    };
    tokio::time::timeout(Duration::from_secs(20), run)
        .await
        .expect("session did not converge in time");
}
