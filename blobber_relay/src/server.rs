//! TCP listener: `/ws` upgrades to a relay connection, `/health` answers a
//! plain liveness probe, anything else is a 404.

use crate::config::ConnectionSettings;
use crate::connection::serve_connection;
use crate::error::RelayError;
use crate::hub::HubHandle;
use blobber_env::EnvError;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_async_with_config;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, error, info};

const HEALTH_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK";
const NOT_FOUND_RESPONSE: &[u8] =
    b"HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 9\r\nConnection: close\r\n\r\nNot Found";

/// Request head bytes inspected before routing. Matches the handshake's
/// own header size limit.
const PEEK_BYTES: usize = 8 * 1024;
const PEEK_RETRY: Duration = Duration::from_millis(20);

/// Where a request goes, decided from its request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    WebSocket,
    Health,
    NotFound,
}

/// Classifies a raw request line such as `GET /ws HTTP/1.1`.
pub fn classify(request_line: &[u8]) -> Route {
    let line = String::from_utf8_lossy(request_line);
    let mut parts = line.split_whitespace();
    let (Some(_method), Some(target)) = (parts.next(), parts.next()) else {
        return Route::NotFound;
    };
    let path = target.split('?').next().unwrap_or(target);
    match path {
        "/ws" => Route::WebSocket,
        "/health" => Route::Health,
        _ => Route::NotFound,
    }
}

/// The request line up to the end of its target, once that much has arrived.
fn routable_prefix(head: &[u8]) -> Option<&[u8]> {
    let start = head.iter().position(|b| *b == b' ')? + 1;
    let len = head[start..].iter().position(|b| b.is_ascii_whitespace())?;
    Some(&head[..start + len])
}

/// Accepts connections until the listener fails.
pub async fn serve(
    listener: TcpListener,
    hub: HubHandle,
    settings: ConnectionSettings,
) -> Result<(), RelayError> {
    info!("Listening on {}", listener.local_addr()?);
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Accept failed: {}", e);
                continue;
            }
        };
        let hub = hub.clone();
        let settings = settings.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_stream(stream, hub, settings).await {
                debug!("Connection from {} failed: {}", addr, e);
            }
        });
    }
}

async fn handle_stream(
    mut stream: TcpStream,
    hub: HubHandle,
    settings: ConnectionSettings,
) -> Result<(), RelayError> {
    match peek_route(&stream, settings.pong_wait).await? {
        Route::Health => {
            stream.write_all(HEALTH_RESPONSE).await?;
            stream.shutdown().await?;
        }
        Route::NotFound => {
            stream.write_all(NOT_FOUND_RESPONSE).await?;
            stream.shutdown().await?;
        }
        Route::WebSocket => {
            let mut config = WebSocketConfig::default();
            config.max_message_size = Some(settings.max_message_size);
            config.max_frame_size = Some(settings.max_message_size);
            let ws = accept_async_with_config(stream, Some(config)).await?;
            serve_connection(ws, hub, settings).await;
        }
    }
    Ok(())
}

/// Waits for the request target without consuming it, so the WebSocket
/// handshake still sees the full request. Gives up after `deadline`.
async fn peek_route(stream: &TcpStream, deadline: Duration) -> Result<Route, RelayError> {
    match timeout(deadline, poll_request_line(stream)).await {
        Ok(route) => route,
        Err(_) => Err(EnvError::Timeout(deadline.as_millis() as u64).into()),
    }
}

async fn poll_request_line(stream: &TcpStream) -> Result<Route, RelayError> {
    let mut buf = vec![0u8; PEEK_BYTES];
    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Err(RelayError::BadRequest);
        }
        if let Some(prefix) = routable_prefix(&buf[..n]) {
            return Ok(classify(prefix));
        }
        if let Some(end) = buf[..n].windows(2).position(|w| w == b"\r\n") {
            return Ok(classify(&buf[..end]));
        }
        if n == buf.len() {
            return Err(RelayError::BadRequest);
        }
        // Peek returns at once while any bytes are buffered
        tokio::time::sleep(PEEK_RETRY).await;
    }
}
