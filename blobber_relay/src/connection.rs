//! Per-connection read and write pumps.
//!
//! Each socket gets an ephemeral `temp-<uuid>` id, an outbound queue owned
//! by the hub, and two pumps. Whichever pump stops first ends the
//! connection; the hub is then told to forget it.

use crate::config::ConnectionSettings;
use crate::error::RelayError;
use crate::hub::{ConnId, HubEvent, HubHandle};
use blobber_env::protocol::InputMessage;
use blobber_env::{outbound_channel, ClientMessage, EnvError, Outbound, PlayerId};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

/// Runs one upgraded connection to completion.
pub async fn serve_connection<S>(ws: WebSocketStream<S>, hub: HubHandle, settings: ConnectionSettings)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let conn = hub.next_conn_id();
    let player_id = PlayerId::ephemeral();
    let (tx, rx) = outbound_channel(settings.outbound_capacity);
    debug!("Assigned temporary id {} to {}", player_id, conn);

    let register = HubEvent::Register {
        conn,
        player_id: player_id.clone(),
        sink: tx,
    };
    if hub.send(register).await.is_err() {
        return;
    }

    let (sink, stream) = ws.split();
    let result = tokio::select! {
        r = read_pump(stream, &hub, conn, player_id, &settings) => r,
        r = write_pump(sink, rx, conn, &settings) => r,
    };
    match result {
        Ok(()) => debug!("Connection {} closed", conn),
        Err(e) => info!("Connection {} ended: {}", conn, e),
    }

    let _ = hub.send(HubEvent::Unregister { conn }).await;
}

/// Turns a decoded client message into a hub event.
///
/// Inputs and display names always carry the connection's current id,
/// whatever the client wrote. A `clientId` switches that id.
pub fn route(conn: ConnId, current: &mut PlayerId, message: ClientMessage) -> Option<HubEvent> {
    match message {
        ClientMessage::Input(InputMessage { mut input }) => {
            if input.player_id != *current {
                debug!(
                    "Player id mismatch on {}: got {}, expected {}",
                    conn, input.player_id, current
                );
                input.player_id = current.clone();
            }
            Some(HubEvent::Input { conn, input })
        }
        ClientMessage::DisplayName(msg) => {
            if msg.player_id != *current {
                debug!(
                    "Player id mismatch in display name on {}: got {}, expected {}",
                    conn, msg.player_id, current
                );
            }
            Some(HubEvent::DisplayName {
                conn,
                name: msg.display_name,
            })
        }
        ClientMessage::ClientId(msg) => {
            if msg.player_id.as_str().is_empty() {
                warn!("Ignoring empty client id on {}", conn);
                return None;
            }
            *current = msg.player_id.clone();
            Some(HubEvent::ClientId {
                conn,
                player_id: msg.player_id,
            })
        }
    }
}

async fn read_pump<St>(
    mut stream: St,
    hub: &HubHandle,
    conn: ConnId,
    mut player_id: PlayerId,
    settings: &ConnectionSettings,
) -> Result<(), RelayError>
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        // Any inbound frame, pongs included, pushes the deadline out
        let frame = match timeout(settings.pong_wait, stream.next()).await {
            Err(_) => {
                info!("No traffic from {} within {:?}", conn, settings.pong_wait);
                return Ok(());
            }
            Ok(None) => return Ok(()),
            Ok(Some(frame)) => frame?,
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => return Ok(()),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Binary(_) | Message::Frame(_) => {
                debug!("Ignoring non-text frame from {}", conn);
                continue;
            }
        };

        match ClientMessage::decode(&text) {
            Ok(message) => {
                debug!("{} from {}", message.kind(), conn);
                if let Some(event) = route(conn, &mut player_id, message) {
                    hub.send(event).await?;
                }
            }
            Err(e) => warn!("Dropping message from {}: {}", conn, e),
        }
    }
}

async fn write_pump<Si>(
    mut sink: Si,
    mut outbound: mpsc::Receiver<Outbound>,
    conn: ConnId,
    settings: &ConnectionSettings,
) -> Result<(), RelayError>
where
    Si: Sink<Message, Error = WsError> + Unpin,
{
    let mut ping = interval_at(Instant::now() + settings.ping_period, settings.ping_period);
    loop {
        let frame = tokio::select! {
            message = outbound.recv() => match message {
                Some(message) => match message.encode() {
                    Ok(text) => Some(Message::Text(text)),
                    Err(e) => {
                        warn!("Failed to encode {} for {}: {}", message.kind(), conn, e);
                        None
                    }
                },
                None => {
                    debug!("Hub closed the queue of {}", conn);
                    let _ = timeout(settings.write_wait, sink.send(Message::Close(None))).await;
                    return Ok(());
                }
            },
            _ = ping.tick() => Some(Message::Ping(Vec::new())),
        };
        let Some(frame) = frame else {
            continue;
        };

        match timeout(settings.write_wait, sink.send(frame)).await {
            Ok(result) => result?,
            Err(_) => {
                let waited = settings.write_wait.as_millis() as u64;
                return Err(EnvError::Timeout(waited).into());
            }
        }
    }
}
