//! Websocket transport: the handshake plus the writer and reader tasks.
//!
//! One connection runs exactly two tasks:
//!
//! - the **writer** drains an `mpsc` queue of [`Outbound`] items into the
//!   socket, so frames leave in the order they were queued.  An
//!   [`Outbound::Close`] (or the queue closing) flushes what is ahead of it
//!   and then sends a close frame.
//! - the **reader** passes every text frame to an [`InboundHandler`] and
//!   reports the end of the stream through [`InboundHandler::on_closed`].
//!
//! Both tasks call `on_closed` if the socket fails under them; the handler is
//! expected to make teardown idempotent.

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::application::bootstrap::ConnectionTarget;
use crate::application::inbound::InboundHandler;
use crate::domain::ClientError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsSink = SplitSink<WsStream, WsMessage>;
pub type WsSource = SplitStream<WsStream>;

pub const HEADER_INTERACTIVE_VERSION: &str = "X-Interactive-Version";
pub const HEADER_PROTOCOL_VERSION: &str = "X-Protocol-Version";
pub const HEADER_SHARECODE: &str = "X-Interactive-Sharecode";

/// One item on the writer's queue.
#[derive(Debug)]
pub enum Outbound {
    Frame(String),
    /// Flush everything queued before this, then close the socket.
    Close,
}

/// Performs the websocket handshake with the session headers attached.
///
/// # Errors
///
/// [`ClientError::Transport`] for a bad URL, a header value that cannot be
/// sent, or a failed handshake.
pub async fn open(target: &ConnectionTarget, protocol_version: &str) -> Result<WsStream, ClientError> {
    let mut request = target
        .endpoint
        .as_str()
        .into_client_request()
        .map_err(|e| ClientError::Transport(format!("invalid endpoint: {e}")))?;

    let headers = request.headers_mut();
    headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", target.token))?);
    headers.insert(
        HEADER_INTERACTIVE_VERSION,
        header_value(&target.version_id.to_string())?,
    );
    headers.insert(HEADER_PROTOCOL_VERSION, header_value(protocol_version)?);
    if let Some(sharecode) = &target.sharecode {
        headers.insert(HEADER_SHARECODE, header_value(sharecode)?);
    }

    let (stream, response) = connect_async(request)
        .await
        .map_err(|e| ClientError::Transport(format!("websocket handshake failed: {e}")))?;
    info!(endpoint = %target.endpoint, status = %response.status(), "websocket open");
    Ok(stream)
}

fn header_value(value: &str) -> Result<HeaderValue, ClientError> {
    // Never echo the value: it may carry a credential.
    HeaderValue::from_str(value)
        .map_err(|_| ClientError::Transport("header value contains invalid characters".into()))
}

/// Spawns the writer task.
pub fn spawn_writer<H: InboundHandler>(
    mut sink: WsSink,
    mut queue: mpsc::Receiver<Outbound>,
    handler: Arc<H>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = queue.recv().await {
            match item {
                Outbound::Frame(text) => {
                    debug!(bytes = text.len(), "frame out");
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        error!("websocket send failed: {e}");
                        handler.on_closed(&format!("send failed: {e}"));
                        return;
                    }
                }
                Outbound::Close => break,
            }
        }
        // `close` sends the close frame and flushes.
        if let Err(e) = sink.close().await {
            debug!("websocket close: {e}");
        }
        debug!("writer finished");
    })
}

/// Spawns the reader task.
pub fn spawn_reader<H: InboundHandler>(mut source: WsSource, handler: Arc<H>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reason = loop {
            match source.next().await {
                Some(Ok(WsMessage::Text(text))) => handler.on_text(&text),
                Some(Ok(WsMessage::Binary(data))) => {
                    warn!(bytes = data.len(), "unexpected binary frame (ignored)");
                }
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Ok(WsMessage::Close(frame))) => {
                    break match frame {
                        Some(frame) => format!("closed by server ({}): {}", frame.code, frame.reason),
                        None => "closed by server".to_string(),
                    };
                }
                Some(Err(e)) => break format!("read failed: {e}"),
                None => break "stream ended".to_string(),
            }
        };
        debug!(%reason, "reader finished");
        handler.on_closed(&reason);
    })
}
