//! WebSocket Transport
//!
//! [`FeedConnector`] adapter over `tokio-tungstenite` with rustls. Control
//! frames are folded into [`FeedFrame::Heartbeat`]; pings from the server are
//! answered by tungstenite itself on the next read or flush.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{FeedConnection, FeedConnector, FeedFrame, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections to the feed.
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a new connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FeedConnector for WebSocketConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FeedConnection>, TransportError> {
        let (stream, response) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        tracing::debug!(
            endpoint,
            status = %response.status(),
            "WebSocket handshake complete"
        );

        Ok(Box::new(WebSocketConnection { stream }))
    }
}

/// One open WebSocket connection.
pub struct WebSocketConnection {
    stream: WsStream,
}

#[async_trait]
impl FeedConnection for WebSocketConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.stream
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_frame(&mut self) -> Result<Option<FeedFrame>, TransportError> {
        loop {
            let Some(message) = self.stream.next().await else {
                return Ok(None);
            };

            match message.map_err(|e| TransportError::Receive(e.to_string()))? {
                Message::Text(text) => return Ok(Some(FeedFrame::Text(text.as_str().to_owned()))),
                Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(Some(FeedFrame::Text(text))),
                    Err(_) => {
                        tracing::warn!(len = data.len(), "Ignoring non-UTF-8 binary frame");
                    }
                },
                Message::Ping(_) | Message::Pong(_) => return Ok(Some(FeedFrame::Heartbeat)),
                Message::Close(frame) => {
                    if let Some(frame) = frame {
                        tracing::info!(
                            code = u16::from(frame.code),
                            reason = frame.reason.as_str(),
                            "Server sent close frame"
                        );
                    } else {
                        tracing::info!("Server sent close frame");
                    }
                    return Ok(None);
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}
