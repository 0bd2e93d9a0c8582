//! WebSocket client transport using `tokio-tungstenite`.
//!
//! The transport owns a current-thread Tokio runtime and drives it only from
//! inside its own methods with `block_on`: nothing is spawned and no thread is
//! started, so all I/O happens on the caller's thread during `open`, `send`,
//! `poll`, and `close`.
//!
//! Wire mapping: each datagram is one binary WebSocket message whose first
//! byte is the [`ChannelId`]. WebSocket delivery is totally ordered, which is
//! stronger than the per-channel ordering the [`Transport`] contract asks for.

use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{
    ChannelId, Transport, TransportConfig, TransportError, TransportEvent,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// `ws://` URL for `host:port`, bracketing IPv6 literals.
fn request_url(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("ws://[{host}]:{port}")
    } else {
        format!("ws://{host}:{port}")
    }
}

/// A [`Transport`] that talks to the server over a WebSocket.
pub struct WebSocketTransport {
    config: TransportConfig,
    runtime: Runtime,
    stream: Option<WsStream>,
}

impl WebSocketTransport {
    /// Creates a closed transport with the given timeouts.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(TransportError::Runtime)?;
        Ok(Self {
            config,
            runtime,
            stream: None,
        })
    }

    /// The timeouts this transport was created with.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.close();

        let addr = format!("{host}:{port}");
        let timeout = self.config.connect_timeout();

        let connected = self.runtime.block_on(async {
            tokio::time::timeout(timeout, async {
                // Resolve separately so a bad host name is reported as such
                // rather than as a refused connection.
                let mut resolved =
                    tokio::net::lookup_host((host, port)).await.map_err(|e| {
                        TransportError::ResolveFailed {
                            addr: addr.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                let target =
                    resolved.next().ok_or_else(|| TransportError::ResolveFailed {
                        addr: addr.clone(),
                        reason: "no addresses found".into(),
                    })?;

                let tcp = TcpStream::connect(target).await.map_err(|e| {
                    TransportError::ConnectionRefused {
                        addr: addr.clone(),
                        reason: e.to_string(),
                    }
                })?;
                // The URL keeps the caller's host name so the Host header
                // names the server, not the resolved address.
                let url = request_url(host, port);
                let (ws, _response) =
                    tokio_tungstenite::client_async(url, MaybeTlsStream::Plain(tcp))
                        .await
                        .map_err(|e| TransportError::ConnectionRefused {
                            addr: addr.clone(),
                            reason: e.to_string(),
                        })?;
                Ok::<_, TransportError>(ws)
            })
            .await
        });

        let ws = match connected {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                tracing::warn!(%addr, error = %e, "WebSocket connect failed");
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(%addr, ?timeout, "WebSocket connect timed out");
                return Err(TransportError::ConnectTimeout { addr, timeout });
            }
        };

        tracing::debug!(%addr, "WebSocket transport opened");
        self.stream = Some(ws);
        Ok(())
    }

    fn close(&mut self) {
        let Some(mut ws) = self.stream.take() else {
            return;
        };
        let timeout = self.config.close_timeout();

        let finished = self.runtime.block_on(async {
            tokio::time::timeout(timeout, async {
                if let Err(e) = ws.close(None).await {
                    tracing::debug!(error = %e, "close frame not sent");
                    return;
                }
                // Wait for the peer's close reply; the stream ends after it.
                while let Some(Ok(_)) = ws.next().await {}
            })
            .await
        });

        match finished {
            Ok(()) => tracing::debug!("WebSocket transport closed"),
            Err(_) => tracing::warn!(
                ?timeout,
                "peer did not acknowledge close in time, dropping connection"
            ),
        }
    }

    fn send(&mut self, channel: ChannelId, data: &[u8]) {
        let Some(ws) = self.stream.as_mut() else {
            tracing::warn!(%channel, "send on closed WebSocket transport dropped");
            return;
        };

        let mut datagram = Vec::with_capacity(data.len() + 1);
        datagram.push(channel.into_inner());
        datagram.extend_from_slice(data);

        if let Err(e) = self
            .runtime
            .block_on(ws.send(Message::Binary(datagram.into())))
        {
            // The next poll sees the broken stream and reports it.
            tracing::warn!(%channel, error = %e, "WebSocket send failed");
        }
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        let Some(ws) = self.stream.as_mut() else {
            return events;
        };

        let ended = self.runtime.block_on(async {
            // Yielding once lets the runtime poll its I/O driver, which is
            // what marks the socket readable after time spent outside.
            tokio::task::yield_now().await;
            loop {
                match ws.next().now_or_never() {
                    None => return None,
                    Some(Some(Ok(Message::Binary(data)))) => {
                        if let Some(event) = split_datagram(&data) {
                            events.push(event);
                        }
                    }
                    Some(Some(Ok(Message::Close(frame)))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by peer".into());
                        return Some(reason);
                    }
                    Some(Some(Ok(_))) => continue, // skip text/ping/pong/frame
                    Some(Some(Err(tungstenite::Error::ConnectionClosed)))
                    | Some(None) => return Some("connection closed".into()),
                    Some(Some(Err(e))) => return Some(e.to_string()),
                }
            }
        });

        if let Some(reason) = ended {
            tracing::info!(%reason, "WebSocket connection lost");
            self.stream = None;
            events.push(TransportEvent::Disconnected { reason });
        }
        events
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

/// Splits the channel prefix off a received datagram.
fn split_datagram(data: &[u8]) -> Option<TransportEvent> {
    let Some((&first, rest)) = data.split_first() else {
        tracing::warn!("empty datagram dropped");
        return None;
    };
    let Some(channel) = ChannelId::new(first) else {
        tracing::warn!(channel = first, "datagram on unknown channel dropped");
        return None;
    };
    Some(TransportEvent::Received {
        channel,
        data: rest.to_vec(),
    })
}
