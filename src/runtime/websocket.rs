//! WebSocket channel to the backend
//!
//! [`WsConnector::open`] spawns one task per connect attempt. The task
//! performs the handshake, posts [`SessionEvent::Opened`] with a
//! [`WsChannel`] write handle, forwards every inbound text frame as
//! [`SessionEvent::Frame`], and finally posts [`SessionEvent::Closed`] when
//! the socket ends. Closing the channel from the client side cancels the
//! task without posting a close event.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{ObdWatchError, Result};
use crate::runtime::SessionEvent;
use crate::session::channel::{Channel, ChannelId, CloseCause, Connector};

/// Opens WebSocket channels to a fixed URL
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl WsConnector {
    /// Create a connector for `url`, posting channel events to `events_tx`
    pub fn new(url: Url, events_tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { url, events_tx }
    }
}

impl Connector for WsConnector {
    fn open(&mut self, id: ChannelId) -> Result<()> {
        if self.events_tx.is_closed() {
            return Err(ObdWatchError::Transport("session event queue closed".to_string()).into());
        }
        tokio::spawn(run_channel(self.url.clone(), id, self.events_tx.clone()));
        Ok(())
    }
}

/// Write handle for an open WebSocket
#[derive(Debug)]
pub struct WsChannel {
    outbound_tx: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
}

impl Channel for WsChannel {
    fn send_text(&mut self, frame: String) -> Result<()> {
        self.outbound_tx
            .send(Message::Text(frame))
            .map_err(|_| ObdWatchError::Transport("WebSocket writer has stopped".to_string()).into())
    }

    fn close(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_channel(url: Url, id: ChannelId, events_tx: mpsc::UnboundedSender<SessionEvent>) {
    tracing::debug!("Connecting channel {} to {}", id, url);
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let _ = events_tx.send(SessionEvent::Closed {
                id,
                cause: CloseCause::ConnectFailed(e.to_string()),
            });
            return;
        }
    };

    let (mut sink, mut source) = stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let cancel = CancellationToken::new();

    let channel = WsChannel {
        outbound_tx,
        cancel: cancel.clone(),
    };
    if events_tx
        .send(SessionEvent::Opened {
            id,
            channel: Box::new(channel),
        })
        .is_err()
    {
        return;
    }

    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                message = outbound_rx.recv() => match message {
                    Some(message) => {
                        if let Err(e) = sink.send(message).await {
                            tracing::warn!("WebSocket write failed on channel {}: {}", id, e);
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    let cause = loop {
        tokio::select! {
            _ = cancel.cancelled() => break None,
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if events_tx.send(SessionEvent::Frame { id, payload: text }).is_err() {
                        break None;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        if events_tx.send(SessionEvent::Frame { id, payload: text }).is_err() {
                            break None;
                        }
                    }
                    Err(_) => tracing::debug!("Dropping non-UTF-8 binary frame on channel {}", id),
                },
                Some(Ok(Message::Close(_))) | None => break Some(CloseCause::ClosedByPeer),
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(CloseCause::Error(e.to_string())),
            },
        }
    };

    cancel.cancel();
    let _ = writer.await;

    if let Some(cause) = cause {
        let _ = events_tx.send(SessionEvent::Closed { id, cause });
    }
}
