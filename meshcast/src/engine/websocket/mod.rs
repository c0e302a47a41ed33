//! Shared connection driving for the websocket transport (spec.md §4.8):
//! built atop the stream transport with a websocket handshake; one binary
//! frame carries one message, no additional framing.

pub mod client;
pub mod server;
pub mod tls;

mod stream;

pub(crate) use stream::ServerStream;

use crate::handler::HandlerSet;
use crate::id::Id;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Drive one upgraded websocket connection until it closes, errors, or the
/// outbound channel closes. Mirrors `engine::stream::drive_connection`, but
/// frames are native websocket binary frames instead of a length prefix.
pub(crate) async fn drive_ws_connection<S>(
    ws: WebSocketStream<S>,
    id: Id,
    handlers: Arc<HandlerSet>,
    mut outbound_rx: mpsc::UnboundedReceiver<Bytes>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    let (mut sink, mut source) = ws.split();

    loop {
        tokio::select! {
            biased;
            outgoing = outbound_rx.recv() => {
                match outgoing {
                    None => break,
                    Some(bytes) => {
                        if sink.send(Message::Binary(bytes)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            incoming = source.next() => {
                match incoming {
                    None => break,
                    Some(Err(_)) => break,
                    Some(Ok(Message::Binary(bytes))) => {
                        handlers.fire_message(&id, &bytes);
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    handlers.fire_disconnect(&id);
}
