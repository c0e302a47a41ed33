//! Length-prefixed framing for the reliable stream transport (spec.md §4.6.1).

pub mod client;
pub mod server;

use crate::handler::HandlerSet;
use crate::id::Id;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

/// Drive one accepted/connected stream socket until EOF, reset, or the
/// outbound channel closes. Reads frame-by-frame per spec.md §4.6.1:
/// accumulate 8 bytes for the little-endian length, then that many payload
/// bytes, dispatch, and continue. Writes serialize `[u64 len][payload]` in
/// submission order, so concurrent publishers never interleave a partial
/// message — the outbound channel is the single writer.
pub(crate) async fn drive_connection<S>(
    stream: S,
    id: Id,
    handlers: Arc<HandlerSet>,
    mut outbound_rx: mpsc::UnboundedReceiver<Bytes>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    let (mut read_half, mut write_half) = tokio::io::split(stream);
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        tokio::select! {
            biased;
            outgoing = outbound_rx.recv() => {
                match outgoing {
                    None => break,
                    Some(bytes) => {
                        let mut framed = Vec::with_capacity(8 + bytes.len());
                        framed.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
                        framed.extend_from_slice(&bytes);
                        if write_half.write_all(&framed).await.is_err() {
                            break;
                        }
                    }
                }
            }
            read_result = read_half.read(&mut chunk) => {
                match read_result {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        buf.extend_from_slice(&chunk[..n]);
                        dispatch_complete_frames(&mut buf, &id, &handlers);
                    }
                }
            }
        }
    }

    handlers.fire_disconnect(&id);
}

fn dispatch_complete_frames(buf: &mut Vec<u8>, id: &Id, handlers: &HandlerSet) {
    loop {
        if buf.len() < 8 {
            return;
        }
        let len = u64::from_le_bytes(buf[0..8].try_into().unwrap()) as usize;
        if buf.len() < 8 + len {
            return;
        }
        handlers.fire_message(id, &buf[8..8 + len]);
        buf.drain(0..8 + len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn dispatch_handles_back_to_back_frames_across_reads() {
        let handlers = HandlerSet::default();
        let received = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
        let r = received.clone();
        handlers.push_message(Box::new(move |_id, bytes| r.lock().unwrap().push(bytes.to_vec())));

        let id = Id::new("peer");
        let mut buf = Vec::new();
        buf.extend_from_slice(&4u64.to_le_bytes());
        buf.extend_from_slice(b"ping");
        // A second frame arrives appended before the first is drained —
        // simulates two TCP segments coalescing into one read().
        buf.extend_from_slice(&4u64.to_le_bytes());
        buf.extend_from_slice(b"pong");

        dispatch_complete_frames(&mut buf, &id, &handlers);

        assert!(buf.is_empty());
        assert_eq!(
            *received.lock().unwrap(),
            vec![b"ping".to_vec(), b"pong".to_vec()]
        );
    }

    #[test]
    fn dispatch_waits_for_full_frame() {
        let handlers = HandlerSet::default();
        let called = Arc::new(Mutex::new(false));
        let c = called.clone();
        handlers.push_message(Box::new(move |_id, _bytes| *c.lock().unwrap() = true));

        let id = Id::new("peer");
        let mut buf = Vec::new();
        buf.extend_from_slice(&4u64.to_le_bytes());
        buf.extend_from_slice(b"pi"); // truncated payload

        dispatch_complete_frames(&mut buf, &id, &handlers);
        assert!(!*called.lock().unwrap());
        assert_eq!(buf.len(), 10);
    }
}
