//! Shared packet framing for the connectionless datagram transport
//! (spec.md §3, §4.7): a one-byte tag followed by the payload.

pub mod client;
pub mod server;

pub(crate) const TAG_USER: u8 = 0x00;
pub(crate) const TAG_KEEPALIVE: u8 = 0x01;

/// Prepend the user-data tag to `payload`, ready to hand to `send_to`.
pub(crate) fn frame_user(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(TAG_USER);
    out.extend_from_slice(payload);
    out
}

/// The single-byte keepalive packet.
pub(crate) fn frame_keepalive() -> [u8; 1] {
    [TAG_KEEPALIVE]
}
