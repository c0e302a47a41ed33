//! Typed overloads of `Messaging` that serialize through the codec first
//! (spec.md §4.4: "typed overloads serialize through the codec first").

use super::Messaging;
use crate::codec::Encode;
use crate::id::Id;

fn encode<T: Encode>(value: &T) -> bytes::Bytes {
    let mut buf = Vec::with_capacity(value.encoded_len() as usize);
    value.write_to(&mut buf);
    buf.into()
}

pub fn publish_value<T: Encode>(m: &dyn Messaging, value: &T) {
    m.publish(encode(value));
}

pub fn publish_except_value<T: Encode>(m: &dyn Messaging, id: &Id, value: &T) {
    m.publish_except(id, encode(value));
}

pub fn send_value<T: Encode>(m: &dyn Messaging, id: &Id, value: &T) {
    m.send(id, encode(value));
}

pub fn send_many_value<T: Encode>(m: &dyn Messaging, ids: &[Id], value: &T) {
    m.send_many(ids, encode(value));
}
