use super::MessageHandler;
use crate::codec::{consume, Decode};
use crate::id::Id;

/// One `(tag, handler)` pair built by [`mapping`] for use with [`map`].
pub struct TagMapping<T> {
    tag: T,
    handler: MessageHandler,
}

/// Build one entry of a [`map`] combinator: route payloads tagged `tag` to
/// `handler`, which receives the payload *after* the tag has been consumed.
pub fn mapping<T>(tag: T, handler: impl Fn(&Id, &[u8]) + Send + Sync + 'static) -> TagMapping<T> {
    TagMapping {
        tag,
        handler: Box::new(handler),
    }
}

/// Build a composite message handler (spec.md §4.3): on invocation, consume
/// a leading codec-serialized `T` from the payload and dispatch the
/// remainder to whichever mapping's tag compares equal. No match is a
/// silent drop — the spec makes no provision for an unmatched-tag event.
pub fn map<T>(mappings: impl IntoIterator<Item = TagMapping<T>>) -> MessageHandler
where
    T: Decode + PartialEq + Send + Sync + 'static,
{
    let mappings: Vec<TagMapping<T>> = mappings.into_iter().collect();
    Box::new(move |id, bytes| {
        let mut cursor = bytes;
        let tag: T = consume(&mut cursor);
        for m in &mappings {
            if m.tag == tag {
                (m.handler)(id, cursor);
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::concat;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn dispatches_matching_tag_and_drops_unknown() {
        let h0_calls = Arc::new(AtomicU32::new(0));
        let h1_calls = Arc::new(AtomicU32::new(0));
        let h0_calls_handler = h0_calls.clone();
        let h1_calls_handler = h1_calls.clone();

        let handler = map([
            mapping(0u32, move |_id, rest| {
                assert_eq!(rest, b"a");
                h0_calls_handler.fetch_add(1, Ordering::SeqCst);
            }),
            mapping(1u32, move |_id, rest| {
                assert_eq!(rest, b"b");
                h1_calls_handler.fetch_add(1, Ordering::SeqCst);
            }),
        ]);

        let id = Id::new("peer");
        handler(&id, &concat(&[&0u32, &"a".to_owned()]));
        handler(&id, &concat(&[&1u32, &"b".to_owned()]));
        handler(&id, &concat(&[&7u32, &"c".to_owned()]));

        assert_eq!(h0_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h1_calls.load(Ordering::SeqCst), 1);
    }
}
