use super::{Decode, Encode};

/// Advance `data` past one decoded `T`, returning the decoded value.
///
/// For a fixed-size `T` this takes exactly `T::FIXED_SIZE` bytes off the
/// front; for a variable-size `T` (a string, a byte vector) it takes
/// everything remaining, so such a type may only be consumed last.
///
/// # Panics
///
/// Panics if fewer bytes remain than `T` requires. Per spec.md §4.1 this is
/// a deliberate low-level primitive: calling `consume` for more bytes than
/// remain is a programming error, not a recoverable condition.
pub fn consume<T: Decode>(data: &mut &[u8]) -> T {
    let available = data.len() as u64;
    let take = T::FIXED_SIZE.unwrap_or(available);
    assert!(
        take <= available,
        "consume: buffer underflow (need {take} bytes, have {available})"
    );
    let (head, tail) = data.split_at(take as usize);
    *data = tail;
    T::read_from(head)
}

/// Serialize every value in `parts` contiguously into a freshly allocated
/// buffer sized exactly to `Σ encoded_len()`.
pub fn concat(parts: &[&dyn Encode]) -> Vec<u8> {
    let total: u64 = parts.iter().map(|p| p.encoded_len()).sum();
    let mut buf = Vec::with_capacity(total as usize);
    for part in parts {
        part.write_to(&mut buf);
    }
    debug_assert_eq!(buf.len() as u64, total);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_then_consume_recovers_values() {
        let tag: u32 = 7;
        let payload = "abc".to_owned();
        let buf = concat(&[&tag, &payload]);
        assert_eq!(buf.len() as u64, 4 + 3);

        let mut cursor: &[u8] = &buf;
        let decoded_tag: u32 = consume(&mut cursor);
        assert_eq!(decoded_tag, 7);
        let rest: String = consume(&mut cursor);
        assert_eq!(rest, "abc");
    }

    #[test]
    #[should_panic(expected = "buffer underflow")]
    fn consume_past_end_panics() {
        let buf: Vec<u8> = vec![0u8; 2];
        let mut cursor: &[u8] = &buf;
        let _: u32 = consume(&mut cursor);
    }
}
