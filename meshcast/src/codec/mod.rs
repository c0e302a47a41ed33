//! Size / serialize / deserialize triple for wire types (spec.md §4.1).
//!
//! Split into two object-safe traits so [`concat`] can hold heterogeneous
//! values behind `&dyn Encode`, while [`consume`] stays generic over
//! [`Decode`]. Any type implementing both automatically gets [`Codec`].

mod cursor;

pub use cursor::{concat, consume};

/// Serialize half of the codec contract. Object-safe.
pub trait Encode {
    /// Exact number of bytes [`Encode::write_to`] will append.
    fn encoded_len(&self) -> u64;

    /// Append this value's wire representation to `dst`.
    fn write_to(&self, dst: &mut Vec<u8>);
}

/// Deserialize half of the codec contract.
pub trait Decode: Sized {
    /// `Some(n)` when every value of this type occupies exactly `n` bytes
    /// (all built-in integer types, fixed-size arrays of such). `None` when
    /// the type consumes whatever remains in the buffer (strings, byte
    /// vectors) — such a type can only be the *last* field serialized into
    /// a payload, and cannot be used as a tag in [`crate::handler::map`].
    const FIXED_SIZE: Option<u64> = None;

    /// Decode a value from exactly `src.len()` bytes (or, for a
    /// `FIXED_SIZE` type, from the first `FIXED_SIZE` bytes of `src`,
    /// as arranged by [`consume`]).
    fn read_from(src: &[u8]) -> Self;
}

/// A type with both halves of the codec contract.
pub trait Codec: Encode + Decode {}
impl<T: Encode + Decode> Codec for T {}

/// `size(v)` from spec.md §4.1.
pub fn size<T: Encode>(value: &T) -> u64 {
    value.encoded_len()
}

/// `serialize(dst, v)` from spec.md §4.1 — returns bytes written, which
/// always equals `size(v)`.
pub fn serialize<T: Encode>(dst: &mut Vec<u8>, value: &T) -> u64 {
    let before = dst.len();
    value.write_to(dst);
    (dst.len() - before) as u64
}

/// `deserialize(src, nbytes)` from spec.md §4.1. `src` must be exactly
/// `nbytes` long; callers that have a larger buffer should slice first.
pub fn deserialize<T: Decode>(src: &[u8]) -> T {
    T::read_from(src)
}

macro_rules! impl_int_codec {
    ($($t:ty),* $(,)?) => {$(
        impl Encode for $t {
            fn encoded_len(&self) -> u64 {
                std::mem::size_of::<$t>() as u64
            }

            fn write_to(&self, dst: &mut Vec<u8>) {
                dst.extend_from_slice(&self.to_ne_bytes());
            }
        }

        impl Decode for $t {
            const FIXED_SIZE: Option<u64> = Some(std::mem::size_of::<$t>() as u64);

            fn read_from(src: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&src[..std::mem::size_of::<$t>()]);
                <$t>::from_ne_bytes(buf)
            }
        }
    )*};
}

impl_int_codec!(u8, u16, u32, u64, i8, i16, i32, i64);

impl Encode for str {
    fn encoded_len(&self) -> u64 {
        self.as_bytes().len() as u64
    }

    fn write_to(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(self.as_bytes());
    }
}

impl Encode for String {
    fn encoded_len(&self) -> u64 {
        self.as_bytes().len() as u64
    }

    fn write_to(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(self.as_bytes());
    }
}

/// Strings consume the entire remaining buffer — they cannot be followed
/// by another field in the same payload. This mirrors the original
/// library exactly (spec.md §9, Open Questions) rather than inventing a
/// length prefix it never had.
impl Decode for String {
    const FIXED_SIZE: Option<u64> = None;

    fn read_from(src: &[u8]) -> Self {
        String::from_utf8_lossy(src).into_owned()
    }
}

impl Encode for Vec<u8> {
    fn encoded_len(&self) -> u64 {
        self.len() as u64
    }

    fn write_to(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(self);
    }
}

impl Decode for Vec<u8> {
    const FIXED_SIZE: Option<u64> = None;

    fn read_from(src: &[u8]) -> Self {
        src.to_vec()
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encoded_len(&self) -> u64 {
        self.iter().map(Encode::encoded_len).sum()
    }

    fn write_to(&self, dst: &mut Vec<u8>) {
        for element in self {
            element.write_to(dst);
        }
    }
}

impl<T, const N: usize> Decode for [T; N]
where
    T: Decode + Copy + Default,
{
    const FIXED_SIZE: Option<u64> = match T::FIXED_SIZE {
        Some(elem) => Some(elem * N as u64),
        None => None,
    };

    fn read_from(src: &[u8]) -> Self {
        let elem = T::FIXED_SIZE.expect("array codec requires a fixed-size element type") as usize;
        let mut out = [T::default(); N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = T::read_from(&src[i * elem..(i + 1) * elem]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_round_trips() {
        let v: u32 = 0xdead_beef;
        let mut buf = Vec::new();
        let written = serialize(&mut buf, &v);
        assert_eq!(written, size(&v));
        assert_eq!(deserialize::<u32>(&buf), v);
    }

    #[test]
    fn string_consumes_whole_buffer() {
        let s = "hello".to_owned();
        let mut buf = Vec::new();
        serialize(&mut buf, &s);
        assert_eq!(buf, b"hello");
        assert_eq!(deserialize::<String>(&buf), s);
    }

    #[test]
    fn array_round_trips_elementwise() {
        let v: [u16; 3] = [1, 2, 3];
        let mut buf = Vec::new();
        serialize(&mut buf, &v);
        assert_eq!(buf.len(), 6);
        assert_eq!(deserialize::<[u16; 3]>(&buf), v);
    }
}
