//! Unsigned varint codec used for counts and lengths in the document
//! encoding.
//!
//! Integers are serialized seven bits at a time starting with the least
//! significant bits; the high bit of each byte marks a continuation. This is
//! the scheme popularized by Go's `encoding/binary`.

/// Maximum encoded length of a 64-bit varint.
pub const MAX_LEN: usize = 10;

/// Returns the number of bytes needed to encode `n`.
pub fn size(n: u64) -> usize {
    if n == 0 {
        return 1;
    }
    (64 - n.leading_zeros() as usize).div_ceil(7)
}

/// Appends `n` to `out`, returning the number of bytes written.
pub fn put(out: &mut Vec<u8>, mut n: u64) -> usize {
    let mut written = 1;
    while n >= 0x80 {
        out.push((n as u8) | 0x80);
        n >>= 7;
        written += 1;
    }
    out.push(n as u8);
    written
}

/// Decodes a varint from the front of `buf`, returning the value and the
/// number of bytes consumed. Returns `None` if the input is truncated or the
/// encoding is longer than [`MAX_LEN`] or overflows 64 bits.
pub fn get(buf: &[u8]) -> Option<(u64, usize)> {
    let first = *buf.first()?;
    if first < 0x80 {
        return Some((first as u64, 1));
    }
    let mut n: u64 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_LEN {
            return None;
        }
        if byte < 0x80 {
            if i == MAX_LEN - 1 && byte > 1 {
                // bits 63.. of the tenth byte don't fit in a u64
                return None;
            }
            return Some((n | (byte as u64) << (7 * i), i + 1));
        }
        n |= ((byte & 0x7f) as u64) << (7 * i);
    }
    None
}

/// Returns the encoded length of the varint at the front of `buf` without
/// decoding it.
pub fn skip(buf: &[u8]) -> Option<usize> {
    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_LEN {
            return None;
        }
        if byte < 0x80 {
            return Some(i + 1);
        }
    }
    None
}

/// Maps a signed integer onto the unsigned range so that small magnitudes
/// stay short when varint encoded.
pub fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag`].
pub fn unzigzag(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_input() {
        assert_eq!(get(&[]), None);
        assert_eq!(skip(&[]), None);
    }

    #[test]
    fn single_byte_fast_path() {
        for n in 0u64..0x80 {
            let mut buf = Vec::new();
            assert_eq!(put(&mut buf, n), 1);
            assert_eq!(get(&buf), Some((n, 1)));
        }
    }

    #[test]
    fn boundaries() {
        for n in [0x7f, 0x80, 0x3fff, 0x4000, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            let written = put(&mut buf, n);
            assert_eq!(written, size(n));
            assert_eq!(get(&buf), Some((n, written)));
            assert_eq!(skip(&buf), Some(written));
        }
    }

    #[test]
    fn truncated() {
        let mut buf = Vec::new();
        put(&mut buf, u64::MAX);
        for cut in 1..buf.len() {
            assert_eq!(get(&buf[..cut]), None);
        }
    }

    #[test]
    fn overlong() {
        // eleven continuation bytes never terminate within MAX_LEN
        assert_eq!(get(&[0x80; 11]), None);
        assert_eq!(skip(&[0x80; 11]), None);
        // a tenth byte carrying more than one bit overflows u64
        let mut buf = vec![0xff; 9];
        buf.push(0x02);
        assert_eq!(get(&buf), None);
    }

    #[test]
    fn zigzag_examples() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(i64::MIN), u64::MAX);
    }

    proptest! {
        #[test]
        fn roundtrip(n in any::<u64>()) {
            let mut buf = Vec::new();
            let written = put(&mut buf, n);
            prop_assert_eq!(written, size(n));
            prop_assert_eq!(get(&buf), Some((n, written)));
            prop_assert_eq!(skip(&buf), Some(written));
        }

        #[test]
        fn zigzag_roundtrip(n in any::<i64>()) {
            prop_assert_eq!(unzigzag(zigzag(n)), n);
        }
    }
}
