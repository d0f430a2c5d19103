//! Custom (non-PKCS#7) padding scheme used by the AES record layer.
//!
//! Given cleartext length `L`: `pad_len = 16 - (L mod 16)`, bumped by 16 if
//! that leaves exactly 1 (the scheme needs at least a 0x00 separator and a
//! length byte, so a single trailing byte is never valid). The padded buffer
//! is `cleartext || 0x00 || random(pad_len - 2) || byte(pad_len)`.

use crate::error::RecordError;

/// Minimum total padding overhead (separator byte + length byte).
const MIN_PAD_LEN: usize = 2;

/// Maximum total padding overhead (one full AES block).
const MAX_PAD_LEN: usize = 32;

/// Number of padding bytes required for a cleartext of the given length.
#[must_use]
pub fn pad_len(cleartext_len: usize) -> usize {
    let mut len = 16 - (cleartext_len % 16);
    if len == 1 {
        len += 16;
    }
    len
}

/// Pad `cleartext` to a multiple of 16 bytes using the scheme above.
///
/// `fill_random` is called once with a slice sized `pad_len - 2`; callers
/// should fill it from a cryptographically secure source in production (a
/// fixed pattern is fine in tests). This function never generates its own
/// randomness, keeping the layer pure.
#[must_use]
pub fn pad(cleartext: &[u8], fill_random: impl FnOnce(&mut [u8])) -> Vec<u8> {
    let total_pad = pad_len(cleartext.len());
    let mut buf = Vec::with_capacity(cleartext.len() + total_pad);
    buf.extend_from_slice(cleartext);
    buf.push(0x00);

    let random_len = total_pad - MIN_PAD_LEN;
    let random_start = buf.len();
    buf.resize(random_start + random_len, 0);
    fill_random(&mut buf[random_start..]);

    #[allow(clippy::cast_possible_truncation)]
    buf.push(total_pad as u8);

    debug_assert_eq!(buf.len() % 16, 0);
    buf
}

/// Strip the padding applied by [`pad`], returning the original cleartext.
///
/// # Errors
///
/// [`RecordError::InvalidPadding`] if the trailing length byte is outside
/// `2..=32` or claims more bytes than the buffer holds.
pub fn unpad(padded: &[u8]) -> Result<Vec<u8>, RecordError> {
    let Some(&len_byte) = padded.last() else { return Err(RecordError::InvalidPadding) };
    let total_pad = len_byte as usize;

    if !(MIN_PAD_LEN..=MAX_PAD_LEN).contains(&total_pad) || total_pad > padded.len() {
        return Err(RecordError::InvalidPadding);
    }

    Ok(padded[..padded.len() - total_pad].to_vec())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn pad_len_never_yields_one() {
        for len in 0..64 {
            assert_ne!(pad_len(len), 1);
        }
    }

    #[test]
    fn pad_len_bounds() {
        for len in 0..64 {
            let p = pad_len(len);
            assert!((2..=32).contains(&p), "pad_len({len}) = {p}");
        }
    }

    #[test]
    fn round_trip_empty() {
        let padded = pad(b"", |buf| buf.fill(0xAA));
        assert_eq!(padded.len() % 16, 0);
        assert_eq!(unpad(&padded).unwrap(), b"");
    }

    #[test]
    fn round_trip_various_lengths() {
        for len in 0..64 {
            let cleartext = vec![0x42; len];
            let padded = pad(&cleartext, |buf| buf.fill(0x55));
            assert_eq!(padded.len() % 16, 0);
            assert_eq!(unpad(&padded).unwrap(), cleartext);
        }
    }

    #[test]
    fn rejects_empty_buffer() {
        assert_eq!(unpad(&[]), Err(RecordError::InvalidPadding));
    }

    #[test]
    fn rejects_length_byte_of_zero() {
        assert_eq!(unpad(&[0u8; 16]), Err(RecordError::InvalidPadding));
    }

    #[test]
    fn rejects_length_byte_exceeding_buffer() {
        let mut buf = vec![0u8; 4];
        buf[3] = 200;
        assert_eq!(unpad(&buf), Err(RecordError::InvalidPadding));
    }

    proptest! {
        #[test]
        fn round_trip_proptest(cleartext in proptest::collection::vec(any::<u8>(), 0..256)) {
            let padded = pad(&cleartext, |buf| buf.fill(0x11));
            prop_assert_eq!(padded.len() % 16, 0);
            prop_assert_eq!(unpad(&padded).unwrap(), cleartext);
        }
    }
}
