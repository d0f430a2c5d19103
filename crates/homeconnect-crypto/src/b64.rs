//! URL-safe base64 helpers for PSK/IV material.
//!
//! The appliance transmits PSK and IV material as URL-safe base64 with the
//! trailing `=` padding stripped. Standard decoders reject unpadded input, so
//! every decode re-adds padding to a multiple of 4 characters first.

use base64::{Engine, engine::general_purpose::URL_SAFE, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::error::RecordError;

/// Decode URL-safe base64 that may be missing its trailing `=` padding.
///
/// # Errors
///
/// [`RecordError::Base64`] if the (re-padded) input is not valid base64.
pub fn decode_no_pad(input: &str) -> Result<Vec<u8>, RecordError> {
    let mut padded = input.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    URL_SAFE.decode(padded.as_bytes()).map_err(|e| RecordError::Base64(e.to_string()))
}

/// Encode bytes as URL-safe base64 without padding.
///
/// Used to build the authentication handshake's nonce field.
#[must_use]
pub fn encode_no_pad(input: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let bytes = b"some arbitrary PSK material!!";
        let encoded = encode_no_pad(bytes);
        assert!(!encoded.contains('='));
        let decoded = decode_no_pad(&encoded).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn decodes_input_missing_all_padding() {
        // "f" -> "Zg==" normally; url-safe no-pad form is just "Zg"
        let decoded = decode_no_pad("Zg").unwrap();
        assert_eq!(decoded, b"f");
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(decode_no_pad("not valid base64!!").is_err());
    }
}
