//! Key derivation for the AES record layer.
//!
//! Both keys are derived from the same PSK via HMAC-SHA256 with a
//! single-byte-string label as the message, never the key. This is a fixed,
//! non-rekeying derivation: the PSK and IV are static per appliance, so
//! there is no ratchet or KDF chain here, just two tags.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    // INVARIANT: HMAC accepts a key of any length (it re-hashes oversized
    // keys internally), so `new_from_slice` cannot fail here.
    #[allow(clippy::expect_used)]
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).expect("invariant: HMAC accepts any key length");
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Derive the AES-256-CBC encryption key: `HMAC_SHA256(psk, "ENC")`.
#[must_use]
pub fn derive_enc_key(psk: &[u8]) -> [u8; 32] {
    hmac_sha256(psk, b"ENC")
}

/// Derive the HMAC-SHA256 MAC key: `HMAC_SHA256(psk, "MAC")`.
#[must_use]
pub fn derive_mac_key(psk: &[u8]) -> [u8; 32] {
    hmac_sha256(psk, b"MAC")
}
