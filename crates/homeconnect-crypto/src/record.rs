//! AES-256-CBC record layer with a rolling truncated-HMAC frame chain.
//!
//! Encrypts/decrypts one logical JSON frame into/from one WebSocket binary
//! payload. Confidentiality comes from AES-256-CBC; integrity and frame
//! ordering come from a per-direction chain of truncated HMAC-SHA256 tags,
//! each one covering the previous tag. The two directions (`last_tx_hmac`,
//! `last_rx_hmac`) never share state, and a verification failure never
//! advances `last_rx_hmac` — the frame is simply dropped by the caller.

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;
use zeroize::Zeroizing;

use crate::{error::RecordError, keys, padding};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Direction tag for frames we send ('E', transmit).
const TX_DIRECTION_TAG: u8 = 0x45;
/// Direction tag for frames we receive ('C', receive).
const RX_DIRECTION_TAG: u8 = 0x43;

/// Number of bytes of a full HMAC-SHA256 tag that are actually transmitted.
const TAG_LEN: usize = 16;

/// Minimum valid frame length: an empty AES block plus the truncated tag.
const MIN_FRAME_LEN: usize = 32;

/// Stateful AES-256-CBC cipher with a rolling MAC chain bound to one
/// session's single direction pair.
///
/// Reconnection MUST construct a fresh [`RecordCipher`]: the enc/mac keys are
/// deterministic from the PSK, but the MAC chain always restarts at zero.
pub struct RecordCipher {
    enc_key: Zeroizing<[u8; 32]>,
    mac_key: Zeroizing<[u8; 32]>,
    iv: [u8; 16],
    last_tx_hmac: [u8; TAG_LEN],
    last_rx_hmac: [u8; TAG_LEN],
}

impl RecordCipher {
    /// Derive a new cipher from PSK bytes and a static IV.
    #[must_use]
    pub fn new(psk: &[u8], iv: [u8; 16]) -> Self {
        Self {
            enc_key: Zeroizing::new(keys::derive_enc_key(psk)),
            mac_key: Zeroizing::new(keys::derive_mac_key(psk)),
            iv,
            last_tx_hmac: [0u8; TAG_LEN],
            last_rx_hmac: [0u8; TAG_LEN],
        }
    }

    /// The current outbound chain tag (exposed for tests and diagnostics).
    #[must_use]
    pub fn last_tx_hmac(&self) -> [u8; TAG_LEN] {
        self.last_tx_hmac
    }

    /// The current inbound chain tag (exposed for tests and diagnostics).
    #[must_use]
    pub fn last_rx_hmac(&self) -> [u8; TAG_LEN] {
        self.last_rx_hmac
    }

    /// Encrypt one JSON frame, advancing `last_tx_hmac`.
    ///
    /// `fill_random` supplies the padding's random filler bytes; callers pass
    /// through their [`Environment`]-style randomness source so this layer
    /// stays pure.
    pub fn encrypt(&mut self, cleartext: &[u8], fill_random: impl FnOnce(&mut [u8])) -> Vec<u8> {
        let padded = padding::pad(cleartext, fill_random);
        let ciphertext = aes_cbc_encrypt(&self.enc_key, &self.iv, &padded);

        let tag = mac_tag(&self.mac_key, &self.iv, TX_DIRECTION_TAG, &self.last_tx_hmac, &ciphertext);
        self.last_tx_hmac = tag;

        let mut frame = ciphertext;
        frame.extend_from_slice(&tag);
        frame
    }

    /// Decrypt one wire frame, advancing `last_rx_hmac` only on success.
    ///
    /// # Errors
    ///
    /// - [`RecordError::InvalidFrameLength`] if the frame is shorter than 32
    ///   bytes or not a multiple of 16.
    /// - [`RecordError::MacMismatch`] if the tag doesn't verify. The rolling
    ///   `last_rx_hmac` is left unchanged in this case.
    /// - [`RecordError::InvalidPadding`] / [`RecordError::InvalidUtf8`] if the
    ///   decrypted cleartext is malformed (these indicate a verified but
    ///   corrupt frame, which should not normally happen).
    pub fn decrypt(&mut self, frame: &[u8]) -> Result<String, RecordError> {
        if frame.len() < MIN_FRAME_LEN || frame.len() % 16 != 0 {
            return Err(RecordError::InvalidFrameLength { len: frame.len() });
        }

        let split = frame.len() - TAG_LEN;
        let ciphertext = &frame[..split];
        let mut recv_tag = [0u8; TAG_LEN];
        recv_tag.copy_from_slice(&frame[split..]);

        let calc = mac_tag(&self.mac_key, &self.iv, RX_DIRECTION_TAG, &self.last_rx_hmac, ciphertext);

        if recv_tag.ct_eq(&calc).unwrap_u8() == 0 {
            warn!("record layer MAC mismatch, dropping frame");
            return Err(RecordError::MacMismatch);
        }

        self.last_rx_hmac = recv_tag;

        let padded = aes_cbc_decrypt(&self.enc_key, &self.iv, ciphertext);
        let cleartext = padding::unpad(&padded)?;
        String::from_utf8(cleartext).map_err(|_| RecordError::InvalidUtf8)
    }
}

fn mac_tag(
    mac_key: &[u8; 32],
    iv: &[u8; 16],
    direction_tag: u8,
    chain: &[u8; TAG_LEN],
    ciphertext: &[u8],
) -> [u8; TAG_LEN] {
    // INVARIANT: HMAC accepts a key of any length.
    #[allow(clippy::expect_used)]
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .expect("invariant: HMAC accepts any key length");
    mac.update(iv);
    mac.update(&[direction_tag]);
    mac.update(chain);
    mac.update(ciphertext);

    let full = mac.finalize().into_bytes();
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&full[..TAG_LEN]);
    tag
}

fn aes_cbc_encrypt(key: &[u8; 32], iv: &[u8; 16], padded: &[u8]) -> Vec<u8> {
    let mut buf = padded.to_vec();
    let len = buf.len();
    // INVARIANT: `padded` is always block-aligned by construction of
    // `padding::pad`, so NoPadding never needs extra room in `buf`.
    #[allow(clippy::expect_used)]
    let ct_len = Aes256CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .expect("invariant: padded buffer is block-aligned")
        .len();
    buf.truncate(ct_len);
    buf
}

fn aes_cbc_decrypt(key: &[u8; 32], iv: &[u8; 16], ciphertext: &[u8]) -> Vec<u8> {
    let mut buf = ciphertext.to_vec();
    // INVARIANT: callers only reach this after the frame-length check in
    // `decrypt`, so `ciphertext` is always block-aligned.
    #[allow(clippy::expect_used)]
    let pt_len = Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .expect("invariant: ciphertext is block-aligned")
        .len();
    buf.truncate(pt_len);
    buf
}
