//! Construction configuration for a [`crate::Session`].

use std::time::Duration;

/// Selects which transport/encryption mode a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// AES-256-CBC framing over a plain WebSocket: `ws://host:80/homeconnect`.
    Aes,
    /// TLS 1.2 with a PSK cipher suite over WebSocket:
    /// `wss://host:443/homeconnect`.
    TlsPsk,
}

/// Default idle timeout before a keepalive probe becomes due.
pub const DEFAULT_KEEPALIVE_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval at which the keepalive loop wakes to check its timers.
pub const DEFAULT_KEEPALIVE_PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Default bound on the whole connect sequence (socket open through the end
/// of the handshake).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// All inputs needed to construct a [`crate::Session`].
///
/// Mirrors the construction inputs an appliance client needs: where to dial,
/// the pre-shared key material, which framing mode to use, and the identity
/// the handshake presents to the appliance.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Appliance hostname or IP address.
    pub host: String,
    /// URL-safe base64 pre-shared key (AES mode encryption/MAC keys, or the
    /// TLS-PSK secret).
    pub psk64: String,
    /// URL-safe base64 static IV (AES mode only).
    pub iv64: Option<String>,
    /// Which framing/transport mode to use.
    pub mode: Mode,
    /// PSK identity string presented during the TLS-PSK handshake.
    pub psk_identity: String,
    /// OpenSSL cipher string restricting the negotiated PSK cipher suite.
    pub tls_cipher_string: Option<String>,
    /// Application name reported in the `/ei/initialValues` reply.
    pub app_name: String,
    /// Application id reported in the `/ei/initialValues` reply.
    pub app_id: String,
    /// Whether the keepalive loop runs at all.
    pub keepalive_enabled: bool,
    /// How long the appliance may stay silent before a probe is due.
    pub keepalive_idle_timeout: Duration,
    /// How often the keepalive loop wakes to re-check its timers.
    pub keepalive_probe_interval: Duration,
    /// A caller-configured keepalive UID, used as a fallback if re-learning
    /// fails and skipping the "infer from device description" step if set.
    pub keepalive_uid: Option<u32>,
    /// Bound on the whole connect sequence.
    pub connect_timeout: Duration,
}

impl SessionConfig {
    /// Construct a config with every optional field at its documented
    /// default.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        psk64: impl Into<String>,
        mode: Mode,
        psk_identity: impl Into<String>,
        app_name: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            psk64: psk64.into(),
            iv64: None,
            mode,
            psk_identity: psk_identity.into(),
            tls_cipher_string: None,
            app_name: app_name.into(),
            app_id: app_id.into(),
            keepalive_enabled: true,
            keepalive_idle_timeout: DEFAULT_KEEPALIVE_IDLE_TIMEOUT,
            keepalive_probe_interval: DEFAULT_KEEPALIVE_PROBE_INTERVAL,
            keepalive_uid: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// The WebSocket URL this config dials, given the selected mode.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        match self.mode {
            Mode::Aes => format!("ws://{}:80/homeconnect", self.host),
            Mode::TlsPsk => format!("wss://{}:443/homeconnect", self.host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aes_mode_uses_plain_ws_on_port_80() {
        let cfg = SessionConfig::new("10.0.0.5", "psk", Mode::Aes, "ident", "app", "id");
        assert_eq!(cfg.endpoint_url(), "ws://10.0.0.5:80/homeconnect");
    }

    #[test]
    fn tls_psk_mode_uses_wss_on_port_443() {
        let cfg = SessionConfig::new("10.0.0.5", "psk", Mode::TlsPsk, "ident", "app", "id");
        assert_eq!(cfg.endpoint_url(), "wss://10.0.0.5:443/homeconnect");
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SessionConfig::new("h", "p", Mode::Aes, "i", "a", "b");
        assert_eq!(cfg.keepalive_idle_timeout, Duration::from_secs(60));
        assert_eq!(cfg.keepalive_probe_interval, Duration::from_secs(10));
        assert_eq!(cfg.connect_timeout, Duration::from_secs(60));
        assert!(cfg.keepalive_enabled);
        assert!(cfg.keepalive_uid.is_none());
    }
}
