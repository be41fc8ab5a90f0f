//! Client configuration structures and presets
//!
//! This module provides the configuration for the user-agent control plane: call
//! routing defaults, history sizing, drive-loop cadence and the media policy applied
//! to the engine once at startup.
//!
//! # Key Components
//!
//! - **ClientConfig** - Routing, history, drive loop and logging settings
//! - **MediaPolicy** - Audio processing, QoS marking, bandwidth and codec table
//! - **CodecSetting** - One enabled codec with an optional bitrate override
//!
//! # Usage Examples
//!
//! ```rust
//! use sipua_client_core::config::{ClientConfig, MediaPolicy};
//!
//! let config = ClientConfig::new()
//!     .with_default_route_domain("sip.example.com")
//!     .with_history_capacity(50);
//!
//! assert_eq!(config.history_capacity, 50);
//! assert_eq!(config.dial_prefix, "00");
//! assert_eq!(config.media, MediaPolicy::studio());
//! assert!(config.validate().is_ok());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Fallback routing address used when no account is registered
pub const DEFAULT_ROUTE_DOMAIN: &str = "45.32.106.183";

/// International trunk prefix prepended to dialed numbers
pub const DEFAULT_DIAL_PREFIX: &str = "00";

/// Number of completed calls kept in history
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Engine iteration cadence in milliseconds
pub const DEFAULT_ITERATE_INTERVAL_MS: u64 = 20;

/// DSCP value for expedited forwarding (RTP audio)
pub const DSCP_EXPEDITED_FORWARDING: u8 = 46;

/// DSCP value for assured forwarding class 31 (SIP signaling)
pub const DSCP_ASSURED_FORWARDING_31: u8 = 26;

/// Opus bitrate for the studio policy, in bits per second
pub const OPUS_STUDIO_BITRATE_BPS: u32 = 256_000;

/// SRTP usage requested for outgoing calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaEncryption {
    /// Plain RTP
    #[default]
    None,
    Srtp,
}

/// A codec to enable, in priority order, with an optional bitrate override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecSetting {
    /// MIME subtype as the engine reports it (matched case-insensitively)
    pub mime_type: String,
    /// Bitrate override in bits per second; `None` keeps the engine default
    #[serde(default)]
    pub bitrate_bps: Option<u32>,
}

impl CodecSetting {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bitrate_bps: None,
        }
    }

    pub fn with_bitrate(mut self, bitrate_bps: u32) -> Self {
        self.bitrate_bps = Some(bitrate_bps);
        self
    }
}

/// Audio and network policy applied to the engine exactly once, before it starts
///
/// Every codec the engine offers is disabled first; only the entries of
/// [`codecs`](Self::codecs) are then enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaPolicy {
    pub echo_cancellation: bool,
    pub auto_gain_control: bool,
    /// DSCP marking for audio (RTP) packets
    pub audio_dscp: u8,
    /// DSCP marking for signaling (SIP) packets
    pub sip_dscp: u8,
    pub adaptive_rate_control: bool,
    pub adaptive_jitter_compensation: bool,
    /// Upload cap in kbit/s, `None` for unlimited
    pub upload_bandwidth_kbps: Option<u32>,
    /// Download cap in kbit/s, `None` for unlimited
    pub download_bandwidth_kbps: Option<u32>,
    pub codecs: Vec<CodecSetting>,
    pub media_encryption: MediaEncryption,
}

impl MediaPolicy {
    /// The "studio quality" policy: full processing, EF/AF31 marking, no bandwidth
    /// caps, Opus at 256 kbit/s with G.722, PCMU and PCMA fallbacks, no SRTP.
    pub fn studio() -> Self {
        Self {
            echo_cancellation: true,
            auto_gain_control: true,
            audio_dscp: DSCP_EXPEDITED_FORWARDING,
            sip_dscp: DSCP_ASSURED_FORWARDING_31,
            adaptive_rate_control: true,
            adaptive_jitter_compensation: true,
            upload_bandwidth_kbps: None,
            download_bandwidth_kbps: None,
            codecs: vec![
                CodecSetting::new("opus").with_bitrate(OPUS_STUDIO_BITRATE_BPS),
                CodecSetting::new("G722"),
                CodecSetting::new("PCMU"),
                CodecSetting::new("PCMA"),
            ],
            media_encryption: MediaEncryption::None,
        }
    }
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self::studio()
    }
}

/// `sipua/logs` below the user's cache directory, or below the temp directory on
/// platforms without one
pub fn default_log_collection_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("sipua")
        .join("logs")
}

/// Main configuration for the client control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Domain used for calls when no account has been registered
    pub default_route_domain: String,
    /// Trunk prefix prepended to destinations that lack it
    pub dial_prefix: String,
    /// Maximum number of history entries retained
    pub history_capacity: usize,
    /// Drive loop period in milliseconds
    pub iterate_interval_ms: u64,
    /// Directory for the engine's diagnostic logs; collection is always on
    pub log_collection_path: PathBuf,
    /// Buffer size of the [`ClientEvent`](crate::events::ClientEvent) broadcast channel
    pub event_channel_capacity: usize,
    pub media: MediaPolicy,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_route_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_route_domain = domain.into();
        self
    }

    pub fn with_dial_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dial_prefix = prefix.into();
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_iterate_interval(mut self, interval: Duration) -> Self {
        self.iterate_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_log_collection_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_collection_path = path.into();
        self
    }

    pub fn with_media(mut self, media: MediaPolicy) -> Self {
        self.media = media;
        self
    }

    /// Drive loop period
    pub fn iterate_interval(&self) -> Duration {
        Duration::from_millis(self.iterate_interval_ms)
    }

    /// Check the configuration for values the engine task cannot run with
    pub fn validate(&self) -> ClientResult<()> {
        if self.iterate_interval_ms == 0 {
            return Err(ClientError::config("iterate_interval_ms must be greater than zero"));
        }
        if self.history_capacity == 0 {
            return Err(ClientError::config("history_capacity must be greater than zero"));
        }
        if self.event_channel_capacity == 0 {
            return Err(ClientError::config("event_channel_capacity must be greater than zero"));
        }
        if self.dial_prefix.is_empty() {
            return Err(ClientError::config("dial_prefix must not be empty"));
        }
        if self.log_collection_path.as_os_str().is_empty() {
            return Err(ClientError::config("log_collection_path must not be empty"));
        }
        if self.media.codecs.is_empty() {
            return Err(ClientError::config("media.codecs must enable at least one codec"));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_route_domain: DEFAULT_ROUTE_DOMAIN.to_string(),
            dial_prefix: DEFAULT_DIAL_PREFIX.to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            iterate_interval_ms: DEFAULT_ITERATE_INTERVAL_MS,
            log_collection_path: default_log_collection_path(),
            event_channel_capacity: 64,
            media: MediaPolicy::studio(),
        }
    }
}
