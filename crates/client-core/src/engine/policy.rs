//! Startup media policy
//!
//! Applied once, before the engine starts, so that no registration or call ever runs
//! with the engine's own defaults.

use tracing::{debug, info, warn};

use super::SipEngine;
use crate::config::MediaPolicy;
use crate::error::EngineError;

/// Apply audio processing, QoS marking, bandwidth and codec settings to `engine`
///
/// The codec table is reset first: every codec the engine offers is disabled, then
/// the policy's codecs are enabled in order. Policy entries the engine does not offer
/// are skipped.
pub fn apply_media_policy<E: SipEngine + ?Sized>(
    engine: &mut E,
    policy: &MediaPolicy,
) -> Result<(), EngineError> {
    engine.set_echo_cancellation(policy.echo_cancellation);
    engine.set_auto_gain_control(policy.auto_gain_control);

    engine.set_audio_dscp(policy.audio_dscp);
    engine.set_sip_dscp(policy.sip_dscp);

    engine.set_adaptive_rate_control(policy.adaptive_rate_control);
    engine.set_adaptive_jitter_compensation(policy.adaptive_jitter_compensation);

    engine.set_bandwidth_limits(policy.upload_bandwidth_kbps, policy.download_bandwidth_kbps);

    let offered = engine.audio_codecs();
    for codec in &offered {
        engine.set_codec_enabled(&codec.mime_type, false)?;
    }

    let mut enabled = Vec::with_capacity(policy.codecs.len());
    for setting in &policy.codecs {
        let Some(codec) = offered
            .iter()
            .find(|c| c.mime_type.eq_ignore_ascii_case(&setting.mime_type))
        else {
            warn!(codec = %setting.mime_type, "Codec not offered by engine, skipping");
            continue;
        };

        engine.set_codec_enabled(&codec.mime_type, true)?;
        if let Some(bitrate) = setting.bitrate_bps {
            engine.set_codec_bitrate(&codec.mime_type, bitrate)?;
            debug!(codec = %codec.mime_type, bitrate, "Codec bitrate override");
        }
        enabled.push(codec.mime_type.as_str());
    }

    info!(
        codecs = ?enabled,
        audio_dscp = policy.audio_dscp,
        sip_dscp = policy.sip_dscp,
        "Media policy applied"
    );
    Ok(())
}
