//! Microphone mute and speaker/earpiece routing
//!
//! The flags here are a shadow of the engine's audio configuration. They are not
//! re-read from the engine, so a route changed behind the client's back is not
//! reflected.

use tracing::{debug, info};

use crate::engine::{AudioDeviceType, SipEngine};

/// Locally tracked audio flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaFlags {
    pub is_muted: bool,
    pub is_speaker_on: bool,
}

/// Mute and speaker toggles over the engine
#[derive(Debug, Default)]
pub struct MediaControl {
    flags: MediaFlags,
}

impl MediaControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> MediaFlags {
        self.flags
    }

    /// Flip the mute flag; a muted client has its microphone disabled
    pub fn toggle_mute<E: SipEngine + ?Sized>(&mut self, engine: &mut E) -> bool {
        let muted = !self.flags.is_muted;
        engine.set_mic_enabled(!muted);
        self.flags.is_muted = muted;
        info!(muted, "Microphone mute toggled");
        muted
    }

    /// Flip the speaker flag and route input and output to the loudspeaker or the
    /// earpiece
    ///
    /// Only the first device of the wanted type is used. If there is none, the route
    /// is left alone but the flag still flips.
    pub fn toggle_speaker<E: SipEngine + ?Sized>(&mut self, engine: &mut E) -> bool {
        let speaker_on = !self.flags.is_speaker_on;
        let wanted = if speaker_on {
            AudioDeviceType::Speaker
        } else {
            AudioDeviceType::Earpiece
        };

        match engine
            .audio_devices()
            .into_iter()
            .find(|d| d.device_type == wanted)
        {
            Some(device) => {
                engine.set_input_audio_device(&device);
                engine.set_output_audio_device(&device);
                info!(device = %device.name, speaker_on, "Audio route changed");
            }
            None => debug!(?wanted, "No matching audio device, route unchanged"),
        }

        self.flags.is_speaker_on = speaker_on;
        speaker_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AudioDevice, SimulatedEngine};

    #[test]
    fn test_mute_is_an_involution() {
        let mut engine = SimulatedEngine::new();
        let mut media = MediaControl::new();
        assert!(engine.settings().mic_enabled);

        assert!(media.toggle_mute(&mut engine));
        assert!(!engine.settings().mic_enabled);

        assert!(!media.toggle_mute(&mut engine));
        assert!(engine.settings().mic_enabled);
        assert_eq!(media.flags(), MediaFlags::default());
    }

    #[test]
    fn test_speaker_routes_both_directions() {
        let mut engine = SimulatedEngine::new();
        let mut media = MediaControl::new();

        assert!(media.toggle_speaker(&mut engine));
        assert_eq!(engine.settings().input_device.as_deref(), Some("spk0"));
        assert_eq!(engine.settings().output_device.as_deref(), Some("spk0"));

        assert!(!media.toggle_speaker(&mut engine));
        assert_eq!(engine.settings().input_device.as_deref(), Some("ear0"));
        assert_eq!(engine.settings().output_device.as_deref(), Some("ear0"));
    }

    #[test]
    fn test_speaker_without_device_still_flips_flag() {
        let mut engine = SimulatedEngine::new().with_devices(vec![
            AudioDevice::new("ear0", "Earpiece", AudioDeviceType::Earpiece),
            AudioDevice::new("bt0", "Headset", AudioDeviceType::Bluetooth),
        ]);
        let mut media = MediaControl::new();

        assert!(media.toggle_speaker(&mut engine));
        assert!(media.flags().is_speaker_on);
        assert_eq!(engine.settings().output_device, None);
        assert_eq!(engine.settings().input_device, None);
    }

    #[test]
    fn test_bluetooth_is_never_selected() {
        let mut engine = SimulatedEngine::new().with_devices(vec![
            AudioDevice::new("bt0", "Headset", AudioDeviceType::Bluetooth),
            AudioDevice::new("wired", "Wired", AudioDeviceType::Headset),
        ]);
        let mut media = MediaControl::new();
        media.toggle_speaker(&mut engine);
        media.toggle_speaker(&mut engine);
        assert_eq!(engine.settings().output_device, None);
    }
}
