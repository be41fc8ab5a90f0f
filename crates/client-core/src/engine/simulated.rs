//! In-process engine that scripts registration and outgoing calls
//!
//! Useful for demos and for exercising the control plane without a network. The
//! script is driven entirely by [`SipEngine::iterate`]: every `ticks_per_step`
//! iterations a pending registration or call advances one state.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::debug;

use super::{
    AccountId, AccountParams, AudioCodec, AudioDevice, AudioDeviceType, AuthInfo, CallParams,
    EngineCallId, EngineCallState, EngineEvent, EngineEventSink, SipEngine,
};
use crate::address::SipAddress;
use crate::error::EngineError;
use crate::registration::RegistrationState;

/// Observable knobs of the simulated engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSettings {
    pub echo_cancellation: bool,
    pub auto_gain_control: bool,
    pub audio_dscp: u8,
    pub sip_dscp: u8,
    pub adaptive_rate_control: bool,
    pub adaptive_jitter_compensation: bool,
    pub bandwidth: (Option<u32>, Option<u32>),
    pub mic_enabled: bool,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub log_path: Option<PathBuf>,
}

#[derive(Debug)]
struct SimCall {
    id: EngineCallId,
    target: SipAddress,
    state: EngineCallState,
    ticks: u32,
    connected_at: Option<Instant>,
}

impl SimCall {
    fn duration(&self) -> u32 {
        self.connected_at
            .map(|at| at.elapsed().as_secs() as u32)
            .unwrap_or(0)
    }
}

#[derive(Debug)]
struct PendingRegistration {
    succeeds: bool,
    ticks: u32,
}

/// Scripted [`SipEngine`]
#[derive(Debug)]
pub struct SimulatedEngine {
    sink: Option<EngineEventSink>,
    settings: EngineSettings,
    codecs: Vec<AudioCodec>,
    devices: Vec<AudioDevice>,
    auth: Vec<AuthInfo>,
    accounts: Vec<(AccountId, AccountParams)>,
    default_account: Option<AccountId>,
    next_account_id: u64,
    next_call_id: u64,
    registration: Option<PendingRegistration>,
    call: Option<SimCall>,
    ticks_per_step: u32,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self {
            sink: None,
            settings: EngineSettings {
                mic_enabled: true,
                ..Default::default()
            },
            codecs: default_codecs(),
            devices: vec![
                AudioDevice::new("mic0", "Built-in Microphone", AudioDeviceType::Microphone),
                AudioDevice::new("ear0", "Earpiece", AudioDeviceType::Earpiece),
                AudioDevice::new("spk0", "Loudspeaker", AudioDeviceType::Speaker),
                AudioDevice::new("bt0", "Bluetooth Headset", AudioDeviceType::Bluetooth),
            ],
            auth: Vec::new(),
            accounts: Vec::new(),
            default_account: None,
            next_account_id: 1,
            next_call_id: 1,
            registration: None,
            call: None,
            ticks_per_step: 25,
        }
    }

    /// Replace the enumerated audio devices
    pub fn with_devices(mut self, devices: Vec<AudioDevice>) -> Self {
        self.devices = devices;
        self
    }

    /// Iterations between scripted state changes (minimum 1)
    pub fn with_ticks_per_step(mut self, ticks: u32) -> Self {
        self.ticks_per_step = ticks.max(1);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn accounts(&self) -> impl Iterator<Item = &AccountParams> {
        self.accounts.iter().map(|(_, params)| params)
    }

    pub fn auth_info(&self) -> &[AuthInfo] {
        &self.auth
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.sink {
            let _ = sink.send(event);
        }
    }

    fn emit_call(&self, call: EngineCallId, state: EngineCallState, duration_secs: u32, message: &str) {
        self.emit(EngineEvent::Call {
            call,
            state,
            duration_secs,
            message: message.to_string(),
        });
    }

    fn advance_registration(&mut self) {
        let Some(pending) = self.registration.as_mut() else {
            return;
        };
        pending.ticks += 1;
        if pending.ticks < self.ticks_per_step {
            return;
        }
        let succeeds = pending.succeeds;
        self.registration = None;
        let (state, message) = if succeeds {
            (RegistrationState::Ok, "Registration successful")
        } else {
            (RegistrationState::Failed, "Unauthorized")
        };
        self.emit(EngineEvent::Registration {
            state,
            message: message.to_string(),
        });
    }

    fn advance_call(&mut self) {
        let ticks_per_step = self.ticks_per_step;
        let Some(call) = self.call.as_mut() else {
            return;
        };
        call.ticks += 1;
        if call.ticks < ticks_per_step {
            return;
        }
        call.ticks = 0;

        let next = match call.state {
            EngineCallState::OutgoingInit => Some(EngineCallState::OutgoingProgress),
            EngineCallState::OutgoingProgress => Some(EngineCallState::OutgoingRinging),
            EngineCallState::OutgoingRinging => Some(EngineCallState::Connected),
            EngineCallState::Connected => Some(EngineCallState::StreamsRunning),
            EngineCallState::End => Some(EngineCallState::Released),
            _ => None,
        };
        let Some(next) = next else {
            return;
        };

        call.state = next;
        if next == EngineCallState::Connected {
            call.connected_at = Some(Instant::now());
        }
        let duration = call.duration();
        let id = call.id;
        debug!(call = %id, target = %call.target, state = %next, "Simulated call advanced");

        if next == EngineCallState::Released {
            self.call = None;
        }
        self.emit_call(id, next, duration, "");
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn default_codecs() -> Vec<AudioCodec> {
    [
        ("opus", 48_000, 32_000),
        ("speex", 16_000, 28_000),
        ("G722", 8_000, 64_000),
        ("PCMU", 8_000, 64_000),
        ("PCMA", 8_000, 64_000),
        ("GSM", 8_000, 13_000),
        ("iLBC", 8_000, 15_200),
    ]
    .into_iter()
    .map(|(mime, clock_rate, bitrate)| AudioCodec {
        mime_type: mime.to_string(),
        clock_rate,
        enabled: true,
        normal_bitrate_bps: bitrate,
    })
    .collect()
}

impl SipEngine for SimulatedEngine {
    fn start(&mut self, events: EngineEventSink) -> Result<(), EngineError> {
        if self.sink.is_some() {
            return Err(EngineError::AlreadyStarted);
        }
        self.sink = Some(events);
        Ok(())
    }

    fn iterate(&mut self) {
        if self.sink.is_none() {
            return;
        }
        self.advance_registration();
        self.advance_call();
    }

    fn set_echo_cancellation(&mut self, enabled: bool) {
        self.settings.echo_cancellation = enabled;
    }

    fn set_auto_gain_control(&mut self, enabled: bool) {
        self.settings.auto_gain_control = enabled;
    }

    fn set_audio_dscp(&mut self, dscp: u8) {
        self.settings.audio_dscp = dscp;
    }

    fn set_sip_dscp(&mut self, dscp: u8) {
        self.settings.sip_dscp = dscp;
    }

    fn set_adaptive_rate_control(&mut self, enabled: bool) {
        self.settings.adaptive_rate_control = enabled;
    }

    fn set_adaptive_jitter_compensation(&mut self, enabled: bool) {
        self.settings.adaptive_jitter_compensation = enabled;
    }

    fn set_bandwidth_limits(&mut self, upload_kbps: Option<u32>, download_kbps: Option<u32>) {
        self.settings.bandwidth = (upload_kbps, download_kbps);
    }

    fn audio_codecs(&self) -> Vec<AudioCodec> {
        self.codecs.clone()
    }

    fn set_codec_enabled(&mut self, mime_type: &str, enabled: bool) -> Result<(), EngineError> {
        let codec = self
            .codecs
            .iter_mut()
            .find(|c| c.mime_type == mime_type)
            .ok_or_else(|| EngineError::rejected("enable codec", format!("unknown codec {}", mime_type)))?;
        codec.enabled = enabled;
        Ok(())
    }

    fn set_codec_bitrate(&mut self, mime_type: &str, bitrate_bps: u32) -> Result<(), EngineError> {
        let codec = self
            .codecs
            .iter_mut()
            .find(|c| c.mime_type == mime_type)
            .ok_or_else(|| EngineError::rejected("set bitrate", format!("unknown codec {}", mime_type)))?;
        codec.normal_bitrate_bps = bitrate_bps;
        Ok(())
    }

    fn enable_log_collection(&mut self, path: &Path) -> Result<(), EngineError> {
        self.settings.log_path = Some(path.to_path_buf());
        Ok(())
    }

    fn clear_accounts(&mut self) {
        self.accounts.clear();
        self.default_account = None;
        self.registration = None;
    }

    fn clear_auth_info(&mut self) {
        self.auth.clear();
    }

    fn add_auth_info(&mut self, auth: AuthInfo) {
        self.auth.push(auth);
    }

    fn add_account(&mut self, params: AccountParams) -> Result<AccountId, EngineError> {
        let id = AccountId(self.next_account_id);
        self.next_account_id += 1;
        self.accounts.push((id, params));
        Ok(id)
    }

    fn set_default_account(&mut self, account: AccountId) -> Result<(), EngineError> {
        let params = self
            .accounts
            .iter()
            .find(|(id, _)| *id == account)
            .map(|(_, params)| params.clone())
            .ok_or_else(|| EngineError::rejected("set default account", "unknown account"))?;
        self.default_account = Some(account);

        if params.register_enabled {
            let user = params.identity.user().unwrap_or_default();
            let succeeds = self
                .auth
                .iter()
                .any(|a| a.username == user && !a.password.is_empty());
            self.registration = Some(PendingRegistration { succeeds, ticks: 0 });
            self.emit(EngineEvent::Registration {
                state: RegistrationState::Progress,
                message: "Registration in progress".to_string(),
            });
        }
        Ok(())
    }

    fn invite(&mut self, address: &SipAddress, _params: CallParams) -> Result<EngineCallId, EngineError> {
        if self.sink.is_none() {
            return Err(EngineError::NotStarted);
        }
        if self.call.is_some() {
            return Err(EngineError::invite_failed("a call is already in progress"));
        }
        let id = EngineCallId(self.next_call_id);
        self.next_call_id += 1;
        self.call = Some(SimCall {
            id,
            target: address.clone(),
            state: EngineCallState::OutgoingInit,
            ticks: 0,
            connected_at: None,
        });
        self.emit_call(id, EngineCallState::OutgoingInit, 0, "Starting outgoing call");
        Ok(id)
    }

    fn terminate_current_call(&mut self) -> bool {
        let Some(call) = self.call.as_mut() else {
            return false;
        };
        if call.state.is_terminal() {
            return true;
        }
        let duration = call.duration();
        let id = call.id;
        call.state = EngineCallState::End;
        call.ticks = 0;
        self.emit_call(id, EngineCallState::End, duration, "Call terminated");
        true
    }

    fn current_call_duration(&self) -> Option<u32> {
        self.call.as_ref().map(SimCall::duration)
    }

    fn set_mic_enabled(&mut self, enabled: bool) {
        self.settings.mic_enabled = enabled;
    }

    fn audio_devices(&self) -> Vec<AudioDevice> {
        self.devices.clone()
    }

    fn set_input_audio_device(&mut self, device: &AudioDevice) {
        self.settings.input_device = Some(device.id.clone());
    }

    fn set_output_audio_device(&mut self, device: &AudioDevice) {
        self.settings.output_device = Some(device.id.clone());
    }
}
