//! Recording mock engine shared by the integration tests
//!
//! The engine half is moved into the client; the test keeps a [`MockControl`] that
//! sees everything the client asked the engine to do and can push engine events.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::timeout;

use sipua_client_core::engine::{AccountId, AccountParams, AuthInfo, CallParams};
use sipua_client_core::{
    AudioCodec, AudioDevice, AudioDeviceType, EngineCallId, EngineCallState, EngineError,
    EngineEvent, EngineEventSink, RegistrationState, SipAddress, SipEngine,
};

pub const WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
pub struct MockState {
    pub sink: Option<EngineEventSink>,
    pub started: bool,
    pub iterations: u64,

    pub echo_cancellation: Option<bool>,
    pub auto_gain_control: Option<bool>,
    pub audio_dscp: Option<u8>,
    pub sip_dscp: Option<u8>,
    pub adaptive_rate_control: Option<bool>,
    pub adaptive_jitter_compensation: Option<bool>,
    pub bandwidth: Option<(Option<u32>, Option<u32>)>,
    pub codecs: Vec<AudioCodec>,
    pub log_path: Option<PathBuf>,

    pub auth: Vec<AuthInfo>,
    pub accounts: Vec<AccountParams>,
    pub default_account: Option<AccountId>,

    pub invites: Vec<SipAddress>,
    pub refuse_invites: bool,
    pub next_call: u64,
    pub current_call: Option<EngineCallId>,
    pub terminations: u32,
    pub duration: Option<u32>,

    pub mic_enabled: Option<bool>,
    pub devices: Vec<AudioDevice>,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
}

/// Engine half, handed to `Client::start`
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

/// Test half
#[derive(Clone)]
pub struct MockControl {
    state: Arc<Mutex<MockState>>,
}

pub fn mock_engine() -> (MockEngine, MockControl) {
    mock_engine_with_devices(vec![
        AudioDevice::new("mic", "Microphone", AudioDeviceType::Microphone),
        AudioDevice::new("ear", "Earpiece", AudioDeviceType::Earpiece),
        AudioDevice::new("spk", "Loudspeaker", AudioDeviceType::Speaker),
    ])
}

pub fn mock_engine_with_devices(devices: Vec<AudioDevice>) -> (MockEngine, MockControl) {
    let codecs = ["opus", "speex", "G722", "PCMU", "PCMA", "GSM"]
        .iter()
        .map(|name| AudioCodec {
            mime_type: name.to_string(),
            clock_rate: 8000,
            enabled: true,
            normal_bitrate_bps: 64_000,
        })
        .collect();

    let state = Arc::new(Mutex::new(MockState {
        codecs,
        devices,
        ..MockState::default()
    }));
    (
        MockEngine {
            state: state.clone(),
        },
        MockControl { state },
    )
}

impl MockControl {
    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn emit(&self, event: EngineEvent) {
        let sink = self.state.lock().sink.clone().expect("engine not started");
        sink.send(event).expect("engine task gone");
    }

    pub fn emit_registration(&self, state: RegistrationState) {
        self.emit(EngineEvent::Registration {
            state,
            message: state.to_string(),
        });
    }

    /// Emit a call event for the engine's current (or most recent) call
    pub fn emit_call(&self, state: EngineCallState, duration_secs: u32) {
        let call = self.with(|s| EngineCallId(s.next_call));
        self.emit(EngineEvent::Call {
            call,
            state,
            duration_secs,
            message: String::new(),
        });
        if state.is_terminal() {
            self.with(|s| s.current_call = None);
        }
    }

    pub fn enabled_codecs(&self) -> Vec<String> {
        self.with(|s| {
            s.codecs
                .iter()
                .filter(|c| c.enabled)
                .map(|c| c.mime_type.clone())
                .collect()
        })
    }
}

impl SipEngine for MockEngine {
    fn start(&mut self, events: EngineEventSink) -> Result<(), EngineError> {
        let mut s = self.state.lock();
        if s.started {
            return Err(EngineError::AlreadyStarted);
        }
        s.started = true;
        s.sink = Some(events);
        Ok(())
    }

    fn iterate(&mut self) {
        self.state.lock().iterations += 1;
    }

    fn set_echo_cancellation(&mut self, enabled: bool) {
        self.state.lock().echo_cancellation = Some(enabled);
    }

    fn set_auto_gain_control(&mut self, enabled: bool) {
        self.state.lock().auto_gain_control = Some(enabled);
    }

    fn set_audio_dscp(&mut self, dscp: u8) {
        self.state.lock().audio_dscp = Some(dscp);
    }

    fn set_sip_dscp(&mut self, dscp: u8) {
        self.state.lock().sip_dscp = Some(dscp);
    }

    fn set_adaptive_rate_control(&mut self, enabled: bool) {
        self.state.lock().adaptive_rate_control = Some(enabled);
    }

    fn set_adaptive_jitter_compensation(&mut self, enabled: bool) {
        self.state.lock().adaptive_jitter_compensation = Some(enabled);
    }

    fn set_bandwidth_limits(&mut self, upload_kbps: Option<u32>, download_kbps: Option<u32>) {
        self.state.lock().bandwidth = Some((upload_kbps, download_kbps));
    }

    fn audio_codecs(&self) -> Vec<AudioCodec> {
        self.state.lock().codecs.clone()
    }

    fn set_codec_enabled(&mut self, mime_type: &str, enabled: bool) -> Result<(), EngineError> {
        let mut s = self.state.lock();
        let codec = s
            .codecs
            .iter_mut()
            .find(|c| c.mime_type.eq_ignore_ascii_case(mime_type))
            .ok_or_else(|| EngineError::rejected("set_codec_enabled", mime_type))?;
        codec.enabled = enabled;
        Ok(())
    }

    fn set_codec_bitrate(&mut self, mime_type: &str, bitrate_bps: u32) -> Result<(), EngineError> {
        let mut s = self.state.lock();
        let codec = s
            .codecs
            .iter_mut()
            .find(|c| c.mime_type.eq_ignore_ascii_case(mime_type))
            .ok_or_else(|| EngineError::rejected("set_codec_bitrate", mime_type))?;
        codec.normal_bitrate_bps = bitrate_bps;
        Ok(())
    }

    fn enable_log_collection(&mut self, path: &Path) -> Result<(), EngineError> {
        self.state.lock().log_path = Some(path.to_path_buf());
        Ok(())
    }

    fn clear_accounts(&mut self) {
        let mut s = self.state.lock();
        s.accounts.clear();
        s.default_account = None;
    }

    fn clear_auth_info(&mut self) {
        self.state.lock().auth.clear();
    }

    fn add_auth_info(&mut self, auth: AuthInfo) {
        self.state.lock().auth.push(auth);
    }

    fn add_account(&mut self, params: AccountParams) -> Result<AccountId, EngineError> {
        let mut s = self.state.lock();
        s.accounts.push(params);
        Ok(AccountId(s.accounts.len() as u64))
    }

    fn set_default_account(&mut self, account: AccountId) -> Result<(), EngineError> {
        self.state.lock().default_account = Some(account);
        Ok(())
    }

    fn invite(&mut self, address: &SipAddress, _params: CallParams) -> Result<EngineCallId, EngineError> {
        let mut s = self.state.lock();
        if s.refuse_invites {
            return Err(EngineError::invite_failed("refused by test"));
        }
        s.invites.push(address.clone());
        s.next_call += 1;
        let call = EngineCallId(s.next_call);
        s.current_call = Some(call);
        Ok(call)
    }

    fn terminate_current_call(&mut self) -> bool {
        let mut s = self.state.lock();
        s.terminations += 1;
        s.current_call.is_some()
    }

    fn current_call_duration(&self) -> Option<u32> {
        let s = self.state.lock();
        s.current_call.and(s.duration)
    }

    fn set_mic_enabled(&mut self, enabled: bool) {
        self.state.lock().mic_enabled = Some(enabled);
    }

    fn audio_devices(&self) -> Vec<AudioDevice> {
        self.state.lock().devices.clone()
    }

    fn set_input_audio_device(&mut self, device: &AudioDevice) {
        self.state.lock().input_device = Some(device.id.clone());
    }

    fn set_output_audio_device(&mut self, device: &AudioDevice) {
        self.state.lock().output_device = Some(device.id.clone());
    }
}

/// Wait until `rx` holds a value matching `predicate`
pub async fn wait_until<T>(rx: &mut watch::Receiver<T>, predicate: impl FnMut(&T) -> bool) {
    timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for state")
        .expect("state cell closed");
}

/// Wait until the mock engine's state matches `predicate`
pub async fn wait_for_engine(control: &MockControl, mut predicate: impl FnMut(&MockState) -> bool) {
    timeout(WAIT, async {
        while !control.with(|s| predicate(&*s)) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for engine");
}
