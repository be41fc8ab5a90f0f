//! Terminal rendering of client state and events

use colored::{ColoredString, Colorize};
use sipua_client_core::{CallHistoryEntry, CallState, ClientEvent, ClientHandle, RegistrationState};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Number")]
    number: String,
    #[tabled(rename = "When")]
    when: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn format_duration(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn history_table(entries: &[CallHistoryEntry]) -> String {
    if entries.is_empty() {
        return "no calls yet".dimmed().to_string();
    }
    let rows = entries.iter().enumerate().map(|(i, entry)| HistoryRow {
        index: i + 1,
        number: entry.number.clone(),
        when: entry
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        duration: format_duration(entry.duration_secs),
        status: entry.status.clone(),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

fn registration_label(state: RegistrationState) -> ColoredString {
    let text = state.to_string();
    match state {
        RegistrationState::Ok => text.green(),
        RegistrationState::Progress => text.yellow(),
        RegistrationState::Failed => text.red(),
        RegistrationState::None | RegistrationState::Cleared => text.dimmed(),
    }
}

fn call_label(state: Option<CallState>) -> ColoredString {
    match state {
        None => "idle".dimmed(),
        Some(CallState::Connected) => "Connected".green(),
        Some(state @ (CallState::Ended | CallState::Error)) => state.to_string().red(),
        Some(state) => state.to_string().yellow(),
    }
}

fn on_off(flag: bool) -> ColoredString {
    if flag { "on".cyan() } else { "off".dimmed() }
}

pub fn status(client: &ClientHandle) -> String {
    format!(
        "registration: {}  call: {} {}  mute: {}  speaker: {}",
        registration_label(client.registration_state()),
        call_label(client.call_state()),
        format_duration(client.call_duration()),
        on_off(client.is_muted()),
        on_off(client.is_speaker_on()),
    )
}

/// One line per event worth showing; `None` for events the prompt ignores
pub fn event_line(event: &ClientEvent) -> Option<String> {
    let line = match event {
        ClientEvent::RegistrationChanged { state, message } if message.is_empty() => {
            format!("registration {}", registration_label(*state))
        }
        ClientEvent::RegistrationChanged { state, message } => {
            format!("registration {} ({})", registration_label(*state), message)
        }
        ClientEvent::RegistrationRejected { reason } => {
            format!("{} {}", "registration refused:".red(), reason)
        }
        ClientEvent::CallStateChanged { current: None, .. } => return None,
        ClientEvent::CallStateChanged { current, .. } => format!("call {}", call_label(*current)),
        ClientEvent::CallRecorded(entry) => format!(
            "call to {} finished after {} ({})",
            entry.number,
            format_duration(entry.duration_secs),
            entry.status
        ),
        ClientEvent::CallRejected { reason, .. } => format!("{} {}", "dial refused:".red(), reason),
        ClientEvent::CallSetupFailed { destination, reason } => {
            format!("{} {}: {}", "could not dial".red(), destination, reason)
        }
        ClientEvent::MediaChanged(flags) => format!(
            "mute {}  speaker {}",
            on_off(flags.is_muted),
            on_off(flags.is_speaker_on)
        ),
    };
    Some(line)
}
