//! Line-oriented command loop on stdin

use anyhow::Result;
use colored::Colorize;
use sipua_client_core::{ClientEvent, ClientHandle, sanitize_dial_string};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::render;

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Dial(String),
    Hangup,
    Mute,
    Speaker,
    Status,
    History,
    Help,
    Quit,
}

impl ReplCommand {
    /// Parse a line; `Ok(None)` for a blank line
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match verb.to_ascii_lowercase().as_str() {
            "dial" | "call" => {
                let number = sanitize_dial_string(&rest.join(""));
                if number.is_empty() {
                    return Err("usage: dial <number>".to_string());
                }
                ReplCommand::Dial(number)
            }
            "hangup" | "end" => ReplCommand::Hangup,
            "mute" => ReplCommand::Mute,
            "speaker" => ReplCommand::Speaker,
            "status" => ReplCommand::Status,
            "history" => ReplCommand::History,
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" => ReplCommand::Quit,
            other => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

const HELP: &str = "\
commands:
  dial <number>   place a call (spaces, dashes and brackets are ignored)
  hangup          end the current call
  mute            toggle microphone mute
  speaker         toggle loudspeaker / earpiece
  status          show registration, call and audio state
  history         show recent calls
  quit            hang up and exit";

/// Run until `quit` or end of input, printing client events as they arrive
pub async fn run(client: ClientHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut events = client.subscribe_events();

    println!("{}", "type 'help' for commands".dimmed());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    break;
                };
                match ReplCommand::parse(&line) {
                    Ok(Some(ReplCommand::Quit)) => break,
                    Ok(Some(command)) => execute(&client, command)?,
                    Ok(None) => {}
                    Err(message) => println!("{}", message.yellow()),
                }
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event display fell behind"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.shutdown().await;
    Ok(())
}

fn execute(client: &ClientHandle, command: ReplCommand) -> Result<()> {
    match command {
        ReplCommand::Dial(number) => client.place_call(number)?,
        ReplCommand::Hangup => client.end_call()?,
        ReplCommand::Mute => client.toggle_mute()?,
        ReplCommand::Speaker => client.toggle_speaker()?,
        ReplCommand::Status => println!("{}", render::status(client)),
        ReplCommand::History => println!("{}", render::history_table(&client.call_history())),
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Quit => {}
    }
    Ok(())
}

fn print_event(event: &ClientEvent) {
    if let Some(line) = render::event_line(event) {
        println!("{}", line);
    }
}
