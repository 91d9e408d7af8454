//! Terminal front end: reads commands, drives the session, prints updates.

pub mod command;
pub mod render;

use std::sync::Arc;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::{ClientConfig, ConfigError};
use crate::domain::{MediaConstraints, NegotiationError, SenderName, ValueObjectError};
use crate::infrastructure::repository::HttpMessageStore;
use crate::infrastructure::rtc::{SampleTrackMedia, WebRtcPeerFactory};
use crate::infrastructure::signaling::WsConnector;
use crate::usecase::{Intent, SessionConfig, SessionController, SessionDeps, SessionError};
use command::{Command, HELP};
use render::{status_lines, update_lines};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid display name: {0}")]
    Name(#[from] ValueObjectError),

    #[error("Failed to set up WebRTC: {0}")]
    Rtc(#[from] NegotiationError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Run the interactive client until the user quits.
pub async fn run_client(config: ClientConfig) -> Result<(), ClientError> {
    let ws_base_url = config.ws_base_url()?;
    let display_name = SenderName::new(config.name.clone())?;
    let deps = SessionDeps {
        store: Arc::new(HttpMessageStore::new(config.http_base_url())),
        connector: Arc::new(WsConnector::new(ws_base_url)),
        peers: Arc::new(WebRtcPeerFactory::new(config.ice_servers())?),
        media: Arc::new(SampleTrackMedia::new()),
    };
    let session_config = SessionConfig {
        display_name,
        reconnect_after: config.reconnect_after,
        media_constraints: MediaConstraints::default(),
    };

    let (handle, mut updates) = SessionController::spawn(session_config, deps);
    handle.send(Intent::JoinRoom(config.room.clone()))?;
    println!(
        "Connecting to {} as {}. Type /help for commands.",
        config.http_base_url(),
        config.name
    );

    let mut lines = spawn_line_reader();
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                match Command::parse(&line) {
                    Command::Quit => break,
                    Command::Help => println!("{HELP}"),
                    Command::Status => {
                        for line in status_lines(&handle.snapshot().await?) {
                            println!("{line}");
                        }
                    }
                    Command::Unknown(input) => println!("! Unknown command: {input} (try /help)"),
                    command => {
                        if let Some(intent) = command.into_intent() {
                            handle.send(intent)?;
                        }
                    }
                }
            }
            update = updates.recv() => {
                let Some(update) = update else { break };
                for line in update_lines(&update) {
                    println!("{line}");
                }
            }
        }
    }

    info!("Shutting down");
    handle.shutdown().await;
    Ok(())
}

/// Read lines on a blocking thread; Ctrl+C and Ctrl+D become `/quit`.
fn spawn_line_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                error!("Failed to start line editor: {e}");
                let _ = tx.send("/quit".to_string());
                return;
            }
        };
        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                    let _ = tx.send("/quit".to_string());
                    break;
                }
                Err(e) => {
                    error!("Failed to read input: {e}");
                    let _ = tx.send("/quit".to_string());
                    break;
                }
            }
        }
    });
    rx
}
