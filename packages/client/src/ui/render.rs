//! Text rendering of session updates for the terminal.

use chrono::{DateTime, Local};

use crate::domain::{ChatMessage, Timestamp};
use crate::usecase::{CallStatus, SessionSnapshot, SessionUpdate};

fn clock(timestamp: Timestamp) -> String {
    DateTime::from_timestamp_millis(timestamp.value())
        .map(|dt| dt.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

pub fn message_line(message: &ChatMessage) -> String {
    let marker = if message.is_pending() { " (sending)" } else { "" };
    format!(
        "[{}] {}: {}{}",
        clock(message.created_at),
        message.sender,
        message.content,
        marker
    )
}

fn call_line(status: &CallStatus) -> String {
    match status {
        CallStatus::AcquiringMedia => "* Call: acquiring camera and microphone".to_string(),
        CallStatus::Phase(phase) => format!("* Call: {phase}"),
        CallStatus::Established => "* Call: negotiated".to_string(),
        CallStatus::Connection(state) => format!("* Call: connection {state}"),
        CallStatus::Ended => "* Call ended".to_string(),
        CallStatus::Failed(reason) => format!("* Call failed: {reason}"),
    }
}

/// Lines to print for an update. Confirmations only change the pending
/// marker, so they print nothing.
pub fn update_lines(update: &SessionUpdate) -> Vec<String> {
    match update {
        SessionUpdate::Channel(state) => vec![format!("* Signaling {state}")],
        SessionUpdate::TimelineReset(room_id) => vec![format!("=== Room {room_id} ===")],
        SessionUpdate::HistoryLoaded { messages, .. } => {
            let mut lines = vec![format!("* {} earlier messages", messages.len())];
            lines.extend(messages.iter().map(message_line));
            lines
        }
        SessionUpdate::MessageAppended(message) => vec![message_line(message)],
        SessionUpdate::MessageConfirmed(_) => Vec::new(),
        SessionUpdate::Call(status) => vec![call_line(status)],
        SessionUpdate::LocalMedia(stream) => {
            let kinds: Vec<String> = stream.tracks.iter().map(|t| t.kind.to_string()).collect();
            vec![format!("* Local media: {}", kinds.join(", "))]
        }
        SessionUpdate::RemoteTrack(track) => {
            vec![format!("* Remote {} track from stream {}", track.kind, track.stream_id)]
        }
        SessionUpdate::Notice(text) => vec![format!("! {text}")],
    }
}

pub fn status_lines(snapshot: &SessionSnapshot) -> Vec<String> {
    let room = snapshot
        .room_id
        .as_ref()
        .map_or_else(|| "(none)".to_string(), ToString::to_string);
    let pending = snapshot.messages.iter().filter(|m| m.is_pending()).count();
    vec![
        format!("Session:   {}", snapshot.session_id),
        format!("Name:      {}", snapshot.name),
        format!("Room:      {room}"),
        format!("Signaling: {}", snapshot.channel),
        format!("Call:      {}", snapshot.phase),
        format!(
            "Media:     {}",
            if snapshot.local_media_live { "live" } else { "off" }
        ),
        format!(
            "Messages:  {} ({} pending)",
            snapshot.messages.len(),
            pending
        ),
    ]
}
