//! Editor commands read from stdin
//!
//! One JSON object per line, tagged by `command`:
//!
//! ```json
//! {"command":"build","comment":"bump base image"}
//! {"command":"source_edited","start_line":1,"end_line":1,"text":"b","full_text":"FROM base\nRUN ab\n"}
//! {"command":"highlight","index":2}
//! ```

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

use serde::Deserialize;

use super::SessionEvent;

/// A command from the editor side
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditorCommand {
    Build {
        #[serde(default)]
        comment: String,
    },
    SourceEdited {
        start_line: usize,
        end_line: usize,
        text: String,
        full_text: String,
    },
    DocumentChanged {
        path: PathBuf,
        content: String,
    },
    Focus {
        source_active: bool,
    },
    ScrollToLine {
        index: usize,
    },
    Highlight {
        index: usize,
    },
    ClearHighlight {
        index: usize,
    },
    HistorySelected {
        index: usize,
    },
    Shutdown,
}

impl From<EditorCommand> for SessionEvent {
    fn from(command: EditorCommand) -> Self {
        match command {
            EditorCommand::Build { comment } => SessionEvent::BuildRequested { comment },
            EditorCommand::SourceEdited {
                start_line,
                end_line,
                text,
                full_text,
            } => SessionEvent::SourceEdited {
                start_line,
                end_line,
                text,
                full_text,
            },
            EditorCommand::DocumentChanged { path, content } => {
                SessionEvent::DocumentChanged { path, content }
            }
            EditorCommand::Focus { source_active } => SessionEvent::FocusChanged { source_active },
            EditorCommand::ScrollToLine { index } => SessionEvent::ScrollToLine { index },
            EditorCommand::Highlight { index } => SessionEvent::Highlight { index },
            EditorCommand::ClearHighlight { index } => SessionEvent::ClearHighlight { index },
            EditorCommand::HistorySelected { index } => SessionEvent::HistorySelected { index },
            EditorCommand::Shutdown => SessionEvent::Shutdown,
        }
    }
}

/// Parse one command line; blank lines yield `None`
pub fn parse_command(line: &str) -> Option<serde_json::Result<EditorCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str(line))
}

/// Forward commands from `reader` to the session until EOF, then shut it down
pub fn spawn_command_reader<R>(reader: R, tx: Sender<SessionEvent>) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    std::thread::spawn(move || {
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("Failed to read command: {}", e);
                    break;
                }
            };
            match parse_command(&line) {
                None => {}
                Some(Ok(command)) => {
                    if tx.send(command.into()).is_err() {
                        return;
                    }
                }
                Some(Err(e)) => tracing::warn!("Ignoring malformed command {:?}: {}", line, e),
            }
        }
        tracing::debug!("Command input closed");
        let _ = tx.send(SessionEvent::Shutdown);
    })
}
