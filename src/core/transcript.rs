//! Conversation persistence: a pretty-printed JSON list of `{role, content}`
//! objects that round-trips exactly.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::core::message::Message;

#[derive(Debug)]
pub enum TranscriptError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for TranscriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptError::Read { path, source } => {
                write!(f, "Failed to read transcript {}: {}", path.display(), source)
            }
            TranscriptError::Parse { path, source } => {
                write!(
                    f,
                    "Transcript {} is not a valid conversation file: {}",
                    path.display(),
                    source
                )
            }
            TranscriptError::Write { path, source } => {
                write!(
                    f,
                    "Failed to write transcript {}: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl StdError for TranscriptError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TranscriptError::Read { source, .. } => Some(source),
            TranscriptError::Parse { source, .. } => Some(source),
            TranscriptError::Write { source, .. } => Some(source),
        }
    }
}

/// Save the conversation, replacing the file atomically.
pub fn save(path: &Path, messages: &[Message]) -> Result<(), TranscriptError> {
    let write_err = |source: std::io::Error| TranscriptError::Write {
        path: path.to_path_buf(),
        source,
    };

    let contents = serde_json::to_string_pretty(messages).map_err(|source| {
        TranscriptError::Write {
            path: path.to_path_buf(),
            source: std::io::Error::other(source),
        }
    })?;

    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).map_err(write_err)?;
    }

    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir).map_err(write_err)?,
        None => NamedTempFile::new().map_err(write_err)?,
    };
    temp_file.write_all(contents.as_bytes()).map_err(write_err)?;
    temp_file.write_all(b"\n").map_err(write_err)?;
    temp_file.as_file_mut().sync_all().map_err(write_err)?;
    temp_file.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

/// Load a conversation. Role strings are validated; anything outside
/// system/user/assistant is a parse error, not a crash.
pub fn load(path: &Path) -> Result<Vec<Message>, TranscriptError> {
    let contents = fs::read_to_string(path).map_err(|source| TranscriptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| TranscriptError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.json");
        let messages = vec![
            Message::system("S"),
            Message::user("hi"),
            Message::assistant("Hello"),
        ];

        save(&path, &messages).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, messages);
    }

    #[test]
    fn saved_transcript_is_human_readable_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.json");
        save(&path, &[Message::user("hi")]).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"role\": \"user\""));
        assert!(raw.contains("\"content\": \"hi\""));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        match load(&dir.path().join("nope.json")) {
            Err(TranscriptError::Read { .. }) => {}
            other => panic!("expected read error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn invalid_roles_fail_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.json");
        fs::write(&path, r#"[{"role":"wizard","content":"x"}]"#).unwrap();

        match load(&path) {
            Err(TranscriptError::Parse { .. }) => {}
            other => panic!("expected parse error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn overwriting_replaces_previous_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.json");
        save(&path, &[Message::user("first")]).unwrap();
        save(&path, &[Message::user("second")]).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, vec![Message::user("second")]);
    }
}
