use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// One remote command. Encoded on the wire as a JSON object whose
/// `command` field selects the variant, e.g.
/// `{"command": "PLAY", "file": "/srv/clip.mp4", "duration": 5}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Command {
    #[serde(rename = "PLAY")]
    Play {
        file: PathBuf,
        /// Whole seconds; 0 means "no duration cap".
        #[serde(default)]
        duration: u64,
    },
    #[serde(rename = "STOP")]
    Stop,
    #[serde(rename = "EXIT")]
    Exit,
}

/// Response tokens. One byte-string per connection, then the connection
/// closes.
pub const ACK_OK: &[u8] = b"OK";
pub const ACK_ERROR: &[u8] = b"ERROR";

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to bind control socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed command payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("no player instance is listening at {0}")]
    NotRunning(PathBuf),
    #[error("command round-trip failed: {0}")]
    Io(#[from] io::Error),
    #[error("player rejected the command")]
    Rejected,
}

pub fn parse_command(payload: &[u8]) -> Result<Command, ChannelError> {
    Ok(serde_json::from_slice(payload)?)
}

pub fn encode_command(command: &Command) -> Result<Vec<u8>, ChannelError> {
    Ok(serde_json::to_vec(command)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_play_command_round_trip() {
        let cmd = Command::Play {
            file: PathBuf::from("/srv/media/clip.mp4"),
            duration: 5,
        };
        let bytes = encode_command(&cmd).unwrap();
        assert_eq!(parse_command(&bytes).unwrap(), cmd);
    }

    #[test]
    fn test_duration_defaults_to_zero() {
        let cmd = parse_command(br#"{"command": "PLAY", "file": "a.png"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Play {
                file: PathBuf::from("a.png"),
                duration: 0
            }
        );
    }

    #[test]
    fn test_unit_commands_parse() {
        assert_eq!(parse_command(br#"{"command": "STOP"}"#).unwrap(), Command::Stop);
        assert_eq!(parse_command(br#"{"command": "EXIT"}"#).unwrap(), Command::Exit);
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        assert!(parse_command(b"not json at all").is_err());
        assert!(parse_command(br#"{"command": "DANCE"}"#).is_err());
        assert!(parse_command(br#"{"file": "x.mp4"}"#).is_err());
    }
}
