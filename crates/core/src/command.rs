use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// One input action for the downstream injector. `delay_ms` is the pause the
/// injector should take after performing it; this crate never sleeps on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    KeyPress {
        key: String,
        #[serde(rename = "delayMs", default)]
        delay_ms: u32,
    },
    Click {
        x: i32,
        y: i32,
        #[serde(rename = "delayMs", default)]
        delay_ms: u32,
    },
    KeyDown {
        key: String,
        #[serde(rename = "delayMs", default)]
        delay_ms: u32,
    },
    KeyUp {
        key: String,
        #[serde(rename = "delayMs", default)]
        delay_ms: u32,
    },
    Delay {
        #[serde(rename = "delayMs", default)]
        delay_ms: u32,
    },
}

impl Command {
    pub fn key_press(key: impl Into<String>, delay_ms: u32) -> Self {
        Command::KeyPress { key: key.into(), delay_ms }
    }

    pub fn click(x: i32, y: i32, delay_ms: u32) -> Self {
        Command::Click { x, y, delay_ms }
    }

    pub fn delay_ms(&self) -> u32 {
        match self {
            Command::KeyPress { delay_ms, .. }
            | Command::Click { delay_ms, .. }
            | Command::KeyDown { delay_ms, .. }
            | Command::KeyUp { delay_ms, .. }
            | Command::Delay { delay_ms } => *delay_ms,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::KeyPress { key, delay_ms } => write!(f, "press {key} +{delay_ms}ms"),
            Command::Click { x, y, delay_ms } => write!(f, "click ({x},{y}) +{delay_ms}ms"),
            Command::KeyDown { key, delay_ms } => write!(f, "down {key} +{delay_ms}ms"),
            Command::KeyUp { key, delay_ms } => write!(f, "up {key} +{delay_ms}ms"),
            Command::Delay { delay_ms } => write!(f, "wait {delay_ms}ms"),
        }
    }
}

/// Compact JSON array. Equal batches always encode to equal bytes.
pub fn encode_batch(batch: &[Command]) -> Vec<u8> {
    // Serializing plain enums of strings and integers cannot fail.
    serde_json::to_vec(batch).unwrap_or_else(|_| b"[]".to_vec())
}

pub fn parse_batch(text: &str) -> Result<Vec<Command>> {
    serde_json::from_str(text).map_err(|e| BridgeError::malformed("<inline>", e))
}

/// Read back a command file, e.g. to inspect what the last tick produced.
pub fn read_batch(path: &Path) -> Result<Vec<Command>> {
    let bytes = fs::read(path).map_err(|e| BridgeError::from_io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| BridgeError::malformed(path, e))
}

/// Replace the command file at `path` with `batch`, creating the parent
/// directory if needed. The bytes go to a sibling temp file first and are
/// renamed over the target, so a reader sees either the old or the new batch.
pub fn write_batch(path: &Path, batch: &[Command]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| BridgeError::Io { path: dir.to_path_buf(), source: e })?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, encode_batch(batch)).map_err(|e| BridgeError::Io { path: tmp.clone(), source: e })?;
    fs::rename(&tmp, path).map_err(|e| {
        fs::remove_file(&tmp).ok();
        BridgeError::Io { path: path.to_path_buf(), source: e }
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("snapbridge-cmd-{}-{}", name, std::process::id()));
        fs::remove_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn wire_format_matches_injector() {
        let batch = vec![Command::key_press("VK_X", 0), Command::click(880, 610, 140)];
        let text = String::from_utf8(encode_batch(&batch)).unwrap();
        assert_eq!(
            text,
            r#"[{"type":"key_press","key":"VK_X","delayMs":0},{"type":"click","x":880,"y":610,"delayMs":140}]"#
        );
    }

    #[test]
    fn parses_what_it_writes() {
        let batch = vec![
            Command::key_press("G", 180),
            Command::click(820, 520, 180),
            Command::KeyDown { key: "W".into(), delay_ms: 400 },
            Command::KeyUp { key: "W".into(), delay_ms: 0 },
            Command::Delay { delay_ms: 250 },
        ];
        let text = String::from_utf8(encode_batch(&batch)).unwrap();
        assert_eq!(parse_batch(&text).unwrap(), batch);
    }

    #[test]
    fn missing_delay_defaults_to_zero() {
        let batch = parse_batch(r#"[{"type": "key_press", "key": "SPACE"}]"#).unwrap();
        assert_eq!(batch, vec![Command::key_press("SPACE", 0)]);
    }

    #[test]
    fn unknown_type_is_malformed() {
        assert!(matches!(parse_batch(r#"[{"type": "scroll"}]"#), Err(BridgeError::Malformed { .. })));
    }

    #[test]
    fn write_creates_dir_and_replaces_content() {
        let dir = scratch("replace");
        let path = dir.join("nested").join("commands.json");

        write_batch(&path, &[Command::click(1, 2, 3), Command::key_press("A", 0)]).unwrap();
        write_batch(&path, &[Command::key_press("B", 5)]).unwrap();

        assert_eq!(read_batch(&path).unwrap(), vec![Command::key_press("B", 5)]);
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().flatten().collect();
        assert_eq!(leftovers.len(), 1);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn same_batch_writes_identical_bytes() {
        let dir = scratch("idem");
        let path = dir.join("commands.json");
        let batch = vec![Command::click(1150, 620, 120), Command::click(1150, 660, 160)];

        write_batch(&path, &batch).unwrap();
        let first = fs::read(&path).unwrap();
        write_batch(&path, &batch).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
        fs::remove_dir_all(&dir).ok();
    }
}
