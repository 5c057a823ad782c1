use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bridge::BridgePaths;
use crate::logger;

pub const DEFAULT_CACHE_DIR: &str = ".cache";
pub const SNAPSHOT_FILE: &str = "snapshot.json";
pub const COMMAND_FILE: &str = "commands.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Shared directory holding both bridge files.
    pub cache_dir: PathBuf,
    pub snapshot_file: String,
    pub command_file: String,
    /// The one bot allowed to write the command file.
    pub active_bot: Option<String>,
    /// Metrics read with less confidence than this are treated as absent.
    pub min_confidence: f64,
    pub jitter: bool,
    /// Log batches instead of writing them.
    pub dry_run: bool,
    /// Warn when the snapshot's capture time is older than this.
    pub stale_after_secs: Option<u64>,
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            snapshot_file: SNAPSHOT_FILE.to_string(),
            command_file: COMMAND_FILE.to_string(),
            active_bot: None,
            min_confidence: 0.0,
            jitter: false,
            dry_run: false,
            stale_after_secs: None,
            seed: None,
        }
    }
}

impl Settings {
    /// Missing file gives defaults; an unreadable one is logged and also
    /// gives defaults.
    pub fn load(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&text) {
            Ok(s) => s,
            Err(e) => {
                logger::warn(&format!("ignoring {}: {}", path.display(), e));
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// The configured seed, or a fresh random one when none is set.
    pub fn seed_or_random(&self) -> u64 {
        self.seed.unwrap_or_else(|| rand::thread_rng().gen())
    }

    pub fn paths(&self) -> BridgePaths {
        BridgePaths {
            snapshot: self.cache_dir.join(&self.snapshot_file),
            commands: self.cache_dir.join(&self.command_file),
        }
    }
}
