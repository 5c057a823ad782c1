//! Scratch cache directories for the scenario harness.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use snapbridge_core::bridge::BridgePaths;
use snapbridge_core::settings::Settings;

static NEXT: AtomicUsize = AtomicUsize::new(0);

/// A cache directory under the system temp dir, removed on drop.
pub struct Cache {
    root: PathBuf,
    pub settings: Settings,
}

impl Cache {
    pub fn new(label: &str) -> Self {
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!("snapbridge-it-{}-{}-{}", label, std::process::id(), n));
        fs::remove_dir_all(&root).ok();
        fs::create_dir_all(&root).expect("create scratch dir");
        let settings = Settings { cache_dir: root.join(".cache"), ..Settings::default() };
        Self { root, settings }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> BridgePaths {
        self.settings.paths()
    }

    /// Write the snapshot file the way the observer would.
    pub fn put_snapshot(&self, text: &str) {
        let path = self.paths().snapshot;
        fs::create_dir_all(path.parent().expect("snapshot has a parent")).expect("create cache dir");
        fs::write(path, text).expect("write snapshot");
    }

    pub fn commands_text(&self) -> Option<String> {
        fs::read_to_string(self.paths().commands).ok()
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.root).ok();
    }
}
