use std::path::PathBuf;

/// Where a bot's heuristic comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotSource {
    Builtin,
    Script(PathBuf),
}

/// One discovered bot and what its last tick did
#[derive(Debug, Clone)]
pub struct BotEntry {
    pub name: String,
    pub description: String,
    pub source: BotSource,
    /// Owner of the command file. At most one entry is active.
    pub active: bool,
    pub status: String,
    pub error: Option<String>,
    pub last_seen: Option<String>,
    pub ticks: u64,
}

impl BotEntry {
    pub fn new(name: &str, description: &str, source: BotSource) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            source,
            active: false,
            status: String::new(),
            error: None,
            last_seen: None,
            ticks: 0,
        }
    }

    pub fn clear_status(&mut self) {
        self.status.clear();
        self.error = None;
        self.last_seen = None;
        self.ticks = 0;
    }
}

/// Control message from TUI to orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Hand the command file to the bot at this index.
    Select(usize),
    StartStop,
    Restart,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Running,
    Stopped,
}
