use std::path::PathBuf;
use std::sync::{Arc, Mutex, mpsc};

use snapbridge_core::logger;
use snapbridge_core::settings::Settings;
use snapbridge_core::types::{BotEntry, Control, OrchestratorState};

use crate::confirm::ConfirmDialog;

pub struct App {
    pub state: Arc<Mutex<Vec<BotEntry>>>,
    pub orch_state: Arc<Mutex<OrchestratorState>>,
    pub selected: usize,
    pub log_visible: bool,
    pub log_messages: Vec<String>,
    pub log_scroll: usize, // scroll offset from bottom (0 = latest)
    pub log_rx: mpsc::Receiver<String>,
    pub cmd_tx: mpsc::Sender<Control>,
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub confirm: Option<ConfirmDialog>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        state: Arc<Mutex<Vec<BotEntry>>>,
        orch_state: Arc<Mutex<OrchestratorState>>,
        log_rx: mpsc::Receiver<String>,
        cmd_tx: mpsc::Sender<Control>,
        settings: Settings,
        settings_path: PathBuf,
    ) -> Self {
        // Start with the cursor on the current writer
        let selected = state
            .lock()
            .ok()
            .and_then(|entries| entries.iter().position(|e| e.active))
            .unwrap_or(0);
        Self {
            state,
            orch_state,
            selected,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            log_rx,
            cmd_tx,
            settings,
            settings_path,
            confirm: None,
            should_quit: false,
        }
    }

    pub fn drain_logs(&mut self) {
        while let Ok(msg) = self.log_rx.try_recv() {
            self.log_messages.push(msg);
            if self.log_scroll > 0 {
                // keep the viewport pinned while reading history
                self.log_scroll += 1;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.orch_state.lock().map_or(false, |s| *s == OrchestratorState::Running)
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        let len = self.state.lock().map_or(0, |s| s.len());
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    /// Hand the command file to the bot under the cursor and remember the
    /// choice for the next launch.
    pub fn select_current(&mut self) {
        let name = self.state.lock().ok().and_then(|s| s.get(self.selected).map(|e| e.name.clone()));
        let Some(name) = name else { return };
        self.cmd_tx.send(Control::Select(self.selected)).ok();
        self.settings.active_bot = Some(name);
        if let Err(e) = self.settings.save(&self.settings_path) {
            logger::warn(&format!("could not save {}: {}", self.settings_path.display(), e));
        }
    }

    pub fn start_stop(&mut self) {
        self.cmd_tx.send(Control::StartStop).ok();
    }

    pub fn restart(&mut self) {
        self.cmd_tx.send(Control::Restart).ok();
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    /// Quit right away when idle, ask first while a bot is writing.
    pub fn request_quit(&mut self) {
        if self.is_running() {
            self.confirm = Some(ConfirmDialog::new("Stop the bridge and quit?"));
        } else {
            self.quit();
        }
    }

    pub fn answer_confirm(&mut self, yes: bool) {
        self.confirm = None;
        if yes {
            self.quit();
        }
    }

    pub fn quit(&mut self) {
        self.cmd_tx.send(Control::Quit).ok();
        self.should_quit = true;
    }
}
