use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::bridge::{BridgeLoop, TickOutcome};
use crate::heuristic::{self, BotProfile, Heuristic};
use crate::lua_rt::LuaBot;
use crate::settings::Settings;
use crate::types::*;
use crate::logger;

/// Recursively find all directories containing `main.lua` under `dir`.
pub fn find_bot_dirs(dir: &Path) -> Vec<PathBuf> {
    let mut results = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return results,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            if !name.starts_with('.') {
                let main_lua = path.join("main.lua");
                if main_lua.is_file() {
                    results.push(main_lua);
                } else {
                    results.extend(find_bot_dirs(&path));
                }
            }
        }
    }
    results.sort();
    results
}

/// Derive bot name from main.lua path: bots/wizard/heal/main.lua -> wizard/heal
pub fn derive_bot_name(path: &Path, root: &Path) -> String {
    let bot_dir = path.parent().unwrap_or(path);
    let rel = bot_dir.strip_prefix(root).unwrap_or(bot_dir);
    rel.to_string_lossy().replace('\\', "/")
}

/// Built-in bots followed by every script under `bots_dir`. A script whose
/// name collides with an earlier bot is skipped.
pub fn load_bots(bots_dir: &Path) -> Vec<BotEntry> {
    let mut entries: Vec<BotEntry> = heuristic::builtin_names()
        .iter()
        .filter_map(|name| heuristic::create_builtin(name, 0))
        .map(|(profile, _)| BotEntry::new(&profile.name, &profile.description, BotSource::Builtin))
        .collect();

    for path in find_bot_dirs(bots_dir) {
        let name = derive_bot_name(&path, bots_dir);
        if entries.iter().any(|e| e.name == name) {
            logger::warn(&format!("bot {} shadows an existing bot, skipped", name));
            continue;
        }
        match LuaBot::load_meta(&path) {
            Ok(meta) => entries.push(BotEntry::new(&name, &meta.description, BotSource::Script(path))),
            Err(e) => logger::error(&format!("failed to load bot {}: {}", name, e)),
        }
    }

    entries
}

/// Instantiate the heuristic behind `entry`.
pub fn create_heuristic(entry: &BotEntry, seed: u64) -> Result<(BotProfile, Box<dyn Heuristic>)> {
    match &entry.source {
        BotSource::Builtin => heuristic::create_builtin(&entry.name, seed)
            .ok_or_else(|| anyhow!("unknown built-in bot {}", entry.name)),
        BotSource::Script(path) => {
            let meta = LuaBot::load_meta(path)?;
            let bot: Box<dyn Heuristic> = Box::new(LuaBot::new(path, &entry.name)?);
            Ok((meta.profile(&entry.name), bot))
        }
    }
}

/// Mark the entry called `name` as the single command writer.
pub fn select_bot(entries: &mut [BotEntry], name: &str) -> Option<usize> {
    let idx = entries.iter().position(|e| e.name == name)?;
    for (i, e) in entries.iter_mut().enumerate() {
        e.active = i == idx;
    }
    Some(idx)
}

/// The running bridge loop for the active bot.
struct Worker {
    name: String,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// The heuristic is built on the worker thread: Lua states stay on the
    /// thread that created them.
    fn spawn(entry: BotEntry, settings: Settings, state: Arc<Mutex<Vec<BotEntry>>>) -> Worker {
        let stop = Arc::new(AtomicBool::new(false));
        let name = entry.name.clone();
        let flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            let tag = entry.name.clone();
            logger::register_prefix(&tag, logger::COLOR_GREEN);
            let seed = settings.seed_or_random();
            let (profile, heuristic) = match create_heuristic(&entry, seed) {
                Ok(bot) => bot,
                Err(e) => {
                    logger::error_p(&tag, &format!("failed to start: {}", e));
                    update(&state, &tag, |b| b.error = Some(e.to_string()));
                    return;
                }
            };

            let mut bridge = BridgeLoop::new(settings.paths(), profile, heuristic).configured(&settings);
            let result = bridge.run_with(&flag, |tick, seen| {
                update(&state, &tag, |b| {
                    b.ticks += 1;
                    b.last_seen = seen.map(str::to_string);
                    match tick {
                        Ok(TickOutcome::Wrote(n)) => {
                            b.status = format!("wrote {}", n);
                            b.error = None;
                        }
                        Ok(TickOutcome::DryRun(n)) => {
                            b.status = format!("dry run {}", n);
                            b.error = None;
                        }
                        Ok(TickOutcome::Idle) => {
                            b.status = "idle".to_string();
                            b.error = None;
                        }
                        Err(e) => b.error = Some(e.to_string()),
                    }
                });
            });

            match result {
                Ok(summary) => update(&state, &tag, |b| {
                    b.status = format!("done after {} tick(s)", summary.ticks);
                }),
                Err(e) => update(&state, &tag, |b| b.error = Some(e.to_string())),
            }
        });

        Worker { name, stop, handle }
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn shutdown(self) {
        self.stop.store(true, Ordering::Relaxed);
        if self.handle.join().is_err() {
            logger::error(&format!("worker for {} panicked", self.name));
        }
    }
}

fn update(state: &Mutex<Vec<BotEntry>>, name: &str, f: impl FnOnce(&mut BotEntry)) {
    if let Ok(mut entries) = state.lock() {
        if let Some(entry) = entries.iter_mut().find(|e| e.name == name) {
            f(entry);
        }
    }
}

fn set_state(orch_state: &Mutex<OrchestratorState>, to: OrchestratorState) {
    if let Ok(mut s) = orch_state.lock() {
        *s = to;
    }
}

/// Start a worker for the active entry, if there is one.
fn start_active(state: &Arc<Mutex<Vec<BotEntry>>>, settings: &Settings) -> Option<Worker> {
    let entry = {
        let mut entries = state.lock().ok()?;
        let entry = entries.iter_mut().find(|e| e.active)?;
        entry.clear_status();
        entry.clone()
    };
    logger::info(&format!("{} now owns {}", entry.name, settings.paths().commands.display()));
    Some(Worker::spawn(entry, settings.clone(), Arc::clone(state)))
}

/// Main orchestration loop. Runs on a background thread and keeps at most
/// one bridge loop alive, so only one bot ever writes the command file.
pub fn orchestrate(
    state: Arc<Mutex<Vec<BotEntry>>>,
    orch_state: Arc<Mutex<OrchestratorState>>,
    mut settings: Settings,
    cmd_rx: mpsc::Receiver<Control>,
) {
    let mut worker: Option<Worker> = None;

    loop {
        match cmd_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(Control::Quit) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                logger::info("shutting down");
                if let Some(w) = worker.take() {
                    w.shutdown();
                }
                set_state(&orch_state, OrchestratorState::Stopped);
                return;
            }
            Ok(Control::Select(idx)) => {
                let selected = state.lock().ok().and_then(|mut entries| {
                    let name = entries.get(idx)?.name.clone();
                    select_bot(&mut entries, &name).map(|_| name)
                });
                let Some(name) = selected else { continue };
                if worker.as_ref().is_some_and(|w| w.name == name) {
                    continue;
                }
                logger::info(&format!("selected {}", name));
                settings.active_bot = Some(name);
                if let Some(w) = worker.take() {
                    w.shutdown();
                    worker = start_active(&state, &settings);
                }
            }
            Ok(Control::StartStop) => {
                if let Some(w) = worker.take() {
                    w.shutdown();
                    set_state(&orch_state, OrchestratorState::Stopped);
                    logger::info("orchestrator stopped");
                } else {
                    worker = start_active(&state, &settings);
                    if worker.is_some() {
                        set_state(&orch_state, OrchestratorState::Running);
                        logger::info("orchestrator started");
                    } else {
                        logger::warn("select a bot before starting");
                    }
                }
            }
            Ok(Control::Restart) => {
                if let Some(w) = worker.take() {
                    logger::info(&format!("restarting bot {}", w.name));
                    w.shutdown();
                    worker = start_active(&state, &settings);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        // A bot with a run budget ends on its own
        if worker.as_ref().is_some_and(Worker::is_finished) {
            if let Some(w) = worker.take() {
                logger::info(&format!("{} finished", w.name));
                w.shutdown();
            }
            set_state(&orch_state, OrchestratorState::Stopped);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("snapbridge-orch-{}-{}", name, std::process::id()));
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn discovers_builtins_and_nested_scripts() {
        let root = scratch("discover");
        let bots = root.join("bots");
        fs::create_dir_all(bots.join("wizard").join("heal")).unwrap();
        fs::write(
            bots.join("wizard").join("heal").join("main.lua"),
            r#"return { description = "heal", decide = function(s) return {} end }"#,
        ).unwrap();
        fs::create_dir_all(bots.join("broken")).unwrap();
        fs::write(bots.join("broken").join("main.lua"), "return {}").unwrap();

        let entries = load_bots(&bots);
        assert_eq!(entries.len(), heuristic::builtin_names().len() + 1);
        let script = entries.last().unwrap();
        assert_eq!(script.name, "wizard/heal");
        assert_eq!(script.description, "heal");
        assert!(matches!(script.source, BotSource::Script(_)));
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn selecting_is_exclusive() {
        let mut entries = load_bots(Path::new("/nonexistent/bots"));
        select_bot(&mut entries, "gardening").unwrap();
        select_bot(&mut entries, "bazaar").unwrap();
        let active: Vec<_> = entries.iter().filter(|e| e.active).map(|e| e.name.as_str()).collect();
        assert_eq!(active, vec!["bazaar"]);
        assert!(select_bot(&mut entries, "missing").is_none());
    }

    #[test]
    fn start_stop_drives_one_writer() {
        let root = scratch("drive");
        let settings = Settings { cache_dir: root.join("cache"), ..Settings::default() };
        fs::create_dir_all(&settings.cache_dir).unwrap();
        fs::write(settings.paths().snapshot, r#"{"Health": {"Current": 50}}"#).unwrap();

        let mut entries = load_bots(&root.join("bots"));
        select_bot(&mut entries, "health-guard").unwrap();
        let state = Arc::new(Mutex::new(entries));
        let orch_state = Arc::new(Mutex::new(OrchestratorState::Stopped));
        let (tx, rx) = mpsc::channel();

        let (s, o, cfg) = (Arc::clone(&state), Arc::clone(&orch_state), settings.clone());
        let handle = thread::spawn(move || orchestrate(s, o, cfg, rx));

        tx.send(Control::StartStop).unwrap();
        let mut wrote = false;
        for _ in 0..50 {
            thread::sleep(Duration::from_millis(20));
            if settings.paths().commands.exists() {
                wrote = true;
                break;
            }
        }
        assert!(wrote);
        assert_eq!(*orch_state.lock().unwrap(), OrchestratorState::Running);

        tx.send(Control::Quit).unwrap();
        handle.join().unwrap();
        assert_eq!(*orch_state.lock().unwrap(), OrchestratorState::Stopped);
        let guard = state.lock().unwrap();
        let entry = guard.iter().find(|e| e.name == "health-guard").unwrap();
        assert!(entry.ticks >= 1);
        fs::remove_dir_all(&root).ok();
    }
}
