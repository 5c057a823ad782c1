use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use crossterm::{
    execute,
    event::{EnableMouseCapture, DisableMouseCapture},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use snapbridge_core::bridge::BridgeLoop;
use snapbridge_core::snapshot::read_snapshot;
use snapbridge_core::types::{BotSource, Control, OrchestratorState};
use snapbridge_core::{logger, orchestrator, settings::Settings};

#[derive(Parser)]
#[command(author, version, about = "Drive game bots through shared snapshot/command files")]
struct Cli {
    /// Settings file, created by the TUI when a bot is selected
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Overrides the cache directory holding snapshot.json and commands.json
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[arg(long, default_value = "bots")]
    bots_dir: PathBuf,

    #[arg(long, default_value = "logs")]
    logs_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Interactive bot picker (default)
    Tui,
    /// Run one bot headless, logging to stdout
    Run {
        /// Bot name; defaults to the active bot from settings
        bot: Option<String>,
        /// Run budget in seconds, replacing the bot's own
        #[arg(long, conflicts_with = "forever")]
        duration: Option<u64>,
        /// Ignore the bot's run budget
        #[arg(long)]
        forever: bool,
        /// Seconds between ticks
        #[arg(long)]
        interval: Option<f64>,
        /// Tick once and exit; a failed read is an error
        #[arg(long)]
        once: bool,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List built-in and scripted bots
    List,
    /// Parse and print the current snapshot
    Snapshot {
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.settings);
    if let Some(dir) = &cli.cache_dir {
        settings.cache_dir = dir.clone();
    }

    match cli.command.unwrap_or(Cmd::Tui) {
        Cmd::Tui => {
            logger::init(&cli.logs_dir, false).context("opening log file")?;
            run_tui(settings, &cli.settings, &cli.bots_dir)
        }
        Cmd::Run { bot, duration, forever, interval, once, dry_run, seed } => {
            logger::init(&cli.logs_dir, true).context("opening log file")?;
            if dry_run {
                settings.dry_run = true;
            }
            if seed.is_some() {
                settings.seed = seed;
            }
            let overrides = Overrides { duration, forever, interval };
            run_headless(settings, &cli.bots_dir, bot, overrides, once)
        }
        Cmd::List => {
            for entry in orchestrator::load_bots(&cli.bots_dir) {
                let kind = match entry.source {
                    BotSource::Builtin => "builtin",
                    BotSource::Script(_) => "lua",
                };
                let mark = if settings.active_bot.as_deref() == Some(entry.name.as_str()) { "*" } else { " " };
                println!("{} {:<20} {:<8} {}", mark, entry.name, kind, entry.description);
            }
            Ok(())
        }
        Cmd::Snapshot { path } => {
            let path = path.unwrap_or_else(|| settings.paths().snapshot);
            let snap = read_snapshot(&path)?;
            println!("Health:   {:?}", snap.health);
            println!("Mana:     {:?}", snap.mana);
            println!("Energy:   {:?}", snap.energy);
            println!("Gold:     {:?}", snap.gold);
            println!("Potions:  {:?}", snap.potions);
            println!("Warnings: {:?}", snap.warnings);
            if let Some(at) = snap.captured_at {
                println!("Captured: {}", at.to_rfc3339());
            }
            Ok(())
        }
    }
}

struct Overrides {
    duration: Option<u64>,
    forever: bool,
    interval: Option<f64>,
}

fn run_headless(settings: Settings, bots_dir: &Path, bot: Option<String>, o: Overrides, once: bool) -> Result<()> {
    let name = bot
        .or_else(|| settings.active_bot.clone())
        .ok_or_else(|| anyhow!("no bot given and no active_bot in settings"))?;
    let entries = orchestrator::load_bots(bots_dir);
    let entry = entries
        .iter()
        .find(|e| e.name == name)
        .ok_or_else(|| anyhow!("unknown bot {}; try `list`", name))?;

    let seed = settings.seed_or_random();
    let (mut profile, heuristic) = orchestrator::create_heuristic(entry, seed)?;
    if let Some(secs) = o.interval {
        if !secs.is_finite() || secs <= 0.0 {
            bail!("--interval must be positive");
        }
        profile.interval = Duration::from_secs_f64(secs);
    }
    if o.forever {
        profile.duration = None;
    } else if let Some(secs) = o.duration {
        profile.duration = Some(Duration::from_secs(secs));
    }

    let mut bridge = BridgeLoop::new(settings.paths(), profile, heuristic).configured(&settings);
    if once {
        let outcome = bridge.tick()?;
        logger::info(&format!("{}: {:?}", name, outcome));
        return Ok(());
    }

    // Runs until the budget is spent or the process is killed
    let summary = bridge.run(&AtomicBool::new(false))?;
    logger::info(&format!("{} done in {:.0}s", name, summary.elapsed.as_secs_f64()));
    Ok(())
}

fn run_tui(settings: Settings, settings_path: &Path, bots_dir: &Path) -> Result<()> {
    let mut entries = orchestrator::load_bots(bots_dir);
    if let Some(active) = &settings.active_bot {
        if orchestrator::select_bot(&mut entries, active).is_none() {
            logger::warn(&format!("active bot {} not found", active));
        }
    }
    logger::info(&format!("loaded {} bot(s) from {}", entries.len(), bots_dir.display()));

    // Shared state
    let state = Arc::new(Mutex::new(entries));
    let orch_state = Arc::new(Mutex::new(OrchestratorState::Stopped));

    // Channels
    let (log_tx, log_rx) = mpsc::channel::<String>();
    let (cmd_tx, cmd_rx) = mpsc::channel::<Control>();

    // Wire logger to TUI
    logger::set_tui_sender(log_tx);
    logger::info("snapbridge started");

    // Spawn orchestrator on a background thread
    let orch_bot_state = Arc::clone(&state);
    let orch_run_state = Arc::clone(&orch_state);
    let orch_settings = settings.clone();
    let orch = thread::spawn(move || {
        orchestrator::orchestrate(orch_bot_state, orch_run_state, orch_settings, cmd_rx);
    });

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = snapbridge_tui::App::new(
        Arc::clone(&state),
        Arc::clone(&orch_state),
        log_rx,
        cmd_tx,
        settings,
        settings_path.to_path_buf(),
    );

    // Run TUI event loop on main thread
    let result = snapbridge_tui::event::run(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    // Dropping the app closes the control channel if the loop bailed early
    drop(app);
    if orch.join().is_err() {
        eprintln!("orchestrator thread panicked");
    }

    result
}
