//! Snapshot/command bridge between a game observer and an input injector.
//!
//! An external process keeps `snapshot.json` up to date; a bot reads it each
//! tick, decides on a batch of [`Command`]s and replaces `commands.json`,
//! which a separate injector consumes.

pub mod bridge;
pub mod command;
pub mod error;
pub mod heuristic;
pub mod logger;
pub mod lua_rt;
pub mod orchestrator;
pub mod settings;
pub mod sleep;
pub mod snapshot;
pub mod types;

pub use crate::bridge::{BridgeLoop, BridgePaths, RunSummary, TickOutcome};
pub use crate::command::{Command, encode_batch, parse_batch, read_batch, write_batch};
pub use crate::error::BridgeError;
pub use crate::heuristic::{BotProfile, Heuristic};
pub use crate::settings::Settings;
pub use crate::snapshot::{MetricPair, MetricSingle, Snapshot, read_snapshot};
