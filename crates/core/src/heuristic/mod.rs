pub mod builtin;

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::command::Command;
use crate::snapshot::Snapshot;

pub use builtin::{AfkWizard, FixedCycle, HealthGuard};

/// A decision rule mapping one snapshot to an ordered batch of commands.
/// Rules are deterministic apart from an optional seeded rng.
pub trait Heuristic {
    fn decide(&mut self, snapshot: &Snapshot) -> Vec<Command>;

    /// Called once when the owning loop is torn down.
    fn stop(&mut self) {}
}

impl<F> Heuristic for F
where
    F: FnMut(&Snapshot) -> Vec<Command>,
{
    fn decide(&mut self, snapshot: &Snapshot) -> Vec<Command> {
        self(snapshot)
    }
}

/// Loop parameters that belong to a bot rather than to the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct BotProfile {
    pub name: String,
    pub description: String,
    pub interval: Duration,
    /// `None` runs until stopped.
    pub duration: Option<Duration>,
}

impl BotProfile {
    pub fn new(name: &str, description: &str, interval_secs: u64, duration_secs: Option<u64>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            interval: Duration::from_secs(interval_secs),
            duration: duration_secs.map(Duration::from_secs),
        }
    }
}

const BUILTINS: &[&str] = &["health-guard", "gardening", "afk-wizard", "loremaster", "farming", "bazaar"];

pub fn builtin_names() -> &'static [&'static str] {
    BUILTINS
}

/// Create a built-in bot by name. `seed` feeds bots that pick at random.
pub fn create_builtin(name: &str, seed: u64) -> Option<(BotProfile, Box<dyn Heuristic>)> {
    let name = name.trim().to_ascii_lowercase();
    let bot = match name.as_str() {
        "health-guard" => boxed(
            BotProfile::new("health-guard", "press VK_X while health is below 200", 5, None),
            HealthGuard::default(),
        ),
        "gardening" => boxed(
            BotProfile::new("gardening", "open the gardening book, cast, close", 3, Some(900)),
            FixedCycle::gardening(),
        ),
        "afk-wizard" => boxed(
            BotProfile::new("afk-wizard", "wander when mana is low, otherwise battle", 2, Some(3600)),
            AfkWizard::new(StdRng::seed_from_u64(seed)),
        ),
        "loremaster" => boxed(
            BotProfile::new("loremaster", "space and click the target", 2, Some(300)),
            FixedCycle::loremaster(),
        ),
        "farming" => boxed(
            BotProfile::new("farming", "interact with centre objects", 2, Some(300)),
            FixedCycle::farming(),
        ),
        "bazaar" => boxed(
            BotProfile::new("bazaar", "buy, confirm, refresh", 2, Some(300)),
            FixedCycle::bazaar(),
        ),
        _ => return None,
    };
    Some(bot)
}

fn boxed(profile: BotProfile, h: impl Heuristic + 'static) -> (BotProfile, Box<dyn Heuristic>) {
    (profile, Box::new(h))
}
