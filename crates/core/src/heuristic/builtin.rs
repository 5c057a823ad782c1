//! Bots ported from the trainer's script library. Coordinates assume a
//! 1280x720 client window.

use rand::seq::SliceRandom;
use rand::Rng;

use super::Heuristic;
use crate::command::Command;
use crate::snapshot::Snapshot;

/// Presses one key while health sits below a threshold.
#[derive(Debug, Clone)]
pub struct HealthGuard {
    pub threshold: i64,
    pub key: String,
}

impl Default for HealthGuard {
    fn default() -> Self {
        Self { threshold: 200, key: "VK_X".to_string() }
    }
}

impl Heuristic for HealthGuard {
    fn decide(&mut self, snapshot: &Snapshot) -> Vec<Command> {
        match snapshot.health_current() {
            Some(hp) if hp < self.threshold => vec![Command::key_press(self.key.clone(), 0)],
            _ => Vec::new(),
        }
    }
}

/// Emits the same sequence every tick, whatever the snapshot says.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedCycle {
    steps: Vec<Command>,
}

impl FixedCycle {
    pub fn new(steps: Vec<Command>) -> Self {
        Self { steps }
    }

    pub fn gardening() -> Self {
        Self::new(vec![
            Command::key_press("G", 180),
            Command::click(820, 520, 180),
            Command::click(960, 520, 180),
            Command::key_press("ESCAPE", 200),
        ])
    }

    pub fn loremaster() -> Self {
        Self::new(vec![Command::key_press("SPACE", 100), Command::click(900, 500, 150)])
    }

    pub fn farming() -> Self {
        Self::new(vec![
            Command::click(900, 500, 140),
            Command::click(980, 560, 140),
            Command::key_press("SPACE", 160),
        ])
    }

    /// Buy, confirm, refresh.
    pub fn bazaar() -> Self {
        Self::new(vec![
            Command::click(1150, 620, 120),
            Command::click(1150, 660, 160),
            Command::click(1180, 420, 140),
        ])
    }
}

impl Heuristic for FixedCycle {
    fn decide(&mut self, _snapshot: &Snapshot) -> Vec<Command> {
        self.steps.clone()
    }
}

const WANDER_KEYS: [&str; 4] = ["W", "S", "A", "D"];
const WANDER_DELAY_MS: u32 = 400;

/// Wanders in a random direction while mana recovers, otherwise runs the
/// pass-then-spell battle clicks.
pub struct AfkWizard<R: Rng> {
    rng: R,
    pub mana_floor: i64,
}

impl<R: Rng> AfkWizard<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, mana_floor: 20 }
    }

    fn wander(&mut self) -> Command {
        let key = WANDER_KEYS.choose(&mut self.rng).copied().unwrap_or("W");
        Command::key_press(key, WANDER_DELAY_MS)
    }
}

impl<R: Rng> Heuristic for AfkWizard<R> {
    fn decide(&mut self, snapshot: &Snapshot) -> Vec<Command> {
        match snapshot.mana_current() {
            Some(mp) if mp < self.mana_floor => vec![self.wander()],
            _ => vec![Command::click(880, 610, 140), Command::click(980, 610, 140)],
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn snap(text: &str) -> Snapshot {
        Snapshot::from_json_str(text).unwrap()
    }

    #[test]
    fn health_guard_fires_below_threshold() {
        let mut h = HealthGuard::default();
        let low = snap(r#"{"Health": {"Current": 150, "Max": 500, "Confidence": 0.9}}"#);
        let high = snap(r#"{"Health": {"Current": 300, "Max": 500, "Confidence": 0.9}}"#);
        assert_eq!(h.decide(&low), vec![Command::key_press("VK_X", 0)]);
        assert!(h.decide(&high).is_empty());
    }

    #[test]
    fn health_guard_ignores_unknown_health() {
        let mut h = HealthGuard::default();
        assert!(h.decide(&snap("{}")).is_empty());
        assert!(h.decide(&snap(r#"{"Health": {"Max": 500}}"#)).is_empty());
    }

    #[test]
    fn fixed_cycles_ignore_snapshot() {
        let mut g = FixedCycle::gardening();
        let a = g.decide(&snap("{}"));
        let b = g.decide(&snap(r#"{"Health": {"Current": 1}}"#));
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert_eq!(a[3], Command::key_press("ESCAPE", 200));
    }

    #[test]
    fn afk_wizard_wanders_on_low_mana() {
        let mut bot = AfkWizard::new(StdRng::seed_from_u64(1));
        let low = snap(r#"{"Mana": {"Current": 5, "Max": 100}}"#);
        for _ in 0..20 {
            let batch = bot.decide(&low);
            assert_eq!(batch.len(), 1);
            match &batch[0] {
                Command::KeyPress { key, delay_ms } => {
                    assert!(WANDER_KEYS.contains(&key.as_str()));
                    assert_eq!(*delay_ms, WANDER_DELAY_MS);
                }
                other => panic!("expected key press, got {other:?}"),
            }
        }
    }

    #[test]
    fn afk_wizard_same_seed_same_walk() {
        let low = snap(r#"{"Mana": {"Current": 0}}"#);
        let mut a = AfkWizard::new(StdRng::seed_from_u64(42));
        let mut b = AfkWizard::new(StdRng::seed_from_u64(42));
        let walk_a: Vec<_> = (0..10).flat_map(|_| a.decide(&low)).collect();
        let walk_b: Vec<_> = (0..10).flat_map(|_| b.decide(&low)).collect();
        assert_eq!(walk_a, walk_b);
    }

    #[test]
    fn afk_wizard_battles_otherwise() {
        let mut bot = AfkWizard::new(StdRng::seed_from_u64(1));
        let expected = vec![Command::click(880, 610, 140), Command::click(980, 610, 140)];
        assert_eq!(bot.decide(&snap(r#"{"Mana": {"Current": 60}}"#)), expected);
        assert_eq!(bot.decide(&snap("{}")), expected);
    }
}
