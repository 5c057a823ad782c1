use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const SLICE: Duration = Duration::from_millis(100);

/// `dur` with +/-30% random jitter.
pub fn jittered(dur: Duration) -> Duration {
    let secs = dur.as_secs_f64();
    let jitter = secs * 0.3;
    if jitter <= 0.0 {
        return dur;
    }
    let actual = secs + rand::thread_rng().gen_range(-jitter..jitter);
    Duration::from_secs_f64(actual.max(0.01))
}

/// Sleep for `dur` in short slices, returning early once `stop` is raised.
/// Returns true when woken by `stop`.
pub fn sleep_unless(dur: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + dur;
    loop {
        if stop.load(Ordering::Relaxed) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_in_band() {
        for _ in 0..50 {
            let d = jittered(Duration::from_secs(2));
            assert!(d >= Duration::from_millis(1400) && d <= Duration::from_millis(2600));
        }
        assert_eq!(jittered(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn raised_flag_wakes_immediately() {
        let stop = AtomicBool::new(true);
        let t = Instant::now();
        assert!(sleep_unless(Duration::from_secs(30), &stop));
        assert!(t.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn runs_to_deadline_without_flag() {
        let stop = AtomicBool::new(false);
        assert!(!sleep_unless(Duration::from_millis(150), &stop));
    }
}
