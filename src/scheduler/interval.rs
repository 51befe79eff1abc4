// src/scheduler/interval.rs
//! Backlog-driven polling interval: the more raw articles wait, the sooner
//! the next cycle runs.

use std::time::Duration;

const MINUTE: u64 = 60;

/// Step table, highest backlog tier first: (min backlog, minutes).
const TIERS: &[(usize, u64)] = &[(50, 1), (20, 3), (10, 5), (1, 10)];
const IDLE_MINUTES: u64 = 20;

/// Delay until the next cycle for a raw backlog of `backlog` articles.
pub fn next_interval(backlog: usize) -> Duration {
    let minutes = TIERS
        .iter()
        .find(|(min, _)| backlog >= *min)
        .map(|(_, m)| *m)
        .unwrap_or(IDLE_MINUTES);
    Duration::from_secs(minutes * MINUTE)
}

/// Interval assumed before the first backlog count is known.
pub fn initial_interval() -> Duration {
    next_interval(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mins(n: usize) -> u64 {
        next_interval(n).as_secs() / 60
    }

    #[test]
    fn boundaries_match_table() {
        assert_eq!(mins(0), 20);
        assert_eq!(mins(1), 10);
        assert_eq!(mins(9), 10);
        assert_eq!(mins(10), 5);
        assert_eq!(mins(19), 5);
        assert_eq!(mins(20), 3);
        assert_eq!(mins(49), 3);
        assert_eq!(mins(50), 1);
        assert_eq!(mins(10_000), 1);
    }

    #[test]
    fn monotone_non_increasing() {
        let mut prev = next_interval(0);
        for n in 1..200 {
            let cur = next_interval(n);
            assert!(cur <= prev, "interval grew at backlog {n}");
            prev = cur;
        }
    }
}
