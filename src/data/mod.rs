pub mod items;
pub mod monsters;

use bracket_random::prelude::RandomNumberGenerator;

/// Picks an entry with probability proportional to its weight. Entries with
/// zero weight are never returned.
pub fn weighted_pick<'a, T, F>(
    entries: &'a [T],
    weight: F,
    rng: &mut RandomNumberGenerator,
) -> Option<&'a T>
where
    F: Fn(&T) -> u32,
{
    let total: u32 = entries.iter().map(&weight).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.range(0, total);
    for entry in entries {
        let w = weight(entry);
        if roll < w {
            return Some(entry);
        }
        roll -= w;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_weight_entries_are_skipped() {
        let entries = [("never", 0), ("always", 3), ("also never", 0)];
        let mut rng = RandomNumberGenerator::seeded(11);
        for _ in 0..100 {
            let picked = weighted_pick(&entries, |e| e.1, &mut rng).map(|e| e.0);
            assert_eq!(picked, Some("always"));
        }
    }

    #[test]
    fn empty_or_weightless_tables_yield_nothing() {
        let mut rng = RandomNumberGenerator::seeded(1);
        let empty: [(&str, u32); 0] = [];
        assert!(weighted_pick(&empty, |e| e.1, &mut rng).is_none());
        assert!(weighted_pick(&[("a", 0)], |e| e.1, &mut rng).is_none());
    }

    #[test]
    fn heavier_entries_win_more_often() {
        let entries = [("common", 90), ("rare", 10)];
        let mut rng = RandomNumberGenerator::seeded(42);
        let common = (0..2000)
            .filter(|_| weighted_pick(&entries, |e| e.1, &mut rng).map(|e| e.0) == Some("common"))
            .count();
        assert!(common > 1500, "common picked {common} times");
    }
}
