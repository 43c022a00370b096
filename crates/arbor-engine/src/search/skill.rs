//! Strength limiting: choose a weaker principal variation on purpose.
//!
//! Below full strength the search runs with at least [`SKILL_MULTI_PV`]
//! lines and [`pick_line`] trades score for randomness. The lower the
//! level, the further from the best line the choice may stray.

use rand::Rng;

use crate::config::MAX_SKILL_LEVEL;
use crate::search::PvLine;

/// Lines searched when the skill level is below the maximum.
pub const SKILL_MULTI_PV: usize = 4;

/// Largest score gap, in centipawns, that randomness can bridge.
const MAX_SKILL_SPREAD: i32 = 100;

/// Index into `lines` (best first) of the line a player of `level` plays.
///
/// Each line gets a bonus that grows with its distance from the best score
/// and with a random draw. Full strength always returns 0.
pub fn pick_line(lines: &[PvLine], level: u8, rng: &mut impl Rng) -> usize {
    if level >= MAX_SKILL_LEVEL || lines.len() < 2 {
        return 0;
    }
    let weakness = 120 - 2 * i32::from(level);
    let top = lines[0].score;
    let spread = lines
        .last()
        .map_or(0, |line| (top - line.score).min(MAX_SKILL_SPREAD));

    let mut chosen = 0;
    let mut chosen_value = i32::MIN;
    for (index, line) in lines.iter().enumerate() {
        let push = (weakness * (top - line.score) + spread * rng.gen_range(0..weakness)) / 128;
        let value = line.score + push;
        if value > chosen_value {
            chosen = index;
            chosen_value = value;
        }
    }
    chosen
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn lines(scores: &[i32]) -> Vec<PvLine> {
        scores
            .iter()
            .map(|&score| PvLine {
                score,
                depth: 6,
                pv: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn full_strength_plays_the_best_line() {
        let mut rng = StdRng::seed_from_u64(7);
        let close = lines(&[10, 0, -5, -10]);
        for _ in 0..100 {
            assert_eq!(pick_line(&close, MAX_SKILL_LEVEL, &mut rng), 0);
        }
    }

    #[test]
    fn a_single_line_is_always_played() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(pick_line(&lines(&[35]), 0, &mut rng), 0);
        assert_eq!(pick_line(&[], 0, &mut rng), 0);
    }

    #[test]
    fn low_skill_sometimes_strays_from_close_lines() {
        let mut rng = StdRng::seed_from_u64(7);
        let close = lines(&[10, 0, -5, -10]);
        let picks: Vec<usize> = (0..200).map(|_| pick_line(&close, 0, &mut rng)).collect();
        assert!(picks.iter().all(|&i| i < close.len()));
        assert!(picks.iter().any(|&i| i != 0), "{picks:?}");
    }

    #[test]
    fn middling_skill_does_not_throw_away_a_queen() {
        let mut rng = StdRng::seed_from_u64(7);
        let lopsided = lines(&[900, 0, -20]);
        for _ in 0..200 {
            assert_eq!(pick_line(&lopsided, 10, &mut rng), 0);
        }
    }
}
