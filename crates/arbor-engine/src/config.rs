//! Engine configuration.

use std::time::Duration;

/// Largest transposition table accepted, in megabytes.
pub const MAX_HASH_MB: usize = 65_536;
/// Largest worker count accepted.
pub const MAX_THREADS: usize = 256;
/// Largest number of principal variations reported per iteration.
pub const MAX_MULTI_PV: usize = 64;
/// Largest move overhead accepted.
pub const MAX_MOVE_OVERHEAD: Duration = Duration::from_secs(5);
/// Skill level of full-strength play; lower levels pick weaker lines.
pub const MAX_SKILL_LEVEL: u8 = 20;
/// Largest contempt accepted either way, in centipawns.
pub const MAX_CONTEMPT: i32 = 1000;

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("hash size {mb} MB is outside 1..={max}", max = MAX_HASH_MB)]
    HashSize { mb: usize },

    #[error("thread count {threads} is outside 1..={max}", max = MAX_THREADS)]
    Threads { threads: usize },

    #[error("multi-pv count {count} is outside 1..={max}", max = MAX_MULTI_PV)]
    MultiPv { count: usize },

    #[error("move overhead {overhead:?} exceeds {max:?}", max = MAX_MOVE_OVERHEAD)]
    MoveOverhead { overhead: Duration },

    #[error("skill level {level} is above {max}", max = MAX_SKILL_LEVEL)]
    SkillLevel { level: u8 },

    #[error("contempt {contempt} is outside -{max}..={max}", max = MAX_CONTEMPT)]
    Contempt { contempt: i32 },
}

/// Switches for every selective heuristic in the search.
///
/// [`PruningConfig::none`] reduces the search to plain PVS alpha-beta, which
/// returns exactly the minimax value of the fixed-depth tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruningConfig {
    pub quiescence: bool,
    pub tt_cutoffs: bool,
    pub mate_distance: bool,
    pub aspiration: bool,
    pub reverse_futility: bool,
    pub razoring: bool,
    pub null_move: bool,
    pub probcut: bool,
    pub iid: bool,
    pub futility: bool,
    pub late_move: bool,
    pub see_pruning: bool,
    pub delta: bool,
    pub check_extension: bool,
    pub singular_extension: bool,
    pub lmr: bool,
}

impl PruningConfig {
    /// Everything enabled.
    pub const fn all() -> Self {
        Self {
            quiescence: true,
            tt_cutoffs: true,
            mate_distance: true,
            aspiration: true,
            reverse_futility: true,
            razoring: true,
            null_move: true,
            probcut: true,
            iid: true,
            futility: true,
            late_move: true,
            see_pruning: true,
            delta: true,
            check_extension: true,
            singular_extension: true,
            lmr: true,
        }
    }

    /// Everything disabled, quiescence included: leaves are scored by the
    /// static evaluation.
    pub const fn none() -> Self {
        Self {
            quiescence: false,
            tt_cutoffs: false,
            mate_distance: false,
            aspiration: false,
            reverse_futility: false,
            razoring: false,
            null_move: false,
            probcut: false,
            iid: false,
            futility: false,
            late_move: false,
            see_pruning: false,
            delta: false,
            check_extension: false,
            singular_extension: false,
            lmr: false,
        }
    }
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self::all()
    }
}

/// Knobs adjustable between searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Transposition table size in megabytes.
    pub hash_mb: usize,
    /// Number of search threads, main thread included.
    pub threads: usize,
    /// Principal variations reported per iteration unless the limits override it.
    pub multi_pv: usize,
    /// Time reserved per move for communication lag.
    pub move_overhead: Duration,
    /// `0..=MAX_SKILL_LEVEL`; below the maximum the engine deliberately
    /// plays a weaker principal variation.
    pub skill_level: u8,
    /// Draw score offset in centipawns. Positive values make the engine
    /// avoid draws.
    pub contempt: i32,
    pub pruning: PruningConfig,
}

impl SearchConfig {
    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_HASH_MB).contains(&self.hash_mb) {
            return Err(ConfigError::HashSize { mb: self.hash_mb });
        }
        if !(1..=MAX_THREADS).contains(&self.threads) {
            return Err(ConfigError::Threads {
                threads: self.threads,
            });
        }
        if !(1..=MAX_MULTI_PV).contains(&self.multi_pv) {
            return Err(ConfigError::MultiPv {
                count: self.multi_pv,
            });
        }
        if self.move_overhead > MAX_MOVE_OVERHEAD {
            return Err(ConfigError::MoveOverhead {
                overhead: self.move_overhead,
            });
        }
        if self.skill_level > MAX_SKILL_LEVEL {
            return Err(ConfigError::SkillLevel {
                level: self.skill_level,
            });
        }
        if !(-MAX_CONTEMPT..=MAX_CONTEMPT).contains(&self.contempt) {
            return Err(ConfigError::Contempt {
                contempt: self.contempt,
            });
        }
        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            hash_mb: 16,
            threads: 1,
            multi_pv: 1,
            move_overhead: Duration::from_millis(10),
            skill_level: MAX_SKILL_LEVEL,
            contempt: 0,
            pruning: PruningConfig::all(),
        }
    }
}
