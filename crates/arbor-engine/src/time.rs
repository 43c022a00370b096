//! Search limits and time management.
//!
//! [`SearchLimits`] says what the caller asked for; [`TimeManager`] turns it
//! into soft/hard deadlines and answers two questions during the search:
//! must we stop right now ([`TimeManager::exit_search`]) and is another
//! iteration worth starting ([`TimeManager::continue_search`]).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use arbor_core::Move;

use crate::search::MAX_PLY;

/// Deepest iteration the driver will start.
pub const MAX_DEPTH: i32 = MAX_PLY as i32 - 1;

/// Sentinel for "no deadline".
const NO_DEADLINE: u64 = u64::MAX;

/// Share of a fixed move time after which no new iteration starts.
const MOVETIME_SOFT_PERCENT: u64 = 60;

/// Remaining time on the clock of the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    pub remaining: Duration,
    pub increment: Duration,
    pub moves_to_go: Option<u32>,
}

/// What bounds a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Search exactly to this depth.
    Depth(i32),
    /// Spend this much wall time.
    MoveTime(Duration),
    /// Stop after this many nodes.
    Nodes(u64),
    /// Tournament clock.
    Clock(Clock),
    /// Until stopped.
    Infinite,
}

/// A search request: a mode plus optional extra caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub mode: SearchMode,
    /// Extra depth cap, applied on top of any mode.
    pub depth: Option<i32>,
    /// Extra node cap, applied on top of any mode.
    pub nodes: Option<u64>,
    /// Overrides the configured multi-PV count.
    pub multi_pv: Option<usize>,
    /// Start in ponder mode: deadlines are held until `ponder_hit`.
    pub ponder: bool,
}

impl SearchLimits {
    fn with_mode(mode: SearchMode) -> Self {
        Self {
            mode,
            depth: None,
            nodes: None,
            multi_pv: None,
            ponder: false,
        }
    }

    pub fn depth(depth: i32) -> Self {
        Self::with_mode(SearchMode::Depth(depth))
    }

    pub fn movetime(time: Duration) -> Self {
        Self::with_mode(SearchMode::MoveTime(time))
    }

    pub fn nodes(nodes: u64) -> Self {
        Self::with_mode(SearchMode::Nodes(nodes))
    }

    pub fn clock(clock: Clock) -> Self {
        Self::with_mode(SearchMode::Clock(clock))
    }

    pub fn infinite() -> Self {
        Self::with_mode(SearchMode::Infinite)
    }

    pub fn with_depth_cap(mut self, depth: i32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_node_cap(mut self, nodes: u64) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn with_multi_pv(mut self, count: usize) -> Self {
        self.multi_pv = Some(count);
        self
    }

    pub fn pondering(mut self) -> Self {
        self.ponder = true;
        self
    }

    /// Deepest iteration allowed, in `1..=MAX_DEPTH`.
    pub fn depth_limit(&self) -> i32 {
        let mode = match self.mode {
            SearchMode::Depth(d) => d,
            _ => MAX_DEPTH,
        };
        self.depth
            .map_or(mode, |cap| cap.min(mode))
            .clamp(1, MAX_DEPTH)
    }

    /// Node budget, if any.
    pub fn node_limit(&self) -> Option<u64> {
        let mode = match self.mode {
            SearchMode::Nodes(n) => Some(n),
            _ => None,
        };
        match (mode, self.nodes) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self::infinite()
    }
}

/// Compute soft and hard time limits from remaining time and increment.
///
/// When `moves_to_go` is `None`, the expected number of moves remaining is
/// derived from `phase` (0 = endgame, 24 = opening) so that the engine is
/// more conservative early and more aggressive late:
///
/// | Condition   | base_mtg | scale | Phase=24 | Phase=12 | Phase=0 |
/// |-------------|----------|-------|----------|----------|---------|
/// | With inc    | 15       | 20    | 35       | 25       | 15      |
/// | No inc      | 18       | 22    | 40       | 29       | 18      |
///
/// | Fixed parameter     | No increment | With increment |
/// |---------------------|--------------|----------------|
/// | Hard cap (% remain) | 12%          | 25%            |
/// | Hard/soft ratio cap | 2.5x         | 3.0x           |
/// | Increment contrib   | n/a          | `base + inc * 0.75` |
///
/// `overhead` is held back from the clock first. The soft limit never
/// exceeds the hard one and both are at least 1 ms.
pub fn compute_limits(
    remaining: Duration,
    increment: Duration,
    moves_to_go: Option<u32>,
    phase: i32,
    overhead: Duration,
) -> (Duration, Duration) {
    let remaining_ms = remaining.as_millis() as f64;
    let overhead_ms = overhead.as_millis() as f64;

    if remaining_ms <= overhead_ms + 1.0 {
        let one_ms = Duration::from_millis(1);
        return (one_ms, one_ms);
    }

    let usable = (remaining_ms - overhead_ms).max(1.0);
    let inc_ms = increment.as_millis() as f64;
    let has_increment = inc_ms > 0.0;

    let mtg = match moves_to_go {
        Some(x) => x.max(1) as f64,
        None => {
            let (base, scale) = if has_increment { (15, 20) } else { (18, 22) };
            (base + scale * phase.clamp(0, 24) / 24) as f64
        }
    };

    let base = usable / mtg;
    let soft = if has_increment {
        base + inc_ms * 0.75
    } else {
        base
    };

    let hard_cap_pct = if has_increment { 0.25 } else { 0.12 };
    let hard_ratio_cap = if has_increment { 3.0 } else { 2.5 };

    let hard = (usable * hard_cap_pct)
        .min(soft * hard_ratio_cap)
        .min(usable)
        .max(1.0);
    let soft = soft.min(hard).max(1.0);

    (
        Duration::from_millis(soft as u64),
        Duration::from_millis(hard as u64),
    )
}

/// Tracks best-move stability across iterations.
///
/// When the best move changes or the score drops, the engine should think
/// longer. When the best move is stable, it can play faster.
#[derive(Debug)]
struct StabilityTracker {
    last_move: Move,
    last_score: i32,
    stable_streak: u32,
}

impl StabilityTracker {
    fn new() -> Self {
        Self {
            last_move: Move::NULL,
            last_score: 0,
            stable_streak: 0,
        }
    }

    /// Record an iteration and return a soft-budget scale in hundredths.
    ///
    /// - Score drop > 100cp: 250
    /// - Score drop > 50cp: 180
    /// - Same best move three times running: 60
    /// - Otherwise: 100
    fn update(&mut self, best_move: Move, score: i32) -> u64 {
        let scale = if self.last_move.is_null() {
            100
        } else {
            let score_drop = self.last_score - score;
            if score_drop > 100 {
                self.stable_streak = 0;
                250
            } else if score_drop > 50 {
                self.stable_streak = 0;
                180
            } else if best_move == self.last_move {
                self.stable_streak += 1;
                if self.stable_streak >= 3 { 60 } else { 100 }
            } else {
                self.stable_streak = 0;
                100
            }
        };

        self.last_move = best_move;
        self.last_score = score;
        scale
    }
}

#[derive(Debug)]
struct IterationClock {
    stability: StabilityTracker,
    /// Elapsed ms when the previous iteration finished.
    last_mark: u64,
}

/// Per-search deadlines and iteration policy.
///
/// Created for one search command; shared by reference between workers.
#[derive(Debug)]
pub struct TimeManager {
    start: Instant,
    /// Deadlines in ms since `start`.
    soft: AtomicU64,
    hard: AtomicU64,
    /// Budgets held back while pondering.
    armed: Option<(u64, u64)>,
    pondering: AtomicBool,
    /// Scale the soft budget by stability (clock mode only).
    adaptive: bool,
    node_limit: Option<u64>,
    depth_limit: i32,
    fail_low: AtomicBool,
    iterations: Mutex<IterationClock>,
}

impl TimeManager {
    /// Derive deadlines for `limits`. `phase` is the game phase of the root
    /// (see [`game_phase`](crate::eval::game_phase)).
    pub fn new(limits: &SearchLimits, phase: i32, overhead: Duration) -> Self {
        let (budgets, adaptive) = match limits.mode {
            SearchMode::MoveTime(t) => {
                let hard = t.saturating_sub(overhead).as_millis().max(1) as u64;
                let soft = (hard * MOVETIME_SOFT_PERCENT / 100).max(1);
                (Some((soft, hard)), false)
            }
            SearchMode::Clock(clock) => {
                let (soft, hard) = compute_limits(
                    clock.remaining,
                    clock.increment,
                    clock.moves_to_go,
                    phase,
                    overhead,
                );
                (Some((soft.as_millis() as u64, hard.as_millis() as u64)), true)
            }
            SearchMode::Depth(_) | SearchMode::Nodes(_) | SearchMode::Infinite => (None, false),
        };

        let live = if limits.ponder { None } else { budgets };
        let (soft, hard) = live.unwrap_or((NO_DEADLINE, NO_DEADLINE));

        Self {
            start: Instant::now(),
            soft: AtomicU64::new(soft),
            hard: AtomicU64::new(hard),
            armed: budgets,
            pondering: AtomicBool::new(limits.ponder),
            adaptive,
            node_limit: limits.node_limit(),
            depth_limit: limits.depth_limit(),
            fail_low: AtomicBool::new(false),
            iterations: Mutex::new(IterationClock {
                stability: StabilityTracker::new(),
                last_mark: 0,
            }),
        }
    }

    /// No deadlines, no node budget.
    pub fn infinite() -> Self {
        Self::new(&SearchLimits::infinite(), 0, Duration::ZERO)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn depth_limit(&self) -> i32 {
        self.depth_limit
    }

    pub fn node_limit(&self) -> Option<u64> {
        self.node_limit
    }

    /// Soft deadline, `None` while unlimited or pondering.
    pub fn soft_limit(&self) -> Option<Duration> {
        match self.soft.load(Ordering::Acquire) {
            NO_DEADLINE => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Hard deadline, `None` while unlimited or pondering.
    pub fn hard_limit(&self) -> Option<Duration> {
        match self.hard.load(Ordering::Acquire) {
            NO_DEADLINE => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// The hard deadline or the node budget has been reached.
    pub fn exit_search(&self, nodes: u64) -> bool {
        self.exit_search_at(nodes, self.elapsed_ms())
    }

    /// [`exit_search`](Self::exit_search) with an explicit clock reading.
    pub fn exit_search_at(&self, nodes: u64, elapsed_ms: u64) -> bool {
        if self.node_limit.is_some_and(|limit| nodes >= limit) {
            return true;
        }
        elapsed_ms >= self.hard.load(Ordering::Acquire)
    }

    /// Called after each completed iteration of the main worker. Returns
    /// whether the next iteration should start.
    pub fn continue_search(&self, depth: i32, best_move: Move, score: i32, nodes: u64) -> bool {
        self.continue_search_at(depth, best_move, score, nodes, self.elapsed_ms())
    }

    /// [`continue_search`](Self::continue_search) with an explicit clock
    /// reading.
    pub fn continue_search_at(
        &self,
        depth: i32,
        best_move: Move,
        score: i32,
        nodes: u64,
        elapsed: u64,
    ) -> bool {
        if self.exit_search_at(nodes, elapsed) || depth >= self.depth_limit {
            return false;
        }

        let mut iterations = self
            .iterations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut scale = iterations.stability.update(best_move, score);
        let last_iteration = elapsed.saturating_sub(iterations.last_mark);
        iterations.last_mark = elapsed;
        drop(iterations);

        let soft = self.soft.load(Ordering::Acquire);
        if soft == NO_DEADLINE {
            return true;
        }
        if !self.adaptive {
            return elapsed < soft;
        }

        if self.fail_low.swap(false, Ordering::AcqRel) {
            scale *= 2;
        }
        let hard = self.hard.load(Ordering::Acquire);
        let budget = (soft.saturating_mul(scale) / 100).min(hard);
        elapsed.saturating_add(last_iteration) <= budget
    }

    /// The root score just failed low: allow extra time for the next
    /// decision.
    pub fn report_fail_low(&self) {
        self.fail_low.store(true, Ordering::Release);
    }

    pub fn is_pondering(&self) -> bool {
        self.pondering.load(Ordering::Acquire)
    }

    /// Leave ponder mode; budgets start counting from now.
    pub fn ponder_hit(&self) {
        if !self.pondering.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some((soft, hard)) = self.armed {
            let now = self.elapsed_ms();
            self.soft.store(now.saturating_add(soft), Ordering::Release);
            self.hard.store(now.saturating_add(hard), Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use arbor_core::Square;

    const NO_OVERHEAD: Duration = Duration::ZERO;

    #[test]
    fn compute_limits_with_increment() {
        let (soft, hard) = compute_limits(
            Duration::from_secs(300),
            Duration::from_secs(2),
            None,
            12,
            Duration::from_millis(10),
        );
        // mtg=25: base ~ 11999, soft ~ 13499
        assert!(soft.as_millis() > 10_000, "soft={soft:?}");
        assert!(soft.as_millis() < 20_000, "soft={soft:?}");
        assert!(hard > soft, "hard={hard:?} should be > soft={soft:?}");
        assert!(hard.as_millis() < 50_000, "hard={hard:?}");
    }

    #[test]
    fn compute_limits_no_increment_hard_cap_tight() {
        let (_soft, hard) = compute_limits(
            Duration::from_secs(60),
            Duration::ZERO,
            None,
            12,
            Duration::from_millis(10),
        );
        // 12% of 59990
        assert!(hard.as_millis() <= 7_200, "hard={hard:?}");
    }

    #[test]
    fn compute_limits_very_low_time() {
        let (soft, hard) = compute_limits(
            Duration::from_millis(5),
            Duration::ZERO,
            None,
            12,
            Duration::from_millis(10),
        );
        assert_eq!(soft, Duration::from_millis(1));
        assert_eq!(hard, Duration::from_millis(1));
    }

    #[test]
    fn compute_limits_hard_never_below_soft() {
        for mtg in [Some(1), Some(2), Some(40), None] {
            for phase in [0, 12, 24] {
                let (soft, hard) = compute_limits(
                    Duration::from_secs(10),
                    Duration::ZERO,
                    mtg,
                    phase,
                    Duration::from_millis(50),
                );
                assert!(hard >= soft, "mtg={mtg:?} phase={phase}");
                assert!(hard < Duration::from_secs(10));
            }
        }
    }

    #[test]
    fn compute_limits_endgame_spends_more() {
        let (opening, _) =
            compute_limits(Duration::from_secs(300), Duration::ZERO, None, 24, NO_OVERHEAD);
        let (endgame, _) =
            compute_limits(Duration::from_secs(300), Duration::ZERO, None, 0, NO_OVERHEAD);
        assert!(endgame > opening);
    }

    #[test]
    fn explicit_movestogo_ignores_phase() {
        let a = compute_limits(Duration::from_secs(60), Duration::ZERO, Some(10), 0, NO_OVERHEAD);
        let b = compute_limits(Duration::from_secs(60), Duration::ZERO, Some(10), 24, NO_OVERHEAD);
        assert_eq!(a, b);
    }

    #[test]
    fn limits_builders() {
        let limits = SearchLimits::infinite().with_depth_cap(7).with_node_cap(500);
        assert_eq!(limits.depth_limit(), 7);
        assert_eq!(limits.node_limit(), Some(500));

        assert_eq!(SearchLimits::depth(4).with_depth_cap(9).depth_limit(), 4);
        assert_eq!(SearchLimits::depth(0).depth_limit(), 1);
        assert_eq!(SearchLimits::nodes(900).with_node_cap(100).node_limit(), Some(100));
        assert_eq!(SearchLimits::movetime(Duration::from_secs(1)).depth_limit(), MAX_DEPTH);
        assert_eq!(SearchLimits::default().node_limit(), None);
    }

    #[test]
    fn movetime_deadlines_leave_overhead() {
        let limits = SearchLimits::movetime(Duration::from_millis(500));
        let tm = TimeManager::new(&limits, 24, Duration::from_millis(20));
        assert_eq!(tm.soft_limit(), Some(Duration::from_millis(288)));
        assert_eq!(tm.hard_limit(), Some(Duration::from_millis(480)));
        assert!(!tm.exit_search_at(0, 479));
        assert!(tm.exit_search_at(0, 480));

        let tiny = TimeManager::new(
            &SearchLimits::movetime(Duration::from_millis(5)),
            24,
            Duration::from_millis(20),
        );
        assert_eq!(tiny.hard_limit(), Some(Duration::from_millis(1)));
        assert_eq!(tiny.soft_limit(), Some(Duration::from_millis(1)));
    }

    #[test]
    fn movetime_stops_iterating_before_the_hard_deadline() {
        let limits = SearchLimits::movetime(Duration::from_millis(1000));
        let tm = TimeManager::new(&limits, 24, NO_OVERHEAD);
        let mv = Move::new(Square::E2, Square::E4);
        assert!(tm.continue_search_at(3, mv, 0, 100, 500));
        assert!(!tm.continue_search_at(4, mv, 0, 200, 700));
        assert!(!tm.exit_search_at(200, 700));
    }

    #[test]
    fn node_budget_exits() {
        let tm = TimeManager::new(&SearchLimits::nodes(1000), 24, NO_OVERHEAD);
        assert!(!tm.exit_search(999));
        assert!(tm.exit_search(1000));
        assert!(!tm.continue_search(3, Move::NULL, 0, 1000));
    }

    #[test]
    fn infinite_never_exits() {
        let tm = TimeManager::infinite();
        assert!(!tm.exit_search_at(u64::MAX - 1, u64::MAX - 1));
        assert!(tm.continue_search(5, Move::NULL, 0, 1_000_000));
        assert_eq!(tm.soft_limit(), None);
    }

    #[test]
    fn depth_cap_stops_iterating() {
        let tm = TimeManager::new(&SearchLimits::depth(4), 24, NO_OVERHEAD);
        let mv = Move::new(Square::E2, Square::E4);
        assert!(tm.continue_search(3, mv, 10, 100));
        assert!(!tm.continue_search(4, mv, 10, 200));
    }

    #[test]
    fn ponder_holds_deadlines_until_hit() {
        let limits = SearchLimits::movetime(Duration::from_millis(300)).pondering();
        let tm = TimeManager::new(&limits, 24, NO_OVERHEAD);
        assert!(tm.is_pondering());
        assert_eq!(tm.hard_limit(), None);
        assert!(!tm.exit_search_at(0, 10_000));

        tm.ponder_hit();
        assert!(!tm.is_pondering());
        let hard = tm.hard_limit().unwrap();
        assert!(hard >= Duration::from_millis(300));
        assert!(hard < Duration::from_millis(300) + Duration::from_secs(5));

        // a second hit changes nothing
        tm.ponder_hit();
        assert_eq!(tm.hard_limit(), Some(hard));
    }

    #[test]
    fn stability_neutral_then_fast() {
        let mut tracker = StabilityTracker::new();
        let mv = Move::new(Square::E2, Square::E4);
        assert_eq!(tracker.update(mv, 25), 100);
        tracker.update(mv, 25);
        tracker.update(mv, 25);
        assert_eq!(tracker.update(mv, 25), 60);
    }

    #[test]
    fn stability_score_drop_overrides() {
        let mut tracker = StabilityTracker::new();
        let mv = Move::new(Square::E2, Square::E4);
        tracker.update(mv, 100);
        tracker.update(mv, 100);
        tracker.update(mv, 100);
        assert_eq!(tracker.update(mv, -50), 250);
        assert_eq!(tracker.update(mv, -110), 180);
    }

    #[test]
    fn clock_mode_keeps_going_early() {
        let clock = Clock {
            remaining: Duration::from_secs(600),
            increment: Duration::ZERO,
            moves_to_go: None,
        };
        let tm = TimeManager::new(&SearchLimits::clock(clock), 24, NO_OVERHEAD);
        assert!(tm.soft_limit().unwrap() <= tm.hard_limit().unwrap());
        tm.report_fail_low();
        assert!(tm.continue_search(1, Move::new(Square::E2, Square::E4), 20, 50));
    }

    #[test]
    fn fail_low_buys_another_iteration() {
        let clock = Clock {
            remaining: Duration::from_secs(600),
            increment: Duration::ZERO,
            moves_to_go: None,
        };
        let limits = SearchLimits::clock(clock);
        let mv = Move::new(Square::E2, Square::E4);

        // 40 moves to go in the opening: soft 15 s, hard 37.5 s.
        let calm = TimeManager::new(&limits, 24, NO_OVERHEAD);
        assert_eq!(calm.soft_limit(), Some(Duration::from_millis(15_000)));
        assert_eq!(calm.hard_limit(), Some(Duration::from_millis(37_500)));
        // A 9 s iteration would end past the soft budget.
        assert!(!calm.continue_search_at(8, mv, 20, 1_000, 9_000));

        let troubled = TimeManager::new(&limits, 24, NO_OVERHEAD);
        troubled.report_fail_low();
        assert!(troubled.continue_search_at(8, mv, 20, 1_000, 9_000));

        // The allowance is spent by that decision.
        assert!(!troubled.continue_search_at(9, mv, 20, 2_000, 18_000));
    }
}
