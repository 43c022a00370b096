//! Lazy SMP thread pool for parallel search.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use arbor_core::{Board, Move};
use tracing::{debug, info, warn};

use crate::config::{MAX_SKILL_LEVEL, PruningConfig, SearchConfig};
use crate::eval::Evaluator;
use crate::oracle::Oracle;
use crate::search::control::SearchControl;
use crate::search::heuristics::Heuristics;
use crate::search::negamax::SearchContext;
use crate::search::skill::{SKILL_MULTI_PV, pick_line};
use crate::search::tt::TranspositionTable;
use crate::search::worker::{Completed, iterative_deepening};
use crate::search::{SearchInfo, SearchResult, SearchStats, mated_in};
use crate::time::{SearchLimits, SearchMode};

/// Stack size for helper threads.
const HELPER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// How often the main worker re-checks a held search.
const HOLD_POLL: Duration = Duration::from_millis(1);

/// Lazy SMP thread pool: owns the shared transposition table and one set of
/// heuristic tables per worker.
pub struct ThreadPool {
    tt: TranspositionTable,
    heuristics: Vec<Heuristics>,
    evaluator: Arc<dyn Evaluator>,
    oracle: Option<Arc<dyn Oracle>>,
    config: SearchConfig,
}

impl ThreadPool {
    pub fn new(config: SearchConfig, evaluator: Arc<dyn Evaluator>) -> Self {
        let threads = config.threads.max(1);
        Self {
            tt: TranspositionTable::new(config.hash_mb),
            heuristics: (0..threads).map(|_| Heuristics::new()).collect(),
            evaluator,
            oracle: None,
            config,
        }
    }

    /// Attach (or detach) a book/tablebase oracle.
    pub fn set_oracle(&mut self, oracle: Option<Arc<dyn Oracle>>) {
        self.oracle = oracle;
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Set the number of search threads, main thread included.
    pub fn set_num_threads(&mut self, n: usize) {
        let n = n.max(1);
        self.heuristics.resize_with(n, Heuristics::new);
        self.config.threads = n;
    }

    /// Replace the transposition table with an empty one of `mb` megabytes.
    pub fn resize_tt(&mut self, mb: usize) {
        if mb == self.config.hash_mb {
            return;
        }
        info!(from = self.config.hash_mb, to = mb, "resizing transposition table");
        self.tt = TranspositionTable::new(mb);
        self.config.hash_mb = mb;
    }

    pub fn set_multi_pv(&mut self, count: usize) {
        self.config.multi_pv = count.max(1);
    }

    pub fn set_pruning(&mut self, pruning: PruningConfig) {
        self.config.pruning = pruning;
    }

    pub fn set_move_overhead(&mut self, overhead: Duration) {
        self.config.move_overhead = overhead;
    }

    pub fn set_skill_level(&mut self, level: u8) {
        self.config.skill_level = level.min(MAX_SKILL_LEVEL);
    }

    pub fn set_contempt(&mut self, contempt: i32) {
        self.config.contempt = contempt;
    }

    /// Forget everything learned: empty the table and every heuristic set.
    pub fn clear(&mut self) {
        self.tt.clear();
        for heuristics in &mut self.heuristics {
            heuristics.clear();
        }
    }

    pub fn tt(&self) -> &TranspositionTable {
        &self.tt
    }

    /// Build the control for a search of `board` under `limits`, using the
    /// configured move overhead.
    pub fn control_for(
        &self,
        stopped: Arc<std::sync::atomic::AtomicBool>,
        limits: &SearchLimits,
        board: &Board,
    ) -> SearchControl {
        SearchControl::for_limits(stopped, limits, board, self.config.move_overhead)
    }

    /// Run a Lazy SMP search of `board`.
    ///
    /// `history` holds the hashes of the positions played before `board`,
    /// oldest first, for repetition detection. Worker 0 runs on the calling
    /// thread and reports through `on_info`; the others run silently and
    /// only share what they find through the table. With a single PV the
    /// answer comes from the deepest iteration any worker completed, ties
    /// going to worker 0; with several, worker 0 alone has them all and
    /// its lines are kept. Below full skill one of those lines is picked
    /// at random in its place.
    ///
    /// The stop flag in `control` is raised before returning.
    pub fn search(
        &mut self,
        board: &Board,
        history: &[u64],
        limits: &SearchLimits,
        control: &SearchControl,
        mut on_info: impl FnMut(&SearchInfo),
    ) -> SearchResult {
        self.tt.new_generation();
        for heuristics in &mut self.heuristics {
            heuristics.age();
        }

        let root_moves = board.legal_moves();
        if root_moves.is_empty() {
            let score = if board.in_check() { mated_in(0) } else { 0 };
            debug!(score, "no legal moves at the root");
            control.stop();
            return SearchResult::immediate(Move::NULL, score);
        }

        if let Some(oracle) = &self.oracle
            && let Some(hit) = oracle.probe_root(board)
            && let Some(mv) = hit.moves.iter().copied().find(|&mv| board.is_legal(mv))
        {
            debug!(%mv, score = hit.score, "oracle answered at the root");
            control.stop();
            return SearchResult::immediate(mv, hit.score);
        }

        let skill_level = self.config.skill_level;
        let mut multi_pv = limits.multi_pv.unwrap_or(self.config.multi_pv).max(1);
        if skill_level < MAX_SKILL_LEVEL {
            multi_pv = multi_pv.max(SKILL_MULTI_PV);
        }
        let pruning = self.config.pruning;
        let contempt = self.config.contempt;
        let root_side = board.side_to_move();
        let tt = &self.tt;
        let evaluator: &dyn Evaluator = &*self.evaluator;
        let oracle: Option<&dyn Oracle> = self.oracle.as_deref();
        let hold = limits.ponder || matches!(limits.mode, SearchMode::Infinite);

        let Some((main_heuristics, helper_heuristics)) = self.heuristics.split_first_mut() else {
            control.stop();
            return SearchResult::immediate(root_moves.iter().next().copied().unwrap_or(Move::NULL), 0);
        };

        let (main, helpers) = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(helper_heuristics.len());
            for (index, heuristics) in helper_heuristics.iter_mut().enumerate() {
                let thread_id = index + 1;
                let spawned = thread::Builder::new()
                    .name(format!("arbor-helper-{thread_id}"))
                    .stack_size(HELPER_STACK_SIZE)
                    .spawn_scoped(scope, move || {
                        let mut ctx =
                            SearchContext::new(tt, heuristics, evaluator, control, pruning, history)
                                .with_oracle(oracle)
                                .with_contempt(contempt, root_side);
                        let completed =
                            iterative_deepening(&mut ctx, board, thread_id, 1, &mut |_| {});
                        (
                            completed,
                            SearchStats {
                                nodes: ctx.nodes,
                                ..ctx.stats
                            },
                        )
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        warn!(thread_id, error = %err, "failed to spawn helper, continuing with fewer threads");
                        break;
                    }
                }
            }

            let mut ctx =
                SearchContext::new(tt, main_heuristics, evaluator, control, pruning, history)
                    .with_oracle(oracle)
                    .with_contempt(contempt, root_side);
            let completed = iterative_deepening(&mut ctx, board, 0, multi_pv, &mut on_info);

            if hold {
                while !control.is_stopped()
                    && (control.time().is_pondering() || !limits.ponder)
                {
                    thread::sleep(HOLD_POLL);
                }
            }
            control.stop();

            let helpers: Vec<_> = handles
                .into_iter()
                .enumerate()
                .filter_map(|(index, handle)| match handle.join() {
                    Ok(outcome) => Some(outcome),
                    Err(_) => {
                        warn!(thread_id = index + 1, "helper thread panicked");
                        None
                    }
                })
                .collect();

            let stats = SearchStats {
                nodes: ctx.nodes,
                ..ctx.stats
            };
            ((completed, stats), helpers)
        });

        let (mut best, mut stats) = main;
        for (completed, helper_stats) in helpers {
            merge_stats(&mut stats, &helper_stats);
            if let Some(candidate) = completed
                && best
                    .as_ref()
                    .is_none_or(|b| multi_pv == 1 && candidate.depth > b.depth)
            {
                best = Some(candidate);
            }
        }

        let nodes = control.total_nodes();
        match best {
            Some(completed) => {
                let pick = pick_line(&completed.lines, skill_level, &mut rand::thread_rng());
                if pick > 0 {
                    debug!(pick, skill_level, "playing a weaker line");
                }
                finish(completed, pick, nodes, stats)
            }
            None => {
                let fallback = root_moves.iter().next().copied().unwrap_or(Move::NULL);
                debug!(%fallback, "no iteration completed, playing the first legal move");
                SearchResult {
                    nodes,
                    stats,
                    ..SearchResult::immediate(fallback, 0)
                }
            }
        }
    }
}

fn merge_stats(total: &mut SearchStats, other: &SearchStats) {
    total.nodes += other.nodes;
    total.tt_probes += other.tt_probes;
    total.tt_hits += other.tt_hits;
    total.aspiration_researches += other.aspiration_researches;
    total.tb_hits += other.tb_hits;
    total.null_moves += other.null_moves;
    total.singular_extensions += other.singular_extensions;
}

/// Build the result, playing line `pick` of the completed iteration.
fn finish(completed: Completed, pick: usize, nodes: u64, stats: SearchStats) -> SearchResult {
    let Completed {
        depth,
        seldepth,
        lines,
    } = completed;
    let (best_move, score, pv) = lines
        .get(pick)
        .or_else(|| lines.first())
        .map(|line| (line.best_move(), line.score, line.pv.clone()))
        .unwrap_or((Move::NULL, 0, Vec::new()));
    SearchResult {
        best_move,
        ponder_move: pv.get(1).copied(),
        pv,
        score,
        depth,
        seldepth,
        nodes,
        lines,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::eval::Hce;
    use crate::oracle::OracleHit;
    use crate::search::mate_in;

    fn pool(threads: usize) -> ThreadPool {
        let config = SearchConfig {
            hash_mb: 1,
            threads,
            ..SearchConfig::default()
        };
        ThreadPool::new(config, Arc::new(Hce))
    }

    fn run(pool: &mut ThreadPool, board: &Board, limits: SearchLimits) -> SearchResult {
        let control = pool.control_for(Arc::new(AtomicBool::new(false)), &limits, board);
        pool.search(board, &[], &limits, &control, |_| {})
    }

    #[test]
    fn checkmated_root_returns_null_move() {
        let board: Board = "R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1".parse().unwrap();
        let result = run(&mut pool(1), &board, SearchLimits::depth(3));
        assert!(result.best_move.is_null());
        assert_eq!(result.score, mated_in(0));
        assert_eq!(result.depth, 0);
    }

    #[test]
    fn stalemated_root_scores_zero() {
        let board: Board = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1".parse().unwrap();
        let result = run(&mut pool(1), &board, SearchLimits::depth(3));
        assert!(result.best_move.is_null());
        assert_eq!(result.score, 0);
    }

    #[test]
    fn finds_mate_with_helpers() {
        let board: Board = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1".parse().unwrap();
        let result = run(&mut pool(3), &board, SearchLimits::depth(4));
        assert_eq!(result.best_move.to_uci(), "a1a8");
        assert_eq!(result.score, mate_in(1));
        assert!(result.nodes > 0);
    }

    #[test]
    fn multi_pv_reports_distinct_lines() {
        let board = Board::starting_position();
        let limits = SearchLimits::depth(3).with_multi_pv(3);
        let mut infos = Vec::new();
        let mut pool = pool(1);
        let control = pool.control_for(Arc::new(AtomicBool::new(false)), &limits, &board);
        let result = pool.search(&board, &[], &limits, &control, |info| infos.push(info.clone()));

        assert_eq!(result.lines.len(), 3);
        let firsts: Vec<Move> = result.lines.iter().map(|l| l.best_move()).collect();
        assert!(firsts[0] != firsts[1] && firsts[1] != firsts[2] && firsts[0] != firsts[2]);
        assert!(result.lines.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(infos.iter().any(|i| i.depth == 3 && i.multipv == 3));
    }

    #[test]
    fn helpers_do_not_cut_multi_pv_lines() {
        let board = Board::starting_position();
        let limits = SearchLimits::movetime(Duration::from_millis(400)).with_multi_pv(3);
        let mut pool = pool(4);
        for _ in 0..3 {
            let result = run(&mut pool, &board, limits);
            assert_eq!(result.lines.len(), 3, "depth {}", result.depth);
            assert_eq!(result.best_move, result.lines[0].best_move());
            assert_eq!(result.score, result.lines[0].score);
        }
    }

    #[test]
    fn low_skill_plays_one_of_its_lines() {
        let board = Board::starting_position();
        let mut pool = pool(1);
        pool.set_skill_level(0);
        let result = run(&mut pool, &board, SearchLimits::depth(4));

        assert_eq!(result.lines.len(), SKILL_MULTI_PV);
        let played = result
            .lines
            .iter()
            .find(|line| line.best_move() == result.best_move)
            .expect("best move comes from a searched line");
        assert_eq!(result.score, played.score);
        assert_eq!(result.pv, played.pv);
    }

    struct Book(&'static str);

    impl Oracle for Book {
        fn probe_root(&self, board: &Board) -> Option<OracleHit> {
            Some(OracleHit {
                score: 17,
                moves: vec![board.find_move(self.0).ok()?],
            })
        }
    }

    #[test]
    fn oracle_move_is_played_without_search() {
        let mut pool = pool(1);
        pool.set_oracle(Some(Arc::new(Book("g1f3"))));
        let result = run(&mut pool, &Board::starting_position(), SearchLimits::depth(5));
        assert_eq!(result.best_move.to_uci(), "g1f3");
        assert_eq!(result.score, 17);
        assert_eq!(result.nodes, 0);
    }

    #[test]
    fn thread_count_resizes_heuristics() {
        let mut pool = pool(1);
        pool.set_num_threads(4);
        assert_eq!(pool.heuristics.len(), 4);
        assert_eq!(pool.config().threads, 4);
        pool.set_num_threads(0);
        assert_eq!(pool.heuristics.len(), 1);
    }
}
