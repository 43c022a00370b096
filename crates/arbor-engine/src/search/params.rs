//! Search constants: pruning margins, reduction tables and the helper-thread
//! depth skip schedule.

use std::sync::OnceLock;

// Aspiration windows.
pub const ASPIRATION_MIN_DEPTH: i32 = 5;
pub const ASPIRATION_BASE: i32 = 14;
pub const ASPIRATION_DIVISOR: i32 = 25;
pub const ASPIRATION_MAX_DELTA: i32 = 1000;

// Reverse futility pruning.
pub const RFP_MAX_DEPTH: i32 = 6;
pub const RFP_MARGIN: i32 = 70;

// Razoring.
pub const RAZOR_MAX_DEPTH: i32 = 2;
pub const RAZOR_MARGIN: i32 = 300;

// Null move pruning.
pub const NMP_MIN_DEPTH: i32 = 2;
pub const NMP_VERIFY_DEPTH: i32 = 10;

// ProbCut.
pub const PROBCUT_MIN_DEPTH: i32 = 6;
pub const PROBCUT_MARGIN: i32 = 90;

// Internal iterative deepening.
pub const IID_PV_DEPTH: i32 = 6;
pub const IID_NON_PV_DEPTH: i32 = 8;

// Move-loop pruning.
pub const FUTILITY_MAX_DEPTH: i32 = 6;
pub const FUTILITY_BASE: i32 = 115;
pub const FUTILITY_PER_DEPTH: i32 = 90;
pub const LMP_MAX_DEPTH: i32 = 8;
pub const SEE_QUIET_MAX_DEPTH: i32 = 8;
pub const SEE_QUIET_MARGIN: i32 = 24;
pub const SEE_CAPTURE_MAX_DEPTH: i32 = 6;
pub const SEE_CAPTURE_MARGIN: i32 = 100;

// Singular extensions.
pub const SINGULAR_MIN_DEPTH: i32 = 8;
pub const SINGULAR_TT_DEPTH_SLACK: i32 = 3;

// Late move reductions.
pub const LMR_MIN_DEPTH: i32 = 3;
pub const LMR_DIVISOR: f64 = 2.1;

// Quiescence.
pub const DELTA_MARGIN: i32 = 200;

/// Nodes between clock/node-budget checks (and shared counter flushes).
pub const NODE_POLL_INTERVAL: u64 = 2048;

/// `round(ln(depth) * ln(index) / LMR_DIVISOR)`, indexed by `[depth][index]`.
static LMR_TABLE: OnceLock<[[i32; 64]; 64]> = OnceLock::new();

fn lmr_table() -> &'static [[i32; 64]; 64] {
    LMR_TABLE.get_or_init(|| {
        let mut t = [[0i32; 64]; 64];
        for (d, row) in t.iter_mut().enumerate().skip(1) {
            for (i, cell) in row.iter_mut().enumerate().skip(1) {
                *cell = ((d as f64).ln() * (i as f64).ln() / LMR_DIVISOR).round() as i32;
            }
        }
        t
    })
}

/// LMR reduction in plies for the `index`-th move (1-based) at `depth`.
pub fn reduction(depth: i32, index: usize) -> i32 {
    lmr_table()[depth.clamp(0, 63) as usize][index.min(63)]
}

/// Quiet moves tried at `depth` before late-move pruning kicks in.
pub fn lmp_count(depth: i32, improving: bool) -> usize {
    let base = (3 + depth * depth) as usize;
    if improving { base } else { base / 2 }
}

// Helper-thread depth skipping: helper `i` uses entry `(i - 1) % 16` and
// skips `depth` when `((depth + SKIP_PHASE) / SKIP_SIZE)` is odd.
const SKIP_SIZE: [i32; 16] = [1, 1, 1, 2, 2, 2, 1, 3, 2, 2, 1, 3, 3, 2, 2, 1];
const SKIP_PHASE: [i32; 16] = [1, 2, 3, 0, 1, 3, 0, 2, 2, 0, 3, 1, 0, 2, 1, 2];

/// Whether helper thread `thread_id` (1-based) sits out iteration `depth`.
pub fn helper_skips(thread_id: usize, depth: i32) -> bool {
    if thread_id == 0 || depth <= 1 {
        return false;
    }
    let idx = (thread_id - 1) % SKIP_SIZE.len();
    ((depth + SKIP_PHASE[idx]) / SKIP_SIZE[idx]) % 2 == 1
}
