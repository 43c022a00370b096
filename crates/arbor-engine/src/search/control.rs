//! Search control: the shared stop flag, the time manager and the global
//! node counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use arbor_core::Board;

use crate::eval::game_phase;
use crate::time::{SearchLimits, TimeManager};

/// Controls when a search should stop.
///
/// One `SearchControl` is shared by every worker of a search. Workers check
/// the stop flag at every node and consult the [`TimeManager`] every
/// [`NODE_POLL_INTERVAL`](crate::search::params::NODE_POLL_INTERVAL) nodes,
/// after flushing their local node count into the shared counter.
#[derive(Debug)]
pub struct SearchControl {
    stopped: Arc<AtomicBool>,
    time: TimeManager,
    nodes: AtomicU64,
}

impl SearchControl {
    pub fn new(stopped: Arc<AtomicBool>, time: TimeManager) -> Self {
        Self {
            stopped,
            time,
            nodes: AtomicU64::new(0),
        }
    }

    /// Control for `go infinite`: only the stop flag ends the search.
    pub fn infinite(stopped: Arc<AtomicBool>) -> Self {
        Self::new(stopped, TimeManager::infinite())
    }

    /// Build the control for a search of `board` under `limits`.
    pub fn for_limits(
        stopped: Arc<AtomicBool>,
        limits: &SearchLimits,
        board: &Board,
        overhead: Duration,
    ) -> Self {
        Self::new(
            stopped,
            TimeManager::new(limits, game_phase(board), overhead),
        )
    }

    /// Raise the stop flag.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Reference to the shared stop flag.
    pub fn stop_flag(&self) -> &Arc<AtomicBool> {
        &self.stopped
    }

    pub fn time(&self) -> &TimeManager {
        &self.time
    }

    /// Add a worker's unflushed nodes; returns the new total.
    pub fn add_nodes(&self, n: u64) -> u64 {
        self.nodes.fetch_add(n, Ordering::Relaxed) + n
    }

    /// Nodes flushed so far by all workers.
    pub fn total_nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    /// Flush `n` nodes and check the clock and node budget, raising the
    /// stop flag when either is exhausted.
    pub fn poll(&self, n: u64) -> bool {
        let total = self.add_nodes(n);
        if self.time.exit_search(total) {
            self.stop();
        }
        self.is_stopped()
    }
}
