//! Asynchronous engine context: owns the thread pool between searches and
//! runs each search on its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SendError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arbor_core::Board;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::error::EngineError;
use crate::eval::Evaluator;
use crate::oracle::Oracle;
use crate::search::control::SearchControl;
use crate::search::pool::ThreadPool;
use crate::search::{SearchInfo, SearchResult};
use crate::time::SearchLimits;

/// Stack size of the thread running the main worker.
const SEARCH_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Events on the channel carry the id of the search that produced them.
type Tagged = (u64, EngineEvent);

/// Output produced by a running search.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// One completed PV line.
    Info(SearchInfo),
    /// Final answer; always the last event of a search.
    BestMove(SearchResult),
}

/// Requests accepted by [`SearchEngine::apply_command`].
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Forget the game: clear the table and heuristics, reset the position.
    NewGame,
    /// Position to search next, with the hashes of the positions before it.
    SetPosition { board: Board, history: Vec<u64> },
    /// Search the current position.
    Go(SearchLimits),
    Stop,
    PonderHit,
    SetHash(usize),
    SetThreads(usize),
    SetMultiPv(usize),
    SetSkillLevel(u8),
    SetContempt(i32),
}

/// A search engine driven by commands, reporting through events.
pub trait SearchEngine {
    /// Replace the configuration, discarding everything learned so far.
    fn initialize(&mut self, config: SearchConfig) -> Result<(), EngineError>;

    fn apply_command(&mut self, command: EngineCommand) -> Result<(), EngineError>;

    /// Next pending event, if any. Never blocks.
    fn poll_output(&mut self) -> Option<EngineEvent>;
}

/// The engine context.
///
/// Between searches the [`ThreadPool`] sits in a shared slot; a search takes
/// it out, runs on a dedicated thread and puts it back before sending
/// [`EngineEvent::BestMove`]. Settings changed while a search runs are
/// recorded and applied to the pool before the next search.
///
/// Every search gets a fresh id. Events left over from an earlier search
/// that were never polled are dropped, so [`SearchEngine::poll_output`]
/// only ever reports the current search.
pub struct Engine {
    config: SearchConfig,
    evaluator: Arc<dyn Evaluator>,
    oracle: Option<Arc<dyn Oracle>>,
    slot: Arc<Mutex<Option<ThreadPool>>>,
    /// A new game was started while the pool was away.
    clear_pending: bool,
    board: Board,
    history: Vec<u64>,
    stop_flag: Arc<AtomicBool>,
    control: Option<Arc<SearchControl>>,
    search: Option<JoinHandle<()>>,
    search_id: u64,
    stack_size: usize,
    tx: Sender<Tagged>,
    rx: Receiver<Tagged>,
}

impl Engine {
    pub fn new(config: SearchConfig, evaluator: Arc<dyn Evaluator>) -> Result<Self, EngineError> {
        config.validate()?;
        let (tx, rx) = mpsc::channel();
        let pool = ThreadPool::new(config.clone(), Arc::clone(&evaluator));
        Ok(Self {
            config,
            evaluator,
            oracle: None,
            slot: Arc::new(Mutex::new(Some(pool))),
            clear_pending: false,
            board: Board::starting_position(),
            history: Vec::new(),
            stop_flag: Arc::new(AtomicBool::new(false)),
            control: None,
            search: None,
            search_id: 0,
            stack_size: SEARCH_STACK_SIZE,
            tx,
            rx,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Attach (or detach) a book/tablebase oracle.
    pub fn set_oracle(&mut self, oracle: Option<Arc<dyn Oracle>>) {
        self.oracle = oracle;
        self.sync_idle_pool();
    }

    /// Set the position searched by [`EngineCommand::Go`].
    pub fn set_position(&mut self, board: Board, history: Vec<u64>) {
        self.board = board;
        self.history = history;
    }

    /// Whether a search thread is running or its answer has not been read.
    pub fn is_searching(&self) -> bool {
        self.search.is_some()
    }

    /// Start searching `board` in the background.
    pub fn start_search(
        &mut self,
        board: Board,
        history: Vec<u64>,
        limits: SearchLimits,
    ) -> Result<(), EngineError> {
        self.reap_finished();
        if self.search.is_some() {
            return Err(EngineError::SearchInProgress);
        }

        let mut pool = match lock(&self.slot).take() {
            Some(pool) => pool,
            None => {
                warn!("thread pool lost by a previous search, rebuilding");
                self.build_pool()
            }
        };
        self.sync_pool(&mut pool);

        let stop_flag = Arc::new(AtomicBool::new(false));
        let control = Arc::new(pool.control_for(Arc::clone(&stop_flag), &limits, &board));

        let id = self.search_id + 1;
        let slot = Arc::clone(&self.slot);
        let tx = self.tx.clone();
        let (pool_tx, pool_rx) = mpsc::channel::<ThreadPool>();
        let thread_control = Arc::clone(&control);
        debug!(id, fen = %board.to_fen(), ?limits, "starting search");

        let spawned = thread::Builder::new()
            .name("arbor-search".into())
            .stack_size(self.stack_size)
            .spawn(move || {
                let Ok(mut pool) = pool_rx.recv() else {
                    return;
                };
                let info_tx = tx.clone();
                let result = pool.search(&board, &history, &limits, &thread_control, |info| {
                    let _ = info_tx.send((id, EngineEvent::Info(info.clone())));
                });
                *lock(&slot) = Some(pool);
                let _ = tx.send((id, EngineEvent::BestMove(result)));
            });

        match spawned {
            Ok(handle) => {
                if let Err(SendError(pool)) = pool_tx.send(pool) {
                    // The thread is gone before it could start; keep the pool.
                    *lock(&self.slot) = Some(pool);
                }
                self.search_id = id;
                self.stop_flag = stop_flag;
                self.control = Some(control);
                self.search = Some(handle);
                Ok(())
            }
            Err(source) => {
                warn!(error = %source, "failed to spawn the search thread");
                *lock(&self.slot) = Some(pool);
                Err(EngineError::Spawn { source })
            }
        }
    }

    /// Ask the running search to stop. It still reports a best move.
    pub fn stop_search(&mut self) {
        if self.search.is_none() {
            warn!("stop requested with no search running, ignoring");
            return;
        }
        self.stop_flag.store(true, Ordering::Release);
    }

    /// The opponent played the pondered move: start the clock.
    pub fn ponder_hit(&mut self) {
        match (&self.search, &self.control) {
            (Some(_), Some(control)) if control.time().is_pondering() => {
                control.time().ponder_hit();
            }
            _ => warn!("ponderhit received while not pondering, ignoring"),
        }
    }

    /// Reset the position and forget everything learned.
    pub fn new_game(&mut self) {
        self.board = Board::starting_position();
        self.history.clear();
        self.clear_pending = true;
        self.sync_idle_pool();
    }

    pub fn set_hash(&mut self, mb: usize) -> Result<(), EngineError> {
        self.update_config(SearchConfig {
            hash_mb: mb,
            ..self.config.clone()
        })
    }

    pub fn set_threads(&mut self, threads: usize) -> Result<(), EngineError> {
        self.update_config(SearchConfig {
            threads,
            ..self.config.clone()
        })
    }

    pub fn set_multi_pv(&mut self, count: usize) -> Result<(), EngineError> {
        self.update_config(SearchConfig {
            multi_pv: count,
            ..self.config.clone()
        })
    }

    pub fn set_skill_level(&mut self, level: u8) -> Result<(), EngineError> {
        self.update_config(SearchConfig {
            skill_level: level,
            ..self.config.clone()
        })
    }

    pub fn set_contempt(&mut self, contempt: i32) -> Result<(), EngineError> {
        self.update_config(SearchConfig {
            contempt,
            ..self.config.clone()
        })
    }

    /// Block until the running search reports its best move or `timeout`
    /// passes. Progress events received meanwhile are discarded.
    pub fn wait_best_move(&mut self, timeout: Duration) -> Option<SearchResult> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok((id, EngineEvent::BestMove(result))) if id == self.search_id => {
                    self.finish_search();
                    return Some(result);
                }
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn update_config(&mut self, config: SearchConfig) -> Result<(), EngineError> {
        config.validate()?;
        self.config = config;
        self.sync_idle_pool();
        Ok(())
    }

    fn build_pool(&self) -> ThreadPool {
        let mut pool = ThreadPool::new(self.config.clone(), Arc::clone(&self.evaluator));
        pool.set_oracle(self.oracle.clone());
        pool
    }

    /// Bring `pool` in line with the current settings.
    fn sync_pool(&mut self, pool: &mut ThreadPool) {
        pool.resize_tt(self.config.hash_mb);
        pool.set_num_threads(self.config.threads);
        pool.set_multi_pv(self.config.multi_pv);
        pool.set_move_overhead(self.config.move_overhead);
        pool.set_skill_level(self.config.skill_level);
        pool.set_contempt(self.config.contempt);
        pool.set_pruning(self.config.pruning);
        pool.set_oracle(self.oracle.clone());
        if std::mem::take(&mut self.clear_pending) {
            pool.clear();
        }
    }

    /// Apply settings now if no search holds the pool.
    fn sync_idle_pool(&mut self) {
        let slot = Arc::clone(&self.slot);
        let mut guard = lock(&slot);
        if let Some(pool) = guard.as_mut() {
            self.sync_pool(pool);
        }
    }

    /// Join the search thread if it has already exited.
    fn reap_finished(&mut self) {
        if self.search.as_ref().is_some_and(JoinHandle::is_finished) {
            self.finish_search();
        }
    }

    /// Join the search thread. Called once its best move has been read, or
    /// when it has exited.
    fn finish_search(&mut self) {
        self.control = None;
        if let Some(handle) = self.search.take()
            && handle.join().is_err()
        {
            warn!("search thread panicked");
        }
    }
}

impl SearchEngine for Engine {
    fn initialize(&mut self, config: SearchConfig) -> Result<(), EngineError> {
        config.validate()?;
        self.reap_finished();
        if self.search.is_some() {
            return Err(EngineError::SearchInProgress);
        }
        info!(
            hash_mb = config.hash_mb,
            threads = config.threads,
            multi_pv = config.multi_pv,
            skill_level = config.skill_level,
            contempt = config.contempt,
            "engine initialized"
        );
        self.config = config;
        self.clear_pending = false;
        *lock(&self.slot) = Some(self.build_pool());
        Ok(())
    }

    fn apply_command(&mut self, command: EngineCommand) -> Result<(), EngineError> {
        match command {
            EngineCommand::NewGame => self.new_game(),
            EngineCommand::SetPosition { board, history } => self.set_position(board, history),
            EngineCommand::Go(limits) => {
                let board = self.board.clone();
                let history = self.history.clone();
                self.start_search(board, history, limits)?;
            }
            EngineCommand::Stop => self.stop_search(),
            EngineCommand::PonderHit => self.ponder_hit(),
            EngineCommand::SetHash(mb) => self.set_hash(mb)?,
            EngineCommand::SetThreads(threads) => self.set_threads(threads)?,
            EngineCommand::SetMultiPv(count) => self.set_multi_pv(count)?,
            EngineCommand::SetSkillLevel(level) => self.set_skill_level(level)?,
            EngineCommand::SetContempt(contempt) => self.set_contempt(contempt)?,
        }
        Ok(())
    }

    fn poll_output(&mut self) -> Option<EngineEvent> {
        loop {
            let (id, event) = self.rx.try_recv().ok()?;
            if id != self.search_id {
                debug!(id, current = self.search_id, "dropping event of an earlier search");
                continue;
            }
            if matches!(event, EngineEvent::BestMove(_)) {
                self.finish_search();
            }
            return Some(event);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        self.finish_search();
    }
}

/// Lock the pool slot. The slot holds plain data, so a poisoned lock is
/// still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Hce;

    fn engine() -> Engine {
        let config = SearchConfig {
            hash_mb: 1,
            ..SearchConfig::default()
        };
        Engine::new(config, Arc::new(Hce)).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SearchConfig {
            threads: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(
            Engine::new(config, Arc::new(Hce)),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn settings_are_validated() {
        let mut engine = engine();
        assert!(engine.set_hash(0).is_err());
        assert_eq!(engine.config().hash_mb, 1);
        engine.set_threads(2).unwrap();
        assert_eq!(engine.config().threads, 2);

        assert!(engine.set_skill_level(21).is_err());
        engine.set_skill_level(5).unwrap();
        engine.set_contempt(-30).unwrap();
        assert!(engine.set_contempt(5000).is_err());
        let pool = lock(&engine.slot);
        let config = pool.as_ref().map(|pool| pool.config().clone()).unwrap();
        assert_eq!((config.skill_level, config.contempt), (5, -30));
    }

    #[test]
    fn stop_and_ponderhit_without_search_are_ignored() {
        let mut engine = engine();
        engine.stop_search();
        engine.ponder_hit();
        assert!(!engine.is_searching());
        assert!(engine.poll_output().is_none());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn failed_spawn_keeps_the_pool() {
        let mut engine = engine();
        engine.set_hash(2).unwrap();
        // Larger than any user address space.
        engine.stack_size = 1 << 50;
        let started =
            engine.start_search(Board::starting_position(), Vec::new(), SearchLimits::depth(1));
        assert!(matches!(started, Err(EngineError::Spawn { .. })));
        assert!(!engine.is_searching());
        let kept = lock(&engine.slot);
        assert_eq!(kept.as_ref().map(|pool| pool.config().hash_mb), Some(2));
        drop(kept);

        engine.stack_size = SEARCH_STACK_SIZE;
        engine
            .start_search(Board::starting_position(), Vec::new(), SearchLimits::depth(1))
            .unwrap();
        assert!(engine.wait_best_move(Duration::from_secs(10)).is_some());
    }

    #[test]
    fn second_go_while_searching_is_refused() {
        let mut engine = engine();
        engine
            .apply_command(EngineCommand::Go(SearchLimits::infinite()))
            .unwrap();
        let again = engine.apply_command(EngineCommand::Go(SearchLimits::depth(1)));
        assert!(matches!(again, Err(EngineError::SearchInProgress)));

        engine.apply_command(EngineCommand::Stop).unwrap();
        let result = engine.wait_best_move(Duration::from_secs(10)).unwrap();
        assert!(!result.best_move.is_null());
        assert!(!engine.is_searching());
    }
}
