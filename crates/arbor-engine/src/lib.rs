//! Search and evaluation for arbor.

pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod oracle;
pub mod search;
pub mod time;

pub use config::{ConfigError, PruningConfig, SearchConfig};
pub use engine::{Engine, EngineCommand, EngineEvent, SearchEngine};
pub use error::EngineError;
pub use eval::{Evaluator, Hce, evaluate};
pub use oracle::{Oracle, OracleHit, Wdl};
pub use search::control::SearchControl;
pub use search::pool::ThreadPool;
pub use search::{PvLine, SearchInfo, SearchResult, SearchStats, UciScore};
pub use time::{Clock, SearchLimits, SearchMode, TimeManager};
