//! Lockless clustered transposition table with checksum torn-write detection.
//!
//! The table is an array of 64-byte clusters, four 16-byte entries each.
//! Every entry is two `AtomicU64` words.
//!
//! ## Bit layout
//!
//! ```text
//! word0 (AtomicU64):
//!   bits 63-32: key           (upper 32 bits of Zobrist hash)
//!   bits 31-27: generation    (5 bits, wraps at 32)
//!   bits 25-24: bound         (2 bits)
//!   bits 23-16: depth         (8 bits)
//!   bits 15-0:  move          (16 bits)
//!
//! word1 (AtomicU64):
//!   bits 63-32: check         = key ^ low32(word0) ^ low32(word1)
//!   bits 31-16: score         (i16 as u16)
//!   bits 15-0:  eval          (i16 as u16)
//! ```
//!
//! ## Torn-write detection
//!
//! Writers store both words with `Relaxed` ordering, so a reader racing a
//! writer can observe one old and one new word. The check field covers both
//! words; a reader recomputes it and treats a mismatch as a miss. Torn
//! writes are detected, not prevented, and a discarded valid entry is an
//! accepted false negative.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use arbor_core::Move;
use tracing::info;

use crate::search::MATE_THRESHOLD;

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<TranspositionTable>();
    }
    let _ = check;
};

/// Entries per cluster.
pub const CLUSTER_SIZE: usize = 4;

/// Number of clusters sampled by [`TranspositionTable::hashfull`].
const HASHFULL_SAMPLE: usize = 1000;

/// Stored in place of a static eval the node never computed (in check).
const NO_EVAL: i16 = i16::MIN;

/// Bound type stored in a TT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// Empty slot.
    None = 0,
    /// The stored score is exact (PV node).
    Exact = 1,
    /// The stored score is a lower bound (failed high / beta cutoff).
    Lower = 2,
    /// The stored score is an upper bound (failed low / all-node).
    Upper = 3,
}

impl Bound {
    const fn from_bits(bits: u64) -> Self {
        match bits & 0x03 {
            1 => Bound::Exact,
            2 => Bound::Lower,
            3 => Bound::Upper,
            _ => Bound::None,
        }
    }

    /// Whether `score` with this bound settles the window `(alpha, beta)`.
    #[inline]
    pub fn cuts(self, score: i32, alpha: i32, beta: i32) -> bool {
        match self {
            Bound::Exact => true,
            Bound::Lower => score >= beta,
            Bound::Upper => score <= alpha,
            Bound::None => false,
        }
    }
}

/// Result of a successful TT probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtEntry {
    /// Best move from a previous search; may be stale or null.
    pub best_move: Move,
    pub depth: i32,
    pub bound: Bound,
    /// Score, already converted back to root-relative mate distance.
    pub score: i32,
    /// Static evaluation; `None` if the node was in check.
    pub eval: Option<i32>,
}

/// Convert a search score to TT-storable form.
///
/// Mate scores are stored as distance from the node rather than the root so
/// they stay valid when the position is reached along a different path.
pub fn score_to_tt(score: i32, ply: usize) -> i16 {
    let adjusted = if score > MATE_THRESHOLD {
        score + ply as i32
    } else if score < -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    };
    adjusted as i16
}

/// Reverse of [`score_to_tt`].
pub fn score_from_tt(score: i16, ply: usize) -> i32 {
    let score = score as i32;
    if score > MATE_THRESHOLD {
        score - ply as i32
    } else if score < -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}

struct AtomicEntry {
    word0: AtomicU64,
    word1: AtomicU64,
}

impl AtomicEntry {
    const fn new() -> Self {
        Self {
            word0: AtomicU64::new(0),
            word1: AtomicU64::new(0),
        }
    }

    fn pack(key32: u32, generation: u8, bound: Bound, depth: u8, mv: Move, score: i16, eval: i16) -> (u64, u64) {
        let w0 = ((key32 as u64) << 32)
            | (((generation & 0x1F) as u64) << 27)
            | ((bound as u64) << 24)
            | ((depth as u64) << 16)
            | mv.raw() as u64;
        let data = (((score as u16) as u64) << 16) | (eval as u16) as u64;
        let check = key32 ^ (w0 as u32) ^ (data as u32);
        (w0, ((check as u64) << 32) | data)
    }

    /// Load both words, or `None` if the checksum does not match.
    fn load(&self) -> Option<(u64, u64)> {
        let w0 = self.word0.load(Ordering::Relaxed);
        let w1 = self.word1.load(Ordering::Relaxed);
        let key32 = (w0 >> 32) as u32;
        let check = key32 ^ (w0 as u32) ^ (w1 as u32);
        (check == (w1 >> 32) as u32).then_some((w0, w1))
    }

    fn store(&self, w0: u64, w1: u64) {
        self.word0.store(w0, Ordering::Relaxed);
        self.word1.store(w1, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.store(0, 0);
    }
}

#[inline]
fn key_of(w0: u64) -> u32 {
    (w0 >> 32) as u32
}

#[inline]
fn generation_of(w0: u64) -> u8 {
    ((w0 >> 27) & 0x1F) as u8
}

#[inline]
fn bound_of(w0: u64) -> Bound {
    Bound::from_bits(w0 >> 24)
}

#[inline]
fn depth_of(w0: u64) -> u8 {
    ((w0 >> 16) & 0xFF) as u8
}

#[repr(align(64))]
struct Cluster {
    entries: [AtomicEntry; CLUSTER_SIZE],
}

impl Cluster {
    const fn new() -> Self {
        Self {
            entries: [const { AtomicEntry::new() }; CLUSTER_SIZE],
        }
    }
}

/// Lockless transposition table shared by every search thread.
///
/// All methods take `&self`.
pub struct TranspositionTable {
    clusters: Box<[Cluster]>,
    /// `clusters.len() - 1`; the length is a power of two.
    mask: u64,
    generation: AtomicU8,
    probes: AtomicU64,
    hits: AtomicU64,
}

impl TranspositionTable {
    /// Allocate the largest power-of-two number of clusters fitting in `mb`
    /// megabytes (at least one).
    pub fn new(mb: usize) -> Self {
        let bytes = mb.saturating_mul(1024 * 1024);
        let fitting = bytes / size_of::<Cluster>();
        let count = if fitting == 0 {
            1
        } else {
            1usize << (usize::BITS - 1 - fitting.leading_zeros())
        };

        let clusters: Box<[Cluster]> = (0..count).map(|_| Cluster::new()).collect();
        info!(mb, clusters = count, "transposition table allocated");

        Self {
            clusters,
            mask: (count - 1) as u64,
            generation: AtomicU8::new(0),
            probes: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Number of clusters.
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Empty every slot and reset the generation and counters.
    pub fn clear(&self) {
        for cluster in self.clusters.iter() {
            for entry in &cluster.entries {
                entry.clear();
            }
        }
        self.generation.store(0, Ordering::Relaxed);
        self.probes.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
    }

    /// Advance the generation counter. Call once per search.
    pub fn new_generation(&self) {
        let current = self.generation.load(Ordering::Relaxed);
        self.generation
            .store(current.wrapping_add(1) & 0x1F, Ordering::Relaxed);
    }

    pub fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Total probes since the last clear.
    pub fn probes(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }

    /// Probes that found an entry since the last clear.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[inline]
    fn cluster(&self, hash: u64) -> &Cluster {
        &self.clusters[(hash & self.mask) as usize]
    }

    /// Look up `hash`. Mate scores are converted relative to `ply`.
    pub fn probe(&self, hash: u64, ply: usize) -> Option<TtEntry> {
        self.probes.fetch_add(1, Ordering::Relaxed);
        let key32 = (hash >> 32) as u32;

        let (w0, w1) = self.cluster(hash).entries.iter().find_map(|entry| {
            let (w0, w1) = entry.load()?;
            (key_of(w0) == key32 && bound_of(w0) != Bound::None).then_some((w0, w1))
        })?;

        self.hits.fetch_add(1, Ordering::Relaxed);
        let eval = (w1 & 0xFFFF) as u16 as i16;
        Some(TtEntry {
            best_move: Move::from_raw((w0 & 0xFFFF) as u16),
            depth: depth_of(w0) as i32,
            bound: bound_of(w0),
            score: score_from_tt(((w1 >> 16) & 0xFFFF) as u16 as i16, ply),
            eval: (eval != NO_EVAL).then_some(eval as i32),
        })
    }

    /// Store a search result.
    ///
    /// An entry with the same key is overwritten. Otherwise the least
    /// valuable slot is evicted: empty slots first, then entries from older
    /// searches, then non-exact bounds, then the shallowest.
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        hash: u64,
        depth: i32,
        score: i32,
        eval: Option<i32>,
        best_move: Move,
        bound: Bound,
        ply: usize,
    ) {
        let key32 = (hash >> 32) as u32;
        let generation = self.generation();
        let cluster = self.cluster(hash);

        let mut victim = &cluster.entries[0];
        let mut victim_worth = i32::MAX;
        for entry in &cluster.entries {
            let Some((w0, _)) = entry.load() else {
                victim = entry;
                victim_worth = i32::MIN;
                continue;
            };
            if bound_of(w0) != Bound::None && key_of(w0) == key32 {
                victim = entry;
                break;
            }
            let worth = if bound_of(w0) == Bound::None {
                i32::MIN
            } else {
                ((generation_of(w0) == generation) as i32) << 16
                    | ((bound_of(w0) == Bound::Exact) as i32) << 8
                    | depth_of(w0) as i32
            };
            if worth < victim_worth {
                victim = entry;
                victim_worth = worth;
            }
        }

        let eval = eval.map_or(NO_EVAL, |e| e.clamp(-(i16::MAX as i32), i16::MAX as i32) as i16);
        let (w0, w1) = AtomicEntry::pack(
            key32,
            generation,
            bound,
            depth.clamp(0, u8::MAX as i32) as u8,
            best_move,
            score_to_tt(score, ply),
            eval,
        );
        victim.store(w0, w1);
    }

    /// Permille of sampled entries written during the current search.
    pub fn hashfull(&self) -> u32 {
        let generation = self.generation();
        let sample = &self.clusters[..self.clusters.len().min(HASHFULL_SAMPLE)];
        let used = sample
            .iter()
            .flat_map(|c| c.entries.iter())
            .filter_map(AtomicEntry::load)
            .filter(|&(w0, _)| bound_of(w0) != Bound::None && generation_of(w0) == generation)
            .count();
        (used * 1000 / (sample.len() * CLUSTER_SIZE)) as u32
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("clusters", &self.clusters.len())
            .field("generation", &self.generation())
            .finish()
    }
}
