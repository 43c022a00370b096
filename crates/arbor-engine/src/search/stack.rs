//! Per-ply search records.

use std::ops::{Index, IndexMut};

use arbor_core::{Move, Role, Square};

use crate::search::MAX_PLY;

/// What the search knows about one ply of the current line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEntry {
    /// Static evaluation, `None` when in check.
    pub static_eval: Option<i32>,
    pub killers: [Move; 2],
    /// Piece and destination of the move played from this ply.
    pub moved: Option<(Role, Square)>,
    /// Move skipped by a singular-extension verification search.
    pub excluded: Move,
    /// The move played from this ply was a null move.
    pub null_move: bool,
}

impl StackEntry {
    pub const EMPTY: StackEntry = StackEntry {
        static_eval: None,
        killers: [Move::NULL; 2],
        moved: None,
        excluded: Move::NULL,
        null_move: false,
    };

    /// Record a quiet move that caused a cutoff.
    ///
    /// Shifts slot 0 to slot 1 if the new move differs from slot 0.
    pub fn store_killer(&mut self, mv: Move) {
        if self.killers[0] != mv {
            self.killers[1] = self.killers[0];
            self.killers[0] = mv;
        }
    }

    pub fn is_killer(&self, mv: Move) -> bool {
        !mv.is_null() && self.killers.contains(&mv)
    }
}

/// Fixed array of [`StackEntry`], indexed by ply.
///
/// Two spare entries past `MAX_PLY` let a node at the ply limit clear the
/// killers of its children without bounds checks.
pub struct SearchStack {
    entries: [StackEntry; MAX_PLY + 2],
}

impl SearchStack {
    pub fn new() -> Self {
        Self {
            entries: [StackEntry::EMPTY; MAX_PLY + 2],
        }
    }

    /// The entry `back` plies above `ply`, if the line is that long.
    pub fn ancestor(&self, ply: usize, back: usize) -> Option<&StackEntry> {
        ply.checked_sub(back).map(|p| &self.entries[p])
    }

    /// Piece/destination played `back` plies above `ply`.
    pub fn moved_before(&self, ply: usize, back: usize) -> Option<(Role, Square)> {
        self.ancestor(ply, back).and_then(|e| e.moved)
    }

    /// Static eval at `ply` is above the one two plies earlier.
    pub fn improving(&self, ply: usize) -> bool {
        match (
            self.entries[ply].static_eval,
            self.ancestor(ply, 2).and_then(|e| e.static_eval),
        ) {
            (Some(now), Some(before)) => now > before,
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.entries = [StackEntry::EMPTY; MAX_PLY + 2];
    }
}

impl Default for SearchStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for SearchStack {
    type Output = StackEntry;

    fn index(&self, ply: usize) -> &StackEntry {
        &self.entries[ply]
    }
}

impl IndexMut<usize> for SearchStack {
    fn index_mut(&mut self, ply: usize) -> &mut StackEntry {
        &mut self.entries[ply]
    }
}
