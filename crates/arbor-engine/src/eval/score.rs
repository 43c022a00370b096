//! Packed middlegame/endgame score used by the evaluator.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use super::MAX_PHASE;

/// Middlegame and endgame values packed into one `i32`.
///
/// `mg` lives in the upper 16 bits, `eg` in the lower 16. Addition and
/// subtraction work directly on the packed form; extraction of `mg`
/// rounds with `+0x8000` to undo the borrow a negative `eg` leaves behind.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Score(i32);

impl Score {
    pub const ZERO: Score = Score(0);

    #[inline]
    pub const fn new(mg: i16, eg: i16) -> Score {
        Score(((mg as i32) << 16).wrapping_add(eg as i32))
    }

    #[inline]
    pub const fn mg(self) -> i16 {
        (self.0.wrapping_add(0x8000) >> 16) as i16
    }

    #[inline]
    pub const fn eg(self) -> i16 {
        self.0 as i16
    }

    /// Interpolate between `mg` and `eg` by game phase (`MAX_PHASE` = opening).
    #[inline]
    pub fn taper(self, phase: i32) -> i32 {
        let phase = phase.clamp(0, MAX_PHASE);
        (self.mg() as i32 * phase + self.eg() as i32 * (MAX_PHASE - phase)) / MAX_PHASE
    }
}

/// Shorthand for [`Score::new`].
#[allow(non_snake_case)]
#[inline]
pub const fn S(mg: i16, eg: i16) -> Score {
    Score::new(mg, eg)
}

impl Add for Score {
    type Output = Score;
    #[inline]
    fn add(self, rhs: Score) -> Score {
        Score(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Score {
    #[inline]
    fn add_assign(&mut self, rhs: Score) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl Sub for Score {
    type Output = Score;
    #[inline]
    fn sub(self, rhs: Score) -> Score {
        Score(self.0.wrapping_sub(rhs.0))
    }
}

impl SubAssign for Score {
    #[inline]
    fn sub_assign(&mut self, rhs: Score) {
        self.0 = self.0.wrapping_sub(rhs.0);
    }
}

impl Neg for Score {
    type Output = Score;
    #[inline]
    fn neg(self) -> Score {
        Score(self.0.wrapping_neg())
    }
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S({}, {})", self.mg(), self.eg())
    }
}
