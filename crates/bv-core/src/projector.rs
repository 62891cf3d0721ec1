//! Deterministic text → coordinate projection.
//!
//! Only the focal word of a text is hashed, so two thoughts that share their
//! most specific word land on the same point no matter how they are phrased.
//! The hash is integer-only: every client computes bit-identical coordinates.

use serde::{Deserialize, Serialize};

use crate::constants::{AXIS_PRIMES, SPAN};
use crate::position::Position;
use crate::tokenizer::focal_word;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projector {
    span: i64,
}

impl Default for Projector {
    fn default() -> Self {
        Self::new(SPAN)
    }
}

impl Projector {
    /// Spans below 2 would collapse the cube to a point; they are raised to 2.
    pub fn new(span: u32) -> Self {
        Self {
            span: i64::from(span.max(2)),
        }
    }

    pub fn span(&self) -> i64 {
        self.span
    }

    /// Half the side length of the cube.
    pub fn half_extent(&self) -> f64 {
        (self.span / 2) as f64
    }

    /// Project a full text through its focal word.
    pub fn project(&self, text: &str) -> Position {
        self.project_word(&focal_word(text))
    }

    /// Project a single already-normalized word.
    pub fn project_word(&self, word: &str) -> Position {
        let mut sums = [0i64; 3];
        for (i, code) in word.bytes().enumerate() {
            let axis = i % 3;
            sums[axis] += i64::from(code) * AXIS_PRIMES[axis];
        }
        let [x, y, z] = sums.map(|s| self.fold(s));
        Position::new(x as f64, y as f64, z as f64)
    }

    fn fold(&self, sum: i64) -> i64 {
        sum.rem_euclid(self.span) - self.span / 2
    }
}

/// Project with the default span.
pub fn project(text: &str) -> Position {
    Projector::default().project(text)
}
