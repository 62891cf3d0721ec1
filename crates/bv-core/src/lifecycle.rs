//! Entropy and dissipation rules.
//!
//! Every bubble feels a slight outward push from the origin; rarely viewed
//! ones drift faster. Once a bubble is far out in the void and still
//! unobserved it becomes eligible for dissipation. Both rules are pure:
//! nothing here ticks on its own and nothing is ever deleted.

use serde::{Deserialize, Serialize};

use crate::bubble::Bubble;
use crate::constants::{ENTROPY_PUSH, VIEW_FLOOR, VOID_RADIUS};
use crate::position::Position;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LifecycleRules {
    pub entropy_push: f64,
    pub void_radius: f64,
    pub view_floor: u64,
}

impl Default for LifecycleRules {
    fn default() -> Self {
        Self {
            entropy_push: ENTROPY_PUSH,
            void_radius: VOID_RADIUS,
            view_floor: VIEW_FLOOR,
        }
    }
}

impl LifecycleRules {
    /// Position after one entropy step: scaled outward by
    /// `1 + push / (views + 1)`.
    pub fn apply_entropy(&self, bubble: &Bubble) -> Position {
        let observation = 1.0 / (bubble.view_count as f64 + 1.0);
        bubble.position * (1.0 + self.entropy_push * observation)
    }

    /// Far beyond the void radius and below the view floor.
    pub fn should_dissipate(&self, bubble: &Bubble) -> bool {
        bubble.position.norm() > self.void_radius && bubble.view_count < self.view_floor
    }
}
