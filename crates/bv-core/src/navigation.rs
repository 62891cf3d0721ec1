//! Search → camera target.
//!
//! A query is projected with the very same projector used to place bubbles,
//! so searching a word flies to where thoughts with that focal word live.
//! The target is then pushed back along z so the camera stops in front of
//! the bubble instead of inside it.

use crate::constants::{ARRIVAL_DISTANCE, GLIDE_FACTOR, STANDOFF_Z};
use crate::position::Position;
use crate::projector::Projector;

#[derive(Clone, Copy, Debug)]
pub struct Navigator {
    projector: Projector,
    standoff: Position,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Projector::default(), STANDOFF_Z)
    }
}

impl Navigator {
    pub fn new(projector: Projector, standoff_z: f64) -> Self {
        Self {
            projector,
            standoff: Position::new(0.0, 0.0, standoff_z),
        }
    }

    pub fn standoff(&self) -> Position {
        self.standoff
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn resolve_target(&self, query: &str) -> Position {
        self.projector.project(query) + self.standoff
    }
}

/// Smooth camera flight toward a resolved target.
///
/// Each step covers a fixed fraction of the remaining distance; once the
/// camera is within the arrival distance it snaps onto the target and the
/// warp ends.
#[derive(Clone, Debug)]
pub struct WarpDrive {
    navigator: Navigator,
    target: Option<Position>,
    glide: f64,
    arrival: f64,
}

impl WarpDrive {
    pub fn new(navigator: Navigator) -> Self {
        Self {
            navigator,
            target: None,
            glide: GLIDE_FACTOR,
            arrival: ARRIVAL_DISTANCE,
        }
    }

    pub fn is_warping(&self) -> bool {
        self.target.is_some()
    }

    pub fn target(&self) -> Option<Position> {
        self.target
    }

    /// Lock onto the location of `query`. Returns the target.
    pub fn engage(&mut self, query: &str) -> Position {
        let target = self.navigator.resolve_target(query);
        self.target = Some(target);
        target
    }

    pub fn disengage(&mut self) {
        self.target = None;
    }

    /// Advance the camera one frame. Without a target the camera stays put.
    pub fn step(&mut self, camera: Position) -> Position {
        let Some(target) = self.target else {
            return camera;
        };
        let next = camera.lerp(target, self.glide);
        if next.distance(target) < self.arrival {
            self.target = None;
            return target;
        }
        next
    }

    /// Number of steps a warp from `from` takes to arrive. Does not engage.
    pub fn steps_to_arrive(&self, from: Position, target: Position) -> usize {
        let mut trial = Self {
            target: Some(target),
            ..self.clone()
        };
        let mut camera = from;
        let mut steps = 0;
        while trial.is_warping() {
            camera = trial.step(camera);
            steps += 1;
        }
        steps
    }
}
