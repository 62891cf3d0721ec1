use serde::{Deserialize, Serialize};

use crate::constants::{ENTROPY_PUSH, NAMESPACE, SPAN, STANDOFF_Z, VIEW_FLOOR, VOID_RADIUS};
use crate::lifecycle::LifecycleRules;
use crate::navigation::Navigator;
use crate::projector::Projector;

/// Tunables shared by every client of one universe.
///
/// `span` must match across clients or they stop converging spatially.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub span: u32,
    pub standoff: f64,
    pub entropy_push: f64,
    pub void_radius: f64,
    pub view_floor: u64,
    pub namespace: String,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            span: SPAN,
            standoff: STANDOFF_Z,
            entropy_push: ENTROPY_PUSH,
            void_radius: VOID_RADIUS,
            view_floor: VIEW_FLOOR,
            namespace: NAMESPACE.to_string(),
        }
    }
}

impl UniverseConfig {
    pub fn projector(&self) -> Projector {
        Projector::new(self.span)
    }

    pub fn navigator(&self) -> Navigator {
        Navigator::new(self.projector(), self.standoff)
    }

    pub fn lifecycle(&self) -> LifecycleRules {
        LifecycleRules {
            entropy_push: self.entropy_push,
            void_radius: self.void_radius,
            view_floor: self.view_floor,
        }
    }
}
