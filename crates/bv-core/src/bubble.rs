use serde::{Deserialize, Serialize};

use crate::position::Position;

/// One thought in the universe, keyed by its content identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bubble {
    pub id: String,
    pub position: Position,
    /// Display only. Never part of lookup or equality of content.
    pub label: String,
    pub view_count: u64,
    /// Unix milliseconds of first publication.
    pub created_at: u64,
}

impl Bubble {
    /// Rendered radius: ln(views + 2). Grows with attention but never explodes.
    pub fn visual_scale(&self) -> f64 {
        visual_scale(self.view_count)
    }

    /// Full wire record for publishing.
    pub fn to_record(&self) -> BubbleRecord {
        BubbleRecord::from(self)
    }
}

pub fn visual_scale(view_count: u64) -> f64 {
    (view_count as f64 + 2.0).ln()
}

/// A bubble as it travels through the sync space.
///
/// Every field is optional: remote peers may hold partially written entries,
/// and the reconciler decides what is usable. Field names follow the shared
/// namespace's wire format.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BubbleRecord {
    #[serde(rename = "cid", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "views", default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(rename = "timestamp", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
}

impl BubbleRecord {
    /// The id if present and non-empty.
    pub fn key(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Position when all three axes are present.
    pub fn position(&self) -> Option<Position> {
        match (self.x, self.y, self.z) {
            (Some(x), Some(y), Some(z)) => Some(Position::new(x, y, z)),
            _ => None,
        }
    }

    /// True when some but not all axes are present.
    pub fn has_partial_position(&self) -> bool {
        let present = [self.x, self.y, self.z].iter().filter(|v| v.is_some()).count();
        present != 0 && present != 3
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&Bubble> for BubbleRecord {
    fn from(b: &Bubble) -> Self {
        Self {
            id: Some(b.id.clone()),
            x: Some(b.position.x),
            y: Some(b.position.y),
            z: Some(b.position.z),
            label: Some(b.label.clone()),
            view_count: Some(b.view_count),
            created_at: Some(b.created_at),
        }
    }
}
