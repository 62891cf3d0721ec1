//! The universe registry: one live bubble per content id.
//!
//! Local creations and remote records both flow through here. Remote
//! records are upserted in arrival order with plain overwrite; there is no
//! clock-based conflict resolution. Every change to the registry queues a
//! [`UniverseEvent`] for the renderer to drain.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::bubble::{Bubble, BubbleRecord};
use crate::constants::FALLBACK_LABEL;
use crate::error::{Result, UniverseError};
use crate::lifecycle::LifecycleRules;
use crate::position::Position;
use crate::time::now_unix_millis;
use crate::tokenizer::extract_label;

/// Registry diff consumed by the rendering side.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UniverseEvent {
    Added {
        id: String,
        position: Position,
        label: String,
        view_count: u64,
    },
    Updated {
        id: String,
        position: Position,
        view_count: u64,
    },
}

impl UniverseEvent {
    pub fn id(&self) -> &str {
        match self {
            Self::Added { id, .. } | Self::Updated { id, .. } => id,
        }
    }

    fn added(b: &Bubble) -> Self {
        Self::Added {
            id: b.id.clone(),
            position: b.position,
            label: b.label.clone(),
            view_count: b.view_count,
        }
    }

    fn updated(b: &Bubble) -> Self {
        Self::Updated {
            id: b.id.clone(),
            position: b.position,
            view_count: b.view_count,
        }
    }
}

/// In-memory universe owned by a single client.
///
/// Bubbles keep their first-seen order so snapshots are stable.
#[derive(Debug, Default)]
pub struct Universe {
    bubbles: Vec<Bubble>,
    index: HashMap<String, usize>,
    events: VecDeque<UniverseEvent>,
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Bubble> {
        self.index.get(id).map(|&i| &self.bubbles[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Borrowed view of every bubble in first-seen order.
    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    /// Owned copy of the registry reflecting every update applied so far.
    pub fn snapshot(&self) -> Vec<Bubble> {
        self.bubbles.clone()
    }

    /// Take all queued events in the order they happened.
    pub fn drain_events(&mut self) -> Vec<UniverseEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Register a locally submitted thought and return the record to publish.
    pub fn create(&mut self, id: &str, text: &str, position: Position) -> Result<BubbleRecord> {
        self.create_at(id, text, position, now_unix_millis())
    }

    /// [`Universe::create`] with an explicit creation time.
    ///
    /// Re-submitting text that already has a bubble keeps its view count and
    /// creation time; only position and label are refreshed.
    pub fn create_at(
        &mut self,
        id: &str,
        text: &str,
        position: Position,
        created_at: u64,
    ) -> Result<BubbleRecord> {
        if id.is_empty() {
            return Err(UniverseError::InvalidContent);
        }
        let label = extract_label(text);

        if let Some(&i) = self.index.get(id) {
            let bubble = &mut self.bubbles[i];
            bubble.position = position;
            bubble.label = label;
            self.events.push_back(UniverseEvent::updated(bubble));
            return Ok(bubble.to_record());
        }

        let bubble = Bubble {
            id: id.to_string(),
            position,
            label,
            view_count: 1,
            created_at,
        };
        let record = bubble.to_record();
        self.insert(bubble);
        Ok(record)
    }

    /// Apply one record from the sync space.
    ///
    /// Unseen ids are inserted (`Added`), known ids are overwritten with the
    /// incoming position and view count (`Updated`). Fields missing from a
    /// known bubble's record keep their current values. Applying the same
    /// record twice leaves the registry as applying it once.
    pub fn on_remote_update(&mut self, record: &BubbleRecord) -> Result<UniverseEvent> {
        let Some(id) = record.key() else {
            return Err(UniverseError::MalformedRecord("missing id".into()));
        };
        if record.has_partial_position() {
            return Err(UniverseError::MalformedRecord(format!(
                "partial position for {id}"
            )));
        }
        let position = record.position();
        if position.is_some_and(|p| !p.is_finite()) {
            return Err(UniverseError::MalformedRecord(format!(
                "non-finite position for {id}"
            )));
        }

        if let Some(&i) = self.index.get(id) {
            let bubble = &mut self.bubbles[i];
            if let Some(p) = position {
                bubble.position = p;
            }
            if let Some(views) = record.view_count {
                bubble.view_count = views;
            }
            if let Some(label) = record.label.as_deref().filter(|l| !l.is_empty()) {
                bubble.label = label.to_string();
            }
            let event = UniverseEvent::updated(bubble);
            self.events.push_back(event.clone());
            return Ok(event);
        }

        let Some(position) = position else {
            return Err(UniverseError::MalformedRecord(format!(
                "no position for new bubble {id}"
            )));
        };
        let bubble = Bubble {
            id: id.to_string(),
            position,
            label: record
                .label
                .clone()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| FALLBACK_LABEL.to_string()),
            view_count: record.view_count.unwrap_or(0),
            created_at: record.created_at.unwrap_or(0),
        };
        let event = UniverseEvent::added(&bubble);
        self.insert(bubble);
        Ok(event)
    }

    /// Bump a bubble's view count by one and return the record to republish.
    ///
    /// This is a read-modify-write against the last value this client saw.
    /// Two clients pulsing the same bubble concurrently can lose a view; the
    /// counter is lossy across processes and nothing here tries to prevent it.
    pub fn pulse(&mut self, id: &str) -> Result<BubbleRecord> {
        let Some(&i) = self.index.get(id) else {
            return Err(UniverseError::UnknownBubble(id.to_string()));
        };
        let bubble = &mut self.bubbles[i];
        bubble.view_count = bubble.view_count.saturating_add(1);
        self.events.push_back(UniverseEvent::updated(bubble));
        Ok(bubble.to_record())
    }

    /// Apply one entropy step to every bubble. Returns the records to republish.
    pub fn drift(&mut self, rules: &LifecycleRules) -> Vec<BubbleRecord> {
        let mut records = Vec::with_capacity(self.bubbles.len());
        for bubble in &mut self.bubbles {
            bubble.position = rules.apply_entropy(bubble);
            self.events.push_back(UniverseEvent::updated(bubble));
            records.push(bubble.to_record());
        }
        records
    }

    /// Bubbles the rules classify as dissipation-eligible. Nothing is removed.
    pub fn dissipation_candidates(&self, rules: &LifecycleRules) -> Vec<&Bubble> {
        self.bubbles
            .iter()
            .filter(|b| rules.should_dissipate(b))
            .collect()
    }

    fn insert(&mut self, bubble: Bubble) {
        self.events.push_back(UniverseEvent::added(&bubble));
        self.index.insert(bubble.id.clone(), self.bubbles.len());
        self.bubbles.push(bubble);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, x: f64, views: u64) -> BubbleRecord {
        BubbleRecord {
            id: Some(id.into()),
            x: Some(x),
            y: Some(0.0),
            z: Some(0.0),
            label: Some("label".into()),
            view_count: Some(views),
            created_at: Some(1000),
        }
    }

    #[test]
    fn test_create_inserts_with_one_view() {
        let mut u = Universe::new();
        let rec = u
            .create_at("cid1", "Drifting through the cosmos", Position::new(1.0, 2.0, 3.0), 42)
            .unwrap();
        assert_eq!(rec.view_count, Some(1));
        assert_eq!(rec.created_at, Some(42));
        let b = u.get("cid1").unwrap();
        assert_eq!(b.view_count, 1);
        assert_eq!(b.label, "drifting");
        assert_eq!(u.drain_events().len(), 1);
    }

    #[test]
    fn test_create_empty_id_rejected() {
        let mut u = Universe::new();
        let err = u.create("", "text", Position::origin()).unwrap_err();
        assert_eq!(err, UniverseError::InvalidContent);
        assert!(u.is_empty());
        assert_eq!(u.pending_events(), 0);
    }

    #[test]
    fn test_create_existing_keeps_views_and_timestamp() {
        let mut u = Universe::new();
        u.create_at("cid", "alpha", Position::origin(), 10).unwrap();
        u.pulse("cid").unwrap();
        let rec = u
            .create_at("cid", "alpha", Position::new(5.0, 5.0, 5.0), 99)
            .unwrap();
        assert_eq!(rec.view_count, Some(2));
        assert_eq!(rec.created_at, Some(10));
        assert_eq!(u.len(), 1);
    }

    #[test]
    fn test_remote_new_then_known() {
        let mut u = Universe::new();
        let ev = u.on_remote_update(&record("a", 1.0, 1)).unwrap();
        assert!(matches!(ev, UniverseEvent::Added { .. }));
        assert_eq!(u.len(), 1);

        let ev = u.on_remote_update(&record("a", 2.0, 4)).unwrap();
        assert!(matches!(ev, UniverseEvent::Updated { view_count: 4, .. }));
        assert_eq!(u.len(), 1);
        assert_eq!(u.get("a").unwrap().position.x, 2.0);
    }

    #[test]
    fn test_remote_missing_id_dropped() {
        let mut u = Universe::new();
        let mut rec = record("a", 1.0, 1);
        rec.id = None;
        assert!(matches!(
            u.on_remote_update(&rec),
            Err(UniverseError::MalformedRecord(_))
        ));
        assert!(u.is_empty());
        assert_eq!(u.pending_events(), 0);
    }

    #[test]
    fn test_remote_new_without_position_dropped() {
        let mut u = Universe::new();
        let rec = BubbleRecord {
            id: Some("a".into()),
            view_count: Some(3),
            ..Default::default()
        };
        assert!(u.on_remote_update(&rec).is_err());
        assert!(u.is_empty());
    }

    #[test]
    fn test_remote_views_only_updates_known() {
        let mut u = Universe::new();
        u.on_remote_update(&record("a", 7.0, 1)).unwrap();
        let rec = BubbleRecord {
            id: Some("a".into()),
            view_count: Some(9),
            ..Default::default()
        };
        u.on_remote_update(&rec).unwrap();
        let b = u.get("a").unwrap();
        assert_eq!(b.view_count, 9);
        assert_eq!(b.position.x, 7.0);
        assert_eq!(b.created_at, 1000);
    }

    #[test]
    fn test_remote_partial_position_dropped() {
        let mut u = Universe::new();
        u.on_remote_update(&record("a", 7.0, 1)).unwrap();
        let rec = BubbleRecord {
            id: Some("a".into()),
            x: Some(1.0),
            ..Default::default()
        };
        assert!(u.on_remote_update(&rec).is_err());
        assert_eq!(u.get("a").unwrap().position.x, 7.0);
    }

    #[test]
    fn test_remote_non_finite_dropped() {
        let mut u = Universe::new();
        assert!(u.on_remote_update(&record("a", f64::INFINITY, 1)).is_err());
        assert!(u.is_empty());
    }

    #[test]
    fn test_remote_never_touches_created_at() {
        let mut u = Universe::new();
        u.on_remote_update(&record("a", 1.0, 1)).unwrap();
        let mut later = record("a", 1.0, 2);
        later.created_at = Some(5000);
        u.on_remote_update(&later).unwrap();
        assert_eq!(u.get("a").unwrap().created_at, 1000);
    }

    #[test]
    fn test_pulse_unknown() {
        let mut u = Universe::new();
        assert_eq!(
            u.pulse("ghost").unwrap_err(),
            UniverseError::UnknownBubble("ghost".into())
        );
    }

    #[test]
    fn test_pulse_emits_update() {
        let mut u = Universe::new();
        u.create_at("a", "text", Position::origin(), 0).unwrap();
        u.drain_events();
        let rec = u.pulse("a").unwrap();
        assert_eq!(rec.view_count, Some(2));
        let events = u.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id(), "a");
    }

    #[test]
    fn test_snapshot_preserves_first_seen_order() {
        let mut u = Universe::new();
        for id in ["z", "a", "m"] {
            u.on_remote_update(&record(id, 0.0, 0)).unwrap();
        }
        u.on_remote_update(&record("a", 3.0, 0)).unwrap();
        let ids: Vec<String> = u.snapshot().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_drift_moves_everything_outward() {
        let mut u = Universe::new();
        u.on_remote_update(&record("a", 100.0, 0)).unwrap();
        u.on_remote_update(&record("b", -100.0, 9)).unwrap();
        u.drain_events();
        let records = u.drift(&LifecycleRules::default());
        assert_eq!(records.len(), 2);
        assert!(u.get("a").unwrap().position.x > 100.0);
        assert!(u.get("b").unwrap().position.x < -100.0);
        assert_eq!(u.drain_events().len(), 2);
    }

    #[test]
    fn test_dissipation_candidates_classify_only() {
        let mut u = Universe::new();
        u.on_remote_update(&record("far", 60_000.0, 0)).unwrap();
        u.on_remote_update(&record("near", 10.0, 0)).unwrap();
        let rules = LifecycleRules::default();
        let ids: Vec<&str> = u
            .dissipation_candidates(&rules)
            .into_iter()
            .map(|b| b.id.as_str())
            .collect();
        assert_eq!(ids, vec!["far"]);
        assert_eq!(u.len(), 2);
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let ev = UniverseEvent::Updated {
            id: "a".into(),
            position: Position::origin(),
            view_count: 3,
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["kind"], "updated");
        assert_eq!(v["view_count"], 3);
    }
}
