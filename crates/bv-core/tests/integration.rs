//! Integration tests across the engine:
//! project → create → publish/echo → reconcile → navigate.

use approx::assert_relative_eq;
use bv_core::{
    BubbleRecord, LifecycleRules, Navigator, Position, Projector, SENTINEL_WORD, Universe,
    UniverseEvent, focal_word, project, similarity,
};
use proptest::prelude::*;

/// Exact bit pattern of a position. `Position`'s `PartialEq` tolerates an
/// epsilon; projection has to agree to the last bit across clients.
fn bits(p: Position) -> [u64; 3] {
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

/// Simulates another client: it projects and creates independently and
/// hands back the record it would publish.
fn publish_from_peer(peer: &mut Universe, id: &str, text: &str) -> BubbleRecord {
    let pos = Projector::default().project(text);
    peer.create(id, text, pos).unwrap()
}

#[test]
fn two_clients_converge_on_same_position() {
    let mut alice = Universe::new();
    let mut bob = Universe::new();

    let rec_a = publish_from_peer(&mut alice, "cid-a", "Wanderlust keeps me awake");
    let rec_b = publish_from_peer(&mut bob, "cid-b", "pure wanderlust tonight");

    // both thoughts share the focal word, so both clients place them together
    assert_eq!(rec_a.position().map(bits), rec_b.position().map(bits));

    alice.on_remote_update(&rec_b).unwrap();
    bob.on_remote_update(&rec_a).unwrap();
    assert_eq!(alice.len(), 2);
    assert_eq!(bob.len(), 2);
    assert_eq!(
        bits(alice.get("cid-b").unwrap().position),
        bits(bob.get("cid-b").unwrap().position)
    );
}

#[test]
fn own_echo_is_an_update_not_a_duplicate() {
    let mut u = Universe::new();
    let rec = publish_from_peer(&mut u, "cid", "echoes in the void");
    assert_eq!(u.drain_events().len(), 1);

    let ev = u.on_remote_update(&rec).unwrap();
    assert!(matches!(ev, UniverseEvent::Updated { view_count: 1, .. }));
    assert_eq!(u.len(), 1);
}

#[test]
fn remote_update_is_idempotent() {
    let rec = BubbleRecord {
        id: Some("x".into()),
        x: Some(10.0),
        y: Some(-20.0),
        z: Some(30.0),
        label: Some("orbit".into()),
        view_count: Some(3),
        created_at: Some(1_000),
    };

    let mut once = Universe::new();
    once.on_remote_update(&rec).unwrap();

    let mut twice = Universe::new();
    twice.on_remote_update(&rec).unwrap();
    twice.on_remote_update(&rec).unwrap();

    assert_eq!(once.snapshot(), twice.snapshot());
}

#[test]
fn upsert_emits_exactly_one_event_each() {
    let mut u = Universe::new();
    let rec = BubbleRecord {
        id: Some("n".into()),
        x: Some(0.0),
        y: Some(0.0),
        z: Some(0.0),
        ..Default::default()
    };

    u.on_remote_update(&rec).unwrap();
    let events = u.drain_events();
    assert_eq!(u.len(), 1);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], UniverseEvent::Added { .. }));

    u.on_remote_update(&rec).unwrap();
    let events = u.drain_events();
    assert_eq!(u.len(), 1);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], UniverseEvent::Updated { .. }));
}

#[test]
fn malformed_stream_does_not_poison_registry() {
    let mut u = Universe::new();
    let stream = [
        r#"{"cid":"good","x":1,"y":2,"z":3,"views":1}"#,
        r#"{"x":1,"y":2,"z":3}"#,
        r#"{"cid":"","x":1,"y":2,"z":3}"#,
        r#"{"cid":"half","x":1}"#,
        r#"{"cid":"good","views":2}"#,
    ];
    let mut dropped = 0;
    for raw in stream {
        let rec = BubbleRecord::from_json(raw).unwrap();
        if u.on_remote_update(&rec).is_err() {
            dropped += 1;
        }
    }
    assert_eq!(dropped, 3);
    assert_eq!(u.len(), 1);
    assert_eq!(u.get("good").unwrap().view_count, 2);
}

#[test]
fn sequential_pulses_add_exactly_n() {
    let mut u = Universe::new();
    u.create("cid", "observe me", Position::origin()).unwrap();
    for _ in 0..25 {
        u.pulse("cid").unwrap();
    }
    assert_eq!(u.get("cid").unwrap().view_count, 26);
}

#[test]
fn pulses_survive_publish_roundtrip() {
    let mut local = Universe::new();
    let mut remote = Universe::new();
    let rec = local.create("cid", "observe me", Position::origin()).unwrap();
    remote.on_remote_update(&rec).unwrap();

    for _ in 0..3 {
        let rec = local.pulse("cid").unwrap();
        remote.on_remote_update(&rec).unwrap();
    }
    assert_eq!(remote.get("cid").unwrap().view_count, 4);
}

#[test]
fn lost_update_race_between_clients() {
    // both clients read views=1 and write 2: one increment is lost
    let mut a = Universe::new();
    let mut b = Universe::new();
    let seed = a.create("cid", "contested", Position::origin()).unwrap();
    b.on_remote_update(&seed).unwrap();

    let from_a = a.pulse("cid").unwrap();
    let from_b = b.pulse("cid").unwrap();
    a.on_remote_update(&from_b).unwrap();
    b.on_remote_update(&from_a).unwrap();

    assert_eq!(a.get("cid").unwrap().view_count, 2);
    assert_eq!(b.get("cid").unwrap().view_count, 2);
}

#[test]
fn search_lands_where_thought_was_placed() {
    let nav = Navigator::default();
    let text = "The quick brown fox jumps";
    let placed = project(text);
    assert_eq!(focal_word(text), "quick");
    assert_eq!(bits(nav.resolve_target("quick") - nav.standoff()), bits(placed));
}

#[test]
fn dissipation_scenario() {
    let rules = LifecycleRules {
        void_radius: 20_000.0,
        view_floor: 5,
        ..Default::default()
    };
    let mut u = Universe::new();
    u.on_remote_update(&BubbleRecord {
        id: Some("lost".into()),
        x: Some(0.0),
        y: Some(25_000.0),
        z: Some(0.0),
        view_count: Some(0),
        ..Default::default()
    })
    .unwrap();
    assert!(rules.should_dissipate(u.get("lost").unwrap()));

    u.on_remote_update(&BubbleRecord {
        id: Some("lost".into()),
        view_count: Some(10),
        ..Default::default()
    })
    .unwrap();
    assert!(!rules.should_dissipate(u.get("lost").unwrap()));
}

#[test]
fn repeated_entropy_eventually_reaches_void() {
    let rules = LifecycleRules {
        entropy_push: 0.5,
        void_radius: 10_000.0,
        view_floor: 5,
    };
    let mut u = Universe::new();
    u.create("cid", "lonely", Position::new(1_000.0, 0.0, 0.0)).unwrap();
    // pulse count stays at 1 so the factor is 1.25 per step
    let mut steps = 0;
    while u.dissipation_candidates(&rules).is_empty() {
        u.drift(&rules);
        steps += 1;
        assert!(steps < 100, "bubble never drifted into the void");
    }
    assert_relative_eq!(
        u.get("cid").unwrap().position.x,
        1_000.0 * 1.25f64.powi(steps),
        max_relative = 1e-9
    );
}

#[test]
fn similarity_is_symmetric_and_self_one() {
    let a = "stars drift across the silent sky";
    let b = "the sky is silent tonight";
    assert_relative_eq!(similarity(a, b), similarity(b, a));
    assert_relative_eq!(similarity(a, a), 1.0);
}

#[test]
fn sentinel_projection_for_empty_inputs() {
    let sentinel = Projector::default().project_word(SENTINEL_WORD);
    for text in ["", "   ", "123 456", "!!! ???", "\n\t"] {
        assert_eq!(bits(project(text)), bits(sentinel), "input {text:?}");
    }
}

proptest! {
    #[test]
    fn projection_is_bounded(text in "\\PC{0,64}", span in 2u32..20_000) {
        let proj = Projector::new(span);
        let half = (span / 2) as f64;
        let p = proj.project(&text);
        for c in [p.x, p.y, p.z] {
            prop_assert!(c >= -half && c < span as f64 - half);
            prop_assert!(c >= -(span as f64) / 2.0 && c < span as f64 / 2.0);
        }
    }

    #[test]
    fn projection_depends_only_on_focal_word(
        word in "[a-z]{8,12}",
        pad_a in proptest::collection::vec("[a-z]{1,7}", 0..5),
        pad_b in proptest::collection::vec("[a-z]{1,7}", 0..5),
    ) {
        let a = format!("{} {word}", pad_a.join(" "));
        let b = format!("{word} {}", pad_b.join(" ").to_uppercase());
        prop_assert_eq!(focal_word(&a), word.clone());
        prop_assert_eq!(focal_word(&b), word);
        prop_assert_eq!(bits(project(&a)), bits(project(&b)));
    }

    #[test]
    fn similarity_in_unit_interval(a in "\\PC{0,40}", b in "\\PC{0,40}") {
        let s = similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&s));
        prop_assert!(!s.is_nan());
    }

    #[test]
    fn target_minus_standoff_is_projection(q in "\\PC{0,40}") {
        let nav = Navigator::default();
        prop_assert_eq!(bits(nav.resolve_target(&q) - nav.standoff()), bits(project(&q)));
    }
}
