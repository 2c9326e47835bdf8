use std::cell::RefCell;
use std::rc::Rc;

use sim_ecs::prelude::*;

type EventLog = Rc<RefCell<Vec<(String, EntityId)>>>;

fn recorder(log: &EventLog, label: &str) -> impl FnMut(&mut World, EntityId) + 'static {
    let log = Rc::clone(log);
    let label = label.to_string();
    move |_world, entity| log.borrow_mut().push((label.clone(), entity))
}

#[test]
fn create_with_fires_one_add_per_component() {
    let mut world = World::new();
    let a = world.define_uniform("A", "f32", &["v"]).unwrap();
    let b = world.define_uniform("B", "f32", &["v"]).unwrap();
    let c = world.define_tag("C");

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    world.on_add(a, recorder(&log, "a"));
    world.on_add(b, recorder(&log, "b"));
    world.on_add(c, recorder(&log, "c"));

    let id = world.create_entity_with(&[
        (a, Record::new().with("v", 1.0)),
        (b, Record::new().with("v", 2.0)),
        (c, Record::new()),
    ]);
    world.flush_hooks();

    let events = log.borrow().clone();
    assert_eq!(events.len(), 3);
    for label in ["a", "b", "c"] {
        assert_eq!(
            events.iter().filter(|(l, e)| l == label && *e == id).count(),
            1,
            "observer {label} must fire exactly once"
        );
    }
}

#[test]
fn events_buffer_until_flush() {
    let mut world = World::new();
    let health = world.define_uniform("Health", "f32", &["hp"]).unwrap();

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    world.on_add(health, recorder(&log, "add"));

    world.create_entity_with(&[(health, Record::new().with("hp", 10.0))]);
    assert!(log.borrow().is_empty(), "nothing fires before flush");

    world.flush_hooks();
    assert_eq!(log.borrow().len(), 1);

    // Idempotent: a second flush with nothing pending fires nothing.
    world.flush_hooks();
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn adds_flush_before_removes_in_subscription_order() {
    let mut world = World::new();
    let a = world.define_uniform("A", "f32", &["v"]).unwrap();
    let b = world.define_uniform("B", "f32", &["v"]).unwrap();

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    world.on_remove(b, recorder(&log, "remove-b"));
    world.on_add(a, recorder(&log, "add-a"));
    world.on_add(b, recorder(&log, "add-b"));

    let id = world.create_entity_with(&[
        (a, Record::new().with("v", 1.0)),
        (b, Record::new().with("v", 2.0)),
    ]);
    world.remove_component(id, b);
    world.flush_hooks();

    let labels: Vec<String> = log.borrow().iter().map(|(l, _)| l.clone()).collect();
    // All pending adds fire first (components in first-subscription
    // order: b was subscribed first), then pending removes.
    assert_eq!(labels, vec!["add-b", "add-a", "remove-b"]);
}

#[test]
fn overwrite_add_fires_no_event() {
    let mut world = World::new();
    let health = world.define_uniform("Health", "f32", &["hp"]).unwrap();

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    world.on_add(health, recorder(&log, "add"));

    let id = world.create_entity_with(&[(health, Record::new().with("hp", 10.0))]);
    world.flush_hooks();
    assert_eq!(log.borrow().len(), 1);

    // Same component again: row overwrite, no event, other data intact.
    world.add_component(id, health, Some(&Record::new().with("hp", 25.0)));
    world.flush_hooks();
    assert_eq!(log.borrow().len(), 1);

    let hp = world.field_ref(health, "hp").unwrap();
    assert_eq!(world.get(id, hp).unwrap().as_num(), Some(25.0));
}

#[test]
fn first_time_add_after_bare_create_fires() {
    let mut world = World::new();
    let health = world.define_uniform("Health", "f32", &["hp"]).unwrap();

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    world.on_add(health, recorder(&log, "add"));

    let id = world.create_entity();
    world.flush_hooks();
    assert!(log.borrow().is_empty(), "bare create fires nothing");

    world.add_component(id, health, Some(&Record::new().with("hp", 5.0)));
    world.flush_hooks();
    assert_eq!(log.borrow().clone(), vec![("add".to_string(), id)]);
}

#[test]
fn remove_observer_reads_tombstone_until_commit() {
    let mut world = World::new();
    let health = world.define_uniform("Health", "f32", &["hp"]).unwrap();
    let hp = world.field_ref(health, "hp").unwrap();

    let seen: Rc<RefCell<Vec<Option<f64>>>> = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = Rc::clone(&seen);
        world.on_remove(health, move |world, entity| {
            seen.borrow_mut().push(world.get(entity, hp).and_then(|v| v.as_num()));
        });
    }

    let id = world.create_entity_with(&[(health, Record::new().with("hp", 42.0))]);
    world.flush_hooks();

    world.remove_component(id, health);
    world.flush_hooks();

    // The observer read the deceased row.
    assert_eq!(seen.borrow().clone(), vec![Some(42.0)]);

    // Tombstone data stays readable until the commit boundary.
    assert_eq!(world.get(id, hp).unwrap().as_num(), Some(42.0));
    assert_eq!(
        world.get_component(id, health).unwrap().get("hp").unwrap().as_num(),
        Some(42.0)
    );

    world.commit_removals();
    assert_eq!(world.get(id, hp), None);
    assert!(world.get_component(id, health).is_none());

    // Idempotent.
    world.commit_removals();
    assert_eq!(world.get(id, hp), None);
}

#[test]
fn destroy_fires_one_remove_per_component() {
    let mut world = World::new();
    let a = world.define_uniform("A", "f32", &["v"]).unwrap();
    let b = world.define_tag("B");

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    world.on_remove(a, recorder(&log, "a"));
    world.on_remove(b, recorder(&log, "b"));

    let id = world.create_entity_with(&[(a, Record::new().with("v", 1.0)), (b, Record::new())]);
    world.flush_hooks();

    world.destroy_entity(id);
    world.flush_hooks();

    let events = log.borrow().clone();
    assert_eq!(events.len(), 2);
    assert!(events.contains(&("a".to_string(), id)));
    assert!(events.contains(&("b".to_string(), id)));
}

#[test]
fn unsubscribed_observers_stop_firing() {
    let mut world = World::new();
    let health = world.define_uniform("Health", "f32", &["hp"]).unwrap();

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let handle = world.on_add(health, recorder(&log, "add"));

    world.create_entity_with(&[(health, Record::new().with("hp", 1.0))]);
    world.flush_hooks();
    assert_eq!(log.borrow().len(), 1);

    world.remove_hook(handle);
    world.create_entity_with(&[(health, Record::new().with("hp", 2.0))]);
    world.flush_hooks();
    assert_eq!(log.borrow().len(), 1, "no observer, no event");
}

#[test]
fn events_without_observers_are_not_buffered() {
    let mut world = World::new();
    let health = world.define_uniform("Health", "f32", &["hp"]).unwrap();

    // No observers registered while the entity is created.
    world.create_entity_with(&[(health, Record::new().with("hp", 1.0))]);

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    world.on_add(health, recorder(&log, "late"));
    world.flush_hooks();
    assert!(log.borrow().is_empty(), "pre-subscription events are not replayed");
}

#[test]
fn observers_can_mutate_the_world() {
    let mut world = World::new();
    let spawned = world.define_tag("Spawned");
    let counter = world.define_uniform("Counter", "u32", &["n"]).unwrap();
    let n = world.field_ref(counter, "n").unwrap();

    let tally = world.create_entity_with(&[(counter, Record::new().with("n", 0.0))]);
    world.flush_hooks();

    world.on_add(spawned, move |world, _entity| {
        let current = world.get(tally, n).unwrap().as_num().unwrap();
        world.set(tally, n, current + 1.0);
    });

    for _ in 0..3 {
        world.create_entity_with(&[(spawned, Record::new())]);
    }
    world.flush_hooks();

    assert_eq!(world.get(tally, n).unwrap().as_num(), Some(3.0));
}
