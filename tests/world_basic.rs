use sim_ecs::prelude::*;
use sim_ecs::EngineError;

fn world_with_movement() -> (World, ComponentDef, ComponentDef) {
    let mut world = World::new();
    let position = world.define_uniform("Position", "f32", &["x", "y"]).unwrap();
    let velocity = world.define_uniform("Velocity", "f32", &["vx", "vy"]).unwrap();
    (world, position, velocity)
}

fn pos(x: f64, y: f64) -> Record {
    Record::new().with("x", x).with("y", y)
}

#[test]
fn ids_are_monotone_from_one_and_never_reused() {
    let (mut world, position, _) = world_with_movement();

    let a = world.create_entity();
    let b = world.create_entity_with(&[(position, pos(1.0, 2.0))]);
    assert_eq!(a, 1);
    assert_eq!(b, 2);

    world.destroy_entity(a);
    let c = world.create_entity();
    assert_eq!(c, 3, "destroyed ids must not be reissued");
}

#[test]
fn componentless_entities_are_known_and_enumerable() {
    let (mut world, position, _) = world_with_movement();

    let bare = world.create_entity();
    let placed = world.create_entity_with(&[(position, pos(0.0, 0.0))]);

    assert_eq!(world.entities(), vec![bare, placed]);
    assert_eq!(world.len(), 2);
    assert!(!world.has_component(bare, position));

    // A bare entity can receive components later.
    world.add_component(bare, position, Some(&pos(7.0, 8.0)));
    assert!(world.has_component(bare, position));
    let x = world.field_ref(position, "x").unwrap();
    assert_eq!(world.get(bare, x).unwrap().as_num(), Some(7.0));
}

#[test]
fn migration_preserves_data() {
    // Add a second component, read the first back, then remove it again.
    let (mut world, position, velocity) = world_with_movement();

    let id = world.create_entity();
    world.add_component(id, position, Some(&pos(5.0, 10.0)));
    world.add_component(id, velocity, Some(&Record::new().with("vx", 1.0).with("vy", 2.0)));

    let x = world.field_ref(position, "x").unwrap();
    assert_eq!(world.get(id, x).unwrap().as_num(), Some(5.0));

    world.remove_component(id, velocity);
    assert_eq!(world.get(id, x).unwrap().as_num(), Some(5.0));
    assert!(!world.has_component(id, velocity));
    assert!(world.has_component(id, position));
}

#[test]
fn structural_noops_are_silent() {
    let (mut world, position, velocity) = world_with_movement();

    let id = world.create_entity_with(&[(position, pos(1.0, 1.0))]);

    // Remove a component the entity lacks.
    world.remove_component(id, velocity);
    assert!(world.has_component(id, position));

    // Operations on unknown ids.
    world.destroy_entity(999);
    world.remove_component(999, position);
    world.add_component(999, position, None);
    let x = world.field_ref(position, "x").unwrap();
    world.set(999, x, 3.0);
    assert_eq!(world.get(999, x), None);
    assert_eq!(world.len(), 1);
}

#[test]
fn set_and_get_single_fields() {
    let (mut world, position, _) = world_with_movement();

    let id = world.create_entity_with(&[(position, pos(1.0, 2.0))]);
    let x = world.field_ref(position, "x").unwrap();
    let y = world.field_ref(position, "y").unwrap();

    world.set(id, x, 42.5);
    assert_eq!(world.get(id, x).unwrap().as_num(), Some(42.5));
    assert_eq!(world.get(id, y).unwrap().as_num(), Some(2.0));

    let record = world.get_component(id, position).unwrap();
    assert_eq!(record.get("x").unwrap().as_num(), Some(42.5));
}

#[test]
fn missing_write_data_zero_fills() {
    let (mut world, position, _) = world_with_movement();

    // No data at all.
    let a = world.create_entity();
    world.add_component(a, position, None);
    let x = world.field_ref(position, "x").unwrap();
    assert_eq!(world.get(a, x).unwrap().as_num(), Some(0.0));

    // Partial data: unknown fields ignored, missing fields zeroed.
    let b = world.create_entity_with(&[(
        position,
        Record::new().with("x", 3.0).with("bogus", 9.0),
    )]);
    let y = world.field_ref(position, "y").unwrap();
    assert_eq!(world.get(b, x).unwrap().as_num(), Some(3.0));
    assert_eq!(world.get(b, y).unwrap().as_num(), Some(0.0));
}

#[test]
fn query_and_count_agree() {
    let (mut world, position, velocity) = world_with_movement();
    let frozen = world.define_tag("Frozen");

    for i in 0..10 {
        let mut components = vec![(position, pos(i as f64, 0.0))];
        if i % 2 == 0 {
            components.push((velocity, Record::new().with("vx", 1.0).with("vy", 0.0)));
        }
        if i % 3 == 0 {
            components.push((frozen, Record::new()));
        }
        world.create_entity_with(&components);
    }

    let moving = world.query(&[position, velocity], &[]);
    assert_eq!(moving.len(), world.count(&[position, velocity], &[]));

    let moving_unfrozen = world.query(&[position, velocity], &[frozen]);
    assert_eq!(moving_unfrozen.len(), world.count(&[position, velocity], &[frozen]));
    assert_eq!(moving_unfrozen.len(), 3); // i = 2, 4, 8

    assert_eq!(world.count(&[position], &[]), 10);
}

#[test]
fn growth_past_initial_capacity_preserves_rows() {
    let (mut world, position, _) = world_with_movement();
    let x = world.field_ref(position, "x").unwrap();

    let ids: Vec<EntityId> = (0..200)
        .map(|i| world.create_entity_with(&[(position, pos(i as f64, 0.0))]))
        .collect();

    for (i, id) in ids.iter().enumerate() {
        assert_eq!(world.get(*id, x).unwrap().as_num(), Some(i as f64));
    }
    assert_eq!(world.count(&[position], &[]), 200);
}

#[test]
fn swap_remove_of_last_row_is_clean() {
    let (mut world, position, _) = world_with_movement();
    let x = world.field_ref(position, "x").unwrap();

    let a = world.create_entity_with(&[(position, pos(1.0, 0.0))]);
    let b = world.create_entity_with(&[(position, pos(2.0, 0.0))]);

    // b sits in the last row; no swap happens.
    world.destroy_entity(b);
    assert_eq!(world.get(a, x).unwrap().as_num(), Some(1.0));
    assert_eq!(world.query(&[position], &[]), vec![a]);
}

#[test]
fn swap_remove_of_interior_row_relocates_last() {
    let (mut world, position, _) = world_with_movement();
    let x = world.field_ref(position, "x").unwrap();

    let a = world.create_entity_with(&[(position, pos(1.0, 0.0))]);
    let b = world.create_entity_with(&[(position, pos(2.0, 0.0))]);
    let c = world.create_entity_with(&[(position, pos(3.0, 0.0))]);

    world.destroy_entity(a);

    assert_eq!(world.get(b, x).unwrap().as_num(), Some(2.0));
    assert_eq!(world.get(c, x).unwrap().as_num(), Some(3.0));
    assert_eq!(world.count(&[position], &[]), 2);
}

#[test]
fn removing_only_component_leaves_entity_alive() {
    let (mut world, position, _) = world_with_movement();

    let id = world.create_entity_with(&[(position, pos(1.0, 2.0))]);
    world.remove_component(id, position);

    assert!(!world.has_component(id, position));
    assert_eq!(world.entities(), vec![id]);
    assert_eq!(world.count(&[position], &[]), 0);
}

#[test]
fn string_and_array_fields_round_trip() {
    let mut world = World::new();
    let actor = world
        .define_schema("Actor", &[("name", "string"), ("waypoints", "f32[3]"), ("hp", "i32")])
        .unwrap();

    let id = world.create_entity_with(&[(
        actor,
        Record::new()
            .with("name", "scout")
            .with("waypoints", vec![1.0, 2.0, 3.0])
            .with("hp", 40.0),
    )]);

    let name = world.field_ref(actor, "name").unwrap();
    let waypoints = world.field_ref(actor, "waypoints").unwrap();
    let hp = world.field_ref(actor, "hp").unwrap();

    assert_eq!(world.get(id, name).unwrap().as_str(), Some("scout"));
    assert_eq!(world.get(id, waypoints).unwrap().as_arr(), Some(&[1.0, 2.0, 3.0][..]));
    assert_eq!(world.get(id, hp).unwrap().as_num(), Some(40.0));

    // Short array writes zero the tail.
    world.set(id, waypoints, vec![9.0]);
    assert_eq!(world.get(id, waypoints).unwrap().as_arr(), Some(&[9.0, 0.0, 0.0][..]));
}

#[test]
fn unknown_type_token_is_rejected() {
    let mut world = World::new();

    let err = world.define_uniform("Broken", "f128", &["value"]).unwrap_err();
    assert!(matches!(err, EngineError::UnknownType(_)));

    assert!(world.define_uniform("Bad", "string[2]", &["tags"]).is_err());
    assert!(world.define_uniform("Bad", "f32[0]", &["zero"]).is_err());
    assert!(world.define_uniform("Ok", "f32[4]", &["quad"]).is_ok());
}

#[test]
fn definitions_are_idempotent_per_identity_not_name() {
    let mut world = World::new();
    let first = world.define_tag("Marker");
    let second = world.define_tag("Marker");
    assert_ne!(first, second);

    let id = world.create_entity_with(&[(first, Record::new())]);
    assert!(world.has_component(id, first));
    assert!(!world.has_component(id, second));
}
