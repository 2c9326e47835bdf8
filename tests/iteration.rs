use sim_ecs::prelude::*;

fn pos(x: f64, y: f64) -> Record {
    Record::new().with("x", x).with("y", y)
}

#[test]
fn views_expose_dense_column_prefixes() {
    let mut world = World::new();
    let position = world.define_uniform("Position", "f32", &["x", "y"]).unwrap();
    let path = world.define_uniform("Path", "f32[4]", &["waypoints"]).unwrap();

    for i in 0..100 {
        world.create_entity_with(&[
            (position, pos(i as f64, -(i as f64))),
            (path, Record::new().with("waypoints", vec![i as f64; 4])),
        ]);
    }

    let x = world.field_ref(position, "x").unwrap();
    let waypoints = world.field_ref(path, "waypoints").unwrap();

    let mut visited_rows = 0;
    world.for_each(&[position, path], &[], |world, view| {
        let len = view.len(world);
        let ids = view.entity_ids(world);
        assert_eq!(ids.len(), len);

        assert_eq!(view.stride(world, x), Some(1));
        assert_eq!(view.stride(world, waypoints), Some(4));

        let xs = view.column(world, x).unwrap().as_f32().unwrap();
        assert!(xs.len() >= len, "backing store covers at least the live prefix");

        let flat = view.column(world, waypoints).unwrap().as_f32().unwrap();
        assert!(flat.len() >= len * 4);

        // The live prefix corresponds 1:1 with entity_ids.
        for row in 0..len {
            let entity = ids[row];
            assert_eq!(xs[row] as f64, (entity - 1) as f64);
            assert_eq!(flat[row * 4] as f64, (entity - 1) as f64);
        }
        visited_rows += len;
    });

    assert_eq!(visited_rows, 100);
}

#[test]
fn writes_through_views_are_visible() {
    let mut world = World::new();
    let position = world.define_uniform("Position", "f32", &["x", "y"]).unwrap();

    let id = world.create_entity_with(&[(position, pos(1.0, 0.0))]);
    let x = world.field_ref(position, "x").unwrap();

    world.for_each(&[position], &[], |world, view| {
        let xs = view.column_mut(world, x).unwrap().as_f32_mut().unwrap();
        xs[0] = 99.0;
        // Immediately visible to reads in the same callback.
        assert_eq!(world.get(id, x).unwrap().as_num(), Some(99.0));
    });

    assert_eq!(world.get(id, x).unwrap().as_num(), Some(99.0));
}

#[test]
fn structural_change_during_iteration_is_deferred() {
    // All rows stay visible for the duration of the walk; the removal
    // lands when the outermost iteration exits.
    let mut world = World::new();
    let position = world.define_uniform("Pos", "f32", &["x", "y"]).unwrap();

    let a = world.create_entity_with(&[(position, pos(1.0, 0.0))]);
    let b = world.create_entity_with(&[(position, pos(2.0, 0.0))]);
    let c = world.create_entity_with(&[(position, pos(3.0, 0.0))]);

    let mut visited = Vec::new();
    world.for_each(&[position], &[], |world, view| {
        for &entity in view.entity_ids(world).to_vec().iter() {
            visited.push(entity);
            if entity == a {
                world.remove_component(a, position);
            }
        }
    });

    assert_eq!(visited, vec![a, b, c]);
    assert!(!world.has_component(a, position));
    assert!(world.has_component(b, position));
    assert!(world.has_component(c, position));
}

#[test]
fn deferred_destroy_applies_in_call_order() {
    let mut world = World::new();
    let position = world.define_uniform("Pos", "f32", &["x", "y"]).unwrap();
    let velocity = world.define_uniform("Vel", "f32", &["vx", "vy"]).unwrap();

    let a = world.create_entity_with(&[(position, pos(1.0, 0.0))]);
    let b = world.create_entity_with(&[(position, pos(2.0, 0.0))]);

    world.for_each(&[position], &[], |world, _view| {
        world.destroy_entity(a);
        world.add_component(b, velocity, Some(&Record::new().with("vx", 5.0).with("vy", 0.0)));
    });

    assert!(!world.entities().contains(&a));
    assert!(world.has_component(b, velocity));
    let vx = world.field_ref(velocity, "vx").unwrap();
    assert_eq!(world.get(b, vx).unwrap().as_num(), Some(5.0));
}

#[test]
fn overwrite_during_iteration_is_immediate() {
    let mut world = World::new();
    let position = world.define_uniform("Pos", "f32", &["x", "y"]).unwrap();

    let id = world.create_entity_with(&[(position, pos(1.0, 0.0))]);
    let x = world.field_ref(position, "x").unwrap();

    world.for_each(&[position], &[], |world, _view| {
        // The entity already has Pos: this is an in-place row write,
        // not a deferred migration.
        world.add_component(id, position, Some(&pos(8.0, 8.0)));
        assert_eq!(world.get(id, x).unwrap().as_num(), Some(8.0));
    });

    assert_eq!(world.get(id, x).unwrap().as_num(), Some(8.0));
}

#[test]
fn targeting_with_exclusion_selects_nearest_living_enemy() {
    let mut world = World::new();
    let position = world.define_uniform("Position", "f32", &["x", "y"]).unwrap();
    let enemy = world.define_tag("Enemy");
    let ally = world.define_tag("Ally");
    let dead = world.define_tag("Dead");
    let target = world.define_schema("Target", &[("entityId", "i32")]).unwrap();

    let near = world.create_entity_with(&[(position, pos(2.0, 0.0)), (enemy, Record::new())]);
    let far = world.create_entity_with(&[(position, pos(9.0, 0.0)), (enemy, Record::new())]);
    let ally_id = world.create_entity_with(&[
        (position, pos(0.0, 0.0)),
        (ally, Record::new()),
        (target, Record::new().with("entityId", 0.0)),
    ]);

    let x = world.field_ref(position, "x").unwrap();
    let y = world.field_ref(position, "y").unwrap();
    let target_id = world.field_ref(target, "entityId").unwrap();

    let run_targeting_tick = |world: &mut World| {
        let mut assignments: Vec<(EntityId, EntityId)> = Vec::new();
        world.for_each(&[position, ally], &[], |world, view| {
            for &ally_entity in view.entity_ids(world).to_vec().iter() {
                let ax = world.get(ally_entity, x).unwrap().as_num().unwrap();
                let ay = world.get(ally_entity, y).unwrap().as_num().unwrap();

                let mut best: Option<(EntityId, f64)> = None;
                world.for_each(&[position, enemy], &[dead], |world, enemies| {
                    for &enemy_entity in enemies.entity_ids(world).to_vec().iter() {
                        let ex = world.get(enemy_entity, x).unwrap().as_num().unwrap();
                        let ey = world.get(enemy_entity, y).unwrap().as_num().unwrap();
                        let distance = (ex - ax).powi(2) + (ey - ay).powi(2);
                        if best.map(|(_, d)| distance < d).unwrap_or(true) {
                            best = Some((enemy_entity, distance));
                        }
                    }
                });

                if let Some((chosen, _)) = best {
                    assignments.push((ally_entity, chosen));
                }
            }
        });
        for (ally_entity, chosen) in assignments {
            world.set(ally_entity, target_id, chosen as f64);
        }
    };

    run_targeting_tick(&mut world);
    assert_eq!(world.get(ally_id, target_id).unwrap().as_num(), Some(near as f64));

    // Marking the near enemy Dead must redirect targeting to the far one.
    world.add_component(near, dead, None);
    run_targeting_tick(&mut world);
    assert_eq!(world.get(ally_id, target_id).unwrap().as_num(), Some(far as f64));
}
