use sim_ecs::prelude::*;

fn pos(x: f64, y: f64) -> Record {
    Record::new().with("x", x).with("y", y)
}

#[test]
fn creations_and_destructions_accumulate_until_flush() {
    let mut world = World::new();
    let position = world.define_uniform("Position", "f32", &["x", "y"]).unwrap();
    let tracked = world.define_tag("Tracked");

    world.enable_tracking(tracked);

    let watched = world.create_entity_with(&[(position, pos(1.0, 0.0)), (tracked, Record::new())]);
    let unwatched = world.create_entity_with(&[(position, pos(2.0, 0.0))]);

    let changes = world.flush_changes();
    assert!(changes.created.contains(&watched));
    assert!(!changes.created.contains(&unwatched));
    assert!(changes.destroyed.is_empty());

    // Flushing resets the sets.
    let changes = world.flush_changes();
    assert!(changes.created.is_empty() && changes.destroyed.is_empty());

    world.destroy_entity(watched);
    world.destroy_entity(unwatched);
    let changes = world.flush_changes();
    assert_eq!(changes.destroyed.into_iter().collect::<Vec<_>>(), vec![watched]);
}

#[test]
fn component_removal_counts_as_destruction_for_tracking() {
    // The entity stays alive in a reduced archetype, but the delta set
    // records it as destroyed; consumers rely on that conflation.
    let mut world = World::new();
    let position = world.define_uniform("Position", "f32", &["x", "y"]).unwrap();
    let tracked = world.define_tag("Tracked");

    world.enable_tracking(tracked);

    let id = world.create_entity_with(&[(position, pos(1.0, 0.0)), (tracked, Record::new())]);
    world.flush_changes();

    world.remove_component(id, tracked);
    let changes = world.flush_changes();
    assert!(changes.destroyed.contains(&id));
    assert!(world.entities().contains(&id), "entity remains alive");
    assert!(world.has_component(id, position));
}

#[test]
fn snapshot_mirror_captures_committed_state() {
    let mut world = World::new();
    let position = world.define_uniform("Position", "f32", &["x", "y"]).unwrap();

    world.enable_tracking(position);
    let id = world.create_entity_with(&[(position, pos(1.0, 10.0))]);
    let x = world.field_ref(position, "x").unwrap();

    world.flush_snapshots();
    world.set(id, x, 2.0);

    world.for_each(&[position], &[], |world, view| {
        let live = view.column(world, x).unwrap().as_f32().unwrap()[0];
        let mirrored = view.snapshot_column(world, x).unwrap().as_f32().unwrap()[0];
        assert_eq!(live, 2.0);
        assert_eq!(mirrored, 1.0, "mirror holds the state at flush time");

        assert_eq!(view.snapshot_len(world), Some(1));
        assert_eq!(view.snapshot_entity_ids(world), Some(&[id][..]));
    });

    // A new flush catches the mirror up.
    world.flush_snapshots();
    world.for_each(&[position], &[], |world, view| {
        let mirrored = view.snapshot_column(world, x).unwrap().as_f32().unwrap()[0];
        assert_eq!(mirrored, 2.0);
    });
}

#[test]
fn untracked_tables_have_no_mirror() {
    let mut world = World::new();
    let position = world.define_uniform("Position", "f32", &["x", "y"]).unwrap();

    world.create_entity_with(&[(position, pos(1.0, 0.0))]);
    world.flush_snapshots();

    let x = world.field_ref(position, "x").unwrap();
    world.for_each(&[position], &[], |world, view| {
        assert!(view.snapshot_column(world, x).is_none());
        assert_eq!(view.snapshot_len(world), None);
    });
}

#[test]
fn late_tracking_sweeps_existing_archetypes() {
    let mut world = World::new();
    let position = world.define_uniform("Position", "f32", &["x", "y"]).unwrap();

    // Archetype exists before tracking is enabled.
    let id = world.create_entity_with(&[(position, pos(4.0, 0.0))]);

    world.enable_tracking(position);
    world.flush_snapshots();

    let x = world.field_ref(position, "x").unwrap();
    world.for_each(&[position], &[], |world, view| {
        let mirrored = view.snapshot_column(world, x).unwrap().as_f32().unwrap()[0];
        assert_eq!(mirrored, 4.0, "retroactive sweep gave the old table a mirror");
    });

    // Migration targets created after enablement are tracked too.
    let velocity = world.define_uniform("Velocity", "f32", &["vx", "vy"]).unwrap();
    world.add_component(id, velocity, Some(&Record::new().with("vx", 1.0).with("vy", 0.0)));
    world.flush_snapshots();

    world.for_each(&[position, velocity], &[], |world, view| {
        assert!(view.snapshot_column(world, x).is_some());
        assert_eq!(view.snapshot_len(world), Some(1));
    });
}

#[test]
fn snapshot_mirror_survives_growth() {
    let mut world = World::new();
    let position = world.define_uniform("Position", "f32", &["x", "y"]).unwrap();
    world.enable_tracking(position);

    let x = world.field_ref(position, "x").unwrap();
    for i in 0..70 {
        world.create_entity_with(&[(position, pos(i as f64, 0.0))]);
    }
    world.flush_snapshots();

    // Push the table past another doubling after the flush.
    for i in 70..140 {
        world.create_entity_with(&[(position, pos(i as f64, 0.0))]);
    }

    world.for_each(&[position], &[], |world, view| {
        assert_eq!(view.len(world), 140);
        assert_eq!(view.snapshot_len(world), Some(70));
        let mirrored = view.snapshot_column(world, x).unwrap().as_f32().unwrap();
        for row in 0..70 {
            assert_eq!(mirrored[row], row as f32);
        }
    });
}
