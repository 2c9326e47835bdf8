#![allow(dead_code)]

use sim_ecs::prelude::*;

pub const AGENTS_SMALL: usize = 10_000;
pub const AGENTS_MED: usize = 100_000;
pub const AGENTS_LARGE: usize = 1_000_000;

pub struct Movement {
    pub world: World,
    pub position: ComponentDef,
    pub velocity: ComponentDef,
    pub frozen: ComponentDef,
    pub x: FieldRef,
    pub vx: FieldRef,
}

pub fn movement_world() -> Movement {
    let mut world = World::new();
    let position = world.define_uniform("Position", "f32", &["x", "y"]).unwrap();
    let velocity = world.define_uniform("Velocity", "f32", &["vx", "vy"]).unwrap();
    let frozen = world.define_tag("Frozen");
    let x = world.field_ref(position, "x").unwrap();
    let vx = world.field_ref(velocity, "vx").unwrap();
    Movement { world, position, velocity, frozen, x, vx }
}

pub fn populate(movement: &mut Movement, agent_count: usize) {
    for i in 0..agent_count {
        movement.world.create_entity_with(&[
            (
                movement.position,
                Record::new().with("x", i as f64).with("y", 0.0),
            ),
            (
                movement.velocity,
                Record::new().with("vx", 1.0).with("vy", 0.0),
            ),
        ]);
    }
}
