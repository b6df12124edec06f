use formica_core::{AntState, Channel, DisplayMode, FormicaConfig, TickSummary, Vec2, World};

fn seeded_config(seed: u64) -> FormicaConfig {
    FormicaConfig {
        rng_seed: Some(seed),
        ..FormicaConfig::default()
    }
}

/// Food placed on the colony doorstep lets one ant run the full
/// search/return cycle in a handful of ticks: small timesteps keep it
/// inside both contact radii the whole time.
#[test]
fn foraging_cycle_round_trips_food() {
    let mut world = World::new(seeded_config(7));
    world.add_food_source(world.colony().position(), 2);
    let id = world.spawn_ant();

    world.step(0.02);
    assert_eq!(world.ant(id).expect("ant").state().current(), AntState::Returning);
    assert_eq!(world.food_sources()[0].supply(), 1);
    assert_eq!(world.colony().food_collected(), 0);

    world.step(0.02);
    assert_eq!(world.ant(id).expect("ant").state().current(), AntState::Searching);
    assert_eq!(world.colony().food_collected(), 1);

    world.step(0.02);
    assert_eq!(world.ant(id).expect("ant").state().current(), AntState::Returning);
    assert_eq!(world.food_sources()[0].supply(), 0);

    let summary = world.step(0.02);
    assert_eq!(world.colony().food_collected(), 2);
    assert_eq!(summary.food_collected, 2);
    assert_eq!(summary.food_remaining, 0);

    // The source is spent; nothing further happens on contact.
    world.step(0.02);
    world.step(0.02);
    assert_eq!(world.ant(id).expect("ant").state().current(), AntState::Searching);
    assert_eq!(world.colony().food_collected(), 2);
}

#[test]
fn ants_remain_inside_the_wrapped_domain() {
    let mut world = World::new(seeded_config(21));
    world.populate(5);
    for _ in 0..200 {
        world.step(0.05);
    }
    let bounds = world.config().bounds;
    for (_, ant) in world.ants() {
        assert!(
            bounds.contains(ant.position()),
            "ant escaped to {:?}",
            ant.position()
        );
    }
}

#[test]
fn trail_buildup_is_visible_in_snapshots() {
    let mut config = seeded_config(33);
    config.field.to_food_evaporation = 0.0;
    config.field.to_home_evaporation = 0.0;
    let mut world = World::new(config);
    world.populate(6);
    for _ in 0..50 {
        world.step(0.05);
    }
    let pixels = world.field().snapshot_rgba(DisplayMode::ToHomeOnly, 10.0);
    assert_eq!(
        pixels.len(),
        (world.field().settings().width as usize) * (world.field().settings().height as usize) * 4
    );
    let lit = pixels.chunks_exact(4).filter(|px| px[1] > 0).count();
    assert!(lit > 0, "searching ants should have left a visible home trail");
    // Nothing has been written to the food channel yet.
    assert!(world
        .field()
        .channel(Channel::ToFood)
        .cells()
        .iter()
        .all(|cell| *cell == 0.0));
}

fn run_world(seed: u64, steps: usize) -> (Vec<TickSummary>, Vec<u8>) {
    let mut config = seeded_config(seed);
    config.history_capacity = steps;
    let mut world = World::new(config);
    world.add_food_source(Vec2::new(10.0, -6.0), 30);
    world.add_food_source(Vec2::new(-12.0, 9.0), 30);
    world.populate(8);
    for _ in 0..steps {
        world.step(0.05);
    }
    let history = world.history().cloned().collect();
    let pixels = world.field().snapshot_rgba(DisplayMode::BlendRgb, 1.0);
    (history, pixels)
}

#[test]
fn identically_seeded_worlds_agree() {
    const STEPS: usize = 60;
    let (history_a, pixels_a) = run_world(0xFACADE, STEPS);
    let (history_b, pixels_b) = run_world(0xFACADE, STEPS);
    assert_eq!(history_a, history_b);
    assert_eq!(pixels_a, pixels_b);
}
