//! Ant colony foraging simulation core.
//!
//! Agents coordinate without talking to each other: they lay scent into a
//! shared [`PheromoneField`] and read the opposite channel back, so trails
//! emerge from the interaction of many short-lived decisions. Per tick each
//! agent runs a stack of steering layers through a subsumption arbiter,
//! integrates the winning force, and files a deposit request; the world
//! applies contacts and deposits serially and evaporates the field on a
//! fixed cadence afterwards.

pub mod obstacles;
pub mod steering;

pub use formica_field::{
    BoundaryMode, Channel, CombineMode, DisplayMode, FieldSettings, Interpolation, PheromoneField,
    Rect, ScalarField, Vec2,
};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use std::collections::VecDeque;

use crate::obstacles::ObstacleSet;
use crate::steering::{
    AvoidanceSettings, FollowSettings, GoalDisc, MovementSettings, ObstacleAvoidanceLayer,
    PheromoneFollowLayer, SteeringContext, SteeringLayer, SubsumptionArbiter, WanderLayer,
    WanderSettings,
};

new_key_type! {
    /// Stable handle for ants backed by a generational slot map.
    pub struct AntId;
}

/// High level simulation clock (ticks processed since boot).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Foraging role of an agent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AntState {
    /// Looking for food, following the ToFood channel.
    #[default]
    Searching,
    /// Carrying food home, following the ToHome channel.
    Returning,
}

/// Two-state machine choosing which channel an agent reads and writes.
///
/// The clock measures seconds spent in the current state and resets to
/// zero exactly on a transition; deposit strength attenuates with it so
/// agents that have wandered fruitlessly for a long time lay faint trails.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AntStateMachine {
    state: AntState,
    time_since_state_change: f32,
}

impl AntStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn current(&self) -> AntState {
        self.state
    }

    /// Seconds spent in the current state.
    #[must_use]
    pub const fn time_since_state_change(&self) -> f32 {
        self.time_since_state_change
    }

    /// Alias of [`Self::time_since_state_change`]; the machine keeps a
    /// single clock.
    #[must_use]
    pub const fn internal_clock(&self) -> f32 {
        self.time_since_state_change
    }

    /// Channel the agent follows: searching ants chase food scent,
    /// returning ants chase home scent.
    #[must_use]
    pub const fn sample_channel(&self) -> Channel {
        match self.state {
            AntState::Searching => Channel::ToFood,
            AntState::Returning => Channel::ToHome,
        }
    }

    /// Channel the agent writes: a trail toward where it came from, laid
    /// for the benefit of agents in the opposite role.
    #[must_use]
    pub const fn deposit_channel(&self) -> Channel {
        self.sample_channel().opposite()
    }

    /// Advances the state clock.
    pub fn tick(&mut self, dt: f32) {
        self.time_since_state_change += dt.max(0.0);
    }

    /// Contact with a food source. Fires only while searching and only
    /// when the source still has supply; a unit is taken as a side effect.
    /// Returns whether a transition happened.
    pub fn on_food_contact(&mut self, source: &mut FoodSource) -> bool {
        if self.state != AntState::Searching || !source.has_supply() {
            return false;
        }
        source.take_unit();
        self.transition(AntState::Returning);
        true
    }

    /// Contact with the colony. Fires only while returning; the carried
    /// unit is delivered as a side effect. Returns whether a transition
    /// happened.
    pub fn on_colony_contact(&mut self, colony: &mut Colony) -> bool {
        if self.state != AntState::Returning {
            return false;
        }
        colony.add_food();
        self.transition(AntState::Searching);
        true
    }

    fn transition(&mut self, next: AntState) {
        self.state = next;
        self.time_since_state_change = 0.0;
    }
}

/// A finite pile of food in the world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodSource {
    position: Vec2,
    radius: f32,
    supply: u32,
}

impl FoodSource {
    #[must_use]
    pub fn new(position: Vec2, radius: f32, supply: u32) -> Self {
        Self {
            position,
            radius: radius.max(0.0),
            supply,
        }
    }

    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    #[must_use]
    pub const fn radius(&self) -> f32 {
        self.radius
    }

    #[must_use]
    pub const fn supply(&self) -> u32 {
        self.supply
    }

    #[must_use]
    pub const fn has_supply(&self) -> bool {
        self.supply > 0
    }

    /// Removes one unit; exhausted sources stop attracting contacts.
    pub fn take_unit(&mut self) {
        self.supply = self.supply.saturating_sub(1);
    }
}

/// The nest: spawn point and drop-off for carried food.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Colony {
    position: Vec2,
    radius: f32,
    food_collected: u64,
}

impl Colony {
    #[must_use]
    pub fn new(position: Vec2, radius: f32) -> Self {
        Self {
            position,
            radius: radius.max(0.0),
            food_collected: 0,
        }
    }

    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    #[must_use]
    pub const fn radius(&self) -> f32 {
        self.radius
    }

    #[must_use]
    pub const fn food_collected(&self) -> u64 {
        self.food_collected
    }

    pub fn add_food(&mut self) {
        self.food_collected += 1;
    }
}

/// Static configuration for a formica world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormicaConfig {
    /// World-space rectangle the simulation and the field cover.
    pub bounds: Rect,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Pheromone grid and mapping settings.
    pub field: FieldSettings,
    /// Fixed frequency of field evaporation steps, in Hz.
    pub field_step_hz: f32,
    /// Pheromone laid per second of travel.
    pub deposit_rate: f32,
    /// Exponential falloff of deposit strength per second spent in the
    /// current state; zero disables attenuation.
    pub deposit_attenuation: f32,
    /// Below this speed agents stop laying trail.
    pub min_deposit_speed: f32,
    /// Movement integrator limits.
    pub movement: MovementSettings,
    /// Wander layer tunables.
    pub wander: WanderSettings,
    /// Obstacle avoidance layer tunables.
    pub avoidance: AvoidanceSettings,
    /// Pheromone-follow layer tunables.
    pub follow: FollowSettings,
    /// Where ants spawn and returning ants deliver.
    pub colony_position: Vec2,
    /// Contact radius of the colony.
    pub colony_radius: f32,
    /// Contact radius given to newly added food sources.
    pub food_radius: f32,
    /// Thickness of the generated boundary walls.
    pub wall_thickness: f32,
    /// Gap between the domain edge and the walls.
    pub wall_margin: f32,
    /// Maximum number of recent tick summaries retained in memory.
    pub history_capacity: usize,
}

impl Default for FormicaConfig {
    fn default() -> Self {
        Self {
            bounds: Rect::new(Vec2::new(-20.0, -20.0), Vec2::new(40.0, 40.0)),
            rng_seed: None,
            field: FieldSettings::default(),
            field_step_hz: 20.0,
            deposit_rate: 2.0,
            deposit_attenuation: 0.05,
            min_deposit_speed: 0.01,
            movement: MovementSettings::default(),
            wander: WanderSettings::default(),
            avoidance: AvoidanceSettings::default(),
            follow: FollowSettings::default(),
            colony_position: Vec2::ZERO,
            colony_radius: 1.0,
            food_radius: 0.5,
            wall_thickness: 1.0,
            wall_margin: 0.0,
            history_capacity: 256,
        }
    }
}

impl FormicaConfig {
    /// Normalizes every out-of-range value to a safe minimum. Nothing is
    /// rejected; a world can always be built.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.bounds.size.x = self.bounds.size.x.max(1e-3);
        self.bounds.size.y = self.bounds.size.y.max(1e-3);
        self.field = self.field.sanitized();
        self.field_step_hz = self.field_step_hz.max(1.0);
        self.deposit_rate = self.deposit_rate.max(0.0);
        self.deposit_attenuation = self.deposit_attenuation.max(0.0);
        self.min_deposit_speed = self.min_deposit_speed.max(0.0);
        self.movement = self.movement.sanitized();
        self.wander = self.wander.sanitized();
        self.avoidance = self.avoidance.sanitized();
        self.follow = self.follow.sanitized();
        self.colony_radius = self.colony_radius.max(0.0);
        self.food_radius = self.food_radius.max(0.0);
        self.wall_thickness = self.wall_thickness.max(1e-3);
        self.wall_margin = self.wall_margin.max(0.0);
        self.history_capacity = self.history_capacity.max(1);
        self
    }

    /// Returns the configured RNG, generating a seed from entropy if none
    /// was set.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// One simulated ant: motion state, foraging role, and its steering stack.
pub struct Ant {
    position: Vec2,
    velocity: Vec2,
    heading: f32,
    state: AntStateMachine,
    arbiter: SubsumptionArbiter,
    rng: SmallRng,
}

impl Ant {
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    #[must_use]
    pub const fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Body rotation in radians.
    #[must_use]
    pub const fn heading(&self) -> f32 {
        self.heading
    }

    #[must_use]
    pub const fn state(&self) -> &AntStateMachine {
        &self.state
    }

    /// Facing under the movement rules: velocity direction when moving,
    /// body rotation when idling.
    #[must_use]
    pub fn heading_direction(&self, movement: &MovementSettings) -> Vec2 {
        movement.heading_direction(self.velocity, self.heading)
    }

    fn advance(&mut self, dt: f32, env: &TickEnv<'_>) -> AntOutcome {
        self.state.tick(dt);
        let movement = &env.config.movement;
        let ctx = SteeringContext {
            field: env.field,
            obstacles: env.obstacles,
            colony: env.colony,
            food: env.food,
            state: self.state.current(),
            sample_channel: self.state.sample_channel(),
            position: self.position,
            velocity: self.velocity,
            heading: self.heading,
            heading_direction: movement.heading_direction(self.velocity, self.heading),
            heading_angle: movement.heading_angle(self.velocity, self.heading),
            max_speed: movement.max_speed,
        };
        let force = self.arbiter.calculate_steering(&ctx, &mut self.rng, dt);

        let (velocity, heading) = movement.integrate(self.velocity, self.heading, force, dt);
        self.velocity = velocity;
        self.heading = heading;
        self.position += velocity * dt;
        if env.config.field.boundary == BoundaryMode::Wrap {
            self.position = wrap_into(env.config.bounds, self.position);
        }

        AntOutcome {
            deposit: self.deposit_request(env, dt),
            contact: self.detect_contact(env),
        }
    }

    fn deposit_request(&self, env: &TickEnv<'_>, dt: f32) -> Option<DepositRequest> {
        let floor = env.config.min_deposit_speed;
        if self.velocity.length_squared() < floor * floor {
            return None;
        }
        let attenuation =
            (-env.config.deposit_attenuation * self.state.time_since_state_change()).exp();
        let amount = env.config.deposit_rate * attenuation * dt;
        if amount <= 0.0 {
            return None;
        }
        Some(DepositRequest {
            channel: self.state.deposit_channel(),
            point: self.position,
            amount,
        })
    }

    fn detect_contact(&self, env: &TickEnv<'_>) -> Option<Contact> {
        match self.state.current() {
            AntState::Searching => env
                .food
                .iter()
                .position(|goal| goal.contains(self.position, 0.0))
                .map(Contact::Food),
            AntState::Returning => env
                .colony
                .contains(self.position, 0.0)
                .then_some(Contact::Colony),
        }
    }
}

impl std::fmt::Debug for Ant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ant")
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("heading", &self.heading)
            .field("state", &self.state)
            .finish()
    }
}

/// Moves a position that left the domain back in on the opposite side.
fn wrap_into(bounds: Rect, mut position: Vec2) -> Vec2 {
    let min = bounds.origin;
    let max = bounds.max();
    if position.x < min.x {
        position.x += bounds.size.x;
    } else if position.x > max.x {
        position.x -= bounds.size.x;
    }
    if position.y < min.y {
        position.y += bounds.size.y;
    } else if position.y > max.y {
        position.y -= bounds.size.y;
    }
    position
}

/// Shared read-only state handed to the parallel per-ant phase.
struct TickEnv<'a> {
    field: &'a PheromoneField,
    obstacles: &'a ObstacleSet,
    colony: GoalDisc,
    food: &'a [GoalDisc],
    config: &'a FormicaConfig,
}

#[derive(Debug, Clone, Copy)]
struct DepositRequest {
    channel: Channel,
    point: Vec2,
    amount: f32,
}

#[derive(Debug, Clone, Copy)]
enum Contact {
    /// Index into the tick's list of available food goals.
    Food(usize),
    Colony,
}

#[derive(Debug, Clone, Copy, Default)]
struct AntOutcome {
    deposit: Option<DepositRequest>,
    contact: Option<Contact>,
}

/// Aggregated counters for one processed tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickSummary {
    pub tick: Tick,
    pub ant_count: usize,
    pub searching: usize,
    pub returning: usize,
    pub food_collected: u64,
    pub food_remaining: u64,
    /// Deposit requests that actually landed in the field this tick.
    pub deposits: usize,
    pub mean_to_food: f32,
    pub mean_to_home: f32,
}

/// Aggregate world state: field, colony, food, walls, and the ants.
pub struct World {
    config: FormicaConfig,
    tick: Tick,
    elapsed: f64,
    rng: SmallRng,
    ants: SlotMap<AntId, Ant>,
    field: PheromoneField,
    colony: Colony,
    food: Vec<FoodSource>,
    obstacles: ObstacleSet,
    field_accumulator: f32,
    last_deposits: usize,
    history: VecDeque<TickSummary>,
}

impl World {
    /// Builds a world from the configuration. Out-of-range settings are
    /// normalized, never rejected.
    #[must_use]
    pub fn new(config: FormicaConfig) -> Self {
        let config = config.sanitized();
        let rng = config.seeded_rng();
        let field = PheromoneField::new(config.field.clone(), config.bounds);
        let obstacles =
            ObstacleSet::boundary_walls(config.bounds, config.wall_thickness, config.wall_margin);
        let colony = Colony::new(config.colony_position, config.colony_radius);
        let history_capacity = config.history_capacity;
        Self {
            config,
            tick: Tick::zero(),
            elapsed: 0.0,
            rng,
            ants: SlotMap::with_key(),
            field,
            colony,
            food: Vec::new(),
            obstacles,
            field_accumulator: 0.0,
            last_deposits: 0,
            history: VecDeque::with_capacity(history_capacity),
        }
    }

    /// Spawns an ant at an explicit position with a random heading. Each
    /// ant carries its own RNG stream so parallel updates stay
    /// reproducible.
    pub fn spawn_ant_at(&mut self, position: Vec2) -> AntId {
        let mut rng = SmallRng::seed_from_u64(self.rng.random());
        let heading = rng.random_range(0.0..std::f32::consts::TAU);
        let layers: Vec<Box<dyn SteeringLayer>> = vec![
            Box::new(WanderLayer::new(self.config.wander, &mut rng)),
            Box::new(ObstacleAvoidanceLayer::new(self.config.avoidance)),
            Box::new(PheromoneFollowLayer::new(
                self.config.follow,
                Vec2::from_angle(heading),
                &mut rng,
            )),
        ];
        self.ants.insert(Ant {
            position,
            velocity: Vec2::ZERO,
            heading,
            state: AntStateMachine::new(),
            arbiter: SubsumptionArbiter::new(layers),
            rng,
        })
    }

    /// Spawns an ant at the colony.
    pub fn spawn_ant(&mut self) -> AntId {
        self.spawn_ant_at(self.colony.position())
    }

    /// Spawns `count` ants at the colony.
    pub fn populate(&mut self, count: usize) {
        for _ in 0..count {
            self.spawn_ant();
        }
    }

    /// Removes an ant by handle.
    pub fn remove_ant(&mut self, id: AntId) -> bool {
        self.ants.remove(id).is_some()
    }

    /// Adds a food source with the configured contact radius, returning
    /// its index.
    pub fn add_food_source(&mut self, position: Vec2, supply: u32) -> usize {
        self.food
            .push(FoodSource::new(position, self.config.food_radius, supply));
        self.food.len() - 1
    }

    /// Repoints the world at a new bounding rectangle: field mapping and
    /// boundary walls are rebuilt. Must be called whenever the covered
    /// rectangle changes externally.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.config.bounds = bounds;
        self.config.bounds.size.x = self.config.bounds.size.x.max(1e-3);
        self.config.bounds.size.y = self.config.bounds.size.y.max(1e-3);
        self.field.set_bounds(self.config.bounds);
        self.obstacles = ObstacleSet::boundary_walls(
            self.config.bounds,
            self.config.wall_thickness,
            self.config.wall_margin,
        );
    }

    /// Advances the whole world by `dt` seconds: parallel steering and
    /// integration, then contacts, then the tick's deposits, then field
    /// evaporation on its own cadence. Evaporation never runs between a
    /// deposit and the end of the tick that produced it.
    pub fn step(&mut self, dt: f32) -> TickSummary {
        let dt = dt.max(0.0);
        let (outcomes, food_indices) = self.stage_advance(dt);
        self.stage_contacts(&outcomes, &food_indices);
        self.stage_deposits(&outcomes);
        self.stage_field(dt);
        self.elapsed += f64::from(dt);
        self.tick = self.tick.next();
        self.stage_summary()
    }

    fn stage_advance(&mut self, dt: f32) -> (Vec<(AntId, AntOutcome)>, Vec<usize>) {
        let Self {
            ants,
            field,
            obstacles,
            colony,
            food,
            config,
            ..
        } = self;

        let mut food_goals = Vec::new();
        let mut food_indices = Vec::new();
        for (index, source) in food.iter().enumerate() {
            if source.has_supply() {
                food_goals.push(GoalDisc {
                    position: source.position(),
                    radius: source.radius(),
                });
                food_indices.push(index);
            }
        }

        let env = TickEnv {
            field,
            obstacles,
            colony: GoalDisc {
                position: colony.position(),
                radius: colony.radius(),
            },
            food: &food_goals,
            config,
        };

        let mut handles: Vec<(AntId, &mut Ant)> = ants.iter_mut().collect();
        let outcomes = handles
            .par_iter_mut()
            .map(|(id, ant)| (*id, ant.advance(dt, &env)))
            .collect();
        (outcomes, food_indices)
    }

    fn stage_contacts(&mut self, outcomes: &[(AntId, AntOutcome)], food_indices: &[usize]) {
        for (id, outcome) in outcomes {
            let Some(contact) = outcome.contact else {
                continue;
            };
            let Some(ant) = self.ants.get_mut(*id) else {
                continue;
            };
            match contact {
                Contact::Food(goal_index) => {
                    // Supply races between ants resolve here, in handle
                    // order: a source emptied by an earlier ant no longer
                    // triggers later ones.
                    if let Some(&source_index) = food_indices.get(goal_index)
                        && let Some(source) = self.food.get_mut(source_index)
                    {
                        ant.state.on_food_contact(source);
                    }
                }
                Contact::Colony => {
                    ant.state.on_colony_contact(&mut self.colony);
                }
            }
        }
    }

    fn stage_deposits(&mut self, outcomes: &[(AntId, AntOutcome)]) {
        let mut applied = 0;
        for (_, outcome) in outcomes {
            if let Some(request) = outcome.deposit
                && self
                    .field
                    .deposit(request.channel, request.point, request.amount)
            {
                applied += 1;
            }
        }
        self.last_deposits = applied;
    }

    fn stage_field(&mut self, dt: f32) {
        self.field_accumulator += dt;
        let step = 1.0 / self.config.field_step_hz;
        while self.field_accumulator >= step {
            self.field_accumulator -= step;
            self.field.step(step);
        }
    }

    fn stage_summary(&mut self) -> TickSummary {
        let mut searching = 0;
        let mut returning = 0;
        for ant in self.ants.values() {
            match ant.state.current() {
                AntState::Searching => searching += 1,
                AntState::Returning => returning += 1,
            }
        }
        let summary = TickSummary {
            tick: self.tick,
            ant_count: self.ants.len(),
            searching,
            returning,
            food_collected: self.colony.food_collected(),
            food_remaining: self.food.iter().map(|f| u64::from(f.supply())).sum(),
            deposits: self.last_deposits,
            mean_to_food: mean(self.field.channel(Channel::ToFood).cells()),
            mean_to_home: mean(self.field.channel(Channel::ToHome).cells()),
        };
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary.clone());
        summary
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &FormicaConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Simulated seconds processed so far.
    #[must_use]
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Read access to the pheromone field.
    #[must_use]
    pub fn field(&self) -> &PheromoneField {
        &self.field
    }

    /// Mutable access to the pheromone field (for seeding scenarios).
    #[must_use]
    pub fn field_mut(&mut self) -> &mut PheromoneField {
        &mut self.field
    }

    #[must_use]
    pub fn colony(&self) -> &Colony {
        &self.colony
    }

    #[must_use]
    pub fn food_sources(&self) -> &[FoodSource] {
        &self.food
    }

    #[must_use]
    pub fn obstacles(&self) -> &ObstacleSet {
        &self.obstacles
    }

    /// Number of live ants.
    #[must_use]
    pub fn ant_count(&self) -> usize {
        self.ants.len()
    }

    /// Borrow one ant by handle.
    #[must_use]
    pub fn ant(&self, id: AntId) -> Option<&Ant> {
        self.ants.get(id)
    }

    /// Iterate over all ants.
    pub fn ants(&self) -> impl Iterator<Item = (AntId, &Ant)> {
        self.ants.iter()
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("ant_count", &self.ants.len())
            .field("food_sources", &self.food.len())
            .field("food_collected", &self.colony.food_collected())
            .finish()
    }
}

fn mean(cells: &[f32]) -> f32 {
    if cells.is_empty() {
        0.0
    } else {
        cells.iter().sum::<f32>() / cells.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_config(seed: u64) -> FormicaConfig {
        FormicaConfig {
            rng_seed: Some(seed),
            ..FormicaConfig::default()
        }
    }

    #[test]
    fn config_sanitization_normalizes_illegal_values() {
        let config = FormicaConfig {
            bounds: Rect::new(Vec2::ZERO, Vec2::new(-5.0, 0.0)),
            field_step_hz: -3.0,
            deposit_rate: -1.0,
            history_capacity: 0,
            movement: steering::MovementSettings {
                mass: -1.0,
                ..steering::MovementSettings::default()
            },
            ..FormicaConfig::default()
        }
        .sanitized();
        assert!(config.bounds.size.x > 0.0);
        assert!(config.bounds.size.y > 0.0);
        assert_eq!(config.field_step_hz, 1.0);
        assert_eq!(config.deposit_rate, 0.0);
        assert_eq!(config.history_capacity, 1);
        assert!(config.movement.mass > 0.0);
    }

    #[test]
    fn state_machine_splits_channels_by_role() {
        let machine = AntStateMachine::new();
        assert_eq!(machine.current(), AntState::Searching);
        assert_eq!(machine.sample_channel(), Channel::ToFood);
        assert_eq!(machine.deposit_channel(), Channel::ToHome);
    }

    #[test]
    fn food_contact_transitions_and_takes_a_unit() {
        let mut machine = AntStateMachine::new();
        let mut source = FoodSource::new(Vec2::ZERO, 0.5, 1);
        machine.tick(2.0);
        assert_eq!(machine.internal_clock(), 2.0);

        assert!(machine.on_food_contact(&mut source));
        assert_eq!(machine.current(), AntState::Returning);
        assert_eq!(machine.internal_clock(), 0.0);
        assert_eq!(source.supply(), 0);
        assert_eq!(machine.sample_channel(), Channel::ToHome);
        assert_eq!(machine.deposit_channel(), Channel::ToFood);

        // Touching food again while already returning changes nothing.
        let mut another = FoodSource::new(Vec2::ZERO, 0.5, 5);
        assert!(!machine.on_food_contact(&mut another));
        assert_eq!(another.supply(), 5);
        assert_eq!(machine.current(), AntState::Returning);
    }

    #[test]
    fn exhausted_food_does_not_trigger() {
        let mut machine = AntStateMachine::new();
        let mut source = FoodSource::new(Vec2::ZERO, 0.5, 0);
        assert!(!machine.on_food_contact(&mut source));
        assert_eq!(machine.current(), AntState::Searching);
    }

    #[test]
    fn colony_contact_only_delivers_when_returning() {
        let mut machine = AntStateMachine::new();
        let mut colony = Colony::new(Vec2::ZERO, 1.0);
        assert!(!machine.on_colony_contact(&mut colony));
        assert_eq!(colony.food_collected(), 0);

        let mut source = FoodSource::new(Vec2::ZERO, 0.5, 1);
        machine.on_food_contact(&mut source);
        machine.tick(3.0);
        assert!(machine.on_colony_contact(&mut colony));
        assert_eq!(colony.food_collected(), 1);
        assert_eq!(machine.current(), AntState::Searching);
        assert_eq!(machine.time_since_state_change(), 0.0);
    }

    #[test]
    fn wrap_into_reenters_on_the_opposite_side() {
        let bounds = Rect::new(Vec2::new(-20.0, -20.0), Vec2::new(40.0, 40.0));
        assert_eq!(wrap_into(bounds, Vec2::new(21.0, 0.0)), Vec2::new(-19.0, 0.0));
        assert_eq!(wrap_into(bounds, Vec2::new(-21.0, 5.0)), Vec2::new(19.0, 5.0));
        assert_eq!(wrap_into(bounds, Vec2::new(0.0, 23.0)), Vec2::new(0.0, -17.0));
        assert_eq!(wrap_into(bounds, Vec2::new(3.0, -4.0)), Vec2::new(3.0, -4.0));
    }

    #[test]
    fn world_initializes_and_spawns_at_the_colony() {
        let mut world = World::new(seeded_config(42));
        assert_eq!(world.ant_count(), 0);
        assert_eq!(world.tick(), Tick(0));
        assert_eq!(world.obstacles().blocks().len(), 4);

        let id = world.spawn_ant();
        assert_eq!(world.ant_count(), 1);
        let ant = world.ant(id).expect("ant");
        assert_eq!(ant.position(), world.colony().position());
        assert_eq!(ant.velocity(), Vec2::ZERO);
        assert_eq!(ant.state().current(), AntState::Searching);

        let other = world.spawn_ant_at(Vec2::new(3.0, 4.0));
        assert_eq!(world.ant(other).expect("ant").position(), Vec2::new(3.0, 4.0));

        assert!(world.remove_ant(id));
        assert!(!world.remove_ant(id));
        assert_eq!(world.ant_count(), 1);

        world.add_food_source(Vec2::new(10.0, 10.0), 25);
        assert_eq!(world.food_sources().len(), 1);
        assert_eq!(world.food_sources()[0].supply(), 25);
    }

    #[test]
    fn searching_ants_lay_home_trail() {
        let mut config = seeded_config(7);
        config.field.to_food_evaporation = 0.0;
        config.field.to_home_evaporation = 0.0;
        let mut world = World::new(config);
        world.populate(4);

        let mut last = None;
        for _ in 0..10 {
            last = Some(world.step(0.05));
        }
        let summary = last.expect("summary");
        assert_eq!(summary.ant_count, 4);
        assert_eq!(summary.searching, 4);
        assert_eq!(summary.returning, 0);
        assert!(summary.deposits > 0);
        assert!(summary.mean_to_home > 0.0);
        assert_eq!(summary.mean_to_food, 0.0);
    }

    #[test]
    fn evaporation_runs_after_the_ticks_deposits() {
        let mut config = seeded_config(11);
        // One field step per tick, strong enough to erase everything. If
        // evaporation ran before the deposit flush the trail would survive
        // into the summary.
        config.field.to_food_evaporation = 1_000.0;
        config.field.to_home_evaporation = 1_000.0;
        config.field_step_hz = 16.0;
        let mut world = World::new(config);
        world.populate(2);

        for _ in 0..5 {
            let summary = world.step(0.0625);
            assert!(summary.deposits > 0);
            assert_eq!(summary.mean_to_home, 0.0);
            assert_eq!(summary.mean_to_food, 0.0);
        }
    }

    #[test]
    fn history_is_bounded() {
        let mut config = seeded_config(3);
        config.history_capacity = 2;
        let mut world = World::new(config);
        world.step(0.05);
        world.step(0.05);
        world.step(0.05);
        let ticks: Vec<u64> = world.history().map(|s| s.tick.0).collect();
        assert_eq!(ticks, vec![2, 3]);
    }

    fn run_seeded(seed: u64, steps: usize) -> (Vec<TickSummary>, Vec<f32>, Vec<Vec2>) {
        let mut config = seeded_config(seed);
        config.history_capacity = steps;
        let mut world = World::new(config);
        world.add_food_source(Vec2::new(8.0, 8.0), 10);
        world.populate(6);
        for _ in 0..steps {
            world.step(0.05);
        }
        let history: Vec<TickSummary> = world.history().cloned().collect();
        let mut cells = world.field().channel(Channel::ToFood).cells().to_vec();
        cells.extend_from_slice(world.field().channel(Channel::ToHome).cells());
        let positions: Vec<Vec2> = world.ants().map(|(_, ant)| ant.position()).collect();
        (history, cells, positions)
    }

    #[test]
    fn seeded_runs_are_deterministic() {
        const STEPS: usize = 40;
        let (history_a, cells_a, positions_a) = run_seeded(0xDEAD_BEEF, STEPS);
        let (history_b, cells_b, positions_b) = run_seeded(0xDEAD_BEEF, STEPS);
        assert_eq!(history_a, history_b);
        assert_eq!(cells_a, cells_b);
        assert_eq!(positions_a, positions_b);

        let (history_c, cells_c, positions_c) = run_seeded(0xF00D_F00D, STEPS);
        assert!(
            history_a != history_c || cells_a != cells_c || positions_a != positions_c,
            "different seeds should diverge"
        );
    }
}
