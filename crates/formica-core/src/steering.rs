//! Steering behaviors and their subsumption arbiter.
//!
//! Each behavior is a layer producing a candidate force or abstaining for
//! the tick. The arbiter obeys the highest-priority layer with an opinion
//! and ignores the rest, which keeps urgent concerns (not running into a
//! wall) from being averaged away by background ones (wandering).

use formica_field::{Channel, PheromoneField, Vec2};
use rand::Rng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::AntState;
use crate::obstacles::ObstacleQuery;

const FULL_TURN: f32 = std::f32::consts::TAU;
const HALF_TURN: f32 = std::f32::consts::PI;

/// Normalizes an angle into `(-PI, PI]`.
#[must_use]
pub fn wrap_signed_angle(mut angle: f32) -> f32 {
    if angle.is_nan() {
        return 0.0;
    }
    while angle <= -HALF_TURN {
        angle += FULL_TURN;
    }
    while angle > HALF_TURN {
        angle -= FULL_TURN;
    }
    angle
}

/// Rotates `current` toward `target` by at most `max_delta` radians along
/// the shorter arc.
#[must_use]
pub fn move_towards_angle(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = wrap_signed_angle(target - current);
    if delta.abs() <= max_delta {
        target
    } else {
        current + max_delta.copysign(delta)
    }
}

/// Uniformly distributed point inside the unit disk.
fn random_in_unit_disk(rng: &mut SmallRng) -> Vec2 {
    let angle = rng.random_range(0.0..FULL_TURN);
    let radius = rng.random::<f32>().sqrt();
    Vec2::from_angle(angle) * radius
}

/// Uniformly distributed unit vector.
fn random_unit(rng: &mut SmallRng) -> Vec2 {
    Vec2::from_angle(rng.random_range(0.0..FULL_TURN))
}

/// Repeating timer with a configurable period.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Cooldown {
    target: f32,
    value: f32,
}

impl Cooldown {
    /// Construct a timer that fires every `target_seconds`.
    #[must_use]
    pub fn new(target_seconds: f32) -> Self {
        Self {
            target: target_seconds.max(0.0),
            value: 0.0,
        }
    }

    #[must_use]
    pub const fn target(&self) -> f32 {
        self.target
    }

    #[must_use]
    pub const fn value(&self) -> f32 {
        self.value
    }

    pub fn set_target(&mut self, target_seconds: f32) {
        self.target = target_seconds.max(0.0);
        if self.value > self.target {
            self.value = self.target;
        }
    }

    /// Starts the timer at a random phase so many timers created together
    /// do not all fire on the same tick.
    pub fn set_random_offset(&mut self, rng: &mut SmallRng) {
        self.value = if self.target <= 0.0 {
            0.0
        } else {
            rng.random::<f32>() * self.target
        };
    }

    pub fn update(&mut self, dt: f32) {
        self.value += dt;
    }

    #[must_use]
    pub fn ready(&self) -> bool {
        self.value >= self.target
    }

    /// Advances the timer and reports whether it fired, retaining any
    /// overshoot for the next period.
    pub fn update_auto_reset(&mut self, dt: f32) -> bool {
        self.value += dt;
        if self.value >= self.target {
            self.value -= self.target;
            return true;
        }
        false
    }

    /// Progress toward the next firing in `[0, 1]`.
    #[must_use]
    pub fn ratio(&self) -> f32 {
        if self.target <= 0.0 {
            1.0
        } else {
            (self.value / self.target).clamp(0.0, 1.0)
        }
    }
}

/// A circular goal region in world space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GoalDisc {
    pub position: Vec2,
    pub radius: f32,
}

impl GoalDisc {
    #[must_use]
    pub fn contains(&self, point: Vec2, pad: f32) -> bool {
        self.position.distance(point) <= self.radius + pad
    }
}

/// Read-only view of the world handed to each layer for one evaluation.
pub struct SteeringContext<'a> {
    pub field: &'a PheromoneField,
    pub obstacles: &'a dyn ObstacleQuery,
    /// The colony's goal region, targeted by returning agents.
    pub colony: GoalDisc,
    /// Goal regions of food sources that still have supply.
    pub food: &'a [GoalDisc],
    pub state: AntState,
    /// Channel the agent's current state reads from.
    pub sample_channel: Channel,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Body rotation in radians.
    pub heading: f32,
    /// Facing per the movement rules: velocity direction when moving,
    /// body rotation when idling.
    pub heading_direction: Vec2,
    pub heading_angle: f32,
    pub max_speed: f32,
}

/// A layer's verdict for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringResult {
    pub active: bool,
    pub force: Vec2,
}

impl SteeringResult {
    /// The layer has no opinion this tick.
    #[must_use]
    pub const fn inactive() -> Self {
        Self {
            active: false,
            force: Vec2::ZERO,
        }
    }

    /// The layer wants to apply `force`.
    #[must_use]
    pub const fn active(force: Vec2) -> Self {
        Self {
            active: true,
            force,
        }
    }
}

/// A unit of steering behavior owned by one agent.
pub trait SteeringLayer: Send {
    /// Static urgency; higher wins arbitration.
    fn priority(&self) -> i32;

    /// Produce this tick's verdict. Called every tick even when a higher
    /// priority layer has already won, so internal timers stay correct.
    fn steer(&mut self, ctx: &SteeringContext<'_>, rng: &mut SmallRng, dt: f32) -> SteeringResult;
}

/// Winner-take-all arbitration over a fixed stack of layers.
pub struct SubsumptionArbiter {
    layers: Vec<Box<dyn SteeringLayer>>,
}

impl SubsumptionArbiter {
    /// Takes ownership of the layers and orders them by descending
    /// priority. Ties keep registration order.
    #[must_use]
    pub fn new(mut layers: Vec<Box<dyn SteeringLayer>>) -> Self {
        layers.sort_by_key(|layer| std::cmp::Reverse(layer.priority()));
        Self { layers }
    }

    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Evaluates every layer in priority order and returns the force of
    /// the first active one, or zero when all abstain. Layers below the
    /// winner are still evaluated for their timer side effects.
    pub fn calculate_steering(
        &mut self,
        ctx: &SteeringContext<'_>,
        rng: &mut SmallRng,
        dt: f32,
    ) -> Vec2 {
        let mut winner: Option<Vec2> = None;
        for layer in &mut self.layers {
            let result = layer.steer(ctx, rng, dt);
            if winner.is_none() && result.active {
                winner = Some(result.force);
            }
        }
        winner.unwrap_or(Vec2::ZERO)
    }
}

impl std::fmt::Debug for SubsumptionArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsumptionArbiter")
            .field("layer_count", &self.layers.len())
            .finish()
    }
}

/// Tunables of the movement integrator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MovementSettings {
    pub mass: f32,
    /// Cap on the steering force magnitude.
    pub max_force: f32,
    pub max_speed: f32,
    /// Turn rate limit in degrees per second.
    pub max_turn_rate: f32,
    /// Below this speed the agent is idling and keeps its last heading.
    pub min_heading_speed: f32,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            mass: 1.0,
            max_force: 10.0,
            max_speed: 4.0,
            max_turn_rate: 360.0,
            min_heading_speed: 0.02,
        }
    }
}

impl MovementSettings {
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.mass = self.mass.max(1e-4);
        self.max_force = self.max_force.max(0.0);
        self.max_speed = self.max_speed.max(0.0);
        self.max_turn_rate = self.max_turn_rate.max(0.0);
        self.min_heading_speed = self.min_heading_speed.max(0.0);
        self
    }

    /// Applies a priority-resolved force: clamp to the force limit, divide
    /// by mass, integrate and cap velocity, then rotate the heading toward
    /// the velocity direction within the turn rate limit. Returns the new
    /// velocity and heading.
    #[must_use]
    pub fn integrate(&self, velocity: Vec2, heading: f32, force: Vec2, dt: f32) -> (Vec2, f32) {
        let force = force.clamp_length(self.max_force);
        let acceleration = force * (1.0 / self.mass);
        let velocity = (velocity + acceleration * dt).clamp_length(self.max_speed);
        let heading = if velocity.length_squared() > self.min_heading_speed * self.min_heading_speed
        {
            let target = velocity.angle();
            move_towards_angle(heading, target, self.max_turn_rate.to_radians() * dt)
        } else {
            heading
        };
        (velocity, heading)
    }

    /// Current facing: the velocity direction when moving, the body
    /// rotation when idling.
    #[must_use]
    pub fn heading_direction(&self, velocity: Vec2, heading: f32) -> Vec2 {
        if velocity.length_squared() > self.min_heading_speed * self.min_heading_speed {
            velocity.normalized_or_zero()
        } else {
            Vec2::from_angle(heading)
        }
    }

    /// Angle form of [`Self::heading_direction`].
    #[must_use]
    pub fn heading_angle(&self, velocity: Vec2, heading: f32) -> f32 {
        if velocity.length_squared() > self.min_heading_speed * self.min_heading_speed {
            velocity.angle()
        } else {
            heading
        }
    }
}

/// Tunables of the wander layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WanderSettings {
    pub priority: i32,
    pub weight: f32,
    /// Radius of the circle the wander target lives on.
    pub radius: f32,
    /// Forward offset of that circle from the agent.
    pub distance: f32,
    /// Magnitude of the per-second random walk applied to the target.
    pub jitter: f32,
}

impl Default for WanderSettings {
    fn default() -> Self {
        Self {
            priority: 0,
            weight: 1.0,
            radius: 1.0,
            distance: 2.0,
            jitter: 4.0,
        }
    }
}

impl WanderSettings {
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.radius = self.radius.max(1e-3);
        self.distance = self.distance.max(0.0);
        self.jitter = self.jitter.max(0.0);
        self
    }
}

/// Random exploration: steers toward a point that drifts on a circle held
/// in front of the agent. Always has an opinion.
#[derive(Debug, Clone)]
pub struct WanderLayer {
    settings: WanderSettings,
    target: Vec2,
}

impl WanderLayer {
    #[must_use]
    pub fn new(settings: WanderSettings, rng: &mut SmallRng) -> Self {
        let settings = settings.sanitized();
        let target = random_unit(rng) * settings.radius;
        Self { settings, target }
    }
}

impl SteeringLayer for WanderLayer {
    fn priority(&self) -> i32 {
        self.settings.priority
    }

    fn steer(&mut self, ctx: &SteeringContext<'_>, rng: &mut SmallRng, dt: f32) -> SteeringResult {
        self.target += random_in_unit_disk(rng) * (self.settings.jitter * dt);
        self.target = self.target.normalized_or_zero() * self.settings.radius;

        let local_target = self.target + Vec2::new(self.settings.distance, 0.0);
        let world_target = ctx.position + local_target.rotated(ctx.heading);
        let desired_direction = (world_target - ctx.position).normalized_or_zero();
        let desired_velocity = desired_direction * ctx.max_speed;
        SteeringResult::active((desired_velocity - ctx.velocity) * self.settings.weight)
    }
}

/// Tunables of the obstacle avoidance layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AvoidanceSettings {
    pub priority: i32,
    pub weight: f32,
    /// How far ahead along the facing the probe ray reaches.
    pub look_ahead: f32,
}

impl Default for AvoidanceSettings {
    fn default() -> Self {
        Self {
            priority: 2,
            weight: 1.0,
            look_ahead: 1.5,
        }
    }
}

impl AvoidanceSettings {
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.look_ahead = self.look_ahead.max(0.0);
        self
    }
}

/// Steers away from obstacles by reflecting the facing about the surface
/// normal of whatever the forward probe ray hits.
#[derive(Debug, Clone)]
pub struct ObstacleAvoidanceLayer {
    settings: AvoidanceSettings,
}

impl ObstacleAvoidanceLayer {
    #[must_use]
    pub fn new(settings: AvoidanceSettings) -> Self {
        Self {
            settings: settings.sanitized(),
        }
    }
}

fn reflect(incident: Vec2, normal: Vec2) -> Vec2 {
    incident - normal * (2.0 * incident.dot(normal))
}

impl SteeringLayer for ObstacleAvoidanceLayer {
    fn priority(&self) -> i32 {
        self.settings.priority
    }

    fn steer(&mut self, ctx: &SteeringContext<'_>, _rng: &mut SmallRng, _dt: f32) -> SteeringResult {
        let direction = ctx.heading_direction;
        let Some(hit) = ctx
            .obstacles
            .raycast(ctx.position, direction, self.settings.look_ahead)
        else {
            return SteeringResult::inactive();
        };
        let away = reflect(direction, hit.normal).normalized_or_zero();
        let desired_velocity = away * ctx.max_speed;
        SteeringResult::active((desired_velocity - ctx.velocity) * self.settings.weight)
    }
}

/// Tunables of the pheromone-following layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FollowSettings {
    pub priority: i32,
    pub weight: f32,
    /// Candidate rays evaluated per direction update.
    pub sample_count: u32,
    /// Farthest world-space distance a candidate probe can reach.
    pub max_sample_distance: f32,
    /// Total angular spread of candidates around the current facing.
    pub sample_angle_range: f32,
    /// Seconds between direction updates.
    pub update_interval: f32,
    /// Range the per-agent early-termination probability is drawn from.
    pub liberty_coef_min: f32,
    pub liberty_coef_max: f32,
    /// Half-range of the random rotation applied to each chosen direction.
    pub direction_noise: f32,
    /// Intensities at or below this read as no signal.
    pub activation_threshold: f32,
    /// Extra reach added to goal regions when probing for a direct hit.
    pub goal_probe_radius: f32,
}

impl Default for FollowSettings {
    fn default() -> Self {
        Self {
            priority: 1,
            weight: 1.0,
            sample_count: 32,
            max_sample_distance: 10.0,
            sample_angle_range: std::f32::consts::FRAC_PI_2,
            update_interval: 0.25,
            liberty_coef_min: 0.001,
            liberty_coef_max: 0.01,
            direction_noise: std::f32::consts::PI * 0.02,
            activation_threshold: 1e-4,
            goal_probe_radius: 0.05,
        }
    }
}

impl FollowSettings {
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.sample_count = self.sample_count.max(1);
        self.max_sample_distance = self.max_sample_distance.max(1e-3);
        self.sample_angle_range = self.sample_angle_range.max(0.0);
        self.update_interval = self.update_interval.max(0.0);
        self.liberty_coef_min = self.liberty_coef_min.clamp(0.0, 1.0);
        self.liberty_coef_max = self.liberty_coef_max.clamp(self.liberty_coef_min, 1.0);
        self.direction_noise = self.direction_noise.max(0.0);
        self.activation_threshold = self.activation_threshold.max(0.0);
        self.goal_probe_radius = self.goal_probe_radius.max(0.0);
        self
    }
}

/// Trail following by sector sampling: on a cooldown, cast candidate rays
/// around the current facing, skip blocked ones, and commit to the
/// direction with the strongest scent on the state's channel. A candidate
/// that lands directly on the current hard goal (food while searching,
/// the colony while returning) wins immediately. Without an informative
/// signal the layer abstains and exploration falls through to wander.
#[derive(Debug, Clone)]
pub struct PheromoneFollowLayer {
    settings: FollowSettings,
    direction_update: Cooldown,
    liberty_coef: f32,
    direction: Vec2,
    informed: bool,
}

impl PheromoneFollowLayer {
    /// `initial_direction` seeds the persisted direction until the first
    /// cooldown firing. The cooldown phase and the early-termination
    /// probability are randomized per agent.
    #[must_use]
    pub fn new(settings: FollowSettings, initial_direction: Vec2, rng: &mut SmallRng) -> Self {
        let settings = settings.sanitized();
        let mut direction_update = Cooldown::new(settings.update_interval);
        direction_update.set_random_offset(rng);
        let liberty_coef = rng.random_range(settings.liberty_coef_min..=settings.liberty_coef_max);
        Self {
            settings,
            direction_update,
            liberty_coef,
            direction: initial_direction.normalized_or_zero(),
            informed: false,
        }
    }

    fn hard_goal_hit(&self, ctx: &SteeringContext<'_>, point: Vec2) -> bool {
        let pad = self.settings.goal_probe_radius;
        match ctx.state {
            AntState::Searching => ctx.food.iter().any(|goal| goal.contains(point, pad)),
            AntState::Returning => ctx.colony.contains(point, pad),
        }
    }

    /// Scans candidate directions and reports the best one together with
    /// whether it carried an informative signal.
    fn sample_direction(&self, ctx: &SteeringContext<'_>, rng: &mut SmallRng) -> (Vec2, bool) {
        let half_range = self.settings.sample_angle_range * 0.5;
        let mut best_intensity = 0.0_f32;
        let mut best_direction = self.direction;

        for _ in 0..self.settings.sample_count {
            let delta = rng.random_range(-half_range..=half_range);
            let angle = ctx.heading_angle + delta;
            let direction = Vec2::from_angle(angle);
            let distance = rng.random_range(0.0..=self.settings.max_sample_distance);

            if ctx.obstacles.raycast(ctx.position, direction, distance).is_some() {
                continue;
            }
            let target = ctx.position + direction * distance;
            if self.hard_goal_hit(ctx, target) {
                return (direction, true);
            }
            let intensity = ctx.field.sample(ctx.sample_channel, target);
            if intensity > best_intensity {
                best_intensity = intensity;
                best_direction = direction;
            }
            if rng.random::<f32>() < self.liberty_coef {
                break;
            }
        }

        (best_direction, best_intensity > self.settings.activation_threshold)
    }
}

impl SteeringLayer for PheromoneFollowLayer {
    fn priority(&self) -> i32 {
        self.settings.priority
    }

    fn steer(&mut self, ctx: &SteeringContext<'_>, rng: &mut SmallRng, dt: f32) -> SteeringResult {
        if self.direction_update.update_auto_reset(dt) {
            let (direction, informed) = self.sample_direction(ctx, rng);
            self.informed = informed;
            if informed {
                let noise = self.settings.direction_noise;
                let noise_angle = rng.random_range(-noise..=noise);
                self.direction = direction.rotated(noise_angle);
            }
        }

        if !self.informed {
            return SteeringResult::inactive();
        }
        let desired_velocity = self.direction * ctx.max_speed;
        SteeringResult::active((desired_velocity - ctx.velocity) * self.settings.weight)
    }
}
