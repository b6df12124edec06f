//! Dual-channel evaporating scalar field used for stigmergic communication.
//!
//! The field stores two independent intensity grids ("to food" and
//! "to home") over a rectangular world-space domain. Agents write into one
//! channel and read from the other; evaporation slowly erases stale trails.
//! Coordinate mapping, interpolation, and deposit combination are all
//! configurable so callers can trade write cost against gradient quality.

use serde::{Deserialize, Serialize};

/// Plain 2D vector over `f32`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Construct a new vector.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle` radians.
    #[must_use]
    pub fn from_angle(angle: f32) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Angle of the vector in radians, measured from the +x axis.
    #[must_use]
    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Returns the unit-length version of the vector, or zero for a
    /// degenerate input.
    #[must_use]
    pub fn normalized_or_zero(self) -> Self {
        let len = self.length();
        if len > f32::EPSILON {
            self * (1.0 / len)
        } else {
            Self::ZERO
        }
    }

    /// Scales the vector down so its length does not exceed `max`.
    #[must_use]
    pub fn clamp_length(self, max: f32) -> Self {
        let len_sq = self.length_squared();
        if max <= 0.0 {
            return Self::ZERO;
        }
        if len_sq > max * max {
            self * (max / len_sq.sqrt())
        } else {
            self
        }
    }

    /// Rotates the vector counter-clockwise by `angle` radians.
    #[must_use]
    pub fn rotated(self, angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos * self.x - sin * self.y, sin * self.x + cos * self.y)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Axis-aligned world-space rectangle given by its minimum corner and size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    /// Construct a new rectangle.
    #[must_use]
    pub const fn new(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    #[must_use]
    pub fn center(&self) -> Vec2 {
        self.origin + self.size * 0.5
    }

    #[must_use]
    pub fn max(&self) -> Vec2 {
        self.origin + self.size
    }

    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        let max = self.max();
        point.x >= self.origin.x && point.x <= max.x && point.y >= self.origin.y && point.y <= max.y
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::new(Vec2::ZERO, Vec2::new(1.0, 1.0))
    }
}

/// The two pheromone channels written and followed by agents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Marks a path toward food; followed by searching agents.
    ToFood,
    /// Marks a path toward the colony; followed by returning agents.
    ToHome,
}

impl Channel {
    /// The channel agents in the opposite role follow.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::ToFood => Self::ToHome,
            Self::ToHome => Self::ToFood,
        }
    }
}

/// How world-space points outside the mapped domain are treated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum BoundaryMode {
    /// Samples outside the domain read as empty, deposits are dropped.
    Ignore,
    /// Coordinates are projected onto the domain edge.
    Clamp,
    /// Toroidal domain; coordinates wrap and distances fold.
    #[default]
    Wrap,
}

/// Grid interpolation used when reading or writing intensities.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Nearest,
    Bilinear,
}

/// How an incoming deposit merges with the existing cell content.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CombineMode {
    /// Contributions accumulate.
    #[default]
    Additive,
    /// The cell keeps the greater of existing and incoming value.
    Max,
}

/// Channel blend used when rendering the field to pixels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DisplayMode {
    /// ToFood on red, ToHome on green.
    #[default]
    BlendRgb,
    ToFoodOnly,
    ToHomeOnly,
    /// Signed difference of the channels mapped to grayscale.
    Difference,
}

fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Single-channel grid of intensities with time-based evaporation.
///
/// Coordinates are normalized `(u, v)` in `[0, 1]` on both axes; mapping
/// from world space is the owner's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarField {
    width: u32,
    height: u32,
    cells: Vec<f32>,
    evaporation_per_second: f32,
}

impl ScalarField {
    /// Construct a zeroed grid. Non-positive dimensions are raised to one
    /// cell and a negative evaporation rate is treated as zero.
    #[must_use]
    pub fn new(width: u32, height: u32, evaporation_per_second: f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![0.0; (width as usize) * (height as usize)],
            evaporation_per_second: evaporation_per_second.max(0.0),
        }
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    #[must_use]
    pub const fn evaporation_per_second(&self) -> f32 {
        self.evaporation_per_second
    }

    pub fn set_evaporation_per_second(&mut self, rate: f32) {
        self.evaporation_per_second = rate.max(0.0);
    }

    /// Flat index for `(x, y)`; callers guarantee in-range coordinates.
    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Immutable access to a specific cell.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x < self.width && y < self.height {
            Some(self.cells[self.offset(x, y)])
        } else {
            None
        }
    }

    /// Fills every cell with `value`.
    pub fn fill(&mut self, value: f32) {
        self.cells.fill(value);
    }

    fn nearest_cell(&self, u: f32, v: f32) -> (u32, u32) {
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let x = (u * max_x).round().clamp(0.0, max_x) as u32;
        let y = (v * max_y).round().clamp(0.0, max_y) as u32;
        (x, y)
    }

    fn bilinear_cells(&self, u: f32, v: f32) -> (u32, u32, u32, u32, f32, f32) {
        let x = (u * (self.width - 1) as f32).max(0.0);
        let y = (v * (self.height - 1) as f32).max(0.0);
        let x0 = (x.floor() as u32).min(self.width - 1);
        let y0 = (y.floor() as u32).min(self.height - 1);
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        (x0, y0, x1, y1, x - x0 as f32, y - y0 as f32)
    }

    /// Reads the cell nearest to the normalized coordinates.
    #[must_use]
    pub fn sample_nearest(&self, u: f32, v: f32) -> f32 {
        let (x, y) = self.nearest_cell(u, v);
        self.cells[self.offset(x, y)]
    }

    /// Bilinear interpolation over the four surrounding cells.
    #[must_use]
    pub fn sample_bilinear(&self, u: f32, v: f32) -> f32 {
        let (x0, y0, x1, y1, tx, ty) = self.bilinear_cells(u, v);
        let c00 = self.cells[self.offset(x0, y0)];
        let c10 = self.cells[self.offset(x1, y0)];
        let c01 = self.cells[self.offset(x0, y1)];
        let c11 = self.cells[self.offset(x1, y1)];
        lerp(lerp(c00, c10, tx), lerp(c01, c11, tx), ty)
    }

    fn combine(&mut self, x: u32, y: u32, value: f32, mode: CombineMode) {
        let idx = self.offset(x, y);
        let cell = &mut self.cells[idx];
        *cell = match mode {
            CombineMode::Additive => *cell + value,
            CombineMode::Max => cell.max(value),
        };
    }

    /// Writes `amount` into the single nearest cell.
    pub fn deposit_nearest(&mut self, u: f32, v: f32, amount: f32, mode: CombineMode) {
        let (x, y) = self.nearest_cell(u, v);
        self.combine(x, y, amount, mode);
    }

    /// Splits `amount` over the four surrounding cells with bilinear
    /// weights. Under `Max` each cell competes against its own weighted
    /// fraction of the amount, not against the full amount; downstream
    /// tuning depends on that exact behavior.
    pub fn deposit_bilinear(&mut self, u: f32, v: f32, amount: f32, mode: CombineMode) {
        let (x0, y0, x1, y1, tx, ty) = self.bilinear_cells(u, v);
        self.combine(x0, y0, amount * (1.0 - tx) * (1.0 - ty), mode);
        self.combine(x1, y0, amount * tx * (1.0 - ty), mode);
        self.combine(x0, y1, amount * (1.0 - tx) * ty, mode);
        self.combine(x1, y1, amount * tx * ty, mode);
    }

    /// Spreads `amount` with linear falloff over every cell within `radius`
    /// of `center`. `extent` is the per-axis half-size of the cell bounding
    /// box to visit, `distance` reports the caller's metric (Euclidean or
    /// toroidal) from the deposit point to a cell center, and `wrap` selects
    /// whether out-of-range indices fold back into the grid or are skipped.
    pub fn deposit_radius<F>(
        &mut self,
        center: (i32, i32),
        extent: (i32, i32),
        amount: f32,
        radius: f32,
        wrap: bool,
        mode: CombineMode,
        distance: F,
    ) where
        F: Fn(u32, u32) -> f32,
    {
        if radius <= 0.0 {
            return;
        }
        let (cx, cy) = center;
        let (ex, ey) = (extent.0.max(0), extent.1.max(0));
        for y in (cy - ey)..=(cy + ey) {
            let Some(wy) = wrap_index(y, self.height, wrap) else {
                continue;
            };
            for x in (cx - ex)..=(cx + ex) {
                let Some(wx) = wrap_index(x, self.width, wrap) else {
                    continue;
                };
                let d = distance(wx, wy);
                if d > radius {
                    continue;
                }
                let weight = 1.0 - d / radius;
                self.combine(wx, wy, amount * weight, mode);
            }
        }
    }

    /// Applies evaporation for `dt` seconds: every cell is scaled by
    /// `clamp01(1 - rate * dt)`, so values shrink monotonically toward zero
    /// and never go negative.
    pub fn step(&mut self, dt: f32) {
        let k = clamp01(1.0 - self.evaporation_per_second * dt);
        if k >= 1.0 {
            return;
        }
        for cell in &mut self.cells {
            *cell *= k;
        }
    }
}

fn wrap_index(i: i32, n: u32, wrap: bool) -> Option<u32> {
    let n = n as i32;
    if wrap {
        Some(i.rem_euclid(n) as u32)
    } else if i >= 0 && i < n {
        Some(i as u32)
    } else {
        None
    }
}

/// Static configuration of a [`PheromoneField`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSettings {
    /// Grid cells along the x axis.
    pub width: u32,
    /// Grid cells along the y axis.
    pub height: u32,
    /// Treatment of points outside the mapped domain.
    pub boundary: BoundaryMode,
    /// Interpolation used by reads.
    pub sample_interpolation: Interpolation,
    /// Interpolation used by point writes when no deposit radius is set.
    pub deposit_interpolation: Interpolation,
    /// Merge policy for deposits landing on occupied cells.
    pub combine: CombineMode,
    /// Floor applied to sampled intensities; models ambient noise.
    pub min_intensity: f32,
    /// World-space deposit footprint. `Some` selects the radius-spreading
    /// write path for the whole field, `None` the interpolated point write.
    pub deposit_radius: Option<f32>,
    /// Evaporation rate of the ToFood channel, per second.
    pub to_food_evaporation: f32,
    /// Evaporation rate of the ToHome channel, per second.
    pub to_home_evaporation: f32,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            boundary: BoundaryMode::Wrap,
            sample_interpolation: Interpolation::Bilinear,
            deposit_interpolation: Interpolation::Nearest,
            combine: CombineMode::Additive,
            min_intensity: 0.0,
            deposit_radius: Some(0.3),
            to_food_evaporation: 0.5,
            to_home_evaporation: 0.5,
        }
    }
}

impl FieldSettings {
    /// Normalizes out-of-range values to safe minimums instead of
    /// rejecting them.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.width = self.width.max(1);
        self.height = self.height.max(1);
        self.min_intensity = self.min_intensity.max(0.0);
        self.to_food_evaporation = self.to_food_evaporation.max(0.0);
        self.to_home_evaporation = self.to_home_evaporation.max(0.0);
        self.deposit_radius = self.deposit_radius.filter(|r| *r > 0.0);
        self
    }
}

/// Two evaporating scalar channels mapped over a world-space rectangle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PheromoneField {
    settings: FieldSettings,
    bounds: Rect,
    cell_size: Vec2,
    to_food: ScalarField,
    to_home: ScalarField,
}

impl PheromoneField {
    /// Builds a field over `bounds`. Settings are sanitized first, and a
    /// degenerate rectangle falls back to a unit domain per axis.
    #[must_use]
    pub fn new(settings: FieldSettings, bounds: Rect) -> Self {
        let settings = settings.sanitized();
        let to_food = ScalarField::new(settings.width, settings.height, settings.to_food_evaporation);
        let to_home = ScalarField::new(settings.width, settings.height, settings.to_home_evaporation);
        let mut field = Self {
            settings,
            bounds,
            cell_size: Vec2::new(1.0, 1.0),
            to_food,
            to_home,
        };
        field.recompute_area_cache();
        field
    }

    #[must_use]
    pub fn settings(&self) -> &FieldSettings {
        &self.settings
    }

    #[must_use]
    pub const fn bounds(&self) -> Rect {
        self.bounds
    }

    /// World-space size of one grid cell.
    #[must_use]
    pub const fn cell_size(&self) -> Vec2 {
        self.cell_size
    }

    /// Read access to one channel's grid.
    #[must_use]
    pub fn channel(&self, channel: Channel) -> &ScalarField {
        match channel {
            Channel::ToFood => &self.to_food,
            Channel::ToHome => &self.to_home,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut ScalarField {
        match channel {
            Channel::ToFood => &mut self.to_food,
            Channel::ToHome => &mut self.to_home,
        }
    }

    /// Points the field at a new bounding rectangle and refreshes the
    /// cached mapping.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
        self.recompute_area_cache();
    }

    /// Recomputes the world-to-grid mapping from the current bounding
    /// rectangle. Must run after every change to that rectangle.
    pub fn recompute_area_cache(&mut self) {
        if self.bounds.size.x <= 0.0 {
            self.bounds.size.x = 1.0;
        }
        if self.bounds.size.y <= 0.0 {
            self.bounds.size.y = 1.0;
        }
        self.cell_size = Vec2::new(
            self.bounds.size.x / self.settings.width as f32,
            self.bounds.size.y / self.settings.height as f32,
        );
    }

    /// Maps a world-space point into normalized grid coordinates under the
    /// configured boundary mode. `Ignore` is the only mode that can fail.
    #[must_use]
    pub fn world_to_uv(&self, point: Vec2) -> Option<(f32, f32)> {
        let x = (point.x - self.bounds.origin.x) / self.bounds.size.x;
        let y = (point.y - self.bounds.origin.y) / self.bounds.size.y;
        match self.settings.boundary {
            BoundaryMode::Wrap => Some((x.rem_euclid(1.0), y.rem_euclid(1.0))),
            BoundaryMode::Clamp => Some((clamp01(x), clamp01(y))),
            BoundaryMode::Ignore => {
                if (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y) {
                    Some((x, y))
                } else {
                    None
                }
            }
        }
    }

    /// World-space center of a grid cell.
    #[must_use]
    pub fn grid_to_world(&self, x: u32, y: u32) -> Vec2 {
        grid_cell_center(self.bounds.origin, self.cell_size, x, y)
    }

    /// Distance between two points on the wrapped domain, taking the
    /// shorter way around on each axis.
    #[must_use]
    pub fn toroidal_distance(&self, a: Vec2, b: Vec2) -> f32 {
        toroidal_distance_in(self.bounds.size, a, b)
    }

    /// Samples one channel at a world-space point. Points rejected by the
    /// boundary mode read as exactly zero; everything else is floored at
    /// the configured minimum intensity.
    #[must_use]
    pub fn sample(&self, channel: Channel, point: Vec2) -> f32 {
        let Some((u, v)) = self.world_to_uv(point) else {
            return 0.0;
        };
        let field = self.channel(channel);
        let raw = match self.settings.sample_interpolation {
            Interpolation::Nearest => field.sample_nearest(u, v),
            Interpolation::Bilinear => field.sample_bilinear(u, v),
        };
        raw.max(self.settings.min_intensity)
    }

    /// Writes `amount` into one channel at a world-space point. Returns
    /// `false` without effect for non-positive amounts and for points the
    /// boundary mode rejects.
    pub fn deposit(&mut self, channel: Channel, point: Vec2, amount: f32) -> bool {
        if amount <= 0.0 {
            return false;
        }
        let Some((u, v)) = self.world_to_uv(point) else {
            return false;
        };
        let combine = self.settings.combine;
        match self.settings.deposit_radius {
            Some(radius) => self.deposit_spread(channel, point, u, v, amount, radius),
            None => {
                let interpolation = self.settings.deposit_interpolation;
                let field = self.channel_mut(channel);
                match interpolation {
                    Interpolation::Nearest => field.deposit_nearest(u, v, amount, combine),
                    Interpolation::Bilinear => field.deposit_bilinear(u, v, amount, combine),
                }
            }
        }
        true
    }

    fn deposit_spread(
        &mut self,
        channel: Channel,
        point: Vec2,
        u: f32,
        v: f32,
        amount: f32,
        radius: f32,
    ) {
        let width = self.settings.width;
        let height = self.settings.height;
        let cx = (u * (width - 1) as f32).floor() as i32;
        let cy = (v * (height - 1) as f32).floor() as i32;
        let extent = (
            (radius / self.cell_size.x).ceil() as i32,
            (radius / self.cell_size.y).ceil() as i32,
        );
        let wrap = self.settings.boundary == BoundaryMode::Wrap;
        let combine = self.settings.combine;
        let origin = self.bounds.origin;
        let size = self.bounds.size;
        let cell_size = self.cell_size;
        let distance = move |x: u32, y: u32| {
            let center = grid_cell_center(origin, cell_size, x, y);
            if wrap {
                toroidal_distance_in(size, center, point)
            } else {
                center.distance(point)
            }
        };
        self.channel_mut(channel)
            .deposit_radius((cx, cy), extent, amount, radius, wrap, combine, distance);
    }

    /// Advances evaporation on both channels independently.
    pub fn step(&mut self, dt: f32) {
        self.to_food.step(dt);
        self.to_home.step(dt);
    }

    /// Renders the current channel values to an RGBA8 pixel buffer, row 0
    /// first, one pixel per cell. Intensities are scaled by `scale` and
    /// clamped before quantization. Visualization only; never feeds back
    /// into the simulation.
    #[must_use]
    pub fn snapshot_rgba(&self, mode: DisplayMode, scale: f32) -> Vec<u8> {
        let len = (self.settings.width as usize) * (self.settings.height as usize);
        let mut pixels = Vec::with_capacity(len * 4);
        for i in 0..len {
            let f = clamp01(self.to_food.cells()[i] * scale);
            let h = clamp01(self.to_home.cells()[i] * scale);
            let (r, g, b) = match mode {
                DisplayMode::ToFoodOnly => (quantize(f), 0, 0),
                DisplayMode::ToHomeOnly => (0, quantize(h), 0),
                DisplayMode::Difference => {
                    let d = quantize(clamp01((f - h) * 0.5 + 0.5));
                    (d, d, d)
                }
                DisplayMode::BlendRgb => (quantize(f), quantize(h), 0),
            };
            pixels.extend_from_slice(&[r, g, b, 255]);
        }
        pixels
    }
}

fn quantize(value: f32) -> u8 {
    (value * 255.0) as u8
}

fn grid_cell_center(origin: Vec2, cell_size: Vec2, x: u32, y: u32) -> Vec2 {
    Vec2::new(
        origin.x + (x as f32 + 0.5) * cell_size.x,
        origin.y + (y as f32 + 0.5) * cell_size.y,
    )
}

fn toroidal_distance_in(size: Vec2, a: Vec2, b: Vec2) -> f32 {
    let mut dx = (a.x - b.x).abs();
    let mut dy = (a.y - b.y).abs();
    if dx > size.x * 0.5 {
        dx = size.x - dx;
    }
    if dy > size.y * 0.5 {
        dy = size.y - dy;
    }
    (dx * dx + dy * dy).sqrt()
}
