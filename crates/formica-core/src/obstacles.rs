//! Obstacle geometry and the ray queries steering layers sense with.

use formica_field::{Rect, Vec2};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Result of a ray query: how far the ray travelled and the surface
/// normal at the hit point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub normal: Vec2,
}

/// Ray query against whatever blocks movement and scent probes.
pub trait ObstacleQuery: Sync {
    /// Casts from `origin` along `direction` (unit length) up to
    /// `max_distance`, returning the nearest hit if any.
    fn raycast(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> Option<RayHit>;
}

/// Obstacle-free world; every query misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObstacles;

impl ObstacleQuery for NoObstacles {
    fn raycast(&self, _origin: Vec2, _direction: Vec2, _max_distance: f32) -> Option<RayHit> {
        None
    }
}

/// A set of axis-aligned rectangular blockers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObstacleSet {
    blocks: Vec<Rect>,
}

impl ObstacleSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the four walls enclosing `area`, offset outward by `margin`
    /// and `thickness` thick. Walls overlap at the corners so rays cannot
    /// slip through diagonally.
    #[must_use]
    pub fn boundary_walls(area: Rect, thickness: f32, margin: f32) -> Self {
        let t = thickness.max(1e-3);
        let m = margin.max(0.0);
        let center = area.center();
        let half = area.size * 0.5;

        let x_offset = half.x + m + t * 0.5;
        let y_offset = half.y + m + t * 0.5;
        let horizontal = Vec2::new(area.size.x + 2.0 * (m + t), t);
        let vertical = Vec2::new(t, area.size.y + 2.0 * (m + t));

        let mut set = Self::new();
        set.push(centered_rect(center + Vec2::new(0.0, y_offset), horizontal));
        set.push(centered_rect(center + Vec2::new(0.0, -y_offset), horizontal));
        set.push(centered_rect(center + Vec2::new(-x_offset, 0.0), vertical));
        set.push(centered_rect(center + Vec2::new(x_offset, 0.0), vertical));
        set
    }

    pub fn push(&mut self, block: Rect) {
        self.blocks.push(block);
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    #[must_use]
    pub fn blocks(&self) -> &[Rect] {
        &self.blocks
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

fn centered_rect(center: Vec2, size: Vec2) -> Rect {
    Rect::new(center - size * 0.5, size)
}

impl ObstacleQuery for ObstacleSet {
    fn raycast(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> Option<RayHit> {
        if max_distance <= 0.0 {
            return None;
        }
        self.blocks
            .iter()
            .filter_map(|block| raycast_rect(*block, origin, direction, max_distance))
            .min_by_key(|hit| OrderedFloat(hit.distance))
    }
}

/// Slab intersection of a ray against one rectangle. A ray starting
/// inside reports a zero-distance hit with the normal facing back along
/// the ray.
fn raycast_rect(rect: Rect, origin: Vec2, direction: Vec2, max_distance: f32) -> Option<RayHit> {
    let min = rect.origin;
    let max = rect.max();
    let mut t_enter = 0.0_f32;
    let mut t_exit = max_distance;
    let mut normal = Vec2::ZERO;

    for axis in 0..2 {
        let (o, d, lo, hi, face) = match axis {
            0 => (origin.x, direction.x, min.x, max.x, Vec2::new(-1.0, 0.0)),
            _ => (origin.y, direction.y, min.y, max.y, Vec2::new(0.0, -1.0)),
        };
        if d.abs() < 1e-8 {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t1 = (lo - o) * inv;
        let mut t2 = (hi - o) * inv;
        let mut axis_normal = face;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
            axis_normal = -axis_normal;
        }
        if t1 > t_enter {
            t_enter = t1;
            normal = axis_normal;
        }
        t_exit = t_exit.min(t2);
        if t_enter > t_exit {
            return None;
        }
    }

    if normal == Vec2::ZERO {
        // Origin inside the rectangle.
        return Some(RayHit {
            distance: 0.0,
            normal: -direction.normalized_or_zero(),
        });
    }
    Some(RayHit {
        distance: t_enter,
        normal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_the_near_face_with_its_normal() {
        let mut set = ObstacleSet::new();
        set.push(Rect::new(Vec2::new(5.0, -1.0), Vec2::new(2.0, 2.0)));
        let hit = set
            .raycast(Vec2::ZERO, Vec2::new(1.0, 0.0), 10.0)
            .expect("hit");
        assert!((hit.distance - 5.0).abs() < 1e-5);
        assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn ray_misses_outside_reach() {
        let mut set = ObstacleSet::new();
        set.push(Rect::new(Vec2::new(5.0, -1.0), Vec2::new(2.0, 2.0)));
        assert!(set.raycast(Vec2::ZERO, Vec2::new(1.0, 0.0), 4.0).is_none());
        assert!(set.raycast(Vec2::ZERO, Vec2::new(0.0, 1.0), 10.0).is_none());
    }

    #[test]
    fn nearest_of_several_blocks_wins() {
        let mut set = ObstacleSet::new();
        set.push(Rect::new(Vec2::new(8.0, -1.0), Vec2::new(1.0, 2.0)));
        set.push(Rect::new(Vec2::new(3.0, -1.0), Vec2::new(1.0, 2.0)));
        let hit = set
            .raycast(Vec2::ZERO, Vec2::new(1.0, 0.0), 20.0)
            .expect("hit");
        assert!((hit.distance - 3.0).abs() < 1e-5);
    }

    #[test]
    fn ray_from_inside_reports_zero_distance() {
        let mut set = ObstacleSet::new();
        set.push(Rect::new(Vec2::new(-1.0, -1.0), Vec2::new(2.0, 2.0)));
        let hit = set
            .raycast(Vec2::ZERO, Vec2::new(1.0, 0.0), 5.0)
            .expect("hit");
        assert_eq!(hit.distance, 0.0);
        assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn boundary_walls_enclose_the_area() {
        let area = Rect::new(Vec2::new(-10.0, -10.0), Vec2::new(20.0, 20.0));
        let walls = ObstacleSet::boundary_walls(area, 1.0, 0.0);
        assert_eq!(walls.blocks().len(), 4);

        // A ray from the center must hit a wall in every cardinal direction
        // just past the area edge.
        for direction in [
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(0.0, -1.0),
        ] {
            let hit = walls
                .raycast(Vec2::ZERO, direction, 100.0)
                .expect("wall hit");
            assert!((hit.distance - 10.0).abs() < 1e-4);
            assert_eq!(hit.normal, -direction);
        }

        // Diagonal rays cannot escape through the corners.
        let diagonal = Vec2::new(1.0, 1.0).normalized_or_zero();
        assert!(walls.raycast(Vec2::ZERO, diagonal, 100.0).is_some());
    }

    #[test]
    fn no_obstacles_never_hits() {
        assert!(
            NoObstacles
                .raycast(Vec2::ZERO, Vec2::new(1.0, 0.0), 100.0)
                .is_none()
        );
    }
}
