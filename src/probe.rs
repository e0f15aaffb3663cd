//! Geometry probes.
//!
//! Once per sensing step the controller probes the geometry around the
//! agent: a sphere cast for ground, a second one for the slope under the
//! feet, a fan of rays for low ledges (steps), a ring of rays for walls, and
//! an upward cast for the headroom needed to stand up.
//!
//! The probes are pure functions of a [`PhysicsQuery`] and a
//! [`ProbeContext`]. Backends call [`sense`] from their sensing system and
//! store the resulting [`SenseSnapshot`] on the agent.

use std::f32::consts::FRAC_PI_4;

use bevy::prelude::*;

use crate::backend::{CapsuleShape, PhysicsQuery};
use crate::collision::CollisionData;
use crate::config::{
    ControllerConfig, GroundConfig, SlopeConfig, StanceConfig, StepConfig, WallConfig,
};

/// Normals with a smaller vertical component count as vertical faces.
const VERTICAL_FACE_TOLERANCE: f32 = 1e-4;

/// Slopes shallower than this (radians) count as flat.
const FLAT_TOLERANCE: f32 = 1e-3;

const WALL_RAYS: usize = 8;

/// Classification of the ledge in front of the agent.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    /// No ledge within reach.
    #[default]
    None,
    /// A ledge is in reach but the agent is not moving into it.
    Blocked,
    /// A ledge is in reach and the agent is moving into it.
    Climbable,
}

/// Result of the slope probe.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlopeProbeResult {
    pub hit: Option<CollisionData>,
    /// Angle between world up and the surface normal (radians).
    pub angle: f32,
    pub normal: Vec3,
    /// Walkable and not flat: `0 < angle < max_angle`.
    pub is_sloped: bool,
}

/// Result of the step probe.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepProbeResult {
    /// Number of fan rays that found a climbable ledge.
    pub hit_count: u32,
    pub state: StepState,
    /// `up × height × fraction` for the best ledge.
    pub projected_climb: Vec3,
    /// Sub-probe hit closest to the top of the scan.
    pub contact_point: Option<Vec3>,
}

/// Result of the wall probe.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WallProbeResult {
    pub touching: bool,
    pub normal: Vec3,
    pub distance: f32,
    pub entity: Option<Entity>,
}

/// Everything the probes found during one sensing step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SenseSnapshot {
    pub ground: Option<CollisionData>,
    pub slope: SlopeProbeResult,
    pub step: StepProbeResult,
    pub wall: WallProbeResult,
    /// The agent is pushing into a slope steeper than `max_angle`.
    pub intent_suppressed: bool,
    /// Something above the agent prevents standing up.
    pub headroom_blocked: bool,
}

impl SenseSnapshot {
    pub fn is_grounded(&self) -> bool {
        self.ground.is_some()
    }

    /// Entity of the ground collider, if any.
    pub fn ground_entity(&self) -> Option<Entity> {
        self.ground.and_then(|g| g.entity)
    }
}

/// Per-agent inputs to the probes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeContext {
    /// Body origin (collider centre).
    pub position: Vec3,
    pub rotation: Quat,
    /// Distance from the body origin to the bottom of its collider.
    pub bottom_offset: f32,
    /// Last resolved world movement direction (normalized or zero).
    pub move_direction: Vec3,
    /// Current stance speed. Reach of the steep-slope ray.
    pub speed: f32,
    /// Report a ground miss without casting.
    pub ground_suppressed: bool,
    /// Capsule currently applied to the body. Defaults to the standing shape.
    pub shape: CapsuleShape,
}

impl ProbeContext {
    pub fn new(position: Vec3, rotation: Quat, bottom_offset: f32) -> Self {
        Self {
            position,
            rotation,
            bottom_offset,
            move_direction: Vec3::ZERO,
            speed: 0.0,
            ground_suppressed: false,
            shape: StanceConfig::default().standing,
        }
    }

    pub fn with_motion(mut self, direction: Vec3, speed: f32) -> Self {
        self.move_direction = direction.normalize_or_zero();
        self.speed = speed;
        self
    }

    pub fn with_ground_suppressed(mut self, suppressed: bool) -> Self {
        self.ground_suppressed = suppressed;
        self
    }

    pub fn with_shape(mut self, shape: CapsuleShape) -> Self {
        self.shape = shape;
        self
    }

    /// Body up axis.
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Body forward axis (`-Z`).
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Bottom of the collider.
    pub fn feet(&self) -> Vec3 {
        self.position - self.up() * self.bottom_offset
    }
}

/// Run every probe.
pub fn sense(
    query: &impl PhysicsQuery,
    config: &ControllerConfig,
    ctx: &ProbeContext,
) -> SenseSnapshot {
    let ground = check_ground(query, &config.ground, ctx);
    let (slope, intent_suppressed) = check_slope(query, &config.ground, &config.slope, ctx);
    let step = check_step(query, &config.step, config.slope.max_angle, ctx);
    let wall = check_wall(query, &config.wall, ctx);
    let headroom_blocked = ctx.shape != config.stance.standing
        && check_headroom(query, config.stance.standing, ctx.shape, ctx);

    SenseSnapshot {
        ground,
        slope,
        step,
        wall,
        intent_suppressed,
        headroom_blocked,
    }
}

/// Sphere cast along the ground direction.
///
/// Reaches `bottom_offset + distance` from the body origin. A suppressed
/// probe reports a miss without casting.
pub fn check_ground(
    query: &impl PhysicsQuery,
    ground: &GroundConfig,
    ctx: &ProbeContext,
) -> Option<CollisionData> {
    if ctx.ground_suppressed {
        return None;
    }
    query.sphere_cast(
        ctx.position,
        ground.radius,
        ground.direction,
        ctx.bottom_offset + ground.distance,
    )
}

/// Sphere cast for the slope under the feet.
///
/// Also reports whether the agent is moving into a slope that is too steep:
/// a ray along the movement direction hits the same collider.
pub fn check_slope(
    query: &impl PhysicsQuery,
    ground: &GroundConfig,
    slope: &SlopeConfig,
    ctx: &ProbeContext,
) -> (SlopeProbeResult, bool) {
    let Some(hit) = query.sphere_cast(
        ctx.position,
        slope.radius,
        ground.direction,
        ctx.bottom_offset + slope.distance,
    ) else {
        return (SlopeProbeResult::default(), false);
    };

    let angle = Vec3::Y.angle_between(hit.normal);
    let result = SlopeProbeResult {
        hit: Some(hit),
        angle,
        normal: hit.normal,
        is_sloped: angle > FLAT_TOLERANCE && angle < slope.max_angle,
    };

    let suppressed = angle > slope.max_angle
        && ctx.move_direction != Vec3::ZERO
        && query
            .ray_cast(ctx.position, ctx.move_direction, ctx.speed)
            .is_some_and(|forward| forward.same_collider(&hit));

    (result, suppressed)
}

/// Fan of rays for low ledges.
///
/// Three rays at `0` and `±fan_angle` around the body's forward axis start
/// `offset` above the feet. A hit is a ledge when its face is vertical and a
/// ray `height` higher finds nothing. Each ledge is measured with
/// [`step_hit_point`].
pub fn check_step(
    query: &impl PhysicsQuery,
    step: &StepConfig,
    max_angle: f32,
    ctx: &ProbeContext,
) -> StepProbeResult {
    let up = ctx.up();
    let forward = ctx.forward();
    let origin = ctx.feet() + up * step.offset;

    let moving_forward = ctx.move_direction != Vec3::ZERO
        && ctx.move_direction.dot(forward) > 0.0
        && ctx.move_direction.angle_between(forward) <= max_angle;

    let mut result = StepProbeResult::default();
    let mut best_fraction = -1.0;

    for i in [-1.0f32, 0.0, 1.0] {
        let direction = Quat::from_axis_angle(up, step.fan_angle * i) * forward;
        let Some(hit) = query.ray_cast(origin, direction, step.distance) else {
            continue;
        };
        if hit.normal.dot(up).abs() >= VERTICAL_FACE_TOLERANCE {
            continue;
        }
        if query
            .ray_cast(origin + up * step.height, direction, step.distance)
            .is_some()
        {
            continue;
        }

        result.hit_count += 1;
        let (fraction, contact) = step_hit_point(query, step, origin, up, direction);
        if fraction > best_fraction {
            best_fraction = fraction;
            result.projected_climb = up * step.height * fraction;
            result.contact_point = contact;
        }
    }

    if result.hit_count > 0 {
        result.state = if moving_forward {
            StepState::Climbable
        } else {
            StepState::Blocked
        };
    }
    result
}

/// Vertical sub-probe over a ledge.
///
/// Casts `iterations` rays spanning `[offset, offset + height)` above the
/// feet. Returns the fraction of rays that hit and the hit nearest the top
/// of the scan.
pub fn step_hit_point(
    query: &impl PhysicsQuery,
    step: &StepConfig,
    origin: Vec3,
    up: Vec3,
    direction: Vec3,
) -> (f32, Option<Vec3>) {
    let iterations = step.iterations.max(1);
    let top = origin + up * step.height;
    let mut hits = 0u32;
    let mut contact: Option<Vec3> = None;

    for i in 0..iterations {
        let sample = origin + up * (step.height * i as f32 / iterations as f32);
        let Some(hit) = query.ray_cast(sample, direction, step.distance) else {
            continue;
        };
        hits += 1;
        let closer = contact.is_none_or(|c| hit.point.distance(top) < c.distance(top));
        if closer {
            contact = Some(hit.point);
        }
    }

    (hits as f32 / iterations as f32, contact)
}

/// Ring of eight horizontal rays around the body's up axis.
///
/// The closest hit wins.
pub fn check_wall(
    query: &impl PhysicsQuery,
    wall: &WallConfig,
    ctx: &ProbeContext,
) -> WallProbeResult {
    let up = ctx.up();
    let forward = ctx.forward();
    let origin = ctx.position + up * wall.height;

    (0..WALL_RAYS)
        .filter_map(|i| {
            let direction = Quat::from_axis_angle(up, FRAC_PI_4 * i as f32) * forward;
            query.ray_cast(origin, direction, wall.distance)
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
        .map(|hit| WallProbeResult {
            touching: true,
            normal: hit.normal,
            distance: hit.distance,
            entity: hit.entity,
        })
        .unwrap_or_default()
}

/// Distance a standing-radius sphere must travel up from the body origin to
/// clear the standing capsule, with the feet kept in place.
pub fn headroom_distance(standing: CapsuleShape, current: CapsuleShape) -> f32 {
    (standing.height - current.bottom_offset() - standing.radius).max(0.0)
}

/// Whether something above the agent prevents switching to `standing`.
pub fn check_headroom(
    query: &impl PhysicsQuery,
    standing: CapsuleShape,
    current: CapsuleShape,
    ctx: &ProbeContext,
) -> bool {
    let distance = headroom_distance(standing, current);
    distance > 0.0
        && query
            .sphere_cast(ctx.position, standing.radius, ctx.up(), distance)
            .is_some()
}
