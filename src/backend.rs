//! Physics backend abstraction.
//!
//! This module defines the traits that physics backends implement to drive
//! the locomotion controller. [`LocomotionBackend`] covers the dynamic body
//! (velocity, forces, position, material), while [`PhysicsQuery`] covers the
//! geometric queries the probes issue during the sensing step.

use bevy::prelude::*;

use crate::collision::CollisionData;

/// How a vector passed to [`LocomotionBackend::add_force`] is interpreted.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ForceMode {
    /// Continuous force, scaled by mass and integrated over the timestep.
    #[default]
    Force,
    /// Continuous acceleration, independent of mass.
    Acceleration,
    /// Instantaneous change in momentum.
    Impulse,
    /// Instantaneous change in velocity, independent of mass.
    VelocityChange,
}

/// How the body's friction is combined with the surface it touches.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrictionCombine {
    #[default]
    Average,
    Min,
    Multiply,
    Max,
}

/// Friction material of the agent's collider.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct SurfaceFriction {
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub combine: FrictionCombine,
}

impl SurfaceFriction {
    /// Frictionless material used while sliding down an unlocked slope.
    pub const SLIDING: Self = Self {
        static_friction: 0.0,
        dynamic_friction: 0.0,
        combine: FrictionCombine::Multiply,
    };
}

impl Default for SurfaceFriction {
    fn default() -> Self {
        Self {
            static_friction: 0.6,
            dynamic_friction: 0.6,
            combine: FrictionCombine::Average,
        }
    }
}

/// Capsule dimensions used for a stance.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CapsuleShape {
    /// Total height of the capsule, caps included.
    pub height: f32,
    pub radius: f32,
}

impl CapsuleShape {
    pub fn new(height: f32, radius: f32) -> Self {
        Self { height, radius }
    }

    /// Half-length of the cylindrical segment.
    pub fn half_segment(&self) -> f32 {
        ((self.height - 2.0 * self.radius) * 0.5).max(0.0)
    }

    /// Distance from the capsule centre to its bottom.
    pub fn bottom_offset(&self) -> f32 {
        self.half_segment() + self.radius
    }
}

/// Synchronous geometry queries against the agent's collision mask.
///
/// Implementations exclude the agent's own body and apply its collision
/// groups, so the probes never have to filter results themselves.
pub trait PhysicsQuery {
    /// Sweep a sphere of `radius` from `origin` along `direction`.
    ///
    /// `direction` is expected to be normalized.
    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<CollisionData>;

    /// Cast a ray from `origin` along `direction`.
    fn ray_cast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<CollisionData>;
}

/// Trait for physics backend implementations.
///
/// Implement this trait to integrate a physics engine with the locomotion
/// controller. The generic fixed-step systems only talk to the body through
/// these functions. The backend's own plugin is responsible for the sensing
/// step (it owns the engine's query context) and for feeding contact
/// callbacks into [`crate::step::StepAssist`].
pub trait LocomotionBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Get the current linear velocity of an entity.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Set the linear velocity of an entity.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Add a force, acceleration, impulse or velocity change.
    fn add_force(world: &mut World, entity: Entity, force: Vec3, mode: ForceMode);

    /// Get the current world position of an entity.
    fn get_position(world: &World, entity: Entity) -> Vec3;

    /// Teleport an entity to a new world position.
    fn set_position(world: &mut World, entity: Entity, position: Vec3);

    /// Get the current world rotation of an entity.
    fn get_rotation(world: &World, entity: Entity) -> Quat;

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }

    /// Get the gravity acting on the agents.
    fn get_gravity(world: &World) -> Vec3 {
        world
            .get_resource::<LocomotionGravity>()
            .map(|g| g.0)
            .unwrap_or(LocomotionGravity::default().0)
    }

    /// Get the mass of an entity.
    fn get_mass(_world: &World, _entity: Entity) -> f32 {
        // Default implementation returns 1.0 (no scaling)
        1.0
    }

    /// Distance from the body origin to the bottom of its collider.
    fn get_bottom_offset(_world: &World, _entity: Entity) -> f32 {
        0.0
    }

    /// Read the friction material of the entity's collider.
    ///
    /// Returns `None` when the collider has no material; friction overrides
    /// are then disabled for that agent.
    fn get_friction(_world: &World, _entity: Entity) -> Option<SurfaceFriction> {
        None
    }

    /// Write the friction material of the entity's collider.
    fn set_friction(_world: &mut World, _entity: Entity, _friction: SurfaceFriction) {}

    /// Replace the entity's capsule with the given stance shape.
    fn set_capsule(_world: &mut World, _entity: Entity, _shape: CapsuleShape) {}
}

/// Gravity used by the controller for slope sliding and air control.
#[derive(Resource, Reflect, Debug, Clone, Copy)]
#[reflect(Resource)]
pub struct LocomotionGravity(pub Vec3);

impl Default for LocomotionGravity {
    fn default() -> Self {
        Self(Vec3::new(0.0, -9.81, 0.0))
    }
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}
