//! Locomotion state and marker components.
//!
//! [`LocomotionState`] is derived fresh on every sensing step. The marker
//! components mirror it so that user systems can filter with `With<Grounded>`
//! and friends. They are added and removed by the controller systems.

use bevy::prelude::*;

/// Derived movement flags for an agent.
///
/// Only the sensing step writes this component; every other system reads it.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[reflect(Component)]
pub struct LocomotionState {
    pub is_grounded: bool,
    /// Standing on a walkable, non-flat slope.
    pub is_sloped: bool,
    pub is_touching_wall: bool,
    /// At least one step probe ray found a climbable ledge.
    pub is_touching_step: bool,
    /// A jump impulse fired and the agent has not landed since.
    pub is_jumping: bool,
    pub is_crouched: bool,
    pub is_sprinting: bool,
    pub is_prone: bool,
}

impl LocomotionState {
    /// Whether the resolver may move the agent this step.
    pub fn can_move(&self, air_control: f32) -> bool {
        self.is_grounded || air_control > 0.0
    }
}

/// Marker component indicating the agent is grounded.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use rigid_locomotion::prelude::*;
///
/// fn count_grounded(q: Query<(), With<Grounded>>) -> usize {
///     q.iter().count()
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the agent is airborne.
///
/// Mutually exclusive with [`Grounded`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Present while the wall probe reports contact.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct TouchingWall {
    /// Normal of the closest wall surface.
    pub normal: Vec3,
    /// Distance from the probe origin to the wall.
    pub distance: f32,
}

impl Default for TouchingWall {
    fn default() -> Self {
        Self {
            normal: Vec3::Z,
            distance: 0.0,
        }
    }
}

impl TouchingWall {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }
}
