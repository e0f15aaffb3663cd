//! The locomotion controller component.

use bevy::prelude::*;

use crate::backend::CapsuleShape;
use crate::config::ControllerConfig;
use crate::intent::MovementIntent;
use crate::jump::JumpController;
use crate::movement::LocomotionMotor;
use crate::probe::SenseSnapshot;
use crate::state::LocomotionState;
use crate::step::StepAssist;

/// Marks an entity as a locomotion agent and holds the sensing results.
///
/// Inserting it pulls in the rest of the controller through required
/// components. The sensing step writes [`Self::snapshot`]; the fixed-step
/// systems read it.
///
/// Forces are accumulated here rather than written to the body directly.
/// The backend subtracts last step's contribution before the controller
/// systems run and adds the new total afterwards, so forces applied by user
/// code are preserved.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use rigid_locomotion::prelude::*;
///
/// let mut world = World::new();
/// let agent = world
///     .spawn((LocomotionController::default(), ControllerConfig::player()))
///     .id();
/// assert!(world.get::<MovementIntent>(agent).is_some());
/// assert!(world.get::<JumpController>(agent).is_some());
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
#[require(
    ControllerConfig,
    MovementIntent,
    LocomotionState,
    JumpController,
    StepAssist,
    LocomotionMotor
)]
pub struct LocomotionController {
    /// Latest probe results.
    #[reflect(ignore)]
    pub snapshot: SenseSnapshot,
    /// Distance from the body origin to the bottom of its collider.
    pub bottom_offset: f32,
    /// Capsule last applied for a stance. `None` until the first stance change.
    pub applied_shape: Option<CapsuleShape>,
    accumulated_force: Vec3,
    applied_force: Vec3,
}

impl LocomotionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a continuous force for this step.
    pub fn add_force(&mut self, force: Vec3) {
        self.accumulated_force += force;
    }

    /// Force accumulated so far this step.
    pub fn accumulated_force(&self) -> Vec3 {
        self.accumulated_force
    }

    /// Start a new step. Returns the force applied on the previous step,
    /// which the backend removes from the body.
    pub fn prepare_new_frame(&mut self) -> Vec3 {
        self.accumulated_force = Vec3::ZERO;
        std::mem::take(&mut self.applied_force)
    }

    /// Finish the step. Returns the accumulated force, which the backend
    /// adds to the body, and remembers it for the next step.
    pub fn finalize_frame(&mut self) -> Vec3 {
        self.applied_force = std::mem::take(&mut self.accumulated_force);
        self.applied_force
    }

    /// Capsule currently on the body.
    pub fn current_shape(&self, config: &ControllerConfig) -> CapsuleShape {
        self.applied_shape.unwrap_or(config.stance.standing)
    }
}
