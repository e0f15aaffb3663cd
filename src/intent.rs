//! Movement intent components.
//!
//! Intents represent the desired movement from player input or AI. They
//! persist until overwritten; the controller systems read them every step.

use std::time::Duration;

use bevy::prelude::*;

use crate::jump::JumpController;
use crate::stamina::StaminaGate;

/// Desired movement for an agent.
///
/// The axis is a 2D input where `+y` means forward. It is mapped into the
/// agent's reference frame (see [`MovementFrame`]) by the resolver.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use rigid_locomotion::prelude::*;
///
/// let mut intent = MovementIntent::new();
/// intent.move_axis(Vec2::new(0.0, 1.0));
/// assert!(intent.is_moving());
/// assert_eq!(intent.local_direction(), Vec3::NEG_Z);
///
/// intent.jump(1.0);
/// assert!(intent.take_jump_request().is_some());
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct MovementIntent {
    /// Normalized input axis.
    pub axis: Vec2,
    /// Whether the velocity is supplied externally (animation root motion).
    pub root_motion: bool,
    /// World-space facing supplied with root motion.
    pub root_direction: Vec3,
    /// World-space velocity supplied with root motion.
    pub root_velocity: Vec3,
    /// Last non-zero local direction. Cleared after the idle reset delay.
    pub last_direction: Vec3,
    #[reflect(ignore)]
    idle_reset: Option<Timer>,
    /// Pending jump request, consumed by the fixed step.
    pub jump_request: Option<JumpRequest>,
    pub sprint: bool,
    pub crouch: bool,
    pub prone: bool,
}

impl MovementIntent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the input axis and switch to direct control.
    pub fn move_axis(&mut self, axis: Vec2) {
        self.root_motion = false;
        self.axis = axis.normalize_or_zero();
        if self.axis != Vec2::ZERO {
            self.last_direction = self.local_direction();
            self.idle_reset = None;
        }
    }

    /// Drive the agent with an externally supplied velocity.
    pub fn move_root_motion(&mut self, direction: Vec3, velocity: Vec3) {
        self.root_motion = true;
        self.root_direction = direction.normalize_or_zero();
        self.root_velocity = velocity;
    }

    /// Clear all movement input.
    pub fn clear(&mut self) {
        self.move_axis(Vec2::ZERO);
        self.root_velocity = Vec3::ZERO;
        self.root_direction = Vec3::ZERO;
    }

    /// Input axis as a local direction (`+y` forward maps to `-Z`).
    pub fn local_direction(&self) -> Vec3 {
        Vec3::new(self.axis.x, 0.0, -self.axis.y)
    }

    pub fn is_moving(&self) -> bool {
        if self.root_motion {
            self.root_velocity != Vec3::ZERO
        } else {
            self.axis != Vec2::ZERO
        }
    }

    /// Whether the idle reset countdown is running.
    pub fn idle_reset_pending(&self) -> bool {
        self.idle_reset.is_some()
    }

    /// Advance the idle reset countdown.
    ///
    /// While the axis is zero and a direction is remembered, a countdown of
    /// `delay` seconds is armed. When it elapses and the axis is still zero,
    /// the remembered direction is cleared.
    pub fn tick(&mut self, delta: Duration, delay: f32) {
        if self.axis != Vec2::ZERO || self.last_direction == Vec3::ZERO {
            self.idle_reset = None;
            return;
        }

        let timer = self
            .idle_reset
            .get_or_insert_with(|| Timer::from_seconds(delay.max(0.0), TimerMode::Once));
        timer.tick(delta);

        if timer.finished() {
            self.idle_reset = None;
            self.last_direction = Vec3::ZERO;
        }
    }

    /// Request a jump with the given impulse scale.
    pub fn jump(&mut self, scale: f32) {
        self.jump_request = Some(JumpRequest::new(scale));
    }

    /// Request a jump only if the controller can jump and the stamina pays for it.
    ///
    /// Returns whether the jump was queued. Stamina is not spent when the
    /// controller cannot jump.
    pub fn jump_paid(
        &mut self,
        scale: f32,
        cost: f32,
        jump: &JumpController,
        stamina: &mut impl StaminaGate,
    ) -> bool {
        if !jump.can_jump() || !stamina.try_use(cost) {
            return false;
        }
        self.jump(scale);
        true
    }

    /// Take and consume the pending jump request, if any.
    pub fn take_jump_request(&mut self) -> Option<JumpRequest> {
        self.jump_request.take()
    }

    pub fn has_jump_request(&self) -> bool {
        self.jump_request.is_some()
    }

    pub fn set_sprint(&mut self, sprint: bool) {
        self.sprint = sprint;
    }

    pub fn set_crouch(&mut self, crouch: bool) {
        self.crouch = crouch;
    }

    pub fn toggle_crouch(&mut self) {
        self.crouch = !self.crouch;
    }

    pub fn set_prone(&mut self, prone: bool) {
        self.prone = prone;
    }

    pub fn toggle_prone(&mut self) {
        self.prone = !self.prone;
    }
}

/// Jump request stored in [`MovementIntent`].
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct JumpRequest {
    /// Multiplier on the configured jump force.
    pub scale: f32,
}

impl JumpRequest {
    pub fn new(scale: f32) -> Self {
        Self { scale }
    }
}

impl Default for JumpRequest {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

/// Reference frame the input axis is expressed in.
///
/// Without this component the axis is read in world space.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub enum MovementFrame {
    /// `+y` on the axis moves along world `-Z`.
    #[default]
    World,
    /// The axis is relative to the agent's own rotation.
    Body,
    /// The axis is relative to another entity, usually a camera.
    Entity(Entity),
}

impl MovementFrame {
    /// Resolve the frame rotation.
    ///
    /// `body` is the agent's rotation. A missing frame entity falls back to
    /// world space.
    pub fn rotation(&self, world: &World, body: Quat) -> Quat {
        match *self {
            Self::World => Quat::IDENTITY,
            Self::Body => body,
            Self::Entity(entity) => match world.get::<GlobalTransform>(entity) {
                Some(transform) => transform.compute_transform().rotation,
                None => {
                    warn_once!("movement frame {entity} has no GlobalTransform, using world space");
                    Quat::IDENTITY
                }
            },
        }
    }
}
