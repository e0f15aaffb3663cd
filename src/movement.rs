//! Movement resolution.
//!
//! Turns the agent's [`MovementIntent`] and the latest [`SenseSnapshot`] into
//! a [`MotorCommand`]: a velocity to set, an acceleration to add and what to
//! do with the collider's friction. The resolver is pure; the fixed-step
//! system applies the command through the backend.

use bevy::prelude::*;

use crate::backend::SurfaceFriction;
use crate::config::{ControllerConfig, SpringConfig};
use crate::intent::MovementIntent;
use crate::probe::{SenseSnapshot, StepState};
use crate::state::LocomotionState;

/// Per-agent memory of the resolver.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct LocomotionMotor {
    /// Smooth-damp state carried between steps.
    pub damp_velocity: Vec3,
    /// Last resolved world movement direction (normalized or zero).
    ///
    /// Follows the intent's remembered direction, so it survives a released
    /// axis until the idle reset delay elapses.
    pub direction: Vec3,
    #[reflect(ignore)]
    friction: Option<SurfaceFriction>,
}

impl LocomotionMotor {
    /// Friction captured from the collider, restored after slope slides.
    pub fn cached_friction(&self) -> Option<SurfaceFriction> {
        self.friction
    }

    pub fn is_friction_cached(&self) -> bool {
        self.friction.is_some()
    }

    pub fn cache_friction(&mut self, friction: SurfaceFriction) {
        self.friction = Some(friction);
    }
}

/// What the fixed step should do with the collider's friction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrictionCommand {
    /// Leave the material untouched.
    #[default]
    Keep,
    /// Write back the cached material.
    Restore,
    /// Frictionless material for an unlocked slope slide.
    Sliding,
}

/// Output of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorCommand {
    /// Velocity to set on the body.
    pub velocity: Option<Vec3>,
    /// Acceleration to add this step.
    pub acceleration: Vec3,
    pub friction: FrictionCommand,
    /// The body is held still on a locked slope.
    pub hold: bool,
}

/// Inputs to [`resolve`].
#[derive(Debug, Clone, Copy)]
pub struct ResolveInput<'a> {
    pub config: &'a ControllerConfig,
    pub state: &'a LocomotionState,
    pub snapshot: &'a SenseSnapshot,
    pub intent: &'a MovementIntent,
    /// Rotation of the reference frame the axis is expressed in.
    pub frame: Quat,
    /// Current body velocity.
    pub velocity: Vec3,
    pub gravity: Vec3,
    pub dt: f32,
    /// Attached stamina pool is exhausted.
    pub stamina_empty: bool,
}

/// Speed for the agent's current stance, scaled by the clamped speed factor.
pub fn effective_speed(config: &ControllerConfig, state: &LocomotionState) -> f32 {
    config.stance_speed(state.is_sprinting, state.is_crouched, state.is_prone)
        * config.movement.speed_factor.clamp(0.0, 1.0)
}

/// Resolve one fixed step of movement.
pub fn resolve(input: &ResolveInput, motor: &mut LocomotionMotor) -> MotorCommand {
    let ResolveInput {
        config,
        state,
        snapshot,
        intent,
        frame,
        velocity,
        gravity,
        dt,
        stamina_empty,
    } = *input;

    let movement = &config.movement;
    let speed = effective_speed(config, state);
    let suppressed = snapshot.intent_suppressed || stamina_empty;

    motor.direction = if intent.root_motion {
        intent.root_direction
    } else {
        relative_to(intent.last_direction, frame).normalize_or_zero()
    };

    let mut command = MotorCommand::default();

    if !state.is_grounded {
        motor.damp_velocity = Vec3::ZERO;
        if !state.can_move(movement.air_control) || suppressed {
            return command;
        }
        let target = if intent.root_motion {
            intent.root_velocity
        } else {
            relative_to(intent.local_direction(), frame).normalize_or_zero()
                * speed
                * movement.air_control
        }
        .clamp_length_max(speed);

        if target.length() > movement.threshold {
            // Gravity's own axis is left to the engine
            let mask = Vec3::ONE + gravity.normalize_or_zero();
            command.acceleration = (target - velocity) / dt * mask;
        }
        return command;
    }

    command.friction = FrictionCommand::Restore;
    let slope_normal = snapshot.slope.normal;
    let climbable = snapshot.step.state == StepState::Climbable;

    if intent.root_motion {
        let mut target = if suppressed { Vec3::ZERO } else { intent.root_velocity };
        if state.is_sloped {
            target = project_on_plane(target, slope_normal);
        }
        target = target.clamp_length_max(speed);

        if target.length() > movement.threshold {
            if climbable {
                target += snapshot.step.projected_climb;
            }
            command.velocity = Some(target);
        } else {
            apply_slope_rule(config, state, slope_normal, gravity, &mut command);
        }
        return command;
    }

    let local = if suppressed {
        Vec3::ZERO
    } else {
        intent.local_direction()
    };
    let mut direction = relative_to(local, frame).normalize_or_zero();
    if state.is_sloped {
        direction = project_on_plane(direction, slope_normal);
    }

    let mut target = direction * speed;
    if climbable && target != Vec3::ZERO {
        let climb = snapshot.step.projected_climb.normalize_or_zero();
        target = (direction.normalize_or_zero() + climb) * speed;
    }
    target = target.clamp_length_max(speed);

    let damp = &mut motor.damp_velocity;
    let next = if target.length() > movement.threshold {
        smooth_damp(velocity, target, damp, movement.damp_up, f32::INFINITY, dt)
    } else {
        apply_slope_rule(config, state, slope_normal, gravity, &mut command);
        smooth_damp(velocity, Vec3::ZERO, damp, movement.damp_down, f32::INFINITY, dt)
    };

    if !command.hold {
        command.velocity = Some(clamp_horizontal(next, speed));
    }
    command
}

/// Hold or slide on a slope when there is no input.
fn apply_slope_rule(
    config: &ControllerConfig,
    state: &LocomotionState,
    normal: Vec3,
    gravity: Vec3,
    command: &mut MotorCommand,
) {
    if !state.is_sloped {
        return;
    }
    if config.slope.lock {
        command.hold = true;
        command.velocity = Some(Vec3::ZERO);
    } else {
        command.acceleration += project_on_plane(gravity, normal) * config.slope.gravity_multiplier;
        command.friction = FrictionCommand::Sliding;
    }
}

fn clamp_horizontal(velocity: Vec3, speed: f32) -> Vec3 {
    let horizontal = Vec3::new(velocity.x, 0.0, velocity.z).clamp_length_max(speed);
    Vec3::new(horizontal.x, velocity.y, horizontal.z)
}

/// Remove the component of `v` along `normal`. A zero normal leaves `v` as is.
pub fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    match normal.try_normalize() {
        Some(n) => v - n * v.dot(n),
        None => v,
    }
}

/// Rotate a local direction into a reference frame, keeping it horizontal.
///
/// Only the frame's heading is used. When its forward axis is (nearly)
/// vertical, as with a camera looking straight down, the frame's up axis
/// gives the heading instead.
pub fn relative_to(local: Vec3, frame: Quat) -> Vec3 {
    let flatten = |v: Vec3| Vec3::new(v.x, 0.0, v.z);

    let mut forward = flatten(frame * Vec3::NEG_Z);
    if forward.length_squared() < 1e-10 {
        forward = flatten(frame * Vec3::Y);
    }
    if forward.length_squared() < 1e-10 {
        forward = Vec3::NEG_Z;
    }

    let heading = Quat::from_rotation_y(f32::atan2(-forward.x, -forward.z));
    heading * local
}

/// Critically damped spring toward `target`.
///
/// Approximates the exact solution with a third order polynomial in
/// `omega × dt`. `velocity` carries the spring state between calls. The
/// change per call is limited to `max_speed × smooth_time` and the result
/// never overshoots the target.
pub fn smooth_damp(
    current: Vec3,
    target: Vec3,
    velocity: &mut Vec3,
    smooth_time: f32,
    max_speed: f32,
    dt: f32,
) -> Vec3 {
    if dt <= 0.0 {
        return current;
    }
    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = (current - target).clamp_length_max(max_speed * smooth_time);
    let goal = current - change;

    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * exp;
    let mut output = goal + (change + temp) * exp;

    if (target - current).dot(output - target) > 0.0 {
        output = target;
        *velocity = (output - target) / dt;
    }
    output
}

/// Suspension force keeping the collider bottom `ride_height` above ground.
///
/// `distance` is measured from the body origin to the ground along
/// `direction`. Relative velocity is taken against the ground body so that
/// the agent rides moving surfaces.
pub fn ground_spring_force(
    spring: &SpringConfig,
    direction: Vec3,
    distance: f32,
    bottom_offset: f32,
    velocity: Vec3,
    ground_velocity: Vec3,
) -> Vec3 {
    let x = distance - (bottom_offset + spring.ride_height);
    let relative = (velocity - ground_velocity).dot(direction);
    direction * (x * spring.strength - relative * spring.damper)
}
