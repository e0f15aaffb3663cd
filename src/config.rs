//! Controller configuration components.
//!
//! This module defines the tuning for a locomotion controller: movement
//! speeds and smoothing, stance shapes, the geometry probes (ground, slope,
//! step, wall), the optional ground spring and the jump rules.
//!
//! Every distance is in world units and every angle in radians.

use bevy::prelude::*;

use crate::backend::{CapsuleShape, ForceMode};

/// Smallest positive value substituted for degenerate distances.
const MIN_DISTANCE: f32 = 0.01;

/// Movement speed and smoothing parameters.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MovementConfig {
    /// Base horizontal speed (units/second).
    pub speed: f32,
    /// Multiplier on the stance speed, clamped to `[0, 1]` when used.
    pub speed_factor: f32,
    /// Target speeds below this are treated as "no input".
    pub threshold: f32,
    /// Fraction of the speed available while airborne. Zero disables air control.
    pub air_control: f32,
    /// Smooth-damp time when accelerating toward the target velocity.
    pub damp_up: f32,
    /// Smooth-damp time when decelerating to rest.
    pub damp_down: f32,
    /// Delay before the remembered direction is cleared after the axis drops to zero.
    pub idle_reset_delay: f32,

    pub sprint_enabled: bool,
    pub sprint_speed: f32,
    pub sprint_factor: f32,

    pub crouch_enabled: bool,
    pub crouch_speed: f32,
    pub crouch_factor: f32,

    pub prone_enabled: bool,
    pub prone_speed: f32,
    pub prone_factor: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed: 10.0,
            speed_factor: 1.0,
            threshold: 0.15,
            air_control: 0.0,
            damp_up: 0.2,
            damp_down: 0.1,
            idle_reset_delay: 0.4,
            sprint_enabled: true,
            sprint_speed: 15.0,
            sprint_factor: 1.0,
            crouch_enabled: true,
            crouch_speed: 5.0,
            crouch_factor: 1.0,
            prone_enabled: true,
            prone_speed: 3.0,
            prone_factor: 1.0,
        }
    }
}

/// Collider shapes for each stance.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StanceConfig {
    pub standing: CapsuleShape,
    pub crouching: CapsuleShape,
    pub prone: CapsuleShape,
}

impl Default for StanceConfig {
    fn default() -> Self {
        Self {
            standing: CapsuleShape::new(2.0, 0.5),
            crouching: CapsuleShape::new(1.2, 0.45),
            prone: CapsuleShape::new(1.0, 0.45),
        }
    }
}

/// Ground spring (suspension) that keeps the capsule at a ride height.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SpringConfig {
    pub enabled: bool,
    /// Force per unit of height error.
    pub strength: f32,
    /// Force per unit of relative velocity along the ground direction.
    pub damper: f32,
    /// Target gap between the collider bottom and the ground.
    pub ride_height: f32,
    pub mode: ForceMode,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 1.0,
            damper: 1.0,
            ride_height: 0.0,
            mode: ForceMode::Force,
        }
    }
}

/// Ground probe parameters.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct GroundConfig {
    /// Radius of the ground sphere cast.
    pub radius: f32,
    /// Reach past the collider bottom.
    pub distance: f32,
    /// Direction of the ground probe. Normalized by [`ControllerConfig::sanitized`].
    pub direction: Vec3,
    pub spring: SpringConfig,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            radius: 0.15,
            distance: 0.1,
            direction: Vec3::NEG_Y,
            spring: SpringConfig::default(),
        }
    }
}

/// Slope probe and sliding parameters.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SlopeConfig {
    pub radius: f32,
    pub distance: f32,
    /// Steepest walkable slope (radians).
    pub max_angle: f32,
    /// Scale on slope-projected gravity while sliding.
    pub gravity_multiplier: f32,
    /// Hold the body still on a slope when there is no input.
    pub lock: bool,
}

impl Default for SlopeConfig {
    fn default() -> Self {
        Self {
            radius: 0.1,
            distance: 0.3,
            max_angle: 55f32.to_radians(),
            gravity_multiplier: 6.0,
            lock: true,
        }
    }
}

/// How the step assist pushes the body over a ledge.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum StepForceMode {
    None,
    Acceleration,
    #[default]
    Translation,
    Both,
}

impl StepForceMode {
    pub fn translates(self) -> bool {
        matches!(self, Self::Translation | Self::Both)
    }

    pub fn accelerates(self) -> bool {
        matches!(self, Self::Acceleration | Self::Both)
    }
}

/// Step probe and assist parameters.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StepConfig {
    /// Height of the probe rays above the feet.
    pub offset: f32,
    /// Tallest ledge considered a step.
    pub height: f32,
    /// Length of the probe rays.
    pub distance: f32,
    /// Climb rate of the assist.
    pub smooth: f32,
    /// Number of rays in the vertical sub-probe.
    pub iterations: u32,
    /// Angle between the centre probe ray and the side rays (radians).
    pub fan_angle: f32,
    pub mode: StepForceMode,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            offset: 0.1,
            height: 0.2,
            distance: 0.15,
            smooth: 1.0,
            iterations: 10,
            fan_angle: 50f32.to_radians(),
            mode: StepForceMode::Translation,
        }
    }
}

/// Jump parameters.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct JumpConfig {
    pub enabled: bool,
    /// Impulse per unit of mass.
    pub force: f32,
    /// Jumps allowed before landing again.
    pub max_count: u32,
    /// Windup between the request and the impulse (seconds).
    pub delay: f32,
    /// How long a jump stays available after leaving the ground (seconds).
    pub memory: f32,
    /// How long the ground probe is ignored after the impulse (seconds).
    pub ground_relax: f32,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            force: 10.0,
            max_count: 1,
            delay: 0.1,
            memory: 0.0,
            ground_relax: 0.1,
        }
    }
}

/// Wall probe parameters.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WallConfig {
    /// Height of the radial rays above the body origin.
    pub height: f32,
    pub distance: f32,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            height: 0.0,
            distance: 1.0,
        }
    }
}

/// Configuration parameters for the locomotion controller.
///
/// # Example
///
/// ```rust
/// use rigid_locomotion::prelude::*;
///
/// let config = ControllerConfig::player()
///     .with_speed(8.0)
///     .with_jump(12.0, 2)
///     .with_air_control(0.3);
///
/// assert_eq!(config.jump.max_count, 2);
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Default)]
#[reflect(Component)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerConfig {
    pub movement: MovementConfig,
    pub stance: StanceConfig,
    pub ground: GroundConfig,
    pub slope: SlopeConfig,
    pub step: StepConfig,
    pub jump: JumpConfig,
    pub wall: WallConfig,
}

impl ControllerConfig {
    /// Create a config tuned for responsive player control.
    pub fn player() -> Self {
        Self {
            movement: MovementConfig {
                damp_up: 0.1,
                air_control: 0.2,
                ..default()
            },
            jump: JumpConfig {
                memory: 0.15,
                ..default()
            },
            ..default()
        }
    }

    /// Create a config for AI-driven agents.
    ///
    /// Agents walk slower, never sprint and have no air control.
    pub fn agent() -> Self {
        Self {
            movement: MovementConfig {
                speed: 6.0,
                sprint_enabled: false,
                damp_up: 0.3,
                ..default()
            },
            step: StepConfig {
                mode: StepForceMode::Both,
                ..default()
            },
            ..default()
        }
    }

    /// Builder: set base speed.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.movement.speed = speed;
        self
    }

    /// Builder: set speed factor.
    pub fn with_speed_factor(mut self, factor: f32) -> Self {
        self.movement.speed_factor = factor;
        self
    }

    /// Builder: set the smooth-damp times.
    pub fn with_damping(mut self, up: f32, down: f32) -> Self {
        self.movement.damp_up = up;
        self.movement.damp_down = down;
        self
    }

    /// Builder: set air control.
    pub fn with_air_control(mut self, air_control: f32) -> Self {
        self.movement.air_control = air_control;
        self
    }

    /// Builder: set ground probe reach.
    pub fn with_ground_distance(mut self, distance: f32) -> Self {
        self.ground.distance = distance;
        self
    }

    /// Builder: enable the ground spring.
    pub fn with_spring(mut self, strength: f32, damper: f32, ride_height: f32) -> Self {
        self.ground.spring = SpringConfig {
            enabled: true,
            strength,
            damper,
            ride_height,
            ..self.ground.spring
        };
        self
    }

    /// Builder: set slope limit (radians) and lock.
    pub fn with_slope(mut self, max_angle: f32, lock: bool) -> Self {
        self.slope.max_angle = max_angle;
        self.slope.lock = lock;
        self
    }

    /// Builder: set step probe geometry.
    pub fn with_step(mut self, offset: f32, height: f32, distance: f32) -> Self {
        self.step.offset = offset;
        self.step.height = height;
        self.step.distance = distance;
        self
    }

    /// Builder: set step assist mode.
    pub fn with_step_mode(mut self, mode: StepForceMode) -> Self {
        self.step.mode = mode;
        self
    }

    /// Builder: set jump force and count.
    pub fn with_jump(mut self, force: f32, max_count: u32) -> Self {
        self.jump.force = force;
        self.jump.max_count = max_count;
        self
    }

    /// Builder: set jump windup delay.
    pub fn with_jump_delay(mut self, delay: f32) -> Self {
        self.jump.delay = delay;
        self
    }

    /// Builder: set jump memory.
    pub fn with_jump_memory(mut self, memory: f32) -> Self {
        self.jump.memory = memory;
        self
    }

    /// Builder: set wall probe height and reach.
    pub fn with_wall(mut self, height: f32, distance: f32) -> Self {
        self.wall.height = height;
        self.wall.distance = distance;
        self
    }

    /// Speed and speed factor for the given stance flags.
    ///
    /// Prone wins over crouch, crouch over sprint.
    pub fn stance_speed(&self, sprinting: bool, crouched: bool, prone: bool) -> f32 {
        let m = &self.movement;
        if prone {
            m.prone_speed * m.prone_factor
        } else if crouched {
            m.crouch_speed * m.crouch_factor
        } else if sprinting {
            m.sprint_speed * m.sprint_factor
        } else {
            m.speed
        }
    }

    /// Capsule for the given stance flags.
    pub fn stance_shape(&self, crouched: bool, prone: bool) -> CapsuleShape {
        if prone {
            self.stance.prone
        } else if crouched {
            self.stance.crouching
        } else {
            self.stance.standing
        }
    }

    /// Replace degenerate values with small positive defaults.
    ///
    /// Zero or negative distances become [`MIN_DISTANCE`], a zero iteration
    /// count becomes 1 and a zero ground direction falls back to world down.
    pub fn sanitized(mut self) -> Self {
        fn positive(value: f32) -> f32 {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                MIN_DISTANCE
            }
        }

        self.ground.radius = positive(self.ground.radius);
        self.ground.distance = positive(self.ground.distance);
        self.ground.direction = self.ground.direction.try_normalize().unwrap_or(Vec3::NEG_Y);

        self.slope.radius = positive(self.slope.radius);
        self.slope.distance = positive(self.slope.distance);

        self.step.distance = positive(self.step.distance);
        self.step.height = positive(self.step.height);
        self.step.iterations = self.step.iterations.max(1);

        self.wall.distance = positive(self.wall.distance);

        self.movement.damp_up = self.movement.damp_up.max(0.0);
        self.movement.damp_down = self.movement.damp_down.max(0.0);
        self.jump.delay = self.jump.delay.max(0.0);
        self.jump.memory = self.jump.memory.max(0.0);
        self.jump.ground_relax = self.jump.ground_relax.max(0.0);
        self
    }
}
